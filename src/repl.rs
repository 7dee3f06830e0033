use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::RwLock;

use crate::config::{save_config, AppConfig};
use crate::exchange::{ExchangeController, SubmitOutcome};
use crate::logger::Logger;
use crate::render::{render_message, SECTION_HEADINGS};
use crate::sessions::SessionStore;
use crate::transfer;

enum Flow {
  Continue,
  Quit,
}

pub struct Repl {
  store: SessionStore,
  controller: ExchangeController,
  config: Arc<RwLock<AppConfig>>,
  config_path: PathBuf,
  logger: Arc<Logger>,
}

impl Repl {
  pub fn new(
    store: SessionStore,
    controller: ExchangeController,
    config: Arc<RwLock<AppConfig>>,
    config_path: PathBuf,
    logger: Arc<Logger>,
  ) -> Self {
    Self {
      store,
      controller,
      config,
      config_path,
      logger,
    }
  }

  pub async fn run(&mut self) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new()?;
    loop {
      let prompt = {
        let config = self.config.read().await;
        format!("{} [{}]> ", self.store.current().name, config.settings.model)
      };
      match rl.readline(&prompt) {
        Ok(line) => {
          let line = line.trim().to_string();
          if line.is_empty() {
            continue;
          }
          rl.add_history_entry(&line)?;
          if let Flow::Quit = self.dispatch(&line).await {
            break;
          }
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
        Err(err) => return Err(err.into()),
      }
    }
    println!("Goodbye.");
    Ok(())
  }

  async fn dispatch(&mut self, line: &str) -> Flow {
    match split_command(line) {
      Some((name, rest)) => self.run_command(name, rest).await,
      None => {
        self.send(line).await;
        Flow::Continue
      }
    }
  }

  async fn run_command(&mut self, name: &str, rest: &str) -> Flow {
    match name {
      "help" => print_help(),
      "new" => self.new_session().await,
      "sessions" => self.list_sessions(),
      "switch" => self.switch(rest),
      "clear" => {
        self.store.clear_current();
        self.controller.clear_error();
        println!("Transcript cleared.");
      }
      "model" => self.set_model(rest).await,
      "models" => self.list_models().await,
      "system" => self.system_message(rest).await,
      "temp" => self.set_temperature(rest).await,
      "topp" => self.set_top_p(rest).await,
      "tokens" => self.set_max_tokens(rest).await,
      "settings" => self.show_settings().await,
      "export" => self.export().await,
      "import" => self.import(rest).await,
      "quit" | "exit" => return Flow::Quit,
      _ => eprintln!("{}", format!("Unknown command /{name}. Try /help.").yellow()),
    }
    Flow::Continue
  }

  async fn send(&mut self, input: &str) {
    let settings = self.config.read().await.settings.clone();
    println!("{}", "thinking...".dimmed());
    let outcome = self
      .controller
      .submit(&mut self.store, &settings, input)
      .await;
    match outcome {
      SubmitOutcome::Skipped => {}
      SubmitOutcome::Replied => self.print_last_reply(),
      SubmitOutcome::Errored => {
        if let Some(err) = self.controller.last_error() {
          eprintln!("{} {err}", "Error:".red());
        }
        self.print_last_reply();
      }
    }
  }

  fn print_last_reply(&self) {
    if let Some(message) = self.store.view().last() {
      println!();
      for line in render_message(message).lines() {
        if SECTION_HEADINGS.contains(&line) {
          println!("{}", line.cyan().bold());
        } else {
          println!("{line}");
        }
      }
      println!();
    }
  }

  async fn new_session(&mut self) {
    let model = self.config.read().await.settings.model.clone();
    self.store.create_session(&model);
    self.controller.clear_error();
    self
      .logger
      .info("chat", &format!("created session {}", self.store.current().name));
    println!("Started {}.", self.store.current().name);
  }

  fn list_sessions(&self) {
    let current = self.store.current().id;
    for (idx, session) in self.store.sessions().iter().enumerate() {
      let marker = if session.id == current { "*" } else { " " };
      println!(
        "{marker} {}. {} ({} messages)",
        idx + 1,
        session.name,
        session.messages.len()
      );
    }
  }

  fn switch(&mut self, rest: &str) {
    let target = rest
      .parse::<usize>()
      .ok()
      .filter(|n| *n >= 1)
      .and_then(|n| self.store.sessions().get(n - 1).map(|s| s.id));
    match target {
      Some(id) => {
        self.store.switch_session(id);
        self.controller.clear_error();
        println!("Switched to {}.", self.store.current().name);
      }
      None => eprintln!("{}", "Usage: /switch <number from /sessions>".yellow()),
    }
  }

  async fn set_model(&mut self, rest: &str) {
    if rest.is_empty() {
      eprintln!("{}", "Usage: /model <name>".yellow());
      return;
    }
    let mut config = self.config.write().await;
    if config.set_model(rest) {
      self.persist(&config);
      println!("Model set to {rest}.");
    } else {
      let names: Vec<&str> = config.models.iter().map(|m| m.name.as_str()).collect();
      eprintln!(
        "{}",
        format!("Unknown model {rest}. Available: {}", names.join(", ")).yellow()
      );
    }
  }

  async fn list_models(&self) {
    let config = self.config.read().await;
    for model in &config.models {
      let marker = if model.name == config.settings.model { "*" } else { " " };
      println!(
        "{marker} {}  {} (up to {} tokens)",
        model.name, model.display_name, model.max_tokens
      );
    }
  }

  async fn system_message(&mut self, rest: &str) {
    if rest.is_empty() {
      let config = self.config.read().await;
      println!("{}", config.settings.system_message);
    } else {
      let mut config = self.config.write().await;
      config.settings.system_message = rest.to_string();
      self.persist(&config);
      println!("System message updated.");
    }
  }

  async fn set_temperature(&mut self, rest: &str) {
    match rest.parse::<f32>() {
      Ok(value) => {
        let mut config = self.config.write().await;
        config.set_temperature(value);
        self.persist(&config);
        println!("Temperature set to {}.", config.settings.temperature);
      }
      Err(_) => eprintln!("{}", "Usage: /temp <0.0-2.0>".yellow()),
    }
  }

  async fn set_top_p(&mut self, rest: &str) {
    match rest.parse::<f32>() {
      Ok(value) => {
        let mut config = self.config.write().await;
        config.set_top_p(value);
        self.persist(&config);
        println!("Top-p set to {}.", config.settings.top_p);
      }
      Err(_) => eprintln!("{}", "Usage: /topp <0.0-1.0>".yellow()),
    }
  }

  async fn set_max_tokens(&mut self, rest: &str) {
    match rest.parse::<u32>() {
      Ok(value) => {
        let mut config = self.config.write().await;
        config.set_max_tokens(value);
        self.persist(&config);
        println!("Reply budget set to {} tokens.", config.settings.max_tokens);
      }
      Err(_) => eprintln!("{}", "Usage: /tokens <count>".yellow()),
    }
  }

  async fn show_settings(&self) {
    let config = self.config.read().await;
    println!("Model:          {}", config.settings.model);
    println!("Temperature:    {}", config.settings.temperature);
    println!("Top-p:          {}", config.settings.top_p);
    println!("Max tokens:     {}", config.settings.max_tokens);
    println!("System message: {}", config.settings.system_message);
  }

  async fn export(&mut self) {
    let dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = self.config.read().await;
    match transfer::export_session(&dir, self.store.current(), &config.settings) {
      Ok(path) => {
        self
          .logger
          .info("chat", &format!("exported session to {}", path.display()));
        println!("{} {}", "Exported to".green(), path.display());
      }
      Err(err) => eprintln!("{} {err}", "Export failed:".red()),
    }
  }

  async fn import(&mut self, rest: &str) {
    if rest.is_empty() {
      eprintln!("{}", "Usage: /import <path to export file>".yellow());
      return;
    }
    match transfer::import_session(Path::new(rest)) {
      Ok(document) => {
        if let Some(settings) = document.settings {
          let mut config = self.config.write().await;
          config.apply_imported(settings);
          self.persist(&config);
        }
        self.store.adopt_imported(document.session);
        self.controller.clear_error();
        self
          .logger
          .info("chat", &format!("imported session {}", self.store.current().name));
        println!(
          "{} {} ({} messages)",
          "Imported".green(),
          self.store.current().name,
          self.store.current().messages.len()
        );
      }
      Err(err) => eprintln!("{} {err}", "Import failed:".red()),
    }
  }

  fn persist(&self, config: &AppConfig) {
    if let Err(err) = save_config(&self.config_path, config) {
      self.logger.error("config", &format!("save failed: {err}"));
      eprintln!("{} {err}", "Could not save settings:".red());
    }
  }
}

fn split_command(line: &str) -> Option<(&str, &str)> {
  let command = line.strip_prefix('/')?;
  let (name, rest) = command
    .split_once(char::is_whitespace)
    .unwrap_or((command, ""));
  Some((name, rest.trim()))
}

fn print_help() {
  println!("Commands:");
  println!("  /new                start a fresh session");
  println!("  /sessions           list sessions");
  println!("  /switch <number>    switch to a listed session");
  println!("  /clear              wipe the current transcript");
  println!("  /model <name>       pick a model");
  println!("  /models             list available models");
  println!("  /system [text]      show or replace the system message");
  println!("  /temp <value>       set temperature");
  println!("  /topp <value>       set top-p");
  println!("  /tokens <count>     set the reply token budget");
  println!("  /settings           show current settings");
  println!("  /export             write this session to a JSON file");
  println!("  /import <path>      load an exported session");
  println!("  /help               this text");
  println!("  /quit               leave");
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn commands_are_split_from_their_arguments() {
    assert_eq!(split_command("/switch 2"), Some(("switch", "2")));
    assert_eq!(split_command("/help"), Some(("help", "")));
    assert_eq!(split_command("/import  notes.json "), Some(("import", "notes.json")));
  }

  #[test]
  fn plain_text_is_not_a_command() {
    assert_eq!(split_command("what is 2+2?"), None);
    assert_eq!(split_command(""), None);
  }
}
