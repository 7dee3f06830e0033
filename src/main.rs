mod config;
mod exchange;
mod logger;
mod models;
mod render;
mod repl;
mod router;
mod sessions;
mod transfer;

use std::sync::Arc;
use std::time::Instant;

use colored::Colorize;
use tokio::sync::RwLock;

use exchange::ExchangeController;
use logger::Logger;
use repl::Repl;
use router::{run_router, RouterState, GEMINI_BASE, KEY_VAR};
use sessions::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  let data_dir = dirs::data_dir()
    .unwrap_or_else(std::env::temp_dir)
    .join("gemterm");
  std::fs::create_dir_all(&data_dir)?;

  let config_path = data_dir.join("settings.json");
  let log_path = data_dir.join("gemterm.log");

  let config = Arc::new(RwLock::new(config::load_or_init(&config_path)?));
  let logger = Arc::new(Logger::new(&log_path)?);
  logger.info("app", "GemTerm starting up");

  let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
  let port = listener.local_addr()?.port();

  let router_state = RouterState {
    started_at: Instant::now(),
    config: config.clone(),
    logger: logger.clone(),
    http: reqwest::Client::new(),
    upstream_base: GEMINI_BASE.to_string(),
    key_var: KEY_VAR.to_string(),
  };
  tokio::spawn(async move {
    if let Err(err) = run_router(listener, router_state).await {
      eprintln!("relay error: {err}");
    }
  });
  logger.info("relay", &format!("listening on 127.0.0.1:{port}"));

  let model = config.read().await.settings.model.clone();
  let store = SessionStore::new(&model);
  let controller = ExchangeController::new(format!("http://127.0.0.1:{port}"));

  println!("{}", "GemTerm".cyan().bold());
  println!("Relay listening on 127.0.0.1:{port}. Type /help for commands.");
  if std::env::var(KEY_VAR).map_or(true, |k| k.trim().is_empty()) {
    logger.warn("app", &format!("{KEY_VAR} is not set"));
    println!(
      "{}",
      format!("Note: {KEY_VAR} is not set; exchanges will fail until it is.").yellow()
    );
  }
  println!();

  Repl::new(store, controller, config, config_path, logger)
    .run()
    .await
}
