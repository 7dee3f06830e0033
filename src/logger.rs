use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;

pub struct Logger {
  file: Mutex<std::fs::File>,
}

impl Logger {
  pub fn new(path: &Path) -> anyhow::Result<Self> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Self {
      file: Mutex::new(file),
    })
  }

  pub fn info(&self, scope: &str, message: &str) {
    self.write("INFO", scope, message);
  }

  pub fn warn(&self, scope: &str, message: &str) {
    self.write("WARN", scope, message);
  }

  pub fn error(&self, scope: &str, message: &str) {
    self.write("ERROR", scope, message);
  }

  fn write(&self, level: &str, scope: &str, message: &str) {
    let ts = Utc::now().to_rfc3339();
    let line = format!("[{ts}] {level} [{scope}] {message}\n");
    if let Ok(mut file) = self.file.lock() {
      let _ = file.write_all(line.as_bytes());
    }
  }
}
