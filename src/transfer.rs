use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::GenerationSettings;
use crate::models::ChatSession;

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
  pub session: ChatSession,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub settings: Option<GenerationSettings>,
  #[serde(default = "Utc::now")]
  pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum TransferError {
  #[error("not a valid chat export: {0}")]
  Format(#[from] serde_json::Error),
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

pub fn export_path(dir: &Path, session_id: Uuid) -> PathBuf {
  dir.join(format!(
    "ai-chat-{}-{}.json",
    session_id,
    Utc::now().timestamp_millis()
  ))
}

pub fn export_session(
  dir: &Path,
  session: &ChatSession,
  settings: &GenerationSettings,
) -> Result<PathBuf, TransferError> {
  let document = ExportDocument {
    session: session.clone(),
    settings: Some(settings.clone()),
    exported_at: Utc::now(),
  };
  let path = export_path(dir, session.id);
  fs::write(&path, serde_json::to_string_pretty(&document)?)?;
  Ok(path)
}

pub fn import_session(path: &Path) -> Result<ExportDocument, TransferError> {
  let raw = fs::read_to_string(path)?;
  Ok(serde_json::from_str(&raw)?)
}
