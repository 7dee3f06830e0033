use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::ModelInfo;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful AI assistant. Provide structured, \
step-by-step responses with clear explanations and examples when appropriate.";

const TEMPERATURE_MAX: f32 = 2.0;
const TOP_P_MAX: f32 = 1.0;
const FALLBACK_MAX_TOKENS: u32 = 4096;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
  pub model: String,
  pub temperature: f32,
  pub max_tokens: u32,
  pub top_p: f32,
  #[serde(default)]
  pub system_message: String,
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self {
      model: DEFAULT_MODEL.to_string(),
      temperature: 0.7,
      max_tokens: 1000,
      top_p: 1.0,
      system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
    }
  }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
  pub settings: GenerationSettings,
  pub models: Vec<ModelInfo>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      settings: GenerationSettings::default(),
      models: vec![
        ModelInfo {
          name: "gemini-2.0-flash".to_string(),
          display_name: "Gemini 2.0 Flash".to_string(),
          max_tokens: 30720,
          supports_system: true,
        },
        ModelInfo {
          name: "gemini-1.5-flash".to_string(),
          display_name: "Gemini 1.5 Flash".to_string(),
          max_tokens: 1048576,
          supports_system: true,
        },
      ],
    }
  }
}

impl AppConfig {
  pub fn find_model(&self, name: &str) -> Option<&ModelInfo> {
    self.models.iter().find(|m| m.name == name)
  }

  pub fn model_cap(&self, name: &str) -> u32 {
    self
      .find_model(name)
      .map(|m| m.max_tokens)
      .unwrap_or(FALLBACK_MAX_TOKENS)
  }

  /// Selects a catalog model, rejecting unknown names; the token budget is
  /// re-clamped to the new model's cap.
  pub fn set_model(&mut self, name: &str) -> bool {
    if self.find_model(name).is_none() {
      return false;
    }
    self.settings.model = name.to_string();
    let max_tokens = self.settings.max_tokens;
    self.set_max_tokens(max_tokens);
    true
  }

  pub fn set_temperature(&mut self, value: f32) {
    // NaN survives clamp and serializes as null, which load_or_init rejects
    if !value.is_finite() {
      return;
    }
    self.settings.temperature = value.clamp(0.0, TEMPERATURE_MAX);
  }

  pub fn set_top_p(&mut self, value: f32) {
    if !value.is_finite() {
      return;
    }
    self.settings.top_p = value.clamp(0.0, TOP_P_MAX);
  }

  pub fn set_max_tokens(&mut self, value: u32) {
    let cap = self.model_cap(&self.settings.model);
    self.settings.max_tokens = value.clamp(1, cap);
  }

  pub fn apply_imported(&mut self, imported: GenerationSettings) {
    self.settings.model = imported.model;
    self.settings.system_message = imported.system_message;
    self.set_temperature(imported.temperature);
    self.set_top_p(imported.top_p);
    self.set_max_tokens(imported.max_tokens);
  }
}

pub fn load_or_init(path: &Path) -> anyhow::Result<AppConfig> {
  if path.exists() {
    let data = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&data)?;
    Ok(config)
  } else {
    let config = AppConfig::default();
    save_config(path, &config)?;
    Ok(config)
  }
}

pub fn save_config(path: &Path, config: &AppConfig) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(config)?;
  std::fs::write(path, json)?;
  Ok(())
}
