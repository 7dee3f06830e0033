use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  User,
  Assistant,
  System,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
  #[serde(default = "Uuid::new_v4")]
  pub id: Uuid,
  pub role: Role,
  pub content: String,
  #[serde(default = "Utc::now")]
  pub timestamp: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub structured: Option<StructuredResponse>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sources: Option<Vec<Source>>,
}

impl Message {
  pub fn user(content: impl Into<String>, model: &str) -> Self {
    Self {
      id: Uuid::new_v4(),
      role: Role::User,
      content: content.into(),
      timestamp: Utc::now(),
      model: Some(model.to_string()),
      structured: None,
      sources: None,
    }
  }

  pub fn assistant(content: impl Into<String>, model: &str) -> Self {
    Self {
      id: Uuid::new_v4(),
      role: Role::Assistant,
      content: content.into(),
      timestamp: Utc::now(),
      model: Some(model.to_string()),
      structured: None,
      sources: None,
    }
  }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuredResponse {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub summary: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub steps: Option<Vec<Step>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub key_points: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub examples: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub related_topics: Option<Vec<String>>,
}

impl StructuredResponse {
  pub fn is_empty(&self) -> bool {
    self.summary.as_deref().map_or(true, str::is_empty)
      && self.steps.as_deref().map_or(true, |s| s.is_empty())
      && self.key_points.as_deref().map_or(true, |s| s.is_empty())
      && self.examples.as_deref().map_or(true, |s| s.is_empty())
      && self.related_topics.as_deref().map_or(true, |s| s.is_empty())
  }

  /// Best-effort extraction from a model reply: a fenced ```json block
  /// first, then a reply that is one bare JSON object.
  pub fn from_reply(reply: &str) -> Option<StructuredResponse> {
    let candidate = fenced_json(reply).or_else(|| {
      let trimmed = reply.trim();
      (trimmed.starts_with('{') && trimmed.ends_with('}')).then_some(trimmed)
    })?;

    let parsed: StructuredResponse = serde_json::from_str(candidate).ok()?;
    if parsed.is_empty() {
      None
    } else {
      Some(parsed)
    }
  }
}

fn fenced_json(reply: &str) -> Option<&str> {
  let start = reply.find("```json")? + "```json".len();
  let rest = &reply[start..];
  let end = rest.find("```")?;
  Some(rest[..end].trim())
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Step {
  pub title: String,
  pub description: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub details: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Source {
  pub title: String,
  pub url: String,
  pub snippet: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
  #[serde(default = "Uuid::new_v4")]
  pub id: Uuid,
  pub name: String,
  #[serde(default)]
  pub messages: Vec<Message>,
  #[serde(default = "Utc::now")]
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub model: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
  pub name: String,
  pub display_name: String,
  pub max_tokens: u32,
  pub supports_system: bool,
}

fn default_temperature() -> f32 {
  0.7
}

fn default_top_p() -> f32 {
  1.0
}

fn default_max_tokens() -> u32 {
  256
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
  #[serde(default)]
  pub prompt: String,
  #[serde(default)]
  pub model: String,
  #[serde(default = "default_temperature")]
  pub temperature: f32,
  #[serde(default = "default_top_p")]
  pub top_p: f32,
  #[serde(default = "default_max_tokens")]
  pub max_tokens: u32,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GenerateResponse {
  pub content: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
  #[serde(default)]
  pub messages: Vec<Message>,
  #[serde(default)]
  pub model: String,
  #[serde(default = "default_temperature")]
  pub temperature: f32,
  #[serde(default = "default_top_p")]
  pub top_p: f32,
  #[serde(default = "default_max_tokens")]
  pub max_tokens: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub system_message: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
  pub content: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub structured: Option<StructuredResponse>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ModelsResponse {
  pub default: String,
  pub models: Vec<ModelInfo>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorBody {
  pub error: String,
}
