use std::net::TcpListener;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::logger::Logger;
use crate::models::{
  ChatRequest, ChatResponse, ErrorBody, GenerateRequest, GenerateResponse, Message,
  ModelsResponse, Role, StructuredResponse,
};

pub const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com";
pub const KEY_VAR: &str = "GEMINI_API_KEY";

const BASELINE_MODEL: &str = "gemini-2.0-flash";
const TOP_K: u32 = 40;
const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";
const EMPTY_REPLY: &str = "No response generated";

pub struct RouterState {
  pub started_at: Instant,
  pub config: Arc<RwLock<AppConfig>>,
  pub logger: Arc<Logger>,
  pub http: reqwest::Client,
  pub upstream_base: String,
  pub key_var: String,
}

#[derive(Debug, Error)]
pub enum RelayError {
  #[error("{0}")]
  Validation(String),
  #[error("{0} not found in environment variables")]
  MissingKey(String),
  #[error("Gemini API returned {status}: {body}")]
  Upstream { status: u16, body: String },
  #[error("Server error: {0}")]
  Internal(String),
}

impl RelayError {
  fn status(&self) -> StatusCode {
    match self {
      RelayError::Validation(_) => StatusCode::BAD_REQUEST,
      RelayError::MissingKey(_) => StatusCode::INTERNAL_SERVER_ERROR,
      RelayError::Upstream { status, .. } => {
        StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
      }
      RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for RelayError {
  fn into_response(self) -> Response {
    let body = Json(ErrorBody {
      error: self.to_string(),
    });
    (self.status(), body).into_response()
  }
}

impl From<reqwest::Error> for RelayError {
  fn from(err: reqwest::Error) -> Self {
    RelayError::Internal(err.to_string())
  }
}

pub async fn run_router(listener: TcpListener, state: RouterState) -> anyhow::Result<()> {
  let app = Router::new()
    .route("/health", get(health))
    .route("/v1/models", get(models))
    .route("/v1/generate", post(generate))
    .route("/v1/chat", post(chat))
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    .with_state(Arc::new(state));

  listener.set_nonblocking(true)?;
  let listener = tokio::net::TcpListener::from_std(listener)?;
  axum::serve(listener, app).await?;
  Ok(())
}

async fn health(State(state): State<Arc<RouterState>>) -> Json<serde_json::Value> {
  let uptime = state.started_at.elapsed().as_millis() as u64;
  Json(serde_json::json!({
    "status": "ok",
    "version": env!("CARGO_PKG_VERSION"),
    "uptime_ms": uptime
  }))
}

async fn models(State(state): State<Arc<RouterState>>) -> Json<ModelsResponse> {
  let config = state.config.read().await;
  Json(ModelsResponse {
    default: config.settings.model.clone(),
    models: config.models.clone(),
  })
}

async fn generate(
  State(state): State<Arc<RouterState>>,
  Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, RelayError> {
  if req.prompt.trim().is_empty() || req.model.trim().is_empty() {
    state.logger.warn("relay", "generate rejected: missing prompt or model");
    return Err(RelayError::Validation("Missing prompt or model.".to_string()));
  }

  let payload = UpstreamRequest {
    contents: vec![Content {
      role: None,
      parts: vec![Part { text: req.prompt.clone() }],
    }],
    system_instruction: None,
    generation_config: GenerationConfig {
      temperature: req.temperature,
      top_k: TOP_K,
      top_p: req.top_p,
      max_output_tokens: req.max_tokens,
    },
    safety_settings: safety_settings(),
  };

  let body = forward(&state, &req.model, &payload).await?;
  let content = extract_text(&body);
  state
    .logger
    .info("relay", &format!("generate ok: model={} chars={}", req.model, content.len()));
  Ok(Json(GenerateResponse { content }))
}

async fn chat(
  State(state): State<Arc<RouterState>>,
  Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, RelayError> {
  if req.messages.is_empty() || req.model.trim().is_empty() {
    state.logger.warn("relay", "chat rejected: missing messages or model");
    return Err(RelayError::Validation("Missing messages or model.".to_string()));
  }

  let (contents, system) = to_gemini_contents(&req.messages, req.system_message.as_deref());
  let payload = UpstreamRequest {
    contents,
    system_instruction: system.map(|text| Content {
      role: None,
      parts: vec![Part { text }],
    }),
    generation_config: GenerationConfig {
      temperature: req.temperature,
      top_k: TOP_K,
      top_p: req.top_p,
      max_output_tokens: req.max_tokens,
    },
    safety_settings: safety_settings(),
  };

  let body = forward(&state, &req.model, &payload).await?;
  let content = extract_text(&body);
  let structured = StructuredResponse::from_reply(&content);
  state.logger.info(
    "relay",
    &format!("chat ok: model={} history={} chars={}", req.model, req.messages.len(), content.len()),
  );
  Ok(Json(ChatResponse {
    content,
    structured,
    model: body["modelVersion"].as_str().map(str::to_string),
  }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamRequest {
  contents: Vec<Content>,
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<Content>,
  generation_config: GenerationConfig,
  safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct Content {
  #[serde(skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
  text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  top_k: u32,
  top_p: f32,
  max_output_tokens: u32,
}

#[derive(Serialize)]
struct SafetySetting {
  category: &'static str,
  threshold: &'static str,
}

fn safety_settings() -> Vec<SafetySetting> {
  [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
  ]
  .iter()
  .map(|category| SafetySetting {
    category,
    threshold: SAFETY_THRESHOLD,
  })
  .collect()
}

fn map_model(name: &str) -> &'static str {
  match name {
    "gemini-2.0-flash" => "gemini-2.0-flash",
    "gemini-1.5-flash" => "gemini-1.5-flash-latest",
    "gemini-pro" => "gemini-pro",
    _ => BASELINE_MODEL,
  }
}

/// Folds a transcript into Gemini's multi-turn shape; system text rides
/// separately as the system instruction, never as a content turn.
fn to_gemini_contents(
  messages: &[Message],
  system_message: Option<&str>,
) -> (Vec<Content>, Option<String>) {
  let mut system_parts: Vec<String> = Vec::new();
  if let Some(text) = system_message {
    if !text.trim().is_empty() {
      system_parts.push(text.to_string());
    }
  }

  let mut contents = Vec::new();
  for msg in messages {
    let role = match msg.role {
      Role::System => {
        system_parts.push(msg.content.clone());
        continue;
      }
      Role::User => "user",
      Role::Assistant => "model",
    };
    contents.push(Content {
      role: Some(role.to_string()),
      parts: vec![Part { text: msg.content.clone() }],
    });
  }

  let system = if system_parts.is_empty() {
    None
  } else {
    Some(system_parts.join("\n\n"))
  };
  (contents, system)
}

async fn forward(
  state: &RouterState,
  model: &str,
  payload: &UpstreamRequest,
) -> Result<serde_json::Value, RelayError> {
  let key = match std::env::var(&state.key_var).ok().filter(|k| !k.trim().is_empty()) {
    Some(key) => key,
    None => {
      state
        .logger
        .error("relay", &format!("{} is not set", state.key_var));
      return Err(RelayError::MissingKey(state.key_var.clone()));
    }
  };

  let url = format!(
    "{}/v1beta/models/{}:generateContent?key={}",
    state.upstream_base,
    map_model(model),
    key
  );

  let resp = match state.http.post(&url).json(payload).send().await {
    Ok(resp) => resp,
    Err(err) => {
      state
        .logger
        .error("relay", &format!("upstream unreachable: {err}"));
      return Err(RelayError::Internal(err.to_string()));
    }
  };

  let status = resp.status();
  if !status.is_success() {
    let body = resp
      .text()
      .await
      .unwrap_or_else(|_| "request failed".to_string());
    state
      .logger
      .error("relay", &format!("upstream {} for model {}", status.as_u16(), model));
    return Err(RelayError::Upstream {
      status: status.as_u16(),
      body,
    });
  }

  Ok(resp.json().await?)
}

fn extract_text(body: &serde_json::Value) -> String {
  body["candidates"][0]["content"]["parts"][0]["text"]
    .as_str()
    .unwrap_or(EMPTY_REPLY)
    .to_string()
}
