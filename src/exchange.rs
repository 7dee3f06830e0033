use thiserror::Error;

use crate::config::GenerationSettings;
use crate::models::{ChatRequest, ChatResponse, ErrorBody, Message};
use crate::sessions::SessionStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeStatus {
  Idle,
  Sending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
  Skipped,
  Replied,
  Errored,
}

#[derive(Debug, Error)]
enum ExchangeError {
  #[error("{0}")]
  Api(String),
  #[error("{0}")]
  Transport(#[from] reqwest::Error),
}

/// Drives one request/response cycle against the relay. A failed exchange
/// still lands in the transcript as a synthetic assistant message.
pub struct ExchangeController {
  relay_base: String,
  http: reqwest::Client,
  status: ExchangeStatus,
  last_error: Option<String>,
}

impl ExchangeController {
  pub fn new(relay_base: impl Into<String>) -> Self {
    Self {
      relay_base: relay_base.into(),
      http: reqwest::Client::new(),
      status: ExchangeStatus::Idle,
      last_error: None,
    }
  }

  pub fn status(&self) -> ExchangeStatus {
    self.status
  }

  pub fn last_error(&self) -> Option<&str> {
    self.last_error.as_deref()
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
  }

  pub async fn submit(
    &mut self,
    store: &mut SessionStore,
    settings: &GenerationSettings,
    input: &str,
  ) -> SubmitOutcome {
    let trimmed = input.trim();
    if trimmed.is_empty() || self.status == ExchangeStatus::Sending {
      return SubmitOutcome::Skipped;
    }

    self.last_error = None;
    self.status = ExchangeStatus::Sending;

    store.append_to_current(vec![Message::user(trimmed, &settings.model)]);

    let system_message = match settings.system_message.trim() {
      "" => None,
      text => Some(text.to_string()),
    };
    let request = ChatRequest {
      messages: store.view().to_vec(),
      model: settings.model.clone(),
      temperature: settings.temperature,
      top_p: settings.top_p,
      max_tokens: settings.max_tokens,
      system_message,
    };

    let outcome = match self.call_relay(&request).await {
      Ok(reply) => {
        store.append_to_current(vec![assistant_message(reply, &settings.model)]);
        SubmitOutcome::Replied
      }
      Err(err) => {
        let message = err.to_string();
        self.last_error = Some(message.clone());
        let content = format!(
          "Sorry, I encountered an error: {message}. Please check your API configuration and try again."
        );
        store.append_to_current(vec![Message::assistant(content, &settings.model)]);
        SubmitOutcome::Errored
      }
    };

    self.status = ExchangeStatus::Idle;
    outcome
  }

  async fn call_relay(&self, request: &ChatRequest) -> Result<ChatResponse, ExchangeError> {
    let resp = self
      .http
      .post(format!("{}/v1/chat", self.relay_base))
      .json(request)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let text = resp.text().await.unwrap_or_default();
      let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
      return Err(ExchangeError::Api(message));
    }

    Ok(resp.json().await?)
  }
}

fn assistant_message(reply: ChatResponse, requested_model: &str) -> Message {
  let mut message = Message::assistant(reply.content, requested_model);
  if let Some(model) = reply.model {
    message.model = Some(model);
  }
  message.structured = reply.structured.filter(|s| !s.is_empty());
  message
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::Role;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn settings() -> GenerationSettings {
    GenerationSettings {
      system_message: String::new(),
      ..GenerationSettings::default()
    }
  }

  #[tokio::test]
  async fn whitespace_input_is_dropped_without_a_call() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1/chat"))
      .respond_with(ResponseTemplate::new(200))
      .expect(0)
      .mount(&relay)
      .await;

    let mut controller = ExchangeController::new(relay.uri());
    let mut store = SessionStore::new("gemini-2.0-flash");

    let outcome = controller.submit(&mut store, &settings(), "   \n\t").await;
    assert_eq!(outcome, SubmitOutcome::Skipped);
    assert!(store.view().is_empty());
    assert_eq!(controller.status(), ExchangeStatus::Idle);
    assert!(controller.last_error().is_none());
  }

  #[tokio::test]
  async fn successful_exchange_appends_user_and_assistant() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1/chat"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "content": "4",
        "model": "gemini-2.0-flash"
      })))
      .expect(1)
      .mount(&relay)
      .await;

    let mut controller = ExchangeController::new(relay.uri());
    let mut store = SessionStore::new("gemini-2.0-flash");

    let outcome = controller.submit(&mut store, &settings(), "  2+2?  ").await;
    assert_eq!(outcome, SubmitOutcome::Replied);
    assert_eq!(store.view().len(), 2);
    assert_eq!(store.view()[0].role, Role::User);
    assert_eq!(store.view()[0].content, "2+2?");
    assert_eq!(store.view()[1].role, Role::Assistant);
    assert_eq!(store.view()[1].content, "4");
    assert_eq!(store.view(), store.current().messages.as_slice());
    assert!(controller.last_error().is_none());
    assert_eq!(controller.status(), ExchangeStatus::Idle);
  }

  #[tokio::test]
  async fn failed_exchange_lands_in_the_transcript() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1/chat"))
      .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
        "error": "GEMINI_API_KEY not found in environment variables"
      })))
      .mount(&relay)
      .await;

    let mut controller = ExchangeController::new(relay.uri());
    let mut store = SessionStore::new("gemini-2.0-flash");

    let outcome = controller.submit(&mut store, &settings(), "2+2?").await;
    assert_eq!(outcome, SubmitOutcome::Errored);
    assert_eq!(store.view().len(), 2);
    assert_eq!(
      store.view()[1].content,
      "Sorry, I encountered an error: GEMINI_API_KEY not found in environment variables. \
       Please check your API configuration and try again."
    );
    assert_eq!(
      controller.last_error(),
      Some("GEMINI_API_KEY not found in environment variables")
    );
    assert_eq!(controller.status(), ExchangeStatus::Idle);
  }

  #[tokio::test]
  async fn request_carries_history_and_omits_blank_system_message() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1/chat"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "content": "noted"
      })))
      .mount(&relay)
      .await;

    let mut controller = ExchangeController::new(relay.uri());
    let mut store = SessionStore::new("gemini-2.0-flash");
    store.append_to_current(vec![
      Message::user("earlier question", "gemini-2.0-flash"),
      Message::assistant("earlier answer", "gemini-2.0-flash"),
    ]);

    let mut config = settings();
    config.system_message = "   ".to_string();
    controller.submit(&mut store, &config, "follow-up").await;

    let requests = relay.received_requests().await.expect("requests");
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).expect("sent body");
    assert_eq!(sent["messages"].as_array().expect("messages").len(), 3);
    assert_eq!(sent["messages"][2]["content"], "follow-up");
    assert!(sent.get("systemMessage").is_none());
    assert_eq!(sent["maxTokens"], 1000);
    assert_eq!(sent["topP"], 1.0);
  }

  #[tokio::test]
  async fn reported_model_overrides_the_requested_one() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1/chat"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "content": "hi",
        "model": "gemini-2.0-flash-001",
        "structured": { "summary": "greeting" }
      })))
      .mount(&relay)
      .await;

    let mut controller = ExchangeController::new(relay.uri());
    let mut store = SessionStore::new("gemini-2.0-flash");

    controller.submit(&mut store, &settings(), "hello").await;
    let assistant = &store.view()[1];
    assert_eq!(assistant.model.as_deref(), Some("gemini-2.0-flash-001"));
    let structured = assistant.structured.as_ref().expect("structured");
    assert_eq!(structured.summary.as_deref(), Some("greeting"));
  }

  #[tokio::test]
  async fn missing_reported_model_falls_back_to_requested() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1/chat"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "content": "hi"
      })))
      .mount(&relay)
      .await;

    let mut controller = ExchangeController::new(relay.uri());
    let mut store = SessionStore::new("gemini-2.0-flash");

    controller.submit(&mut store, &settings(), "hello").await;
    assert_eq!(store.view()[1].model.as_deref(), Some("gemini-2.0-flash"));
  }
}
