use chrono::Utc;
use uuid::Uuid;

use crate::models::{ChatSession, Message};

/// Sessions plus the working copy the terminal renders; operations update
/// both sides, so the copy and the stored log never diverge.
pub struct SessionStore {
  sessions: Vec<ChatSession>,
  current: usize,
  view: Vec<Message>,
}

impl SessionStore {
  pub fn new(model: &str) -> Self {
    let first = ChatSession {
      id: Uuid::new_v4(),
      name: "New Chat".to_string(),
      messages: Vec::new(),
      created_at: Utc::now(),
      model: model.to_string(),
    };
    Self {
      sessions: vec![first],
      current: 0,
      view: Vec::new(),
    }
  }

  pub fn sessions(&self) -> &[ChatSession] {
    &self.sessions
  }

  pub fn current(&self) -> &ChatSession {
    &self.sessions[self.current]
  }

  pub fn view(&self) -> &[Message] {
    &self.view
  }

  pub fn create_session(&mut self, model: &str) -> Uuid {
    let session = ChatSession {
      id: Uuid::new_v4(),
      name: format!("Chat {}", self.sessions.len() + 1),
      messages: Vec::new(),
      created_at: Utc::now(),
      model: model.to_string(),
    };
    let id = session.id;
    self.sessions.push(session);
    self.current = self.sessions.len() - 1;
    self.view.clear();
    id
  }

  pub fn switch_session(&mut self, id: Uuid) -> bool {
    match self.sessions.iter().position(|s| s.id == id) {
      Some(idx) => {
        self.current = idx;
        self.view = self.sessions[idx].messages.clone();
        true
      }
      None => false,
    }
  }

  pub fn clear_current(&mut self) {
    self.view.clear();
    self.sessions[self.current].messages.clear();
  }

  pub fn append_to_current(&mut self, messages: Vec<Message>) {
    self.view.extend(messages.iter().cloned());
    self.sessions[self.current].messages.extend(messages);
  }

  pub fn adopt_imported(&mut self, mut session: ChatSession) -> Uuid {
    session.id = Uuid::new_v4();
    session.name = format!("{} (Imported)", session.name);
    let id = session.id;
    self.view = session.messages.clone();
    self.sessions.push(session);
    self.current = self.sessions.len() - 1;
    id
  }
}
