use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ControlError;
use crate::gemini::GenerativeBackend;

pub const GREETING: &str = "Hello. I am your mindfulness companion. How are you feeling today?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub timestamp: String,
}

pub fn now_iso() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            timestamp: now_iso(),
        }
    }
}

/// Append-only conversation log. Messages are never reordered or edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn with_greeting() -> Self {
        Self {
            messages: vec![ChatMessage::new(Role::Model, GREETING)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn append_turn(&mut self, user: ChatMessage, reply: ChatMessage) {
        self.messages.push(user);
        self.messages.push(reply);
    }
}

struct ChatState {
    transcript: Transcript,
    pending: bool,
}

/// Chat with the guide persona. One reply in flight at a time.
pub struct ChatSession<B> {
    backend: Arc<B>,
    state: Mutex<ChatState>,
}

impl<B: GenerativeBackend> ChatSession<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_transcript(backend, Transcript::with_greeting())
    }

    pub fn with_transcript(backend: Arc<B>, transcript: Transcript) -> Self {
        Self {
            backend,
            state: Mutex::new(ChatState {
                transcript,
                pending: false,
            }),
        }
    }

    pub fn transcript(&self) -> Transcript {
        self.lock().transcript.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().pending
    }

    /// Sends `text` with the full transcript as history. The user message and
    /// the reply are appended together, so a failed turn leaves no trace.
    pub async fn send(&self, text: &str) -> Result<ChatMessage, ControlError> {
        if text.trim().is_empty() {
            return Err(ControlError::EmptyMessage);
        }
        let history = {
            let mut st = self.lock();
            if st.pending {
                return Err(ControlError::Busy);
            }
            st.pending = true;
            st.transcript.messages.clone()
        };

        let user = ChatMessage::new(Role::User, text);
        let res = self.backend.chat(&history, text).await;

        let mut st = self.lock();
        st.pending = false;
        match res {
            Ok(reply_text) => {
                let reply = ChatMessage::new(Role::Model, reply_text);
                st.transcript.append_turn(user, reply.clone());
                info!(messages = st.transcript.len(), "chat turn recorded");
                Ok(reply)
            }
            Err(e) => {
                warn!(error = %e, "chat turn failed");
                Err(e.into())
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
