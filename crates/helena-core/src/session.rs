//! Session orchestration
//!
//! [`Session`] owns the conversation, the current preview and the single
//! in-flight request. Front-ends call [`Session::submit`] from a spawned
//! task and draw from [`Session::snapshot`]; the state lock is never held
//! across an `.await`, so the UI stays responsive while a request is out.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::ChatBackend;
use crate::router::{self, ContentKind, RenderableContent};
use crate::state::{ChatMessage, ConversationLog, SessionSnapshot};

pub const GREETING_MESSAGE: &str = "Greetings! I am Helena, your digital writer, app creator and 3D/4K image editor. What shall we create today?";
pub const CONFIG_ERROR_MESSAGE: &str = "ERROR: Failed to load the Gemini system.";
pub const WORKING_MESSAGE: &str = "Helena is working on your creation...";
pub const DONE_MESSAGE: &str = "Creation complete! See the result in the preview.";

/// Why a prompt was dropped without touching the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyPrompt,
    NotConfigured,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Generated(ContentKind),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Ignored(IgnoreReason),
    Completed(Outcome),
}

struct SessionState {
    log: ConversationLog,
    content: Option<RenderableContent>,
    preview_document: String,
    raw_content: String,
    generating: bool,
}

struct Inner {
    backend: Option<Arc<dyn ChatBackend>>,
    state: Mutex<SessionState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the generation flag when dropped, whether the request finished,
/// failed, or its future was dropped mid-flight.
struct InFlight<'a> {
    inner: &'a Inner,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.inner.lock().generating = false;
    }
}

/// Cheap to clone; all clones share the same conversation.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Start a session. Without a backend the session records a single
    /// configuration error message and ignores every prompt.
    pub fn new(backend: Option<Arc<dyn ChatBackend>>) -> Self {
        let mut history = ConversationLog::new();
        match backend {
            Some(ref backend) => {
                log::info!("Session started with model {}", backend.model_name());
                history.append(ChatMessage::assistant(GREETING_MESSAGE));
            }
            None => {
                log::error!("No Gemini backend configured; session is inert");
                history.append(ChatMessage::assistant(CONFIG_ERROR_MESSAGE));
            }
        }

        Self {
            inner: Arc::new(Inner {
                backend,
                state: Mutex::new(SessionState {
                    log: history,
                    content: None,
                    preview_document: router::welcome_document(),
                    raw_content: String::new(),
                    generating: false,
                }),
            }),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.backend.is_some()
    }

    pub fn is_generating(&self) -> bool {
        self.inner.lock().generating
    }

    pub fn model_name(&self) -> Option<String> {
        self.inner
            .backend
            .as_ref()
            .map(|b| b.model_name().to_string())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.lock();
        SessionSnapshot {
            messages: state.log.messages().to_vec(),
            content: state.content.clone(),
            preview_document: state.preview_document.clone(),
            raw_content: state.raw_content.clone(),
            generating: state.generating,
            ready: self.is_ready(),
        }
    }

    /// Send one prompt to the backend and record the result.
    ///
    /// At most one request is in flight; prompts arriving meanwhile are
    /// dropped, not queued. The user's prompt and a working notice are
    /// logged before the request goes out, so they stay visible even if it
    /// fails.
    pub async fn submit(&self, prompt: &str) -> Submission {
        if prompt.trim().is_empty() {
            return Submission::Ignored(IgnoreReason::EmptyPrompt);
        }
        let Some(backend) = self.inner.backend.clone() else {
            log::debug!("Prompt ignored: no backend session");
            return Submission::Ignored(IgnoreReason::NotConfigured);
        };

        let guard = {
            let mut state = self.inner.lock();
            if state.generating {
                log::debug!("Prompt ignored: a request is already in flight");
                return Submission::Ignored(IgnoreReason::Busy);
            }
            state.log.append(ChatMessage::user(prompt));
            state.generating = true;
            state.log.append(ChatMessage::assistant(WORKING_MESSAGE));
            InFlight { inner: &self.inner }
        };

        log::info!("Sending prompt ({} chars) to {}", prompt.len(), backend.model_name());

        let outcome = match backend.send_message(prompt).await {
            Ok(response) => {
                let content = router::route(&response);
                let kind = content.kind();
                let raw = response.text.trim().to_string();

                let mut state = self.inner.lock();
                let message = match kind {
                    ContentKind::Image => format!("Image generated successfully! ({})", raw),
                    ContentKind::Markup | ContentKind::Text => DONE_MESSAGE.to_string(),
                };
                state.preview_document = content.preview_document();
                state.content = Some(content);
                state.log.append(ChatMessage::assistant(message));
                state.raw_content = raw;

                log::info!("Generation finished: {:?}", kind);
                Outcome::Generated(kind)
            }
            Err(e) => {
                let description = e.to_string();
                log::error!("Gemini generation failed: {}", description);

                let mut state = self.inner.lock();
                state.log.append(ChatMessage::assistant(format!(
                    "Failed to communicate with the AI. Error: {}. Try again.",
                    description
                )));
                state.content = None;
                state.preview_document = router::error_document(&description);
                Outcome::Failed(description)
            }
        };

        drop(guard);
        Submission::Completed(outcome)
    }

    /// Replace the raw-content pane and re-render the preview from it.
    pub fn edit_raw_content(&self, text: impl Into<String>) {
        let text = text.into();
        let content = router::classify(&text, None);

        let mut state = self.inner.lock();
        state.preview_document = content.preview_document();
        state.content = Some(content);
        state.raw_content = text;
    }
}
