//! UI-agnostic application state types
//!
//! This module contains data structures that are shared between the session
//! orchestrator and whatever front-end renders it. None of them depend on a
//! specific UI framework.

use serde::{Deserialize, Serialize};

use crate::router::RenderableContent;

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

/// Append-only, chronologically ordered message history.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    messages: Vec<ChatMessage>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
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

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

/// Immutable copy of everything the presentation layer draws.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub messages: Vec<ChatMessage>,
    /// Content routed from the most recent response, if any.
    pub content: Option<RenderableContent>,
    /// HTML document currently shown in the preview pane.
    pub preview_document: String,
    /// Text shown in the editable raw-content pane.
    pub raw_content: String,
    pub generating: bool,
    /// False when no backend session could be established at startup.
    pub ready: bool,
}
