use async_trait::async_trait;

use crate::error::BackendError;

/// An inline image returned by the backend. `data` stays base64-encoded,
/// exactly as it came over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    pub mime_type: String,
    pub data: String,
}

/// One answer from the generative-AI backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResponse {
    pub text: String,
    pub images: Vec<ImagePart>,
}

impl GenerationResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn first_image(&self) -> Option<&ImagePart> {
        self.images.first()
    }
}

/// A conversational backend session. Implementations keep whatever
/// multi-turn state they need behind `&self`.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send_message(&self, prompt: &str) -> Result<GenerationResponse, BackendError>;

    /// Name shown in the UI title bar.
    fn model_name(&self) -> &str;
}
