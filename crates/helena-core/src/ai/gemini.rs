use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::backend::{ChatBackend, GenerationResponse, ImagePart};
use crate::error::BackendError;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub const SYSTEM_PROMPT: &str = "You are Helena, a digital writer, editor and app builder, and a 3D/4K image editor. \
Your mission is to produce very high quality content without delay.
1. If the user asks to generate an image, create a 4K cover or uses terms like '3D' or 'sharp photo', use the image generation capability.
2. If the user asks for a complete app ready to install, produce a complete and detailed project.
3. For apps, the answer MUST contain everything included, installation instructions, detailed files and the main content.
4. For images, the answer MUST be ONLY the image description for the chat plus the generated image.
5. NEVER include any explanation, header or text BEFORE the main content (book or image).";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part {
                text: Some(text.to_string()),
                inline_data: None,
            }],
        }
    }
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<&'static str>,
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    #[serde(rename = "systemInstruction")]
    system_instruction: Content,
    contents: &'a [Content],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

/// A Gemini chat session. Keeps the multi-turn history so every prompt is
/// answered in the context of the conversation so far.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    history: Mutex<Vec<Content>>,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub async fn history_len(&self) -> usize {
        self.history.lock().await.len()
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gemini-2.5-flash".to_string(),
            "gemini-2.5-flash-image".to_string(),
            "gemini-2.5-pro".to_string(),
        ]
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn send_message(&self, prompt: &str) -> Result<GenerationResponse, BackendError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        // Held for the whole turn so two turns never interleave in history.
        let mut history = self.history.lock().await;
        let mut contents = history.clone();
        contents.push(Content::text("user", prompt));

        let request = GeminiRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: Some(SYSTEM_PROMPT.to_string()),
                    inline_data: None,
                }],
            },
            contents: &contents,
            generation_config: GenerationConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
            },
        };

        log::debug!("POST {} ({} turns)", url, contents.len());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let content = gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or_else(|| BackendError::MalformedResponse("no candidates in response".to_string()))?;

        let mut result = GenerationResponse::default();
        for part in &content.parts {
            if let Some(text) = &part.text {
                result.text.push_str(text);
            }
            if let Some(inline) = &part.inline_data {
                if inline.mime_type.starts_with("image/") {
                    result.images.push(ImagePart {
                        mime_type: inline.mime_type.clone(),
                        data: inline.data.clone(),
                    });
                }
            }
        }

        contents.push(Content {
            role: Some("model".to_string()),
            parts: content.parts,
        });
        *history = contents;

        Ok(result)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
