//! Hugging Face Inference API backend (text generation task).
//!
//! `POST {api_url}/{model}` with `{"inputs": prompt, "parameters": {...}}`,
//! answered by `[{"generated_text": "..."}]`. A cold model answers 503 while
//! it loads, which the status classification treats as transient.

use async_trait::async_trait;
use chatrelay_core::{Backend, BackendError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http;

pub struct HuggingFaceBackend {
    name: String,
    api_url: String,
    api_token: String,
    model: String,
    max_new_tokens: u32,
    client: reqwest::Client,
}

impl HuggingFaceBackend {
    pub fn new(
        name: impl Into<String>,
        api_url: impl Into<String>,
        api_token: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            model: model.into(),
            max_new_tokens: 512,
            client: http::client(),
        }
    }

    pub fn with_max_new_tokens(mut self, max_new_tokens: u32) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.api_url, self.model)
    }

    fn request_body<'a>(&self, prompt: &'a str) -> GenerationRequest<'a> {
        GenerationRequest {
            inputs: prompt,
            parameters: GenerationParameters {
                max_new_tokens: self.max_new_tokens,
                return_full_text: false,
            },
        }
    }

    fn extract_text(&self, outputs: Vec<GeneratedText>) -> Result<String, BackendError> {
        outputs
            .into_iter()
            .next()
            .map(|o| o.generated_text.trim().to_string())
            .ok_or_else(|| http::decode_error(&self.name, "empty generation list"))
    }
}

#[async_trait]
impl Backend for HuggingFaceBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> std::result::Result<String, BackendError> {
        debug!(backend = %self.name, model = %self.model, prompt_chars = prompt.chars().count(), "Sending text generation request");

        let mut request = self.client.post(self.endpoint()).json(&self.request_body(prompt));
        if !self.api_token.is_empty() {
            request = request.bearer_auth(&self.api_token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| http::send_error(&self.name, e))?;

        let response = http::check_status(&self.name, response).await?;

        let outputs: Vec<GeneratedText> = response
            .json()
            .await
            .map_err(|e| http::decode_error(&self.name, e))?;

        self.extract_text(outputs)
    }
}

// --- API wire types ---

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    max_new_tokens: u32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}
