//! Ollama-backed model loader.
//!
//! Loading asks the runtime to describe the configured model (`POST /api/show`) so a missing
//! model surfaces as a load failure instead of on every generation call.

use super::{GenerationParams, ModelError, ModelLoader, SummarizationModel};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const USER_AGENT: &str = "docdigest/summary";

/// Loader that verifies the model with the Ollama runtime and hands out an HTTP-backed handle.
pub struct OllamaLoader {
    base_url: String,
    model: String,
    max_input_chars: usize,
}

impl OllamaLoader {
    /// Create a loader for `model` served at `base_url`.
    pub fn new(base_url: String, model: String, max_input_chars: usize) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_input_chars,
        }
    }
}

#[async_trait]
impl ModelLoader for OllamaLoader {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn load(&self) -> Result<Arc<dyn SummarizationModel>, ModelError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|error| {
                ModelError::ProviderUnavailable(format!("failed to build HTTP client: {error}"))
            })?;

        let response = http
            .post(format!("{}/api/show", self.base_url))
            .json(&json!({ "model": self.model }))
            .send()
            .await
            .map_err(|error| {
                ModelError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ModelError::ModelNotFound(self.model.clone()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::ProviderUnavailable(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        Ok(Arc::new(OllamaModel {
            http,
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            max_input_chars: self.max_input_chars,
        }))
    }
}

struct OllamaModel {
    http: Client,
    base_url: String,
    model: String,
    max_input_chars: usize,
}

impl OllamaModel {
    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl SummarizationModel for OllamaModel {
    async fn generate(
        &self,
        text: &str,
        params: GenerationParams,
    ) -> Result<Vec<String>, ModelError> {
        let input = truncate_chars(text, self.max_input_chars);
        if input.len() < text.len() {
            tracing::debug!(
                original = text.len(),
                truncated = input.len(),
                "Truncated summarizer input"
            );
        }

        let payload = json!({
            "model": self.model,
            "prompt": build_prompt(input, params),
            "stream": false,
            "options": {
                "temperature": 0.1,
                "num_predict": params.max_length,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                ModelError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            ModelError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(ModelError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(vec![body.response])
    }
}

fn build_prompt(text: &str, params: GenerationParams) -> String {
    format!(
        "Summarize the following document in roughly {min} to {max} tokens. \
         Respond with the summary only.\n\n{text}",
        min = params.min_length,
        max = params.max_length,
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
