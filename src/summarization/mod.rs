//! Abstractive summarization behind a stable `text, preset -> summary` interface.
//!
//! [`SummarizationClient`] owns the model handle. The handle is created on first use through a
//! [`ModelLoader`] and then shared by every request; a failed load leaves the slot empty so the
//! next call tries again. The Ollama-backed loader lives in [`ollama`].

pub mod ollama;

use crate::config::Config;
use async_trait::async_trait;
use serde::Serialize;
use std::{fmt, str::FromStr, sync::Arc};
use thiserror::Error;
use tokio::sync::OnceCell;

/// Token budget passed to the generative model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationParams {
    /// Minimum summary length in tokens.
    pub min_length: u32,
    /// Maximum summary length in tokens.
    pub max_length: u32,
}

/// Summary length presets accepted by the upload endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthPreset {
    /// 10 to 60 tokens.
    Short,
    /// 40 to 150 tokens.
    #[default]
    Medium,
    /// 80 to 300 tokens.
    Long,
}

impl LengthPreset {
    /// Every preset, shortest first.
    pub const ALL: [Self; 3] = [Self::Short, Self::Medium, Self::Long];

    /// Token budget for this preset.
    pub const fn params(self) -> GenerationParams {
        match self {
            Self::Short => GenerationParams {
                min_length: 10,
                max_length: 60,
            },
            Self::Medium => GenerationParams {
                min_length: 40,
                max_length: 150,
            },
            Self::Long => GenerationParams {
                min_length: 80,
                max_length: 300,
            },
        }
    }

    /// Lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }
}

impl fmt::Display for LengthPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LengthPreset {
    type Err = SummarizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            _ => Err(SummarizationError::InvalidPreset(s.to_string())),
        }
    }
}

/// Failures raised by a model backend while loading or generating.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Runtime could not be reached or refused the request.
    #[error("Summarization provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Runtime does not know the configured model.
    #[error("Model '{0}' not found")]
    ModelNotFound(String),
    /// Runtime returned an error while generating.
    #[error("Failed to generate summary: {0}")]
    GenerationFailed(String),
    /// Runtime response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// Generation finished without any text.
    #[error("Summarizer returned no summary")]
    EmptyOutput,
}

/// Errors surfaced by [`Summarizer::summarize`].
#[derive(Debug, Error)]
pub enum SummarizationError {
    /// Length preset name is not `short`, `medium` or `long`.
    #[error("Invalid length preset '{0}'; expected one of: short, medium, long")]
    InvalidPreset(String),
    /// Input text was empty or whitespace.
    #[error("No text provided for summarization")]
    EmptyInput,
    /// Model handle could not be initialized.
    #[error("Failed to load summarization model '{model}': {source}")]
    ModelUnavailable {
        /// Model identifier that failed to load.
        model: String,
        /// Loader failure.
        #[source]
        source: ModelError,
    },
    /// Model invocation failed or produced nothing usable.
    #[error("Summarization failed: {0}")]
    SummarizationFailed(#[source] ModelError),
}

/// Interface used by the upload pipeline to summarize extracted text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `text` within the token budget of `preset`.
    async fn summarize(&self, text: &str, preset: LengthPreset)
    -> Result<String, SummarizationError>;
}

/// A loaded model ready for inference.
#[async_trait]
pub trait SummarizationModel: Send + Sync {
    /// Run the model, returning one or more output chunks.
    async fn generate(
        &self,
        text: &str,
        params: GenerationParams,
    ) -> Result<Vec<String>, ModelError>;
}

/// Creates model handles; invoked lazily by [`SummarizationClient`].
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Identifier of the model this loader produces.
    fn model_name(&self) -> &str;

    /// Initialize the model. Expensive; called at most once per successful load.
    async fn load(&self) -> Result<Arc<dyn SummarizationModel>, ModelError>;
}

/// Lazily-initialized, process-wide summarization handle.
pub struct SummarizationClient {
    loader: Box<dyn ModelLoader>,
    model: OnceCell<Arc<dyn SummarizationModel>>,
}

impl SummarizationClient {
    /// Wrap a loader; nothing is loaded until the first summary is requested.
    pub fn new(loader: Box<dyn ModelLoader>) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
        }
    }

    /// Build a client backed by the Ollama runtime described in `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Box::new(ollama::OllamaLoader::new(
            config.ollama_url.clone(),
            config.summarizer_model.clone(),
            config.summarizer_max_input_chars,
        )))
    }

    /// Whether the model handle has been initialized.
    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    async fn model(&self) -> Result<Arc<dyn SummarizationModel>, SummarizationError> {
        let model = self
            .model
            .get_or_try_init(|| async {
                tracing::info!(model = self.loader.model_name(), "Loading summarization model");
                let model = self.loader.load().await?;
                tracing::info!(model = self.loader.model_name(), "Summarization model ready");
                Ok::<_, ModelError>(model)
            })
            .await
            .map_err(|source: ModelError| {
                tracing::warn!(
                    model = self.loader.model_name(),
                    error = %source,
                    "Summarization model failed to load"
                );
                SummarizationError::ModelUnavailable {
                    model: self.loader.model_name().to_string(),
                    source,
                }
            })?;
        Ok(Arc::clone(model))
    }
}

#[async_trait]
impl Summarizer for SummarizationClient {
    async fn summarize(
        &self,
        text: &str,
        preset: LengthPreset,
    ) -> Result<String, SummarizationError> {
        if text.trim().is_empty() {
            return Err(SummarizationError::EmptyInput);
        }

        let model = self.model().await?;
        let params = preset.params();
        tracing::debug!(
            %preset,
            min_length = params.min_length,
            max_length = params.max_length,
            chars = text.len(),
            "Generating summary"
        );
        let chunks = model
            .generate(text, params)
            .await
            .map_err(SummarizationError::SummarizationFailed)?;

        combine_chunks(&chunks)
            .ok_or(SummarizationError::SummarizationFailed(ModelError::EmptyOutput))
    }
}

fn combine_chunks(chunks: &[String]) -> Option<String> {
    let combined = chunks
        .iter()
        .map(|chunk| chunk.trim())
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!combined.is_empty()).then_some(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    struct EchoModel {
        output: Vec<String>,
        seen: Arc<Mutex<Vec<GenerationParams>>>,
    }

    #[async_trait]
    impl SummarizationModel for EchoModel {
        async fn generate(
            &self,
            _text: &str,
            params: GenerationParams,
        ) -> Result<Vec<String>, ModelError> {
            self.seen.lock().await.push(params);
            Ok(self.output.clone())
        }
    }

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
        failures_before_success: usize,
        delay: Duration,
        output: Vec<String>,
        seen: Arc<Mutex<Vec<GenerationParams>>>,
    }

    impl CountingLoader {
        fn new(output: &[&str]) -> Self {
            Self {
                loads: Arc::new(AtomicUsize::new(0)),
                failures_before_success: 0,
                delay: Duration::ZERO,
                output: output.iter().map(|chunk| chunk.to_string()).collect(),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl ModelLoader for CountingLoader {
        fn model_name(&self) -> &str {
            "test-model"
        }

        async fn load(&self) -> Result<Arc<dyn SummarizationModel>, ModelError> {
            let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if attempt < self.failures_before_success {
                return Err(ModelError::ModelNotFound("test-model".into()));
            }
            Ok(Arc::new(EchoModel {
                output: self.output.clone(),
                seen: self.seen.clone(),
            }))
        }
    }

    #[test]
    fn presets_parse_case_insensitively() {
        assert_eq!("SHORT".parse::<LengthPreset>().unwrap(), LengthPreset::Short);
        assert_eq!(" medium ".parse::<LengthPreset>().unwrap(), LengthPreset::Medium);
        assert_eq!("Long".parse::<LengthPreset>().unwrap(), LengthPreset::Long);
        let error = "tiny".parse::<LengthPreset>().unwrap_err();
        assert!(matches!(error, SummarizationError::InvalidPreset(ref name) if name == "tiny"));
    }

    #[test]
    fn presets_map_to_fixed_budgets() {
        let budgets: Vec<(u32, u32)> = LengthPreset::ALL
            .iter()
            .map(|preset| (preset.params().min_length, preset.params().max_length))
            .collect();
        assert_eq!(budgets, vec![(10, 60), (40, 150), (80, 300)]);
    }

    #[test]
    fn chunks_are_trimmed_and_joined() {
        let chunks = vec![" first ".to_string(), "   ".to_string(), "second\n".to_string()];
        assert_eq!(combine_chunks(&chunks).as_deref(), Some("first\nsecond"));
        assert_eq!(combine_chunks(&[" ".to_string()]), None);
        assert_eq!(combine_chunks(&[]), None);
    }

    #[tokio::test]
    async fn empty_input_never_touches_the_model() {
        let loader = CountingLoader::new(&["unused"]);
        let loads = loader.loads.clone();
        let client = SummarizationClient::new(Box::new(loader));

        let error = client
            .summarize("  \n ", LengthPreset::Short)
            .await
            .expect_err("empty input");
        assert!(matches!(error, SummarizationError::EmptyInput));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert!(!client.is_loaded());
    }

    #[tokio::test]
    async fn passes_preset_budget_to_model() {
        let loader = CountingLoader::new(&["A summary."]);
        let seen = loader.seen.clone();
        let client = SummarizationClient::new(Box::new(loader));

        let summary = client
            .summarize("Some longish text to summarize.", LengthPreset::Long)
            .await
            .expect("summary");
        assert_eq!(summary, "A summary.");
        assert_eq!(seen.lock().await.as_slice(), &[LengthPreset::Long.params()]);
    }

    #[tokio::test]
    async fn concurrent_first_use_loads_once() {
        let mut loader = CountingLoader::new(&["shared"]);
        loader.delay = Duration::from_millis(50);
        let loads = loader.loads.clone();
        let client = Arc::new(SummarizationClient::new(Box::new(loader)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                client.summarize("text", LengthPreset::Medium).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.expect("join").expect("summary"), "shared");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn load_failure_is_not_cached() {
        let mut loader = CountingLoader::new(&["recovered"]);
        loader.failures_before_success = 1;
        let loads = loader.loads.clone();
        let client = SummarizationClient::new(Box::new(loader));

        let error = client
            .summarize("text", LengthPreset::Short)
            .await
            .expect_err("first load fails");
        assert!(matches!(
            error,
            SummarizationError::ModelUnavailable { ref model, .. } if model == "test-model"
        ));
        assert!(!client.is_loaded());

        let summary = client
            .summarize("text", LengthPreset::Short)
            .await
            .expect("second load succeeds");
        assert_eq!(summary, "recovered");
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn blank_model_output_is_a_failure() {
        let client = SummarizationClient::new(Box::new(CountingLoader::new(&["", "  "])));
        let error = client
            .summarize("text", LengthPreset::Medium)
            .await
            .expect_err("blank output");
        assert!(matches!(
            error,
            SummarizationError::SummarizationFailed(ModelError::EmptyOutput)
        ));
    }
}
