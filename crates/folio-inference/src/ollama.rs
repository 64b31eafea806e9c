//! Ollama generation backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use folio_core::{defaults, AppSettings, Error, GenerationBackend, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = defaults::OLLAMA_URL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = defaults::GEN_MODEL;

/// Generations slower than this are logged as slow.
const SLOW_GENERATION_MS: u64 = 30_000;

/// Ollama backend speaking `/api/tags` and `/api/generate`.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    gen_model: String,
    gen_timeout_secs: u64,
}

impl OllamaBackend {
    /// Backend for `base_url` with `gen_model` as the default model.
    pub fn with_config(
        base_url: impl Into<String>,
        gen_model: impl Into<String>,
        gen_timeout_secs: u64,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let gen_model = gen_model.into();
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "ollama",
            base_url = %base_url,
            model = %gen_model,
            timeout_secs = gen_timeout_secs,
            "Initializing Ollama backend"
        );

        Ok(Self {
            client,
            base_url,
            gen_model,
            gen_timeout_secs,
        })
    }

    /// Backend configured from the `ai_*` settings.
    pub fn from_settings(settings: &AppSettings) -> Result<Self> {
        Self::with_config(
            settings.ai_base_url.clone(),
            settings.ai_model.clone(),
            settings.ai_timeout_secs,
        )
    }

    /// Defaults with `FOLIO_AI_*` environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut settings = AppSettings::default();
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Self::from_settings(&settings)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn gen_timeout_secs(&self) -> u64 {
        self.gen_timeout_secs
    }

    /// Switch the default generation model.
    pub fn set_gen_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        info!(from = %self.gen_model, to = %model, "Switching generation model");
        self.gen_model = model;
    }

    async fn fetch_tags(&self, timeout_secs: u64) -> Result<TagsResponse> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!("Ollama returned {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Failed to parse model list: {}", e)))
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    #[instrument(skip(self, model, prompt), fields(
        subsystem = "inference",
        component = "ollama",
        op = "generate",
        model = model.unwrap_or(&self.gen_model),
        prompt_len = prompt.len(),
    ))]
    async fn generate(&self, model: Option<&str>, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let model = model.unwrap_or(&self.gen_model);

        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(Duration::from_secs(self.gen_timeout_secs))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!("Ollama returned {}: {}", status, body)));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))?;

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = result.response.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > SLOW_GENERATION_MS {
            warn!(
                duration_ms = elapsed,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(result.response)
    }

    #[instrument(skip(self), fields(subsystem = "inference", component = "ollama", op = "list_models"))]
    async fn list_models(&self) -> Result<Vec<String>> {
        let tags = self.fetch_tags(defaults::LIST_MODELS_TIMEOUT_SECS).await?;
        let models: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        debug!(result_count = models.len(), "Listed models");
        Ok(models)
    }

    async fn is_available(&self) -> bool {
        match self.fetch_tags(defaults::PROBE_TIMEOUT_SECS).await {
            Ok(_) => true,
            Err(e) => {
                debug!(
                    subsystem = "inference",
                    component = "ollama",
                    error = %e,
                    "Ollama not available"
                );
                false
            }
        }
    }

    fn default_model(&self) -> &str {
        &self.gen_model
    }
}
