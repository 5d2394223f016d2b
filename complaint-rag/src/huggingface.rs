//! Hugging Face Inference API backends for embedding and generation.
//!
//! This module is only available when the `huggingface` feature is enabled.
//! Both backends are constructed eagerly: a bad model id, an unusable base URL,
//! or an HTTP client that cannot be built fails at construction rather than on
//! first use. Call `verify` after configuring a backend to also confirm that
//! the model exists and the token may use it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use reqwest::StatusCode;
use tracing::{debug, error, warn};

use crate::embedding::{EmbeddingProvider, model_dimensions};
use crate::error::{RagError, Result};
use crate::generation::{GenerationConfig, Generator};
use crate::retry::RetryPolicy;

/// The default Inference API base URL.
pub const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/hf-inference";

/// Environment variable holding the access token.
pub const TOKEN_ENV: &str = "HF_TOKEN";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const EMBEDDING_PROVIDER: &str = "HuggingFace";
const GENERATION_PROVIDER: &str = "HuggingFace";

/// Connection settings shared by both backends.
#[derive(Clone)]
struct Endpoint {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl Endpoint {
    fn new() -> Result<Self> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    fn set_base_url(&mut self, base_url: &str) -> Result<()> {
        reqwest::Url::parse(base_url).map_err(|e| {
            RagError::ConfigError(format!("invalid Hugging Face base URL '{base_url}': {e}"))
        })?;
        self.base_url = base_url.trim_end_matches('/').to_string();
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.client = build_client(timeout)?;
        self.timeout = timeout;
        Ok(())
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.post(url))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Look `model` up once. A missing model, a rejected token, or an
    /// unreachable server is a configuration error. A model that is still
    /// loading counts as available.
    async fn check_model(&self, provider: &str, model: &str) -> Result<()> {
        let url = format!("{}/models/{model}", self.base_url);
        let response = self.authorize(self.client.get(&url)).send().await.map_err(|e| {
            error!(provider, error = %e, "model lookup failed");
            RagError::ConfigError(format!("cannot reach model '{model}': {e}"))
        })?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                error!(provider, %status, model, "model unavailable");
                Err(RagError::ConfigError(format!(
                    "model '{model}' is unavailable ({status}): {}",
                    error_detail(body)
                )))
            }
            status if status.is_success() => {
                debug!(provider, model, "model available");
                Ok(())
            }
            status => {
                warn!(provider, %status, model, "model lookup inconclusive");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RagError::ConfigError(format!("failed to build HTTP client: {e}")))
}

fn token_from_env() -> Option<String> {
    std::env::var(TOKEN_ENV).ok().filter(|token| !token.trim().is_empty())
}

fn require_model(model: String) -> Result<String> {
    if model.trim().is_empty() {
        return Err(RagError::ConfigError("model identifier must not be empty".into()));
    }
    Ok(model)
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Pull the `error` field out of an API error body, falling back to the body.
fn error_detail(body: String) -> String {
    serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body)
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by the feature-extraction pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use complaint_rag::huggingface::HuggingFaceEmbeddingProvider;
///
/// let provider = HuggingFaceEmbeddingProvider::new("sentence-transformers/all-MiniLM-L6-v2")?
///     .with_token(std::env::var("HF_TOKEN").ok());
/// let vectors = provider.embed_batch(&["overdraft fee"]).await?;
/// ```
#[derive(Debug, Clone)]
pub struct HuggingFaceEmbeddingProvider {
    endpoint: Endpoint,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a [&'a str],
    options: RequestOptions,
}

#[derive(Serialize)]
struct RequestOptions {
    wait_for_model: bool,
}

impl HuggingFaceEmbeddingProvider {
    /// Create a provider for a known sentence-embedding model.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the model id is empty or its
    /// dimension is unknown; use [`custom`](Self::custom) for other models.
    pub fn new(model: impl Into<String>) -> Result<Self> {
        let model = require_model(model.into())?;
        let dimensions = model_dimensions(&model).ok_or_else(|| {
            RagError::ConfigError(format!(
                "unknown embedding model '{model}'; declare its dimension explicitly"
            ))
        })?;
        Self::custom(model, dimensions)
    }

    /// Create a provider for any model with an explicitly declared dimension.
    pub fn custom(model: impl Into<String>, dimensions: usize) -> Result<Self> {
        let model = require_model(model.into())?;
        if dimensions == 0 {
            return Err(RagError::ConfigError(
                "embedding dimensions must be greater than zero".into(),
            ));
        }
        Ok(Self { endpoint: Endpoint::new()?, model, dimensions })
    }

    /// Create a provider for a known model, reading the token from `HF_TOKEN`.
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        Ok(Self::new(model)?.with_token(token_from_env()))
    }

    /// Set (or clear) the bearer token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.endpoint.token = token;
        self
    }

    /// Point the provider at another Inference API deployment.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.endpoint.set_base_url(base_url)?;
        Ok(self)
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.endpoint.set_timeout(timeout)?;
        Ok(self)
    }

    /// Confirm the model is served and the token may use it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the model is unknown (404), the
    /// token is rejected (401/403), or the server cannot be reached.
    pub async fn verify(self) -> Result<Self> {
        self.endpoint.check_model(EMBEDDING_PROVIDER, &self.model).await?;
        Ok(self)
    }

    /// The model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/models/{}/pipeline/feature-extraction", self.endpoint.base_url, self.model)
    }

    fn failure(&self, message: String) -> RagError {
        RagError::EmbeddingError { provider: EMBEDDING_PROVIDER.into(), message }
    }
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbeddingProvider {
    fn name(&self) -> &str {
        EMBEDDING_PROVIDER
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| self.failure("API returned empty response".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = EMBEDDING_PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let request_body = FeatureExtractionRequest {
            inputs: texts,
            options: RequestOptions { wait_for_model: true },
        };

        let response =
            self.endpoint.post(&self.url()).json(&request_body).send().await.map_err(|e| {
                error!(provider = EMBEDDING_PROVIDER, error = %e, "request failed");
                self.failure(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(provider = EMBEDDING_PROVIDER, %status, "API error");
            return Err(self.failure(format!("API returned {status}: {}", error_detail(body))));
        }

        response.json::<Vec<Vec<f32>>>().await.map_err(|e| {
            error!(provider = EMBEDDING_PROVIDER, error = %e, "failed to parse response");
            self.failure(format!("failed to parse response: {e}"))
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── Generation ─────────────────────────────────────────────────────

/// A [`Generator`] backed by the text-generation / text2text pipeline.
///
/// Network failures, timeouts, HTTP 429 and 5xx responses are retried under
/// the configured [`RetryPolicy`]; other client errors fail immediately.
///
/// # Example
///
/// ```rust,ignore
/// use complaint_rag::huggingface::HuggingFaceGenerator;
///
/// let generator = HuggingFaceGenerator::from_env("google/flan-t5-base")?;
/// let raw = generator.generate(&prompt, &GenerationConfig::default()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct HuggingFaceGenerator {
    endpoint: Endpoint,
    model: String,
    retry: RetryPolicy,
}

impl HuggingFaceGenerator {
    /// Create a generator for `model`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the model id is empty or the HTTP
    /// client cannot be built.
    pub fn new(model: impl Into<String>) -> Result<Self> {
        let model = require_model(model.into())?;
        Ok(Self { endpoint: Endpoint::new()?, model, retry: RetryPolicy::default() })
    }

    /// Create a generator, reading the token from `HF_TOKEN`.
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        Ok(Self::new(model)?.with_token(token_from_env()))
    }

    /// Set (or clear) the bearer token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.endpoint.token = token;
        self
    }

    /// Point the generator at another Inference API deployment.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.endpoint.set_base_url(base_url)?;
        Ok(self)
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.endpoint.set_timeout(timeout)?;
        Ok(self)
    }

    /// Set the retry policy for transient failures.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Confirm the model is served and the token may use it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the model is unknown (404), the
    /// token is rejected (401/403), or the server cannot be reached.
    pub async fn verify(self) -> Result<Self> {
        self.endpoint.check_model(GENERATION_PROVIDER, &self.model).await?;
        Ok(self)
    }

    /// The model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_once(&self, prompt: &str, config: &GenerationConfig) -> Result<Value> {
        let url = format!("{}/models/{}", self.endpoint.base_url, self.model);
        let body = json!({
            "inputs": prompt,
            "parameters": { "max_new_tokens": config.max_new_tokens },
        });

        let response = self.endpoint.post(&url).json(&body).send().await.map_err(|e| {
            error!(provider = GENERATION_PROVIDER, error = %e, "request failed");
            RagError::GenerationError {
                provider: GENERATION_PROVIDER.into(),
                message: format!("request failed: {e}"),
                retryable: true,
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| RagError::GenerationError {
            provider: GENERATION_PROVIDER.into(),
            message: format!("failed to read response body: {e}"),
            retryable: true,
        })?;

        if !status.is_success() {
            error!(provider = GENERATION_PROVIDER, %status, "API error");
            return Err(RagError::GenerationError {
                provider: GENERATION_PROVIDER.into(),
                message: format!("API returned {status}: {}", error_detail(text)),
                retryable: status.as_u16() == 429 || status.is_server_error(),
            });
        }

        // A body that is not JSON is still an answer.
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[async_trait]
impl Generator for HuggingFaceGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<Value> {
        debug!(
            provider = GENERATION_PROVIDER,
            model = %self.model,
            prompt_len = prompt.len(),
            max_new_tokens = config.max_new_tokens,
            "generating"
        );
        self.retry.execute(|| self.send_once(prompt, config)).await
    }
}
