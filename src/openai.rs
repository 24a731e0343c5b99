//! OpenAI-compatible chat-completions backend (OpenAI and Azure OpenAI).
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ModelError;
use crate::model::{LanguageModel, PromptSection};
use crate::retry::{RetryConfig, millis, with_retries};

pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    #[default]
    Bearer,
    /// `api-key: <key>`
    AzureApiKey,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub endpoint: String,
    /// Omitted from the request body when unset (Azure deployments).
    pub model: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub auth: AuthStyle,
    pub organization: Option<String>,
    pub temperature: f64,
    pub retry: RetryConfig,
    #[serde(with = "millis", rename = "request_timeout_ms")]
    pub request_timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: OPENAI_ENDPOINT.to_string(),
            model: None,
            api_key: String::new(),
            auth: AuthStyle::Bearer,
            organization: None,
            temperature: 0.0,
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("ModelConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &api_key)
            .field("auth", &self.auth)
            .field("organization", &self.organization)
            .field("temperature", &self.temperature)
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ModelConfig {
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: Some(model.into()),
            ..Self::default()
        }
    }

    /// `endpoint` is the full deployment URL, including `api-version`.
    pub fn azure(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            auth: AuthStyle::AzureApiKey,
            ..Self::default()
        }
    }

    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// One `reqwest::Client` per model, reused across calls.
#[derive(Debug, Clone)]
pub struct OpenAiModel {
    config: ModelConfig,
    client: reqwest::Client,
}

impl OpenAiModel {
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ModelError::Transport { message: err.to_string(), transient: false })?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn request_body(&self, prompt: &[PromptSection]) -> Value {
        let mut body = json!({
            "messages": prompt,
            "temperature": self.config.temperature,
            "n": 1,
        });
        if let Some(model) = &self.config.model {
            body["model"] = Value::String(model.clone());
        }
        body
    }

    async fn complete_once(&self, prompt: &[PromptSection]) -> Result<String, ModelError> {
        let mut request = self.client.post(&self.config.endpoint).json(&self.request_body(prompt));
        request = match self.config.auth {
            AuthStyle::Bearer => request.bearer_auth(&self.config.api_key),
            AuthStyle::AzureApiKey => request.header("api-key", &self.config.api_key),
        };
        if let Some(organization) = &self.config.organization {
            request = request.header("OpenAI-Organization", organization);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), %body, "model endpoint returned an error");
            return Err(ModelError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown status").to_string(),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| ModelError::UnexpectedResponse(err.to_string()))?;
        message_content(&payload)
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(&self, prompt: &[PromptSection]) -> Result<String, ModelError> {
        tracing::debug!(
            model = self.model_name(),
            sections = prompt.len(),
            "requesting completion"
        );
        with_retries(self.config.retry, move || self.complete_once(prompt)).await
    }

    fn model_name(&self) -> &str {
        self.config.model.as_deref().unwrap_or("deployment")
    }
}

fn transport_error(err: reqwest::Error) -> ModelError {
    ModelError::Transport {
        transient: err.is_timeout() || err.is_connect(),
        message: err.to_string(),
    }
}

/// `choices[0].message.content`, which must be a string.
fn message_content(payload: &Value) -> Result<String, ModelError> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ModelError::UnexpectedResponse(payload.to_string()))
}
