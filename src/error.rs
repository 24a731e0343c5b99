use thiserror::Error;

use crate::validate::Violation;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("the root type must describe itself as a named record or alias, got {annotation}")]
    UnnamedRoot { annotation: String },
}

/// The language model boundary failed.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("REST API error {status}: {reason}")]
    Http { status: u16, reason: String },
    #[error("request to the model endpoint failed: {message}")]
    Transport { message: String, transient: bool },
    #[error("REST API unexpected response format: {0}")]
    UnexpectedResponse(String),
    /// Failures reported by other backends.
    #[error("{0}")]
    Backend(String),
}

impl ModelError {
    /// Rate limiting, temporary unavailability, gateway and timeout classes.
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Http { status, .. } => is_transient_status(*status),
            ModelError::Transport { transient, .. } => *transient,
            ModelError::UnexpectedResponse(_) | ModelError::Backend(_) => false,
        }
    }
}

pub fn is_transient_status(status: u16) -> bool {
    matches!(
        status,
        429 // TooManyRequests
        | 500 // InternalServerError
        | 502 // BadGateway
        | 503 // ServiceUnavailable
        | 504 // GatewayTimeout
    )
}

/// Data did not pass the validator. `Display` is the caller-visible message.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Failed to parse JSON: {0}")]
    Parse(String),
    #[error("{message}")]
    Shape {
        message: String,
        violations: Vec<Violation>,
    },
    /// Shape was fine but the value did not convert into the Rust type.
    #[error("at JSON path {path} → {message}")]
    Deserialize { path: String, message: String },
}

#[derive(Debug, Clone, Error)]
pub enum TranslateError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Response did not contain any text resembling JSON.\nResponse was:\n{response}")]
    Extraction { response: String },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl TranslateError {
    /// Extraction and validation failures can be fed back to the model.
    pub fn is_repairable(&self) -> bool {
        !matches!(self, TranslateError::Model(_))
    }
}
