use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Exponential backoff for transient model failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub retries: usize,
    #[serde(with = "millis", rename = "initial_backoff_ms")]
    pub initial_backoff: Duration,
    #[serde(with = "millis", rename = "max_backoff_ms")]
    pub max_backoff: Duration,
}

impl RetryConfig {
    pub fn new(retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    pub fn none() -> Self {
        Self { retries: 0, ..Self::default() }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            initial_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(8000),
        }
    }
}

/// Run `f` until it succeeds, fails with a non-transient error, or the
/// retry budget is spent. The delay doubles after every retry.
pub async fn with_retries<T, F, Fut>(config: RetryConfig, mut f: F) -> Result<T, ModelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ModelError>>,
{
    let mut attempt = 0usize;
    let mut backoff = config.initial_backoff;

    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(err) => {
                if attempt >= config.retries || !err.is_transient() {
                    return Err(err);
                }
                attempt += 1;
                tracing::warn!(
                    attempt,
                    retries = config.retries,
                    delay_ms = backoff.as_millis() as u64,
                    "transient model failure, retrying: {err}"
                );
                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
}

pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
