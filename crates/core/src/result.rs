use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a fetch produced no payload.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("subscription failed: {0}")]
    Subscription(String),
    #[error("timeout: no message received within {waited_ms} ms")]
    Timeout { waited_ms: u64 },
    #[error("payload could not be decoded: {0}")]
    Decode(String),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl FetchError {
    /// Short label used for metrics and log fields.
    pub fn outcome(&self) -> &'static str {
        match self {
            FetchError::Connection(_) => "connection",
            FetchError::Subscription(_) => "subscription",
            FetchError::Timeout { .. } => "timeout",
            FetchError::Decode(_) => "decode",
            FetchError::Unexpected(_) => "unexpected",
        }
    }
}

/// Outcome of one single-shot fetch. Exactly one variant per invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FetchResult {
    /// Body parsed as a JSON object; keys keep document order.
    Structured(Map<String, Value>),
    /// Body is UTF-8 text that is not a JSON object, kept verbatim.
    Text(String),
    Error(FetchError),
}

impl FetchResult {
    pub fn outcome(&self) -> &'static str {
        match self {
            FetchResult::Structured(_) => "structured",
            FetchResult::Text(_) => "text",
            FetchResult::Error(e) => e.outcome(),
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            FetchResult::Error(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FetchError> for FetchResult {
    fn from(err: FetchError) -> Self {
        FetchResult::Error(err)
    }
}
