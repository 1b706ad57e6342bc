//! Log subscription events exchanged over the socket.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Build a client wants to follow.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogTarget {
    pub job_name: String,
    #[serde(deserialize_with = "build_number")]
    pub build_number: u64,
}

/// Browsers send the build number as whatever the form field held.
fn build_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid build number '{s}'"))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    SubscribeLog(LogTarget),
    UnsubscribeLog,
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown event '{0}'")]
    Unknown(String),
}

#[derive(Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl ClientEvent {
    pub fn from_json(text: &str) -> Result<Self, EventError> {
        let frame: Frame = serde_json::from_str(text)?;
        match frame.event.as_str() {
            "subscribe_log" => Ok(Self::SubscribeLog(serde_json::from_value(frame.data)?)),
            "unsubscribe_log" => Ok(Self::UnsubscribeLog),
            other => Err(EventError::Unknown(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    LogUpdate {
        job_name: String,
        build_number: u64,
        log: String,
    },
    LogEnd {
        job_name: String,
        build_number: u64,
    },
    LogError {
        job_name: String,
        build_number: u64,
        error: String,
    },
}

impl ServerEvent {
    /// Whether the event closes its session.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::LogUpdate { .. })
    }
}
