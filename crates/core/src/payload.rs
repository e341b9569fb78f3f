//! Payload contracts for the public and admin topics.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable team identifier; the view key for chart bars.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct TeamId(pub i64);

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lap/position source identifier. The server lists a synthetic
/// `accepted-laps` source with id `-1`.
pub type SourceId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
}

/// One entry of a `counts` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamCount {
    pub team: Team,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub id: SourceId,
    pub name: String,
}

/// Payload of the `active-*source` topics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveSource {
    pub name: String,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload for topic {topic:?} has unexpected shape: {reason}")]
    Shape { topic: String, reason: String },
}

impl PayloadError {
    pub fn shape(topic: &str, reason: impl Into<String>) -> Self {
        Self::Shape { topic: topic.to_string(), reason: reason.into() }
    }
}

/// Decode a topic payload into its contract type without consuming it.
pub fn decode<T: DeserializeOwned>(topic: &str, data: &Value) -> Result<T, PayloadError> {
    T::deserialize(data).map_err(|e| PayloadError::shape(topic, e.to_string()))
}
