//! Inbound frame decoding.
//!
//! A frame carries one JSON value, or several newline-delimited values. Each
//! value is classified on its own: an object with neither `topic` nor `data`
//! is a liveness ping, as is one tagged with the `ping` topic; an object with
//! any other string `topic` is an envelope, and everything else is a
//! [`FrameError`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

/// Decoded push message: a topic tag plus its opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    /// `Value::Null` when the frame carried no `data` key.
    pub data: Value,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, data: Value) -> Self {
        Self { topic: topic.into(), data }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Ping,
    Envelope(Envelope),
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("frame is empty")]
    Empty,
    #[error("frame root is not an object")]
    NotAnObject,
    #[error("frame has data but no topic")]
    MissingTopic,
    #[error("frame topic is not a string: {0}")]
    TopicNotString(String),
}

/// Topic some servers use for their keepalive; never dispatched.
pub const PING_TOPIC: &str = "ping";

/// Results for every JSON value found in one frame, in order.
pub type Frames = SmallVec<[Result<Frame, FrameError>; 1]>;

pub fn parse_frame(text: &str) -> Frames {
    let mut out = Frames::new();
    for item in serde_json::Deserializer::from_str(text).into_iter::<Value>() {
        match item {
            Ok(value) => out.push(classify(value)),
            Err(e) => {
                // the stream cannot resync after a syntax error
                out.push(Err(FrameError::Json(e)));
                break;
            }
        }
    }
    if out.is_empty() {
        out.push(Err(FrameError::Empty));
    }
    out
}

pub fn parse_frame_bytes(bytes: &[u8]) -> Frames {
    match std::str::from_utf8(bytes) {
        Ok(text) => parse_frame(text),
        Err(e) => {
            let mut out = Frames::new();
            out.push(Err(FrameError::Utf8(e)));
            out
        }
    }
}

fn classify(value: Value) -> Result<Frame, FrameError> {
    let Value::Object(mut map) = value else {
        return Err(FrameError::NotAnObject);
    };
    match (map.remove("topic"), map.remove("data")) {
        (None, None) => Ok(Frame::Ping),
        // keepalive of servers that tag it as a topic
        (Some(Value::String(topic)), _) if topic == PING_TOPIC => Ok(Frame::Ping),
        (None, Some(_)) => Err(FrameError::MissingTopic),
        (Some(Value::String(topic)), data) => Ok(Frame::Envelope(Envelope {
            topic,
            data: data.unwrap_or(Value::Null),
        })),
        (Some(other), _) => Err(FrameError::TopicNotString(other.to_string())),
    }
}
