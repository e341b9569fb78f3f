//! Loxsi core types: feed envelopes, frame decoding and topic payload contracts.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub mod frame;
pub mod payload;

pub use frame::{parse_frame, parse_frame_bytes, Envelope, Frame, FrameError, Frames};
pub use payload::{ActiveSource, PayloadError, Source, SourceId, Team, TeamCount, TeamId};

/// The two independent push channels served by a Loxsi server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    Public,
    Admin,
}

impl Feed {
    /// Path of the WebSocket endpoint, relative to the server origin.
    pub fn path(self) -> &'static str {
        match self {
            Feed::Public => "/feed",
            Feed::Admin => "/admin/feed",
        }
    }
}

impl std::fmt::Display for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feed::Public => f.write_str("public"),
            Feed::Admin => f.write_str("admin"),
        }
    }
}

/// Topic names as they appear on the wire.
pub mod topics {
    pub const COUNTS: &str = "counts";
    pub const MESSAGE: &str = "message";
    pub const FROZEN: &str = "frozen";
    pub const REFRESH: &str = "refresh";

    pub const HEALTH: &str = "telraam-health";
    pub const ACTIVE_SOURCE: &str = "active-source";
    pub const ACTIVE_LAP_SOURCE: &str = "active-lap-source";
    pub const ACTIVE_POSITION_SOURCE: &str = "active-position-source";
    pub const LAP_SOURCE: &str = "lap-source";
    pub const POSITION_SOURCE: &str = "position-source";
    pub const ACTIVE_CONNECTIONS: &str = "active-connections";
    pub const FREEZE: &str = "freeze";
}
