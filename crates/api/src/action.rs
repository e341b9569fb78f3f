//! Admin actions and their HTTP shape.

use chrono::{Local, NaiveDateTime, TimeZone};
use loxsi_core::SourceId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{ControlError, ControlResult};

/// Which active-source slot a `use` request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceScope {
    #[default]
    Generic,
    Lap,
    Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    UseSource { scope: SourceScope, id: SourceId },
    SetMessage { message: String },
    ClearMessage,
    /// Freeze the scoreboard at `time` (epoch milliseconds).
    SetFreeze { time: i64 },
    ClearFreeze,
    ForceRefresh,
}

impl Action {
    /// Stable short name, used as a log field and metric label.
    pub fn name(&self) -> &'static str {
        match self {
            Action::UseSource { .. } => "use-source",
            Action::SetMessage { .. } => "set-message",
            Action::ClearMessage => "clear-message",
            Action::SetFreeze { .. } => "set-freeze",
            Action::ClearFreeze => "clear-freeze",
            Action::ForceRefresh => "force-refresh",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Action::ClearMessage | Action::ClearFreeze => Method::Delete,
            _ => Method::Post,
        }
    }

    /// Path relative to the server origin.
    pub fn path(&self) -> String {
        match self {
            Action::UseSource { scope: SourceScope::Generic, id } => format!("/api/use/{id}"),
            Action::UseSource { scope: SourceScope::Lap, id } => format!("/api/lap/use/{id}"),
            Action::UseSource { scope: SourceScope::Position, id } => format!("/api/position/use/{id}"),
            Action::SetMessage { .. } | Action::ClearMessage => "/api/message".to_string(),
            Action::SetFreeze { .. } | Action::ClearFreeze => "/api/freeze".to_string(),
            Action::ForceRefresh => "/api/force-client-refresh".to_string(),
        }
    }

    pub fn body(&self) -> Option<Value> {
        match self {
            Action::SetMessage { message } => Some(json!({ "message": message })),
            Action::SetFreeze { time } => Some(json!({ "time": time })),
            _ => None,
        }
    }
}

/// Parse a freeze time given either as epoch milliseconds or as a local
/// `YYYY-MM-DDTHH:MM` datetime.
pub fn parse_freeze_time(input: &str) -> ControlResult<i64> {
    let s = input.trim();
    if let Ok(ms) = s.parse::<i64>() {
        return Ok(ms);
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .map_err(|e| ControlError::InvalidFreezeTime(format!("{s:?}: {e}")))?;
    // ambiguous local times (DST fold) resolve to the earlier instant
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| ControlError::InvalidFreezeTime(format!("{s:?} does not exist in the local timezone")))?;
    Ok(local.timestamp_millis())
}
