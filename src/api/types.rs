//! Session REST API types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

/// User height sent when none is given.
pub const DEFAULT_HEIGHT_CM: u32 = 170;

// ============================================================================
// ExerciseKind
// ============================================================================

/// Exercises the analysis service can track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseKind {
    Pushup,
    Squat,
    Situp,
    Sitnreach,
    Skipping,
    Jumpingjacks,
    Vjump,
    Bjump,
}

impl ExerciseKind {
    /// Every exercise, in catalogue order.
    pub const ALL: [Self; 8] = [
        Self::Pushup,
        Self::Squat,
        Self::Situp,
        Self::Sitnreach,
        Self::Skipping,
        Self::Jumpingjacks,
        Self::Vjump,
        Self::Bjump,
    ];

    /// Wire identifier.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::Pushup => "pushup",
            Self::Squat => "squat",
            Self::Situp => "situp",
            Self::Sitnreach => "sitnreach",
            Self::Skipping => "skipping",
            Self::Jumpingjacks => "jumpingjacks",
            Self::Vjump => "vjump",
            Self::Bjump => "bjump",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pushup => "Push-ups",
            Self::Squat => "Squats",
            Self::Situp => "Sit-ups",
            Self::Sitnreach => "Sit & Reach",
            Self::Skipping => "Skipping",
            Self::Jumpingjacks => "Jumping Jacks",
            Self::Vjump => "Vertical Jump",
            Self::Bjump => "Broad Jump",
        }
    }

    /// One-line description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Pushup => "Upper body strength",
            Self::Squat => "Lower body power",
            Self::Situp => "Core strength",
            Self::Sitnreach => "Flexibility test",
            Self::Skipping => "Cardio endurance",
            Self::Jumpingjacks => "Full body cardio",
            Self::Vjump => "Explosive power",
            Self::Bjump => "Horizontal distance",
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ExerciseKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::config(format!("Unknown exercise: {s}")))
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Response of `POST /session/create`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedSession {
    pub session_id: SessionId,
    /// Socket path suggested by the service; clients derive their own.
    #[serde(default)]
    pub websocket_url: Option<String>,
}

/// Response of `GET /session/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionInfo {
    /// Exercise id as reported by the service.
    #[serde(default)]
    pub exercise: Option<String>,
    /// Any other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionInfo {
    /// Returns the exercise if it is one this client knows.
    #[must_use]
    pub fn exercise_kind(&self) -> Option<ExerciseKind> {
        self.exercise.as_deref()?.parse().ok()
    }
}

/// Response of `GET /session/{id}/metrics`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FinalMetrics {
    /// Final record; shape depends on the exercise.
    #[serde(default)]
    pub metrics: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FinalMetrics {
    /// Returns the final record.
    #[inline]
    #[must_use]
    pub fn metrics(&self) -> &Value {
        &self.metrics
    }
}

/// Error body of a failed request.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    /// Returns the `detail` message, if it is a non-empty string.
    pub(crate) fn detail(&self) -> Option<&str> {
        self.detail
            .as_ref()
            .and_then(Value::as_str)
            .filter(|detail| !detail.is_empty())
    }
}
