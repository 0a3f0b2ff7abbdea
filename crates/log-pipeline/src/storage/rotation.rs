//! Rotation bookkeeping for the storage stage.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use logflow_core::config::StorageConfig;

/// Persisted storage state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationState {
    /// File name of the Active segment
    pub active_segment_name: String,
    /// Bytes durably appended to the Active segment
    pub size_bytes: u64,
    /// When the Active segment was opened
    pub start_time: DateTime<Utc>,
    /// Last parser output file appended
    #[serde(default)]
    pub last_processed_input: Option<String>,
    /// Sequence for the next segment to open
    pub next_sequence: u64,
}

/// Why a segment was rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationTrigger {
    Size,
    Age,
}

impl RotationTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Age => "age",
        }
    }
}

impl fmt::Display for RotationTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size and age thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_bytes: u64,
    pub max_age: Duration,
}

impl RotationPolicy {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            max_bytes: config.rotation_size_bytes(),
            max_age: config.rotation_age(),
        }
    }

    /// Whether the Active segment described by `state` is due at `now`.
    ///
    /// An empty segment is never due.
    pub fn due(&self, state: &RotationState, now: DateTime<Utc>) -> Option<RotationTrigger> {
        if state.size_bytes == 0 {
            return None;
        }
        if state.size_bytes >= self.max_bytes {
            return Some(RotationTrigger::Size);
        }
        let age = (now - state.start_time).to_std().unwrap_or_default();
        if age >= self.max_age {
            return Some(RotationTrigger::Age);
        }
        None
    }
}
