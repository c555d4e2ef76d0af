// src/status.rs - Canonical printer status model
use serde::{Deserialize, Serialize};

/// Canonical printer state shared by all backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrinterState {
    Idle,
    Printing,
    Paused,
    Finished,
    Stopped,
    Error,
    Attention,
    /// Device unreachable. Expected and frequent, not an error condition.
    Offline,
    /// Status could not be read. The monitor treats this as "no information".
    #[default]
    Unknown,
}

impl PrinterState {
    /// Map a PrusaLink state token to the canonical state.
    pub fn from_prusa(token: &str) -> Self {
        match token {
            "IDLE" | "READY" => Self::Idle,
            "PRINTING" => Self::Printing,
            "PAUSED" => Self::Paused,
            "FINISHED" => Self::Finished,
            "STOPPED" => Self::Stopped,
            "ERROR" => Self::Error,
            // No canonical Busy state; BUSY must not read as completion.
            "BUSY" | "ATTENTION" => Self::Attention,
            _ => Self::Unknown,
        }
    }

    /// Map a Bambu `gcode_state` token to the canonical state.
    ///
    /// FINISH deliberately maps to Idle so the status view shows the printer
    /// as available again; the adapter keeps the raw token so the transition
    /// detector can still tell a fresh completion from a plain idle.
    pub fn from_bambu(token: &str) -> Self {
        match token {
            "IDLE" => Self::Idle,
            "RUNNING" | "PREPARE" | "SLICING" => Self::Printing,
            "PAUSE" => Self::Paused,
            "FINISH" => Self::Idle,
            "FAILED" => Self::Error,
            _ => Self::Unknown,
        }
    }
}

/// One normalized per-poll reading for a single printer.
///
/// Invariant: `job_file_name` is only set while `state == Printing`.
/// Time fields are always in seconds, whatever the backend's native unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedStatus {
    pub state: PrinterState,
    /// Backend-native state token. Only the transition detector's
    /// completion classification may interpret this.
    pub raw_backend_state: Option<String>,
    pub progress_percent: Option<f64>,
    pub time_remaining_secs: Option<u64>,
    pub time_printing_secs: Option<u64>,
    pub job_file_name: Option<String>,
}

impl NormalizedStatus {
    pub fn offline() -> Self {
        Self {
            state: PrinterState::Offline,
            ..Self::default()
        }
    }

    pub fn unknown() -> Self {
        Self {
            state: PrinterState::Unknown,
            ..Self::default()
        }
    }
}

/// Render a duration in whole minutes, with hours split out past 60 minutes.
/// Zero or negative input renders as "0m", never as an empty string.
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "0m".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
