// src/backend/mod.rs - Printer backend adapters
pub mod bambu;
pub mod prusa;

use async_trait::async_trait;
use thiserror::Error;

use crate::status::NormalizedStatus;

/// Closed transport failure taxonomy. Callers match on the variant,
/// never on error text.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("device unreachable: {0}")]
    Unreachable(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("HTTP status {0}")]
    Http(u16),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl PollError {
    /// Unreachable and timed-out devices are an expected condition and
    /// show as Offline; everything else is an Unknown reading.
    pub fn is_offline(&self) -> bool {
        matches!(self, PollError::Unreachable(_) | PollError::Timeout(_))
    }
}

/// One monitored printer, whatever its transport.
///
/// `poll` never fails: transport errors are absorbed into an Offline or
/// Unknown status so one bad device cannot abort an aggregation pass.
#[async_trait]
pub trait PrinterBackend: Send + Sync {
    /// Printer name from the configuration (unique key).
    fn name(&self) -> &str;

    /// Produce the current normalized status.
    async fn poll(&self) -> NormalizedStatus;

    /// Start any long-lived connection this backend needs. Pull backends
    /// have nothing to start.
    async fn start(&self) {}

    /// Release background connections on shutdown.
    async fn shutdown(&self) {}
}

/// Map a poll failure to the status the pass records for the device.
pub(crate) fn status_from_error(name: &str, err: PollError) -> NormalizedStatus {
    if err.is_offline() {
        tracing::debug!("{} offline: {}", name, err);
        NormalizedStatus::offline()
    } else {
        tracing::warn!("failed to read status from {}: {}", name, err);
        NormalizedStatus::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PrinterState;

    #[test]
    fn test_offline_classification() {
        assert!(PollError::Unreachable("refused".into()).is_offline());
        assert!(PollError::Timeout("10s".into()).is_offline());
        assert!(!PollError::Http(401).is_offline());
        assert!(!PollError::Protocol("bad json".into()).is_offline());
    }

    #[test]
    fn test_status_from_error() {
        let s = status_from_error("p1", PollError::Unreachable("refused".into()));
        assert_eq!(s.state, PrinterState::Offline);
        let s = status_from_error("p1", PollError::Http(500));
        assert_eq!(s.state, PrinterState::Unknown);
    }
}
