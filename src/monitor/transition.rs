// src/monitor/transition.rs - Print lifecycle detection
use std::time::Instant;

use crate::status::{NormalizedStatus, PrinterState};
use crate::username::extract_user;

use super::store::{StateRecord, StateStore};

/// Bambu signals normal completion through a transient raw state that the
/// canonical mapping collapses to Idle.
const RAW_FINISH_TOKEN: &str = "FINISH";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Completed,
    Failed,
}

/// A detected print completion or failure. Produced at most once per
/// printer per cycle, dispatched immediately, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub printer: String,
    pub kind: EventKind,
    /// The file that just finished, taken from the previous record rather
    /// than whatever the printer currently reports.
    pub file_name: Option<String>,
    pub user: Option<String>,
    pub duration_secs: Option<u64>,
}

/// Feed one reading through the detector, updating the store.
///
/// Only exits from Printing are meaningful: every other transition is
/// absorbed without an event. An Unknown reading is "no information" and
/// leaves the store untouched.
pub fn observe(
    store: &mut StateStore,
    printer: &str,
    status: &NormalizedStatus,
    now: Instant,
) -> Option<LifecycleEvent> {
    if status.state == PrinterState::Unknown {
        return None;
    }

    let prev = store.record(printer);
    let was_printing = prev.map(|r| r.state == PrinterState::Printing).unwrap_or(false);

    if status.state == PrinterState::Printing && !was_printing {
        store.start_session(printer, now);
    }

    let mut event = None;
    if was_printing {
        if let Some(kind) = classify_exit(status) {
            let prev = store.record(printer).cloned();
            let duration_secs = resolve_duration(
                prev.as_ref().and_then(|r| r.time_printing_secs),
                store.session_start(printer),
                now,
            );
            store.clear_session(printer);
            event = Some(LifecycleEvent {
                printer: printer.to_string(),
                kind,
                file_name: prev.as_ref().and_then(|r| r.file_name.clone()),
                user: prev.as_ref().and_then(|r| r.user.clone()),
                duration_secs,
            });
        }
    }

    store.update(
        printer,
        StateRecord {
            state: status.state,
            file_name: status.job_file_name.clone(),
            user: status.job_file_name.as_deref().and_then(extract_user),
            time_printing_secs: status.time_printing_secs,
        },
    );

    event
}

fn classify_exit(status: &NormalizedStatus) -> Option<EventKind> {
    let raw_finished = status.raw_backend_state.as_deref() == Some(RAW_FINISH_TOKEN);
    match status.state {
        PrinterState::Idle | PrinterState::Finished => Some(EventKind::Completed),
        _ if raw_finished => Some(EventKind::Completed),
        PrinterState::Error | PrinterState::Stopped => Some(EventKind::Failed),
        _ => None,
    }
}

/// Pick an elapsed-print duration, best source first:
/// backend-reported elapsed time, then wall clock since the session
/// started, then nothing. None means "unknown", never zero.
pub fn resolve_duration(
    reported_secs: Option<u64>,
    session_start: Option<Instant>,
    now: Instant,
) -> Option<u64> {
    reported_secs.or_else(|| {
        session_start.map(|start| now.saturating_duration_since(start).as_secs())
    })
}
