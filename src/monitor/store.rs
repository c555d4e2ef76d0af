// src/monitor/store.rs - Per-printer observation memory
use std::collections::HashMap;
use std::time::Instant;

use crate::status::PrinterState;

/// What the detector remembers about a printer from the previous cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct StateRecord {
    pub state: PrinterState,
    pub file_name: Option<String>,
    pub user: Option<String>,
    /// Backend-reported elapsed print time as of the last observation.
    pub time_printing_secs: Option<u64>,
}

/// Last-observed records and in-flight print sessions, keyed by printer
/// name. Owned exclusively by the monitor task; lives for the process
/// lifetime and is never persisted. A restart simply forgets everything
/// and re-synchronizes from the next successful poll.
#[derive(Debug, Default)]
pub struct StateStore {
    records: HashMap<String, StateRecord>,
    sessions: HashMap<String, Instant>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, printer: &str) -> Option<&StateRecord> {
        self.records.get(printer)
    }

    /// Overwrite the record for a printer. Whole-record replacement only,
    /// so an interrupted pass can never leave a half-updated entry.
    pub fn update(&mut self, printer: &str, record: StateRecord) {
        self.records.insert(printer.to_string(), record);
    }

    pub fn start_session(&mut self, printer: &str, at: Instant) {
        self.sessions.insert(printer.to_string(), at);
    }

    pub fn session_start(&self, printer: &str) -> Option<Instant> {
        self.sessions.get(printer).copied()
    }

    pub fn clear_session(&mut self, printer: &str) {
        self.sessions.remove(printer);
    }
}
