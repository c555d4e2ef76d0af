// src/notify/mod.rs - Output boundary: sinks, member lookup, rendering
pub mod discord;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::monitor::transition::{EventKind, LifecycleEvent};
use crate::status::{format_duration, NormalizedStatus, PrinterState};
use crate::username::extract_user;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("sink rejected message with HTTP status {0}")]
    Http(u16),
}

/// Delivers lifecycle notifications. Failures are logged and dropped by
/// the caller, never retried within a pass.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), SinkError>;
}

/// Publishes the aggregated status view. Whether this creates a new
/// message or edits an existing one is the implementation's business.
#[async_trait]
pub trait ViewSink: Send + Sync {
    async fn publish(
        &self,
        rows: &[String],
        title: &str,
        refresh_secs: u64,
    ) -> Result<(), SinkError>;
}

/// Resolves a parsed username to a platform identity. Absence is normal,
/// not an error; notifications fall back to the plain name.
pub trait MemberDirectory: Send + Sync {
    fn find_by_name(&self, name: &str) -> Option<u64>;
}

/// Directory backed by the `[mentions]` table in the config file.
pub struct StaticDirectory {
    by_name: HashMap<String, u64>,
}

impl StaticDirectory {
    pub fn new(mentions: &HashMap<String, u64>) -> Self {
        let by_name = mentions
            .iter()
            .map(|(name, id)| (name.to_lowercase(), *id))
            .collect();
        Self { by_name }
    }
}

impl MemberDirectory for StaticDirectory {
    fn find_by_name(&self, name: &str) -> Option<u64> {
        self.by_name.get(&name.to_lowercase()).copied()
    }
}

pub fn state_emoji(state: PrinterState) -> &'static str {
    match state {
        PrinterState::Idle => "\u{1f7e2}",
        PrinterState::Printing => "\u{1f7e1}",
        PrinterState::Paused => "\u{1f7e0}",
        PrinterState::Finished => "\u{1f535}",
        PrinterState::Stopped => "\u{1f534}",
        PrinterState::Error => "\u{1f534}",
        PrinterState::Attention => "\u{1f7e0}",
        PrinterState::Offline => "\u{26ab}",
        PrinterState::Unknown => "\u{26aa}",
    }
}

pub fn state_label(state: PrinterState) -> &'static str {
    match state {
        PrinterState::Idle => "Available",
        PrinterState::Printing => "Printing",
        PrinterState::Paused => "Paused",
        PrinterState::Finished => "Print Finished",
        PrinterState::Stopped => "Stopped",
        PrinterState::Error => "Error",
        PrinterState::Attention => "Needs Attention",
        PrinterState::Offline => "Offline",
        PrinterState::Unknown => "Unknown",
    }
}

/// Mention text for a notification: resolved platform mention, plain
/// "@name" when unresolved, "Unknown user" when no owner was parsed.
pub fn mention_for(user: Option<&str>, directory: &dyn MemberDirectory) -> String {
    match user {
        Some(name) => match directory.find_by_name(name) {
            Some(id) => format!("<@{}>", id),
            None => format!("@{}", name),
        },
        None => "Unknown user".to_string(),
    }
}

/// Render one lifecycle event as notification text.
pub fn render_event(event: &LifecycleEvent, directory: &dyn MemberDirectory) -> String {
    let mention = mention_for(event.user.as_deref(), directory);
    let file = event.file_name.as_deref().unwrap_or("Unknown file");
    let duration_line = event
        .duration_secs
        .map(|secs| format!("Print time: {}\n", format_duration(secs as i64)))
        .unwrap_or_default();

    match event.kind {
        EventKind::Completed => format!(
            "**Print Complete** on **{}**\n`{}`\n{}\n{}Your print is ready for pickup!",
            event.printer, file, mention, duration_line
        ),
        EventKind::Failed => format!(
            "**Print Failed** on **{}**\n`{}`\n{}\n{}Please check the printer.",
            event.printer, file, mention, duration_line
        ),
    }
}

/// Render one printer's line(s) for the status view.
pub fn render_status_row(
    printer: &str,
    status: &NormalizedStatus,
    directory: &dyn MemberDirectory,
) -> String {
    let heading = format!(
        "{} **{}** - {}",
        state_emoji(status.state),
        printer,
        state_label(status.state)
    );

    let detail = match status.state {
        PrinterState::Printing => {
            let file = status.job_file_name.as_deref().unwrap_or("Unknown file");
            let owner = status
                .job_file_name
                .as_deref()
                .and_then(extract_user)
                .map(|name| mention_for(Some(&name), directory))
                .unwrap_or_else(|| "Unknown User".to_string());
            let progress = status.progress_percent.unwrap_or(0.0);
            let remaining = status
                .time_remaining_secs
                .map(|secs| format_duration(secs as i64))
                .unwrap_or_else(|| "unknown".to_string());
            format!(
                "\n`{}`\n{}\n{:.0}% complete | ~{} remaining",
                file, owner, progress, remaining
            )
        }
        PrinterState::Offline => "\nPrinter is not reachable".to_string(),
        PrinterState::Error | PrinterState::Attention => "\nCheck printer".to_string(),
        _ => String::new(),
    };

    format!("{}{}", heading, detail)
}
