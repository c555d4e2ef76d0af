// src/monitor/mod.rs - Aggregation pass orchestration
pub mod store;
pub mod transition;

use std::time::Instant;

use tokio::sync::broadcast;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::backend::PrinterBackend;
use crate::notify::{render_event, render_status_row, MemberDirectory, NotificationSink, ViewSink};
use crate::status::NormalizedStatus;

use self::store::StateStore;
use self::transition::observe;

/// Drives the poll / detect / notify / render cycle. Sole owner of the
/// state store, so only one pass can ever touch a printer's record.
pub struct Monitor {
    title: String,
    refresh_secs: u64,
    backends: Vec<Box<dyn PrinterBackend>>,
    store: StateStore,
    notifier: Box<dyn NotificationSink>,
    view: Box<dyn ViewSink>,
    directory: Box<dyn MemberDirectory>,
}

impl Monitor {
    pub fn new(
        title: String,
        refresh_secs: u64,
        backends: Vec<Box<dyn PrinterBackend>>,
        notifier: Box<dyn NotificationSink>,
        view: Box<dyn ViewSink>,
        directory: Box<dyn MemberDirectory>,
    ) -> Self {
        Self {
            title,
            refresh_secs,
            backends,
            store: StateStore::new(),
            notifier,
            view,
            directory,
        }
    }

    /// The configured backends, exposed so the caller can close their
    /// background connections after the loop exits.
    pub fn backends(&self) -> &[Box<dyn PrinterBackend>] {
        &self.backends
    }

    /// Run aggregation passes until shutdown is signalled.
    pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticker = interval(Duration::from_secs(self.refresh_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("monitor loop shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.pass().await;
                }
            }
        }
    }

    /// One full pass over every configured printer. A failing device is
    /// isolated to its own Offline/Unknown row and never aborts the pass.
    pub async fn pass(&mut self) {
        let mut readings: Vec<(String, NormalizedStatus)> = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            let status = backend.poll().await;
            readings.push((backend.name().to_string(), status));
        }

        let now = Instant::now();
        for (printer, status) in &readings {
            if let Some(event) = observe(&mut self.store, printer, status, now) {
                tracing::info!("{}: {:?} ({:?})", printer, event.kind, event.file_name);
                let text = render_event(&event, self.directory.as_ref());
                // Failed deliveries are dropped; the event is not replayable.
                if let Err(e) = self.notifier.send(&text).await {
                    tracing::error!("notification for {} not delivered: {}", printer, e);
                }
            }
        }

        let rows: Vec<String> = readings
            .iter()
            .map(|(printer, status)| render_status_row(printer, status, self.directory.as_ref()))
            .collect();
        if let Err(e) = self.view.publish(&rows, &self.title, self.refresh_secs).await {
            tracing::error!("status view update failed: {}", e);
        }
    }
}
