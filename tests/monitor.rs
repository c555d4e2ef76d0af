// Integration tests driving full aggregation passes over fake backends.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use printwatch::backend::PrinterBackend;
use printwatch::monitor::Monitor;
use printwatch::notify::{MemberDirectory, NotificationSink, SinkError, ViewSink};
use printwatch::status::{NormalizedStatus, PrinterState};

/// Backend that replays a fixed sequence of readings, then goes Offline.
struct ScriptedBackend {
    name: String,
    script: Mutex<VecDeque<NormalizedStatus>>,
}

impl ScriptedBackend {
    fn new(name: &str, readings: Vec<NormalizedStatus>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(readings.into()),
        }
    }
}

#[async_trait]
impl PrinterBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&self) -> NormalizedStatus {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(NormalizedStatus::offline)
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::Http(500));
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Clone, Default)]
struct RecordingView {
    published: Arc<Mutex<Vec<Vec<String>>>>,
}

#[async_trait]
impl ViewSink for RecordingView {
    async fn publish(
        &self,
        rows: &[String],
        _title: &str,
        _refresh_secs: u64,
    ) -> Result<(), SinkError> {
        self.published.lock().unwrap().push(rows.to_vec());
        Ok(())
    }
}

struct NoDirectory;
impl MemberDirectory for NoDirectory {
    fn find_by_name(&self, _name: &str) -> Option<u64> {
        None
    }
}

fn printing(file: &str, elapsed: Option<u64>) -> NormalizedStatus {
    NormalizedStatus {
        state: PrinterState::Printing,
        job_file_name: Some(file.to_string()),
        time_printing_secs: elapsed,
        progress_percent: Some(50.0),
        ..Default::default()
    }
}

fn in_state(state: PrinterState) -> NormalizedStatus {
    NormalizedStatus {
        state,
        ..Default::default()
    }
}

fn build_monitor(
    backends: Vec<Box<dyn PrinterBackend>>,
    notifier: RecordingNotifier,
    view: RecordingView,
) -> Monitor {
    Monitor::new(
        "Test Printers".to_string(),
        30,
        backends,
        Box::new(notifier),
        Box::new(view),
        Box::new(NoDirectory),
    )
}

#[tokio::test]
async fn completed_print_produces_one_notification() {
    let backend = ScriptedBackend::new(
        "Mini",
        vec![
            printing("bracket_@bob.gcode", Some(5400)),
            printing("bracket_@bob.gcode", Some(5460)),
            in_state(PrinterState::Idle),
            in_state(PrinterState::Idle),
        ],
    );
    let notifier = RecordingNotifier::default();
    let view = RecordingView::default();
    let sent = notifier.sent.clone();
    let published = view.published.clone();

    let mut monitor = build_monitor(vec![Box::new(backend)], notifier, view);
    for _ in 0..4 {
        monitor.pass().await;
    }

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Print Complete"));
    assert!(sent[0].contains("Mini"));
    assert!(sent[0].contains("bracket_@bob.gcode"));
    assert!(sent[0].contains("Print time: 1h 31m"));

    // Every pass publishes the view, events or not.
    assert_eq!(published.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn failed_print_notifies_with_previous_file() {
    let backend = ScriptedBackend::new(
        "X1C",
        vec![
            printing("vase_@carol.gcode", None),
            in_state(PrinterState::Error),
        ],
    );
    let notifier = RecordingNotifier::default();
    let sent = notifier.sent.clone();

    let mut monitor = build_monitor(vec![Box::new(backend)], notifier, RecordingView::default());
    monitor.pass().await;
    monitor.pass().await;

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Print Failed"));
    assert!(sent[0].contains("vase_@carol.gcode"));
    assert!(sent[0].contains("@carol"));
}

#[tokio::test]
async fn offline_device_is_isolated_from_the_rest() {
    let healthy = ScriptedBackend::new("Mini", vec![in_state(PrinterState::Idle); 2]);
    // Empty script: always Offline.
    let dead = ScriptedBackend::new("MK3S", vec![]);
    let view = RecordingView::default();
    let published = view.published.clone();

    let mut monitor = build_monitor(
        vec![Box::new(healthy), Box::new(dead)],
        RecordingNotifier::default(),
        view,
    );
    monitor.pass().await;

    let published = published.lock().unwrap();
    assert_eq!(published.len(), 1);
    let rows = &published[0];
    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains("Available"));
    assert!(rows[1].contains("Offline"));
    assert!(rows[1].contains("not reachable"));
}

#[tokio::test]
async fn unknown_reading_defers_detection_to_a_later_pass() {
    let backend = ScriptedBackend::new(
        "X1C",
        vec![
            printing("lid_@dave.gcode", None),
            in_state(PrinterState::Unknown),
            in_state(PrinterState::Idle),
        ],
    );
    let notifier = RecordingNotifier::default();
    let sent = notifier.sent.clone();

    let mut monitor = build_monitor(vec![Box::new(backend)], notifier, RecordingView::default());
    monitor.pass().await;
    monitor.pass().await;
    assert!(sent.lock().unwrap().is_empty());

    // The Printing record survived the Unknown gap, so the Idle reading
    // still closes out the print.
    monitor.pass().await;
    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("lid_@dave.gcode"));
}

#[tokio::test]
async fn delivery_failure_does_not_abort_the_pass() {
    let backend = ScriptedBackend::new(
        "Mini",
        vec![printing("a_@bob.gcode", None), in_state(PrinterState::Idle)],
    );
    let notifier = RecordingNotifier {
        fail: true,
        ..Default::default()
    };
    let view = RecordingView::default();
    let published = view.published.clone();

    let mut monitor = build_monitor(vec![Box::new(backend)], notifier, view);
    monitor.pass().await;
    monitor.pass().await;

    // The view still updated both passes despite the sink rejecting the
    // notification.
    assert_eq!(published.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn bambu_finish_token_closes_the_print() {
    let finish = NormalizedStatus {
        state: PrinterState::Idle,
        raw_backend_state: Some("FINISH".to_string()),
        ..Default::default()
    };
    let backend = ScriptedBackend::new(
        "X1C",
        vec![printing("part_@erin.gcode", None), finish],
    );
    let notifier = RecordingNotifier::default();
    let sent = notifier.sent.clone();

    let mut monitor = build_monitor(vec![Box::new(backend)], notifier, RecordingView::default());
    monitor.pass().await;
    monitor.pass().await;

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Print Complete"));
}
