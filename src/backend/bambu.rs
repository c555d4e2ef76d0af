// src/backend/bambu.rs - Bambu Lab push adapter (MQTT)
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use serde_json::json;
use tokio::sync::{broadcast, RwLock};

use crate::config::PrinterConfig;
use crate::status::{NormalizedStatus, PrinterState};

use super::PrinterBackend;

const MQTT_PORT: u16 = 8883;
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Last raw fields seen over MQTT for one printer.
///
/// Bambu report messages are deltas, so fields are merged in as they
/// arrive instead of replacing the whole reading.
#[derive(Debug, Clone, Default)]
pub struct BambuReading {
    pub gcode_state: Option<String>,
    pub percent: Option<f64>,
    pub remaining_min: Option<u64>,
    pub file_name: Option<String>,
}

impl BambuReading {
    /// Fold the `print` object of a report payload into this reading.
    pub fn merge(&mut self, payload: &serde_json::Value) {
        let Some(print) = payload.get("print") else {
            return;
        };
        if let Some(state) = print.get("gcode_state").and_then(|v| v.as_str()) {
            self.gcode_state = Some(state.to_string());
        }
        if let Some(pct) = print.get("mc_percent").and_then(|v| v.as_f64()) {
            self.percent = Some(pct);
        }
        if let Some(remaining) = print.get("mc_remaining_time").and_then(|v| v.as_u64()) {
            self.remaining_min = Some(remaining);
        }
        // subtask_name carries the friendly job name; gcode_file is the
        // on-disk fallback.
        if let Some(name) = print.get("subtask_name").and_then(|v| v.as_str()) {
            if !name.is_empty() {
                self.file_name = Some(name.to_string());
            }
        } else if let Some(name) = print.get("gcode_file").and_then(|v| v.as_str()) {
            if !name.is_empty() {
                self.file_name = Some(name.to_string());
            }
        }
    }

    /// Normalize the cached raw fields. Called on every aggregation pass,
    /// never touches the network.
    pub fn to_status(&self) -> NormalizedStatus {
        let Some(token) = self.gcode_state.as_deref() else {
            // Connected but no state report yet: no information.
            return NormalizedStatus::unknown();
        };
        let state = PrinterState::from_bambu(token);
        NormalizedStatus {
            state,
            raw_backend_state: Some(token.to_string()),
            progress_percent: self.percent,
            // Bambu reports remaining time in minutes.
            time_remaining_secs: self.remaining_min.map(|m| m * 60),
            time_printing_secs: None,
            job_file_name: if state == PrinterState::Printing {
                self.file_name.clone()
            } else {
                None
            },
        }
    }
}

/// Push adapter for Bambu Lab printers. A background task keeps an MQTT
/// connection open and refreshes a shared cache; `poll` only reads it.
pub struct BambuBackend {
    name: String,
    host: String,
    serial: String,
    access_code: String,
    cache: Arc<RwLock<Option<BambuReading>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl BambuBackend {
    pub fn new(config: &PrinterConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            name: config.name.clone(),
            host: config.host.clone(),
            serial: config.serial.clone().unwrap_or_default(),
            access_code: config.access_code.clone().unwrap_or_default(),
            cache: Arc::new(RwLock::new(None)),
            shutdown_tx,
        }
    }

    fn mqtt_options(&self) -> MqttOptions {
        let client_id = format!("printwatch_{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, self.host.clone(), MQTT_PORT);
        options.set_credentials("bblp", &self.access_code);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);
        // Bambu printers use self-signed certificates.
        options.set_transport(Transport::tls_with_config(TlsConfiguration::Simple {
            ca: vec![],
            alpn: None,
            client_auth: None,
        }));
        options
    }

    async fn connection_task(
        name: String,
        serial: String,
        options: MqttOptions,
        cache: Arc<RwLock<Option<BambuReading>>>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let report_topic = format!("device/{}/report", serial);
        let request_topic = format!("device/{}/request", serial);
        let push_all = json!({
            "pushing": {
                "sequence_id": "0",
                "command": "pushall"
            }
        })
        .to_string();

        loop {
            let (client, mut event_loop) = AsyncClient::new(options.clone(), 64);
            if let Err(e) = client.subscribe(&report_topic, QoS::AtMostOnce).await {
                tracing::warn!("{}: MQTT subscribe failed: {}", name, e);
            }

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("{}: closing MQTT connection", name);
                        let _ = client.disconnect().await;
                        return;
                    }
                    event = event_loop.poll() => match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            tracing::info!("{}: MQTT connected", name);
                            // Older firmwares only report on request.
                            let _ = client
                                .publish(&request_topic, QoS::AtMostOnce, false, push_all.clone())
                                .await;
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            if !publish.topic.ends_with("/report") {
                                continue;
                            }
                            match serde_json::from_slice::<serde_json::Value>(&publish.payload) {
                                Ok(payload) => {
                                    let mut guard = cache.write().await;
                                    guard.get_or_insert_with(BambuReading::default).merge(&payload);
                                }
                                Err(e) => {
                                    tracing::debug!("{}: unparseable report: {}", name, e);
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::debug!("{}: MQTT connection lost: {}", name, e);
                            // Stale readings must not outlive the connection;
                            // the printer shows Offline until data returns.
                            *cache.write().await = None;
                            break;
                        }
                    }
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => return,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }
}

#[async_trait]
impl PrinterBackend for BambuBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&self) -> NormalizedStatus {
        match self.cache.read().await.as_ref() {
            Some(reading) => reading.to_status(),
            None => NormalizedStatus::offline(),
        }
    }

    async fn start(&self) {
        tracing::info!("connecting to Bambu printer {} at {}", self.name, self.host);
        tokio::spawn(Self::connection_task(
            self.name.clone(),
            self.serial.clone(),
            self.mqtt_options(),
            self.cache.clone(),
            self.shutdown_tx.subscribe(),
        ));
    }

    async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
