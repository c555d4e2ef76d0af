// src/backend/prusa.rs - PrusaLink pull adapter
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{AuthMode, PrinterConfig};
use crate::status::{NormalizedStatus, PrinterState};

use super::{status_from_error, PollError, PrinterBackend};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Pull adapter for PrusaLink printers. Each cycle issues a status request;
/// while printing, a second request fetches the job file name.
pub struct PrusaBackend {
    name: String,
    base_url: String,
    api_key: String,
    auth: AuthMode,
    username: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    printer: StatusPrinter,
    #[serde(default)]
    job: Option<StatusJob>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusPrinter {
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusJob {
    #[serde(default)]
    progress: Option<f64>,
    // PrusaLink occasionally reports -1 while the estimate settles.
    #[serde(default)]
    time_remaining: Option<i64>,
    #[serde(default)]
    time_printing: Option<i64>,
}

fn non_negative(value: Option<i64>) -> Option<u64> {
    value.filter(|v| *v >= 0).map(|v| v as u64)
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    #[serde(default)]
    file: Option<JobFile>,
}

#[derive(Debug, Deserialize)]
struct JobFile {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl PrusaBackend {
    pub fn new(config: &PrinterConfig) -> Result<Self, PollError> {
        let client = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PollError::Protocol(e.to_string()))?;

        Ok(Self {
            name: config.name.clone(),
            base_url: format!("http://{}", config.host),
            api_key: config.api_key.clone().unwrap_or_default(),
            auth: config.auth.unwrap_or_default(),
            username: config.username.clone(),
            client,
        })
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.get(format!("{}{}", self.base_url, path));
        match self.auth {
            AuthMode::ApiKey => builder.header("X-Api-Key", &self.api_key),
            AuthMode::Basic => builder.basic_auth(&self.username, Some(&self.api_key)),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, PollError> {
        let response = self.request(path).send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Http(status.as_u16()));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| PollError::Protocol(e.to_string()))
    }

    async fn read_status(&self) -> Result<NormalizedStatus, PollError> {
        let status: StatusResponse = self.get_json("/api/v1/status").await?;

        let token = status.printer.state.unwrap_or_default();
        let state = PrinterState::from_prusa(&token);
        let job = status.job;

        let mut normalized = NormalizedStatus {
            state,
            raw_backend_state: Some(token),
            progress_percent: job.as_ref().and_then(|j| j.progress),
            time_remaining_secs: non_negative(job.as_ref().and_then(|j| j.time_remaining)),
            time_printing_secs: non_negative(job.as_ref().and_then(|j| j.time_printing)),
            job_file_name: None,
        };

        // The file name lives behind a second endpoint. If that request
        // fails we still return the status, just without the name.
        if state == PrinterState::Printing {
            match self.get_json::<JobResponse>("/api/v1/job").await {
                Ok(job) => {
                    normalized.job_file_name =
                        job.file.and_then(|f| f.display_name.or(f.name));
                }
                Err(e) => {
                    tracing::debug!("{}: job detail request failed: {}", self.name, e);
                }
            }
        }

        Ok(normalized)
    }
}

#[async_trait]
impl PrinterBackend for PrusaBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&self) -> NormalizedStatus {
        match self.read_status().await {
            Ok(status) => status,
            Err(e) => status_from_error(&self.name, e),
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> PollError {
    if err.is_timeout() {
        PollError::Timeout(err.to_string())
    } else if err.is_connect() {
        PollError::Unreachable(err.to_string())
    } else {
        PollError::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_response_parsing() {
        let body = r#"{
            "printer": {"state": "PRINTING", "temp_nozzle": 215.0},
            "job": {"id": 4, "progress": 42.5, "time_remaining": 1800, "time_printing": 600}
        }"#;
        let parsed: StatusResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.printer.state.as_deref(), Some("PRINTING"));
        let job = parsed.job.unwrap();
        assert_eq!(job.progress, Some(42.5));
        assert_eq!(job.time_remaining, Some(1800));
        assert_eq!(job.time_printing, Some(600));
    }

    #[test]
    fn test_status_response_without_job() {
        let body = r#"{"printer": {"state": "IDLE"}}"#;
        let parsed: StatusResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.printer.state.as_deref(), Some("IDLE"));
        assert!(parsed.job.is_none());
    }

    #[test]
    fn test_negative_times_dropped() {
        assert_eq!(non_negative(Some(-1)), None);
        assert_eq!(non_negative(Some(0)), Some(0));
        assert_eq!(non_negative(Some(600)), Some(600));
        assert_eq!(non_negative(None), None);
    }

    #[test]
    fn test_job_response_display_name_preferred() {
        let body = r#"{"file": {"name": "BENCH~1.GCO", "display_name": "benchy_@alice.gcode"}}"#;
        let parsed: JobResponse = serde_json::from_str(body).unwrap();
        let file = parsed.file.unwrap();
        assert_eq!(
            file.display_name.or(file.name).as_deref(),
            Some("benchy_@alice.gcode")
        );
    }
}
