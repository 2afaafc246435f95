use crate::error::PipelineError;
use crate::merge::MergedRow;
use crate::roster::{DeviceSensorMapping, SignalKind};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use uuid::Uuid;

/// One event in a Lizard timeseries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishRecord {
    pub time: String,
    pub value: f64,
}

/// Raw answer from the destination. A non-success status is still a
/// response; only transport failures are errors.
#[derive(Debug, Clone)]
pub struct SinkResponse {
    pub status: StatusCode,
    pub body: String,
}

pub trait EventSink {
    async fn post_events(
        &self,
        stream_id: Uuid,
        records: &[PublishRecord],
    ) -> Result<SinkResponse, PipelineError>;
}

/// Lizard timeseries events API.
#[derive(Clone)]
pub struct LizardClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
}

impl LizardClient {
    pub fn new(http: Client, base_url: &str, username: &str, password: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

impl EventSink for LizardClient {
    async fn post_events(
        &self,
        stream_id: Uuid,
        records: &[PublishRecord],
    ) -> Result<SinkResponse, PipelineError> {
        let url = format!("{}/api/v4/timeseries/{stream_id}/events/", self.base_url);
        let body = serde_json::to_vec(records)
            .map_err(|err| PipelineError::publish(stream_id, err))?;
        let response = self
            .http
            .post(url)
            .header("username", &self.username)
            .header("password", &self.password)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| PipelineError::publish(stream_id, err))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Ok(SinkResponse { status, body })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishStatus {
    Published { records: usize },
    Rejected { status: StatusCode, body: String },
    Failed(String),
    NoValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalOutcome {
    pub signal: SignalKind,
    pub stream_id: Uuid,
    pub status: PublishStatus,
}

impl SignalOutcome {
    pub fn attempted(&self) -> bool {
        !matches!(self.status, PublishStatus::NoValues)
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.status, PublishStatus::Published { .. })
    }
}

/// `{time, value}` pairs for one signal; rows without that signal are left
/// out rather than null-filled.
pub fn project(rows: &[MergedRow], signal: SignalKind) -> Vec<PublishRecord> {
    rows.iter()
        .filter_map(|row| {
            row.value(signal.storage_name()).map(|value| PublishRecord {
                time: row.timestamp.clone(),
                value,
            })
        })
        .collect()
}

/// Post every mapped signal of one device. Each signal gets exactly one
/// outcome; a failing stream never stops the ones after it.
pub async fn publish_device<P: EventSink>(
    sink: &P,
    device: &DeviceSensorMapping,
    rows: &[MergedRow],
) -> Vec<SignalOutcome> {
    let mut outcomes = Vec::with_capacity(device.streams.len());
    for entry in &device.streams {
        let records = project(rows, entry.signal);
        let status = if records.is_empty() {
            tracing::info!(
                device_id = device.device_id,
                signal = %entry.signal,
                "no values to publish"
            );
            PublishStatus::NoValues
        } else {
            match sink.post_events(entry.stream_id, &records).await {
                Ok(response) if response.status.is_success() => {
                    tracing::info!(
                        device_id = device.device_id,
                        signal = %entry.signal,
                        records = records.len(),
                        "timeseries updated in Lizard"
                    );
                    PublishStatus::Published {
                        records: records.len(),
                    }
                }
                Ok(response) => {
                    tracing::warn!(
                        device_id = device.device_id,
                        signal = %entry.signal,
                        status = %response.status,
                        body = %response.body,
                        "Lizard rejected events"
                    );
                    PublishStatus::Rejected {
                        status: response.status,
                        body: response.body,
                    }
                }
                Err(err) => {
                    tracing::error!(
                        device_id = device.device_id,
                        signal = %entry.signal,
                        error = %err,
                        "failed to post data to Lizard"
                    );
                    PublishStatus::Failed(err.to_string())
                }
            }
        };
        outcomes.push(SignalOutcome {
            signal: entry.signal,
            stream_id: entry.stream_id,
            status,
        });
    }
    outcomes
}
