use crate::auth::BearerToken;
use crate::error::PipelineError;
use crate::merge::RawSignalSeries;
use crate::roster::SignalKind;
use crate::window::TimeWindow;
use reqwest::Client;
use serde::Serialize;

pub trait TelemetrySource {
    async fn fetch_telemetry(
        &self,
        token: &BearerToken,
        device_id: i64,
        window: &TimeWindow,
        signals: &[SignalKind],
    ) -> Result<RawSignalSeries, PipelineError>;
}

/// REST client for the CoNNXT IoT platform.
#[derive(Clone)]
pub struct ConnxtClient {
    http: Client,
    base_url: String,
    client_id: String,
}

impl ConnxtClient {
    pub fn new(http: Client, base_url: &str, client_id: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            client_id: client_id.trim().to_string(),
        }
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn client_id(&self) -> &str {
        &self.client_id
    }
}

#[derive(Serialize)]
struct DataPoint<'a> {
    #[serde(rename = "storageName")]
    storage_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TelemetryRequest<'a> {
    start: String,
    end: String,
    time_zone: &'a str,
    bin: &'a str,
    data_points: Vec<DataPoint<'a>>,
}

impl TelemetrySource for ConnxtClient {
    async fn fetch_telemetry(
        &self,
        token: &BearerToken,
        device_id: i64,
        window: &TimeWindow,
        signals: &[SignalKind],
    ) -> Result<RawSignalSeries, PipelineError> {
        let url = format!("{}/api/Telemetry/{device_id}", self.base_url);
        let payload = TelemetryRequest {
            start: window.start_param(),
            end: window.end_param(),
            time_zone: "UTC",
            bin: "None",
            data_points: signals
                .iter()
                .map(|signal| DataPoint {
                    storage_name: signal.storage_name(),
                })
                .collect(),
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(token.as_str())
            .json(&payload)
            .send()
            .await
            .map_err(|err| PipelineError::fetch(device_id, err))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::fetch(device_id, format!("{status} {text}")));
        }

        let mut body = response
            .bytes()
            .await
            .map_err(|err| PipelineError::fetch(device_id, err))?
            .to_vec();
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(PipelineError::fetch(device_id, "empty response body"));
        }

        let series: Option<RawSignalSeries> = simd_json::serde::from_slice(&mut body)
            .map_err(|err| PipelineError::fetch(device_id, format!("undecodable body: {err}")))?;
        match series {
            Some(series) if series.signal_count() > 0 => Ok(series),
            _ => Err(PipelineError::fetch(device_id, "no data in response")),
        }
    }
}

/// Fetch one device/window, substituting an empty series on any failure so
/// the caller moves on to the next device.
pub async fn fetch_or_empty<S: TelemetrySource>(
    source: &S,
    token: &BearerToken,
    device_id: i64,
    window: &TimeWindow,
) -> RawSignalSeries {
    tracing::info!(
        device_id,
        start = %window.start_param(),
        end = %window.end_param(),
        "fetching telemetry"
    );
    match source
        .fetch_telemetry(token, device_id, window, &SignalKind::REQUESTED)
        .await
    {
        Ok(series) => {
            if series.is_empty() {
                tracing::debug!(device_id, "source returned only empty series");
            }
            series
        }
        Err(err) => {
            tracing::error!(device_id, error = %err, "telemetry fetch failed");
            RawSignalSeries::new()
        }
    }
}
