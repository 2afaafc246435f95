
use crate::auth::TokenSource;
use crate::error::PipelineError;
use crate::merge::merge_rows;
use crate::publish::{publish_device, EventSink, PublishStatus, SignalOutcome};
use crate::roster::DeviceSensorMapping;
use crate::source::{fetch_or_empty, TelemetrySource};
use crate::window::{generate_windows, BackfillPlan, TimeWindow};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceStatus {
    /// Fetch failed or returned no rows; nothing was posted.
    Skipped,
    Published(Vec<SignalOutcome>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReport {
    pub device_id: i64,
    pub rows: usize,
    pub status: DeviceStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowReport {
    pub window: TimeWindow,
    pub devices: Vec<DeviceReport>,
}

impl WindowReport {
    pub fn outcomes(&self) -> impl Iterator<Item = &SignalOutcome> {
        self.devices.iter().flat_map(|device| {
            let outcomes: &[SignalOutcome] = match &device.status {
                DeviceStatus::Published(outcomes) => outcomes,
                DeviceStatus::Skipped => &[],
            };
            outcomes
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub days_completed: u32,
    pub days_failed: u32,
    pub devices_skipped: u32,
    pub rows_merged: u64,
    pub records_published: u64,
    pub signals_published: u32,
    pub signals_failed: u32,
}

impl BackfillSummary {
    fn record(&mut self, report: &WindowReport) {
        self.days_completed += 1;
        for device in &report.devices {
            self.rows_merged += device.rows as u64;
            if matches!(device.status, DeviceStatus::Skipped) {
                self.devices_skipped += 1;
            }
        }
        for outcome in report.outcomes() {
            match &outcome.status {
                PublishStatus::Published { records } => {
                    self.signals_published += 1;
                    self.records_published += *records as u64;
                }
                PublishStatus::Rejected { status, body } => {
                    self.signals_failed += 1;
                    tracing::warn!(
                        offset = report.window.offset,
                        stream_id = %outcome.stream_id,
                        status = %status,
                        body = %body,
                        "stream not updated for window"
                    );
                }
                PublishStatus::Failed(reason) => {
                    self.signals_failed += 1;
                    tracing::warn!(
                        offset = report.window.offset,
                        stream_id = %outcome.stream_id,
                        reason = %reason,
                        "stream not updated for window"
                    );
                }
                PublishStatus::NoValues => {}
            }
        }
    }
}

/// Moves telemetry for a roster of sensors from CoNNXT into Lizard, one
/// window at a time. Everything runs sequentially on the caller's task.
pub struct Pipeline<'a, A, S, P> {
    auth: &'a A,
    source: &'a S,
    sink: &'a P,
    roster: &'a [DeviceSensorMapping],
}

impl<'a, A, S, P> Pipeline<'a, A, S, P>
where
    A: TokenSource,
    S: TelemetrySource,
    P: EventSink,
{
    pub fn new(auth: &'a A, source: &'a S, sink: &'a P, roster: &'a [DeviceSensorMapping]) -> Self {
        Self {
            auth,
            source,
            sink,
            roster,
        }
    }

    /// One window across the whole roster. Only token acquisition can fail
    /// the run; fetch and publish problems end up in the report.
    pub async fn run_window(&self, window: &TimeWindow) -> Result<WindowReport, PipelineError> {
        tracing::info!(offset = window.offset, "starting update of vibration sensor data");
        let token = self.auth.acquire_token().await?;

        let mut devices = Vec::with_capacity(self.roster.len());
        for device in self.roster {
            let raw = fetch_or_empty(self.source, &token, device.device_id, window).await;
            let rows = merge_rows(device.device_id, &raw);
            if rows.is_empty() {
                tracing::warn!(device_id = device.device_id, "no data retrieved");
                devices.push(DeviceReport {
                    device_id: device.device_id,
                    rows: 0,
                    status: DeviceStatus::Skipped,
                });
                continue;
            }

            let outcomes = publish_device(self.sink, device, &rows).await;
            devices.push(DeviceReport {
                device_id: device.device_id,
                rows: rows.len(),
                status: DeviceStatus::Published(outcomes),
            });
        }

        tracing::info!(offset = window.offset, "end of update of vibration sensor data");
        Ok(WindowReport {
            window: window.clone(),
            devices,
        })
    }

    /// Run every day of `plan`, most recent first. A failed day is logged and
    /// skipped; an auth failure stops the sweep.
    pub async fn run_backfill(
        &self,
        now: DateTime<Utc>,
        plan: &BackfillPlan,
    ) -> Result<BackfillSummary, PipelineError> {
        let mut summary = BackfillSummary::default();
        for (index, window) in generate_windows(now, plan).into_iter().enumerate() {
            let day = index + 1;
            let result = match window {
                Ok(window) => self.run_window(&window).await,
                Err(err) => Err(err),
            };
            match result {
                Ok(report) => {
                    summary.record(&report);
                    tracing::info!(day, days = plan.days, "day run completed");
                    println!("Retrieved data for day {day} of {} days", plan.days);
                }
                Err(err) if err.is_fatal() => {
                    tracing::error!(day, error = %err, "aborting backfill");
                    return Err(err);
                }
                Err(err) => {
                    summary.days_failed += 1;
                    tracing::error!(day, error = %err, "day run failed");
                    println!("Failed to retrieve data for day {day}: {err}");
                }
            }
        }

        tracing::info!(
            days_completed = summary.days_completed,
            days_failed = summary.days_failed,
            devices_skipped = summary.devices_skipped,
            rows_merged = summary.rows_merged,
            records_published = summary.records_published,
            signals_published = summary.signals_published,
            signals_failed = summary.signals_failed,
            "backfill finished"
        );
        Ok(summary)
    }
}
