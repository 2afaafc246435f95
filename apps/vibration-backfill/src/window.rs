use crate::error::PipelineError;
use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Half-open `[start, end)` range requested from CoNNXT for one day offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub offset: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(
        offset: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, PipelineError> {
        if start >= end {
            return Err(PipelineError::InvalidWindow { offset });
        }
        Ok(Self { offset, start, end })
    }

    /// Window ending `offset` days before `now` and spanning `window_hours`.
    pub fn for_offset(
        now: DateTime<Utc>,
        offset: u32,
        window_hours: u32,
    ) -> Result<Self, PipelineError> {
        let end = now
            .trunc_subsecs(0)
            .checked_sub_signed(Duration::days(i64::from(offset)))
            .ok_or(PipelineError::InvalidWindow { offset })?;
        let start = end
            .checked_sub_signed(Duration::hours(i64::from(window_hours)))
            .ok_or(PipelineError::InvalidWindow { offset })?;
        Self::new(offset, start, end)
    }

    pub fn start_param(&self) -> String {
        format_window_bound(self.start)
    }

    pub fn end_param(&self) -> String {
        format_window_bound(self.end)
    }
}

/// `2024-09-11T00:00:00.000Z`
pub fn format_window_bound(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillPlan {
    pub days: u32,
    pub window_hours: u32,
    pub start_offset: u32,
}

impl Default for BackfillPlan {
    fn default() -> Self {
        Self {
            days: 9,
            window_hours: 24,
            start_offset: 0,
        }
    }
}

/// One window per day offset, most recent first. Each entry fails on its own
/// so a bad offset never hides the remaining days.
pub fn generate_windows(
    now: DateTime<Utc>,
    plan: &BackfillPlan,
) -> Vec<Result<TimeWindow, PipelineError>> {
    (0..plan.days)
        .map(|i| {
            let offset = plan
                .start_offset
                .checked_add(i)
                .ok_or(PipelineError::InvalidWindow { offset: u32::MAX })?;
            TimeWindow::for_offset(now, offset, plan.window_hours)
        })
        .collect()
}
