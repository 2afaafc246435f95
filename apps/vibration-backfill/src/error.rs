use thiserror::Error;
use uuid::Uuid;

/// Failures raised while moving one window of telemetry.
///
/// Only [`PipelineError::Auth`] is fatal to a backfill sweep; every other
/// variant is caught at the scope it belongs to and logged.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("token acquisition failed: {0}")]
    Auth(String),
    #[error("telemetry fetch failed for device {device_id}: {reason}")]
    Fetch { device_id: i64, reason: String },
    #[error("publish to stream {stream_id} failed: {reason}")]
    Publish { stream_id: Uuid, reason: String },
    #[error("invalid window for day offset {offset}: start must precede end")]
    InvalidWindow { offset: u32 },
}

impl PipelineError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Auth(_))
    }

    pub(crate) fn fetch(device_id: i64, reason: impl ToString) -> Self {
        PipelineError::Fetch {
            device_id,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn publish(stream_id: Uuid, reason: impl ToString) -> Self {
        PipelineError::Publish {
            stream_id,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineError;
    use uuid::Uuid;

    #[test]
    fn only_auth_errors_are_fatal() {
        assert!(PipelineError::Auth("no access_token".into()).is_fatal());
        assert!(!PipelineError::fetch(609, "timeout").is_fatal());
        assert!(!PipelineError::publish(Uuid::nil(), "500").is_fatal());
        assert!(!PipelineError::InvalidWindow { offset: 3 }.is_fatal());
    }

    #[test]
    fn fetch_error_names_the_device() {
        let err = PipelineError::fetch(610, "connection refused");
        assert_eq!(
            err.to_string(),
            "telemetry fetch failed for device 610: connection refused"
        );
    }
}
