use serde::{Deserialize, Serialize};

/// Error code the backend attaches to runs rejected for throttling.
pub const RATE_LIMIT_ERROR_CODE: &str = "rate_limit_exceeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
    Expired,
    RequiresAction,
    Incomplete,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Non-terminal statuses the orchestrator keeps polling through.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Queued | Self::InProgress | Self::Cancelling)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl RunError {
    pub fn is_rate_limit(&self) -> bool {
        self.code == RATE_LIMIT_ERROR_CODE
    }
}

/// One execution of the assistant against a thread. Owned by the backend;
/// relaybot only observes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

#[cfg(test)]
mod tests {
    use super::{Run, RunStatus};

    #[test]
    fn run_status_parses_known_and_unknown_values() {
        let run: Run = serde_json::from_str(
            r#"{"id":"run_1","status":"in_progress"}"#,
        )
        .expect("parse run");
        assert_eq!(run.status, RunStatus::InProgress);
        assert!(run.status.is_pending());

        let run: Run = serde_json::from_str(
            r#"{"id":"run_2","status":"some_future_status"}"#,
        )
        .expect("parse run with unknown status");
        assert_eq!(run.status, RunStatus::Unknown);
        assert!(!run.status.is_pending());
    }

    #[test]
    fn run_error_detects_rate_limit_code() {
        let run: Run = serde_json::from_str(
            r#"{"id":"run_3","status":"failed","last_error":{"code":"rate_limit_exceeded","message":"slow down"}}"#,
        )
        .expect("parse failed run");
        let err = run.last_error.expect("last_error present");
        assert!(err.is_rate_limit());

        let run: Run = serde_json::from_str(
            r#"{"id":"run_4","status":"failed","last_error":{"code":"server_error"}}"#,
        )
        .expect("parse failed run");
        let err = run.last_error.expect("last_error present");
        assert!(!err.is_rate_limit());
    }
}
