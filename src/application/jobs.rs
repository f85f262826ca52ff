use super::outbox::DispatchReport;
use crate::error::{CantinaError, Result};
use std::fmt;

/// Status line printed by the scheduled batch jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResponse {
    pub status: u16,
    pub body: String,
}

impl JobResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn from_error(error: &CantinaError) -> Self {
        Self {
            status: error.status_code(),
            body: error.to_string(),
        }
    }

    pub fn from_result<T>(result: Result<T>, on_ok: impl FnOnce(T) -> JobResponse) -> Self {
        match result {
            Ok(value) => on_ok(value),
            Err(e) => Self::from_error(&e),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<DispatchReport> for JobResponse {
    fn from(report: DispatchReport) -> Self {
        if !report.sender_configured {
            Self::ok("messaging provider not configured")
        } else if report.processed == 0 {
            Self::ok("no pending messages")
        } else {
            Self::ok(format!("processed {}", report.processed))
        }
    }
}

impl fmt::Display for JobResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.body)
    }
}
