//! Domain errors the caller needs to tell apart.
//!
//! Everything else travels as `anyhow::Error`; these variants are wrapped in
//! it and recovered with `downcast_ref::<DashboardError>()`.

use std::fmt;

use crate::types::Month;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    /// Primary CSV has a column count with no known layout
    SchemaMismatch { columns: usize },
    /// Header-bearing CSV lacks a required column
    MissingColumn { name: String },
    /// Publisher has no token configured
    AuthenticationMissing,
    /// Remote service refused the write; `body` is the response verbatim
    RemoteRejected { status: u16, body: String },
    /// Date range whose start falls after its end
    InvalidDateRange { start: Month, end: Month },
}

impl fmt::Display for DashboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaMismatch { columns } => {
                write!(f, "unexpected number of columns: {columns}")
            }
            Self::MissingColumn { name } => write!(f, "missing required column `{name}`"),
            Self::AuthenticationMissing => {
                write!(f, "missing GitHub token; set GITHUB_TOKEN")
            }
            Self::RemoteRejected { status, body } => {
                write!(f, "remote rejected write ({status}): {body}")
            }
            Self::InvalidDateRange { start, end } => {
                write!(f, "date range start {start} is after end {end}")
            }
        }
    }
}

impl std::error::Error for DashboardError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_mismatch_reports_count() {
        let err = anyhow::Error::from(DashboardError::SchemaMismatch { columns: 5 });
        assert_eq!(err.to_string(), "unexpected number of columns: 5");
        assert_eq!(
            err.downcast_ref::<DashboardError>(),
            Some(&DashboardError::SchemaMismatch { columns: 5 })
        );
    }

    #[test]
    fn remote_rejection_keeps_body_verbatim() {
        let body = r#"{"message":"Bad credentials"}"#.to_string();
        let err = DashboardError::RemoteRejected {
            status: 401,
            body: body.clone(),
        };
        assert!(err.to_string().ends_with(&body));
    }
}
