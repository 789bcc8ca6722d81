use serde::Serialize;
use tracing::{error, warn};

use crate::{
    api::{ApiError, ErrorKind},
    store::{Store, paths},
};

use super::status_service::LoadStage;

/// The one place per-kind user-facing text lives.
pub fn user_message(kind: ErrorKind, detail: Option<&str>) -> String {
    let detail = detail.map(str::trim).filter(|detail| !detail.is_empty());
    match kind {
        ErrorKind::Timeout => {
            "The server is not responding. Please try again in a moment.".to_string()
        }
        ErrorKind::Network => {
            "Cannot connect to the server. Check that the API is running.".to_string()
        }
        ErrorKind::Upstream => match detail {
            Some(detail) => format!("The graph database is unavailable: {detail}"),
            None => "The graph database is unavailable.".to_string(),
        },
        ErrorKind::Validation => "The server returned data in an unexpected format.".to_string(),
        ErrorKind::Unknown => match detail {
            Some(detail) => format!("Something went wrong: {detail}"),
            None => "Something went wrong.".to_string(),
        },
    }
}

pub fn message_for(err: &ApiError) -> String {
    user_message(err.kind(), err.detail())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadError {
    pub kind: ErrorKind,
    pub message: String,
    pub stage: LoadStage,
}

/// Writes classified failures to `ui.loadError`.
#[derive(Clone)]
pub struct ErrorReporter {
    store: Store,
}

impl ErrorReporter {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn record(&self, stage: LoadStage, err: &ApiError) -> LoadError {
        let report = LoadError {
            kind: err.kind(),
            message: message_for(err),
            stage,
        };
        error!(
            stage = stage.as_str(),
            kind = report.kind.as_str(),
            error = %err,
            "Graph load failed"
        );
        if let Err(write_err) = self.store.set_serialized(paths::UI_LOAD_ERROR, &report) {
            warn!(error = %write_err, "Failed to record load error");
        }
        report
    }
}
