use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ErrorKind {
    Timeout,
    Network,
    Upstream,
    Validation,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Network => "network",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Validation => "validation",
            ErrorKind::Unknown => "unknown",
        }
    }
}

/// Failure of one gateway call, classified by cause.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("{operation} timed out after {}ms", after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("{operation} could not reach the server: {message}")]
    Network {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} failed upstream ({status}): {message}")]
    Upstream {
        operation: &'static str,
        status: String,
        http_status: Option<u16>,
        message: String,
    },

    #[error("{operation} returned an unexpected response: {message}")]
    Validation {
        operation: &'static str,
        message: String,
    },

    #[error("{0}")]
    Unknown(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Timeout { .. } => ErrorKind::Timeout,
            ApiError::Network { .. } => ErrorKind::Network,
            ApiError::Upstream { .. } => ErrorKind::Upstream,
            ApiError::Validation { .. } => ErrorKind::Validation,
            ApiError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout { .. })
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, ApiError::Network { .. })
    }

    /// Upstream status sub-code such as `auth_failed` or `http_503`.
    pub fn status(&self) -> Option<&str> {
        match self {
            ApiError::Upstream { status, .. } => Some(status),
            _ => None,
        }
    }

    /// Server-provided text, used as the detail of user-facing messages.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Upstream { message, .. } if !message.is_empty() => Some(message),
            ApiError::Validation { message, .. } => Some(message),
            ApiError::Unknown(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Upstream {
                http_status: Some(code),
                ..
            } => *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }

    pub(crate) fn from_reqwest(operation: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout {
                operation,
                after: Duration::ZERO,
            }
        } else if err.is_decode() {
            ApiError::Validation {
                operation,
                message: err.to_string(),
            }
        } else {
            ApiError::Network {
                operation,
                message: err.to_string(),
            }
        }
    }
}
