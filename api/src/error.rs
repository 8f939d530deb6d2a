use std::error::Error as StdError;

use thiserror::Error;

use crate::fault::{RemoteFault, is_conflict_marker};

/// Everything a remote call can fail with, classified so the caller can
/// decide retry-or-not without string matching.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The call never completed: network, TLS, auth, malformed request.
    #[error("transport failure: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    },

    /// The conditional-write precondition was rejected: the resource changed
    /// since its version token was read. Recoverable by redoing the whole
    /// read-modify-write with a fresh token, never by resubmitting the same
    /// payload.
    #[error("conflict: resource changed since read: {message}")]
    Conflict {
        message: String,
        code: Option<String>,
    },

    /// The control plane reported a structured failure.
    #[error("remote error: {}", .messages.join("; "))]
    Remote {
        messages: Vec<String>,
        code: Option<String>,
        status: Option<u16>,
    },

    /// A failure body that did not match the expected envelope. The raw
    /// text is preserved verbatim, never swallowed.
    #[error("unparsed remote error: {raw}")]
    Unparsed { raw: String },

    #[error("resource not found: {ext_id}")]
    NotFound { ext_id: String },
}

impl ApiError {
    pub fn transport(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        ApiError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn transport_message(message: impl Into<String>) -> Self {
        ApiError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Normalize a non-2xx response body. `status` is the HTTP status when
    /// known; 412 is a conflict regardless of what the body says.
    pub fn from_error_body(status: Option<u16>, raw: &str) -> Self {
        match RemoteFault::parse(raw) {
            Some(fault) => {
                let primary = fault.primary().clone();
                if status == Some(412) || fault.is_conflict() {
                    ApiError::Conflict {
                        message: primary.message,
                        code: primary.code,
                    }
                } else {
                    ApiError::Remote {
                        messages: fault.messages(),
                        code: primary.code,
                        status,
                    }
                }
            }
            None => {
                // Some endpoints report the marker text in a bare
                // (non-JSON) error string; it still means conflict.
                if status == Some(412) || is_conflict_marker(raw, None) {
                    ApiError::Conflict {
                        message: raw.trim().to_owned(),
                        code: None,
                    }
                } else {
                    ApiError::Unparsed {
                        raw: raw.to_owned(),
                    }
                }
            }
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict { .. })
    }
}
