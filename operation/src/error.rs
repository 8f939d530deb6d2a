use std::time::Duration;

use thiserror::Error;

use tessera_api::{ApiError, TaskId, TaskStatus};
use tessera_task::{ExtractError, PollError};

/// Everything a mutating operation can fail with, as seen by a resource
/// handler. Each variant carries enough structure to decide retry-or-not.
#[derive(Error, Debug)]
pub enum OperationError {
    /// The precondition was rejected: the resource changed between the token
    /// read and the mutation. Retry the whole read-modify-write with a fresh
    /// token and payload.
    #[error("conflict: resource changed since read: {message}")]
    Conflict {
        message: String,
        code: Option<String>,
    },

    /// Only the wait failed. The remote task was not rolled back and may
    /// still complete after this error is returned.
    #[error("timed out after {elapsed:?} waiting for task {task}; the remote operation may still complete")]
    Timeout { task: TaskId, elapsed: Duration },

    #[error("canceled while waiting for task {task}")]
    Canceled { task: TaskId },

    /// The task reached a failure terminal state. Carries every reported
    /// message, not just the first.
    #[error("task {task} ended {status} at {}%: {}", .progress_percent.map_or_else(|| "?".to_owned(), |p| p.to_string()), .messages.join("; "))]
    TaskFailed {
        task: TaskId,
        status: TaskStatus,
        messages: Vec<String>,
        progress_percent: Option<u8>,
    },

    #[error("task {task} reported unrecognized status {status:?} {observations} times in a row")]
    UnrecognizedStatus {
        task: TaskId,
        status: String,
        observations: u32,
    },

    #[error(transparent)]
    Api(ApiError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl From<ApiError> for OperationError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Conflict { message, code } => OperationError::Conflict { message, code },
            other => OperationError::Api(other),
        }
    }
}

impl From<PollError> for OperationError {
    fn from(error: PollError) -> Self {
        match error {
            PollError::Api(api) => api.into(),
            PollError::Timeout { task, elapsed } => OperationError::Timeout { task, elapsed },
            PollError::Canceled { task } => OperationError::Canceled { task },
            PollError::UnrecognizedStatus {
                task,
                status,
                observations,
            } => OperationError::UnrecognizedStatus {
                task,
                status,
                observations,
            },
        }
    }
}
