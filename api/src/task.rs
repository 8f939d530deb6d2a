use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize, de};
use tokio::time::Instant;

use crate::fault::deserialize_code;

/// Opaque identifier of an asynchronous remote task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        TaskId(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        TaskId(value.to_owned())
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a task returned by a mutating call that succeeded at the
/// transport level. Consumed exactly once by the poll loop.
///
/// `submitted_at` anchors timeout accounting: the poll deadline is measured
/// from submission, not from the first poll attempt.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    submitted_at: Instant,
}

impl TaskHandle {
    pub fn new(id: impl Into<TaskId>) -> Self {
        TaskHandle {
            id: id.into(),
            submitted_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }
}

/// Task lifecycle state as reported by the control plane.
///
/// The wire form is either an integer code or a name; some legacy endpoints
/// spell names with a `k` prefix (`kSucceeded`). Anything else decodes to
/// [`TaskStatus::Unrecognized`] so a future status code can never crash the
/// decoder, only stall it (and the poller bounds how long).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Queued,
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Unrecognized(String),
}

/// What the poll loop should do with an observed status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Non-terminal, keep polling.
    Continue,
    /// Terminal, the task completed.
    Success,
    /// Terminal, the task failed or was canceled.
    Failure,
    /// Not a known status; non-terminal, but only for a bounded number of
    /// consecutive observations.
    Indeterminate,
}

impl TaskStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => TaskStatus::Queued,
            3 => TaskStatus::Running,
            5 => TaskStatus::Succeeded,
            6 => TaskStatus::Failed,
            7 => TaskStatus::Canceled,
            other => TaskStatus::Unrecognized(other.to_string()),
        }
    }

    pub fn from_name(name: &str) -> Self {
        // Legacy endpoints report `kSucceeded` etc.
        let trimmed = name
            .strip_prefix('k')
            .filter(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
            .unwrap_or(name);
        if trimmed.eq_ignore_ascii_case("QUEUED") {
            TaskStatus::Queued
        } else if trimmed.eq_ignore_ascii_case("PENDING") {
            TaskStatus::Pending
        } else if trimmed.eq_ignore_ascii_case("RUNNING") {
            TaskStatus::Running
        } else if trimmed.eq_ignore_ascii_case("SUCCEEDED") {
            TaskStatus::Succeeded
        } else if trimmed.eq_ignore_ascii_case("FAILED") {
            TaskStatus::Failed
        } else if trimmed.eq_ignore_ascii_case("CANCELED") || trimmed.eq_ignore_ascii_case("CANCELLED")
        {
            TaskStatus::Canceled
        } else {
            TaskStatus::Unrecognized(name.to_owned())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TaskStatus::Queued => "QUEUED",
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Succeeded => "SUCCEEDED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Canceled => "CANCELED",
            TaskStatus::Unrecognized(raw) => raw,
        }
    }

    /// Pure classification: same status, same verdict, no hidden state.
    pub fn verdict(&self) -> Verdict {
        match self {
            TaskStatus::Queued | TaskStatus::Pending | TaskStatus::Running => Verdict::Continue,
            TaskStatus::Succeeded => Verdict::Success,
            TaskStatus::Failed | TaskStatus::Canceled => Verdict::Failure,
            TaskStatus::Unrecognized(_) => Verdict::Indeterminate,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.verdict(), Verdict::Success | Verdict::Failure)
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for TaskStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct StatusVisitor;

        impl de::Visitor<'_> for StatusVisitor {
            type Value = TaskStatus;

            fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "a task status code or name")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<TaskStatus, E> {
                Ok(TaskStatus::from_code(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<TaskStatus, E> {
                Ok(TaskStatus::from_code(value as i64))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<TaskStatus, E> {
                Ok(TaskStatus::from_name(value))
            }
        }

        deserializer.deserialize_any(StatusVisitor)
    }
}

/// One error entry reported by a failed or canceled task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMessage {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "deserialize_code")]
    pub code: Option<String>,
}

/// An entity a task touched, with the role it played (`rel`). A clone task
/// reports both the source and the destination; `rel` is what tells them
/// apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedEntity {
    pub ext_id: String,
    #[serde(default)]
    pub rel: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Polled snapshot of a task. Re-read by the poller, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub ext_id: String,
    pub status: TaskStatus,
    /// Advisory only; never used to decide terminality.
    #[serde(default)]
    pub progress_percentage: Option<u8>,
    #[serde(default)]
    pub error_messages: Vec<TaskMessage>,
    /// Populated only in the success terminal state.
    #[serde(default)]
    pub entities_affected: Vec<AffectedEntity>,
}

impl TaskRecord {
    /// Every reported failure message, in order. Entries with no message
    /// fall back to their code so nothing reported by the remote is dropped.
    pub fn failure_messages(&self) -> Vec<String> {
        self.error_messages
            .iter()
            .filter_map(|entry| {
                entry
                    .message
                    .clone()
                    .or_else(|| entry.code.clone())
            })
            .collect()
    }
}
