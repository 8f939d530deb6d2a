mod error;
mod fault;
mod remote;
mod resource;
mod task;

pub use crate::error::ApiError;
pub use crate::fault::{FaultMessage, RemoteFault};
pub use crate::remote::{RemoteApi, ResourceRef};
pub use crate::resource::{ResourceSnapshot, VersionToken};
pub use crate::task::{
    AffectedEntity, TaskHandle, TaskId, TaskMessage, TaskRecord, TaskStatus, Verdict,
};
