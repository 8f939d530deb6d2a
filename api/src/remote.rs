use std::fmt::{self, Display, Formatter};

use async_trait::async_trait;

use crate::error::ApiError;
use crate::resource::ResourceSnapshot;
use crate::task::{TaskId, TaskRecord};

/// Addresses a resource on the control plane: the collection it lives in
/// (a URL path such as `vmm/v4.0/ahv/config/vms`) plus its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub collection: String,
    pub ext_id: String,
}

impl ResourceRef {
    pub fn new(collection: impl Into<String>, ext_id: impl Into<String>) -> Self {
        ResourceRef {
            collection: collection.into(),
            ext_id: ext_id.into(),
        }
    }
}

impl Display for ResourceRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.ext_id)
    }
}

/// The read side of the control plane, injected wherever the lifecycle
/// machinery needs it so the poll loop and orchestrator can be driven by a
/// fake in tests. Mutating calls stay with the caller-supplied submission
/// closure; this trait is deliberately read-only.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Read the current representation of a resource, including its version
    /// token when the response carries one.
    async fn get_resource(&self, resource: &ResourceRef) -> Result<ResourceSnapshot, ApiError>;

    /// Fetch the current record of a task.
    async fn get_task(&self, task: &TaskId) -> Result<TaskRecord, ApiError>;
}
