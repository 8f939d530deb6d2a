use tokio::time::Instant;

/// Conditional-write validator for a resource, taken from the `ETag` header
/// of the read that preceded a mutation.
///
/// Single-use: a token is fetched fresh for the one mutating call it guards
/// and discarded afterwards. It is never cached across operations, because
/// the resource may change in between.
#[derive(Debug, Clone)]
pub struct VersionToken {
    value: String,
    read_at: Instant,
}

impl VersionToken {
    pub fn new(value: impl Into<String>) -> Self {
        VersionToken {
            value: value.into(),
            read_at: Instant::now(),
        }
    }

    /// The value to send as the `If-Match` request header.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn read_at(&self) -> Instant {
        self.read_at
    }
}

/// Current representation of a resource as read from the control plane.
///
/// The payload is kept as raw JSON: this library only needs the version
/// token from the response metadata, and handlers re-reading a payload
/// should not require this core to know their schema.
#[derive(Debug, Clone)]
pub struct ResourceSnapshot {
    pub ext_id: String,
    pub version: Option<VersionToken>,
    pub body: serde_json::Value,
}
