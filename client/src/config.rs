use std::time::Duration;

use url::Url;

const DEFAULT_USER_AGENT: &str = concat!("tessera/", env!("CARGO_PKG_VERSION"));
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TASKS_PATH: &str = "prism/v4.0/config/tasks";

/// Connection settings for the control plane.
///
/// `request_timeout` bounds a single HTTP request; the poll-phase deadline
/// is a separate, caller-supplied concern.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://pc.example:9440/api/`.
    pub endpoint: Url,
    pub username: String,
    pub password: String,
    /// Accept self-signed certificates. Common on lab control planes.
    pub insecure: bool,
    pub user_agent: String,
    pub request_timeout: Duration,
    /// Collection path tasks are polled from, relative to `endpoint`.
    pub tasks_path: String,
}

impl ClientConfig {
    pub fn new(endpoint: Url, username: impl Into<String>, password: impl Into<String>) -> Self {
        ClientConfig {
            endpoint,
            username: username.into(),
            password: password.into(),
            insecure: false,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            tasks_path: DEFAULT_TASKS_PATH.to_owned(),
        }
    }
}
