mod config;
mod http;

pub use crate::config::ClientConfig;
pub use crate::http::{ClientError, HttpRemoteApi};
