use async_trait::async_trait;
use reqwest::header::{ETAG, HeaderMap, IF_MATCH};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use tessera_api::{
    ApiError, RemoteApi, ResourceRef, ResourceSnapshot, TaskHandle, TaskId, TaskRecord,
    VersionToken,
};

use crate::config::ClientConfig;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    BuildClient(#[source] reqwest::Error),
}

/// reqwest-backed [`RemoteApi`] implementation, plus the submission helper
/// resource handlers wrap into their closures.
#[derive(Debug, Clone)]
pub struct HttpRemoteApi {
    client: Client,
    config: ClientConfig,
}

impl HttpRemoteApi {
    pub fn new(mut config: ClientConfig) -> Result<Self, ClientError> {
        // Url::join treats a base without a trailing slash as a file and
        // drops its last segment.
        if !config.endpoint.path().ends_with('/') {
            config.endpoint.set_path(&format!("{}/", config.endpoint.path()));
        }

        let mut builder = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone());
        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().map_err(ClientError::BuildClient)?;

        Ok(HttpRemoteApi { client, config })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.config.endpoint.join(path).map_err(|error| {
            ApiError::transport(format!("invalid request path {path:?}"), error)
        })
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&VersionToken>,
    ) -> Result<Response, ApiError> {
        let url = self.url(path)?;
        let mut request = self
            .client
            .request(method, url)
            .basic_auth(&self.config.username, Some(&self.config.password));
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = token {
            request = request.header(IF_MATCH, token.value());
        }
        request
            .send()
            .await
            .map_err(|error| ApiError::transport(format!("request to {path} failed"), error))
    }

    /// Map a non-2xx response into the normalized error taxonomy.
    async fn error_from_response(&self, ext_id: Option<&str>, response: Response) -> ApiError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            if let Some(ext_id) = ext_id {
                return ApiError::NotFound {
                    ext_id: ext_id.to_owned(),
                };
            }
        }
        let raw = response.text().await.unwrap_or_default();
        ApiError::from_error_body(Some(status.as_u16()), &raw)
    }

    async fn json_body(&self, path: &str, response: Response) -> Result<Value, ApiError> {
        response
            .json()
            .await
            .map_err(|error| ApiError::transport(format!("malformed response from {path}"), error))
    }

    /// Issue a mutating call and return the task handle it queued.
    ///
    /// This is the building block for submission closures: handlers decide
    /// method, path, and payload; conflict/transport classification and
    /// task-reference parsing live here, once.
    #[tracing::instrument(skip(self, body, token))]
    pub async fn submit(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&VersionToken>,
    ) -> Result<TaskHandle, ApiError> {
        let response = self.request(method, path, body, token).await?;
        if !response.status().is_success() {
            return Err(self.error_from_response(None, response).await);
        }
        let body = self.json_body(path, response).await?;
        match task_reference(&body) {
            Some(task_id) => {
                debug!(task = %task_id, "mutation accepted");
                Ok(TaskHandle::new(task_id))
            }
            None => Err(ApiError::Unparsed {
                raw: body.to_string(),
            }),
        }
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    #[tracing::instrument(skip(self))]
    async fn get_resource(&self, resource: &ResourceRef) -> Result<ResourceSnapshot, ApiError> {
        let path = format!("{}/{}", resource.collection, resource.ext_id);
        let response = self.request(Method::GET, &path, None, None).await?;
        if !response.status().is_success() {
            return Err(
                self.error_from_response(Some(&resource.ext_id), response)
                    .await,
            );
        }
        let version = version_from_headers(response.headers());
        let body = self.json_body(&path, response).await?;
        Ok(ResourceSnapshot {
            ext_id: resource.ext_id.clone(),
            version,
            body,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn get_task(&self, task: &TaskId) -> Result<TaskRecord, ApiError> {
        let path = format!("{}/{}", self.config.tasks_path, task);
        let response = self.request(Method::GET, &path, None, None).await?;
        if !response.status().is_success() {
            return Err(self.error_from_response(Some(task.as_str()), response).await);
        }
        let body = self.json_body(&path, response).await?;
        serde_json::from_value(unwrap_data(body))
            .map_err(|error| ApiError::transport(format!("malformed task record from {path}"), error))
    }
}

/// Responses wrap their payload in `{ "data": ... }`; unwrap it when
/// present.
fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut fields) => match fields.remove("data") {
            Some(data) => data,
            None => Value::Object(fields),
        },
        other => other,
    }
}

/// The `ETag` header, kept verbatim (quotes included) so it can be echoed
/// back as `If-Match`.
fn version_from_headers(headers: &HeaderMap) -> Option<VersionToken> {
    headers
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .map(VersionToken::new)
}

/// Task reference from a mutation response: `{ "data": { "extId": ... } }`.
fn task_reference(body: &Value) -> Option<TaskId> {
    body.get("data")?
        .get("extId")?
        .as_str()
        .map(TaskId::from)
}
