use tessera_api::{ApiError, RemoteApi, ResourceRef, VersionToken};

/// Re-read a resource and require its version token.
///
/// Called immediately before each mutation; the returned token guards
/// exactly one mutating call and is then discarded. A response without an
/// `ETag` means the mutation cannot be guarded at all, which is treated as
/// an error rather than silently mutating unguarded.
#[tracing::instrument(skip(api))]
pub async fn obtain_token(
    api: &dyn RemoteApi,
    resource: &ResourceRef,
) -> Result<VersionToken, ApiError> {
    let snapshot = api.get_resource(resource).await?;
    snapshot.version.ok_or_else(|| {
        ApiError::transport_message(format!(
            "read of {resource} did not include a version token (ETag header)"
        ))
    })
}
