mod error;
mod guard;

pub use crate::error::OperationError;
pub use crate::guard::obtain_token;

use std::future::Future;

use tracing::debug;

use tessera_api::{ApiError, RemoteApi, ResourceRef, TaskHandle, TaskRecord, Verdict, VersionToken};
use tessera_task::{EntitySelector, PollOptions, extract_affected, poll_task};

/// Per-operation settings.
///
/// `resource` selects the conditional-write behavior: `Some` re-reads the
/// resource for a fresh version token and hands it to the submission closure
/// (update/delete/action flows); `None` skips the guard (create flows, where
/// there is nothing to re-read yet).
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub resource: Option<ResourceRef>,
    pub selector: EntitySelector,
    pub poll: PollOptions,
}

/// Run one mutating operation end to end and return the identifier of the
/// affected entity.
///
/// Sequence: obtain token (when guarded) → `submit` → poll to a terminal
/// state → extract on success, normalize on failure. This is the one entry
/// point resource handlers use, so every mutation shares the same conflict,
/// timeout, and failure semantics.
///
/// A submission that fails at the transport level short-circuits: no task
/// handle exists, so nothing is ever polled. The poll timeout bounds only
/// the wait; on [`OperationError::Timeout`] the remote task keeps running
/// and its outcome is unknown to the caller.
#[tracing::instrument(skip(api, submit, options))]
pub async fn run<F, Fut>(
    api: &dyn RemoteApi,
    submit: F,
    options: RunOptions,
) -> Result<String, OperationError>
where
    F: FnOnce(Option<VersionToken>) -> Fut,
    Fut: Future<Output = Result<TaskHandle, ApiError>>,
{
    let selector = options.selector.clone();
    let record = run_task(api, submit, options).await?;
    Ok(extract_affected(&record, &selector)?)
}

/// Like [`run`], for operations whose caller does not need an entity id
/// back (delete and action flows discard it).
#[tracing::instrument(skip(api, submit, options))]
pub async fn run_to_completion<F, Fut>(
    api: &dyn RemoteApi,
    submit: F,
    options: RunOptions,
) -> Result<(), OperationError>
where
    F: FnOnce(Option<VersionToken>) -> Fut,
    Fut: Future<Output = Result<TaskHandle, ApiError>>,
{
    run_task(api, submit, options).await?;
    Ok(())
}

async fn run_task<F, Fut>(
    api: &dyn RemoteApi,
    submit: F,
    options: RunOptions,
) -> Result<TaskRecord, OperationError>
where
    F: FnOnce(Option<VersionToken>) -> Fut,
    Fut: Future<Output = Result<TaskHandle, ApiError>>,
{
    let RunOptions { resource, poll, .. } = options;

    let token = match &resource {
        Some(resource) => Some(obtain_token(api, resource).await?),
        None => None,
    };

    let handle = submit(token).await?;
    debug!(task = %handle.id(), "mutation submitted");

    let record = poll_task(api, &handle, &poll).await?;
    if record.status.verdict() == Verdict::Success {
        Ok(record)
    } else {
        Err(OperationError::TaskFailed {
            task: handle.id().clone(),
            status: record.status.clone(),
            messages: record.failure_messages(),
            progress_percent: record.progress_percentage,
        })
    }
}
