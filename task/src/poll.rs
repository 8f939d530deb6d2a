use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tessera_api::{ApiError, RemoteApi, TaskHandle, TaskId, TaskRecord, Verdict};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_UNKNOWN_STATUS_BUDGET: u32 = 5;

#[derive(Error, Debug)]
pub enum PollError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The wait was exhausted, not the task: the remote operation keeps
    /// running and may still complete after this error is returned.
    #[error("timed out after {elapsed:?} waiting for task {task}; the remote task may still complete")]
    Timeout { task: TaskId, elapsed: Duration },

    #[error("canceled while waiting for task {task}")]
    Canceled { task: TaskId },

    /// The control plane kept reporting a status this library does not
    /// recognize. Bounded so an unknown future status code cannot hold the
    /// loop open forever.
    #[error("task {task} reported unrecognized status {status:?} {observations} times in a row")]
    UnrecognizedStatus {
        task: TaskId,
        status: String,
        observations: u32,
    },
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Bounds the wait only. Measured from submission
    /// ([`TaskHandle::submitted_at`]), not from the first poll.
    pub timeout: Duration,
    /// Fixed wait between attempts. The control plane has no long-poll or
    /// push notification, so this is the only pacing there is.
    pub interval: Duration,
    /// Consecutive unrecognized-status observations tolerated before the
    /// loop gives up.
    pub unknown_status_budget: u32,
    pub cancel: CancellationToken,
}

impl Default for PollOptions {
    fn default() -> Self {
        PollOptions {
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
            unknown_status_budget: DEFAULT_UNKNOWN_STATUS_BUDGET,
            cancel: CancellationToken::new(),
        }
    }
}

/// Poll a task to a terminal state.
///
/// Returns the last fetched record once a terminal status is observed,
/// whether that status is success, failure, or cancellation of the remote
/// task itself; deciding what a failed record means is the caller's job.
/// The loop polls strictly sequentially and suspends only between attempts,
/// where cancellation of `options.cancel` takes effect immediately.
#[tracing::instrument(skip(api, options), fields(task = %handle.id()))]
pub async fn poll_task(
    api: &dyn RemoteApi,
    handle: &TaskHandle,
    options: &PollOptions,
) -> Result<TaskRecord, PollError> {
    let mut indeterminate_streak = 0u32;

    loop {
        let record = api.get_task(handle.id()).await?;
        debug!(
            status = %record.status,
            progress = record.progress_percentage,
            "polled task"
        );

        match record.status.verdict() {
            Verdict::Success | Verdict::Failure => return Ok(record),
            Verdict::Continue => indeterminate_streak = 0,
            Verdict::Indeterminate => {
                indeterminate_streak += 1;
                warn!(
                    status = %record.status,
                    streak = indeterminate_streak,
                    "task reported unrecognized status"
                );
                if indeterminate_streak >= options.unknown_status_budget {
                    return Err(PollError::UnrecognizedStatus {
                        task: handle.id().clone(),
                        status: record.status.name().to_owned(),
                        observations: indeterminate_streak,
                    });
                }
            }
        }

        let elapsed = handle.submitted_at().elapsed();
        if elapsed >= options.timeout {
            return Err(PollError::Timeout {
                task: handle.id().clone(),
                elapsed,
            });
        }

        tokio::select! {
            _ = options.cancel.cancelled() => {
                return Err(PollError::Canceled {
                    task: handle.id().clone(),
                });
            }
            _ = sleep(options.interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{EntitySelector, extract_affected};

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::{from_value, json};
    use tessera_api::{ResourceRef, ResourceSnapshot, TaskStatus};

    /// Replays a scripted sequence of task records; the last entry repeats.
    struct ScriptedApi {
        records: Mutex<Vec<TaskRecord>>,
        calls: AtomicUsize,
    }

    impl ScriptedApi {
        fn new(records: Vec<TaskRecord>) -> Self {
            ScriptedApi {
                records: Mutex::new(records),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteApi for ScriptedApi {
        async fn get_resource(
            &self,
            resource: &ResourceRef,
        ) -> Result<ResourceSnapshot, ApiError> {
            Err(ApiError::NotFound {
                ext_id: resource.ext_id.clone(),
            })
        }

        async fn get_task(&self, _task: &TaskId) -> Result<TaskRecord, ApiError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let records = self.records.lock().unwrap();
            let index = call.min(records.len() - 1);
            Ok(records[index].clone())
        }
    }

    fn record(status: serde_json::Value) -> TaskRecord {
        from_value(json!({ "extId": "t-1", "status": status })).unwrap()
    }

    fn succeeded_with_entity(ext_id: &str) -> TaskRecord {
        from_value(json!({
            "extId": "t-1",
            "status": "SUCCEEDED",
            "entitiesAffected": [{ "extId": ext_id }]
        }))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_success() {
        let api = ScriptedApi::new(vec![
            record(json!(2)),
            record(json!(3)),
            record(json!(3)),
            succeeded_with_entity("vm-123"),
        ]);
        let handle = TaskHandle::new("t-1");
        let result = poll_task(&api, &handle, &PollOptions::default())
            .await
            .unwrap();
        assert_eq!(result.status, TaskStatus::Succeeded);
        assert_eq!(api.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_terminal_state_stops_the_loop() {
        let api = ScriptedApi::new(vec![record(json!(3)), record(json!(6))]);
        let handle = TaskHandle::new("t-1");
        let result = poll_task(&api, &handle, &PollOptions::default())
            .await
            .unwrap();
        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_does_not_claim_the_task_failed() {
        let api = ScriptedApi::new(vec![record(json!(3))]);
        let handle = TaskHandle::new("t-1");
        let options = PollOptions {
            timeout: Duration::from_secs(10),
            ..Default::default()
        };
        let error = poll_task(&api, &handle, &options).await.unwrap_err();
        match error {
            PollError::Timeout { task, elapsed } => {
                assert_eq!(task.as_str(), "t-1");
                assert!(elapsed >= Duration::from_secs(10));
            }
            other => panic!("expected Timeout, got {other:?}"),
        }

        // The remote task kept running and later succeeded; a fresh poll
        // outside the timed call observes that and extracts normally.
        let later = succeeded_with_entity("vm-9");
        assert_eq!(
            extract_affected(&later, &EntitySelector::Only).unwrap(),
            "vm-9"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_distinct_from_timeout() {
        let api = ScriptedApi::new(vec![record(json!(3))]);
        let handle = TaskHandle::new("t-1");
        let options = PollOptions::default();
        options.cancel.cancel();
        let error = poll_task(&api, &handle, &options).await.unwrap_err();
        assert!(matches!(error, PollError::Canceled { .. }));
        // The first fetch still happened; only the wait was interrupted.
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_status_is_bounded() {
        let api = ScriptedApi::new(vec![record(json!(42))]);
        let handle = TaskHandle::new("t-1");
        let error = poll_task(&api, &handle, &PollOptions::default())
            .await
            .unwrap_err();
        match error {
            PollError::UnrecognizedStatus {
                status,
                observations,
                ..
            } => {
                assert_eq!(status, "42");
                assert_eq!(observations, 5);
            }
            other => panic!("expected UnrecognizedStatus, got {other:?}"),
        }
        assert_eq!(api.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn recognized_status_resets_the_unknown_budget() {
        // Unknown statuses interleaved with RUNNING never exhaust the budget.
        let api = ScriptedApi::new(vec![
            record(json!(42)),
            record(json!(3)),
            record(json!(42)),
            record(json!(3)),
            record(json!(42)),
            record(json!(3)),
            record(json!(42)),
            record(json!(5)),
        ]);
        let handle = TaskHandle::new("t-1");
        let result = poll_task(&api, &handle, &PollOptions::default())
            .await
            .unwrap();
        assert_eq!(result.status, TaskStatus::Succeeded);
    }
}
