#[cfg(feature = "memory-store")]
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{EventEntity, HourlyDelta, NewEvent, NewRun, RunEntity, RunOutcome};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for runs, events, and hourly aggregates.
///
/// The authoritative rate-limit checks and the exactly-once finish guarantee
/// both rest on this trait's semantics: `finish_run` must be a single atomic
/// conditional write, and the `*_since` queries must observe the caller's own
/// prior writes.
pub trait RunStore: Send + Sync {
    /// Insert a fresh run row and return its store-assigned id.
    fn insert_run(&self, run: NewRun) -> BoxFuture<'static, StorageResult<Uuid>>;

    /// Fetch a run by id.
    fn find_run(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RunEntity>>>;

    /// Atomically finish a run, conditioned on it still being unfinished and
    /// owned by `user_id`. Returns `false` when no unfinished row matched,
    /// which callers must treat as "already finished".
    fn finish_run(
        &self,
        id: Uuid,
        user_id: Uuid,
        finished_at: SystemTime,
        outcome: RunOutcome,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Count the caller's runs started at or after `since`.
    fn count_runs_started_since(
        &self,
        user_id: Uuid,
        since: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>>;

    /// The caller's most recently started run at or after `since`, if any.
    fn latest_run_started_since(
        &self,
        user_id: Uuid,
        since: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RunEntity>>>;

    /// Append an event row.
    fn insert_event(&self, event: NewEvent) -> BoxFuture<'static, StorageResult<EventEntity>>;

    /// Merge a per-run increment into the (user, hour) aggregate bucket,
    /// creating the bucket when absent.
    fn bump_hourly_stat(
        &self,
        user_id: Uuid,
        hour_start: i64,
        delta: HourlyDelta,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Cheap liveness probe against the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;

    /// Attempt to re-establish the backend connection after a failed probe.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
