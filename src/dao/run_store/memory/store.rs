use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::SystemTime,
};

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{
        EventEntity, HourlyDelta, HourlyStatEntity, NewEvent, NewRun, RunEntity, RunOutcome,
    },
    run_store::RunStore,
    storage::StorageResult,
};

/// In-memory [`RunStore`] holding all records behind one mutex.
#[derive(Clone, Default)]
pub struct MemoryRunStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    runs: HashMap<Uuid, RunEntity>,
    events: Vec<EventEntity>,
    hourly: HashMap<(Uuid, i64), HourlyStatEntity>,
}

impl MemoryRunStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded for a run, oldest first.
    ///
    /// Test helper; the serving path never reads events back.
    pub fn events_for_run(&self, run_id: Uuid) -> Vec<EventEntity> {
        let state = self.lock();
        state
            .events
            .iter()
            .filter(|event| event.run_id == run_id)
            .cloned()
            .collect()
    }

    /// Snapshot of a player's hourly bucket, if any increment reached it.
    pub fn hourly_stat(&self, user_id: Uuid, hour_start: i64) -> Option<HourlyStatEntity> {
        let state = self.lock();
        state.hourly.get(&(user_id, hour_start)).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // Recover from poisoning; the records stay consistent either way.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RunStore for MemoryRunStore {
    fn insert_run(&self, run: NewRun) -> BoxFuture<'static, StorageResult<Uuid>> {
        let store = self.clone();
        Box::pin(async move {
            let id = Uuid::new_v4();
            let entity = RunEntity {
                id,
                user_id: run.user_id,
                battle_kind: run.battle_kind,
                seed: run.seed,
                started_at: run.started_at,
                finished_at: None,
                outcome: None,
            };
            store.lock().runs.insert(id, entity);
            Ok(id)
        })
    }

    fn find_run(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RunEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.lock().runs.get(&id).cloned()) })
    }

    fn finish_run(
        &self,
        id: Uuid,
        user_id: Uuid,
        finished_at: SystemTime,
        outcome: RunOutcome,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut state = store.lock();
            let Some(run) = state.runs.get_mut(&id) else {
                return Ok(false);
            };
            if run.user_id != user_id || run.finished_at.is_some() {
                return Ok(false);
            }

            run.finished_at = Some(finished_at);
            run.outcome = Some(outcome);
            Ok(true)
        })
    }

    fn count_runs_started_since(
        &self,
        user_id: Uuid,
        since: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let state = store.lock();
            let count = state
                .runs
                .values()
                .filter(|run| run.user_id == user_id && run.started_at >= since)
                .count();
            Ok(count as u64)
        })
    }

    fn latest_run_started_since(
        &self,
        user_id: Uuid,
        since: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RunEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let state = store.lock();
            let latest = state
                .runs
                .values()
                .filter(|run| run.user_id == user_id && run.started_at >= since)
                .max_by_key(|run| run.started_at)
                .cloned();
            Ok(latest)
        })
    }

    fn insert_event(&self, event: NewEvent) -> BoxFuture<'static, StorageResult<EventEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let entity = EventEntity {
                id: Uuid::new_v4(),
                run_id: event.run_id,
                user_id: event.user_id,
                event_type: event.event_type,
                payload: event.payload,
                created_at: event.created_at,
            };
            store.lock().events.push(entity.clone());
            Ok(entity)
        })
    }

    fn bump_hourly_stat(
        &self,
        user_id: Uuid,
        hour_start: i64,
        delta: HourlyDelta,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut state = store.lock();
            let bucket = state
                .hourly
                .entry((user_id, hour_start))
                .or_insert_with(|| HourlyStatEntity {
                    user_id,
                    hour_start,
                    runs: 0,
                    victories: 0,
                    total_damage: 0,
                    total_duration_seconds: 0.0,
                    total_reward: 0,
                    total_dps: 0.0,
                });

            bucket.runs += 1;
            bucket.victories += u64::from(delta.victory);
            bucket.total_damage += u64::from(delta.damage);
            bucket.total_duration_seconds += delta.duration_seconds;
            bucket.total_reward += u64::from(delta.reward);
            bucket.total_dps += delta.dps;
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
