//! Run lifecycle orchestration: start, mid-run events, and the race-safe finish.

use std::{
    sync::Arc,
    time::{Instant, SystemTime},
};

use rand::Rng;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{BATTLE_KIND_BOSS_RUN, NewEvent, NewRun, RunEntity, RunOutcome},
    dao::run_store::RunStore,
    dto::battle::{
        FinishRunRequest, FinishRunResponse, OkResponse, RunEventRequest, StartRunRequest,
        StartRunResponse,
    },
    dto::validation::bound_event_type,
    error::ServiceError,
    services::{event_log, grading, rate_limit, telemetry},
    state::SharedState,
};

/// Start a new run for `user_id`, subject to both rate-limit layers.
///
/// The fast path is consulted first as a cheap short-circuit; the
/// store-backed checks remain the authoritative boundary.
pub async fn start_run(
    state: &SharedState,
    user_id: Uuid,
    request: StartRunRequest,
) -> Result<StartRunResponse, ServiceError> {
    let store = state.require_run_store().await?;
    let limits = state.config().rate_limits();
    let now = SystemTime::now();

    rate_limit::check_fast_path(state.throttle(), limits, user_id, Instant::now())
        .map_err(ServiceError::RateLimited)?;
    rate_limit::check_authoritative(&store, limits, user_id, now)
        .await?
        .map_err(ServiceError::RateLimited)?;

    let seed = request
        .seed
        .unwrap_or_else(|| rand::rng().random::<i64>());

    let run_id = store
        .insert_run(NewRun {
            user_id,
            battle_kind: BATTLE_KIND_BOSS_RUN.to_owned(),
            seed,
            started_at: now,
        })
        .await?;

    state.throttle().record_start(user_id, Instant::now());
    event_log::run_started(store, run_id, user_id, seed, now);

    info!(%run_id, %user_id, "run started");
    Ok(StartRunResponse { run_id })
}

/// Append a free-form mid-run event to an active run owned by the caller.
pub async fn record_event(
    state: &SharedState,
    user_id: Uuid,
    request: RunEventRequest,
) -> Result<OkResponse, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::Telemetry(invalid_payload(err)))?;

    let store = state.require_run_store().await?;
    let run = load_owned_run(&store, request.run_id, user_id).await?;
    if run.is_finished() {
        return Err(ServiceError::AlreadyFinished);
    }

    store
        .insert_event(NewEvent {
            run_id: run.id,
            user_id,
            event_type: bound_event_type(&request.event_type),
            payload: request.payload.unwrap_or(serde_json::Value::Null),
            created_at: SystemTime::now(),
        })
        .await?;

    Ok(OkResponse::acknowledged())
}

/// Score a run exactly once from its reported telemetry.
///
/// Validation happens before any store access; the state transition itself is
/// a single conditional write, so two concurrent calls resolve to one success
/// and one `AlreadyFinished` no matter how they interleave.
pub async fn finish_run(
    state: &SharedState,
    user_id: Uuid,
    request: FinishRunRequest,
) -> Result<FinishRunResponse, ServiceError> {
    telemetry::validate(&request)?;

    let store = state.require_run_store().await?;
    let run = load_owned_run(&store, request.run_id, user_id).await?;
    if run.is_finished() {
        return Err(ServiceError::AlreadyFinished);
    }

    let dps = telemetry::recompute_dps(request.total_damage, request.duration_seconds);
    let grade = grading::grade(request.victory, dps, request.max_combo);
    let reward = if request.victory {
        grading::reward(grade, dps)
    } else {
        0
    };

    let outcome = RunOutcome {
        victory: request.victory,
        duration_seconds: request.duration_seconds,
        hits: request.hits,
        crits: request.crits,
        blocks: request.blocks,
        max_combo: request.max_combo,
        total_damage: request.total_damage,
        dps,
        grade,
        reward,
        points_total: request.total_damage,
    };

    let finished_at = SystemTime::now();
    let applied = store
        .finish_run(run.id, user_id, finished_at, outcome.clone())
        .await?;
    if !applied {
        // The initial read said unfinished, but another call won the write.
        return Err(ServiceError::AlreadyFinished);
    }

    event_log::run_finished(store, run.id, user_id, finished_at, outcome);

    info!(
        run_id = %run.id,
        %user_id,
        grade = grade.as_str(),
        reward,
        dps,
        "run finished"
    );
    Ok(FinishRunResponse {
        ok: true,
        grade,
        reward,
    })
}

/// Fetch a run visible to `user_id`.
///
/// A run owned by someone else surfaces as `NotFound`, so probing cannot
/// reveal whether a foreign run id exists.
async fn load_owned_run(
    store: &Arc<dyn RunStore>,
    run_id: Uuid,
    user_id: Uuid,
) -> Result<RunEntity, ServiceError> {
    let run = store.find_run(run_id).await?;
    match run {
        Some(run) if run.user_id == user_id => Ok(run),
        _ => Err(ServiceError::NotFound(format!("run `{run_id}` not found"))),
    }
}

fn invalid_payload(err: validator::ValidationErrors) -> telemetry::TelemetryError {
    telemetry::TelemetryError::InvalidPayload(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    use crate::{
        config::AppConfig,
        dao::{models::hour_floor, run_store::RunStore, run_store::memory::MemoryRunStore},
        services::event_log::{RUN_FINISH_EVENT, RUN_START_EVENT},
        services::grading::Grade,
        services::rate_limit::RateLimitReason,
        state::AppState,
    };

    async fn state_with_store() -> (SharedState, MemoryRunStore) {
        let store = MemoryRunStore::new();
        let state = AppState::new(AppConfig::default());
        state
            .set_run_store(Arc::new(store.clone()) as Arc<dyn RunStore>)
            .await;
        (state, store)
    }

    fn victory_payload(run_id: Uuid) -> FinishRunRequest {
        FinishRunRequest {
            run_id,
            victory: true,
            duration_seconds: 10.0,
            hits: 25,
            crits: 5,
            blocks: 3,
            max_combo: 8,
            total_damage: 600,
            dps: Some(9_999.0),
        }
    }

    /// Let the fire-and-forget logging tasks run to completion.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn start_then_finish_grades_and_persists() {
        let (state, store) = state_with_store().await;
        let user = Uuid::new_v4();

        let started = start_run(&state, user, StartRunRequest { seed: Some(7) })
            .await
            .unwrap();

        let response = finish_run(&state, user, victory_payload(started.run_id))
            .await
            .unwrap();

        // 600 damage over 10s = 60 DPS: an S worth 25 + 15 shells.
        assert!(response.ok);
        assert_eq!(response.grade, Grade::S);
        assert_eq!(response.reward, 40);

        let run = store.find_run(started.run_id).await.unwrap().unwrap();
        assert!(run.is_finished());
        let outcome = run.outcome.unwrap();
        assert_eq!(outcome.dps, 60.0);
        assert_eq!(outcome.points_total, 600);
        assert_eq!(outcome.reward, 40);
    }

    #[tokio::test]
    async fn client_supplied_dps_is_ignored() {
        let (state, store) = state_with_store().await;
        let user = Uuid::new_v4();
        let started = start_run(&state, user, StartRunRequest::default())
            .await
            .unwrap();

        let mut payload = victory_payload(started.run_id);
        payload.dps = Some(1.0);
        finish_run(&state, user, payload).await.unwrap();

        let run = store.find_run(started.run_id).await.unwrap().unwrap();
        assert_eq!(run.outcome.unwrap().dps, 60.0);
    }

    #[tokio::test]
    async fn defeat_awards_nothing() {
        let (state, _store) = state_with_store().await;
        let user = Uuid::new_v4();
        let started = start_run(&state, user, StartRunRequest::default())
            .await
            .unwrap();

        let mut payload = victory_payload(started.run_id);
        payload.victory = false;
        let response = finish_run(&state, user, payload).await.unwrap();

        assert_eq!(response.grade, Grade::C);
        assert_eq!(response.reward, 0);
    }

    #[tokio::test]
    async fn second_finish_is_already_finished() {
        let (state, _store) = state_with_store().await;
        let user = Uuid::new_v4();
        let started = start_run(&state, user, StartRunRequest::default())
            .await
            .unwrap();

        finish_run(&state, user, victory_payload(started.run_id))
            .await
            .unwrap();
        let second = finish_run(&state, user, victory_payload(started.run_id)).await;
        assert!(matches!(second, Err(ServiceError::AlreadyFinished)));
    }

    #[tokio::test]
    async fn concurrent_finishes_resolve_to_one_success() {
        let (state, _store) = state_with_store().await;
        let user = Uuid::new_v4();
        let started = start_run(&state, user, StartRunRequest::default())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..6 {
            let state = state.clone();
            let payload = victory_payload(started.run_id);
            handles.push(tokio::spawn(async move {
                finish_run(&state, user, payload).await
            }));
        }

        let mut successes = 0;
        let mut already_finished = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(ServiceError::AlreadyFinished) => already_finished += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(already_finished, 5);
    }

    #[tokio::test]
    async fn foreign_runs_surface_as_not_found() {
        let (state, _store) = state_with_store().await;
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let started = start_run(&state, owner, StartRunRequest::default())
            .await
            .unwrap();

        let finish = finish_run(&state, intruder, victory_payload(started.run_id)).await;
        assert!(matches!(finish, Err(ServiceError::NotFound(_))));

        let event = record_event(
            &state,
            intruder,
            RunEventRequest {
                run_id: started.run_id,
                event_type: "tap".into(),
                payload: None,
            },
        )
        .await;
        assert!(matches!(event, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn mid_run_events_rejected_after_finish() {
        let (state, store) = state_with_store().await;
        let user = Uuid::new_v4();
        let started = start_run(&state, user, StartRunRequest::default())
            .await
            .unwrap();

        record_event(
            &state,
            user,
            RunEventRequest {
                run_id: started.run_id,
                event_type: "tap".into(),
                payload: Some(serde_json::json!({"x": 1})),
            },
        )
        .await
        .unwrap();

        finish_run(&state, user, victory_payload(started.run_id))
            .await
            .unwrap();

        let rejected = record_event(
            &state,
            user,
            RunEventRequest {
                run_id: started.run_id,
                event_type: "tap".into(),
                payload: None,
            },
        )
        .await;
        assert!(matches!(rejected, Err(ServiceError::AlreadyFinished)));

        settle().await;
        let events = store.events_for_run(started.run_id);
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert!(types.contains(&RUN_START_EVENT));
        assert!(types.contains(&"tap"));
        assert!(types.contains(&RUN_FINISH_EVENT));
    }

    #[tokio::test]
    async fn event_types_are_bounded_in_length() {
        let (state, store) = state_with_store().await;
        let user = Uuid::new_v4();
        let started = start_run(&state, user, StartRunRequest::default())
            .await
            .unwrap();

        record_event(
            &state,
            user,
            RunEventRequest {
                run_id: started.run_id,
                event_type: "t".repeat(500),
                payload: None,
            },
        )
        .await
        .unwrap();

        let events = store.events_for_run(started.run_id);
        let stored = events
            .iter()
            .find(|e| e.event_type.starts_with('t'))
            .unwrap();
        assert_eq!(stored.event_type.len(), 64);
    }

    #[tokio::test]
    async fn fourth_start_in_burst_window_is_throttled() {
        let (state, _store) = state_with_store().await;
        let user = Uuid::new_v4();

        // First start succeeds; wait out the cooldown before each subsequent
        // one so only the fast path can trip.
        for _ in 0..3 {
            start_run(&state, user, StartRunRequest::default())
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
            finish_all_runs(&state, user).await;
        }

        let fourth = start_run(&state, user, StartRunRequest::default()).await;
        assert!(matches!(
            fourth,
            Err(ServiceError::RateLimited(
                RateLimitReason::TooManyRecentStarts
            ))
        ));
    }

    #[tokio::test]
    async fn daily_cap_rejects_the_thirty_first_run() {
        let (state, store) = state_with_store().await;
        let user = Uuid::new_v4();
        let now = SystemTime::now();

        // Seed 30 finished runs spread over the trailing day, bypassing the
        // service so the fast path stays cold.
        for i in 0..30u64 {
            let id = store
                .insert_run(NewRun {
                    user_id: user,
                    battle_kind: BATTLE_KIND_BOSS_RUN.to_owned(),
                    seed: 0,
                    started_at: now - Duration::from_secs(600 * (i + 1)),
                })
                .await
                .unwrap();
            store
                .finish_run(id, user, now, defeated_outcome())
                .await
                .unwrap();
        }

        let rejected = start_run(&state, user, StartRunRequest::default()).await;
        assert!(matches!(
            rejected,
            Err(ServiceError::RateLimited(RateLimitReason::DailyCapReached))
        ));
    }

    #[tokio::test]
    async fn cooldown_blocks_restart_behind_an_unfinished_run() {
        let (state, _store) = state_with_store().await;
        let user = Uuid::new_v4();

        start_run(&state, user, StartRunRequest::default())
            .await
            .unwrap();

        let rushed = start_run(&state, user, StartRunRequest::default()).await;
        assert!(matches!(
            rushed,
            Err(ServiceError::RateLimited(RateLimitReason::CooldownActive))
        ));
    }

    #[tokio::test]
    async fn finish_rolls_the_hourly_bucket() {
        let (state, store) = state_with_store().await;
        let user = Uuid::new_v4();
        let started = start_run(&state, user, StartRunRequest::default())
            .await
            .unwrap();

        finish_run(&state, user, victory_payload(started.run_id))
            .await
            .unwrap();
        settle().await;

        let bucket = store
            .hourly_stat(user, hour_floor(SystemTime::now()))
            .expect("hourly bucket should exist");
        assert_eq!(bucket.runs, 1);
        assert_eq!(bucket.victories, 1);
        assert_eq!(bucket.total_damage, 600);
        assert_eq!(bucket.total_reward, 40);
    }

    #[tokio::test]
    async fn telemetry_rejections_leave_the_run_unfinished() {
        let (state, store) = state_with_store().await;
        let user = Uuid::new_v4();
        let started = start_run(&state, user, StartRunRequest::default())
            .await
            .unwrap();

        let mut payload = victory_payload(started.run_id);
        payload.duration_seconds = 3.9;
        let rejected = finish_run(&state, user, payload).await;
        assert!(matches!(
            rejected,
            Err(ServiceError::Telemetry(
                telemetry::TelemetryError::InvalidDuration { .. }
            ))
        ));

        let run = store.find_run(started.run_id).await.unwrap().unwrap();
        assert!(!run.is_finished());
    }

    #[tokio::test]
    async fn operations_fail_cleanly_without_a_store() {
        let state = AppState::new(AppConfig::default());
        let user = Uuid::new_v4();

        let started = start_run(&state, user, StartRunRequest::default()).await;
        assert!(matches!(started, Err(ServiceError::Degraded)));
    }

    fn defeated_outcome() -> RunOutcome {
        RunOutcome {
            victory: false,
            duration_seconds: 5.0,
            hits: 10,
            crits: 1,
            blocks: 1,
            max_combo: 4,
            total_damage: 200,
            dps: 40.0,
            grade: Grade::C,
            reward: 0,
            points_total: 200,
        }
    }

    async fn finish_all_runs(state: &SharedState, user: Uuid) {
        let store = state.require_run_store().await.unwrap();
        if let Some(run) = store
            .latest_run_started_since(user, SystemTime::now() - Duration::from_secs(3_600))
            .await
            .unwrap()
        {
            if !run.is_finished() {
                store
                    .finish_run(run.id, user, SystemTime::now(), defeated_outcome())
                    .await
                    .unwrap();
            }
        }
    }
}
