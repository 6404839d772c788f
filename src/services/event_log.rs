//! Best-effort lifecycle event and hourly aggregate logging.
//!
//! Every write here is fire-and-forget relative to the request that caused
//! it: failures are logged and swallowed, and can never change the HTTP
//! outcome of a start or finish.

use std::{sync::Arc, time::SystemTime};

use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::{
        models::{HourlyDelta, NewEvent, RunOutcome, hour_floor},
        run_store::RunStore,
    },
    dto::format_system_time,
};

/// Reserved lifecycle tag recorded when a run starts.
pub const RUN_START_EVENT: &str = "battle.run_start";
/// Reserved lifecycle tag recorded after a run's single successful finish.
pub const RUN_FINISH_EVENT: &str = "battle.run_finish";

/// Record the start marker for a freshly created run.
pub fn run_started(store: Arc<dyn RunStore>, run_id: Uuid, user_id: Uuid, seed: i64, at: SystemTime) {
    tokio::spawn(async move {
        let event = NewEvent {
            run_id,
            user_id,
            event_type: RUN_START_EVENT.to_owned(),
            payload: json!({
                "seed": seed,
                "started_at": format_system_time(at),
            }),
            created_at: at,
        };

        if let Err(err) = store.insert_event(event).await {
            warn!(%run_id, error = %err, "failed to record run start marker");
        }
    });
}

/// Record the finish marker and fold the run into its hourly bucket.
pub fn run_finished(
    store: Arc<dyn RunStore>,
    run_id: Uuid,
    user_id: Uuid,
    finished_at: SystemTime,
    outcome: RunOutcome,
) {
    tokio::spawn(async move {
        let payload = match serde_json::to_value(&outcome) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(%run_id, error = %err, "failed to serialize finish snapshot");
                json!({})
            }
        };

        let event = NewEvent {
            run_id,
            user_id,
            event_type: RUN_FINISH_EVENT.to_owned(),
            payload,
            created_at: finished_at,
        };
        if let Err(err) = store.insert_event(event).await {
            warn!(%run_id, error = %err, "failed to record run finish marker");
        }

        let delta = HourlyDelta {
            victory: outcome.victory,
            damage: outcome.total_damage,
            duration_seconds: outcome.duration_seconds,
            reward: outcome.reward,
            dps: outcome.dps,
        };
        if let Err(err) = store
            .bump_hourly_stat(user_id, hour_floor(finished_at), delta)
            .await
        {
            warn!(%user_id, error = %err, "failed to bump hourly battle stats");
        }
    });
}
