use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::services::grading::Grade;

/// The single battle kind this core supports.
pub const BATTLE_KIND_BOSS_RUN: &str = "boss_run";

/// One battle attempt persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunEntity {
    /// Store-assigned primary key of the run.
    pub id: Uuid,
    /// Owning player.
    pub user_id: Uuid,
    /// Battle kind tag; fixed to [`BATTLE_KIND_BOSS_RUN`] in this core.
    pub battle_kind: String,
    /// Seed driving the battle script, client-supplied or server-generated.
    pub seed: i64,
    /// Server clock at run creation.
    pub started_at: SystemTime,
    /// Server clock at the single successful finish; `None` while active.
    pub finished_at: Option<SystemTime>,
    /// Write-once outcome, populated together with `finished_at`.
    pub outcome: Option<RunOutcome>,
}

impl RunEntity {
    /// Whether the run has already been scored.
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// Fields required to create a fresh run row; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewRun {
    /// Owning player.
    pub user_id: Uuid,
    /// Battle kind tag.
    pub battle_kind: String,
    /// Seed driving the battle script.
    pub seed: i64,
    /// Server clock at run creation.
    pub started_at: SystemTime,
}

/// Write-once outcome of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunOutcome {
    /// Whether the boss was defeated.
    pub victory: bool,
    /// Client-reported battle duration, bounds-checked by the validator.
    pub duration_seconds: f64,
    /// Landed hits.
    pub hits: u32,
    /// Critical hits among the landed hits.
    pub crits: u32,
    /// Blocked boss attacks.
    pub blocks: u32,
    /// Best combo streak reached during the run.
    pub max_combo: u32,
    /// Total damage dealt to the boss.
    pub total_damage: u32,
    /// Server-recomputed damage per second; client-reported DPS is discarded.
    pub dps: f64,
    /// Letter grade for the run.
    pub grade: Grade,
    /// Shells awarded; zero on defeat.
    pub reward: u32,
    /// Legacy mirror of `total_damage` kept for the points ledger.
    pub points_total: u32,
}

/// Append-only telemetry record tied to a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEntity {
    /// Primary key of the event.
    pub id: Uuid,
    /// Run this event belongs to.
    pub run_id: Uuid,
    /// Owner of the run; always matches the run row.
    pub user_id: Uuid,
    /// Short event tag, either a reserved lifecycle marker or a free-form
    /// mid-run action type.
    pub event_type: String,
    /// Opaque structured payload stored as-is.
    pub payload: serde_json::Value,
    /// Server clock at insertion.
    pub created_at: SystemTime,
}

/// Fields required to append an event; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Run this event belongs to.
    pub run_id: Uuid,
    /// Owner of the run.
    pub user_id: Uuid,
    /// Short event tag.
    pub event_type: String,
    /// Opaque structured payload.
    pub payload: serde_json::Value,
    /// Server clock at insertion.
    pub created_at: SystemTime,
}

/// Best-effort per-hour aggregate keyed by (player, wall-clock hour floor).
///
/// Advisory observability data; losing an increment must never affect the
/// correctness of run or event records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HourlyStatEntity {
    /// Player the bucket belongs to.
    pub user_id: Uuid,
    /// Unix seconds of the hour floor.
    pub hour_start: i64,
    /// Runs finished in this hour.
    pub runs: u64,
    /// Victories among those runs.
    pub victories: u64,
    /// Cumulative damage dealt.
    pub total_damage: u64,
    /// Cumulative battle duration in seconds.
    pub total_duration_seconds: f64,
    /// Cumulative shells awarded.
    pub total_reward: u64,
    /// Cumulative recomputed DPS.
    pub total_dps: f64,
}

/// Per-run increment merged into an hourly bucket.
#[derive(Debug, Clone, Copy)]
pub struct HourlyDelta {
    /// Whether the run was a victory.
    pub victory: bool,
    /// Damage dealt during the run.
    pub damage: u32,
    /// Run duration in seconds.
    pub duration_seconds: f64,
    /// Shells awarded for the run.
    pub reward: u32,
    /// Recomputed DPS of the run.
    pub dps: f64,
}

/// Floor a timestamp to the wall-clock hour, in unix seconds.
pub fn hour_floor(at: SystemTime) -> i64 {
    let secs = at
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0);
    secs - secs.rem_euclid(3600)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn hour_floor_truncates_to_the_hour() {
        let base = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let floored = hour_floor(base);
        assert_eq!(floored % 3600, 0);
        assert!(floored <= 1_700_000_000);
        assert!(1_700_000_000 - floored < 3600);

        let exact = UNIX_EPOCH + Duration::from_secs(1_699_999_200);
        assert_eq!(hour_floor(exact), 1_699_999_200);
    }

    #[test]
    fn runs_start_unfinished() {
        let run = RunEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            battle_kind: BATTLE_KIND_BOSS_RUN.to_owned(),
            seed: 7,
            started_at: SystemTime::now(),
            finished_at: None,
            outcome: None,
        };
        assert!(!run.is_finished());
    }
}
