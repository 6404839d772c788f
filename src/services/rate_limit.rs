//! Layered start rate limiting: a best-effort in-process fast path plus
//! authoritative checks against the persistent store.

use std::{
    sync::Arc,
    time::{Instant, SystemTime},
};

use dashmap::DashMap;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::RateLimits,
    dao::{run_store::RunStore, storage::StorageError},
};

/// Why a start attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitReason {
    /// Fast path: more than the allowed starts inside the burst window.
    TooManyRecentStarts,
    /// Authoritative: 24h volume cap reached.
    DailyCapReached,
    /// Authoritative: an unfinished run was started moments ago.
    CooldownActive,
}

impl RateLimitReason {
    /// Machine-readable tag carried in the HTTP error body.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitReason::TooManyRecentStarts => "too_many_recent_starts",
            RateLimitReason::DailyCapReached => "daily_cap_reached",
            RateLimitReason::CooldownActive => "cooldown_active",
        }
    }
}

/// Short-window per-user start throttle.
///
/// Injectable so the in-process table can be swapped for a shared counter
/// store without touching the lifecycle manager. Implementations are
/// best-effort by contract: under-enforcement across service instances is
/// acceptable, the store-backed checks remain the security boundary.
pub trait StartThrottle: Send + Sync {
    /// Number of starts recorded for `user_id` inside the window ending at `now`.
    fn recent_starts(&self, user_id: Uuid, window: std::time::Duration, now: Instant) -> usize;

    /// Record a successful start at `now`.
    fn record_start(&self, user_id: Uuid, now: Instant);
}

/// Process-local [`StartThrottle`] over a concurrent map of start timestamps.
///
/// Explicitly not shared across instances; a courtesy throttle, not a
/// security boundary.
#[derive(Default)]
pub struct InMemoryStartThrottle {
    starts: DashMap<Uuid, Vec<Instant>>,
}

impl InMemoryStartThrottle {
    /// Create an empty throttle table.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StartThrottle for InMemoryStartThrottle {
    fn recent_starts(&self, user_id: Uuid, window: std::time::Duration, now: Instant) -> usize {
        let Some(mut entry) = self.starts.get_mut(&user_id) else {
            return 0;
        };
        // Prune on read so the per-user list never outgrows the window.
        entry.retain(|at| now.saturating_duration_since(*at) <= window);
        let remaining = entry.len();
        drop(entry);

        if remaining == 0 {
            // Drop the map entry too, or the table grows with every user id
            // ever seen.
            self.starts.remove_if(&user_id, |_, starts| starts.is_empty());
        }
        remaining
    }

    fn record_start(&self, user_id: Uuid, now: Instant) {
        self.starts.entry(user_id).or_default().push(now);
    }
}

/// Run the fast-path check. Never touches the store.
pub fn check_fast_path(
    throttle: &dyn StartThrottle,
    limits: &RateLimits,
    user_id: Uuid,
    now: Instant,
) -> Result<(), RateLimitReason> {
    if throttle.recent_starts(user_id, limits.burst_window, now) >= limits.burst_max_starts {
        return Err(RateLimitReason::TooManyRecentStarts);
    }
    Ok(())
}

/// Run the authoritative store-backed checks: 24h volume cap, then the
/// cooldown on the most recent unfinished run.
pub async fn check_authoritative(
    store: &Arc<dyn RunStore>,
    limits: &RateLimits,
    user_id: Uuid,
    now: SystemTime,
) -> Result<Result<(), RateLimitReason>, StorageError> {
    let window_start = now - limits.daily_window;

    let recent = store.count_runs_started_since(user_id, window_start).await?;
    if recent >= limits.daily_cap {
        return Ok(Err(RateLimitReason::DailyCapReached));
    }

    if let Some(latest) = store.latest_run_started_since(user_id, window_start).await? {
        if !latest.is_finished() {
            let age = now
                .duration_since(latest.started_at)
                .unwrap_or_default();
            if age < limits.cooldown {
                return Ok(Err(RateLimitReason::CooldownActive));
            }
        }
    }

    Ok(Ok(()))
}
