//! Anti-cheat validation of the raw telemetry a client reports when finishing a run.
//!
//! Everything here is a pure function of the finish payload; no store access
//! happens before a payload has passed these checks.

use thiserror::Error;

use crate::dto::battle::FinishRunRequest;

/// Minimum play time for a legitimate victory, in seconds.
const MIN_VICTORY_DURATION: f64 = 4.0;
/// Minimum play time for a legitimate defeat, in seconds.
const MIN_DEFEAT_DURATION: f64 = 2.0;
/// Plausible bounds for average damage dealt per landed hit.
const DAMAGE_PER_HIT_RANGE: (f64, f64) = (1.0, 400.0);

/// Rejection raised when finish telemetry is internally inconsistent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    /// Structurally broken payload (non-finite or negative duration).
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    /// Duration below the minimum viable play time for the reported outcome.
    #[error("implausible duration {duration}s (victory: {victory}, minimum {minimum}s)")]
    InvalidDuration {
        /// Reported victory flag.
        victory: bool,
        /// Reported duration in seconds.
        duration: f64,
        /// Floor applied for this outcome.
        minimum: f64,
    },
    /// A per-hit counter exceeds the reported hit count.
    #[error("invalid stats: {0}")]
    InvalidStats(String),
    /// Average damage per hit falls outside the plausible range.
    #[error("implausible damage profile: {damage} damage over {hits} hits")]
    InvalidDamageProfile {
        /// Reported total damage.
        damage: u32,
        /// Reported hit count.
        hits: u32,
    },
}

/// Validate a finish payload against physically-plausible bounds.
///
/// The client-supplied DPS value, if any, is never consulted; DPS is always
/// recomputed server-side.
pub fn validate(payload: &FinishRunRequest) -> Result<(), TelemetryError> {
    if !payload.duration_seconds.is_finite() || payload.duration_seconds < 0.0 {
        return Err(TelemetryError::InvalidPayload(format!(
            "duration_seconds must be a non-negative number, got {}",
            payload.duration_seconds
        )));
    }

    let minimum = if payload.victory {
        MIN_VICTORY_DURATION
    } else {
        MIN_DEFEAT_DURATION
    };
    if payload.duration_seconds < minimum {
        return Err(TelemetryError::InvalidDuration {
            victory: payload.victory,
            duration: payload.duration_seconds,
            minimum,
        });
    }

    if payload.hits > 0 {
        if payload.max_combo > payload.hits {
            return Err(TelemetryError::InvalidStats(format!(
                "max_combo {} exceeds hit count {}",
                payload.max_combo, payload.hits
            )));
        }
        if payload.blocks > payload.hits {
            return Err(TelemetryError::InvalidStats(format!(
                "blocks {} exceed hit count {}",
                payload.blocks, payload.hits
            )));
        }
        if payload.crits > payload.hits {
            return Err(TelemetryError::InvalidStats(format!(
                "crits {} exceed hit count {}",
                payload.crits, payload.hits
            )));
        }

        let average = f64::from(payload.total_damage) / f64::from(payload.hits);
        let (low, high) = DAMAGE_PER_HIT_RANGE;
        if average < low || average > high {
            return Err(TelemetryError::InvalidDamageProfile {
                damage: payload.total_damage,
                hits: payload.hits,
            });
        }
    }

    Ok(())
}

/// Server-side recomputation of damage per second.
///
/// Durations under one second are clamped so short runs cannot manufacture
/// unbounded DPS.
pub fn recompute_dps(total_damage: u32, duration_seconds: f64) -> f64 {
    f64::from(total_damage) / duration_seconds.max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn payload(victory: bool, duration: f64) -> FinishRunRequest {
        FinishRunRequest {
            run_id: Uuid::new_v4(),
            victory,
            duration_seconds: duration,
            hits: 20,
            crits: 5,
            blocks: 2,
            max_combo: 8,
            total_damage: 900,
            dps: None,
        }
    }

    #[test]
    fn accepts_plausible_victory() {
        assert_eq!(validate(&payload(true, 18.0)), Ok(()));
    }

    #[test]
    fn rejects_non_finite_duration() {
        assert!(matches!(
            validate(&payload(true, f64::NAN)),
            Err(TelemetryError::InvalidPayload(_))
        ));
        assert!(matches!(
            validate(&payload(true, -1.0)),
            Err(TelemetryError::InvalidPayload(_))
        ));
    }

    #[test]
    fn enforces_duration_floor_per_outcome() {
        assert!(matches!(
            validate(&payload(true, 3.9)),
            Err(TelemetryError::InvalidDuration { victory: true, .. })
        ));
        assert_eq!(validate(&payload(true, 4.0)), Ok(()));

        assert!(matches!(
            validate(&payload(false, 1.9)),
            Err(TelemetryError::InvalidDuration { victory: false, .. })
        ));
        assert_eq!(validate(&payload(false, 2.0)), Ok(()));
    }

    #[test]
    fn rejects_counters_exceeding_hits() {
        let mut p = payload(true, 10.0);
        p.hits = 5;
        p.max_combo = 6;
        p.crits = 0;
        p.blocks = 0;
        p.total_damage = 500;
        assert!(matches!(
            validate(&p),
            Err(TelemetryError::InvalidStats(_))
        ));

        p.max_combo = 5;
        p.blocks = 6;
        assert!(matches!(
            validate(&p),
            Err(TelemetryError::InvalidStats(_))
        ));

        p.blocks = 5;
        p.crits = 6;
        assert!(matches!(
            validate(&p),
            Err(TelemetryError::InvalidStats(_))
        ));
    }

    #[test]
    fn rejects_implausible_damage_per_hit() {
        let mut p = payload(true, 10.0);
        p.hits = 5;
        p.max_combo = 5;
        p.crits = 0;
        p.blocks = 0;
        p.total_damage = 2_500; // 500 per hit
        assert!(matches!(
            validate(&p),
            Err(TelemetryError::InvalidDamageProfile { .. })
        ));

        p.total_damage = 4; // 0.8 per hit
        assert!(matches!(
            validate(&p),
            Err(TelemetryError::InvalidDamageProfile { .. })
        ));

        p.total_damage = 2_000; // exactly 400 per hit
        assert_eq!(validate(&p), Ok(()));
    }

    #[test]
    fn zero_hits_skips_stat_and_damage_checks() {
        let mut p = payload(false, 5.0);
        p.hits = 0;
        p.max_combo = 3;
        p.total_damage = 0;
        assert_eq!(validate(&p), Ok(()));
    }

    #[test]
    fn dps_clamps_sub_second_durations() {
        assert_eq!(recompute_dps(100, 0.5), 100.0);
        assert_eq!(recompute_dps(100, 4.0), 25.0);
        assert_eq!(recompute_dps(0, 10.0), 0.0);
    }
}
