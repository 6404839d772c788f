//! Pure grading rules mapping a run's recomputed performance to a grade and reward.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Combo streak at which a run earns a single-tier grade promotion.
const COMBO_PROMOTION_THRESHOLD: u32 = 12;

/// Letter tier summarizing run performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Grade {
    /// Top tier, DPS at or above 55 (or promoted from A by combo).
    S,
    /// DPS at or above 40.
    A,
    /// DPS at or above 28.
    B,
    /// Everything else, and every defeat.
    C,
}

impl Grade {
    /// Stable tag used in persisted outcomes and HTTP responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
        }
    }
}

/// Grade a run from its victory flag, server-recomputed DPS, and best combo streak.
///
/// Defeats always grade `C`. A combo of [`COMBO_PROMOTION_THRESHOLD`] or more
/// promotes the DPS tier exactly once; an `S` is never promoted further.
pub fn grade(victory: bool, dps: f64, max_combo: u32) -> Grade {
    if !victory {
        return Grade::C;
    }

    let base = if dps >= 55.0 {
        Grade::S
    } else if dps >= 40.0 {
        Grade::A
    } else if dps >= 28.0 {
        Grade::B
    } else {
        Grade::C
    };

    if max_combo >= COMBO_PROMOTION_THRESHOLD {
        promote(base)
    } else {
        base
    }
}

/// Reward quantity ("shells") granted for a victorious run.
///
/// Only meaningful for victories; callers award zero on defeat regardless of
/// the grade.
pub fn reward(grade: Grade, dps: f64) -> u32 {
    match grade {
        Grade::S => 25 + (dps / 4.0).floor() as u32,
        Grade::A => 16 + (dps / 5.0).floor() as u32,
        Grade::B => 10 + (dps / 6.0).floor() as u32,
        Grade::C => 5,
    }
}

fn promote(grade: Grade) -> Grade {
    match grade {
        Grade::S => Grade::S,
        Grade::A => Grade::S,
        Grade::B => Grade::A,
        Grade::C => Grade::B,
    }
}
