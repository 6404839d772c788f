//! Request and response bodies for the battle endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{dto::validation::validate_event_type, services::grading::Grade};

/// Body of `POST /battle/start`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StartRunRequest {
    /// Optional client-chosen seed for the battle script; the server rolls
    /// one when absent.
    #[serde(default)]
    pub seed: Option<i64>,
}

/// Successful `POST /battle/start` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartRunResponse {
    /// Store-assigned identifier of the new run.
    pub run_id: Uuid,
}

/// Body of `POST /battle/event`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RunEventRequest {
    /// Run this event belongs to.
    pub run_id: Uuid,
    /// Free-form short action tag, e.g. `tap` or `combo_break`.
    pub event_type: String,
    /// Opaque structured payload stored alongside the event.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

impl Validate for RunEventRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_event_type(&self.event_type) {
            errors.add("event_type", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Acknowledgement body shared by the event endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct OkResponse {
    /// Always `true`.
    pub ok: bool,
}

impl OkResponse {
    /// The one acknowledged shape.
    pub fn acknowledged() -> Self {
        Self { ok: true }
    }
}

/// Body of `POST /battle/finish`: the client's raw end-of-run telemetry.
///
/// Everything here is untrusted and passes the telemetry validator before any
/// state changes.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FinishRunRequest {
    /// Run being finished.
    pub run_id: Uuid,
    /// Whether the client claims the boss was defeated.
    pub victory: bool,
    /// Client-reported battle duration in seconds.
    pub duration_seconds: f64,
    /// Landed hits.
    #[serde(default)]
    pub hits: u32,
    /// Critical hits among the landed hits.
    #[serde(default)]
    pub crits: u32,
    /// Blocked boss attacks.
    #[serde(default)]
    pub blocks: u32,
    /// Best combo streak reached.
    #[serde(default)]
    pub max_combo: u32,
    /// Total damage dealt.
    #[serde(default)]
    pub total_damage: u32,
    /// Client-computed DPS. Accepted for wire compatibility and then
    /// discarded; the server always recomputes it.
    #[serde(default)]
    pub dps: Option<f64>,
}

/// Successful `POST /battle/finish` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct FinishRunResponse {
    /// Always `true`.
    pub ok: bool,
    /// Letter grade for the run.
    pub grade: Grade,
    /// Shells awarded; zero on defeat.
    pub reward: u32,
}
