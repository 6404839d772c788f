use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    dao::storage::StorageError,
    services::{rate_limit::RateLimitReason, telemetry::TelemetryError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Caller identity could not be established.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Finish telemetry failed plausibility validation.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// Run missing, or not visible to this caller.
    #[error("not found: {0}")]
    NotFound(String),
    /// The run has already been scored; terminal for that run.
    #[error("run already finished")]
    AlreadyFinished,
    /// A new run may not start yet.
    #[error("rate limited: {}", .0.as_str())]
    RateLimited(RateLimitReason),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or unresolvable caller identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Structurally broken request body.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    /// Reported duration below the minimum viable play time.
    #[error("invalid duration: {0}")]
    InvalidDuration(String),
    /// Per-hit counters inconsistent with the reported hit count.
    #[error("invalid stats: {0}")]
    InvalidStats(String),
    /// Average damage per hit outside plausible bounds.
    #[error("invalid damage profile: {0}")]
    InvalidDamageProfile(String),
    /// Run missing or owned by someone else.
    #[error("not found: {0}")]
    NotFound(String),
    /// The run has already been scored.
    #[error("run already finished")]
    AlreadyFinished,
    /// A new run may not start yet.
    #[error("rate limited: {}", .0.as_str())]
    RateLimited(RateLimitReason),
    /// Store or infrastructure fault.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::Internal(source.to_string()),
            ServiceError::Degraded => AppError::Internal("storage degraded".into()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::Telemetry(source) => source.into(),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::AlreadyFinished => AppError::AlreadyFinished,
            ServiceError::RateLimited(reason) => AppError::RateLimited(reason),
        }
    }
}

impl From<TelemetryError> for AppError {
    fn from(err: TelemetryError) -> Self {
        let message = err.to_string();
        match err {
            TelemetryError::InvalidPayload(_) => AppError::InvalidPayload(message),
            TelemetryError::InvalidDuration { .. } => AppError::InvalidDuration(message),
            TelemetryError::InvalidStats(_) => AppError::InvalidStats(message),
            TelemetryError::InvalidDamageProfile { .. } => AppError::InvalidDamageProfile(message),
        }
    }
}

/// Wire shape of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error kind.
    pub error: &'static str,
    /// Human-readable context, when useful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Rate-limit rejection reason; present only for `rate_limited`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::InvalidPayload(_) => "invalid_payload",
            AppError::InvalidDuration(_) => "invalid_duration",
            AppError::InvalidStats(_) => "invalid_stats",
            AppError::InvalidDamageProfile(_) => "invalid_damage_profile",
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyFinished => "already_finished",
            AppError::RateLimited(_) => "rate_limited",
            AppError::Internal(_) => "server_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidPayload(_)
            | AppError::InvalidDuration(_)
            | AppError::InvalidStats(_)
            | AppError::InvalidDamageProfile(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyFinished => StatusCode::CONFLICT,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let reason = match &self {
            AppError::RateLimited(reason) => Some(reason.as_str()),
            _ => None,
        };

        let payload = Json(ErrorBody {
            error: self.kind(),
            message: Some(self.to_string()),
            reason,
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_statuses_match_the_wire_contract() {
        let cases: Vec<(AppError, &str, StatusCode)> = vec![
            (
                AppError::Unauthorized("no token".into()),
                "unauthorized",
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::InvalidDuration("too short".into()),
                "invalid_duration",
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::NotFound("run".into()),
                "not_found",
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::AlreadyFinished,
                "already_finished",
                StatusCode::CONFLICT,
            ),
            (
                AppError::RateLimited(RateLimitReason::DailyCapReached),
                "rate_limited",
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                AppError::Internal("boom".into()),
                "server_error",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, kind, status) in cases {
            assert_eq!(error.kind(), kind);
            assert_eq!(error.status(), status);
        }
    }

    #[test]
    fn unauthorized_service_errors_keep_their_kind_over_http() {
        let app: AppError = ServiceError::Unauthorized("unknown player token".into()).into();
        assert!(matches!(app, AppError::Unauthorized(_)));
        assert_eq!(app.kind(), "unauthorized");
        assert_eq!(app.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn rate_limited_body_carries_the_reason() {
        let error = AppError::RateLimited(RateLimitReason::CooldownActive);
        let body = ErrorBody {
            error: error.kind(),
            message: None,
            reason: Some(RateLimitReason::CooldownActive.as_str()),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "rate_limited");
        assert_eq!(json["reason"], "cooldown_active");
        assert!(json.get("message").is_none());
    }
}
