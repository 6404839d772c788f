/// Run lifecycle orchestration: start, mid-run events, finish.
pub mod battle_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Best-effort lifecycle event and hourly aggregate logging.
pub mod event_log;
/// Pure grading and reward rules.
pub mod grading;
/// Health check service.
pub mod health_service;
/// Interface to the external identity provider.
pub mod identity;
/// Layered start rate limiting.
pub mod rate_limit;
/// Storage connection supervisor with degraded-mode handling.
pub mod storage_supervisor;
/// Pure plausibility validation of finish telemetry.
pub mod telemetry;
