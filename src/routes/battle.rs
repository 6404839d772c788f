use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::post,
};
use axum::Extension;
use uuid::Uuid;

use crate::{
    dto::battle::{
        FinishRunRequest, FinishRunResponse, OkResponse, RunEventRequest, StartRunRequest,
        StartRunResponse,
    },
    error::{AppError, ServiceError},
    routes::ApiJson,
    services::battle_service,
    state::SharedState,
};

const PLAYER_TOKEN_HEADER: &str = "x-player-token";

/// Authenticated caller attached to the request by the identity middleware.
#[derive(Debug, Clone, Copy)]
pub struct CallerIdentity(pub Uuid);

/// Routes handling the battle run lifecycle.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/battle/start", post(start_run))
        .route("/battle/event", post(post_event))
        .route("/battle/finish", post(finish_run))
        .route_layer(middleware::from_fn_with_state(
            state,
            require_player_identity,
        ))
}

/// Register a new run for the caller, subject to rate limiting.
#[utoipa::path(
    post,
    path = "/battle/start",
    tag = "battle",
    request_body = StartRunRequest,
    params(("X-Player-Token" = String, Header, description = "Player token issued by the identity provider")),
    responses(
        (status = 201, description = "Run created", body = StartRunResponse),
        (status = 401, description = "Missing or unknown player token"),
        (status = 429, description = "Rate limited; body carries the reason"),
        (status = 500, description = "Store failure")
    )
)]
pub async fn start_run(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiJson(payload): ApiJson<StartRunRequest>,
) -> Result<(StatusCode, Json<StartRunResponse>), AppError> {
    let response = battle_service::start_run(&state, caller.0, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Append a free-form mid-run event to an active run owned by the caller.
#[utoipa::path(
    post,
    path = "/battle/event",
    tag = "battle",
    request_body = RunEventRequest,
    params(("X-Player-Token" = String, Header, description = "Player token issued by the identity provider")),
    responses(
        (status = 200, description = "Event recorded", body = OkResponse),
        (status = 404, description = "Run missing or not owned by the caller"),
        (status = 409, description = "Run already finished")
    )
)]
pub async fn post_event(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiJson(payload): ApiJson<RunEventRequest>,
) -> Result<Json<OkResponse>, AppError> {
    let response = battle_service::record_event(&state, caller.0, payload).await?;
    Ok(Json(response))
}

/// Validate reported telemetry, score the run exactly once, and award shells.
#[utoipa::path(
    post,
    path = "/battle/finish",
    tag = "battle",
    request_body = FinishRunRequest,
    params(("X-Player-Token" = String, Header, description = "Player token issued by the identity provider")),
    responses(
        (status = 200, description = "Run scored", body = FinishRunResponse),
        (status = 400, description = "Telemetry failed plausibility validation"),
        (status = 404, description = "Run missing or not owned by the caller"),
        (status = 409, description = "Run already finished")
    )
)]
pub async fn finish_run(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerIdentity>,
    ApiJson(payload): ApiJson<FinishRunRequest>,
) -> Result<Json<FinishRunResponse>, AppError> {
    let response = battle_service::finish_run(&state, caller.0, payload).await?;
    Ok(Json(response))
}

/// Resolve the caller through the identity provider and attach their id.
async fn require_player_identity(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(PLAYER_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            ServiceError::Unauthorized("missing player token header `X-Player-Token`".into())
        })?;

    let user_id = state
        .identity()
        .resolve(&token)
        .await
        .ok_or_else(|| ServiceError::Unauthorized("unknown player token".into()))?;

    req.extensions_mut().insert(CallerIdentity(user_id));
    Ok(next.run(req).await)
}
