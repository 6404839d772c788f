use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Boss Run Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::battle::start_run,
        crate::routes::battle::post_event,
        crate::routes::battle::finish_run,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::battle::StartRunRequest,
            crate::dto::battle::StartRunResponse,
            crate::dto::battle::RunEventRequest,
            crate::dto::battle::OkResponse,
            crate::dto::battle::FinishRunRequest,
            crate::dto::battle::FinishRunResponse,
            crate::error::ErrorBody,
            crate::services::grading::Grade,
            crate::services::rate_limit::RateLimitReason,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "battle", description = "Boss battle run lifecycle"),
    )
)]
pub struct ApiDoc;
