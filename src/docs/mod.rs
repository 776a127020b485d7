use utoipa::OpenApi;

use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Create a collaboration session
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created successfully", body = CreateSessionResponse),
        (status = 403, description = "Caller is not the application service", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn session_create_doc() {}

/// Invite a user to a collaboration session
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{session_id}/invitations",
    request_body = InviteUserRequest,
    params(
        ("session_id" = uuid::Uuid, Path, description = "Collaboration session id")
    ),
    responses(
        (status = 200, description = "User invited (idempotent)", body = InviteUserResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn session_invite_doc() {}

/// Diagnostics endpoint
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Operational snapshot", body = DiagnosticsResponse),
        (status = 403, description = "Cloud Admin access required", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        session_create_doc,
        session_invite_doc,
        diagnostics_doc,
    ),
    components(
        schemas(
            HealthResponse,
            CreateSessionRequest,
            CreateSessionResponse,
            InviteUserRequest,
            InviteUserResponse,
            DiagnosticsResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "api", description = "Session lifecycle and operations endpoints")
    )
)]
pub struct ApiDoc;
