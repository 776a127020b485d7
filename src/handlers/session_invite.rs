use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use tracing::error;
use uuid::Uuid;

use crate::auth::auth;
use crate::db::dbcollab;
use crate::db::store::CollabStore;
use crate::models::{ErrorResponse, InviteUserRequest, InviteUserResponse};
use crate::ws::sessionctx;

/// Invite a user to a collaboration session.
///
/// Idempotent: inviting the same user twice leaves exactly one entry on
/// the allow-list. The cached session row is invalidated so the next
/// join sees the updated list.
pub async fn session_invite(
    Extension(prpls): Extension<Vec<String>>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<InviteUserRequest>,
) -> Result<(StatusCode, Json<InviteUserResponse>), (StatusCode, Json<ErrorResponse>)> {
    // Ensure the caller is the application service
    let _ = auth::ensure_service(&prpls, "finsight-app")?;

    let db = match dbcollab::get_db() {
        Some(db) => db,
        None => {
            error!("Database not initialized, cannot invite user");
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            return Err((
                status,
                Json(ErrorResponse {
                    code: status.as_u16(),
                    status: status.to_string(),
                    error: "Database not initialized".to_string(),
                }),
            ));
        }
    };

    let session = match db.invite_user(session_id, &body.user_id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            let status = StatusCode::NOT_FOUND;
            return Err((
                status,
                Json(ErrorResponse {
                    code: status.as_u16(),
                    status: status.to_string(),
                    error: format!("Collaboration session '{}' not found", session_id),
                }),
            ));
        }
        Err(e) => {
            error!("Failed to invite user to session '{}': {}", session_id, e);
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            return Err((
                status,
                Json(ErrorResponse {
                    code: status.as_u16(),
                    status: status.to_string(),
                    error: format!("Failed to invite user: {}", e),
                }),
            ));
        }
    };

    sessionctx::invalidate_session(session_id);

    Ok((
        StatusCode::OK,
        Json(InviteUserResponse {
            session_id: session.id,
            allowed_users: session.allowed_users,
        }),
    ))
}
