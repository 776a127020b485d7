use axum::{extract::Extension, http::StatusCode, Json};
use tracing::error;

use crate::auth::auth;
use crate::db::dbcollab;
use crate::db::store::CollabStore;
use crate::models::{CreateSessionRequest, CreateSessionResponse, ErrorResponse};
use crate::ws::sessionctx;

/// Create a collaboration session for an analysis report.
///
/// Invoked by the application backend when a user opts into
/// collaboration. The new session starts active with an empty
/// allow-list, which means open access until the first invitation.
pub async fn session_create(
    Extension(prpls): Extension<Vec<String>>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), (StatusCode, Json<ErrorResponse>)> {
    // Ensure the caller is the application service
    let _ = auth::ensure_service(&prpls, "finsight-app")?;

    let db = match dbcollab::get_db() {
        Some(db) => db,
        None => {
            error!("Database not initialized, cannot create session");
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

    let session = match db
        .create_session(body.document_id, &body.owner_id, &body.session_name)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            error!(
                "Failed to create session for document '{}': {}",
                body.document_id, e
            );
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            return Err((
                status,
                Json(ErrorResponse {
                    code: status.as_u16(),
                    status: status.to_string(),
                    error: format!("Failed to create session: {}", e),
                }),
            ));
        }
    };

    let session_id = session.id;
    sessionctx::prime_session(session);

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id }),
    ))
}
