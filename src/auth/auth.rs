use axum::{http::StatusCode, Json};

use crate::models::ErrorResponse;

const CLOUD_ADMIN_PRPL: &str = "r/Finsight-CloudAdmin";

pub fn is_cloud_admin(prpls: &Vec<String>) -> bool {
    prpls.iter().any(|p| p == CLOUD_ADMIN_PRPL)
}

pub fn ensure_service(
    prpls: &Vec<String>,
    service_name: &str,
) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    let service_prpl = format!("s/{}", service_name);
    if prpls.iter().any(|p| p == &service_prpl) {
        return Ok(service_prpl);
    }

    if is_cloud_admin(prpls) {
        return Ok(CLOUD_ADMIN_PRPL.to_string());
    }

    let status = StatusCode::FORBIDDEN;
    Err((
        status,
        Json(ErrorResponse {
            code: status.as_u16(),
            status: status.to_string(),
            error: format!("Service '{}' access denied", service_name),
        }),
    ))
}

pub fn ensure_cloud_admin(
    prpls: &Vec<String>,
) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    if is_cloud_admin(prpls) {
        return Ok(CLOUD_ADMIN_PRPL.to_string());
    }

    let status = StatusCode::FORBIDDEN;
    Err((
        status,
        Json(ErrorResponse {
            code: status.as_u16(),
            status: status.to_string(),
            error: "Cloud Admin access required".to_string(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_principal_is_accepted() {
        let prpls = vec!["s/finsight-app".to_string()];
        assert!(ensure_service(&prpls, "finsight-app").is_ok());
    }

    #[test]
    fn cloud_admin_passes_both_guards() {
        let prpls = vec!["r/Finsight-CloudAdmin".to_string()];
        assert!(ensure_service(&prpls, "finsight-app").is_ok());
        assert!(ensure_cloud_admin(&prpls).is_ok());
    }

    #[test]
    fn plain_user_is_denied() {
        let prpls = vec!["u/u-1".to_string()];
        assert!(ensure_service(&prpls, "finsight-app").is_err());
        assert!(ensure_cloud_admin(&prpls).is_err());
    }
}
