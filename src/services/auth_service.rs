use axum::http::{self};
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};

// Get the auth token from a request
pub fn get_auth_token<B>(req: &http::Request<B>) -> Result<String, String> {
    // 1. Try to get token from Authorization header
    if let Some(auth_header) = req.headers().get(http::header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| "Invalid Authorization header".to_string())?;
        Ok(auth_str
            .strip_prefix("Bearer ")
            .unwrap_or(auth_str)
            .to_string())
    }
    // 2. Try to get token from cookies
    else {
        let cookie_header = req
            .headers()
            .get(http::header::COOKIE)
            .ok_or_else(|| "Missing Authorization header or Cookie".to_string())?
            .to_str()
            .map_err(|_| "Invalid Cookie header".to_string())?;

        for cookie in cookie::Cookie::split_parse(cookie_header) {
            if let Ok(c) = cookie {
                if c.name() == "auth_token" {
                    return Ok(c.value().to_string());
                }
            }
        }
        Err("auth_token cookie not found".to_string())
    }
}

// Validate a JWT token and return the token data
pub fn validate_jwt(
    token: &str,
    secret: &str,
) -> Result<TokenData<serde_json::Value>, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<serde_json::Value>(token, &decoding_key, &validation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_header(name: http::header::HeaderName, value: &str) -> http::Request<()> {
        http::Request::builder()
            .header(name, value)
            .body(())
            .unwrap()
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        let req = request_with_header(http::header::AUTHORIZATION, "Bearer tok-123");
        assert_eq!(get_auth_token(&req).unwrap(), "tok-123");
    }

    #[test]
    fn cookie_fallback_finds_auth_token() {
        let req = request_with_header(http::header::COOKIE, "theme=dark; auth_token=tok-456");
        assert_eq!(get_auth_token(&req).unwrap(), "tok-456");
    }

    #[test]
    fn missing_credentials_is_an_error() {
        let req = http::Request::builder().body(()).unwrap();
        assert!(get_auth_token(&req).is_err());
    }
}
