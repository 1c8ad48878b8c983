//! Login and JWT handling for the admin surface.

use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::config;
use crate::errors::ServiceError;

const JWT_DEFAULT_EXPIRE_DAYS: i64 = 1;

#[derive(Debug, Deserialize)]
pub struct LoginInfo {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    name: String,
    exp: i64,
}

/// `POST /api/login`: check the configured credentials and hand out a JWT.
pub async fn login(Json(login): Json<LoginInfo>) -> Result<Response, ServiceError> {
    let cfg = config::get();

    if login.username != cfg.auth_username || login.password != cfg.auth_password {
        warn!("Login failed. Username: {}", login.username);
        return Err(ServiceError::BadRequest("invalid credentials".into()));
    }

    let token = generate_token(&login.username)?;
    info!("Login success with username: {}", login.username);

    Ok(Json(json!({ "username": cfg.auth_username, "token": token })).into_response())
}

pub fn generate_token(username: &str) -> Result<String, ServiceError> {
    let cfg = config::get();

    let expire_days = if cfg.auth_expire_days > 0 {
        cfg.auth_expire_days
    } else {
        JWT_DEFAULT_EXPIRE_DAYS
    };

    let claims = Claims {
        name: username.to_string(),
        exp: (Utc::now() + Duration::days(expire_days)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.jwt_secret_key.as_bytes()),
    )
    .map_err(|err| {
        error!("Generate token error: {}", err);
        ServiceError::Internal(err.to_string())
    })
}

pub fn validate_token(token: &str) -> bool {
    let cfg = config::get();
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.jwt_secret_key.as_bytes()),
        &Validation::new(Algorithm::HS256),
    ) {
        Ok(_) => true,
        Err(err) => {
            warn!("Failed to parse token: {}", err);
            false
        }
    }
}

/// Bearer-token guard for `/api/admin/*` routes.
pub async fn require_admin(request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match token {
        Some(token) if validate_token(token) => next.run(request).await,
        _ => (
            axum::http::StatusCode::UNAUTHORIZED,
            Json(json!({ "status": "error", "message": "missing or invalid token" })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_validate_against_the_same_secret() {
        let token = generate_token("admin").unwrap();
        assert!(validate_token(&token));
    }

    #[test]
    fn garbage_tokens_do_not_validate() {
        assert!(!validate_token("not.a.jwt"));
        assert!(!validate_token(""));
    }

    #[test]
    fn expired_tokens_do_not_validate() {
        let cfg = config::get();
        let claims = Claims {
            name: "admin".into(),
            exp: (Utc::now() - Duration::days(2)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(cfg.jwt_secret_key.as_bytes()),
        )
        .unwrap();
        assert!(!validate_token(&token));
    }
}
