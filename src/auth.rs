//! # Authentication
//!
//! JWT bearer authentication. The middleware decodes an optional bearer
//! token into request extensions; handlers opt into enforcement through the
//! [`CurrentUser`] extractor (admin surfaces) or read [`MaybeUser`] (data
//! endpoints, which only require a caller when the template sets
//! need_login).

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::{ApiError, unauthorized};
use crate::models::user::Model as UserModel;
use crate::server::AppState;

/// JWT claims issued by the login flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub sys_id: i32,
    pub org_id: i32,
    pub username: String,
    pub is_superuser: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Extractor for endpoints that require an authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Claims);

/// Extractor for endpoints where authentication is optional.
#[derive(Debug, Clone, Default)]
pub struct MaybeUser(pub Option<Claims>);

/// Issue a bearer token for a user.
pub fn issue_token(config: &AppConfig, user: &UserModel) -> Result<String, ApiError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user.id.clone(),
        sys_id: user.sys_id,
        org_id: user.org_id,
        username: user.username.clone(),
        is_superuser: user.is_superuser,
        iat: now,
        exp: now + config.jwt_ttl_seconds as i64,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("failed to encode JWT: {e}");
        crate::error::ErrorType::InternalServerError.into()
    })
}

/// Decode and validate a bearer token.
pub fn decode_token(config: &AppConfig, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| unauthorized(Some("Invalid or expired token")))
}

/// Middleware that decodes an optional bearer token into request
/// extensions. A malformed or expired token is rejected outright; a missing
/// one leaves the request anonymous.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let maybe_user = match bearer_token(&request) {
        Some(token) => {
            let claims = decode_token(&state.config, token)?;
            tracing::debug!(user_id = %claims.sub, sys_id = claims.sys_id, "authenticated request");
            MaybeUser(Some(claims))
        }
        None => MaybeUser(None),
    };

    request.extensions_mut().insert(maybe_user);
    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<MaybeUser>() {
            Some(MaybeUser(Some(claims))) => Ok(CurrentUser(claims.clone())),
            _ => Err(unauthorized(None)),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<MaybeUser>().cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            profile: "test".to_string(),
            jwt_secret: "test-jwt-secret".to_string(),
            ..Default::default()
        }
    }

    fn test_user() -> UserModel {
        UserModel {
            id: "U1".to_string(),
            sys_id: 3,
            org_id: 9,
            username: "alice".to_string(),
            phone: None,
            email: None,
            password_digest: None,
            password_salt: None,
            is_active: true,
            is_superuser: false,
            create_time: chrono::Utc::now().into(),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let config = test_config();
        let token = issue_token(&config, &test_user()).unwrap();
        let claims = decode_token(&config, &token).unwrap();

        assert_eq!(claims.sub, "U1");
        assert_eq!(claims.sys_id, 3);
        assert_eq!(claims.org_id, 9);
        assert_eq!(claims.username, "alice");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let config = test_config();
        let token = issue_token(&config, &test_user()).unwrap();

        let other = AppConfig {
            jwt_secret: "different-secret".to_string(),
            ..test_config()
        };
        assert!(decode_token(&other, &token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let config = test_config();
        assert!(decode_token(&config, "not.a.jwt").is_err());
    }
}
