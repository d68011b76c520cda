use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiError;
use crate::services::auth_service::AuthService;
use crate::services::AppState;

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

/// The cookie names the session endpoints read and write.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String,        // user_id
    pub jti: String,        // unique token id, the revocation key
    pub token_type: String, // "access" or "refresh"
    pub exp: usize,         // expiration timestamp
    pub iat: usize,         // issued at timestamp
}

#[derive(Debug)]
pub enum JwtError {
    InvalidToken,
    ExpiredToken,
    InvalidSignature,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::InvalidToken => write!(f, "Invalid token"),
            JwtError::ExpiredToken => write!(f, "Token expired"),
            JwtError::InvalidSignature => write!(f, "Invalid token signature"),
        }
    }
}

impl std::error::Error for JwtError {}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: &JwtClaims) -> Result<String, JwtError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|_| JwtError::InvalidToken)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, JwtError> {
        let validation = Validation::default();

        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                if e.to_string().contains("ExpiredSignature") {
                    JwtError::ExpiredToken
                } else if e.to_string().contains("InvalidSignature") {
                    JwtError::InvalidSignature
                } else {
                    JwtError::InvalidToken
                }
            })
    }
}

/// The authenticated identity, inserted into request extensions by
/// `auth_middleware` and read by the protected handlers.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub email: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

/// Guards the quiz routes. Accepts the access token from an Authorization
/// header or the `access_token` cookie, verifies it (signature, expiry,
/// revocation), resolves the subject to a live user and stores the identity
/// in request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .or_else(|| {
            jar.get(ACCESS_TOKEN_COOKIE)
                .map(|cookie| cookie.value().to_string())
        })
        .ok_or_else(|| {
            ApiError::authentication("Authentication credentials were not provided.")
        })?;

    let service = AuthService::from_state(&state);
    let user = service.verify(&token).await.map_err(|e| {
        tracing::warn!("Access token rejected: {}", e);
        ApiError::authentication("Invalid token.")
    })?;

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        username: user.username,
        email: user.email,
    });

    Ok(next.run(request).await)
}
