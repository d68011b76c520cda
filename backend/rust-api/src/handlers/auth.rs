use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE},
    models::user::{
        DetailResponse, LoginRequest, LoginResponse, PublicUser, RefreshResponse, RegisterRequest,
    },
    services::{
        auth_service::{AuthError, AuthService, RegisterError},
        AppState,
    },
};

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build()
}

fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

/// POST /register - Create a new account
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    tracing::info!(username = %req.username, "Registering new user");

    let service = AuthService::from_state(&state);

    match service.register(req).await {
        Ok(_) => Ok((
            StatusCode::CREATED,
            Json(DetailResponse {
                detail: "User created successfully!".to_string(),
            }),
        )),
        Err(RegisterError::UsernameTaken) => Err(ApiError::field(
            "username",
            "A user with that username already exists.",
        )),
        Err(RegisterError::EmailTaken) => Err(ApiError::field("email", "Email already exists")),
        Err(RegisterError::Store(err)) => Err(err.into()),
        Err(RegisterError::Internal(err)) => Err(err.into()),
    }
}

/// POST /login - Exchange credentials for token cookies
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let service = AuthService::from_state(&state);

    let (user, tokens) = match service.login(&req.username, &req.password).await {
        Ok(outcome) => outcome,
        Err(AuthError::InvalidCredentials) => {
            return Err(ApiError::authentication(
                "No active account found with the given credentials",
            ));
        }
        Err(AuthError::Store(err)) => return Err(err.into()),
        Err(err) => return Err(anyhow::Error::from(err).into()),
    };

    let jar = jar
        .add(session_cookie(ACCESS_TOKEN_COOKIE, tokens.access))
        .add(session_cookie(REFRESH_TOKEN_COOKIE, tokens.refresh));

    Ok((
        StatusCode::OK,
        jar,
        Json(LoginResponse {
            detail: "Login successfully!".to_string(),
            user: PublicUser::from(user),
        }),
    ))
}

/// POST /token/refresh - Mint a new access token from the refresh cookie
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let refresh_token = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| ApiError::authentication("Refresh token not provided."))?;

    let service = AuthService::from_state(&state);

    let access = match service.refresh(&refresh_token).await {
        Ok(access) => access,
        Err(AuthError::InvalidToken) => {
            return Err(ApiError::authentication("Invalid refresh token."));
        }
        Err(AuthError::Store(err)) => return Err(err.into()),
        Err(err) => return Err(anyhow::Error::from(err).into()),
    };

    let jar = jar.add(session_cookie(ACCESS_TOKEN_COOKIE, access.clone()));

    Ok((
        StatusCode::OK,
        jar,
        Json(RefreshResponse {
            detail: "Token refreshed".to_string(),
            access,
        }),
    ))
}

/// POST /logout - Blacklist the refresh token and clear both cookies
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let refresh_token = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| ApiError::authentication("Not authenticated."))?;

    let service = AuthService::from_state(&state);

    match service.blacklist(&refresh_token).await {
        // Logging out twice is benign: the token is on the blacklist either way.
        Ok(()) | Err(AuthError::AlreadyRevoked) => {}
        Err(AuthError::InvalidToken) => {
            return Err(ApiError::authentication("Invalid refresh token."));
        }
        Err(AuthError::Store(err)) => return Err(err.into()),
        Err(err) => return Err(anyhow::Error::from(err).into()),
    }

    let jar = jar
        .add(expired_cookie(ACCESS_TOKEN_COOKIE))
        .add(expired_cookie(REFRESH_TOKEN_COOKIE));

    Ok((
        StatusCode::OK,
        jar,
        Json(DetailResponse {
            detail: "Log-Out successfully! All Tokens will be deleted. Refresh token is now invalid."
                .to_string(),
        }),
    ))
}
