use std::sync::Arc;

use anyhow::Context;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::middlewares::auth::{JwtClaims, JwtService, TOKEN_TYPE_ACCESS, TOKEN_TYPE_REFRESH};
use crate::models::user::{NewUser, RegisterRequest, User};
use crate::services::AppState;
use crate::store::{StoreError, TokenBlacklist, UserStore};

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("A user with that username already exists.")]
    UsernameTaken,
    #[error("Email already exists")]
    EmailTaken,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("token already revoked")]
    AlreadyRevoked,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Account and session operations: registration, credential checks, token
/// minting and revocation. Both tokens are signed JWTs; the refresh token's
/// `jti` is the key the blacklist records on logout.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    blacklist: Arc<dyn TokenBlacklist>,
    jwt_service: JwtService,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        blacklist: Arc<dyn TokenBlacklist>,
        jwt_service: JwtService,
        access_token_ttl_seconds: i64,
        refresh_token_ttl_seconds: i64,
    ) -> Self {
        Self {
            users,
            blacklist,
            jwt_service,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            state.blacklist.clone(),
            JwtService::new(&state.config.jwt_secret),
            state.config.access_token_ttl_seconds,
            state.config.refresh_token_ttl_seconds,
        )
    }

    fn hash_password(&self, password: &str) -> anyhow::Result<String> {
        hash(password, DEFAULT_COST).context("Failed to hash password")
    }

    fn verify_password(&self, password: &str, password_hash: &str) -> anyhow::Result<bool> {
        verify(password, password_hash).context("Failed to verify password")
    }

    /// Creates the account. Uniqueness is pre-checked for friendly errors and
    /// re-checked by the store's unique indexes, so a race between the two
    /// still maps to the right field.
    pub async fn register(&self, req: RegisterRequest) -> Result<User, RegisterError> {
        if self
            .users
            .find_by_username(&req.username)
            .await?
            .is_some()
        {
            return Err(RegisterError::UsernameTaken);
        }

        if self.users.find_by_email(&req.email).await?.is_some() {
            return Err(RegisterError::EmailTaken);
        }

        let password_hash = self.hash_password(&req.password)?;

        let user = match self
            .users
            .insert(NewUser {
                username: req.username,
                email: req.email,
                password_hash,
            })
            .await
        {
            Ok(user) => user,
            Err(StoreError::Duplicate { field }) => {
                return Err(match field {
                    "email" => RegisterError::EmailTaken,
                    _ => RegisterError::UsernameTaken,
                });
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");

        Ok(user)
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(User, TokenPair), AuthError> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.verify_password(password, &user.password_hash)? {
            tracing::warn!(username = %username, "Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.issue_tokens(&user.id)?;

        tracing::info!(user_id = %user.id, "Successful login");

        Ok((user, tokens))
    }

    /// Exchanges a live refresh token for a fresh access token. The refresh
    /// token itself is not rotated.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self
            .jwt_service
            .validate_token(refresh_token)
            .map_err(|_| AuthError::InvalidToken)?;

        if claims.token_type != TOKEN_TYPE_REFRESH {
            return Err(AuthError::InvalidToken);
        }

        if self.blacklist.is_revoked(&claims.jti).await? {
            return Err(AuthError::InvalidToken);
        }

        self.mint_token(&claims.sub, TOKEN_TYPE_ACCESS, self.access_token_ttl_seconds)
    }

    /// Revokes a refresh token by recording its `jti` until the token would
    /// have expired anyway.
    pub async fn blacklist(&self, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self
            .jwt_service
            .validate_token(refresh_token)
            .map_err(|_| AuthError::InvalidToken)?;

        if claims.token_type != TOKEN_TYPE_REFRESH {
            return Err(AuthError::InvalidToken);
        }

        let expires_at = Utc
            .timestamp_opt(claims.exp as i64, 0)
            .single()
            .unwrap_or_else(Utc::now);

        if !self.blacklist.revoke(&claims.jti, expires_at).await? {
            return Err(AuthError::AlreadyRevoked);
        }

        tracing::info!(user_id = %claims.sub, "Refresh token blacklisted");

        Ok(())
    }

    /// Resolves an access token to its live user. Revoked or mistyped tokens
    /// and deleted subjects all come back as InvalidToken.
    pub async fn verify(&self, access_token: &str) -> Result<User, AuthError> {
        let claims = self
            .jwt_service
            .validate_token(access_token)
            .map_err(|_| AuthError::InvalidToken)?;

        if claims.token_type != TOKEN_TYPE_ACCESS {
            return Err(AuthError::InvalidToken);
        }

        if self.blacklist.is_revoked(&claims.jti).await? {
            return Err(AuthError::InvalidToken);
        }

        self.users
            .find_by_id(&claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    fn issue_tokens(&self, user_id: &str) -> Result<TokenPair, AuthError> {
        let access = self.mint_token(user_id, TOKEN_TYPE_ACCESS, self.access_token_ttl_seconds)?;
        let refresh =
            self.mint_token(user_id, TOKEN_TYPE_REFRESH, self.refresh_token_ttl_seconds)?;
        Ok(TokenPair { access, refresh })
    }

    fn mint_token(
        &self,
        user_id: &str,
        token_type: &str,
        ttl_seconds: i64,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(ttl_seconds);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            token_type: token_type.to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        self.jwt_service
            .generate_token(&claims)
            .map_err(|err| AuthError::Internal(anyhow::anyhow!("Failed to generate token: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryTokenBlacklist, MemoryUserStore};

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryTokenBlacklist::new()),
            JwtService::new("test-secret"),
            300,
            86_400,
        )
    }

    fn register_request(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: "hunter2!".to_string(),
            confirmed_password: "hunter2!".to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_login_roundtrip() {
        let service = service();
        let user = service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();
        assert_eq!(user.username, "alice");
        assert_ne!(user.password_hash, "hunter2!");

        let (logged_in, tokens) = service.login("alice", "hunter2!").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_ne!(tokens.access, tokens.refresh);

        let verified = service.verify(&tokens.access).await.unwrap();
        assert_eq!(verified.id, user.id);
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let service = service();
        service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();

        let err = service.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn unknown_username_is_invalid_credentials() {
        let service = service();
        let err = service.login("nobody", "hunter2!").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_username_and_email_are_distinguished() {
        let service = service();
        service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();

        let err = service
            .register(register_request("alice", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegisterError::UsernameTaken));

        let err = service
            .register(register_request("bob", "alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegisterError::EmailTaken));
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens() {
        let service = service();
        service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();
        let (_, tokens) = service.login("alice", "hunter2!").await.unwrap();

        let err = service.refresh(&tokens.access).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        let new_access = service.refresh(&tokens.refresh).await.unwrap();
        assert!(service.verify(&new_access).await.is_ok());
    }

    #[tokio::test]
    async fn verify_rejects_refresh_tokens() {
        let service = service();
        service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();
        let (_, tokens) = service.login("alice", "hunter2!").await.unwrap();

        let err = service.verify(&tokens.refresh).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn blacklisted_refresh_token_stops_refreshing() {
        let service = service();
        service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();
        let (_, tokens) = service.login("alice", "hunter2!").await.unwrap();

        service.blacklist(&tokens.refresh).await.unwrap();

        let err = service.refresh(&tokens.refresh).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn second_blacklist_reports_already_revoked() {
        let service = service();
        service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();
        let (_, tokens) = service.login("alice", "hunter2!").await.unwrap();

        service.blacklist(&tokens.refresh).await.unwrap();
        let err = service.blacklist(&tokens.refresh).await.unwrap_err();
        assert!(matches!(err, AuthError::AlreadyRevoked));
    }

    #[tokio::test]
    async fn garbage_tokens_are_invalid() {
        let service = service();
        let err = service.blacklist("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }
}
