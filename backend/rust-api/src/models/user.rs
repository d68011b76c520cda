use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A registered account.
///
/// Ids are backend-assigned strings (ObjectId hex under MongoDB, UUIDs in the
/// in-memory store); nothing outside `store` depends on their shape.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// New account data handed to the store; id and timestamp are assigned there.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// User fields exposed to clients (no credentials).
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        PublicUser {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

/// Request to register a new user
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(
        min = 1,
        max = 150,
        message = "Username must be between 1 and 150 characters."
    ))]
    pub username: String,

    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirmed_password: String,
}

/// Request to login
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub username: String,

    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

/// Plain confirmation body, used by register and logout
#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub detail: String,
}

/// Response after successful login (tokens travel in HTTP-only cookies)
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub detail: String,
    pub user: PublicUser,
}

/// Response after a successful token refresh
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub detail: String,
    pub access: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn request(password: &str, confirmed: &str) -> RegisterRequest {
        RegisterRequest {
            username: "u1".to_string(),
            email: "u1@example.com".to_string(),
            password: password.to_string(),
            confirmed_password: confirmed.to_string(),
        }
    }

    #[test]
    fn matching_passwords_validate() {
        assert!(request("p", "p").validate().is_ok());
    }

    #[test]
    fn mismatched_passwords_land_on_confirmed_password() {
        let errors = request("p", "q").validate().unwrap_err();
        let field_errors = errors.field_errors();
        let messages = &field_errors["confirmed_password"];
        assert_eq!(
            messages[0].message.as_deref(),
            Some("Passwords do not match")
        );
    }

    #[test]
    fn malformed_email_is_rejected() {
        let mut req = request("p", "p");
        req.email = "not-an-email".to_string();
        assert!(req.validate().is_err());
    }
}
