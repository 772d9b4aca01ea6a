use serde::{Deserialize, Serialize};

use crate::users::repo::User;

/// Request body for user registration. Presence is a validation rule, not
/// a parse error, so every field deserializes as optional.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_confirmation: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Request body for profile update. The id names the target row and is
/// not required to be the caller's own.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Response returned after registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: User,
}

/// Response returned after login and refresh.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

impl TokenResponse {
    pub fn bearer(access_token: String, expires_in: u64) -> Self {
        Self {
            success: true,
            access_token,
            token_type: "Bearer".into(),
            expires_in,
        }
    }
}

/// Response for the profile read.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub data: User,
}

/// Response for the profile update.
#[derive(Debug, Serialize)]
pub struct UpdatedProfileResponse {
    pub success: bool,
    pub message: String,
    pub data: User,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Alice".into(),
            email: "alice@example.com".into(),
            password: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
            remember_token: None,
            email_verified_at: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn token_response_shape() {
        let response = TokenResponse::bearer("abc.def.ghi".into(), 3600);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["access_token"], "abc.def.ghi");
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["expires_in"], 3600);
    }

    #[test]
    fn user_payload_includes_the_password_hash() {
        // Existing clients receive the whole row; the hash stays in the body.
        let json = serde_json::to_value(sample_user()).unwrap();
        assert!(json["password"].as_str().unwrap().starts_with("$argon2"));
        assert!(json.get("remember_token").is_some());
    }

    #[test]
    fn register_request_tolerates_missing_fields() {
        let request: RegisterRequest = serde_json::from_str("{}").unwrap();
        assert!(request.name.is_none());
        assert!(request.email.is_none());
        assert!(request.password.is_none());
        assert!(request.password_confirmation.is_none());
    }

    #[test]
    fn register_response_shape() {
        let response = RegisterResponse {
            message: "User inserted successfully!".into(),
            user: sample_user(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["message"], "User inserted successfully!");
        assert_eq!(json["user"]["email"], "alice@example.com");
    }
}
