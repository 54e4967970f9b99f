use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for registration (`POST /api/auth/signin`).
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Self-service partial update; absent fields keep their stored values.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

/// Response returned after login or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub firstname: String,
}

/// Generic `{success, message}` envelope for side-effecting operations.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct MeData {
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub message: String,
    pub data: MeData,
}

/// Admin listing is intentionally just a count.
#[derive(Debug, Serialize)]
pub struct UsersCountResponse {
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn me_response_serialization() {
        let response = MeResponse {
            success: true,
            message: "You are logged in.".into(),
            data: MeData {
                user: UserProfile {
                    id: Uuid::new_v4(),
                    email: "test@example.com".into(),
                    firstname: "Jo".into(),
                    lastname: "Do".into(),
                    status: "active".into(),
                },
            },
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"status\":\"active\""));
    }

    #[test]
    fn update_request_fields_default_to_none() {
        let req: UpdateUserRequest = serde_json::from_str("{\"firstname\":\"Ana\"}").unwrap();
        assert_eq!(req.firstname.as_deref(), Some("Ana"));
        assert!(req.email.is_none());
        assert!(req.password.is_none());
        assert!(req.lastname.is_none());
    }
}
