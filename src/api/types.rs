use serde::{Deserialize, Serialize};

use crate::domain::{Identity, Role, UserProfile};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub uptime_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub token: String,
    pub expires_at: Option<String>,
    pub user: Identity,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub user: Identity,
    pub role: Role,
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
