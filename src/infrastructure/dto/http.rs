//! HTTP API request/response DTOs for the REST backend.

use serde::{Deserialize, Serialize};

/// Body of `POST /auth/login/`
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Body of `POST /auth/register/`
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub discord_username: String,
}

/// Response of `POST /auth/register/` (201 Created)
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub id: i64,
}

/// Response of `GET /auth/jwt/`
#[derive(Debug, Clone, Deserialize)]
pub struct JwtResponse {
    pub token: String,
}

/// Error body returned by the backend on 4xx responses.
///
/// `username` accompanies the Discord-verification error detail and is
/// surfaced in the user-facing message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// A permission group in a member profile
#[derive(Debug, Clone, Deserialize)]
pub struct GroupDto {
    pub name: String,
}

/// Response of `GET /members/profile/`
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub groups: Vec<GroupDto>,
}
