use serde::{Deserialize, Serialize};

use crate::organizations::repo::OrgWithRole;
use crate::users::dto::PublicUser;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPinRequest {
    pub email: String,
    pub pin: String,
    pub purpose: Option<String>,
}

/// Response after a successful PIN verification or dev login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
    pub organizations: Vec<OrgWithRole>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}
