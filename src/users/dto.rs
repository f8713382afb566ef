use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::repo::User;

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            name: u.name.clone(),
            avatar_url: u.avatar_url.clone(),
            email_verified: u.email_verified,
        }
    }
}

/// GET /users/me body: public profile plus the caller's own settings.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: PublicUser,
    pub settings: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub settings: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn me_response_flattens_user_and_keeps_settings() {
        let user = User {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            name: "Test".into(),
            avatar_url: None,
            email_verified: true,
            settings: serde_json::json!({"theme": "dark"}),
            last_login_at: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };
        let body = MeResponse {
            user: PublicUser::from(&user),
            settings: user.settings.clone(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["email"], "test@example.com");
        assert_eq!(json["settings"]["theme"], "dark");
        assert!(json.get("last_login_at").is_none());
    }
}
