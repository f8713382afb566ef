use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRef, State},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest, TokenResponse, VerifyPinRequest},
        jwt::{JwtKeys, MaybeAuthUser},
        pin::{create_pin, verify_pin, PinPurpose},
    },
    error::ApiError,
    hub::email,
    organizations::repo::{Membership, Organization, Role},
    state::AppState,
    users::{
        dto::{MessageResponse, PublicUser},
        repo::User,
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify-pin", post(verify))
        .route("/auth/refresh", post(refresh))
        .route("/auth/dev-login", get(dev_login))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.email.is_empty() || payload.name.trim().is_empty() {
        return Err(ApiError::Validation("Email and name required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("User already exists. Please log in.".into()));
    }

    let user = User::create(&state.db, &payload.email, payload.name.trim(), false).await?;

    let pin = create_pin(&state.db, &payload.email, PinPurpose::Verification).await?;
    email::send_pin(&state.hub, &payload.email, &pin)
        .await
        .map_err(|e| {
            warn!(error = %e, "pin email failed");
            ApiError::Upstream("Failed to send verification email".into())
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(MessageResponse::new("Verification PIN sent to your email")))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.email.is_empty() {
        return Err(ApiError::Validation("Email required".into()));
    }

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("No account found. Please register first.".into()))?;

    let pin = create_pin(&state.db, &payload.email, PinPurpose::Login).await?;
    email::send_pin(&state.hub, &payload.email, &pin)
        .await
        .map_err(|e| {
            warn!(error = %e, "pin email failed");
            ApiError::Upstream("Failed to send login email".into())
        })?;

    info!(user_id = %user.id, email = %user.email, "login pin sent");
    Ok(Json(MessageResponse::new("Login PIN sent to your email")))
}

#[instrument(skip(state, payload))]
pub async fn verify(
    State(state): State<AppState>,
    Json(mut payload): Json<VerifyPinRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.email.is_empty() || payload.pin.is_empty() {
        return Err(ApiError::Validation("Email and PIN required".into()));
    }

    let purpose = PinPurpose::parse_lenient(payload.purpose.as_deref());
    let valid = verify_pin(&state.db, &payload.email, &payload.pin, purpose).await?;
    if !valid {
        warn!(email = %payload.email, "pin rejected");
        return Err(ApiError::Unauthenticated("Invalid or expired PIN".into()));
    }

    if purpose == PinPurpose::Verification {
        User::mark_email_verified(&state.db, &payload.email).await?;
    }

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    User::touch_last_login(&state.db, user.id).await?;

    if purpose == PinPurpose::Verification {
        // Best effort; the login must not fail over a welcome email.
        if let Err(e) = email::send_welcome(&state.hub, &user.email, &user.name).await {
            warn!(error = %e, "welcome email failed");
        }
    }

    let organizations = Organization::list_for_user(&state.db, user.id).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(&user),
        organizations,
    }))
}

#[instrument(skip(state, identity))]
pub async fn refresh(
    State(state): State<AppState>,
    MaybeAuthUser(identity): MaybeAuthUser,
) -> Result<Json<TokenResponse>, ApiError> {
    let identity =
        identity.ok_or_else(|| ApiError::Unauthenticated("Valid token required".into()))?;

    let user = User::find_by_id(&state.db, identity.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email)?;
    Ok(Json(TokenResponse { token }))
}

/// Localhost-only bootstrap: dev user, 'dev' organization, owner membership.
#[instrument(skip(state))]
pub async fn dev_login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<Json<AuthResponse>, ApiError> {
    if state.config.disable_dev_login {
        return Err(ApiError::Forbidden("Dev login is disabled".into()));
    }
    if !addr.ip().is_loopback() {
        return Err(ApiError::Forbidden(
            "Dev login only available from localhost".into(),
        ));
    }

    let user = match User::find_by_email(&state.db, "dev@localhost").await? {
        Some(u) => u,
        None => User::create(&state.db, "dev@localhost", "Dev User", true).await?,
    };

    let org = match Organization::find_by_slug(&state.db, "dev").await? {
        Some(o) => o,
        None => Organization::create(&state.db, "Development", "dev").await?,
    };

    if Membership::find(&state.db, user.id, org.id).await?.is_none() {
        Membership::create(&state.db, user.id, org.id, Role::Owner, None).await?;
    }

    User::touch_last_login(&state.db, user.id).await?;

    let organizations = Organization::list_for_user(&state.db, user.id).await?;
    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email)?;

    info!(user_id = %user.id, "dev login");
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(&user),
        organizations,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation_accepts_plausible_addresses() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last+tag@sub.domain.org"));
    }

    #[test]
    fn email_validation_rejects_malformed_addresses() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@@x.com"));
        assert!(!is_valid_email("spaces in@x.com"));
        assert!(!is_valid_email("a@nodot"));
    }

    #[test]
    fn auth_response_serializes_token_user_and_orgs() {
        let response = AuthResponse {
            token: "tok".into(),
            user: PublicUser {
                id: uuid::Uuid::new_v4(),
                email: "test@example.com".into(),
                name: "Test".into(),
                avatar_url: None,
                email_verified: true,
            },
            organizations: vec![],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["token"], "tok");
        assert_eq!(json["user"]["email"], "test@example.com");
        assert!(json["organizations"].as_array().unwrap().is_empty());
    }
}
