use axum::{
    extract::{Host, Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::jwt::AuthUser,
    error::ApiError,
    hub::email,
    invitations::{
        dto::{CreateInvitationRequest, InvitationSummary},
        repo::{AcceptOutcome, Invitation},
    },
    organizations::{
        context::OrgContext,
        repo::{Organization, Role},
    },
    state::AppState,
    users::{dto::MessageResponse, repo::User},
};

pub fn invitation_routes() -> Router<AppState> {
    Router::new()
        .route("/invitations", post(create_invitation))
        .route("/invitations/:token", get(get_invitation))
        .route("/invitations/:token/accept", post(accept_invitation))
}

#[instrument(skip(state, ctx, payload))]
pub async fn create_invitation(
    State(state): State<AppState>,
    Host(host): Host,
    ctx: OrgContext,
    Json(payload): Json<CreateInvitationRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    ctx.require_manage()?;

    let email_addr = payload.email.trim().to_lowercase();
    if email_addr.is_empty() {
        return Err(ApiError::Validation("Email required".into()));
    }

    let role = match payload.role.as_deref() {
        None => Role::Member,
        Some(s) => {
            Role::parse(s).ok_or_else(|| ApiError::Validation(format!("Unknown role: {s}")))?
        }
    };

    let invitation = Invitation::issue(
        &state.db,
        ctx.organization_id,
        &email_addr,
        role,
        ctx.user.user_id,
    )
    .await?;

    let inviter = User::find_by_id(&state.db, ctx.user.user_id).await?;
    let org = Organization::find_by_id(&state.db, ctx.organization_id).await?;
    let link = invite_link(&host, &invitation.token);

    email::send_invitation(
        &state.hub,
        &email_addr,
        org.as_ref().map(|o| o.name.as_str()).unwrap_or("the organization"),
        inviter.as_ref().map(|u| u.name.as_str()).unwrap_or("Someone"),
        &link,
    )
    .await
    .map_err(|e| {
        warn!(error = %e, "invitation email failed");
        ApiError::Upstream("Failed to send invitation email".into())
    })?;

    info!(org_id = %ctx.organization_id, email = %email_addr, "invitation sent");
    Ok(Json(MessageResponse::new("Invitation sent")))
}

#[instrument(skip(state))]
pub async fn get_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<InvitationSummary>, ApiError> {
    let invitation = Invitation::resolve(&state.db, &token)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invitation not found or expired".into()))?;

    Ok(Json(InvitationSummary {
        email: invitation.email,
        role: invitation.role,
        organization: invitation.org_name,
        expires_at: invitation.expires_at,
    }))
}

#[instrument(skip(state, user))]
pub async fn accept_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    match Invitation::accept(&state.db, &token, user.user_id).await? {
        AcceptOutcome::Accepted => Ok(Json(MessageResponse::new("Invitation accepted"))),
        AcceptOutcome::NotFound => {
            Err(ApiError::NotFound("Invitation not found or expired".into()))
        }
        AcceptOutcome::AlreadyMember => Err(ApiError::Conflict(
            "Already a member of this organization".into(),
        )),
    }
}

fn invite_link(host: &str, token: &str) -> String {
    let scheme = if host.starts_with("localhost") || host.starts_with("127.") {
        "http"
    } else {
        "https"
    };
    format!("{scheme}://{host}/invite/{token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_link_uses_plain_http_locally() {
        assert_eq!(
            invite_link("localhost:4001", "abc"),
            "http://localhost:4001/invite/abc"
        );
        assert_eq!(
            invite_link("app.example.com", "abc"),
            "https://app.example.com/invite/abc"
        );
    }
}
