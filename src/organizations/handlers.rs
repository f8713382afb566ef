use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::jwt::AuthUser,
    error::ApiError,
    organizations::{
        context::OrgContext,
        dto::{CreateOrgRequest, UpdateOrgRequest},
        repo::{MemberRow, Membership, Organization, OrgWithRole, Role},
    },
    state::AppState,
    users::dto::MessageResponse,
};

pub fn org_routes() -> Router<AppState> {
    Router::new()
        .route("/organizations", get(list_organizations).post(create_organization))
        .route(
            "/organizations/:org_id",
            get(get_organization).put(update_organization),
        )
        .route("/organizations/:org_id/members", get(list_members))
}

#[instrument(skip(state, user))]
pub async fn list_organizations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<OrgWithRole>>, ApiError> {
    let orgs = Organization::list_for_user(&state.db, user.user_id).await?;
    Ok(Json(orgs))
}

#[instrument(skip(state, user, payload))]
pub async fn create_organization(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateOrgRequest>,
) -> Result<Json<Organization>, ApiError> {
    if payload.name.trim().is_empty() || payload.slug.trim().is_empty() {
        return Err(ApiError::Validation("Name and slug required".into()));
    }

    if Organization::find_by_slug(&state.db, &payload.slug)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("Organization slug already taken".into()));
    }

    let org = Organization::create(&state.db, &payload.name, &payload.slug).await?;
    Membership::create(&state.db, user.user_id, org.id, Role::Owner, None).await?;

    info!(org_id = %org.id, slug = %org.slug, user_id = %user.user_id, "organization created");
    Ok(Json(org))
}

#[instrument(skip(state, ctx))]
pub async fn get_organization(
    State(state): State<AppState>,
    ctx: OrgContext,
) -> Result<Json<Organization>, ApiError> {
    let org = Organization::find_by_id(&state.db, ctx.organization_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".into()))?;
    Ok(Json(org))
}

#[instrument(skip(state, ctx, payload))]
pub async fn update_organization(
    State(state): State<AppState>,
    ctx: OrgContext,
    Json(payload): Json<UpdateOrgRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    ctx.require_manage()?;

    if payload.is_empty() {
        return Ok(Json(MessageResponse::new("No changes")));
    }

    Organization::update(
        &state.db,
        ctx.organization_id,
        payload.name.as_deref(),
        payload.logo_url.as_deref(),
        payload.settings.as_ref(),
    )
    .await?;

    info!(org_id = %ctx.organization_id, user_id = %ctx.user.user_id, "organization updated");
    Ok(Json(MessageResponse::new("Organization updated")))
}

#[instrument(skip(state, ctx))]
pub async fn list_members(
    State(state): State<AppState>,
    ctx: OrgContext,
) -> Result<Json<Vec<MemberRow>>, ApiError> {
    let members = Membership::list_members(&state.db, ctx.organization_id).await?;
    Ok(Json(members))
}
