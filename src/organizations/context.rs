use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::jwt::{Identity, JwtKeys},
    error::ApiError,
    organizations::repo::{Membership, Role},
    state::AppState,
};

pub const ORG_HEADER: &str = "x-organization-id";

/// Request-scoped organization context: verified identity plus the caller's
/// resolved membership role. Proves membership only; role gating stays with
/// the handler via [`Role::can_manage`].
#[derive(Debug, Clone)]
pub struct OrgContext {
    pub user: Identity,
    pub organization_id: Uuid,
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<AppState> for OrgContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthenticated("Authentication required".into()))?;

        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "token rejected");
            ApiError::Unauthenticated("Invalid or expired token".into())
        })?;

        let organization_id = parts
            .headers
            .get(ORG_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<Uuid>().ok())
            .ok_or_else(|| {
                ApiError::Validation("X-Organization-Id header required".into())
            })?;

        let membership = Membership::find(&state.db, claims.sub, organization_id)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, organization_id = %organization_id, "not a member");
                ApiError::Forbidden("Not a member of this organization".into())
            })?;

        Ok(OrgContext {
            user: Identity {
                user_id: claims.sub,
                email: claims.email,
            },
            organization_id,
            role: membership.role(),
        })
    }
}

impl OrgContext {
    /// Gate for org-mutating operations.
    pub fn require_manage(&self) -> Result<(), ApiError> {
        if self.role.can_manage() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin or owner role required".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with(role: Role) -> OrgContext {
        OrgContext {
            user: Identity {
                user_id: Uuid::new_v4(),
                email: "a@x.com".into(),
            },
            organization_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn member_and_viewer_fail_the_manage_gate() {
        assert!(context_with(Role::Member).require_manage().is_err());
        assert!(context_with(Role::Viewer).require_manage().is_err());
    }

    #[test]
    fn owner_and_admin_pass_the_manage_gate() {
        assert!(context_with(Role::Owner).require_manage().is_ok());
        assert!(context_with(Role::Admin).require_manage().is_ok());
    }

    #[test]
    fn manage_gate_maps_to_forbidden() {
        let err = context_with(Role::Member).require_manage().unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
    }
}
