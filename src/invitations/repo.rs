use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::organizations::repo::Role;

pub const INVITATION_TTL_DAYS: i64 = 7;

/// Opaque invitation token: 32 random bytes, hex-encoded (256 bits).
pub fn new_invitation_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub role: String,
    pub token: String,
    pub invited_by: Uuid,
    pub expires_at: OffsetDateTime,
    pub accepted_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Pending invitation joined with the organization name, for the public
/// lookup. Expired and accepted invitations are indistinguishable from
/// missing ones.
#[derive(Debug, Clone, FromRow)]
pub struct PendingInvitation {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub role: String,
    pub invited_by: Uuid,
    pub expires_at: OffsetDateTime,
    pub org_name: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted,
    NotFound,
    AlreadyMember,
}

const INVITATION_COLUMNS: &str =
    "id, organization_id, email, role, token, invited_by, expires_at, accepted_at, created_at";

/// Acceptance decision over a fetched row. The SQL lookup already filters on
/// the pending window; re-checking here keeps the whole policy in one place,
/// like the PIN verdict.
pub(crate) fn adjudicate(
    invitation: Option<&Invitation>,
    already_member: bool,
    now: OffsetDateTime,
) -> AcceptOutcome {
    let Some(invitation) = invitation else {
        return AcceptOutcome::NotFound;
    };
    if !invitation.is_pending(now) {
        return AcceptOutcome::NotFound;
    }
    if already_member {
        return AcceptOutcome::AlreadyMember;
    }
    AcceptOutcome::Accepted
}

impl Invitation {
    /// Pending window shared by `resolve` and `accept`: unaccepted and
    /// unexpired. Anything outside it reads as not-found.
    pub fn is_pending(&self, now: OffsetDateTime) -> bool {
        self.accepted_at.is_none() && self.expires_at > now
    }

    /// Role carried into the created membership; unknown stored strings fall
    /// back to plain member.
    pub fn membership_role(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::Member)
    }
    /// Persist a pending invitation with a fresh token and 7-day expiry.
    pub async fn issue(
        db: &PgPool,
        organization_id: Uuid,
        email: &str,
        role: Role,
        invited_by: Uuid,
    ) -> anyhow::Result<Invitation> {
        let token = new_invitation_token();
        let expires_at = OffsetDateTime::now_utc() + Duration::days(INVITATION_TTL_DAYS);

        let invitation = sqlx::query_as::<_, Invitation>(&format!(
            r#"
            INSERT INTO invitations (organization_id, email, role, token, invited_by, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {INVITATION_COLUMNS}
            "#
        ))
        .bind(organization_id)
        .bind(email)
        .bind(role.as_str())
        .bind(&token)
        .bind(invited_by)
        .bind(expires_at)
        .fetch_one(db)
        .await?;

        info!(org_id = %organization_id, email = %email, role = role.as_str(), "invitation issued");
        Ok(invitation)
    }

    /// Look up an invitation still inside its pending window.
    pub async fn resolve(db: &PgPool, token: &str) -> anyhow::Result<Option<PendingInvitation>> {
        let invitation = sqlx::query_as::<_, PendingInvitation>(
            r#"
            SELECT i.id, i.organization_id, i.email, i.role, i.invited_by, i.expires_at,
                   o.name AS org_name
            FROM invitations i
            JOIN organizations o ON o.id = i.organization_id
            WHERE i.token = $1 AND i.accepted_at IS NULL AND i.expires_at > NOW()
            "#,
        )
        .bind(token)
        .fetch_optional(db)
        .await?;
        Ok(invitation)
    }

    /// Convert a pending invitation into a membership. Membership insert and
    /// acceptance stamp commit together; the row lock on the invitation and
    /// the UNIQUE (user_id, organization_id) constraint make a concurrent
    /// duplicate accept fail instead of double-inserting.
    pub async fn accept(
        db: &PgPool,
        token: &str,
        accepting_user_id: Uuid,
    ) -> anyhow::Result<AcceptOutcome> {
        let mut tx = db.begin().await?;

        let invitation = sqlx::query_as::<_, Invitation>(&format!(
            r#"
            SELECT {INVITATION_COLUMNS} FROM invitations
            WHERE token = $1 AND accepted_at IS NULL AND expires_at > NOW()
            FOR UPDATE
            "#
        ))
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(invitation) = invitation else {
            return Ok(AcceptOutcome::NotFound);
        };

        let existing = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM org_memberships WHERE user_id = $1 AND organization_id = $2",
        )
        .bind(accepting_user_id)
        .bind(invitation.organization_id)
        .fetch_optional(&mut *tx)
        .await?;

        match adjudicate(Some(&invitation), existing.is_some(), OffsetDateTime::now_utc()) {
            AcceptOutcome::Accepted => {}
            other => return Ok(other),
        }

        let role = invitation.membership_role();
        sqlx::query(
            r#"
            INSERT INTO org_memberships (user_id, organization_id, role, invited_by)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(accepting_user_id)
        .bind(invitation.organization_id)
        .bind(role.as_str())
        .bind(invitation.invited_by)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE invitations SET accepted_at = NOW() WHERE id = $1")
            .bind(invitation.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(invitation_id = %invitation.id, user_id = %accepting_user_id, "invitation accepted");
        Ok(AcceptOutcome::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn token_is_256_bits_of_hex() {
        let token = new_invitation_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_do_not_repeat() {
        let tokens: HashSet<String> = (0..100).map(|_| new_invitation_token()).collect();
        assert_eq!(tokens.len(), 100);
    }

    #[test]
    fn expiry_is_seven_days_out() {
        let expires = OffsetDateTime::now_utc() + Duration::days(INVITATION_TTL_DAYS);
        let delta = expires - OffsetDateTime::now_utc();
        assert!(delta > Duration::days(6) && delta <= Duration::days(7));
    }

    fn pending_invitation(role: &str) -> Invitation {
        let now = OffsetDateTime::now_utc();
        Invitation {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            email: "invitee@x.com".into(),
            role: role.into(),
            token: new_invitation_token(),
            invited_by: Uuid::new_v4(),
            expires_at: now + Duration::days(INVITATION_TTL_DAYS),
            accepted_at: None,
            created_at: now,
        }
    }

    #[test]
    fn pending_invitation_accepts_for_a_non_member() {
        let inv = pending_invitation("admin");
        let now = OffsetDateTime::now_utc();
        assert_eq!(adjudicate(Some(&inv), false, now), AcceptOutcome::Accepted);
    }

    #[test]
    fn accepted_invitation_reads_as_not_found_on_second_accept() {
        let mut inv = pending_invitation("member");
        inv.accepted_at = Some(OffsetDateTime::now_utc());
        let now = OffsetDateTime::now_utc();
        assert_eq!(adjudicate(Some(&inv), false, now), AcceptOutcome::NotFound);
        // and it has left the pending window that resolve() filters on
        assert!(!inv.is_pending(now));
    }

    #[test]
    fn expired_invitation_reads_as_not_found() {
        let mut inv = pending_invitation("member");
        inv.expires_at = OffsetDateTime::now_utc() - Duration::seconds(1);
        let now = OffsetDateTime::now_utc();
        assert_eq!(adjudicate(Some(&inv), false, now), AcceptOutcome::NotFound);
        assert!(!inv.is_pending(now));
    }

    #[test]
    fn missing_invitation_reads_as_not_found() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(adjudicate(None, false, now), AcceptOutcome::NotFound);
    }

    #[test]
    fn existing_membership_wins_over_acceptance() {
        let inv = pending_invitation("member");
        let now = OffsetDateTime::now_utc();
        assert_eq!(
            adjudicate(Some(&inv), true, now),
            AcceptOutcome::AlreadyMember
        );
    }

    #[test]
    fn membership_carries_the_proposed_role() {
        assert_eq!(pending_invitation("admin").membership_role(), Role::Admin);
        assert_eq!(pending_invitation("viewer").membership_role(), Role::Viewer);
        // unknown stored strings degrade to plain member
        assert_eq!(pending_invitation("bogus").membership_role(), Role::Member);
    }
}
