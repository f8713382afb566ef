use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Membership role within an organization, most to least privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            "member" => Some(Role::Member),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    /// The one authorization predicate for organization-mutating operations:
    /// updating org settings, sending invitations.
    pub fn can_manage(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub settings: serde_json::Value,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: String,
    pub invited_by: Option<Uuid>,
    pub joined_at: OffsetDateTime,
}

impl Membership {
    /// Unknown role strings degrade to the least-privileged role.
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::Viewer)
    }
}

/// Organization joined with the caller's role, for listings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrgWithRole {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub role: String,
}

/// Membership joined with the member's public profile.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MemberRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub invited_by: Option<Uuid>,
    pub joined_at: OffsetDateTime,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

const ORG_COLUMNS: &str = "id, name, slug, logo_url, settings, created_at, updated_at";

impl Organization {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Organization>> {
        let org = sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORG_COLUMNS} FROM organizations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(org)
    }

    pub async fn find_by_slug(db: &PgPool, slug: &str) -> anyhow::Result<Option<Organization>> {
        let org = sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORG_COLUMNS} FROM organizations WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(db)
        .await?;
        Ok(org)
    }

    pub async fn create(db: &PgPool, name: &str, slug: &str) -> anyhow::Result<Organization> {
        let org = sqlx::query_as::<_, Organization>(&format!(
            r#"
            INSERT INTO organizations (name, slug)
            VALUES ($1, $2)
            RETURNING {ORG_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(slug)
        .fetch_one(db)
        .await?;
        Ok(org)
    }

    /// Partial update; absent fields keep their current value.
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        logo_url: Option<&str>,
        settings: Option<&serde_json::Value>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE organizations
            SET name = COALESCE($2, name),
                logo_url = COALESCE($3, logo_url),
                settings = COALESCE($4, settings),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(logo_url)
        .bind(settings)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<OrgWithRole>> {
        let rows = sqlx::query_as::<_, OrgWithRole>(
            r#"
            SELECT o.id, o.name, o.slug, o.logo_url, m.role
            FROM organizations o
            JOIN org_memberships m ON m.organization_id = o.id
            WHERE m.user_id = $1
            ORDER BY o.name
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}

const MEMBERSHIP_COLUMNS: &str = "id, user_id, organization_id, role, invited_by, joined_at";

impl Membership {
    pub async fn find(
        db: &PgPool,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> anyhow::Result<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(&format!(
            r#"
            SELECT {MEMBERSHIP_COLUMNS} FROM org_memberships
            WHERE user_id = $1 AND organization_id = $2
            "#
        ))
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(db)
        .await?;
        Ok(membership)
    }

    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        organization_id: Uuid,
        role: Role,
        invited_by: Option<Uuid>,
    ) -> anyhow::Result<Membership> {
        let membership = sqlx::query_as::<_, Membership>(&format!(
            r#"
            INSERT INTO org_memberships (user_id, organization_id, role, invited_by)
            VALUES ($1, $2, $3, $4)
            RETURNING {MEMBERSHIP_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(organization_id)
        .bind(role.as_str())
        .bind(invited_by)
        .fetch_one(db)
        .await?;
        Ok(membership)
    }

    pub async fn list_members(
        db: &PgPool,
        organization_id: Uuid,
    ) -> anyhow::Result<Vec<MemberRow>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT m.id, m.user_id, m.role, m.invited_by, m.joined_at,
                   u.email, u.name, u.avatar_url
            FROM org_memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.organization_id = $1
            ORDER BY m.joined_at
            "#,
        )
        .bind(organization_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_string_roundtrip() {
        for role in [Role::Owner, Role::Admin, Role::Member, Role::Viewer] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn only_owner_and_admin_can_manage() {
        assert!(Role::Owner.can_manage());
        assert!(Role::Admin.can_manage());
        assert!(!Role::Member.can_manage());
        assert!(!Role::Viewer.can_manage());
    }

    #[test]
    fn unknown_stored_role_degrades_to_viewer() {
        let m = Membership {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            role: "superuser".into(),
            invited_by: None,
            joined_at: OffsetDateTime::now_utc(),
        };
        assert_eq!(m.role(), Role::Viewer);
        assert!(!m.role().can_manage());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Owner).unwrap(), r#""owner""#);
        let parsed: Role = serde_json::from_str(r#""admin""#).unwrap();
        assert_eq!(parsed, Role::Admin);
    }
}
