//! Organization repository for organization lifecycle management
//!
//! CRUD and listing queries for organizations and organization memberships.

use crate::auth::organization::{
    OrgRole, OrgStatus, Organization, OrganizationMembership, OwnedOrganization,
};
use crate::domain::{OrgId, UserId};
use crate::errors::{Error, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::str::FromStr;
use tracing::instrument;

// Database row structures

#[derive(Debug, Clone, FromRow)]
struct OrganizationRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub status: String,
    pub require_2fa: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<OrganizationRow> for Organization {
    type Error = Error;

    fn try_from(row: OrganizationRow) -> Result<Self> {
        let status = OrgStatus::from_str(&row.status).map_err(|e| {
            Error::validation(format!("Invalid organization status '{}': {}", row.status, e))
        })?;

        Ok(Organization {
            id: OrgId::new(row.id),
            name: row.name,
            slug: row.slug,
            status,
            require_2fa: row.require_2fa,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct OwnedOrganizationRow {
    #[sqlx(flatten)]
    pub organization: OrganizationRow,
    pub owner_count: i64,
}

#[derive(Debug, Clone, FromRow)]
struct OrgMembershipRow {
    pub id: i64,
    pub org_id: i64,
    pub user_id: i64,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<OrgMembershipRow> for OrganizationMembership {
    type Error = Error;

    fn try_from(row: OrgMembershipRow) -> Result<Self> {
        let role = OrgRole::from_str(&row.role).map_err(|e| {
            Error::validation(format!("Invalid organization role '{}': {}", row.role, e))
        })?;

        Ok(OrganizationMembership {
            id: row.id,
            org_id: OrgId::new(row.org_id),
            user_id: UserId::new(row.user_id),
            role,
            created_at: row.created_at,
        })
    }
}

/// Values for a new organization row.
#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub slug: String,
}

/// Ordering of organization listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrganizationSort {
    /// Most recently created first
    #[default]
    Newest,
    /// Largest membership first
    Members,
}

/// Filters applied by [`OrganizationRepository::list_organizations`].
///
/// Empty vectors mean "no restriction"; a present but empty `statuses` is
/// handled by the caller since it can never match.
#[derive(Debug, Clone, Default)]
pub struct OrganizationFilter {
    /// Restrict to organizations this user has a membership in
    pub member_of: Option<UserId>,
    pub statuses: Vec<OrgStatus>,
    pub slugs: Vec<String>,
    pub ids: Vec<OrgId>,
    /// Organizations that have a member with one of these emails (case-insensitive)
    pub member_emails: Vec<String>,
    /// Case-insensitive substring match against name or slug
    pub text: Option<String>,
    pub sort: OrganizationSort,
}

/// Changes applied by [`OrganizationRepository::update_organization`].
#[derive(Debug, Clone, Default)]
pub struct OrganizationUpdate {
    pub name: Option<String>,
    pub require_2fa: Option<bool>,
    pub status: Option<OrgStatus>,
}

// Repository traits

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// Insert an organization and make `owner` its owner, atomically.
    async fn create_with_owner(
        &self,
        organization: NewOrganization,
        owner: &UserId,
    ) -> Result<Organization>;
    async fn get_organization_by_id(&self, id: &OrgId) -> Result<Option<Organization>>;
    async fn get_organization_by_slug(&self, slug: &str) -> Result<Option<Organization>>;
    async fn is_slug_available(&self, slug: &str) -> Result<bool>;
    async fn list_organizations(&self, filter: &OrganizationFilter) -> Result<Vec<Organization>>;
    /// Active organizations where `user_id` is an owner, in creation order.
    async fn list_owned_organizations(&self, user_id: &UserId) -> Result<Vec<OwnedOrganization>>;
    async fn update_organization(
        &self,
        id: &OrgId,
        update: OrganizationUpdate,
    ) -> Result<Organization>;
}

#[async_trait]
pub trait OrgMembershipRepository: Send + Sync {
    async fn create_membership(
        &self,
        user_id: &UserId,
        org_id: &OrgId,
        role: OrgRole,
    ) -> Result<OrganizationMembership>;
    async fn get_membership(
        &self,
        user_id: &UserId,
        org_id: &OrgId,
    ) -> Result<Option<OrganizationMembership>>;
    async fn list_user_memberships(&self, user_id: &UserId) -> Result<Vec<OrganizationMembership>>;
    /// Whether the user belongs to any organization that requires 2FA.
    async fn is_member_of_2fa_organization(&self, user_id: &UserId) -> Result<bool>;
}

// SQLx implementations

#[derive(Debug, Clone)]
pub struct SqlxOrganizationRepository {
    pool: DbPool,
}

impl SqlxOrganizationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn slug_conflict(slug: &str) -> Error {
    Error::conflict(
        format!("An organization with the slug '{}' already exists", slug),
        "Organization",
    )
}

/// Escape LIKE wildcards so user input is matched literally.
fn like_pattern(text: &str) -> String {
    let escaped = text
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl OrganizationRepository for SqlxOrganizationRepository {
    #[instrument(
        skip(self, organization),
        fields(org_slug = %organization.slug, owner_id = %owner),
        name = "db_create_organization"
    )]
    async fn create_with_owner(
        &self,
        organization: NewOrganization,
        owner: &UserId,
    ) -> Result<Organization> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::database(e, "Failed to begin transaction for organization creation")
        })?;

        let row = sqlx::query_as::<_, OrganizationRow>(
            "INSERT INTO organizations (name, slug, status, require_2fa, created_at)
             VALUES ($1, $2, $3, FALSE, $4)
             RETURNING id, name, slug, status, require_2fa, created_at",
        )
        .bind(&organization.name)
        .bind(&organization.slug)
        .bind(OrgStatus::Active.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            let err = Error::database(e, "Failed to create organization");
            if err.is_unique_violation() {
                slug_conflict(&organization.slug)
            } else {
                err
            }
        })?;

        sqlx::query(
            "INSERT INTO organization_memberships (org_id, user_id, role, created_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(row.id)
        .bind(owner)
        .bind(OrgRole::Owner.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::database(e, "Failed to create owner membership"))?;

        tx.commit()
            .await
            .map_err(|e| Error::database(e, "Failed to commit organization creation"))?;

        row.try_into()
    }

    #[instrument(skip(self), fields(org_id = %id), name = "db_get_organization_by_id")]
    async fn get_organization_by_id(&self, id: &OrgId) -> Result<Option<Organization>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "SELECT id, name, slug, status, require_2fa, created_at FROM organizations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database(e, format!("Failed to fetch organization by ID: {}", id)))?;

        row.map(|r| r.try_into()).transpose()
    }

    #[instrument(skip(self), fields(org_slug = %slug), name = "db_get_organization_by_slug")]
    async fn get_organization_by_slug(&self, slug: &str) -> Result<Option<Organization>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "SELECT id, name, slug, status, require_2fa, created_at FROM organizations WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::database(e, format!("Failed to fetch organization by slug: {}", slug))
        })?;

        row.map(|r| r.try_into()).transpose()
    }

    #[instrument(skip(self), fields(org_slug = %slug), name = "db_is_org_slug_available")]
    async fn is_slug_available(&self, slug: &str) -> Result<bool> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM organizations WHERE slug = $1")
                .bind(slug)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    Error::database(e, format!("Failed to check slug availability: {}", slug))
                })?;

        Ok(count == 0)
    }

    #[instrument(skip(self, filter), fields(member_of = ?filter.member_of), name = "db_list_organizations")]
    async fn list_organizations(&self, filter: &OrganizationFilter) -> Result<Vec<Organization>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT o.id, o.name, o.slug, o.status, o.require_2fa, o.created_at \
             FROM organizations o WHERE 1 = 1",
        );

        if let Some(user_id) = &filter.member_of {
            query.push(
                " AND EXISTS (SELECT 1 FROM organization_memberships m \
                 WHERE m.org_id = o.id AND m.user_id = ",
            );
            query.push_bind(*user_id);
            query.push(")");
        }

        if !filter.statuses.is_empty() {
            query.push(" AND o.status IN (");
            let mut separated = query.separated(", ");
            for status in &filter.statuses {
                separated.push_bind(status.as_str());
            }
            separated.push_unseparated(")");
        }

        if !filter.slugs.is_empty() {
            query.push(" AND o.slug IN (");
            let mut separated = query.separated(", ");
            for slug in &filter.slugs {
                separated.push_bind(slug.clone());
            }
            separated.push_unseparated(")");
        }

        if !filter.ids.is_empty() {
            query.push(" AND o.id IN (");
            let mut separated = query.separated(", ");
            for id in &filter.ids {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
        }

        if !filter.member_emails.is_empty() {
            query.push(
                " AND o.id IN (SELECT em.org_id FROM organization_memberships em \
                 JOIN users u ON u.id = em.user_id WHERE lower(u.email) IN (",
            );
            let mut separated = query.separated(", ");
            for email in &filter.member_emails {
                separated.push_bind(email.to_lowercase());
            }
            separated.push_unseparated("))");
        }

        if let Some(text) = filter.text.as_deref().filter(|t| !t.is_empty()) {
            let pattern = like_pattern(text);
            query.push(" AND (lower(o.name) LIKE ");
            query.push_bind(pattern.clone());
            query.push(" ESCAPE '\\' OR lower(o.slug) LIKE ");
            query.push_bind(pattern);
            query.push(" ESCAPE '\\')");
        }

        match filter.sort {
            OrganizationSort::Newest => {
                query.push(" ORDER BY o.id DESC");
            }
            OrganizationSort::Members => {
                query.push(
                    " ORDER BY (SELECT COUNT(*) FROM organization_memberships c \
                     WHERE c.org_id = o.id) DESC, o.id DESC",
                );
            }
        }

        let rows = query
            .build_query_as::<OrganizationRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(e, "Failed to list organizations"))?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    #[instrument(skip(self), fields(user_id = %user_id), name = "db_list_owned_organizations")]
    async fn list_owned_organizations(&self, user_id: &UserId) -> Result<Vec<OwnedOrganization>> {
        let rows = sqlx::query_as::<_, OwnedOrganizationRow>(
            "SELECT o.id, o.name, o.slug, o.status, o.require_2fa, o.created_at,
                    (SELECT COUNT(*) FROM organization_memberships c
                     WHERE c.org_id = o.id AND c.role = $2) AS owner_count
             FROM organizations o
             JOIN organization_memberships m ON m.org_id = o.id
             WHERE m.user_id = $1 AND m.role = $2 AND o.status = $3
             ORDER BY o.id ASC",
        )
        .bind(user_id)
        .bind(OrgRole::Owner.as_str())
        .bind(OrgStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::database(e, format!("Failed to list organizations owned by user {}", user_id))
        })?;

        rows.into_iter()
            .map(|row| {
                Ok(OwnedOrganization {
                    organization: row.organization.try_into()?,
                    owner_count: row.owner_count,
                })
            })
            .collect()
    }

    #[instrument(skip(self, update), fields(org_id = %id), name = "db_update_organization")]
    async fn update_organization(
        &self,
        id: &OrgId,
        update: OrganizationUpdate,
    ) -> Result<Organization> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::database(e, "Failed to begin transaction for organization update")
        })?;

        let current = sqlx::query_as::<_, OrganizationRow>(
            "SELECT id, name, slug, status, require_2fa, created_at FROM organizations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            Error::database(e, format!("Failed to fetch organization for update: {}", id))
        })?
        .ok_or_else(|| Error::not_found("Organization", id.to_string()))?;

        let current = Organization::try_from(current)?;
        let name = update.name.unwrap_or(current.name);
        let require_2fa = update.require_2fa.unwrap_or(current.require_2fa);
        let status = update.status.unwrap_or(current.status);

        let row = sqlx::query_as::<_, OrganizationRow>(
            "UPDATE organizations SET name = $2, require_2fa = $3, status = $4
             WHERE id = $1
             RETURNING id, name, slug, status, require_2fa, created_at",
        )
        .bind(id)
        .bind(&name)
        .bind(require_2fa)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::database(e, format!("Failed to update organization: {}", id)))?;

        tx.commit()
            .await
            .map_err(|e| Error::database(e, "Failed to commit organization update"))?;

        row.try_into()
    }
}

// Organization membership repository

#[derive(Debug, Clone)]
pub struct SqlxOrgMembershipRepository {
    pool: DbPool,
}

impl SqlxOrgMembershipRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrgMembershipRepository for SqlxOrgMembershipRepository {
    #[instrument(skip(self), fields(user_id = %user_id, org_id = %org_id, role = %role), name = "db_create_org_membership")]
    async fn create_membership(
        &self,
        user_id: &UserId,
        org_id: &OrgId,
        role: OrgRole,
    ) -> Result<OrganizationMembership> {
        let row = sqlx::query_as::<_, OrgMembershipRow>(
            "INSERT INTO organization_memberships (org_id, user_id, role, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING id, org_id, user_id, role, created_at",
        )
        .bind(org_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let err = Error::database(e, "Failed to create organization membership");
            if err.is_unique_violation() {
                Error::conflict(
                    format!("User {} is already a member of organization {}", user_id, org_id),
                    "OrganizationMembership",
                )
            } else {
                err
            }
        })?;

        row.try_into()
    }

    #[instrument(skip(self), fields(user_id = %user_id, org_id = %org_id), name = "db_get_org_membership")]
    async fn get_membership(
        &self,
        user_id: &UserId,
        org_id: &OrgId,
    ) -> Result<Option<OrganizationMembership>> {
        let row = sqlx::query_as::<_, OrgMembershipRow>(
            "SELECT id, org_id, user_id, role, created_at FROM organization_memberships
             WHERE user_id = $1 AND org_id = $2",
        )
        .bind(user_id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database(e, "Failed to fetch organization membership"))?;

        row.map(|r| r.try_into()).transpose()
    }

    #[instrument(skip(self), fields(user_id = %user_id), name = "db_list_user_org_memberships")]
    async fn list_user_memberships(&self, user_id: &UserId) -> Result<Vec<OrganizationMembership>> {
        let rows = sqlx::query_as::<_, OrgMembershipRow>(
            "SELECT id, org_id, user_id, role, created_at FROM organization_memberships
             WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::database(e, format!("Failed to list memberships for user {}", user_id))
        })?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    #[instrument(skip(self), fields(user_id = %user_id), name = "db_is_member_of_2fa_org")]
    async fn is_member_of_2fa_organization(&self, user_id: &UserId) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM organization_memberships m
             JOIN organizations o ON o.id = m.org_id
             WHERE m.user_id = $1 AND o.require_2fa = TRUE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::database(e, "Failed to check 2FA organization membership"))?;

        Ok(count > 0)
    }
}
