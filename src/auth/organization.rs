//! Organization domain models and types.
//!
//! Organizations are the tenancy boundary: users join them through memberships
//! carrying a role, and an organization may require every member to have a
//! second factor enrolled before its pages can be viewed.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::{OrgId, UserId};
use crate::errors::{Error, Result};

/// Maximum length of an organization slug.
pub const MAX_SLUG_LENGTH: usize = 50;

/// Base used when a name contains nothing that survives slugification.
pub const FALLBACK_SLUG: &str = "organization";

/// Allowed slug alphabet.
pub static SLUG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_\-]+$").unwrap());

/// Slugs that would shadow site routes.
pub const RESERVED_SLUGS: &[&str] = &[
    "account",
    "admin",
    "api",
    "auth",
    "healthz",
    "login",
    "logout",
    "new",
    "onboarding",
    "organizations",
    "register",
    "settings",
    "static",
];

/// Status of an organization in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrgStatus {
    /// Organization is visible and usable
    Active,
    /// Deletion has been requested but not started
    PendingDeletion,
    /// Deletion is running
    DeletionInProgress,
}

impl OrgStatus {
    pub const ALL: [OrgStatus; 3] =
        [OrgStatus::Active, OrgStatus::PendingDeletion, OrgStatus::DeletionInProgress];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrgStatus::Active => "active",
            OrgStatus::PendingDeletion => "pending_deletion",
            OrgStatus::DeletionInProgress => "deletion_in_progress",
        }
    }

    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            OrgStatus::Active => "active",
            OrgStatus::PendingDeletion => "pending deletion",
            OrgStatus::DeletionInProgress => "deletion in progress",
        }
    }

    /// Parse a value from a `status:` search token. `visible` is an alias for `active`.
    pub fn from_query_value(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "visible" => Some(OrgStatus::Active),
            other => other.parse().ok(),
        }
    }
}

impl Display for OrgStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrgStatus {
    type Err = OrgStatusParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(OrgStatus::Active),
            "pending_deletion" => Ok(OrgStatus::PendingDeletion),
            "deletion_in_progress" => Ok(OrgStatus::DeletionInProgress),
            other => Err(OrgStatusParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid organization status: {0}")]
pub struct OrgStatusParseError(pub String);

/// Role of a user within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrgRole {
    /// Standard member
    Member,
    /// Can manage teams and projects
    Admin,
    /// Can manage members and organization settings
    Manager,
    /// Full control, including deletion
    Owner,
}

impl OrgRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgRole::Member => "member",
            OrgRole::Admin => "admin",
            OrgRole::Manager => "manager",
            OrgRole::Owner => "owner",
        }
    }

    /// Whether this role may change organization settings such as the 2FA policy.
    pub fn can_change_settings(&self) -> bool {
        matches!(self, OrgRole::Owner | OrgRole::Manager)
    }
}

impl Display for OrgRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrgRole {
    type Err = OrgRoleParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "member" => Ok(OrgRole::Member),
            "admin" => Ok(OrgRole::Admin),
            "manager" => Ok(OrgRole::Manager),
            "owner" => Ok(OrgRole::Owner),
            other => Err(OrgRoleParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid organization role: {0}")]
pub struct OrgRoleParseError(pub String);

/// Represents an organization in the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    /// Unique, URL-safe identifier
    pub slug: String,
    pub status: OrgStatus,
    /// Members must have a second factor enrolled
    pub require_2fa: bool,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn is_active(&self) -> bool {
        matches!(self.status, OrgStatus::Active)
    }
}

/// A user's membership in an organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationMembership {
    pub id: i64,
    pub org_id: OrgId,
    pub user_id: UserId,
    pub role: OrgRole,
    pub created_at: DateTime<Utc>,
}

/// An owned organization together with the number of owners it has.
#[derive(Debug, Clone)]
pub struct OwnedOrganization {
    pub organization: Organization,
    pub owner_count: i64,
}

/// Request to create a new organization.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    /// Display name. Required.
    #[serde(default)]
    #[validate(length(min = 1, max = 64, message = "This field is required (1 to 64 characters)"))]
    pub name: String,
    /// Explicit slug. Derived from the name when omitted.
    #[validate(length(min = 1, max = 50, message = "Slug must be 1 to 50 characters"))]
    pub slug: Option<String>,
    /// Acceptance of the terms of service and privacy policy
    #[serde(default)]
    pub agree_terms: bool,
}

/// Request to update an existing organization.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationRequest {
    #[validate(length(min = 1, max = 64, message = "Name must be 1 to 64 characters"))]
    pub name: Option<String>,
    #[serde(rename = "require2FA")]
    pub require_2fa: Option<bool>,
}

/// Status of an organization as rendered on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrganizationStatusResponse {
    pub id: OrgStatus,
    pub name: String,
}

/// Response for organization data.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationResponse {
    pub id: OrgId,
    pub slug: String,
    pub name: String,
    pub status: OrganizationStatusResponse,
    pub date_created: DateTime<Utc>,
    #[serde(rename = "require2FA")]
    pub require_2fa: bool,
}

impl From<Organization> for OrganizationResponse {
    fn from(org: Organization) -> Self {
        Self {
            id: org.id,
            slug: org.slug,
            name: org.name,
            status: OrganizationStatusResponse {
                id: org.status,
                name: org.status.label().to_string(),
            },
            date_created: org.created_at,
            require_2fa: org.require_2fa,
        }
    }
}

/// Entry of the `owner=1` listing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OwnedOrganizationResponse {
    pub organization: OrganizationResponse,
    /// Exactly one membership on the organization has the owner role
    pub single_owner: bool,
}

impl From<OwnedOrganization> for OwnedOrganizationResponse {
    fn from(owned: OwnedOrganization) -> Self {
        Self { organization: owned.organization.into(), single_owner: owned.owner_count == 1 }
    }
}

/// Body of the organization home page.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationHomeResponse {
    #[serde(flatten)]
    pub organization: OrganizationResponse,
    /// The viewer's role, `null` for superusers without a membership
    pub role: Option<OrgRole>,
}

/// Derive a slug from a display name.
///
/// Lowercases, turns whitespace and hyphen runs into one `-`, drops every other
/// character outside `[a-z0-9_]` and caps the length. May return an empty string.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.trim().to_lowercase().chars() {
        if ch.is_whitespace() || ch == '-' {
            pending_dash = !slug.is_empty();
        } else if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_dash {
                slug.push('-');
                pending_dash = false;
            }
            slug.push(ch);
        }
    }

    let truncated: String = slug.chars().take(MAX_SLUG_LENGTH).collect();
    truncated.trim_end_matches('-').to_string()
}

/// Whether a slug collides with a site route.
pub fn is_reserved_slug(slug: &str) -> bool {
    RESERVED_SLUGS.contains(&slug)
}

/// Validate an explicitly supplied slug.
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > MAX_SLUG_LENGTH {
        return Err(Error::validation(format!(
            "slug: must be between 1 and {} characters",
            MAX_SLUG_LENGTH
        )));
    }
    if !SLUG_REGEX.is_match(slug) {
        return Err(Error::validation(
            "slug: may only contain lowercase letters, numbers, underscores and hyphens",
        ));
    }
    if is_reserved_slug(slug) {
        return Err(Error::validation(format!("slug: '{}' is reserved", slug)));
    }
    Ok(())
}

/// The `attempt`-th candidate for a derived slug: `base`, then `base-2`, `base-3`, ...
pub fn slug_candidate(base: &str, attempt: usize) -> String {
    if attempt <= 1 {
        return base.to_string();
    }

    let suffix = format!("-{attempt}");
    let allowed = MAX_SLUG_LENGTH.saturating_sub(suffix.len());
    let base_part: String = base.chars().take(allowed).collect();
    let base_part = base_part.trim_end_matches('-');
    let base_part = if base_part.is_empty() { FALLBACK_SLUG } else { base_part };
    format!("{base_part}{suffix}")
}
