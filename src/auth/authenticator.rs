//! Second-factor authenticators and the organization 2FA policy.
//!
//! An authenticator is a stored enrollment record; verifying one-time codes or
//! hardware ceremonies happens elsewhere. A user satisfies an organization's
//! 2FA requirement when they have at least one non-backup authenticator.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::auth::hashing::hash_secret;
use crate::domain::{AuthenticatorId, UserId};
use crate::errors::{Error, Result};
use crate::storage::repositories::{AuthenticatorRepository, OrgMembershipRepository};

/// Number of recovery codes issued with the first interface.
pub const RECOVERY_CODE_COUNT: usize = 10;

const RECOVERY_CODE_BYTES: usize = 5;

/// Kind of second-factor interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticatorKind {
    /// Time-based one-time password app
    Totp,
    /// Security key
    U2f,
    /// Text message codes
    Sms,
    /// One-shot recovery codes
    Recovery,
}

impl AuthenticatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthenticatorKind::Totp => "totp",
            AuthenticatorKind::U2f => "u2f",
            AuthenticatorKind::Sms => "sms",
            AuthenticatorKind::Recovery => "recovery",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuthenticatorKind::Totp => "Authenticator App",
            AuthenticatorKind::U2f => "U2F (Universal 2nd Factor)",
            AuthenticatorKind::Sms => "Text Message",
            AuthenticatorKind::Recovery => "Recovery Codes",
        }
    }

    /// Backup interfaces do not satisfy a 2FA requirement on their own.
    pub fn is_backup(&self) -> bool {
        matches!(self, AuthenticatorKind::Recovery)
    }
}

impl Display for AuthenticatorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuthenticatorKind {
    type Err = AuthenticatorKindParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "totp" => Ok(AuthenticatorKind::Totp),
            "u2f" => Ok(AuthenticatorKind::U2f),
            "sms" => Ok(AuthenticatorKind::Sms),
            "recovery" => Ok(AuthenticatorKind::Recovery),
            other => Err(AuthenticatorKindParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid authenticator kind: {0}")]
pub struct AuthenticatorKindParseError(pub String);

/// An enrolled authenticator.
#[derive(Debug, Clone, PartialEq)]
pub struct Authenticator {
    pub id: AuthenticatorId,
    pub user_id: UserId,
    pub kind: AuthenticatorKind,
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Whether a set of authenticators satisfies a 2FA requirement.
pub fn satisfies_two_factor(authenticators: &[Authenticator]) -> bool {
    authenticators.iter().any(|a| !a.kind.is_backup())
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorResponse {
    pub id: AuthenticatorId,
    #[serde(rename = "type")]
    pub kind: AuthenticatorKind,
    pub name: String,
    pub is_backup: bool,
    pub date_created: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<Authenticator> for AuthenticatorResponse {
    fn from(a: Authenticator) -> Self {
        Self {
            id: a.id,
            kind: a.kind,
            name: a.kind.label().to_string(),
            is_backup: a.kind.is_backup(),
            date_created: a.created_at,
            last_used_at: a.last_used_at,
        }
    }
}

/// Result of an enrollment. Recovery codes are only ever returned here.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentResponse {
    pub authenticator: AuthenticatorResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_codes: Option<Vec<String>>,
}

/// Enrollment and removal rules for authenticators.
#[derive(Clone)]
pub struct AuthenticatorService {
    authenticators: Arc<dyn AuthenticatorRepository>,
    memberships: Arc<dyn OrgMembershipRepository>,
}

impl AuthenticatorService {
    pub fn new(
        authenticators: Arc<dyn AuthenticatorRepository>,
        memberships: Arc<dyn OrgMembershipRepository>,
    ) -> Self {
        Self { authenticators, memberships }
    }

    pub async fn list(&self, user_id: &UserId) -> Result<Vec<Authenticator>> {
        self.authenticators.list_for_user(user_id).await
    }

    /// Whether the user has an enrolled non-backup interface.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn has_two_factor(&self, user_id: &UserId) -> Result<bool> {
        let enrolled = self.authenticators.list_for_user(user_id).await?;
        Ok(satisfies_two_factor(&enrolled))
    }

    /// Enroll a new interface. The first non-backup interface also issues recovery codes.
    #[instrument(skip(self), fields(user_id = %user_id, kind = %kind))]
    pub async fn enroll(
        &self,
        user_id: &UserId,
        kind: AuthenticatorKind,
    ) -> Result<(Authenticator, Option<Vec<String>>)> {
        if kind.is_backup() {
            return Err(Error::validation(
                "Recovery codes are issued automatically with the first authenticator",
            ));
        }

        let enrolled = self.authenticators.list_for_user(user_id).await?;
        if enrolled.iter().any(|a| a.kind == kind) {
            return Err(Error::conflict(
                format!("Authenticator '{}' is already enrolled", kind),
                "Authenticator",
            ));
        }

        let has_recovery = enrolled.iter().any(|a| a.kind.is_backup());
        let recovery_codes = if has_recovery { None } else { Some(generate_recovery_codes()) };
        let recovery_config = recovery_codes
            .as_ref()
            .map(|codes| {
                codes
                    .iter()
                    .map(|code| hash_secret(code))
                    .collect::<Result<Vec<_>>>()
                    .map(|hashes| json!({ "codes": hashes }))
            })
            .transpose()?;

        let authenticator = self
            .authenticators
            .create_authenticator(
                user_id,
                kind,
                json!({ "enrolledAt": Utc::now() }),
                recovery_config,
            )
            .await?;

        info!(
            user_id = %user_id,
            authenticator_id = %authenticator.id,
            kind = %kind,
            recovery_issued = recovery_codes.is_some(),
            "authenticator enrolled"
        );

        Ok((authenticator, recovery_codes))
    }

    /// Remove one of the user's interfaces.
    ///
    /// Removing the last non-backup interface also drops the recovery codes,
    /// and is refused while the user belongs to an organization requiring 2FA.
    #[instrument(skip(self), fields(user_id = %user_id, authenticator_id = %id))]
    pub async fn remove(&self, user_id: &UserId, id: &AuthenticatorId) -> Result<()> {
        let enrolled = self.authenticators.list_for_user(user_id).await?;
        let target = enrolled
            .iter()
            .find(|a| a.id == *id)
            .ok_or_else(|| Error::not_found("Authenticator", id.to_string()))?;

        let remaining_primary =
            enrolled.iter().filter(|a| a.id != *id && !a.kind.is_backup()).count();
        let removes_last_primary = !target.kind.is_backup() && remaining_primary == 0;

        if removes_last_primary && self.memberships.is_member_of_2fa_organization(user_id).await? {
            warn!(user_id = %user_id, "refusing to remove the last authenticator of a 2FA member");
            return Err(Error::forbidden(
                "This authenticator cannot be removed while you belong to an organization \
                 that requires two-factor authentication",
            ));
        }

        self.authenticators.delete_authenticator(user_id, id, removes_last_primary).await?;

        info!(
            user_id = %user_id,
            authenticator_id = %id,
            kind = %target.kind,
            recovery_removed = removes_last_primary,
            "authenticator removed"
        );
        Ok(())
    }
}

fn generate_recovery_codes() -> Vec<String> {
    (0..RECOVERY_CODE_COUNT)
        .map(|_| {
            let mut bytes = [0u8; RECOVERY_CODE_BYTES];
            OsRng.fill_bytes(&mut bytes);
            URL_SAFE_NO_PAD.encode(bytes).to_lowercase()
        })
        .collect()
}
