use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::AuthorizationError;

/// Owner and/or tenant identifiers gating which records a caller may see.
///
/// At least one identifier is always present: every constructor and the
/// deserializer reject a scope with neither, so a value of this type is
/// proof that the invariant holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawScope", into = "RawScope")]
pub struct AuthScope {
    owner_id: Option<String>,
    tenant_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct RawScope {
    #[serde(default)]
    owner_id: Option<String>,
    #[serde(default)]
    tenant_id: Option<String>,
}

impl AuthScope {
    /// Build a scope from optional parts. Blank identifiers count as absent.
    pub fn new(
        owner_id: Option<impl Into<String>>,
        tenant_id: Option<impl Into<String>>,
    ) -> Result<Self, AuthorizationError> {
        let owner_id = owner_id.map(Into::into).and_then(non_blank);
        let tenant_id = tenant_id.map(Into::into).and_then(non_blank);
        if owner_id.is_none() && tenant_id.is_none() {
            return Err(AuthorizationError::MissingScope);
        }
        Ok(Self {
            owner_id,
            tenant_id,
        })
    }

    pub fn owner(owner_id: impl Into<String>) -> Result<Self, AuthorizationError> {
        Self::new(Some(owner_id.into()), None::<String>)
    }

    pub fn tenant(tenant_id: impl Into<String>) -> Result<Self, AuthorizationError> {
        Self::new(None::<String>, Some(tenant_id.into()))
    }

    pub fn both(
        owner_id: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Result<Self, AuthorizationError> {
        Self::new(Some(owner_id.into()), Some(tenant_id.into()))
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// True when both scopes share a non-null owner id or a non-null tenant id.
    /// A record is visible to a query scope exactly when the two overlap.
    pub fn overlaps(&self, other: &AuthScope) -> bool {
        let same_owner = matches!(
            (&self.owner_id, &other.owner_id),
            (Some(a), Some(b)) if a == b
        );
        let same_tenant = matches!(
            (&self.tenant_id, &other.tenant_id),
            (Some(a), Some(b)) if a == b
        );
        same_owner || same_tenant
    }
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl TryFrom<RawScope> for AuthScope {
    type Error = AuthorizationError;

    fn try_from(raw: RawScope) -> Result<Self, Self::Error> {
        AuthScope::new(raw.owner_id, raw.tenant_id)
    }
}

impl From<AuthScope> for RawScope {
    fn from(scope: AuthScope) -> Self {
        RawScope {
            owner_id: scope.owner_id,
            tenant_id: scope.tenant_id,
        }
    }
}

impl fmt::Display for AuthScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "owner={} tenant={}",
            self.owner_id.as_deref().unwrap_or("-"),
            self.tenant_id.as_deref().unwrap_or("-")
        )
    }
}
