use serde::{Deserialize, Serialize};

/// Platform-wide role granting cross-org privilege.
///
/// Orthogonal to org roles: a user may hold one of these regardless of any
/// membership. RootAdmin is strictly broader than Admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "platform_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlatformRole {
    Admin,
    RootAdmin,
}

impl std::fmt::Display for PlatformRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformRole::Admin => write!(f, "admin"),
            PlatformRole::RootAdmin => write!(f, "root_admin"),
        }
    }
}

/// Per-org role carried by a membership.
///
/// Totally ordered for access decisions: Owner > Admin > Editor > Viewer.
/// The variant order below ascends so the derived `Ord` matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "org_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrgRole {
    Viewer,
    Editor,
    Admin,
    Owner,
}

impl OrgRole {
    /// Whether this role satisfies a gate requiring `required`.
    pub fn dominates(&self, required: OrgRole) -> bool {
        *self >= required
    }
}

impl std::fmt::Display for OrgRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrgRole::Viewer => write!(f, "viewer"),
            OrgRole::Editor => write!(f, "editor"),
            OrgRole::Admin => write!(f, "admin"),
            OrgRole::Owner => write!(f, "owner"),
        }
    }
}

impl std::str::FromStr for OrgRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(OrgRole::Viewer),
            "editor" => Ok(OrgRole::Editor),
            "admin" => Ok(OrgRole::Admin),
            "owner" => Ok(OrgRole::Owner),
            other => Err(format!("unknown org role: {other}")),
        }
    }
}
