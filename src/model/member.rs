//! Membership model for tsync.
//!
//! Roles are numeric on the wire (owner=20, member=15, viewer=10, guest=5)
//! and ordered: a higher role can do everything a lower one can.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Member role within a workspace or project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum MemberRole {
    Guest,
    Viewer,
    Member,
    Owner,
}

impl MemberRole {
    /// Wire value of this role.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Guest => 5,
            Self::Viewer => 10,
            Self::Member => 15,
            Self::Owner => 20,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Viewer => "viewer",
            Self::Member => "member",
            Self::Owner => "owner",
        }
    }

    /// Guests and viewers are read-only.
    #[must_use]
    pub const fn can_mutate(self) -> bool {
        matches!(self, Self::Member | Self::Owner)
    }

    /// Parse a role name or its numeric value.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for an unknown name and
    /// `Error::InvalidRole` for an unknown number.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let s = s.trim().to_lowercase();
        if let Ok(n) = s.parse::<i64>() {
            return Self::try_from(n);
        }
        match s.as_str() {
            "owner" | "admin" => Ok(Self::Owner),
            "member" => Ok(Self::Member),
            "viewer" => Ok(Self::Viewer),
            "guest" => Ok(Self::Guest),
            other => Err(Error::InvalidArgument(format!("unknown role '{other}'"))),
        }
    }
}

impl TryFrom<i64> for MemberRole {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            20 => Ok(Self::Owner),
            15 => Ok(Self::Member),
            10 => Ok(Self::Viewer),
            5 => Ok(Self::Guest),
            other => Err(Error::InvalidRole(other)),
        }
    }
}

impl From<MemberRole> for i64 {
    fn from(role: MemberRole) -> Self {
        role.as_i64()
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user side of a membership record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub display_name: String,
}

/// A project membership record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    /// Membership id (not the user id)
    pub id: String,

    pub member: UserRef,

    pub role: MemberRole,

    #[serde(default)]
    pub project: String,

    #[serde(default)]
    pub workspace: String,
}

/// A workspace membership record, as returned by `workspace-members/me/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceMember {
    pub id: String,

    pub member: UserRef,

    pub role: MemberRole,

    #[serde(default)]
    pub workspace: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        let json = serde_json::json!({
            "id": "m1",
            "member": { "id": "u1", "email": "a@b.c" },
            "role": 15
        });
        let member: ProjectMember = serde_json::from_value(json).unwrap();
        assert_eq!(member.role, MemberRole::Member);
        assert_eq!(serde_json::to_value(member.role).unwrap(), serde_json::json!(15));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let json = serde_json::json!({ "id": "m1", "member": { "id": "u1" }, "role": 7 });
        assert!(serde_json::from_value::<ProjectMember>(json).is_err());
    }

    #[test]
    fn test_role_ordering_and_parse() {
        assert!(MemberRole::Owner > MemberRole::Member);
        assert!(MemberRole::Viewer > MemberRole::Guest);
        assert!(!MemberRole::Viewer.can_mutate());
        assert_eq!(MemberRole::parse("10").unwrap(), MemberRole::Viewer);
        assert_eq!(MemberRole::parse("Owner").unwrap(), MemberRole::Owner);
        assert!(MemberRole::parse("root").is_err());
    }
}
