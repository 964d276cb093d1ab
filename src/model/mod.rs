//! Data models for tsync.
//!
//! Typed records mirroring the tracker's JSON API:
//! - Issue (plus `IssueDraft` / `IssuePatch` write shapes)
//! - State and the fixed `StateGroup` taxonomy
//! - Project and workspace membership with numeric roles
//! - Project summary used for display identifiers

pub mod issue;
pub mod member;
pub mod project;
pub mod state;

pub use issue::{Issue, IssueDraft, IssuePatch, Priority};
pub use member::{MemberRole, ProjectMember, UserRef, WorkspaceMember};
pub use project::ProjectSummary;
pub use state::{State, StateDraft, StateGroup, StateMap};

/// Deserialize a present field into `Some`, even when its value is `null`.
///
/// Combined with `#[serde(default)]` this distinguishes an absent field
/// (`None`) from an explicit `null` (`Some(None)` or `Some(Priority::None)`).
pub(crate) fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
