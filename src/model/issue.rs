//! Issue model for tsync.
//!
//! Issues carry a nullable `parent` pointer (sub-issue relation) and two
//! id lists for blocking relations. `blocks_list` / `blockers_list` are
//! kept symmetric across issues by convention only; nothing here enforces
//! it and cycles are not prevented.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::project::ProjectSummary;

/// Issue priority.
///
/// `None` is sent to and received from the API as JSON `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
    #[default]
    None,
}

impl Priority {
    /// All priorities, most pressing first.
    pub const ALL: [Self; 5] = [Self::Urgent, Self::High, Self::Medium, Self::Low, Self::None];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "urgent" => Ok(Self::Urgent),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            "none" | "" => Ok(Self::None),
            other => Err(Error::InvalidPriority(other.to_string())),
        }
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_none(),
            other => serializer.serialize_str(other.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(Self::None),
            Some(raw) => raw.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Treat `""` the same as `null` for id fields the API sometimes blanks.
fn empty_as_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}

/// An issue as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,

    pub name: String,

    /// Workspace id
    pub workspace: String,

    /// Project id
    pub project: String,

    pub project_detail: ProjectSummary,

    /// Per-project display ordinal
    pub sequence_id: i64,

    #[serde(default)]
    pub priority: Priority,

    /// State id
    #[serde(default, deserialize_with = "empty_as_none")]
    pub state: Option<String>,

    /// Parent issue id (sub-issue relation)
    #[serde(default, deserialize_with = "empty_as_none")]
    pub parent: Option<String>,

    /// Issues this issue blocks
    #[serde(default)]
    pub blocks_list: Vec<String>,

    /// Issues blocking this issue
    #[serde(default)]
    pub blockers_list: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl Issue {
    /// Build an issue record directly (used by in-process backends and tests).
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        workspace: impl Into<String>,
        project: &ProjectSummary,
        sequence_id: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            workspace: workspace.into(),
            project: project.id.clone(),
            project_detail: project.clone(),
            sequence_id,
            priority: Priority::None,
            state: None,
            parent: None,
            blocks_list: Vec::new(),
            blockers_list: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Display identifier, `{project_identifier}-{sequence_id}`.
    #[must_use]
    pub fn display_id(&self) -> String {
        self.project_detail.display_id(self.sequence_id)
    }

    /// Whether this issue has no parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Merge a partial update into this record.
    pub fn apply_patch(&mut self, patch: &IssuePatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(state) = &patch.state {
            self.state = Some(state.clone());
        }
        if let Some(parent) = &patch.parent {
            self.parent.clone_from(parent);
        }
        if let Some(blocks) = &patch.blocks_list {
            self.blocks_list = dedup(blocks);
        }
        if let Some(blockers) = &patch.blockers_list {
            self.blockers_list = dedup(blockers);
        }
    }
}

/// Remove duplicates while keeping first-seen order.
fn dedup(ids: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    out
}

/// Partial update for an issue (`PATCH issues/{id}/`).
///
/// Every field is optional; absent fields are left untouched by the server.
/// `parent` is tri-state: `None` leaves it, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssuePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "super::present")]
    pub priority: Option<Priority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "super::present")]
    pub parent: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks_list: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockers_list: Option<Vec<String>>,
}

impl IssuePatch {
    /// A patch that detaches an issue from its parent.
    #[must_use]
    pub fn clear_parent() -> Self {
        Self {
            parent: Some(None),
            ..Self::default()
        }
    }

    /// True when no field would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// True when the patch touches either blocking list.
    #[must_use]
    pub const fn touches_blocking(&self) -> bool {
        self.blocks_list.is_some() || self.blockers_list.is_some()
    }
}

/// A new issue (`POST issues/`), built through a validated constructor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueDraft {
    name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    priority: Priority,

    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<String>,
}

impl IssueDraft {
    /// Start a draft. The name is trimmed and must not be empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::RequiredField` if the trimmed name is empty.
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::RequiredField("name"));
        }
        Ok(Self {
            name: name.to_string(),
            description: None,
            priority: Priority::None,
            state: None,
            parent: None,
        })
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Pre-populate the parent, as when creating from a sub-issue list.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into()).filter(|p: &String| !p.is_empty());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> ProjectSummary {
        ProjectSummary::new("p1", "Web", Some("WEB"))
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("urgent".parse::<Priority>().unwrap(), Priority::Urgent);
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("none".parse::<Priority>().unwrap(), Priority::None);
        assert!("critical".parse::<Priority>().is_err());
    }

    #[test]
    fn test_issue_deserialize_loose_fields() {
        let json = serde_json::json!({
            "id": "i1",
            "name": "Bug in login",
            "workspace": "w1",
            "project": "p1",
            "project_detail": { "id": "p1", "identifier": "WEB", "name": "Web" },
            "sequence_id": 7,
            "priority": null,
            "state": "s1",
            "parent": "",
            "created_at": "2024-01-01T00:00:00Z"
        });
        let issue: Issue = serde_json::from_value(json).unwrap();
        assert_eq!(issue.priority, Priority::None);
        assert_eq!(issue.parent, None);
        assert!(issue.blocks_list.is_empty());
        assert_eq!(issue.display_id(), "WEB-7");
    }

    #[test]
    fn test_patch_serialization_tristate() {
        let clear = IssuePatch::clear_parent();
        assert_eq!(serde_json::to_value(&clear).unwrap(), serde_json::json!({ "parent": null }));

        let untouched = IssuePatch {
            name: Some("renamed".into()),
            ..IssuePatch::default()
        };
        assert_eq!(
            serde_json::to_value(&untouched).unwrap(),
            serde_json::json!({ "name": "renamed" })
        );

        let roundtrip: IssuePatch =
            serde_json::from_value(serde_json::json!({ "parent": null })).unwrap();
        assert_eq!(roundtrip.parent, Some(None));
        let absent: IssuePatch = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(absent.parent, None);
        assert!(absent.is_empty());
    }

    #[test]
    fn test_apply_patch() {
        let mut issue = Issue::new("i1", "Old", "w1", &project(), 1);
        issue.parent = Some("p".into());

        issue.apply_patch(&IssuePatch {
            name: Some("New".into()),
            priority: Some(Priority::High),
            blocks_list: Some(vec!["a".into(), "a".into(), "b".into()]),
            ..IssuePatch::default()
        });
        assert_eq!(issue.name, "New");
        assert_eq!(issue.priority, Priority::High);
        assert_eq!(issue.blocks_list, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(issue.parent.as_deref(), Some("p"));

        issue.apply_patch(&IssuePatch::clear_parent());
        assert!(issue.is_root());
    }

    #[test]
    fn test_draft_validation() {
        assert!(matches!(IssueDraft::new("   "), Err(Error::RequiredField("name"))));

        let draft = IssueDraft::new("  Fix it ")
            .unwrap()
            .with_parent("p1")
            .with_priority(Priority::Low);
        assert_eq!(draft.name(), "Fix it");
        assert_eq!(draft.parent(), Some("p1"));
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["priority"], "low");
        assert_eq!(json["parent"], "p1");
        assert!(json.get("state").is_none());
    }
}
