//! Cache keys and values.
//!
//! A key carries exactly the parameters needed to reproduce its fetch, so
//! the cache can revalidate any entry without outside help.

use crate::backend::Backend;
use crate::error::Result;
use crate::model::{Issue, ProjectMember, StateMap, WorkspaceMember};
use std::fmt;

/// The (workspace, project) pair most keys are scoped by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectScope {
    pub workspace: String,
    pub project: String,
}

impl ProjectScope {
    pub fn new(workspace: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            project: project.into(),
        }
    }

    #[must_use]
    pub fn issues(&self) -> CacheKey {
        CacheKey::ProjectIssues {
            workspace: self.workspace.clone(),
            project: self.project.clone(),
        }
    }

    #[must_use]
    pub fn issue(&self, issue: &str) -> CacheKey {
        CacheKey::IssueDetail {
            workspace: self.workspace.clone(),
            project: self.project.clone(),
            issue: issue.to_string(),
        }
    }

    #[must_use]
    pub fn sub_issues(&self, parent: &str) -> CacheKey {
        CacheKey::SubIssues {
            workspace: self.workspace.clone(),
            project: self.project.clone(),
            issue: parent.to_string(),
        }
    }

    #[must_use]
    pub fn states(&self) -> CacheKey {
        CacheKey::States {
            workspace: self.workspace.clone(),
            project: self.project.clone(),
        }
    }

    #[must_use]
    pub fn members(&self) -> CacheKey {
        CacheKey::ProjectMembers {
            workspace: self.workspace.clone(),
            project: self.project.clone(),
        }
    }

    #[must_use]
    pub fn member_me(&self) -> CacheKey {
        CacheKey::ProjectMemberMe {
            workspace: self.workspace.clone(),
            project: self.project.clone(),
        }
    }
}

/// Identifies one cached collection or record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    ProjectIssues { workspace: String, project: String },
    SubIssues { workspace: String, project: String, issue: String },
    IssueDetail { workspace: String, project: String, issue: String },
    States { workspace: String, project: String },
    ProjectMembers { workspace: String, project: String },
    ProjectMemberMe { workspace: String, project: String },
    WorkspaceMemberMe { workspace: String },
}

impl CacheKey {
    #[must_use]
    pub fn workspace_member_me(workspace: &str) -> Self {
        Self::WorkspaceMemberMe {
            workspace: workspace.to_string(),
        }
    }

    #[must_use]
    pub fn workspace(&self) -> &str {
        match self {
            Self::ProjectIssues { workspace, .. }
            | Self::SubIssues { workspace, .. }
            | Self::IssueDetail { workspace, .. }
            | Self::States { workspace, .. }
            | Self::ProjectMembers { workspace, .. }
            | Self::ProjectMemberMe { workspace, .. }
            | Self::WorkspaceMemberMe { workspace } => workspace,
        }
    }

    /// Run the fetch this key describes.
    ///
    /// # Errors
    ///
    /// Propagates the backend error unchanged.
    pub async fn fetch<B: Backend>(&self, backend: &B) -> Result<CacheValue> {
        Ok(match self {
            Self::ProjectIssues { workspace, project } => {
                CacheValue::Issues(backend.list_issues(workspace, project).await?)
            }
            Self::SubIssues { workspace, project, issue } => {
                CacheValue::Issues(backend.sub_issues(workspace, project, issue).await?)
            }
            Self::IssueDetail { workspace, project, issue } => {
                CacheValue::Issue(Box::new(backend.get_issue(workspace, project, issue).await?))
            }
            Self::States { workspace, project } => {
                CacheValue::States(backend.list_states(workspace, project).await?)
            }
            Self::ProjectMembers { workspace, project } => {
                CacheValue::Members(backend.list_project_members(workspace, project).await?)
            }
            Self::ProjectMemberMe { workspace, project } => {
                CacheValue::Member(backend.project_member_me(workspace, project).await?)
            }
            Self::WorkspaceMemberMe { workspace } => {
                CacheValue::WorkspaceMember(backend.workspace_member_me(workspace).await?)
            }
        })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProjectIssues { workspace, project } => write!(f, "issues:{workspace}/{project}"),
            Self::SubIssues { workspace, project, issue } => {
                write!(f, "sub-issues:{workspace}/{project}/{issue}")
            }
            Self::IssueDetail { workspace, project, issue } => {
                write!(f, "issue:{workspace}/{project}/{issue}")
            }
            Self::States { workspace, project } => write!(f, "states:{workspace}/{project}"),
            Self::ProjectMembers { workspace, project } => {
                write!(f, "members:{workspace}/{project}")
            }
            Self::ProjectMemberMe { workspace, project } => {
                write!(f, "members-me:{workspace}/{project}")
            }
            Self::WorkspaceMemberMe { workspace } => write!(f, "workspace-members-me:{workspace}"),
        }
    }
}

/// A cached collection or record.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Issues(Vec<Issue>),
    Issue(Box<Issue>),
    States(StateMap),
    Members(Vec<ProjectMember>),
    Member(ProjectMember),
    WorkspaceMember(WorkspaceMember),
}

impl CacheValue {
    #[must_use]
    pub fn as_issues(&self) -> Option<&[Issue]> {
        match self {
            Self::Issues(issues) => Some(issues.as_slice()),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_issues(self) -> Option<Vec<Issue>> {
        match self {
            Self::Issues(issues) => Some(issues),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_issue(self) -> Option<Issue> {
        match self {
            Self::Issue(issue) => Some(*issue),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_states(self) -> Option<StateMap> {
        match self {
            Self::States(states) => Some(states),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_members(self) -> Option<Vec<ProjectMember>> {
        match self {
            Self::Members(members) => Some(members),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_member(self) -> Option<ProjectMember> {
        match self {
            Self::Member(member) => Some(member),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_workspace_member(self) -> Option<WorkspaceMember> {
        match self {
            Self::WorkspaceMember(member) => Some(member),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_keys_are_distinct() {
        let scope = ProjectScope::new("acme", "p1");
        assert_ne!(scope.issue("a"), scope.sub_issues("a"));
        assert_eq!(scope.issues(), scope.issues());
        assert_eq!(scope.sub_issues("a").to_string(), "sub-issues:acme/p1/a");
        assert_eq!(CacheKey::workspace_member_me("acme").workspace(), "acme");
    }
}
