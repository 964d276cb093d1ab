//! Backend collaborators for the tracker REST API.
//!
//! The [`Backend`] trait is the seam between the sync core and the server:
//! - [`HttpBackend`] talks JSON over HTTP with reqwest
//! - [`MemoryBackend`] keeps records in-process (tests, offline demos) and
//!   can pause or fail writes on demand
//!
//! All operations are scoped by `(workspace, project[, issue])` path
//! segments, matching the API routes.

pub mod http;
pub mod memory;

pub use http::HttpBackend;
pub use memory::MemoryBackend;

use crate::error::Result;
use crate::model::{
    Issue, IssueDraft, IssuePatch, MemberRole, ProjectMember, State, StateDraft, StateMap,
    WorkspaceMember,
};
use std::future::Future;

/// Trait for tracker API backends.
///
/// Methods return `Send` futures so that cache revalidation can run on
/// spawned tokio tasks.
pub trait Backend: Send + Sync {
    /// List every issue in a project.
    fn list_issues(
        &self,
        workspace: &str,
        project: &str,
    ) -> impl Future<Output = Result<Vec<Issue>>> + Send;

    /// Fetch a single issue.
    fn get_issue(
        &self,
        workspace: &str,
        project: &str,
        issue: &str,
    ) -> impl Future<Output = Result<Issue>> + Send;

    /// Create an issue.
    fn create_issue(
        &self,
        workspace: &str,
        project: &str,
        draft: &IssueDraft,
    ) -> impl Future<Output = Result<Issue>> + Send;

    /// Apply a partial update and return the updated record.
    fn patch_issue(
        &self,
        workspace: &str,
        project: &str,
        issue: &str,
        patch: &IssuePatch,
    ) -> impl Future<Output = Result<Issue>> + Send;

    /// List the direct children of an issue.
    fn sub_issues(
        &self,
        workspace: &str,
        project: &str,
        issue: &str,
    ) -> impl Future<Output = Result<Vec<Issue>>> + Send;

    /// Attach existing issues as children of `parent`; returns the attached records.
    fn add_sub_issues(
        &self,
        workspace: &str,
        project: &str,
        parent: &str,
        sub_issue_ids: &[String],
    ) -> impl Future<Output = Result<Vec<Issue>>> + Send;

    /// List project states grouped by state group.
    fn list_states(
        &self,
        workspace: &str,
        project: &str,
    ) -> impl Future<Output = Result<StateMap>> + Send;

    /// Create a state.
    fn create_state(
        &self,
        workspace: &str,
        project: &str,
        draft: &StateDraft,
    ) -> impl Future<Output = Result<State>> + Send;

    /// Delete a state.
    fn delete_state(
        &self,
        workspace: &str,
        project: &str,
        state: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// List project members.
    fn list_project_members(
        &self,
        workspace: &str,
        project: &str,
    ) -> impl Future<Output = Result<Vec<ProjectMember>>> + Send;

    /// Change a member's role.
    fn update_project_member(
        &self,
        workspace: &str,
        project: &str,
        member: &str,
        role: MemberRole,
    ) -> impl Future<Output = Result<ProjectMember>> + Send;

    /// Remove a member from the project.
    fn remove_project_member(
        &self,
        workspace: &str,
        project: &str,
        member: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// The caller's own project membership.
    fn project_member_me(
        &self,
        workspace: &str,
        project: &str,
    ) -> impl Future<Output = Result<ProjectMember>> + Send;

    /// The caller's own workspace membership.
    fn workspace_member_me(
        &self,
        workspace: &str,
    ) -> impl Future<Output = Result<WorkspaceMember>> + Send;
}
