//! In-process backend.
//!
//! Holds issues, states and members for a single project behind a mutex
//! and answers the same calls as the HTTP API. Blocking relations are
//! mirrored onto the counterpart issues the way the server does.
//!
//! Fault injection for exercising optimistic paths:
//! - [`MemoryBackend::pause_writes`] parks every write until
//!   [`MemoryBackend::resume_writes`]
//! - [`MemoryBackend::fail_writes`] makes writes return an HTTP error
//! - [`MemoryBackend::fail_reads`] fails the next N reads

use crate::error::{Error, Result};
use crate::model::{
    Issue, IssueDraft, IssuePatch, MemberRole, ProjectMember, ProjectSummary, State, StateDraft,
    StateGroup, StateMap, WorkspaceMember,
};
use crate::relations::mirror_blocking_change;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

use super::Backend;

#[derive(Debug, Default)]
struct Store {
    issues: Vec<Issue>,
    states: Vec<State>,
    members: Vec<ProjectMember>,
    me: Option<ProjectMember>,
    workspace_me: Option<WorkspaceMember>,
}

#[derive(Debug, Default)]
struct Faults {
    write_status: Option<u16>,
    read_failures: usize,
    read_status: u16,
}

/// In-memory tracker backend for one workspace/project pair.
#[derive(Debug)]
pub struct MemoryBackend {
    workspace: String,
    project: ProjectSummary,
    store: Mutex<Store>,
    faults: Mutex<Faults>,
    paused: watch::Sender<bool>,
    parked: watch::Sender<usize>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryBackend {
    /// Create an empty backend for a project.
    pub fn new(workspace: impl Into<String>, project: ProjectSummary) -> Self {
        Self {
            workspace: workspace.into(),
            project,
            store: Mutex::new(Store::default()),
            faults: Mutex::new(Faults::default()),
            paused: watch::Sender::new(false),
            parked: watch::Sender::new(0),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    #[must_use]
    pub const fn project(&self) -> &ProjectSummary {
        &self.project
    }

    /// Seed issues (appended as-is).
    #[must_use]
    pub fn with_issues(self, issues: impl IntoIterator<Item = Issue>) -> Self {
        self.lock().issues.extend(issues);
        self
    }

    /// Seed states (appended as-is).
    #[must_use]
    pub fn with_states(self, states: impl IntoIterator<Item = State>) -> Self {
        self.lock().states.extend(states);
        self
    }

    /// Seed project members.
    #[must_use]
    pub fn with_members(self, members: impl IntoIterator<Item = ProjectMember>) -> Self {
        self.lock().members.extend(members);
        self
    }

    /// Set the caller's own project and workspace membership.
    #[must_use]
    pub fn with_me(self, me: ProjectMember) -> Self {
        {
            let mut store = self.lock();
            store.workspace_me = Some(WorkspaceMember {
                id: me.id.clone(),
                member: me.member.clone(),
                role: me.role,
                workspace: self.workspace.clone(),
            });
            store.me = Some(me);
        }
        self
    }

    /// Build an issue belonging to this backend's project (not stored).
    pub fn issue(&self, id: &str, name: &str, sequence_id: i64) -> Issue {
        Issue::new(id, name, self.workspace.as_str(), &self.project, sequence_id)
    }

    /// Snapshot of a stored issue.
    #[must_use]
    pub fn stored_issue(&self, id: &str) -> Option<Issue> {
        self.lock().issues.iter().find(|i| i.id == id).cloned()
    }

    /// Make every write fail with the given HTTP status (or succeed again with `None`).
    pub fn fail_writes(&self, status: Option<u16>) {
        self.faults().write_status = status;
    }

    /// Fail the next `count` reads with the given HTTP status.
    pub fn fail_reads(&self, count: usize, status: u16) {
        let mut faults = self.faults();
        faults.read_failures = count;
        faults.read_status = status;
    }

    /// Park writes until [`resume_writes`](Self::resume_writes) is called.
    pub fn pause_writes(&self) {
        self.paused.send_replace(true);
    }

    /// Release parked writes.
    pub fn resume_writes(&self) {
        self.paused.send_replace(false);
    }

    /// Wait until at least one write is parked behind [`pause_writes`](Self::pause_writes).
    pub async fn wait_for_parked_write(&self) {
        let mut rx = self.parked.subscribe();
        let _ = rx.wait_for(|n| *n > 0).await;
    }

    /// Number of read calls served (including failed ones).
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write calls served (including failed ones).
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check_scope(&self, workspace: &str, project: Option<&str>) -> Result<()> {
        let project_ok = project.is_none_or(|p| p == self.project.id);
        if workspace == self.workspace && project_ok {
            Ok(())
        } else {
            Err(Error::Http {
                status: 404,
                message: format!("no project {} in workspace {workspace}", project.unwrap_or("-")),
            })
        }
    }

    fn begin_read(&self, workspace: &str, project: Option<&str>) -> Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        {
            let mut faults = self.faults();
            if faults.read_failures > 0 {
                faults.read_failures -= 1;
                return Err(Error::Http {
                    status: faults.read_status,
                    message: "injected read failure".to_string(),
                });
            }
        }
        self.check_scope(workspace, project)
    }

    async fn begin_write(&self, workspace: &str, project: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut paused = self.paused.subscribe();
        let is_paused = *paused.borrow_and_update();
        if is_paused {
            self.parked.send_modify(|n| *n += 1);
            let _ = paused.wait_for(|p| !*p).await;
            self.parked.send_modify(|n| *n = n.saturating_sub(1));
        }

        let write_status = self.faults().write_status;
        if let Some(status) = write_status {
            return Err(Error::Http {
                status,
                message: "injected write failure".to_string(),
            });
        }
        self.check_scope(workspace, Some(project))
    }
}

impl Backend for MemoryBackend {
    async fn list_issues(&self, workspace: &str, project: &str) -> Result<Vec<Issue>> {
        self.begin_read(workspace, Some(project))?;
        Ok(self.lock().issues.clone())
    }

    async fn get_issue(&self, workspace: &str, project: &str, issue: &str) -> Result<Issue> {
        self.begin_read(workspace, Some(project))?;
        self.stored_issue(issue)
            .ok_or_else(|| Error::IssueNotFound { id: issue.to_string() })
    }

    async fn create_issue(
        &self,
        workspace: &str,
        project: &str,
        draft: &IssueDraft,
    ) -> Result<Issue> {
        self.begin_write(workspace, project).await?;
        let mut store = self.lock();

        if let Some(parent) = draft.parent() {
            if !store.issues.iter().any(|i| i.id == parent) {
                return Err(Error::IssueNotFound { id: parent.to_string() });
            }
        }

        let sequence_id = store.issues.iter().map(|i| i.sequence_id).max().unwrap_or(0) + 1;
        let mut issue = self.issue(&uuid::Uuid::new_v4().to_string(), draft.name(), sequence_id);
        issue.priority = draft.priority();
        issue.state = draft.state().map(str::to_string);
        issue.parent = draft.parent().map(str::to_string);
        store.issues.push(issue.clone());
        Ok(issue)
    }

    async fn patch_issue(
        &self,
        workspace: &str,
        project: &str,
        issue: &str,
        patch: &IssuePatch,
    ) -> Result<Issue> {
        self.begin_write(workspace, project).await?;
        let mut store = self.lock();

        let updated = {
            let record = store
                .issues
                .iter_mut()
                .find(|i| i.id == issue)
                .ok_or_else(|| Error::IssueNotFound { id: issue.to_string() })?;
            record.apply_patch(patch);
            record.clone()
        };

        if patch.touches_blocking() {
            mirror_blocking_change(&mut store.issues, &updated);
        }
        Ok(updated)
    }

    async fn sub_issues(&self, workspace: &str, project: &str, issue: &str) -> Result<Vec<Issue>> {
        self.begin_read(workspace, Some(project))?;
        let store = self.lock();
        Ok(store
            .issues
            .iter()
            .filter(|i| i.parent.as_deref() == Some(issue))
            .cloned()
            .collect())
    }

    async fn add_sub_issues(
        &self,
        workspace: &str,
        project: &str,
        parent: &str,
        sub_issue_ids: &[String],
    ) -> Result<Vec<Issue>> {
        self.begin_write(workspace, project).await?;
        let mut store = self.lock();

        if !store.issues.iter().any(|i| i.id == parent) {
            return Err(Error::IssueNotFound { id: parent.to_string() });
        }

        let mut attached = Vec::with_capacity(sub_issue_ids.len());
        for issue in store.issues.iter_mut().filter(|i| sub_issue_ids.contains(&i.id)) {
            issue.parent = Some(parent.to_string());
            attached.push(issue.clone());
        }
        Ok(attached)
    }

    async fn list_states(&self, workspace: &str, project: &str) -> Result<StateMap> {
        self.begin_read(workspace, Some(project))?;
        let store = self.lock();
        let mut map = StateMap::new();
        for state in &store.states {
            map.entry(state.group).or_default().push(state.clone());
        }
        Ok(map)
    }

    async fn create_state(
        &self,
        workspace: &str,
        project: &str,
        draft: &StateDraft,
    ) -> Result<State> {
        self.begin_write(workspace, project).await?;
        let mut store = self.lock();

        let sequence = store
            .states
            .iter()
            .filter(|s| s.group == draft.group)
            .map(|s| s.sequence)
            .fold(0.0_f64, f64::max)
            + crate::states::SEQUENCE_STEP;

        let state = State {
            id: uuid::Uuid::new_v4().to_string(),
            name: draft.name.clone(),
            color: draft.color.clone(),
            group: draft.group,
            project: self.project.id.clone(),
            sequence,
        };
        store.states.push(state.clone());
        Ok(state)
    }

    async fn delete_state(&self, workspace: &str, project: &str, state: &str) -> Result<()> {
        self.begin_write(workspace, project).await?;
        let mut store = self.lock();

        let before = store.states.len();
        store.states.retain(|s| s.id != state);
        if store.states.len() == before {
            return Err(Error::StateNotFound { id: state.to_string() });
        }
        Ok(())
    }

    async fn list_project_members(
        &self,
        workspace: &str,
        project: &str,
    ) -> Result<Vec<ProjectMember>> {
        self.begin_read(workspace, Some(project))?;
        Ok(self.lock().members.clone())
    }

    async fn update_project_member(
        &self,
        workspace: &str,
        project: &str,
        member: &str,
        role: MemberRole,
    ) -> Result<ProjectMember> {
        self.begin_write(workspace, project).await?;
        let mut store = self.lock();

        let record = store
            .members
            .iter_mut()
            .find(|m| m.id == member)
            .ok_or_else(|| Error::MemberNotFound { id: member.to_string() })?;
        record.role = role;
        Ok(record.clone())
    }

    async fn remove_project_member(
        &self,
        workspace: &str,
        project: &str,
        member: &str,
    ) -> Result<()> {
        self.begin_write(workspace, project).await?;
        let mut store = self.lock();

        let before = store.members.len();
        store.members.retain(|m| m.id != member);
        if store.members.len() == before {
            return Err(Error::MemberNotFound { id: member.to_string() });
        }
        Ok(())
    }

    async fn project_member_me(&self, workspace: &str, project: &str) -> Result<ProjectMember> {
        self.begin_read(workspace, Some(project))?;
        self.lock().me.clone().ok_or_else(|| Error::Http {
            status: 403,
            message: "not a project member".to_string(),
        })
    }

    async fn workspace_member_me(&self, workspace: &str) -> Result<WorkspaceMember> {
        self.begin_read(workspace, None)?;
        self.lock().workspace_me.clone().ok_or_else(|| Error::Http {
            status: 403,
            message: "not a workspace member".to_string(),
        })
    }
}

/// Convenience for seeding states in tests and demos.
#[must_use]
pub fn state(id: &str, name: &str, group: StateGroup, project: &str, sequence: f64) -> State {
    State {
        id: id.to_string(),
        name: name.to_string(),
        color: String::new(),
        group,
        project: project.to_string(),
        sequence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserRef;

    fn backend() -> MemoryBackend {
        let b = MemoryBackend::new("acme", ProjectSummary::new("p1", "Web", Some("WEB")));
        let issues = vec![b.issue("a", "Parent", 1), b.issue("b", "Child", 2)];
        b.with_issues(issues)
    }

    #[tokio::test]
    async fn test_add_sub_issues_sets_parent() {
        let b = backend();
        let attached = b.add_sub_issues("acme", "p1", "a", &["b".to_string()]).await.unwrap();
        assert_eq!(attached.len(), 1);
        assert_eq!(b.stored_issue("b").unwrap().parent.as_deref(), Some("a"));
        assert_eq!(b.sub_issues("acme", "p1", "a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_patch_mirrors_blocking() {
        let b = backend();
        let patch = IssuePatch {
            blocks_list: Some(vec!["b".to_string()]),
            ..IssuePatch::default()
        };
        b.patch_issue("acme", "p1", "a", &patch).await.unwrap();
        assert_eq!(b.stored_issue("b").unwrap().blockers_list, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_wrong_scope_is_404() {
        let b = backend();
        let err = b.list_issues("other", "p1").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let b = backend();
        b.fail_reads(1, 503);
        assert_eq!(b.list_issues("acme", "p1").await.unwrap_err().status(), Some(503));
        assert!(b.list_issues("acme", "p1").await.is_ok());

        b.fail_writes(Some(500));
        assert!(b.patch_issue("acme", "p1", "a", &IssuePatch::clear_parent()).await.is_err());
        assert_eq!(b.write_count(), 1);
    }

    #[tokio::test]
    async fn test_membership_me() {
        let b = backend();
        assert!(b.workspace_member_me("acme").await.unwrap_err().is_unauthorized());

        let b = b.with_me(ProjectMember {
            id: "m1".into(),
            member: UserRef {
                id: "u1".into(),
                email: "me@acme.io".into(),
                display_name: "me".into(),
            },
            role: MemberRole::Viewer,
            project: "p1".into(),
            workspace: "acme".into(),
        });
        assert_eq!(b.workspace_member_me("acme").await.unwrap().role, MemberRole::Viewer);
    }
}
