//! Optimistic mutator.
//!
//! Every write follows the same shape:
//! 1. build a [`Transaction`] naming each cache key the change touches
//! 2. apply it to the cache (visible immediately, no revalidation)
//! 3. send the request
//! 4. on success merge the server record into list entries and revalidate
//!    single-record entries
//! 5. on failure log and return the error; the optimistic values stay in
//!    place unless the mutator was built with [`FailurePolicy::Rollback`]
//!
//! Guests and viewers are refused before anything is applied. The pending
//! counter covers a whole operation, reconciliation included.

mod transaction;

pub use transaction::{Applied, Transaction};

use crate::auth::RoleFlags;
use crate::backend::Backend;
use crate::cache::{CacheKey, CacheValue, ProjectScope, RemoteCache};
use crate::error::{Error, Result};
use crate::model::{Issue, IssueDraft, IssuePatch, MemberRole, ProjectMember, State, StateDraft};
use crate::relations::mirror_blocking_change;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// What happens to optimistic cache values when the write fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Leave the optimistic values until the next revalidation.
    #[default]
    KeepOptimistic,
    /// Restore every key the transaction touched.
    Rollback,
}

impl FailurePolicy {
    #[must_use]
    pub const fn from_rollback_flag(rollback: bool) -> Self {
        if rollback { Self::Rollback } else { Self::KeepOptimistic }
    }
}

/// Which blocking list of an issue an edit targets.
#[derive(Debug, Clone, Copy)]
enum BlockSide {
    /// Issues blocking this one
    Blockers,
    /// Issues this one blocks
    Blocks,
}

/// Counts one in-flight write for as long as it lives.
struct PendingGuard<'a>(&'a watch::Sender<usize>);

impl<'a> PendingGuard<'a> {
    fn new(pending: &'a watch::Sender<usize>) -> Self {
        pending.send_modify(|n| *n += 1);
        Self(pending)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Optimistic writer for one project.
pub struct Mutator<B> {
    cache: RemoteCache<B>,
    scope: ProjectScope,
    role: RoleFlags,
    policy: FailurePolicy,
    pending: Arc<watch::Sender<usize>>,
}

impl<B> Clone for Mutator<B> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            scope: self.scope.clone(),
            role: self.role,
            policy: self.policy,
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<B: Backend + 'static> Mutator<B> {
    pub fn new(
        cache: RemoteCache<B>,
        scope: ProjectScope,
        role: RoleFlags,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            cache,
            scope,
            role,
            policy,
            pending: Arc::new(watch::Sender::new(0)),
        }
    }

    /// Build a mutator whose role comes from the caller's project membership.
    ///
    /// # Errors
    ///
    /// Returns the membership fetch error (401/403 when not a member).
    pub async fn for_current_member(
        cache: RemoteCache<B>,
        scope: ProjectScope,
        policy: FailurePolicy,
    ) -> Result<Self> {
        let me = cache
            .get_or_fetch(&scope.member_me())
            .await?
            .into_member()
            .ok_or_else(|| {
                Error::Other(format!("unexpected value cached for {}", scope.member_me()))
            })?;
        debug!(member = %me.id, role = me.role.as_str(), "resolved project role");
        Ok(Self::new(cache, scope, RoleFlags::from_role(me.role), policy))
    }

    #[must_use]
    pub const fn cache(&self) -> &RemoteCache<B> {
        &self.cache
    }

    #[must_use]
    pub const fn scope(&self) -> &ProjectScope {
        &self.scope
    }

    #[must_use]
    pub const fn role(&self) -> RoleFlags {
        self.role
    }

    /// Number of writes currently in flight; changes on every start and finish.
    #[must_use]
    pub fn pending(&self) -> watch::Receiver<usize> {
        self.pending.subscribe()
    }

    /// Wait until no write is in flight.
    pub async fn settled(&self) {
        let mut rx = self.pending.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    fn track(&self) -> PendingGuard<'_> {
        PendingGuard::new(&self.pending)
    }

    // ---- sub-issues ----

    /// Attach existing issues under `parent`.
    ///
    /// The parent's sub-issue list shows the attached issues (newest first)
    /// and their `parent` is set in the project list before the request is
    /// sent. Issues missing from the cached project list only appear once
    /// the server confirms.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty id list, `PermissionDenied` for
    /// read-only roles, otherwise the backend error.
    pub async fn attach_sub_issues(
        &self,
        parent: &str,
        sub_issue_ids: &[String],
    ) -> Result<Vec<Issue>> {
        if sub_issue_ids.is_empty() {
            return Err(Error::InvalidArgument("no sub-issues to attach".to_string()));
        }
        if sub_issue_ids.iter().any(|id| id == parent) {
            return Err(Error::InvalidArgument(format!(
                "issue {parent} cannot be its own sub-issue"
            )));
        }
        let _pending = self.track();

        let scope = &self.scope;
        let parent_id = parent.to_string();
        let attached: Vec<Issue> = self
            .cached_issues()
            .into_iter()
            .filter(|i| sub_issue_ids.contains(&i.id))
            .map(|mut i| {
                i.parent = Some(parent_id.clone());
                i
            })
            .collect();
        let moved = sub_issue_ids.to_vec();

        let tx = Transaction::new("attach sub-issues")
            .write(scope.sub_issues(parent), move |prev| Some(merge_sub_issues(prev, attached)))
            .edit_issues(scope.issues(), move |issues| {
                for issue in issues.iter_mut().filter(|i| moved.contains(&i.id)) {
                    issue.parent = Some(parent_id.clone());
                }
            });

        let request = self
            .cache
            .backend()
            .add_sub_issues(&scope.workspace, &scope.project, parent, sub_issue_ids);
        let confirmed = self.run(tx, request).await?;

        let merged = confirmed.clone();
        self.cache
            .set(scope.sub_issues(parent), move |prev| Some(merge_sub_issues(prev, merged)), false);
        self.reconcile_cached(&scope.issues()).await;

        info!(parent, count = confirmed.len(), "attached sub-issues");
        Ok(confirmed)
    }

    /// Detach `child` from `parent`.
    ///
    /// The child leaves the parent's sub-issue list immediately.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for read-only roles, otherwise the backend error.
    pub async fn detach_sub_issue(&self, parent: &str, child: &str) -> Result<Issue> {
        let _pending = self.track();
        let scope = &self.scope;
        let removed = child.to_string();
        let orphaned = child.to_string();

        let tx = Transaction::new("detach sub-issue")
            .edit_issues(scope.sub_issues(parent), move |issues| issues.retain(|i| i.id != removed))
            .edit_issues(scope.issues(), move |issues| {
                if let Some(issue) = issues.iter_mut().find(|i| i.id == orphaned) {
                    issue.parent = None;
                }
            });

        let patch = IssuePatch::clear_parent();
        let request = self
            .cache
            .backend()
            .patch_issue(&scope.workspace, &scope.project, child, &patch);
        let updated = self.run(tx, request).await?;

        self.merge_into_list(scope.issues(), updated.clone());
        self.reconcile(&scope.sub_issues(parent)).await;
        self.reconcile_cached(&scope.issue(child)).await;

        info!(parent, child, "detached sub-issue");
        Ok(updated)
    }

    // ---- issue fields ----

    /// Apply a partial update to an issue.
    ///
    /// Both the issue's detail entry and its project-list entry change
    /// right away; blocking list edits are mirrored onto the counterpart
    /// issues in the project list.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty patch, `PermissionDenied` for
    /// read-only roles, otherwise the backend error.
    pub async fn update_issue(&self, id: &str, patch: IssuePatch) -> Result<Issue> {
        let _pending = self.track();
        self.patch_issue(id, patch).await
    }

    async fn patch_issue(&self, id: &str, patch: IssuePatch) -> Result<Issue> {
        if patch.is_empty() {
            return Err(Error::InvalidArgument("nothing to update".to_string()));
        }
        self.authorize("update issue")?;

        let scope = &self.scope;
        let mut focal = self.current_issue(id).await?;
        let previous_parent = focal.parent.clone();
        focal.apply_patch(&patch);

        let detail_patch = patch.clone();
        let list_patch = patch.clone();
        let mirror = patch.touches_blocking();

        let tx = Transaction::new("update issue")
            .edit_issue(scope.issue(id), move |issue| issue.apply_patch(&detail_patch))
            .edit_issues(scope.issues(), move |issues| {
                if let Some(issue) = issues.iter_mut().find(|i| i.id == focal.id) {
                    issue.apply_patch(&list_patch);
                }
                if mirror {
                    mirror_blocking_change(issues, &focal);
                }
            });

        let request = self
            .cache
            .backend()
            .patch_issue(&scope.workspace, &scope.project, id, &patch);
        let updated = self.run(tx, request).await?;

        self.merge_into_list(scope.issues(), updated.clone());
        self.reconcile(&scope.issue(id)).await;
        if patch.parent.is_some() {
            for parent in [previous_parent, updated.parent.clone()].into_iter().flatten() {
                self.reconcile_cached(&scope.sub_issues(&parent)).await;
            }
        }

        debug!(issue = id, "issue updated");
        Ok(updated)
    }

    /// Add issues to `issue`'s blockers.
    ///
    /// # Errors
    ///
    /// See [`update_issue`](Self::update_issue).
    pub async fn add_blockers(&self, issue: &str, blockers: &[String]) -> Result<Issue> {
        self.edit_blocking(issue, BlockSide::Blockers, |list| list.extend_from_slice(blockers))
            .await
    }

    /// Remove one issue from `issue`'s blockers.
    ///
    /// # Errors
    ///
    /// See [`update_issue`](Self::update_issue).
    pub async fn remove_blocker(&self, issue: &str, blocker: &str) -> Result<Issue> {
        self.edit_blocking(issue, BlockSide::Blockers, |list| list.retain(|id| id != blocker))
            .await
    }

    /// Add issues that `issue` blocks.
    ///
    /// # Errors
    ///
    /// See [`update_issue`](Self::update_issue).
    pub async fn add_blocked(&self, issue: &str, blocked: &[String]) -> Result<Issue> {
        self.edit_blocking(issue, BlockSide::Blocks, |list| list.extend_from_slice(blocked))
            .await
    }

    /// Remove one issue from those `issue` blocks.
    ///
    /// # Errors
    ///
    /// See [`update_issue`](Self::update_issue).
    pub async fn remove_blocked(&self, issue: &str, blocked: &str) -> Result<Issue> {
        self.edit_blocking(issue, BlockSide::Blocks, |list| list.retain(|id| id != blocked))
            .await
    }

    async fn edit_blocking<F>(&self, issue: &str, side: BlockSide, edit: F) -> Result<Issue>
    where
        F: FnOnce(&mut Vec<String>),
    {
        let _pending = self.track();
        self.authorize("update blocking")?;
        let current = self.current_issue(issue).await?;

        let mut list = match side {
            BlockSide::Blockers => current.blockers_list,
            BlockSide::Blocks => current.blocks_list,
        };
        edit(&mut list);
        if list.iter().any(|id| id == issue) {
            return Err(Error::InvalidArgument(format!("issue {issue} cannot block itself")));
        }

        let patch = match side {
            BlockSide::Blockers => IssuePatch {
                blockers_list: Some(list),
                ..IssuePatch::default()
            },
            BlockSide::Blocks => IssuePatch {
                blocks_list: Some(list),
                ..IssuePatch::default()
            },
        };
        self.patch_issue(issue, patch).await
    }

    /// Create an issue.
    ///
    /// Nothing is shown before the server assigns an id; on success the
    /// record is appended to the project list and, for a sub-issue, to
    /// its parent's list (entries that are not cached are left alone).
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for read-only roles, otherwise the backend error.
    pub async fn create_issue(&self, draft: &IssueDraft) -> Result<Issue> {
        let _pending = self.track();
        let scope = &self.scope;
        let request = self
            .cache
            .backend()
            .create_issue(&scope.workspace, &scope.project, draft);
        let created = self.run(Transaction::new("create issue"), request).await?;

        self.merge_into_list(scope.issues(), created.clone());
        if let Some(parent) = &created.parent {
            let record = created.clone();
            self.cache.set(
                scope.sub_issues(parent),
                move |prev| prev.map(|prev| merge_sub_issues(Some(prev), vec![record])),
                false,
            );
        }

        info!(issue = %created.id, display_id = %created.display_id(), "issue created");
        Ok(created)
    }

    // ---- states ----

    /// Create a workflow state and add it to the cached group map.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for read-only roles, otherwise the backend error.
    pub async fn create_state(&self, draft: &StateDraft) -> Result<State> {
        let _pending = self.track();
        let scope = &self.scope;
        let request = self
            .cache
            .backend()
            .create_state(&scope.workspace, &scope.project, draft);
        let state = self.run(Transaction::new("create state"), request).await?;

        let stored = state.clone();
        self.cache.set(
            scope.states(),
            move |prev| {
                prev.and_then(CacheValue::into_states).map(|mut map| {
                    map.entry(stored.group).or_default().push(stored);
                    CacheValue::States(map)
                })
            },
            false,
        );
        Ok(state)
    }

    /// Delete a workflow state; it leaves the cached group map immediately.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for read-only roles, otherwise the backend error.
    pub async fn delete_state(&self, id: &str) -> Result<()> {
        let _pending = self.track();
        let scope = &self.scope;
        let target = id.to_string();
        let tx = Transaction::new("delete state").write(scope.states(), move |prev| {
            prev.and_then(CacheValue::into_states).map(|mut map| {
                for states in map.values_mut() {
                    states.retain(|s| s.id != target);
                }
                CacheValue::States(map)
            })
        });

        let request = self
            .cache
            .backend()
            .delete_state(&scope.workspace, &scope.project, id);
        self.run(tx, request).await
    }

    // ---- members ----

    /// Change a project member's role.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for read-only roles, otherwise the backend error.
    pub async fn update_member_role(
        &self,
        member: &str,
        role: MemberRole,
    ) -> Result<ProjectMember> {
        let _pending = self.track();
        let scope = &self.scope;
        let target = member.to_string();
        let tx = Transaction::new("update member role").write(scope.members(), move |prev| {
            prev.and_then(CacheValue::into_members).map(|mut members| {
                if let Some(m) = members.iter_mut().find(|m| m.id == target) {
                    m.role = role;
                }
                CacheValue::Members(members)
            })
        });

        let request = self
            .cache
            .backend()
            .update_project_member(&scope.workspace, &scope.project, member, role);
        let updated = self.run(tx, request).await?;

        let record = updated.clone();
        self.cache.set(
            scope.members(),
            move |prev| {
                prev.and_then(CacheValue::into_members).map(|mut members| {
                    if let Some(m) = members.iter_mut().find(|m| m.id == record.id) {
                        *m = record;
                    }
                    CacheValue::Members(members)
                })
            },
            false,
        );
        Ok(updated)
    }

    /// Remove a member from the project; they leave the cached list immediately.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for read-only roles, otherwise the backend error.
    pub async fn remove_member(&self, member: &str) -> Result<()> {
        let _pending = self.track();
        let scope = &self.scope;
        let target = member.to_string();
        let tx = Transaction::new("remove member").write(scope.members(), move |prev| {
            prev.and_then(CacheValue::into_members).map(|mut members| {
                members.retain(|m| m.id != target);
                CacheValue::Members(members)
            })
        });

        let request = self
            .cache
            .backend()
            .remove_project_member(&scope.workspace, &scope.project, member);
        self.run(tx, request).await
    }

    // ---- plumbing ----

    fn authorize(&self, operation: &str) -> Result<()> {
        if self.role.can_mutate() {
            Ok(())
        } else {
            Err(Error::PermissionDenied(format!("{operation} requires member or owner role")))
        }
    }

    /// Apply `tx`, await `request`, and settle the transaction.
    async fn run<T, Fut>(&self, tx: Transaction, request: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let label = tx.label();
        self.authorize(label)?;

        let applied = tx.apply(&self.cache);

        match request.await {
            Ok(value) => Ok(value),
            Err(e) => {
                error!(operation = label, error = %e, "write failed");
                if self.policy == FailurePolicy::Rollback {
                    applied.rollback(&self.cache);
                    info!(operation = label, "optimistic changes rolled back");
                }
                Err(e)
            }
        }
    }

    /// Current record for an issue: cached detail, then the cached
    /// project list, then a fetch.
    async fn current_issue(&self, id: &str) -> Result<Issue> {
        let key = self.scope.issue(id);
        if let Some(issue) = self.cache.get(&key).and_then(CacheValue::into_issue) {
            return Ok(issue);
        }
        if let Some(issue) = self.cached_issues().into_iter().find(|i| i.id == id) {
            return Ok(issue);
        }
        self.cache
            .get_or_fetch(&key)
            .await?
            .into_issue()
            .ok_or_else(|| Error::IssueNotFound { id: id.to_string() })
    }

    fn cached_issues(&self) -> Vec<Issue> {
        self.cache
            .get(&self.scope.issues())
            .and_then(CacheValue::into_issues)
            .unwrap_or_default()
    }

    /// Replace (or append) a record in a cached issue list.
    fn merge_into_list(&self, key: CacheKey, record: Issue) {
        self.cache.set(
            key,
            move |prev| {
                prev.and_then(CacheValue::into_issues).map(|mut issues| {
                    upsert(&mut issues, record);
                    CacheValue::Issues(issues)
                })
            },
            false,
        );
    }

    async fn reconcile(&self, key: &CacheKey) {
        if self.cache.revalidate(key).await.is_err() {
            debug!(key = %key, "keeping optimistic value after failed revalidation");
        }
    }

    async fn reconcile_cached(&self, key: &CacheKey) {
        if let Some(Err(_)) = self.cache.revalidate_cached(key).await {
            debug!(key = %key, "keeping optimistic value after failed revalidation");
        }
    }
}

fn upsert(issues: &mut Vec<Issue>, record: Issue) {
    match issues.iter_mut().find(|i| i.id == record.id) {
        Some(existing) => *existing = record,
        None => issues.push(record),
    }
}

/// Merge records into a sub-issue list, newest first.
fn merge_sub_issues(prev: Option<CacheValue>, records: Vec<Issue>) -> CacheValue {
    let mut issues = prev.and_then(CacheValue::into_issues).unwrap_or_default();
    for record in records {
        upsert(&mut issues, record);
    }
    issues.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    CacheValue::Issues(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::backend::memory::state;
    use crate::cache::RetryPolicy;
    use crate::model::{ProjectSummary, StateGroup, UserRef};
    use chrono::{Duration, TimeZone, Utc};

    fn backend() -> MemoryBackend {
        let b = MemoryBackend::new("acme", ProjectSummary::new("p1", "Web", Some("WEB")));
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut issues = vec![
            b.issue("a", "Parent", 1),
            b.issue("b", "Older child", 2),
            b.issue("c", "Newer child", 3),
            b.issue("d", "Unrelated", 4),
        ];
        for (n, issue) in issues.iter_mut().enumerate() {
            issue.created_at = base + Duration::days(i64::try_from(n).unwrap());
        }
        b.with_issues(issues)
    }

    fn mutator_with(
        backend: MemoryBackend,
        role: MemberRole,
        policy: FailurePolicy,
    ) -> Mutator<MemoryBackend> {
        let cache = RemoteCache::new(backend, RetryPolicy::none());
        Mutator::new(cache, ProjectScope::new("acme", "p1"), RoleFlags::from_role(role), policy)
    }

    fn mutator() -> Mutator<MemoryBackend> {
        mutator_with(backend(), MemberRole::Member, FailurePolicy::KeepOptimistic)
    }

    fn ids(value: Option<CacheValue>) -> Vec<String> {
        value
            .and_then(CacheValue::into_issues)
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect()
    }

    fn member(id: &str, role: MemberRole) -> ProjectMember {
        ProjectMember {
            id: id.into(),
            member: UserRef {
                id: format!("u-{id}"),
                email: String::new(),
                display_name: id.into(),
            },
            role,
            project: "p1".into(),
            workspace: "acme".into(),
        }
    }

    #[tokio::test]
    async fn test_attach_visible_before_server_confirms() {
        let m = mutator();
        let scope = m.scope().clone();
        m.cache().revalidate(&scope.issues()).await.unwrap();
        m.cache().revalidate(&scope.sub_issues("a")).await.unwrap();

        m.cache().backend().pause_writes();
        let ids_to_attach = vec!["b".to_string(), "c".to_string()];
        let (result, ()) = tokio::join!(m.attach_sub_issues("a", &ids_to_attach), async {
            m.cache().backend().wait_for_parked_write().await;

            assert_eq!(ids(m.cache().get(&scope.sub_issues("a"))), vec!["c", "b"]);
            let listed = m.cache().get(&scope.issues()).and_then(CacheValue::into_issues).unwrap();
            assert!(
                listed
                    .iter()
                    .filter(|i| i.id == "b" || i.id == "c")
                    .all(|i| i.parent.as_deref() == Some("a"))
            );
            assert_eq!(*m.pending().borrow(), 1);

            m.cache().backend().resume_writes();
        });

        assert_eq!(result.unwrap().len(), 2);
        assert_eq!(ids(m.cache().get(&scope.sub_issues("a"))), vec!["c", "b"]);
        assert_eq!(*m.pending().borrow(), 0);
    }

    #[tokio::test]
    async fn test_detach_keeps_optimistic_value_on_server_error() {
        let m = mutator();
        let scope = m.scope().clone();
        m.cache().backend().add_sub_issues("acme", "p1", "a", &["b".to_string()]).await.unwrap();
        m.cache().revalidate(&scope.sub_issues("a")).await.unwrap();
        assert_eq!(ids(m.cache().get(&scope.sub_issues("a"))), vec!["b"]);

        m.cache().backend().fail_writes(Some(500));
        let err = m.detach_sub_issue("a", "b").await.unwrap_err();
        assert_eq!(err.status(), Some(500));

        assert!(ids(m.cache().get(&scope.sub_issues("a"))).is_empty());
        assert_eq!(m.cache().backend().stored_issue("b").unwrap().parent.as_deref(), Some("a"));
    }

    /// Log sink for asserting on emitted events.
    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn test_failed_detach_is_logged() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let m = mutator();
        let scope = m.scope().clone();
        m.cache().revalidate(&scope.sub_issues("a")).await.unwrap();
        m.cache().backend().fail_writes(Some(500));
        assert!(m.detach_sub_issue("a", "b").await.is_err());

        let logs = captured.text();
        let line = logs.lines().find(|l| l.contains("write failed")).unwrap();
        assert!(line.contains("ERROR"));
        assert!(line.contains("detach sub-issue"));
        assert!(line.contains("500"));
    }

    #[tokio::test]
    async fn test_pending_covers_reconciliation() {
        let b = backend();
        let cache = RemoteCache::new(
            b,
            RetryPolicy {
                max_retries: 1,
                base_delay: std::time::Duration::from_millis(300),
            },
        );
        let m = Mutator::new(
            cache,
            ProjectScope::new("acme", "p1"),
            RoleFlags::from_role(MemberRole::Member),
            FailurePolicy::default(),
        );
        let scope = m.scope().clone();
        m.cache().revalidate(&scope.issues()).await.unwrap();

        // The write succeeds; the follow-up list revalidation fails once and backs off.
        m.cache().backend().fail_reads(1, 503);
        let ids_to_attach = vec!["b".to_string()];
        let (result, ()) = tokio::join!(m.attach_sub_issues("a", &ids_to_attach), async {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            assert_eq!(m.cache().backend().write_count(), 1);
            assert_eq!(*m.pending().borrow(), 1);
        });

        assert_eq!(result.unwrap().len(), 1);
        assert_eq!(*m.pending().borrow(), 0);
    }

    #[tokio::test]
    async fn test_rollback_policy_restores_snapshots() {
        let m = mutator_with(backend(), MemberRole::Owner, FailurePolicy::Rollback);
        let scope = m.scope().clone();
        m.cache().backend().add_sub_issues("acme", "p1", "a", &["b".to_string()]).await.unwrap();
        m.cache().revalidate(&scope.sub_issues("a")).await.unwrap();

        m.cache().backend().fail_writes(Some(503));
        assert!(m.detach_sub_issue("a", "b").await.is_err());
        assert_eq!(ids(m.cache().get(&scope.sub_issues("a"))), vec!["b"]);
    }

    #[tokio::test]
    async fn test_detach_success_reconciles() {
        let m = mutator();
        let scope = m.scope().clone();
        m.cache().backend().add_sub_issues("acme", "p1", "a", &["b".to_string()]).await.unwrap();
        m.cache().revalidate(&scope.issues()).await.unwrap();
        m.cache().revalidate(&scope.sub_issues("a")).await.unwrap();

        let updated = m.detach_sub_issue("a", "b").await.unwrap();
        assert!(updated.parent.is_none());
        assert!(ids(m.cache().get(&scope.sub_issues("a"))).is_empty());

        let listed = m.cache().get(&scope.issues()).and_then(CacheValue::into_issues).unwrap();
        assert!(listed.iter().find(|i| i.id == "b").unwrap().is_root());
        assert!(!m.cache().contains(&scope.issue("b")));
    }

    #[tokio::test]
    async fn test_read_only_roles_are_refused() {
        for role in [MemberRole::Viewer, MemberRole::Guest] {
            let m = mutator_with(backend(), role, FailurePolicy::KeepOptimistic);
            let err = m.detach_sub_issue("a", "b").await.unwrap_err();
            assert!(matches!(err, Error::PermissionDenied(_)));

            let err = m.add_blockers("a", &["b".to_string()]).await.unwrap_err();
            assert!(matches!(err, Error::PermissionDenied(_)));
            assert_eq!(m.cache().backend().write_count(), 0);
            assert_eq!(m.cache().backend().read_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_update_issue_patches_detail_and_list() {
        let m = mutator();
        let scope = m.scope().clone();
        m.cache().revalidate(&scope.issues()).await.unwrap();
        m.cache().revalidate(&scope.issue("d")).await.unwrap();

        let patch = IssuePatch {
            name: Some("Renamed".into()),
            priority: Some(crate::model::Priority::High),
            ..IssuePatch::default()
        };
        let updated = m.update_issue("d", patch).await.unwrap();
        assert_eq!(updated.name, "Renamed");

        let detail = m.cache().get(&scope.issue("d")).and_then(CacheValue::into_issue).unwrap();
        assert_eq!(detail.priority, crate::model::Priority::High);
        let listed = m.cache().get(&scope.issues()).and_then(CacheValue::into_issues).unwrap();
        assert_eq!(listed.iter().find(|i| i.id == "d").unwrap().name, "Renamed");

        let err = m.update_issue("d", IssuePatch::default()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_blocking_edits_mirror_in_cache() {
        let m = mutator();
        let scope = m.scope().clone();
        m.cache().revalidate(&scope.issues()).await.unwrap();

        m.cache().backend().fail_writes(Some(500));
        assert!(m.add_blockers("a", &["d".to_string()]).await.is_err());
        let listed = m.cache().get(&scope.issues()).and_then(CacheValue::into_issues).unwrap();
        assert_eq!(
            listed.iter().find(|i| i.id == "a").unwrap().blockers_list,
            vec!["d".to_string()]
        );
        assert_eq!(listed.iter().find(|i| i.id == "d").unwrap().blocks_list, vec!["a".to_string()]);

        m.cache().backend().fail_writes(None);
        m.remove_blocker("a", "d").await.unwrap();
        let listed = m.cache().get(&scope.issues()).and_then(CacheValue::into_issues).unwrap();
        assert!(listed.iter().all(|i| i.blocks_list.is_empty() && i.blockers_list.is_empty()));

        m.add_blocked("b", &["c".to_string()]).await.unwrap();
        assert_eq!(
            m.cache().backend().stored_issue("c").unwrap().blockers_list,
            vec!["b".to_string()]
        );
        m.remove_blocked("b", "c").await.unwrap();
        assert!(m.cache().backend().stored_issue("c").unwrap().blockers_list.is_empty());

        let err = m.add_blockers("a", &["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_create_sub_issue_appends_to_cached_lists() {
        let m = mutator();
        let scope = m.scope().clone();
        m.cache().revalidate(&scope.issues()).await.unwrap();
        m.cache().revalidate(&scope.sub_issues("a")).await.unwrap();

        let draft = IssueDraft::new("  Write docs ").unwrap().with_parent("a");
        let created = m.create_issue(&draft).await.unwrap();
        assert_eq!(created.name, "Write docs");
        assert_eq!(created.display_id(), "WEB-5");

        assert_eq!(ids(m.cache().get(&scope.sub_issues("a"))), vec![created.id.clone()]);
        assert!(ids(m.cache().get(&scope.issues())).contains(&created.id));
    }

    #[tokio::test]
    async fn test_state_and_member_writes() {
        let b = backend()
            .with_states([state("s1", "Todo", StateGroup::Unstarted, "p1", 1.0)])
            .with_members([member("m1", MemberRole::Member), member("m2", MemberRole::Guest)]);
        let m = mutator_with(b, MemberRole::Owner, FailurePolicy::KeepOptimistic);
        let scope = m.scope().clone();
        m.cache().revalidate(&scope.states()).await.unwrap();
        m.cache().revalidate(&scope.members()).await.unwrap();

        let draft = StateDraft {
            name: "Doing".into(),
            color: "#f00".into(),
            group: StateGroup::Started,
            description: None,
        };
        let created = m.create_state(&draft).await.unwrap();
        let states = m.cache().get(&scope.states()).and_then(CacheValue::into_states).unwrap();
        assert_eq!(states[&StateGroup::Started][0].id, created.id);

        m.delete_state("s1").await.unwrap();
        let states = m.cache().get(&scope.states()).and_then(CacheValue::into_states).unwrap();
        assert!(states[&StateGroup::Unstarted].is_empty());

        let updated = m.update_member_role("m2", MemberRole::Viewer).await.unwrap();
        assert_eq!(updated.role, MemberRole::Viewer);
        m.remove_member("m1").await.unwrap();
        let members = m.cache().get(&scope.members()).and_then(CacheValue::into_members).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].role, MemberRole::Viewer);
    }

    #[tokio::test]
    async fn test_for_current_member_reads_role() {
        let b = backend().with_me(member("me", MemberRole::Viewer));
        let cache = RemoteCache::new(b, RetryPolicy::none());
        let scope = ProjectScope::new("acme", "p1");
        let m = Mutator::for_current_member(cache, scope.clone(), FailurePolicy::default())
            .await
            .unwrap();
        assert!(m.role().is_viewer);
        assert!(!m.role().can_mutate());

        let cache = RemoteCache::new(backend(), RetryPolicy::none());
        let err = Mutator::for_current_member(cache, scope, FailurePolicy::default())
            .await
            .err()
            .unwrap();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_settled_after_writes() {
        let m = mutator();
        m.update_issue("d", IssuePatch { name: Some("x".into()), ..IssuePatch::default() })
            .await
            .unwrap();
        m.settled().await;
        assert_eq!(*m.pending().borrow(), 0);
    }
}
