//! Membership role flags and the authorization gate.
//!
//! The gate decides what a caller gets to see from the state of the
//! `workspace-members/me/` fetch:
//! - still loading → [`GateView::Loading`]
//! - 401/403 → [`GateView::NotAMember`] (never retried)
//! - 404 → [`GateView::WorkspaceNotFound`]
//! - settings screens for guests/viewers → [`GateView::NotAuthorized`]

use crate::backend::Backend;
use crate::cache::{CacheKey, CacheValue, RemoteCache};
use crate::error::Error;
use crate::model::{MemberRole, WorkspaceMember};
use serde::Serialize;

/// One-hot view of a member role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct RoleFlags {
    pub is_owner: bool,
    pub is_member: bool,
    pub is_viewer: bool,
    pub is_guest: bool,
}

impl RoleFlags {
    #[must_use]
    pub const fn from_role(role: MemberRole) -> Self {
        Self {
            is_owner: matches!(role, MemberRole::Owner),
            is_member: matches!(role, MemberRole::Member),
            is_viewer: matches!(role, MemberRole::Viewer),
            is_guest: matches!(role, MemberRole::Guest),
        }
    }

    /// Flags from a raw wire value; unknown values set nothing.
    #[must_use]
    pub fn from_raw(role: i64) -> Self {
        MemberRole::try_from(role).map(Self::from_role).unwrap_or_default()
    }

    /// Guests and viewers are read-only. An unknown role is too.
    #[must_use]
    pub const fn can_mutate(&self) -> bool {
        self.is_owner || self.is_member
    }
}

/// State of a membership fetch as seen by the gate.
#[derive(Debug)]
pub enum FetchState<T> {
    Loading,
    Loaded(T),
    Failed(Error),
}

/// What the gate lets through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum GateView {
    Loading,
    NotAMember,
    WorkspaceNotFound,
    Failed { message: String },
    NotAuthorized,
    Ready { role: RoleFlags },
}

/// Decide the view for a membership fetch.
#[must_use]
pub fn resolve_gate(state: &FetchState<WorkspaceMember>, settings_page: bool) -> GateView {
    match state {
        FetchState::Loading => GateView::Loading,
        FetchState::Failed(e) if e.is_unauthorized() => GateView::NotAMember,
        FetchState::Failed(e) if e.status() == Some(404) => GateView::WorkspaceNotFound,
        FetchState::Failed(e) => GateView::Failed { message: e.to_string() },
        FetchState::Loaded(me) => {
            let role = RoleFlags::from_role(me.role);
            if settings_page && !role.can_mutate() {
                GateView::NotAuthorized
            } else {
                GateView::Ready { role }
            }
        }
    }
}

/// Fetch (or reuse) the caller's workspace membership and resolve the gate.
pub async fn load_gate<B: Backend + 'static>(
    cache: &RemoteCache<B>,
    workspace: &str,
    settings_page: bool,
) -> GateView {
    let key = CacheKey::workspace_member_me(workspace);
    let state = match cache.get_or_fetch(&key).await.map(CacheValue::into_workspace_member) {
        Ok(Some(me)) => FetchState::Loaded(me),
        Ok(None) => FetchState::Failed(Error::Other(format!("unexpected value cached for {key}"))),
        Err(e) => FetchState::Failed(e),
    };
    resolve_gate(&state, settings_page)
}
