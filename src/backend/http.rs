//! HTTP backend.
//!
//! JSON over HTTP against the tracker API. Non-success responses become
//! `Error::Http` with the status code preserved, so callers can tell
//! authorization failures (401/403) apart from transient server errors.
//!
//! A 404 on a single issue, state or member route is reported as the typed
//! not-found error for that record. On collection and membership routes a
//! 404 keeps its status and means the workspace or project is missing.

use crate::error::{Error, Result};
use crate::model::{
    Issue, IssueDraft, IssuePatch, MemberRole, ProjectMember, State, StateDraft, StateMap,
    WorkspaceMember,
};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use super::Backend;

/// Tracker API client.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

/// Replace a 404 with the typed not-found error for the addressed record.
fn not_found_as(e: Error, typed: impl FnOnce() -> Error) -> Error {
    if e.status() == Some(404) { typed() } else { e }
}

fn issue_not_found(id: &str) -> impl FnOnce() -> Error + '_ {
    move || Error::IssueNotFound { id: id.to_string() }
}

#[derive(Serialize)]
struct AddSubIssuesRequest<'a> {
    sub_issue_ids: &'a [String],
}

#[derive(Serialize)]
struct RoleUpdateRequest {
    role: MemberRole,
}

impl HttpBackend {
    /// Create a backend for an API base URL (e.g. `http://localhost:8000`).
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, token)
    }

    /// Create a backend reusing an existing client.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            token: token.filter(|t| !t.is_empty()),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL for a path under a project.
    fn project_url(&self, workspace: &str, project: &str, tail: &str) -> String {
        format!(
            "{}/api/workspaces/{workspace}/projects/{project}/{tail}",
            self.base_url
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        trace!(%method, url, "api request");
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode a JSON body.
    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        let response = Self::send(builder).await?;
        response.json().await.map_err(Error::from)
    }

    /// Send a request, mapping non-success statuses to `Error::Http`.
    async fn send(builder: RequestBuilder) -> Result<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "api request failed");
            return Err(Error::Http {
                status: status.as_u16(),
                message: if message.is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    message
                },
            });
        }

        Ok(response)
    }
}

impl Backend for HttpBackend {
    async fn list_issues(&self, workspace: &str, project: &str) -> Result<Vec<Issue>> {
        let url = self.project_url(workspace, project, "issues/");
        Self::send_json(self.request(Method::GET, &url)).await
    }

    async fn get_issue(&self, workspace: &str, project: &str, issue: &str) -> Result<Issue> {
        let url = self.project_url(workspace, project, &format!("issues/{issue}/"));
        Self::send_json(self.request(Method::GET, &url))
            .await
            .map_err(|e| not_found_as(e, issue_not_found(issue)))
    }

    async fn create_issue(
        &self,
        workspace: &str,
        project: &str,
        draft: &IssueDraft,
    ) -> Result<Issue> {
        let url = self.project_url(workspace, project, "issues/");
        Self::send_json(self.request(Method::POST, &url).json(draft)).await
    }

    async fn patch_issue(
        &self,
        workspace: &str,
        project: &str,
        issue: &str,
        patch: &IssuePatch,
    ) -> Result<Issue> {
        let url = self.project_url(workspace, project, &format!("issues/{issue}/"));
        Self::send_json(self.request(Method::PATCH, &url).json(patch))
            .await
            .map_err(|e| not_found_as(e, issue_not_found(issue)))
    }

    async fn sub_issues(&self, workspace: &str, project: &str, issue: &str) -> Result<Vec<Issue>> {
        let url = self.project_url(workspace, project, &format!("issues/{issue}/sub-issues/"));
        Self::send_json(self.request(Method::GET, &url))
            .await
            .map_err(|e| not_found_as(e, issue_not_found(issue)))
    }

    async fn add_sub_issues(
        &self,
        workspace: &str,
        project: &str,
        parent: &str,
        sub_issue_ids: &[String],
    ) -> Result<Vec<Issue>> {
        let url = self.project_url(workspace, project, &format!("issues/{parent}/sub-issues/"));
        let body = AddSubIssuesRequest { sub_issue_ids };
        Self::send_json(self.request(Method::POST, &url).json(&body))
            .await
            .map_err(|e| not_found_as(e, issue_not_found(parent)))
    }

    async fn list_states(&self, workspace: &str, project: &str) -> Result<StateMap> {
        let url = self.project_url(workspace, project, "states/");
        Self::send_json(self.request(Method::GET, &url)).await
    }

    async fn create_state(
        &self,
        workspace: &str,
        project: &str,
        draft: &StateDraft,
    ) -> Result<State> {
        let url = self.project_url(workspace, project, "states/");
        Self::send_json(self.request(Method::POST, &url).json(draft)).await
    }

    async fn delete_state(&self, workspace: &str, project: &str, state: &str) -> Result<()> {
        let url = self.project_url(workspace, project, &format!("states/{state}/"));
        Self::send(self.request(Method::DELETE, &url))
            .await
            .map(|_| ())
            .map_err(|e| {
                not_found_as(e, || Error::StateNotFound {
                    id: state.to_string(),
                })
            })
    }

    async fn list_project_members(
        &self,
        workspace: &str,
        project: &str,
    ) -> Result<Vec<ProjectMember>> {
        let url = self.project_url(workspace, project, "members/");
        Self::send_json(self.request(Method::GET, &url)).await
    }

    async fn update_project_member(
        &self,
        workspace: &str,
        project: &str,
        member: &str,
        role: MemberRole,
    ) -> Result<ProjectMember> {
        let url = self.project_url(workspace, project, &format!("members/{member}/"));
        Self::send_json(self.request(Method::PATCH, &url).json(&RoleUpdateRequest { role }))
            .await
            .map_err(|e| {
                not_found_as(e, || Error::MemberNotFound {
                    id: member.to_string(),
                })
            })
    }

    async fn remove_project_member(
        &self,
        workspace: &str,
        project: &str,
        member: &str,
    ) -> Result<()> {
        let url = self.project_url(workspace, project, &format!("members/{member}/"));
        Self::send(self.request(Method::DELETE, &url))
            .await
            .map(|_| ())
            .map_err(|e| {
                not_found_as(e, || Error::MemberNotFound {
                    id: member.to_string(),
                })
            })
    }

    async fn project_member_me(&self, workspace: &str, project: &str) -> Result<ProjectMember> {
        let url = self.project_url(workspace, project, "project-members/me/");
        Self::send_json(self.request(Method::GET, &url)).await
    }

    async fn workspace_member_me(&self, workspace: &str) -> Result<WorkspaceMember> {
        let url = format!("{}/api/workspaces/{workspace}/workspace-members/me/", self.base_url);
        Self::send_json(self.request(Method::GET, &url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let backend = HttpBackend::new("http://localhost:8000/", Some(String::new()));
        assert_eq!(backend.base_url(), "http://localhost:8000");
        assert!(backend.token.is_none());
    }

    #[test]
    fn test_project_url() {
        let backend = HttpBackend::new("http://api.test", None);
        assert_eq!(
            backend.project_url("acme", "p1", "issues/i1/sub-issues/"),
            "http://api.test/api/workspaces/acme/projects/p1/issues/i1/sub-issues/"
        );
    }

    #[test]
    fn test_record_404_becomes_typed_not_found() {
        let missing = Error::Http {
            status: 404,
            message: "Not Found".into(),
        };
        let err = not_found_as(missing, issue_not_found("i9"));
        assert!(matches!(&err, Error::IssueNotFound { id } if id == "i9"));
        assert_eq!(err.error_code(), crate::error::ErrorCode::IssueNotFound);
        assert!(err.hint().unwrap().contains("tsync issue list"));

        let forbidden = Error::Http {
            status: 403,
            message: "Forbidden".into(),
        };
        assert_eq!(not_found_as(forbidden, issue_not_found("i9")).status(), Some(403));
    }

    #[tokio::test]
    async fn test_unreachable_maps_to_retryable_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let backend = HttpBackend::new("http://127.0.0.1:9", None);
        let err = backend.list_issues("w", "p").await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err:?}");
    }
}
