//! Error types for tsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=http, 3=not_found, 4=validation, etc.)
//! - Retryability flags used by the cache's revalidation loop
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

/// Result type alias for tsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Transport (exit 2)
    HttpError,
    Unreachable,

    // Not Found (exit 3)
    IssueNotFound,
    StateNotFound,
    MemberNotFound,
    WorkspaceNotFound,
    NotCached,

    // Validation (exit 4)
    InvalidPriority,
    InvalidRole,
    InvalidArgument,
    RequiredField,

    // Authorization (exit 5)
    NotAMember,
    PermissionDenied,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::HttpError => "HTTP_ERROR",
            Self::Unreachable => "UNREACHABLE",
            Self::IssueNotFound => "ISSUE_NOT_FOUND",
            Self::StateNotFound => "STATE_NOT_FOUND",
            Self::MemberNotFound => "MEMBER_NOT_FOUND",
            Self::WorkspaceNotFound => "WORKSPACE_NOT_FOUND",
            Self::NotCached => "NOT_CACHED",
            Self::InvalidPriority => "INVALID_PRIORITY",
            Self::InvalidRole => "INVALID_ROLE",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::RequiredField => "REQUIRED_FIELD",
            Self::NotAMember => "NOT_A_MEMBER",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::HttpError | Self::Unreachable => 2,
            Self::IssueNotFound
            | Self::StateNotFound
            | Self::MemberNotFound
            | Self::WorkspaceNotFound
            | Self::NotCached => 3,
            Self::InvalidPriority
            | Self::InvalidRole
            | Self::InvalidArgument
            | Self::RequiredField => 4,
            Self::NotAMember | Self::PermissionDenied => 5,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether a fetch that failed with this code should be retried.
    ///
    /// Authorization and not-found failures are final; everything that
    /// looks like a transient transport or server problem is retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::HttpError | Self::Unreachable)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in tsync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("Issue not found: {id}")]
    IssueNotFound { id: String },

    #[error("State not found: {id}")]
    StateNotFound { id: String },

    #[error("Member not found: {id}")]
    MemberNotFound { id: String },

    #[error("No cached value for {key}")]
    NotCached { key: String },

    #[error("Invalid priority: {0}")]
    InvalidPriority(String),

    #[error("Invalid member role: {0}")]
    InvalidRole(i64),

    #[error("Missing required field: {0}")]
    RequiredField(&'static str),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::Http {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None if e.is_decode() => Self::Other(format!("Failed to decode response: {e}")),
            None => Self::Unreachable(e.to_string()),
        }
    }
}

impl Error {
    /// HTTP status carried by this error, if it came from a response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for 401/403 responses: the caller is not a member.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// True for 404 responses and typed not-found errors.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
            || matches!(
                self,
                Self::IssueNotFound { .. }
                    | Self::StateNotFound { .. }
                    | Self::MemberNotFound { .. }
            )
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Http { status: 401 | 403, .. } => ErrorCode::NotAMember,
            Self::Http { status: 404, .. } => ErrorCode::WorkspaceNotFound,
            Self::Http { .. } => ErrorCode::HttpError,
            Self::Unreachable(_) => ErrorCode::Unreachable,
            Self::IssueNotFound { .. } => ErrorCode::IssueNotFound,
            Self::StateNotFound { .. } => ErrorCode::StateNotFound,
            Self::MemberNotFound { .. } => ErrorCode::MemberNotFound,
            Self::NotCached { .. } => ErrorCode::NotCached,
            Self::InvalidPriority(_) => ErrorCode::InvalidPriority,
            Self::InvalidRole(_) => ErrorCode::InvalidRole,
            Self::RequiredField(_) => ErrorCode::RequiredField,
            Self::PermissionDenied(_) => ErrorCode::PermissionDenied,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether a fetch failing with this error should be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.error_code().is_retryable()
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Http { status: 401 | 403, .. } => Some(
                "You are not a member of this workspace. Ask an admin for an invite, \
                 or check `--token` / TSYNC_API_TOKEN."
                    .to_string(),
            ),
            Self::Http { status: 404, .. } => Some(
                "No such workspace or project. Check `--workspace` / `--project`, \
                 or create the workspace first."
                    .to_string(),
            ),
            Self::Unreachable(_) => Some(
                "Check that the API is running and `--api-url` / TSYNC_API_URL is correct."
                    .to_string(),
            ),
            Self::IssueNotFound { id } => Some(format!(
                "No issue with ID '{id}'. Use `tsync issue list` to see available issues."
            )),
            Self::StateNotFound { id } => Some(format!(
                "No state with ID '{id}'. Use `tsync state list` to see project states."
            )),
            Self::MemberNotFound { id } => Some(format!(
                "No member with ID '{id}'. Use `tsync member list` to see project members."
            )),
            Self::InvalidPriority(_) => {
                Some("Valid priorities: urgent, high, medium, low, none".to_string())
            }
            Self::InvalidRole(_) => {
                Some("Valid roles: 20 (owner), 15 (member), 10 (viewer), 5 (guest)".to_string())
            }
            Self::PermissionDenied(_) => {
                Some("Guests and viewers have read-only access to this project.".to_string())
            }
            Self::Config(_) => Some(
                "Run `tsync config show` to inspect the resolved configuration.".to_string(),
            ),
            Self::InvalidArgument(msg) if msg.contains("workspace") || msg.contains("project") => {
                Some(
                    "Pass --workspace and --project, or set TSYNC_WORKSPACE / TSYNC_PROJECT."
                        .to_string(),
                )
            }
            Self::Http { .. }
            | Self::NotCached { .. }
            | Self::RequiredField(_)
            | Self::InvalidArgument(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(status) = self.status() {
            obj["error"]["status"] = serde_json::Value::from(status);
        }
        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
