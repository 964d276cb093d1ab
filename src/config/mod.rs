//! Client configuration.
//!
//! Settings are resolved per field with this priority:
//! 1. Explicit command-line flag
//! 2. Environment variable (`TSYNC_API_URL`, `TSYNC_API_TOKEN`,
//!    `TSYNC_WORKSPACE`, `TSYNC_PROJECT`)
//! 3. `~/.tsync/config.json` (or the file named by `TSYNC_CONFIG`)
//! 4. Built-in defaults

use crate::cache::{ProjectScope, RetryPolicy};
use crate::error::{Error, Result};
use crate::mutation::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Keys accepted by [`ConfigFile::set`].
pub const CONFIG_KEYS: [&str; 7] = [
    "api_url",
    "api_token",
    "workspace",
    "project",
    "retry_count",
    "retry_base_delay_ms",
    "rollback_on_failure",
];

/// On-disk configuration; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_base_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_on_failure: Option<bool>,
}

impl ConfigFile {
    /// Set one field from its string form. An empty value clears it.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an unknown key or a value of the wrong type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        let text = (!value.is_empty()).then(|| value.to_string());

        match key {
            "api_url" => self.api_url = text,
            "api_token" => self.api_token = text,
            "workspace" => self.workspace = text,
            "project" => self.project = text,
            "retry_count" => self.retry_count = parse_opt(key, text.as_deref())?,
            "retry_base_delay_ms" => self.retry_base_delay_ms = parse_opt(key, text.as_deref())?,
            "rollback_on_failure" => self.rollback_on_failure = parse_opt(key, text.as_deref())?,
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "unknown config key '{key}' (expected one of: {})",
                    CONFIG_KEYS.join(", ")
                )));
            }
        }
        Ok(())
    }
}

fn parse_opt<T: std::str::FromStr>(key: &str, value: Option<&str>) -> Result<Option<T>> {
    value
        .map(|v| {
            v.parse()
                .map_err(|_| Error::InvalidArgument(format!("invalid value '{v}' for {key}")))
        })
        .transpose()
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub workspace: Option<String>,
    pub project: Option<String>,
}

/// Fully resolved client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    pub api_url: String,
    #[serde(serialize_with = "mask_token")]
    pub api_token: Option<String>,
    pub workspace: Option<String>,
    pub project: Option<String>,
    pub retry_count: u32,
    pub retry_base_delay_ms: u64,
    pub rollback_on_failure: bool,
}

fn mask_token<S: serde::Serializer>(
    token: &Option<String>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    match token {
        Some(_) => s.serialize_str("********"),
        None => s.serialize_none(),
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            workspace: None,
            project: None,
            retry_count: retry.max_retries,
            retry_base_delay_ms: u64::try_from(retry.base_delay.as_millis()).unwrap_or(u64::MAX),
            rollback_on_failure: false,
        }
    }
}

impl ClientConfig {
    /// Resolve from flags, the process environment and the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn resolve(overrides: Overrides) -> Result<Self> {
        let file = load_config()?;
        Ok(Self::resolve_with(overrides, file, |name| std::env::var(name).ok()))
    }

    /// Resolve against an explicit file and environment lookup.
    pub fn resolve_with<E>(overrides: Overrides, file: ConfigFile, env: E) -> Self
    where
        E: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            api_url: overrides
                .api_url
                .or_else(|| env("TSYNC_API_URL"))
                .or(file.api_url)
                .unwrap_or(defaults.api_url),
            api_token: overrides
                .token
                .or_else(|| env("TSYNC_API_TOKEN"))
                .or(file.api_token),
            workspace: overrides
                .workspace
                .or_else(|| env("TSYNC_WORKSPACE"))
                .or(file.workspace),
            project: overrides
                .project
                .or_else(|| env("TSYNC_PROJECT"))
                .or(file.project),
            retry_count: file.retry_count.unwrap_or(defaults.retry_count),
            retry_base_delay_ms: file.retry_base_delay_ms.unwrap_or(defaults.retry_base_delay_ms),
            rollback_on_failure: file.rollback_on_failure.unwrap_or(defaults.rollback_on_failure),
        }
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry_count,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    #[must_use]
    pub const fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::from_rollback_flag(self.rollback_on_failure)
    }

    /// The configured workspace.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when no workspace is configured.
    pub fn require_workspace(&self) -> Result<&str> {
        self.workspace.as_deref().ok_or_else(|| {
            Error::InvalidArgument(
                "no workspace configured (use --workspace or TSYNC_WORKSPACE)".to_string(),
            )
        })
    }

    /// The configured workspace/project pair.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when either is missing.
    pub fn require_scope(&self) -> Result<ProjectScope> {
        let workspace = self.require_workspace()?;
        let project = self.project.as_deref().ok_or_else(|| {
            Error::InvalidArgument(
                "no project configured (use --project or TSYNC_PROJECT)".to_string(),
            )
        })?;
        Ok(ProjectScope::new(workspace, project))
    }
}

/// Location of the config file.
///
/// `TSYNC_CONFIG` wins; otherwise `~/.tsync/config.json`.
///
/// # Errors
///
/// `Config` when the home directory cannot be determined.
pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("TSYNC_CONFIG") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    directories::BaseDirs::new()
        .map(|b| b.home_dir().join(".tsync").join("config.json"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Load the config file; a missing file is an empty config.
///
/// # Errors
///
/// `Config` when the file exists but cannot be read or parsed.
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&config_path()?)
}

/// Load a config file from an explicit path.
///
/// # Errors
///
/// `Config` when the file exists but cannot be read or parsed.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Save the config file.
///
/// # Errors
///
/// `Config` when the file or its directory cannot be written.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path()?;
    save_config_to(&path, config)?;
    Ok(path)
}

/// Save a config file to an explicit path, creating parent directories.
///
/// # Errors
///
/// `Config` when the file or its directory cannot be written.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    fs::write(path, content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            ClientConfig::resolve_with(Overrides::default(), ConfigFile::default(), |_| None);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.failure_policy(), FailurePolicy::KeepOptimistic);
        assert!(config.require_scope().is_err());
    }

    #[test]
    fn test_flag_beats_env_beats_file() {
        let file = ConfigFile {
            api_url: Some("http://file".into()),
            workspace: Some("file-ws".into()),
            project: Some("file-p".into()),
            rollback_on_failure: Some(true),
            ..ConfigFile::default()
        };
        let env = env_of(&[
            ("TSYNC_API_URL", "http://env"),
            ("TSYNC_WORKSPACE", "env-ws"),
            ("TSYNC_PROJECT", "  "),
        ]);
        let overrides = Overrides {
            workspace: Some("flag-ws".into()),
            ..Overrides::default()
        };

        let config = ClientConfig::resolve_with(overrides, file, env);
        assert_eq!(config.api_url, "http://env");
        assert_eq!(config.workspace.as_deref(), Some("flag-ws"));
        assert_eq!(config.project.as_deref(), Some("file-p"));
        assert_eq!(config.failure_policy(), FailurePolicy::Rollback);
        assert_eq!(config.require_scope().unwrap(), ProjectScope::new("flag-ws", "file-p"));
    }

    #[test]
    fn test_set_keys() {
        let mut file = ConfigFile::default();
        file.set("workspace", "acme").unwrap();
        file.set("retry_count", "2").unwrap();
        file.set("rollback_on_failure", "true").unwrap();
        assert_eq!(file.workspace.as_deref(), Some("acme"));
        assert_eq!(file.retry_count, Some(2));

        file.set("workspace", "").unwrap();
        assert!(file.workspace.is_none());

        assert!(matches!(file.set("retry_count", "many"), Err(Error::InvalidArgument(_))));
        assert!(matches!(file.set("colour", "red"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        assert_eq!(load_config_from(&path).unwrap(), ConfigFile::default());

        let file = ConfigFile {
            api_url: Some("https://tracker.example".into()),
            retry_base_delay_ms: Some(50),
            ..ConfigFile::default()
        };
        save_config_to(&path, &file).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), file);

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_config_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_token_is_masked_in_output() {
        let config = ClientConfig {
            api_token: Some("secret".into()),
            ..ClientConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("********"));
    }
}
