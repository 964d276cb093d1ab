//! Command implementations.

pub mod completions;
pub mod config;
pub mod gate;
pub mod issue;
pub mod member;
pub mod state;
pub mod version;

use crate::backend::HttpBackend;
use crate::cache::RemoteCache;
use crate::cli::Cli;
use crate::config::{ClientConfig, Overrides};
use crate::error::{Error, Result};
use crate::mutation::Mutator;
use serde::Serialize;
use std::future::Future;

/// Resolved settings shared by every networked command.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: ClientConfig,
    pub json: bool,
}

impl Context {
    /// Resolve configuration from global flags, environment and config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read.
    pub fn from_cli(cli: &Cli, json: bool) -> Result<Self> {
        let overrides = Overrides {
            api_url: cli.api_url.clone(),
            token: cli.token.clone(),
            workspace: cli.workspace.clone(),
            project: cli.project.clone(),
        };
        Ok(Self {
            config: ClientConfig::resolve(overrides)?,
            json,
        })
    }

    /// A fresh cache in front of the HTTP backend.
    #[must_use]
    pub fn cache(&self) -> RemoteCache<HttpBackend> {
        let backend = HttpBackend::new(self.config.api_url.clone(), self.config.api_token.clone());
        RemoteCache::new(backend, self.config.retry_policy())
    }

    /// A mutator for the configured project, with the caller's own role.
    ///
    /// # Errors
    ///
    /// Fails when no workspace/project is configured or the membership
    /// lookup fails.
    pub async fn mutator(&self) -> Result<Mutator<HttpBackend>> {
        let scope = self.config.require_scope()?;
        Mutator::for_current_member(self.cache(), scope, self.config.failure_policy()).await
    }
}

/// Run an async command body on a fresh runtime.
///
/// # Errors
///
/// Returns the body's error, or `Error::Other` if the runtime cannot start.
pub fn block_on<F, T>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;
    rt.block_on(future)
}

/// Print a value as one line of JSON.
fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
