//! tsync - client-side sync core for a project/issue tracker
//!
//! This crate keeps a local cache of tracker data (issues, states,
//! members) in step with the REST API, applying writes optimistically.
//!
//! # Architecture
//!
//! - [`cache`] - Keyed remote cache with revalidation and subscriptions
//! - [`mutation`] - Optimistic writes over multi-key transactions
//! - [`relations`] - Sub-issue and blocking views over the issue list
//! - [`states`] - Workflow state grouping and ordering
//! - [`auth`] - Role flags and the workspace authorization gate
//! - [`backend`] - REST backend trait, HTTP and in-memory implementations
//! - [`model`] - Data types (Issue, State, Member, Project)
//! - [`config`] - Configuration resolution
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod mutation;
pub mod relations;
pub mod states;

pub use error::{Error, Result};
