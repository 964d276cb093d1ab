//! Gate command implementation.

use super::{Context, block_on, print_json};
use crate::auth::{GateView, load_gate};
use crate::error::{Error, Result};
use colored::Colorize;

/// Resolve the workspace gate for the configured token.
///
/// Exits non-zero unless access is granted.
///
/// # Errors
///
/// `NotAMember`-class errors for refused views, `InvalidArgument` when no
/// workspace is configured.
pub fn execute(settings: bool, ctx: &Context) -> Result<()> {
    let workspace = ctx.config.require_workspace()?.to_string();
    let view = block_on(async {
        let cache = ctx.cache();
        Ok(load_gate(&cache, &workspace, settings).await)
    })?;

    if ctx.json {
        print_json(&view)?;
    } else {
        match &view {
            GateView::Ready { role } => {
                let name = if role.is_owner {
                    "owner"
                } else if role.is_member {
                    "member"
                } else if role.is_viewer {
                    "viewer"
                } else {
                    "guest"
                };
                println!("{} {workspace} as {name}", "Access granted:".green());
            }
            GateView::Loading => println!("Loading..."),
            other => println!("{} {other:?}", "Access refused:".red()),
        }
    }

    match view {
        GateView::Ready { .. } | GateView::Loading => Ok(()),
        GateView::NotAMember => Err(Error::Http {
            status: 403,
            message: format!("not a member of workspace {workspace}"),
        }),
        GateView::WorkspaceNotFound => Err(Error::Http {
            status: 404,
            message: format!("workspace {workspace} not found"),
        }),
        GateView::NotAuthorized => Err(Error::PermissionDenied(
            "settings require member or owner role".to_string(),
        )),
        GateView::Failed { message } => Err(Error::Other(message)),
    }
}
