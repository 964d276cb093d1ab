//! State command implementations.

use super::{Context, block_on, print_json};
use crate::cli::StateCommands;
use crate::error::{Error, Result};
use crate::model::{StateDraft, StateGroup};
use crate::states::order_state_groups;
use colored::Colorize;

/// Execute state commands.
///
/// # Errors
///
/// Returns configuration, permission and backend errors.
pub fn execute(command: &StateCommands, ctx: &Context) -> Result<()> {
    block_on(execute_async(command, ctx))
}

async fn execute_async(command: &StateCommands, ctx: &Context) -> Result<()> {
    match command {
        StateCommands::List => list(ctx).await,
        StateCommands::Create {
            name,
            group,
            color,
            description,
        } => {
            let group = StateGroup::parse(group).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "invalid state group '{group}' (expected one of: {})",
                    StateGroup::CANONICAL.map(|g| g.as_str()).join(", ")
                ))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::RequiredField("name"));
            }
            let draft = StateDraft {
                name: name.to_string(),
                color: color.clone(),
                group,
                description: description.clone(),
            };

            let mutator = ctx.mutator().await?;
            let state = mutator.create_state(&draft).await?;
            if ctx.json {
                return print_json(&state);
            }
            println!("Created state: {} [{}] in {}", state.name, state.id, state.group.as_str());
            Ok(())
        }
        StateCommands::Delete { id } => {
            let mutator = ctx.mutator().await?;
            mutator.delete_state(id).await?;
            if ctx.json {
                return print_json(&serde_json::json!({ "deleted": id }));
            }
            println!("Deleted state: {id}");
            Ok(())
        }
    }
}

async fn list(ctx: &Context) -> Result<()> {
    let scope = ctx.config.require_scope()?;
    let cache = ctx.cache();
    let map = cache
        .get_or_fetch(&scope.states())
        .await?
        .into_states()
        .unwrap_or_default();
    let ordered = order_state_groups(&map);

    if ctx.json {
        let groups: Vec<_> = ordered
            .iter()
            .map(|(group, states)| serde_json::json!({ "group": group, "states": states }))
            .collect();
        return print_json(&serde_json::json!({ "groups": groups, "count": ordered.len() }));
    }

    if ordered.is_empty() {
        println!("No states.");
        return Ok(());
    }
    for (group, states) in ordered.non_empty() {
        println!("{}", group.as_str().cyan().bold());
        for state in states {
            println!("  {} {}", state.name, state.id.dimmed());
        }
    }
    Ok(())
}
