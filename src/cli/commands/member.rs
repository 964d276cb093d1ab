//! Member command implementations.

use super::{Context, block_on, print_json};
use crate::cli::MemberCommands;
use crate::error::{Error, Result};
use crate::model::{MemberRole, ProjectMember};
use colored::Colorize;

/// Execute member commands.
///
/// # Errors
///
/// Returns configuration, permission and backend errors.
pub fn execute(command: &MemberCommands, ctx: &Context) -> Result<()> {
    block_on(execute_async(command, ctx))
}

async fn execute_async(command: &MemberCommands, ctx: &Context) -> Result<()> {
    let scope = ctx.config.require_scope()?;

    match command {
        MemberCommands::List => {
            let cache = ctx.cache();
            let members = cache
                .get_or_fetch(&scope.members())
                .await?
                .into_members()
                .unwrap_or_default();
            if ctx.json {
                return print_json(
                    &serde_json::json!({ "members": members, "count": members.len() }),
                );
            }
            if members.is_empty() {
                println!("No members.");
            }
            for member in &members {
                print_member(member);
            }
            Ok(())
        }
        MemberCommands::Me => {
            let cache = ctx.cache();
            let me = cache
                .get_or_fetch(&scope.member_me())
                .await?
                .into_member()
                .ok_or_else(|| Error::Other("unexpected membership record".to_string()))?;
            if ctx.json {
                return print_json(&me);
            }
            print_member(&me);
            Ok(())
        }
        MemberCommands::Role { member, role } => {
            let role = MemberRole::parse(role)?;
            let mutator = ctx.mutator().await?;
            let updated = mutator.update_member_role(member, role).await?;
            if ctx.json {
                return print_json(&updated);
            }
            print_member(&updated);
            Ok(())
        }
        MemberCommands::Remove { member } => {
            let mutator = ctx.mutator().await?;
            mutator.remove_member(member).await?;
            if ctx.json {
                return print_json(&serde_json::json!({ "removed": member }));
            }
            println!("Removed member: {member}");
            Ok(())
        }
    }
}

fn print_member(member: &ProjectMember) {
    let role = match member.role {
        MemberRole::Owner => member.role.as_str().green(),
        MemberRole::Member => member.role.as_str().normal(),
        MemberRole::Viewer | MemberRole::Guest => member.role.as_str().dimmed(),
    };
    println!(
        "{} {} <{}> {}",
        member.id.dimmed(),
        member.member.display_name.bold(),
        member.member.email,
        role
    );
}
