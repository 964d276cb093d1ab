//! Issue command implementations.

use super::{Context, block_on, print_json};
use crate::backend::HttpBackend;
use crate::cache::{ProjectScope, RemoteCache};
use crate::cli::{BlockCommands, IssueCommands, IssueCreateArgs, IssueUpdateArgs, SubIssueCommands};
use crate::error::{Error, Result};
use crate::model::{Issue, IssueDraft, IssuePatch, Priority};
use crate::relations::{self, RelatedIssue};
use colored::Colorize;
use serde::Serialize;

/// Output for issue list.
#[derive(Serialize)]
struct IssueListOutput<'a> {
    issues: Vec<&'a Issue>,
    count: usize,
}

/// Output for issue show.
#[derive(Serialize)]
struct IssueShowOutput<'a> {
    issue: &'a Issue,
    display_id: String,
    sub_issues: Vec<RelatedIssue>,
    blocked_by: Vec<RelatedIssue>,
    blocking: Vec<RelatedIssue>,
}

/// Output for issue blockers.
#[derive(Serialize)]
struct BlockersOutput {
    id: String,
    blocked_by: Vec<RelatedIssue>,
    blocking: Vec<RelatedIssue>,
}

/// Execute issue commands.
///
/// # Errors
///
/// Returns configuration, permission and backend errors.
pub fn execute(command: &IssueCommands, ctx: &Context) -> Result<()> {
    block_on(execute_async(command, ctx))
}

async fn execute_async(command: &IssueCommands, ctx: &Context) -> Result<()> {
    match command {
        IssueCommands::List { query } => list(query, ctx).await,
        IssueCommands::Show { id } => show(id, ctx).await,
        IssueCommands::Create(args) => create(args, ctx).await,
        IssueCommands::Update(args) => update(args, ctx).await,
        IssueCommands::Sub { command } => sub(command, ctx).await,
        IssueCommands::Block { command } => block(command, ctx).await,
        IssueCommands::Blockers { id } => blockers(id, ctx).await,
    }
}

async fn project_issues(
    cache: &RemoteCache<HttpBackend>,
    scope: &ProjectScope,
) -> Result<Vec<Issue>> {
    cache
        .get_or_fetch(&scope.issues())
        .await?
        .into_issues()
        .ok_or_else(|| Error::NotCached { key: scope.issues().to_string() })
}

fn find<'a>(issues: &'a [Issue], id: &str) -> Result<&'a Issue> {
    issues
        .iter()
        .find(|i| i.id == id)
        .ok_or_else(|| Error::IssueNotFound { id: id.to_string() })
}

async fn list(query: &str, ctx: &Context) -> Result<()> {
    let scope = ctx.config.require_scope()?;
    let cache = ctx.cache();
    let issues = project_issues(&cache, &scope).await?;
    let hits = relations::filter_issues(&issues, query);

    if ctx.json {
        return print_json(&IssueListOutput {
            count: hits.len(),
            issues: hits,
        });
    }

    if hits.is_empty() {
        println!("No issues found.");
    } else {
        println!("Issues ({} found):", hits.len());
        println!();
        print_issue_rows(&hits);
    }
    Ok(())
}

/// Print formatted issue rows to stdout.
fn print_issue_rows(issues: &[&Issue]) {
    for issue in issues {
        let priority = match issue.priority {
            Priority::Urgent => "!!".red().bold(),
            Priority::High => "! ".red(),
            Priority::Medium => "~ ".yellow(),
            Priority::Low => "- ".dimmed(),
            Priority::None => "  ".normal(),
        };
        let child = if issue.is_root() { "" } else { "↳ " };
        println!(
            "{} {} {}{}",
            format!("[{}]", issue.display_id()).dimmed(),
            priority,
            child,
            issue.name
        );
    }
}

fn print_related(title: &str, related: &[RelatedIssue]) {
    if related.is_empty() {
        return;
    }
    println!();
    println!("{}", title.cyan().bold());
    for r in related {
        println!("  {} {}", r.display_id.dimmed(), r.name);
    }
}

async fn show(id: &str, ctx: &Context) -> Result<()> {
    let scope = ctx.config.require_scope()?;
    let cache = ctx.cache();
    let issue = cache
        .get_or_fetch(&scope.issue(id))
        .await?
        .into_issue()
        .ok_or_else(|| Error::IssueNotFound { id: id.to_string() })?;
    let issues = project_issues(&cache, &scope).await?;

    let output = IssueShowOutput {
        display_id: issue.display_id(),
        sub_issues: relations::children(&issues, &issue.id)
            .into_iter()
            .map(RelatedIssue::from)
            .collect(),
        blocked_by: relations::blockers(&issues, &issue),
        blocking: relations::blocking(&issues, &issue),
        issue: &issue,
    };

    if ctx.json {
        return print_json(&output);
    }

    println!("{} {}", format!("[{}]", output.display_id).dimmed(), issue.name.bold());
    println!();
    println!("Priority: {}", issue.priority);
    println!("State:    {}", issue.state.as_deref().unwrap_or("-"));
    if let Some(parent) = &issue.parent {
        let parent = issues
            .iter()
            .find(|i| &i.id == parent)
            .map_or_else(|| parent.clone(), Issue::display_id);
        println!("Parent:   {parent}");
    }
    println!("Created:  {}", issue.created_at.format("%Y-%m-%d %H:%M"));
    print_related("Sub-issues", &output.sub_issues);
    print_related("Blocked by", &output.blocked_by);
    print_related("Blocking", &output.blocking);
    Ok(())
}

async fn create(args: &IssueCreateArgs, ctx: &Context) -> Result<()> {
    let mut draft = IssueDraft::new(&args.name)?;
    if let Some(description) = &args.description {
        draft = draft.with_description(description.as_str());
    }
    if let Some(priority) = &args.priority {
        draft = draft.with_priority(priority.parse()?);
    }
    if let Some(state) = &args.state {
        draft = draft.with_state(state.as_str());
    }
    if let Some(parent) = &args.parent {
        draft = draft.with_parent(parent.as_str());
    }

    let mutator = ctx.mutator().await?;
    let issue = mutator.create_issue(&draft).await?;

    if ctx.json {
        return print_json(&issue);
    }
    println!("Created issue: {} [{}]", issue.name, issue.display_id().green());
    if let Some(parent) = &issue.parent {
        println!("  Parent: {parent}");
    }
    Ok(())
}

async fn update(args: &IssueUpdateArgs, ctx: &Context) -> Result<()> {
    let patch = IssuePatch {
        name: args.name.clone(),
        priority: args.priority.as_deref().map(str::parse).transpose()?,
        state: args.state.clone(),
        ..IssuePatch::default()
    };

    let mutator = ctx.mutator().await?;
    let issue = mutator.update_issue(&args.id, patch).await?;

    if ctx.json {
        return print_json(&issue);
    }
    println!("Updated issue: {} [{}]", issue.name, issue.display_id());
    Ok(())
}

async fn sub(command: &SubIssueCommands, ctx: &Context) -> Result<()> {
    let scope = ctx.config.require_scope()?;

    match command {
        SubIssueCommands::List { parent } => {
            let cache = ctx.cache();
            let children = cache
                .get_or_fetch(&scope.sub_issues(parent))
                .await?
                .into_issues()
                .unwrap_or_default();
            let rows: Vec<&Issue> = children.iter().collect();
            if ctx.json {
                return print_json(&IssueListOutput {
                    count: rows.len(),
                    issues: rows,
                });
            }
            if rows.is_empty() {
                println!("No sub-issues.");
            } else {
                print_issue_rows(&rows);
            }
            Ok(())
        }
        SubIssueCommands::Add { parent, ids } => {
            let mutator = ctx.mutator().await?;
            // Seed the project list so the optimistic sub-issue entry has records to show.
            project_issues(mutator.cache(), &scope).await?;
            let attached = mutator.attach_sub_issues(parent, ids).await?;

            if ctx.json {
                return print_json(&IssueListOutput {
                    count: attached.len(),
                    issues: attached.iter().collect(),
                });
            }
            println!("Attached {} issue(s) under {parent}", attached.len());
            Ok(())
        }
        SubIssueCommands::Remove { parent, child } => {
            let mutator = ctx.mutator().await?;
            let issue = mutator.detach_sub_issue(parent, child).await?;

            if ctx.json {
                return print_json(&issue);
            }
            println!("Detached {} from {parent}", issue.display_id());
            Ok(())
        }
        SubIssueCommands::Candidates { id, query } => {
            let cache = ctx.cache();
            let issues = project_issues(&cache, &scope).await?;
            let focal = find(&issues, id)?;
            let candidates = relations::sub_issue_candidates(&issues, focal);
            let hits = relations::filter_issues(candidates, query);

            if ctx.json {
                return print_json(&IssueListOutput {
                    count: hits.len(),
                    issues: hits,
                });
            }
            if hits.is_empty() {
                println!("No candidates.");
            } else {
                print_issue_rows(&hits);
            }
            Ok(())
        }
    }
}

async fn block(command: &BlockCommands, ctx: &Context) -> Result<()> {
    let mutator = ctx.mutator().await?;

    let issue = match command {
        BlockCommands::Add { id, blocked_by, blocks } => {
            if blocked_by.is_empty() && blocks.is_empty() {
                return Err(Error::InvalidArgument("give --blocked-by and/or --blocks".to_string()));
            }
            let mut issue = None;
            if !blocked_by.is_empty() {
                issue = Some(mutator.add_blockers(id, blocked_by).await?);
            }
            if !blocks.is_empty() {
                issue = Some(mutator.add_blocked(id, blocks).await?);
            }
            issue
        }
        BlockCommands::Remove { id, blocked_by, blocks } => {
            let mut issue = None;
            if let Some(blocker) = blocked_by {
                issue = Some(mutator.remove_blocker(id, blocker).await?);
            }
            if let Some(blocked) = blocks {
                issue = Some(mutator.remove_blocked(id, blocked).await?);
            }
            issue
        }
    };
    let issue = issue
        .ok_or_else(|| Error::InvalidArgument("give --blocked-by and/or --blocks".to_string()))?;

    if ctx.json {
        return print_json(&issue);
    }
    println!(
        "{}: blocked by {}, blocking {}",
        issue.display_id(),
        issue.blockers_list.len(),
        issue.blocks_list.len()
    );
    Ok(())
}

async fn blockers(id: &str, ctx: &Context) -> Result<()> {
    let scope = ctx.config.require_scope()?;
    let cache = ctx.cache();
    let issues = project_issues(&cache, &scope).await?;
    let focal = find(&issues, id)?;

    let output = BlockersOutput {
        id: focal.id.clone(),
        blocked_by: relations::blockers(&issues, focal),
        blocking: relations::blocking(&issues, focal),
    };

    if ctx.json {
        return print_json(&output);
    }
    println!("{} {}", format!("[{}]", focal.display_id()).dimmed(), focal.name.bold());
    if output.blocked_by.is_empty() && output.blocking.is_empty() {
        println!("No blocking relations.");
    }
    print_related("Blocked by", &output.blocked_by);
    print_related("Blocking", &output.blocking);
    Ok(())
}
