//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};

pub mod commands;

/// tsync - client-side sync for the issue tracker
#[derive(Parser, Debug)]
#[command(name = "tsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Tracker API base URL (default: http://localhost:8000)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// API token sent as a bearer token
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Workspace slug
    #[arg(short, long, global = true)]
    pub workspace: Option<String>,

    /// Project ID
    #[arg(short, long, global = true)]
    pub project: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Issues, sub-issues and blocking relations
    Issue {
        #[command(subcommand)]
        command: IssueCommands,
    },

    /// Workflow states
    State {
        #[command(subcommand)]
        command: StateCommands,
    },

    /// Project members
    Member {
        #[command(subcommand)]
        command: MemberCommands,
    },

    /// Check workspace access for the configured token
    Gate {
        /// Evaluate as a settings screen (guests and viewers are refused)
        #[arg(long)]
        settings: bool,
    },

    /// Client configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Issue Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum IssueCommands {
    /// List project issues
    List {
        /// Case-insensitive filter on name or display ID
        #[arg(long, default_value = "")]
        query: String,
    },

    /// Show issue details with its relations
    Show {
        /// Issue ID
        id: String,
    },

    /// Create an issue
    Create(IssueCreateArgs),

    /// Update issue fields
    Update(IssueUpdateArgs),

    /// Manage sub-issues
    Sub {
        #[command(subcommand)]
        command: SubIssueCommands,
    },

    /// Manage blocking relations
    Block {
        #[command(subcommand)]
        command: BlockCommands,
    },

    /// Show what blocks an issue and what it blocks
    Blockers {
        /// Issue ID
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct IssueCreateArgs {
    /// Issue name
    pub name: String,

    /// Issue description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Priority (urgent, high, medium, low, none)
    #[arg(long)]
    pub priority: Option<String>,

    /// State ID
    #[arg(long)]
    pub state: Option<String>,

    /// Parent issue ID (creates a sub-issue)
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Args, Debug)]
pub struct IssueUpdateArgs {
    /// Issue ID
    pub id: String,

    /// New name
    #[arg(long)]
    pub name: Option<String>,

    /// New priority (urgent, high, medium, low, none)
    #[arg(long)]
    pub priority: Option<String>,

    /// New state ID
    #[arg(long)]
    pub state: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum SubIssueCommands {
    /// List sub-issues of a parent
    List {
        /// Parent issue ID
        parent: String,
    },

    /// Attach existing issues under a parent
    Add {
        /// Parent issue ID
        parent: String,

        /// Issue IDs to attach
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Detach a sub-issue from its parent
    Remove {
        /// Parent issue ID
        parent: String,

        /// Sub-issue ID
        child: String,
    },

    /// Issues that can be attached under an issue
    Candidates {
        /// Issue ID
        id: String,

        /// Case-insensitive filter on name or display ID
        #[arg(long, default_value = "")]
        query: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum BlockCommands {
    /// Add blocking relations
    Add {
        /// Issue ID
        id: String,

        /// Issues that block this one (-b x -b y or -b x,y)
        #[arg(short = 'b', long = "blocked-by", value_delimiter = ',')]
        blocked_by: Vec<String>,

        /// Issues this one blocks
        #[arg(long, value_delimiter = ',')]
        blocks: Vec<String>,
    },

    /// Remove a blocking relation
    Remove {
        /// Issue ID
        id: String,

        /// Remove this issue from the blockers
        #[arg(short = 'b', long = "blocked-by")]
        blocked_by: Option<String>,

        /// Remove this issue from the blocked list
        #[arg(long)]
        blocks: Option<String>,
    },
}

// ============================================================================
// State / Member / Config Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum StateCommands {
    /// List states grouped in workflow order
    List,

    /// Create a state
    Create {
        /// State name
        name: String,

        /// Group (backlog, unstarted, started, completed, cancelled)
        #[arg(short, long)]
        group: String,

        /// Color (hex)
        #[arg(short, long, default_value = "#858e96")]
        color: String,

        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete a state
    Delete {
        /// State ID
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum MemberCommands {
    /// List project members
    List,

    /// Show your own project membership
    Me,

    /// Change a member's role
    Role {
        /// Membership ID
        member: String,

        /// New role (owner, member, viewer, guest)
        role: String,
    },

    /// Remove a member from the project
    Remove {
        /// Membership ID
        member: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved configuration
    Show,

    /// Set a value in the config file (empty value clears it)
    Set {
        /// Key (api_url, api_token, workspace, project, retry_count,
        /// retry_base_delay_ms, rollback_on_failure)
        key: String,

        /// Value
        value: String,
    },

    /// Print the config file path
    Path,
}
