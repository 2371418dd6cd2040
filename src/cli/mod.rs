//! Command-line front end for the `mantis` binary.
//!
//! Every command prints its result as pretty JSON on stdout. Logs go to
//! stderr so output can be piped.

mod commands;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::codec::Timestamp;
use crate::requests::DEFAULT_PAGE_SIZE;

pub use commands::{execute, run};
pub use output::{guess_mime_type, render_json};

/// Default deadline for a whole command, in seconds.
pub const DEFAULT_DEADLINE_SECS: u64 = 300;

/// Project used by `user list` when none is given.
pub const DEFAULT_USER_PROJECT: u64 = 1;

/// Minimum access level used by `user list` (viewer).
pub const DEFAULT_USER_ACCESS: u64 = 10;

#[derive(Debug, Parser)]
#[command(name = "mantis")]
#[command(version, about = "Work with MantisBT issues over the MantisConnect API")]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Give up on the whole command after this many seconds
    #[arg(long, global = true, default_value_t = DEFAULT_DEADLINE_SECS)]
    pub deadline: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect and change issues
    #[command(subcommand)]
    Issue(IssueCommand),
    /// Add notes to issues
    #[command(subcommand)]
    Note(NoteCommand),
    /// List projects and their issues
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Manage project versions
    #[command(subcommand)]
    Version(VersionCommand),
    /// List users
    #[command(subcommand)]
    User(UserCommand),
    /// Use stored filters
    #[command(subcommand)]
    Filter(FilterCommand),
    /// Search issues by criteria
    Search(SearchArgs),
    /// Manage REST API tokens
    #[command(subcommand)]
    Token(TokenCommand),
    /// Check that the server is reachable and the credentials work
    Ping,
}

impl Command {
    /// Short name used in logs and timeout errors.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Issue(cmd) => match cmd {
                IssueCommand::Exists { .. } => "issue exists",
                IssueCommand::Get { .. } => "issue get",
                IssueCommand::Monitors { .. } => "issue monitors",
                IssueCommand::Attachments { .. } => "issue attachments",
                IssueCommand::Download { .. } => "issue download",
                IssueCommand::Attach { .. } => "issue attach",
                IssueCommand::Status { .. } => "issue status",
                IssueCommand::AddMonitor { .. } => "issue add-monitor",
                IssueCommand::Delete { .. } => "issue delete",
            },
            Command::Note(NoteCommand::Add { .. }) => "note add",
            Command::Project(ProjectCommand::List) => "project list",
            Command::Project(ProjectCommand::Issues { .. }) => "project issues",
            Command::Version(cmd) => match cmd {
                VersionCommand::List { .. } => "version list",
                VersionCommand::Add { .. } => "version add",
                VersionCommand::Update { .. } => "version update",
                VersionCommand::Delete { .. } => "version delete",
            },
            Command::User(UserCommand::List { .. }) => "user list",
            Command::User(UserCommand::Me) => "user me",
            Command::Filter(FilterCommand::List { .. }) => "filter list",
            Command::Filter(FilterCommand::Issues { .. }) => "filter issues",
            Command::Search(_) => "search",
            Command::Token(TokenCommand::Create { .. }) => "token create",
            Command::Token(TokenCommand::Revoke { .. }) => "token revoke",
            Command::Ping => "ping",
        }
    }

    /// Whether the command talks to the REST API instead of SOAP.
    pub fn uses_rest(&self) -> bool {
        matches!(self, Command::Token(_) | Command::User(UserCommand::Me))
    }
}

#[derive(Debug, Subcommand)]
pub enum IssueCommand {
    /// Check whether an issue exists
    Exists { issue_id: u64 },
    /// Show an issue
    Get { issue_id: u64 },
    /// List an issue's monitors
    Monitors { issue_id: u64 },
    /// List an issue's attachments
    Attachments { issue_id: u64 },
    /// Show the download URLs of an issue's attachments
    Download { issue_id: u64 },
    /// Attach files to an issue, skipping names already attached
    Attach {
        issue_id: u64,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Raise issues to a status, skipping those already at or past it
    Status {
        status_id: u64,
        #[arg(required = true)]
        issue_ids: Vec<u64>,
    },
    /// Add users (by login name) as monitors
    AddMonitor {
        issue_id: u64,
        #[arg(required = true)]
        users: Vec<String>,
    },
    /// Delete an issue
    Delete { issue_id: u64 },
}

#[derive(Debug, Subcommand)]
pub enum NoteCommand {
    /// Add a note as the logged-in user
    Add {
        issue_id: u64,
        /// Note text; multiple words are joined with spaces
        #[arg(required = true)]
        text: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProjectCommand {
    /// List accessible projects
    List,
    /// List a project's issues
    Issues {
        project_id: u64,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Debug, Subcommand)]
pub enum VersionCommand {
    /// List a project's versions
    List { project_id: u64 },
    /// Add a version to a project
    Add {
        project_id: u64,
        name: String,
        #[command(flatten)]
        fields: VersionFields,
    },
    /// Change a version, looked up across all accessible projects
    Update {
        version_id: u64,
        /// New name
        name: Option<String>,
        #[command(flatten)]
        fields: VersionFields,
    },
    /// Delete a version
    Delete { version_id: u64 },
}

#[derive(Debug, Clone, Default, Args)]
pub struct VersionFields {
    /// Version description
    #[arg(long)]
    pub description: Option<String>,

    /// Mark the version as released
    #[arg(long)]
    pub released: bool,

    /// Mark the version as obsolete
    #[arg(long)]
    pub obsolete: bool,

    /// Release date (RFC 3339, e.g. 2024-05-01T00:00:00Z)
    #[arg(long)]
    pub date: Option<Timestamp>,
}

#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// List users of a project with at least the given access level
    List {
        #[arg(long, default_value_t = DEFAULT_USER_PROJECT)]
        project: u64,
        #[arg(long, default_value_t = DEFAULT_USER_ACCESS)]
        access: u64,
    },
    /// Show the account behind the API token
    Me,
}

#[derive(Debug, Subcommand)]
pub enum FilterCommand {
    /// List stored filters (project 0 means all projects)
    List {
        #[arg(long, default_value_t = 0)]
        project: u64,
    },
    /// List issues matching a stored filter
    Issues {
        project_id: u64,
        filter_id: u64,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Debug, Clone, Args)]
pub struct PageArgs {
    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: u64,

    /// Issues per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub per_page: u64,
}

#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    /// Free-text search
    pub text: Option<String>,

    /// Restrict to projects
    #[arg(long = "project")]
    pub projects: Vec<u64>,

    /// Restrict to statuses
    #[arg(long = "status")]
    pub statuses: Vec<u64>,

    /// Hide statuses
    #[arg(long = "hide-status")]
    pub hide_statuses: Vec<u64>,

    /// Restrict to categories
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// Restrict to handlers (user IDs)
    #[arg(long = "handler")]
    pub handlers: Vec<u64>,

    /// Restrict to reporters (user IDs)
    #[arg(long = "reporter")]
    pub reporters: Vec<u64>,

    /// Sort field (e.g. last_updated)
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort direction: ASC or DESC
    #[arg(long)]
    pub direction: Option<String>,

    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Create an API token; the value is only shown once
    Create { name: String },
    /// Revoke an API token by ID
    Revoke { token_id: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mantis").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_issue_status() {
        let cli = parse(&["issue", "status", "80", "1", "2"]);
        match cli.command {
            Command::Issue(IssueCommand::Status {
                status_id,
                issue_ids,
            }) => {
                assert_eq!(status_id, 80);
                assert_eq!(issue_ids, vec![1, 2]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_status_requires_issues() {
        assert!(Cli::try_parse_from(["mantis", "issue", "status", "80"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["ping", "--verbose", "--deadline", "5"]);
        assert!(cli.verbose);
        assert_eq!(cli.deadline(), Duration::from_secs(5));
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["user", "list"]);
        assert!(!cli.verbose);
        assert_eq!(cli.deadline, DEFAULT_DEADLINE_SECS);
        assert!(matches!(
            cli.command,
            Command::User(UserCommand::List {
                project: DEFAULT_USER_PROJECT,
                access: DEFAULT_USER_ACCESS
            })
        ));
    }

    #[test]
    fn test_version_date_is_parsed() {
        let cli = parse(&["version", "add", "3", "1.0", "--date", "2024-05-01T00:00:00Z"]);
        match cli.command {
            Command::Version(VersionCommand::Add { fields, .. }) => {
                assert_eq!(fields.date.unwrap().format(), "2024-05-01T00:00:00Z");
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(Cli::try_parse_from(["mantis", "version", "add", "3", "1.0", "--date", "may"]).is_err());
    }

    #[test]
    fn test_search_repeated_flags() {
        let cli = parse(&["search", "crash", "--project", "1", "--project", "2", "--per-page", "5"]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.text.as_deref(), Some("crash"));
                assert_eq!(args.projects, vec![1, 2]);
                assert_eq!(args.page.per_page, 5);
                assert_eq!(args.page.page, 1);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_command_names_and_rest_routing() {
        assert_eq!(parse(&["note", "add", "1", "hi"]).command.name(), "note add");
        assert!(parse(&["token", "revoke", "4"]).command.uses_rest());
        assert!(parse(&["user", "me"]).command.uses_rest());
        assert!(!parse(&["user", "list"]).command.uses_rest());
    }
}
