//! Command-line surface for `bb-pr`.
//!
//! - [`Cli`]: clap definitions for global options and subcommands
//! - [`commands`]: resolves configuration and credentials, then dispatches
//!   each subcommand to the pull request actions
//! - [`output`]: text and JSON rendering

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use bbpr::PullRequestStatus;
use bbpr::bitbucket::models::MergeStrategy;

pub mod commands;
pub mod output;

/// Manage Bitbucket Cloud pull requests from the terminal.
#[derive(Debug, Parser)]
#[command(name = "bb-pr", version, about)]
pub struct Cli {
    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Options accepted before or after any subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Workspace slug, overriding the configured default.
    #[arg(short, long, global = true)]
    pub workspace: Option<String>,

    /// Repository slug, overriding the configured default.
    #[arg(short, long, global = true)]
    pub repo: Option<String>,

    /// Repository access token or OAuth token.
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Bitbucket username for app-password authentication.
    #[arg(long, global = true)]
    pub username: Option<String>,

    /// App password paired with `--username`.
    #[arg(long, global = true)]
    pub app_password: Option<String>,

    /// Print results and errors as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Pull request given as a numeric id or a `bitbucket.org` web URL.
#[derive(Debug, Clone, Args)]
pub struct PullRequestArg {
    /// Pull request id, or its web URL.
    #[arg(value_name = "PR")]
    pub pr: String,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open a new pull request.
    Create(CreateArgs),
    /// List pull requests in the repository.
    List(ListArgs),
    /// Show one pull request.
    Show(PullRequestArg),
    /// Comment on a pull request, optionally inline or as a reply.
    Comment(CommentArgs),
    /// List the comments on a pull request.
    Comments(PullRequestArg),
    /// Approve a pull request.
    Approve(PullRequestArg),
    /// Withdraw your approval.
    Unapprove(PullRequestArg),
    /// Decline a pull request.
    Decline(DeclineArgs),
    /// Merge a pull request.
    Merge(MergeArgs),
    /// Edit the title, description, destination, or reviewers.
    Update(UpdateArgs),
    /// Print the unified diff.
    Diff(PullRequestArg),
    /// Print per-file change counts.
    Diffstat(PullRequestArg),
    /// Show the activity timeline: updates, approvals, and comments.
    Activity(ActivityArgs),
    /// Show the authenticated user.
    Whoami,
}

/// Arguments for `create`.
#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    /// Pull request title. Defaults to the template's first line.
    #[arg(short, long, required_unless_present = "template")]
    pub title: Option<String>,

    /// Template file: first line is the title, the rest the description.
    #[arg(long, value_name = "PATH")]
    pub template: Option<PathBuf>,

    /// Branch with the changes.
    #[arg(short, long)]
    pub source: String,

    /// Branch to merge into. Defaults to the configured destination.
    #[arg(short, long)]
    pub destination: Option<String>,

    /// Markdown description.
    #[arg(long)]
    pub description: Option<String>,

    /// Reviewer UUID (`{...}`) or account id. Repeatable; added to the
    /// configured default reviewers.
    #[arg(long = "reviewer")]
    pub reviewers: Vec<String>,

    /// Keep the source branch after merging.
    #[arg(long)]
    pub keep_source_branch: bool,
}

/// Arguments for `activity`.
#[derive(Debug, Clone, Args)]
pub struct ActivityArgs {
    /// Pull request to inspect.
    #[command(flatten)]
    pub target: PullRequestArg,

    /// Show at most this many entries.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

/// Arguments for `list`.
#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Only pull requests in this state.
    #[arg(long)]
    pub state: Option<PullRequestStatus>,

    /// Only pull requests by this author username.
    #[arg(long)]
    pub author: Option<String>,

    /// Only pull requests targeting this branch.
    #[arg(long)]
    pub destination: Option<String>,

    /// Only pull requests with this reviewer username.
    #[arg(long)]
    pub reviewer: Option<String>,

    /// Page size requested from Bitbucket.
    #[arg(long)]
    pub pagelen: Option<u32>,

    /// Stop after this many pull requests.
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Arguments for `comment`.
#[derive(Debug, Clone, Args)]
pub struct CommentArgs {
    /// Pull request to comment on.
    #[command(flatten)]
    pub target: PullRequestArg,

    /// Comment text in markdown.
    pub message: String,

    /// File path for an inline comment.
    #[arg(long)]
    pub path: Option<String>,

    /// Line in the new version of the file.
    #[arg(long, requires = "path")]
    pub line: Option<u32>,

    /// Line in the old version of the file.
    #[arg(long, requires = "path")]
    pub from_line: Option<u32>,

    /// Reply to this comment id.
    #[arg(long)]
    pub reply_to: Option<u64>,
}

/// Arguments for `decline`.
#[derive(Debug, Clone, Args)]
pub struct DeclineArgs {
    /// Pull request to decline.
    #[command(flatten)]
    pub target: PullRequestArg,

    /// Reason shown on the pull request.
    #[arg(short, long)]
    pub message: Option<String>,
}

/// Arguments for `merge`.
#[derive(Debug, Clone, Args)]
pub struct MergeArgs {
    /// Pull request to merge.
    #[command(flatten)]
    pub target: PullRequestArg,

    /// `merge_commit`, `squash`, or `fast_forward`.
    #[arg(long)]
    pub strategy: Option<MergeStrategy>,

    /// Merge commit message.
    #[arg(short, long)]
    pub message: Option<String>,

    /// Keep the source branch after merging.
    #[arg(long)]
    pub keep_source_branch: bool,
}

/// Arguments for `update`.
#[derive(Debug, Clone, Args)]
pub struct UpdateArgs {
    /// Pull request to edit.
    #[command(flatten)]
    pub target: PullRequestArg,

    /// New title.
    #[arg(short, long)]
    pub title: Option<String>,

    /// New description.
    #[arg(long)]
    pub description: Option<String>,

    /// New destination branch.
    #[arg(short, long)]
    pub destination: Option<String>,

    /// Replacement reviewer list. Repeatable.
    #[arg(long = "reviewer")]
    pub reviewers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rstest::rstest;

    use super::{Cli, Command};

    #[rstest]
    fn global_options_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["bb-pr", "approve", "42", "-w", "acme", "--json"])
            .expect("arguments should parse");

        assert_eq!(cli.global.workspace.as_deref(), Some("acme"));
        assert!(cli.global.json);
        assert!(matches!(cli.command, Command::Approve(ref arg) if arg.pr == "42"));
    }

    #[rstest]
    fn list_parses_state_filter() {
        let cli = Cli::try_parse_from(["bb-pr", "list", "--state", "open", "--limit", "5"])
            .expect("arguments should parse");

        let Command::List(args) = cli.command else {
            panic!("expected list command");
        };
        assert_eq!(args.state, Some(bbpr::PullRequestStatus::Open));
        assert_eq!(args.limit, Some(5));
    }

    #[rstest]
    fn merge_rejects_unknown_strategy() {
        let result = Cli::try_parse_from(["bb-pr", "merge", "42", "--strategy", "rebase"]);

        assert!(result.is_err());
    }

    #[rstest]
    fn create_needs_a_title_or_template() {
        let missing = Cli::try_parse_from(["bb-pr", "create", "--source", "feature/x"]);
        let templated = Cli::try_parse_from([
            "bb-pr",
            "create",
            "--source",
            "feature/x",
            "--template",
            "PR.md",
        ]);

        assert!(missing.is_err());
        assert!(templated.is_ok());
    }

    #[rstest]
    fn activity_limit_defaults_to_twenty() {
        let cli = Cli::try_parse_from(["bb-pr", "activity", "42"]).expect("arguments should parse");

        let Command::Activity(args) = cli.command else {
            panic!("expected activity command");
        };
        assert_eq!(args.limit, 20);
    }

    #[rstest]
    fn inline_line_requires_path() {
        let result = Cli::try_parse_from(["bb-pr", "comment", "42", "LGTM", "--line", "3"]);

        assert!(result.is_err());
    }
}
