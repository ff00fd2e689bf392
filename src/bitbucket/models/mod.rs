//! Data models representing Bitbucket pull requests, participants, and
//! comments.
//!
//! Public types here are the domain view handed to callers. The wire shapes
//! Bitbucket actually returns live in the private `api` module and convert
//! into these types, normalising field variance on the way.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::BitbucketError;

mod api;

pub(crate) use api::{
    ApiActivity, ApiComment, ApiDiffStat, ApiPage, ApiParticipant, ApiPullRequest, ApiUser,
};
pub use api::{UNKNOWN_AUTHOR, resolve_author};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Server-side lifecycle state of a pull request.
///
/// Status only ever moves forward: `Open` may become any of the terminal
/// states, and no terminal state transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullRequestStatus {
    /// Open for review.
    Open,
    /// Merged into the destination branch.
    Merged,
    /// Declined by a reviewer or the author.
    Declined,
    /// Replaced by a newer pull request.
    Superseded,
}

impl PullRequestStatus {
    /// Returns the Bitbucket API spelling of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
            Self::Declined => "DECLINED",
            Self::Superseded => "SUPERSEDED",
        }
    }

    /// Returns true for states that never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Open)
    }

    /// Returns true when the server may move a pull request from `self` to
    /// `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::Merged | Self::Declined | Self::Superseded)
        )
    }
}

impl fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PullRequestStatus {
    type Err = BitbucketError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Ok(Self::Open),
            "MERGED" => Ok(Self::Merged),
            "DECLINED" => Ok(Self::Declined),
            "SUPERSEDED" => Ok(Self::Superseded),
            _ => Err(BitbucketError::InvalidArgument {
                message: format!(
                    "unknown pull request state '{value}' \
                     (expected OPEN, MERGED, DECLINED, or SUPERSEDED)"
                ),
            }),
        }
    }
}

/// Strategy Bitbucket uses to integrate the source branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Create a merge commit.
    #[default]
    MergeCommit,
    /// Squash all commits into one.
    Squash,
    /// Fast-forward the destination branch.
    FastForward,
}

impl MergeStrategy {
    /// Returns the API value sent in the merge payload.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MergeCommit => "merge_commit",
            Self::Squash => "squash",
            Self::FastForward => "fast_forward",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = BitbucketError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "merge_commit" | "merge" => Ok(Self::MergeCommit),
            "squash" => Ok(Self::Squash),
            "fast_forward" | "ff" => Ok(Self::FastForward),
            _ => Err(BitbucketError::InvalidArgument {
                message: format!(
                    "unknown merge strategy '{value}' \
                     (expected merge_commit, squash, or fast_forward)"
                ),
            }),
        }
    }
}

/// Role a participant holds on a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantRole {
    /// Requested reviewer.
    Reviewer,
    /// Anyone else who interacted with the pull request.
    #[default]
    Participant,
}

/// A reviewer or participant and their approval flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    /// Display name, normalised through [`resolve_author`].
    pub display_name: String,
    /// Bitbucket user UUID when present.
    pub uuid: Option<String>,
    /// Role on the pull request.
    pub role: ParticipantRole,
    /// Whether this participant currently approves.
    pub approved: bool,
}

/// Pull request as last reported by Bitbucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    /// Workspace owning the repository.
    pub workspace: String,
    /// Repository slug.
    pub repo_slug: String,
    /// Server-assigned identifier, unique within the repository.
    pub id: u64,
    /// Title.
    pub title: String,
    /// Markdown description, empty when unset.
    pub description: String,
    /// Branch being merged.
    pub source_branch: String,
    /// Branch receiving the changes.
    pub destination_branch: String,
    /// Lifecycle status.
    pub status: PullRequestStatus,
    /// Author display name, or [`UNKNOWN_AUTHOR`].
    pub author: String,
    /// Requested reviewers with their approval flags.
    pub reviewers: Vec<Participant>,
    /// Creation timestamp.
    pub created_on: Option<DateTime<Utc>>,
    /// Last update timestamp.
    pub updated_on: Option<DateTime<Utc>>,
    /// Browser URL for the pull request.
    pub html_url: Option<String>,
    /// Whether the source branch is closed on merge.
    pub close_source_branch: bool,
    /// Merge commit hash once merged.
    pub merge_commit: Option<String>,
    /// Number of comments.
    pub comment_count: u64,
    /// Number of open tasks.
    pub task_count: u64,
}

impl PullRequest {
    /// Fills a missing workspace or repository slug, for payloads that
    /// omit the destination repository.
    #[must_use]
    pub fn with_repository_fallback(mut self, workspace: &str, repo_slug: &str) -> Self {
        if self.workspace.is_empty() {
            workspace.clone_into(&mut self.workspace);
        }
        if self.repo_slug.is_empty() {
            repo_slug.clone_into(&mut self.repo_slug);
        }
        self
    }

    /// Returns true when this is pull request `id` of `workspace/repo_slug`.
    ///
    /// Bitbucket slugs are case-insensitive, so they compare that way.
    #[must_use]
    pub fn is_identified_by(&self, workspace: &str, repo_slug: &str, id: u64) -> bool {
        self.id == id
            && self.workspace.eq_ignore_ascii_case(workspace)
            && self.repo_slug.eq_ignore_ascii_case(repo_slug)
    }

    /// Returns the number of reviewers who currently approve.
    #[must_use]
    pub fn approval_count(&self) -> usize {
        self.reviewers.iter().filter(|reviewer| reviewer.approved).count()
    }
}

/// Position of an inline comment within the diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineAnchor {
    /// File path relative to the repository root.
    pub path: String,
    /// Line in the old version of the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<u32>,
    /// Line in the new version of the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<u32>,
}

/// A pull request comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    /// Comment identifier.
    pub id: u64,
    /// Raw markdown content.
    pub content: String,
    /// Author display name, or [`UNKNOWN_AUTHOR`].
    pub author: String,
    /// Parent comment for threaded replies.
    pub parent_id: Option<u64>,
    /// Inline position when attached to the diff.
    pub inline: Option<InlineAnchor>,
    /// Creation timestamp.
    pub created_on: Option<DateTime<Utc>>,
}

/// Per-file change summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffStat {
    /// Change status reported by Bitbucket (`added`, `modified`, ...).
    pub status: String,
    /// Path before the change, if the file existed.
    pub old_path: Option<String>,
    /// Path after the change, if the file still exists.
    pub new_path: Option<String>,
    /// Lines added.
    pub lines_added: u64,
    /// Lines removed.
    pub lines_removed: u64,
}

/// One entry of a pull request's activity timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Activity {
    /// The pull request was opened or edited.
    Update {
        /// Who made the change.
        author: String,
        /// Status after the change.
        status: Option<PullRequestStatus>,
        /// Title after the change.
        title: Option<String>,
        /// When it happened.
        date: Option<DateTime<Utc>>,
    },
    /// Someone approved.
    Approval {
        /// Approving user.
        user: String,
        /// When it happened.
        date: Option<DateTime<Utc>>,
    },
    /// Someone requested changes.
    ChangesRequested {
        /// Requesting user.
        user: String,
        /// When it happened.
        date: Option<DateTime<Utc>>,
    },
    /// A comment was posted.
    Comment {
        /// The comment.
        comment: Comment,
    },
    /// An entry type this client does not know.
    Other,
}

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    /// Display name, normalised through [`resolve_author`].
    pub display_name: String,
    /// Bitbucket user UUID when present.
    pub uuid: Option<String>,
    /// Atlassian account id when present.
    pub account_id: Option<String>,
}
