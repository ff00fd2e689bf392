//! Wire representations of Bitbucket REST payloads.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{
    Activity, Comment, DiffStat, InlineAnchor, Participant, ParticipantRole, PullRequest,
    PullRequestStatus, UserIdentity,
};

/// Placeholder used when a payload carries no usable author name.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// Resolves a display name from a Bitbucket user object.
///
/// Bitbucket exposes the human-readable name as `display_name` and, on some
/// endpoints or privacy settings, only as `nickname`. The more specific
/// `display_name` wins; blank values count as absent.
///
/// # Example
///
/// ```
/// use bbpr::bitbucket::models::{UNKNOWN_AUTHOR, resolve_author};
///
/// assert_eq!(resolve_author(None, Some("octo")), "octo");
/// assert_eq!(resolve_author(Some("Octo Cat"), Some("octo")), "Octo Cat");
/// assert_eq!(resolve_author(Some("  "), None), UNKNOWN_AUTHOR);
/// ```
#[must_use]
pub fn resolve_author(display_name: Option<&str>, nickname: Option<&str>) -> String {
    [display_name, nickname]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_AUTHOR)
        .to_owned()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ApiUser {
    pub(crate) display_name: Option<String>,
    pub(crate) nickname: Option<String>,
    pub(crate) uuid: Option<String>,
    pub(crate) account_id: Option<String>,
}

impl ApiUser {
    fn name(&self) -> String {
        resolve_author(self.display_name.as_deref(), self.nickname.as_deref())
    }

    fn identity_key(&self) -> String {
        self.uuid.clone().unwrap_or_else(|| self.name())
    }
}

fn author_of(user: Option<&ApiUser>) -> String {
    user.map_or_else(|| UNKNOWN_AUTHOR.to_owned(), ApiUser::name)
}

impl From<ApiUser> for UserIdentity {
    fn from(value: ApiUser) -> Self {
        Self {
            display_name: value.name(),
            uuid: value.uuid,
            account_id: value.account_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiParticipant {
    pub(crate) user: Option<ApiUser>,
    #[serde(default)]
    pub(crate) role: ParticipantRole,
    #[serde(default)]
    pub(crate) approved: bool,
}

impl From<ApiParticipant> for Participant {
    fn from(value: ApiParticipant) -> Self {
        Self {
            display_name: author_of(value.user.as_ref()),
            uuid: value.user.and_then(|user| user.uuid),
            role: value.role,
            approved: value.approved,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ApiBranch {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiRepository {
    full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiEndpoint {
    branch: Option<ApiBranch>,
    repository: Option<ApiRepository>,
}

impl ApiEndpoint {
    /// Splits the destination repository's `workspace/slug` full name.
    fn repository_slugs(endpoint: Option<&Self>) -> (String, String) {
        endpoint
            .and_then(|value| value.repository.as_ref())
            .and_then(|repository| repository.full_name.as_deref())
            .and_then(|full_name| full_name.split_once('/'))
            .map(|(workspace, slug)| (workspace.to_owned(), slug.to_owned()))
            .unwrap_or_default()
    }

    fn branch_name(endpoint: Option<Self>) -> String {
        endpoint
            .and_then(|value| value.branch)
            .map(|branch| branch.name)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ApiLink {
    href: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ApiLinks {
    html: Option<ApiLink>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiCommit {
    hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiPullRequest {
    id: u64,
    #[serde(default)]
    title: String,
    description: Option<String>,
    state: PullRequestStatus,
    author: Option<ApiUser>,
    source: Option<ApiEndpoint>,
    destination: Option<ApiEndpoint>,
    #[serde(default)]
    reviewers: Vec<ApiUser>,
    #[serde(default)]
    participants: Vec<ApiParticipant>,
    created_on: Option<DateTime<Utc>>,
    updated_on: Option<DateTime<Utc>>,
    #[serde(default)]
    links: ApiLinks,
    #[serde(default)]
    close_source_branch: bool,
    merge_commit: Option<ApiCommit>,
    #[serde(default)]
    comment_count: u64,
    #[serde(default)]
    task_count: u64,
}

/// Combines the `reviewers` list with approval flags from `participants`.
///
/// Reviewers who have not interacted yet only appear in `reviewers`;
/// participants who approved without being requested are kept too, since
/// their approval counts towards merge checks.
fn merge_reviewers(reviewers: Vec<ApiUser>, participants: Vec<ApiParticipant>) -> Vec<Participant> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for participant in participants {
        let is_relevant = participant.role == ParticipantRole::Reviewer || participant.approved;
        if !is_relevant {
            continue;
        }
        if let Some(user) = participant.user.as_ref() {
            seen.insert(user.identity_key());
        }
        merged.push(Participant::from(participant));
    }

    for reviewer in reviewers {
        if seen.insert(reviewer.identity_key()) {
            merged.push(Participant {
                display_name: reviewer.name(),
                uuid: reviewer.uuid,
                role: ParticipantRole::Reviewer,
                approved: false,
            });
        }
    }

    merged
}

impl From<ApiPullRequest> for PullRequest {
    fn from(value: ApiPullRequest) -> Self {
        let (workspace, repo_slug) = ApiEndpoint::repository_slugs(value.destination.as_ref());
        Self {
            workspace,
            repo_slug,
            id: value.id,
            title: value.title,
            description: value.description.unwrap_or_default(),
            source_branch: ApiEndpoint::branch_name(value.source),
            destination_branch: ApiEndpoint::branch_name(value.destination),
            status: value.state,
            author: author_of(value.author.as_ref()),
            reviewers: merge_reviewers(value.reviewers, value.participants),
            created_on: value.created_on,
            updated_on: value.updated_on,
            html_url: value.links.html.and_then(|link| link.href),
            close_source_branch: value.close_source_branch,
            merge_commit: value.merge_commit.and_then(|commit| commit.hash),
            comment_count: value.comment_count,
            task_count: value.task_count,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ApiContent {
    #[serde(default)]
    raw: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiParentRef {
    id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiComment {
    id: u64,
    content: Option<ApiContent>,
    user: Option<ApiUser>,
    parent: Option<ApiParentRef>,
    inline: Option<InlineAnchor>,
    created_on: Option<DateTime<Utc>>,
}

impl From<ApiComment> for Comment {
    fn from(value: ApiComment) -> Self {
        Self {
            id: value.id,
            content: value.content.map(|content| content.raw).unwrap_or_default(),
            author: author_of(value.user.as_ref()),
            parent_id: value.parent.map(|parent| parent.id),
            inline: value.inline,
            created_on: value.created_on,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ApiPath {
    path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiDiffStat {
    #[serde(default)]
    status: String,
    old: Option<ApiPath>,
    new: Option<ApiPath>,
    #[serde(default)]
    lines_added: u64,
    #[serde(default)]
    lines_removed: u64,
}

impl From<ApiDiffStat> for DiffStat {
    fn from(value: ApiDiffStat) -> Self {
        Self {
            status: value.status,
            old_path: value.old.and_then(|old| old.path),
            new_path: value.new.and_then(|new| new.path),
            lines_added: value.lines_added,
            lines_removed: value.lines_removed,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ApiActivityUpdate {
    state: Option<String>,
    title: Option<String>,
    author: Option<ApiUser>,
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiReviewEvent {
    user: Option<ApiUser>,
    date: Option<DateTime<Utc>>,
}

/// Timeline entry; Bitbucket sets exactly one of these keys.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiActivity {
    update: Option<ApiActivityUpdate>,
    approval: Option<ApiReviewEvent>,
    changes_requested: Option<ApiReviewEvent>,
    comment: Option<ApiComment>,
}

impl From<ApiActivity> for Activity {
    fn from(value: ApiActivity) -> Self {
        if let Some(update) = value.update {
            return Self::Update {
                author: author_of(update.author.as_ref()),
                status: update.state.and_then(|state| state.parse().ok()),
                title: update.title,
                date: update.date,
            };
        }
        if let Some(approval) = value.approval {
            return Self::Approval {
                user: author_of(approval.user.as_ref()),
                date: approval.date,
            };
        }
        if let Some(request) = value.changes_requested {
            return Self::ChangesRequested {
                user: author_of(request.user.as_ref()),
                date: request.date,
            };
        }
        value.comment.map_or(Self::Other, |comment| Self::Comment {
            comment: comment.into(),
        })
    }
}

/// One page of a paginated Bitbucket collection.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiPage<T> {
    #[serde(default = "Vec::new")]
    pub(crate) values: Vec<T>,
    pub(crate) next: Option<String>,
}
