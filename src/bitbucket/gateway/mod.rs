//! Gateway for the Bitbucket pull request REST endpoints.
//!
//! [`PullRequestGateway`] exposes one method per REST call so the action
//! layer can be tested against a mock. [`BitbucketGateway`] is the real
//! implementation, layered over a [`RetryingTransport`](crate::bitbucket::transport::RetryingTransport).

mod client;
mod error_mapping;
mod pagination;
mod types;

pub use client::BitbucketGateway;
pub use pagination::{collect_all, paginate};
pub use types::{
    DeclineRequest, ListFilter, MergeRequest, NewComment, NewPullRequest, Page, PageCursor,
    PullRequestUpdate, ReviewerRef,
};

use async_trait::async_trait;

use crate::bitbucket::error::BitbucketError;
use crate::bitbucket::locator::{PullRequestLocator, RepositoryLocator};
use crate::bitbucket::models::{
    Activity, Comment, DiffStat, Participant, PullRequest, UserIdentity,
};

/// Gateway that talks to the Bitbucket pull request API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PullRequestGateway: Send + Sync {
    /// Open a new pull request.
    async fn create_pull_request(
        &self,
        repository: &RepositoryLocator,
        request: &NewPullRequest,
    ) -> Result<PullRequest, BitbucketError>;

    /// Fetch one page of pull requests matching `filter`.
    async fn pull_request_page(
        &self,
        repository: &RepositoryLocator,
        filter: &ListFilter,
        cursor: &PageCursor,
    ) -> Result<Page<PullRequest>, BitbucketError>;

    /// Fetch a single pull request.
    async fn pull_request(&self, locator: &PullRequestLocator)
    -> Result<PullRequest, BitbucketError>;

    /// Change title, description, destination, or reviewers.
    async fn update_pull_request(
        &self,
        locator: &PullRequestLocator,
        update: &PullRequestUpdate,
    ) -> Result<PullRequest, BitbucketError>;

    /// Post a comment.
    async fn add_comment(
        &self,
        locator: &PullRequestLocator,
        comment: &NewComment,
    ) -> Result<Comment, BitbucketError>;

    /// Fetch a single comment.
    async fn comment(
        &self,
        locator: &PullRequestLocator,
        comment_id: u64,
    ) -> Result<Comment, BitbucketError>;

    /// Fetch one page of comments.
    async fn comment_page(
        &self,
        locator: &PullRequestLocator,
        cursor: &PageCursor,
    ) -> Result<Page<Comment>, BitbucketError>;

    /// Approve as the authenticated user.
    async fn approve(&self, locator: &PullRequestLocator) -> Result<Participant, BitbucketError>;

    /// Withdraw the authenticated user's approval.
    async fn unapprove(&self, locator: &PullRequestLocator) -> Result<(), BitbucketError>;

    /// Decline the pull request.
    async fn decline(
        &self,
        locator: &PullRequestLocator,
        request: &DeclineRequest,
    ) -> Result<PullRequest, BitbucketError>;

    /// Merge the pull request.
    async fn merge(
        &self,
        locator: &PullRequestLocator,
        request: &MergeRequest,
    ) -> Result<PullRequest, BitbucketError>;

    /// Fetch the unified diff as text.
    async fn diff(&self, locator: &PullRequestLocator) -> Result<String, BitbucketError>;

    /// Fetch one page of per-file change statistics.
    async fn diffstat_page(
        &self,
        locator: &PullRequestLocator,
        cursor: &PageCursor,
    ) -> Result<Page<DiffStat>, BitbucketError>;

    /// Fetch one page of the activity timeline.
    async fn activity_page(
        &self,
        locator: &PullRequestLocator,
        cursor: &PageCursor,
    ) -> Result<Page<Activity>, BitbucketError>;

    /// Identify the authenticated user.
    async fn current_user(&self) -> Result<UserIdentity, BitbucketError>;
}
