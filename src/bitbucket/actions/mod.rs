//! Pull request actions and their state preconditions.
//!
//! [`PullRequestActions`] sits between the CLI and the gateway. Before a
//! state-restricted write it checks the pull request's last known status, so
//! an illegal transition fails locally with
//! [`BitbucketError::InvalidState`] and no write request is sent. Everything
//! else the server rejects is passed through unchanged.

use std::borrow::Cow;

use futures_util::stream::{Stream, StreamExt};
use tracing::{debug, info};

use crate::bitbucket::error::{ActionKind, BitbucketError};
use crate::bitbucket::gateway::{
    DeclineRequest, ListFilter, MergeRequest, NewComment, NewPullRequest, PageCursor,
    PullRequestGateway, PullRequestUpdate, collect_all, paginate,
};
use crate::bitbucket::locator::{PullRequestLocator, RepositoryLocator};
use crate::bitbucket::models::{
    Activity, Comment, DiffStat, Participant, PullRequest, PullRequestStatus,
};

/// One intended operation with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    /// Open a pull request.
    Create {
        /// Target repository.
        repository: RepositoryLocator,
        /// Title, branches, and reviewers.
        pull_request: NewPullRequest,
    },
    /// List pull requests.
    List {
        /// Repository to list.
        repository: RepositoryLocator,
        /// Server-side filters.
        filter: ListFilter,
        /// Stop after this many pull requests.
        limit: Option<usize>,
    },
    /// Fetch one pull request.
    Show {
        /// Pull request to fetch.
        locator: PullRequestLocator,
    },
    /// Post a comment.
    Comment {
        /// Pull request to comment on.
        locator: PullRequestLocator,
        /// Comment content and placement.
        comment: NewComment,
    },
    /// Approve as the authenticated user.
    Approve {
        /// Pull request to approve.
        locator: PullRequestLocator,
    },
    /// Withdraw approval.
    Unapprove {
        /// Pull request to unapprove.
        locator: PullRequestLocator,
    },
    /// Decline.
    Decline {
        /// Pull request to decline.
        locator: PullRequestLocator,
        /// Optional reason.
        request: DeclineRequest,
    },
    /// Merge.
    Merge {
        /// Pull request to merge.
        locator: PullRequestLocator,
        /// Strategy and message.
        request: MergeRequest,
    },
}

impl ActionRequest {
    /// The action this request performs.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Create { .. } => ActionKind::Create,
            Self::List { .. } => ActionKind::List,
            Self::Show { .. } => ActionKind::Show,
            Self::Comment { .. } => ActionKind::Comment,
            Self::Approve { .. } => ActionKind::Approve,
            Self::Unapprove { .. } => ActionKind::Unapprove,
            Self::Decline { .. } => ActionKind::Decline,
            Self::Merge { .. } => ActionKind::Merge,
        }
    }
}

/// Result of a completed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The pull request that was opened.
    Created(PullRequest),
    /// Pull requests matching the filter.
    Listed(Vec<PullRequest>),
    /// The fetched pull request.
    Shown(PullRequest),
    /// The posted comment.
    Commented(Comment),
    /// The caller's participant entry after approving.
    Approved(Participant),
    /// Approval withdrawn.
    Unapproved,
    /// The pull request after declining.
    Declined(PullRequest),
    /// The pull request after merging.
    Merged(PullRequest),
}

/// Returns true for actions that are only legal while the pull request is
/// open.
#[must_use]
pub const fn requires_open(action: ActionKind) -> bool {
    matches!(
        action,
        ActionKind::Approve | ActionKind::Unapprove | ActionKind::Decline | ActionKind::Merge
    )
}

/// Checks that `action` is legal for the pull request's status.
///
/// # Errors
///
/// Returns [`BitbucketError::InvalidState`] when a state-restricted action
/// targets a pull request that is no longer open.
///
/// # Example
///
/// ```
/// use bbpr::bitbucket::actions::check_precondition;
/// use bbpr::bitbucket::error::ActionKind;
/// use bbpr::bitbucket::models::{PullRequestStatus, test_support::pull_request};
///
/// let merged = pull_request(42, PullRequestStatus::Merged);
/// assert!(check_precondition(ActionKind::Merge, &merged).is_err());
/// assert!(check_precondition(ActionKind::Comment, &merged).is_ok());
/// ```
pub const fn check_precondition(
    action: ActionKind,
    pull_request: &PullRequest,
) -> Result<(), BitbucketError> {
    if requires_open(action) && !matches!(pull_request.status, PullRequestStatus::Open) {
        return Err(BitbucketError::InvalidState {
            action,
            id: pull_request.id,
            status: pull_request.status,
        });
    }
    Ok(())
}

/// Performs pull request actions through a borrowed gateway.
///
/// Holds no state of its own; every status check uses either the snapshot
/// the caller passes in or a fresh fetch.
#[derive(Debug)]
pub struct PullRequestActions<'g, G: ?Sized> {
    gateway: &'g G,
}

impl<'g, G> PullRequestActions<'g, G>
where
    G: PullRequestGateway + ?Sized,
{
    /// Creates an action runner over `gateway`.
    #[must_use]
    pub const fn new(gateway: &'g G) -> Self {
        Self { gateway }
    }

    /// Uses `snapshot` when it describes the addressed pull request,
    /// otherwise fetches the current state.
    async fn current_state<'s>(
        &self,
        locator: &PullRequestLocator,
        snapshot: Option<&'s PullRequest>,
    ) -> Result<Cow<'s, PullRequest>, BitbucketError> {
        match snapshot {
            Some(known) if locator.identifies(known) => Ok(Cow::Borrowed(known)),
            _ => {
                debug!(id = locator.id().get(), "fetching pull request state");
                self.gateway.pull_request(locator).await.map(Cow::Owned)
            }
        }
    }

    async fn ensure_allowed(
        &self,
        action: ActionKind,
        locator: &PullRequestLocator,
        snapshot: Option<&PullRequest>,
    ) -> Result<(), BitbucketError> {
        let state = self.current_state(locator, snapshot).await?;
        check_precondition(action, &state)
    }

    /// Approves an open pull request.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidState`] without sending the approval
    /// when the pull request is not open; server rejections such as
    /// self-approval are returned as received.
    pub async fn approve(
        &self,
        locator: &PullRequestLocator,
        snapshot: Option<&PullRequest>,
    ) -> Result<Participant, BitbucketError> {
        self.ensure_allowed(ActionKind::Approve, locator, snapshot)
            .await?;
        let participant = self.gateway.approve(locator).await?;
        info!(id = locator.id().get(), "approved pull request");
        Ok(participant)
    }

    /// Withdraws approval from an open pull request.
    ///
    /// # Errors
    ///
    /// As for [`Self::approve`].
    pub async fn unapprove(
        &self,
        locator: &PullRequestLocator,
        snapshot: Option<&PullRequest>,
    ) -> Result<(), BitbucketError> {
        self.ensure_allowed(ActionKind::Unapprove, locator, snapshot)
            .await?;
        self.gateway.unapprove(locator).await?;
        info!(id = locator.id().get(), "withdrew approval");
        Ok(())
    }

    /// Declines an open pull request.
    ///
    /// # Errors
    ///
    /// As for [`Self::approve`].
    pub async fn decline(
        &self,
        locator: &PullRequestLocator,
        request: &DeclineRequest,
        snapshot: Option<&PullRequest>,
    ) -> Result<PullRequest, BitbucketError> {
        self.ensure_allowed(ActionKind::Decline, locator, snapshot)
            .await?;
        let declined = self.gateway.decline(locator, request).await?;
        info!(id = declined.id, status = %declined.status, "declined pull request");
        Ok(declined)
    }

    /// Merges an open pull request.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidState`] when the pull request is not
    /// open, and [`BitbucketError::Conflict`] when Bitbucket refuses the
    /// merge.
    pub async fn merge(
        &self,
        locator: &PullRequestLocator,
        request: &MergeRequest,
        snapshot: Option<&PullRequest>,
    ) -> Result<PullRequest, BitbucketError> {
        self.ensure_allowed(ActionKind::Merge, locator, snapshot)
            .await?;
        let merged = self.gateway.merge(locator, request).await?;
        info!(
            id = merged.id,
            strategy = %request.strategy,
            commit = merged.merge_commit.as_deref().unwrap_or("-"),
            "merged pull request"
        );
        Ok(merged)
    }

    /// Posts a comment. Allowed in any state.
    ///
    /// # Errors
    ///
    /// Propagates gateway errors.
    pub async fn comment(
        &self,
        locator: &PullRequestLocator,
        comment: &NewComment,
    ) -> Result<Comment, BitbucketError> {
        let posted = self.gateway.add_comment(locator, comment).await?;
        info!(id = locator.id().get(), comment_id = posted.id, "posted comment");
        Ok(posted)
    }

    /// Fetches a pull request.
    ///
    /// # Errors
    ///
    /// Propagates gateway errors.
    pub async fn show(&self, locator: &PullRequestLocator) -> Result<PullRequest, BitbucketError> {
        self.gateway.pull_request(locator).await
    }

    /// Opens a pull request.
    ///
    /// # Errors
    ///
    /// Propagates gateway errors.
    pub async fn create(
        &self,
        repository: &RepositoryLocator,
        request: &NewPullRequest,
    ) -> Result<PullRequest, BitbucketError> {
        let created = self.gateway.create_pull_request(repository, request).await?;
        info!(id = created.id, "created pull request");
        Ok(created)
    }

    /// Edits title, description, destination, or reviewers.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidArgument`] when `update` changes
    /// nothing; otherwise propagates gateway errors.
    pub async fn update(
        &self,
        locator: &PullRequestLocator,
        update: &PullRequestUpdate,
    ) -> Result<PullRequest, BitbucketError> {
        if update.is_empty() {
            return Err(BitbucketError::InvalidArgument {
                message: "nothing to update".to_owned(),
            });
        }
        let updated = self.gateway.update_pull_request(locator, update).await?;
        info!(id = updated.id, "updated pull request");
        Ok(updated)
    }

    /// Streams pull requests matching `filter`, fetching pages on demand.
    pub fn list<'a>(
        &'a self,
        repository: &'a RepositoryLocator,
        filter: &'a ListFilter,
    ) -> impl Stream<Item = Result<PullRequest, BitbucketError>> + 'a {
        let gateway = self.gateway;
        paginate(move |cursor: PageCursor| async move {
            gateway.pull_request_page(repository, filter, &cursor).await
        })
    }

    /// Collects up to `limit` pull requests, requesting no more pages than
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while fetching a page.
    pub async fn list_collected(
        &self,
        repository: &RepositoryLocator,
        filter: &ListFilter,
        limit: Option<usize>,
    ) -> Result<Vec<PullRequest>, BitbucketError> {
        let items = self.list(repository, filter);
        match limit {
            Some(max) => collect_all(items.take(max)).await,
            None => collect_all(items).await,
        }
    }

    /// Fetches every comment on a pull request.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while fetching a page.
    pub async fn comments(
        &self,
        locator: &PullRequestLocator,
    ) -> Result<Vec<Comment>, BitbucketError> {
        let gateway = self.gateway;
        collect_all(paginate(move |cursor: PageCursor| async move {
            gateway.comment_page(locator, &cursor).await
        }))
        .await
    }

    /// Fetches the activity timeline, stopping after `limit` entries
    /// without requesting further pages.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while fetching a page.
    pub async fn activity(
        &self,
        locator: &PullRequestLocator,
        limit: Option<usize>,
    ) -> Result<Vec<Activity>, BitbucketError> {
        let gateway = self.gateway;
        let entries = paginate(move |cursor: PageCursor| async move {
            gateway.activity_page(locator, &cursor).await
        });
        match limit {
            Some(max) => collect_all(entries.take(max)).await,
            None => collect_all(entries).await,
        }
    }

    /// Fetches the full per-file diffstat.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while fetching a page.
    pub async fn diffstat(
        &self,
        locator: &PullRequestLocator,
    ) -> Result<Vec<DiffStat>, BitbucketError> {
        let gateway = self.gateway;
        collect_all(paginate(move |cursor: PageCursor| async move {
            gateway.diffstat_page(locator, &cursor).await
        }))
        .await
    }

    /// Fetches the unified diff.
    ///
    /// # Errors
    ///
    /// Propagates gateway errors.
    pub async fn diff(&self, locator: &PullRequestLocator) -> Result<String, BitbucketError> {
        self.gateway.diff(locator).await
    }

    /// Dispatches `action`, checking preconditions against `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying action.
    pub async fn execute(
        &self,
        action: &ActionRequest,
        snapshot: Option<&PullRequest>,
    ) -> Result<ActionOutcome, BitbucketError> {
        debug!(action = %action.kind(), "executing pull request action");
        match action {
            ActionRequest::Create {
                repository,
                pull_request,
            } => self
                .create(repository, pull_request)
                .await
                .map(ActionOutcome::Created),
            ActionRequest::List {
                repository,
                filter,
                limit,
            } => self
                .list_collected(repository, filter, *limit)
                .await
                .map(ActionOutcome::Listed),
            ActionRequest::Show { locator } => self.show(locator).await.map(ActionOutcome::Shown),
            ActionRequest::Comment { locator, comment } => self
                .comment(locator, comment)
                .await
                .map(ActionOutcome::Commented),
            ActionRequest::Approve { locator } => self
                .approve(locator, snapshot)
                .await
                .map(ActionOutcome::Approved),
            ActionRequest::Unapprove { locator } => self
                .unapprove(locator, snapshot)
                .await
                .map(|()| ActionOutcome::Unapproved),
            ActionRequest::Decline { locator, request } => self
                .decline(locator, request, snapshot)
                .await
                .map(ActionOutcome::Declined),
            ActionRequest::Merge { locator, request } => self
                .merge(locator, request, snapshot)
                .await
                .map(ActionOutcome::Merged),
        }
    }
}
