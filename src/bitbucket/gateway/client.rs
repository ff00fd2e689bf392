//! Bitbucket gateway backed by the retrying transport.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::error_mapping::{map_decode_error, map_http_error};
use super::{
    DeclineRequest, ListFilter, MergeRequest, NewComment, NewPullRequest, Page, PageCursor,
    PullRequestGateway, PullRequestUpdate,
};
use crate::bitbucket::credential::Credential;
use crate::bitbucket::error::BitbucketError;
use crate::bitbucket::locator::{PullRequestLocator, RepositoryLocator, current_user_url};
use crate::bitbucket::models::{
    Activity, ApiActivity, ApiComment, ApiDiffStat, ApiPage, ApiParticipant, ApiPullRequest,
    ApiUser, Comment, DiffStat, Participant, PullRequest, UserIdentity,
};
use crate::bitbucket::transport::{
    ApiRequest, ApiResponse, HttpTransport, ReqwestTransport, RetryPolicy, RetryingTransport,
};

/// Gateway that issues Bitbucket REST calls through a [`RetryingTransport`].
#[derive(Debug)]
pub struct BitbucketGateway<T> {
    transport: RetryingTransport<T>,
    api_base: Url,
}

impl BitbucketGateway<ReqwestTransport> {
    /// Builds the production stack: `reqwest` transport carrying
    /// `credential`, wrapped in retries governed by `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Configuration`] when the HTTP client cannot
    /// be constructed.
    pub fn for_credential(
        credential: Credential,
        api_base: Url,
        timeout: Duration,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Result<Self, BitbucketError> {
        let transport = ReqwestTransport::new(credential, timeout)?;
        Ok(Self::new(
            RetryingTransport::new(transport, policy, cancel),
            api_base,
        ))
    }
}

impl<T: HttpTransport> BitbucketGateway<T> {
    /// Creates a gateway serving requests under `api_base`.
    ///
    /// Pagination links that point at another origin are refused.
    #[must_use]
    pub const fn new(transport: RetryingTransport<T>, api_base: Url) -> Self {
        Self {
            transport,
            api_base,
        }
    }

    /// API base this gateway is bound to.
    #[must_use]
    pub const fn api_base(&self) -> &Url {
        &self.api_base
    }

    async fn send(
        &self,
        operation: &str,
        request: ApiRequest,
    ) -> Result<ApiResponse, BitbucketError> {
        let response = self.transport.execute(&request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(map_http_error(operation, &response))
        }
    }

    async fn fetch_json<W: DeserializeOwned>(
        &self,
        operation: &str,
        request: ApiRequest,
    ) -> Result<W, BitbucketError> {
        let response = self.send(operation, request).await?;
        serde_json::from_str(&response.body).map_err(|error| map_decode_error(operation, &error))
    }

    async fn fetch_page<W, D>(
        &self,
        operation: &str,
        first: Url,
        cursor: &PageCursor,
    ) -> Result<Page<D>, BitbucketError>
    where
        W: DeserializeOwned,
        D: From<W>,
    {
        let url = match cursor {
            PageCursor::First => first,
            PageCursor::Next(link) => self.ensure_same_origin(link.clone())?,
        };
        let page: ApiPage<W> = self.fetch_json(operation, ApiRequest::get(url)).await?;
        let next = page
            .next
            .as_deref()
            .map(|link| self.parse_next_link(link))
            .transpose()?;

        Ok(Page {
            items: page.values.into_iter().map(D::from).collect(),
            next,
        })
    }

    fn parse_next_link(&self, link: &str) -> Result<Url, BitbucketError> {
        let url = Url::parse(link).map_err(|error| BitbucketError::Decode {
            message: format!("invalid pagination link '{link}': {error}"),
        })?;
        self.ensure_same_origin(url)
    }

    fn ensure_same_origin(&self, url: Url) -> Result<Url, BitbucketError> {
        if url.origin() == self.api_base.origin() {
            Ok(url)
        } else {
            Err(BitbucketError::Decode {
                message: format!(
                    "pagination link {url} leaves the API origin {}",
                    self.api_base.origin().ascii_serialization()
                ),
            })
        }
    }
}

/// Converts a pull request payload, taking missing slugs from `repository`.
fn located(value: ApiPullRequest, repository: &RepositoryLocator) -> PullRequest {
    PullRequest::from(value).with_repository_fallback(
        repository.workspace().as_str(),
        repository.repository().as_str(),
    )
}

#[async_trait]
impl<T: HttpTransport> PullRequestGateway for BitbucketGateway<T> {
    async fn create_pull_request(
        &self,
        repository: &RepositoryLocator,
        request: &NewPullRequest,
    ) -> Result<PullRequest, BitbucketError> {
        let api_request =
            ApiRequest::post(repository.pull_requests_url(), Some(request.to_payload()));
        let created: ApiPullRequest = self.fetch_json("create pull request", api_request).await?;
        Ok(located(created, repository))
    }

    async fn pull_request_page(
        &self,
        repository: &RepositoryLocator,
        filter: &ListFilter,
        cursor: &PageCursor,
    ) -> Result<Page<PullRequest>, BitbucketError> {
        let mut first = repository.pull_requests_url();
        filter.apply(&mut first);
        let page = self
            .fetch_page::<ApiPullRequest, ApiPullRequest>("list pull requests", first, cursor)
            .await?;
        Ok(Page {
            items: page
                .items
                .into_iter()
                .map(|value| located(value, repository))
                .collect(),
            next: page.next,
        })
    }

    async fn pull_request(
        &self,
        locator: &PullRequestLocator,
    ) -> Result<PullRequest, BitbucketError> {
        let fetched: ApiPullRequest = self
            .fetch_json("get pull request", ApiRequest::get(locator.url()))
            .await?;
        Ok(located(fetched, locator.repository()))
    }

    async fn update_pull_request(
        &self,
        locator: &PullRequestLocator,
        update: &PullRequestUpdate,
    ) -> Result<PullRequest, BitbucketError> {
        let request = ApiRequest::put(locator.url(), update.to_payload());
        let updated: ApiPullRequest = self.fetch_json("update pull request", request).await?;
        Ok(located(updated, locator.repository()))
    }

    async fn add_comment(
        &self,
        locator: &PullRequestLocator,
        comment: &NewComment,
    ) -> Result<Comment, BitbucketError> {
        let request = ApiRequest::post(
            locator.sub_resource(&["comments"]),
            Some(comment.to_payload()),
        );
        let created: ApiComment = self.fetch_json("add comment", request).await?;
        Ok(created.into())
    }

    async fn comment(
        &self,
        locator: &PullRequestLocator,
        comment_id: u64,
    ) -> Result<Comment, BitbucketError> {
        let id = comment_id.to_string();
        let request = ApiRequest::get(locator.sub_resource(&["comments", id.as_str()]));
        let fetched: ApiComment = self.fetch_json("get comment", request).await?;
        Ok(fetched.into())
    }

    async fn comment_page(
        &self,
        locator: &PullRequestLocator,
        cursor: &PageCursor,
    ) -> Result<Page<Comment>, BitbucketError> {
        self.fetch_page::<ApiComment, Comment>(
            "list comments",
            locator.sub_resource(&["comments"]),
            cursor,
        )
        .await
    }

    async fn approve(&self, locator: &PullRequestLocator) -> Result<Participant, BitbucketError> {
        let request = ApiRequest::post(locator.sub_resource(&["approve"]), None);
        let participant: ApiParticipant = self.fetch_json("approve", request).await?;
        Ok(participant.into())
    }

    async fn unapprove(&self, locator: &PullRequestLocator) -> Result<(), BitbucketError> {
        let request = ApiRequest::delete(locator.sub_resource(&["approve"]));
        self.send("unapprove", request).await.map(|_| ())
    }

    async fn decline(
        &self,
        locator: &PullRequestLocator,
        request: &DeclineRequest,
    ) -> Result<PullRequest, BitbucketError> {
        let api_request = ApiRequest::post(
            locator.sub_resource(&["decline"]),
            Some(request.to_payload()),
        );
        let declined: ApiPullRequest = self.fetch_json("decline", api_request).await?;
        Ok(located(declined, locator.repository()))
    }

    async fn merge(
        &self,
        locator: &PullRequestLocator,
        request: &MergeRequest,
    ) -> Result<PullRequest, BitbucketError> {
        let api_request = ApiRequest::post(
            locator.sub_resource(&["merge"]),
            Some(request.to_payload()),
        );
        let merged: ApiPullRequest = self.fetch_json("merge", api_request).await?;
        Ok(located(merged, locator.repository()))
    }

    async fn diff(&self, locator: &PullRequestLocator) -> Result<String, BitbucketError> {
        let response = self
            .send("get diff", ApiRequest::get(locator.sub_resource(&["diff"])))
            .await?;
        Ok(response.body)
    }

    async fn diffstat_page(
        &self,
        locator: &PullRequestLocator,
        cursor: &PageCursor,
    ) -> Result<Page<DiffStat>, BitbucketError> {
        self.fetch_page::<ApiDiffStat, DiffStat>(
            "get diffstat",
            locator.sub_resource(&["diffstat"]),
            cursor,
        )
        .await
    }

    async fn activity_page(
        &self,
        locator: &PullRequestLocator,
        cursor: &PageCursor,
    ) -> Result<Page<Activity>, BitbucketError> {
        self.fetch_page::<ApiActivity, Activity>(
            "get activity",
            locator.sub_resource(&["activity"]),
            cursor,
        )
        .await
    }

    async fn current_user(&self) -> Result<UserIdentity, BitbucketError> {
        let request = ApiRequest::get(current_user_url(&self.api_base));
        let user: ApiUser = self.fetch_json("get current user", request).await?;
        Ok(user.into())
    }
}
