//! Bitbucket Cloud pull request client.
//!
//! Layers, leaf first: [`credential`] resolves exactly one credential from
//! flags, environment, and config; [`transport`] sends requests with that
//! credential and retries transient failures; [`gateway`] maps each REST
//! endpoint to a typed call and classifies errors; [`actions`] enforces
//! pull request state rules before writes.

pub mod actions;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod locator;
pub mod models;
pub mod template;
pub mod transport;

pub use actions::{ActionOutcome, ActionRequest, PullRequestActions, check_precondition};
pub use credential::{AccessToken, AppPassword, Credential, CredentialLayer, CredentialSources};
pub use error::{ActionKind, BitbucketError, ErrorKind};
pub use gateway::{BitbucketGateway, PullRequestGateway};
pub use locator::{PullRequestId, PullRequestLocator, RepositoryLocator};
pub use models::{
    Activity, Comment, MergeStrategy, Participant, PullRequest, PullRequestStatus,
    resolve_author,
};
pub use transport::{HttpTransport, ReqwestTransport, RetryPolicy, RetryingTransport};

#[cfg(test)]
pub use gateway::MockPullRequestGateway;
#[cfg(test)]
pub use transport::MockHttpTransport;
