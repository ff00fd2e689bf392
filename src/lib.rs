//! bbpr library crate for managing Bitbucket Cloud pull requests.
//!
//! The library resolves credentials, sends authenticated and retried
//! requests to the Bitbucket REST API v2.0, and enforces which actions are
//! legal for a pull request's current status. The `bb-pr` binary is a thin
//! shell over these pieces.

pub mod bitbucket;
pub mod config;

pub use bitbucket::{
    ActionKind, ActionOutcome, ActionRequest, Activity, BitbucketError, BitbucketGateway, Credential,
    CredentialSources, ErrorKind, PullRequest, PullRequestActions, PullRequestGateway,
    PullRequestLocator, PullRequestStatus, RepositoryLocator, RetryPolicy,
};
pub use config::BbprConfig;
