//! Application configuration loaded from files and the environment.
//!
//! Values are merged with ortho-config's layered approach. Command-line
//! flags are parsed separately by the binary and override what is loaded
//! here.
//!
//! # Precedence
//!
//! Configuration values are loaded with the following precedence (lowest to
//! highest):
//!
//! 1. **Defaults** – Built-in application defaults
//! 2. **Configuration file** – `.bbpr.toml` in the current directory, home
//!    directory, or `bbpr.toml` in the XDG config directory
//! 3. **Environment variables** – `BBPR_WORKSPACE`, `BBPR_TOKEN`, and so on
//!
//! Bitbucket's own variables (`BITBUCKET_REPO_TOKEN` and friends) are read by
//! the credential resolver as a separate, higher layer.
//!
//! # Configuration File
//!
//! ```toml
//! workspace = "acme"
//! repo = "widgets"
//! username = "ada"
//! app_password = "app-password"
//! timeout_seconds = 30
//! max_attempts = 4
//! merge_strategy = "squash"
//! default_reviewers = ["{a1b2c3}", "557058:grace"]
//! ```

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

use crate::bitbucket::credential::CredentialLayer;
use crate::bitbucket::error::BitbucketError;
use crate::bitbucket::locator::{DEFAULT_API_BASE, RepositoryLocator};
use crate::bitbucket::models::MergeStrategy;
use crate::bitbucket::transport::RetryPolicy;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_MAX_ATTEMPTS: u32 = 4;
const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;
const DEFAULT_MAX_RETRY_AFTER_SECONDS: u64 = 60;
const DEFAULT_DESTINATION_BRANCH: &str = "main";

/// Application configuration supporting file and environment sources.
///
/// # Example
///
/// ```no_run
/// use bbpr::BbprConfig;
///
/// let config = BbprConfig::load_layers().expect("failed to load configuration");
/// let policy = config.retry_policy();
/// assert!(policy.max_attempts() >= 1);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig)]
#[serde(default)]
#[ortho_config(
    prefix = "BBPR",
    discovery(
        dotfile_name = ".bbpr.toml",
        config_file_name = "bbpr.toml",
        app_name = "bbpr"
    )
)]
pub struct BbprConfig {
    /// Default workspace slug.
    ///
    /// Can be provided via:
    /// - Environment: `BBPR_WORKSPACE`
    /// - Config file: `workspace = "..."`
    #[ortho_config()]
    pub workspace: Option<String>,

    /// Default repository slug.
    #[ortho_config()]
    pub repo: Option<String>,

    /// Repository access token or OAuth token.
    #[ortho_config()]
    pub token: Option<String>,

    /// Bitbucket username for app-password authentication.
    #[ortho_config()]
    pub username: Option<String>,

    /// App password paired with `username`.
    #[ortho_config()]
    pub app_password: Option<String>,

    /// REST API base URL. Override for testing or a proxy.
    #[ortho_config(cli_short = 'A')]
    pub api_base_url: String,

    /// Per-attempt HTTP timeout.
    #[ortho_config(cli_short = 'T')]
    pub timeout_seconds: u64,

    /// Total attempts per request, including the first.
    #[ortho_config()]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    #[ortho_config()]
    pub base_delay_ms: u64,

    /// Exponential growth factor between retries.
    #[ortho_config(cli_short = 'B')]
    pub backoff_multiplier: u32,

    /// Upper bound on a server-requested `Retry-After` wait.
    #[ortho_config(cli_short = 'M')]
    pub max_retry_after_seconds: u64,

    /// Destination branch used by `create` when none is given.
    #[ortho_config()]
    pub default_destination_branch: String,

    /// Merge strategy used by `merge` when none is given.
    ///
    /// One of `merge_commit`, `squash`, or `fast_forward`.
    #[ortho_config(cli_short = 's')]
    pub merge_strategy: String,

    /// Reviewers added to every pull request opened with `create`.
    ///
    /// Each entry is a braced UUID or an Atlassian account id.
    #[ortho_config(cli_short = 'R')]
    pub default_reviewers: Vec<String>,

    /// Whether `create` and `merge` close the source branch by default.
    ///
    /// Note: ortho-config does not load boolean values from the environment,
    /// so set this in a config file.
    #[ortho_config()]
    pub close_source_branch: bool,
}

impl Default for BbprConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            repo: None,
            token: None,
            username: None,
            app_password: None,
            api_base_url: DEFAULT_API_BASE.to_owned(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_retry_after_seconds: DEFAULT_MAX_RETRY_AFTER_SECONDS,
            default_destination_branch: DEFAULT_DESTINATION_BRANCH.to_owned(),
            merge_strategy: MergeStrategy::default().as_str().to_owned(),
            default_reviewers: Vec::new(),
            close_source_branch: true,
        }
    }
}

impl BbprConfig {
    /// Loads defaults, discovered config files, and `BBPR_*` variables.
    ///
    /// Command-line arguments are not consulted here.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Configuration`] when a file cannot be parsed
    /// or the merged values are invalid.
    pub fn load_layers() -> Result<Self, BitbucketError> {
        let config = Self::load_from_iter(["bb-pr"]).map_err(|error| {
            BitbucketError::Configuration {
                message: error.to_string(),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would otherwise fail later in surprising ways.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Configuration`] for a zero timeout, zero
    /// attempts, or an unknown merge strategy.
    pub fn validate(&self) -> Result<(), BitbucketError> {
        if self.timeout_seconds == 0 {
            return Err(BitbucketError::Configuration {
                message: "timeout_seconds must be greater than zero".to_owned(),
            });
        }
        if self.max_attempts == 0 {
            return Err(BitbucketError::Configuration {
                message: "max_attempts must be at least 1".to_owned(),
            });
        }
        self.merge_strategy().map(|_| ())
    }

    /// Per-attempt HTTP timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Retry policy built from the configured attempt budget and delays.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
            .with_backoff_multiplier(self.backoff_multiplier)
            .with_max_retry_after(Duration::from_secs(self.max_retry_after_seconds))
    }

    /// Credential material from this layer for the resolver.
    #[must_use]
    pub fn credential_layer(&self) -> CredentialLayer {
        CredentialLayer {
            token: self.token.clone(),
            oauth_token: None,
            username: self.username.clone(),
            app_password: self.app_password.clone(),
        }
    }

    /// Parsed default merge strategy.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Configuration`] for an unknown strategy.
    pub fn merge_strategy(&self) -> Result<MergeStrategy, BitbucketError> {
        self.merge_strategy
            .parse()
            .map_err(|error: BitbucketError| BitbucketError::Configuration {
                message: format!("merge_strategy: {error}"),
            })
    }

    /// Resolves the target repository, preferring explicit overrides.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Configuration`] when the workspace or
    /// repository is missing from both the overrides and the config, or the
    /// errors of [`RepositoryLocator::new`].
    pub fn require_repository(
        &self,
        workspace: Option<&str>,
        repo: Option<&str>,
    ) -> Result<RepositoryLocator, BitbucketError> {
        let chosen_workspace = workspace.or(self.workspace.as_deref());
        let chosen_repo = repo.or(self.repo.as_deref());
        match (chosen_workspace, chosen_repo) {
            (Some(ws), Some(slug)) => RepositoryLocator::new(&self.api_base_url, ws, slug),
            (None, _) => Err(BitbucketError::Configuration {
                message: "workspace is required (use --workspace or -w)".to_owned(),
            }),
            (_, None) => Err(BitbucketError::Configuration {
                message: "repository is required (use --repo or -r)".to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests;
