//! Credential resolution across explicit flags, environment, and config.
//!
//! Resolution is pure: callers hand in whatever raw strings their sources
//! produced and receive exactly one [`Credential`]. Nothing here reads the
//! process environment directly; [`CredentialLayer::from_lookup`] takes an
//! injected lookup function instead.

use std::fmt;

use super::error::BitbucketError;

/// Environment variable holding a repository access token.
pub const REPO_TOKEN_VAR: &str = "BITBUCKET_REPO_TOKEN";
/// Environment variable holding a workspace or OAuth bearer token.
pub const OAUTH_TOKEN_VAR: &str = "BITBUCKET_OAUTH_TOKEN";
/// Environment variable holding the username for app-password auth.
pub const USERNAME_VAR: &str = "BITBUCKET_USERNAME";
/// Environment variable holding the app password.
pub const APP_PASSWORD_VAR: &str = "BITBUCKET_APP_PASSWORD";

/// Bearer token wrapper enforcing a non-blank value.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Validates that the token is non-empty and trims whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Credential`] when the supplied string is
    /// blank.
    pub fn new(token: impl AsRef<str>) -> Result<Self, BitbucketError> {
        let trimmed = token.as_ref().trim();
        if trimmed.is_empty() {
            return Err(BitbucketError::Credential {
                message: "access token is empty".to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the token value.
    #[must_use]
    pub const fn value(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// App password wrapper; never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AppPassword(String);

impl AppPassword {
    /// Validates that the app password is non-blank. Whitespace is kept, as
    /// it may be part of the secret.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Credential`] for a blank secret.
    pub fn new(secret: impl Into<String>) -> Result<Self, BitbucketError> {
        let value = secret.into();
        if value.trim().is_empty() {
            return Err(BitbucketError::Credential {
                message: "app password is empty".to_owned(),
            });
        }
        Ok(Self(value))
    }

    /// Borrow the secret value.
    #[must_use]
    pub const fn value(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for AppPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AppPassword(<redacted>)")
    }
}

/// A resolved Bitbucket credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Repository access token or OAuth token sent as `Bearer`.
    Token(AccessToken),
    /// Username and app password sent as HTTP Basic.
    Basic {
        /// Bitbucket username.
        username: String,
        /// App password.
        secret: AppPassword,
    },
}

impl Credential {
    /// Attaches this credential to an outgoing request.
    #[must_use]
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Token(token) => request.bearer_auth(token.value()),
            Self::Basic { username, secret } => request.basic_auth(username, Some(secret.value())),
        }
    }

    /// Short label naming the authentication scheme, safe to log.
    #[must_use]
    pub const fn scheme(&self) -> &'static str {
        match self {
            Self::Token(_) => "bearer",
            Self::Basic { .. } => "basic",
        }
    }
}

/// Raw credential material gathered from one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialLayer {
    /// Repository access token.
    pub token: Option<String>,
    /// Secondary bearer token (OAuth or workspace token).
    pub oauth_token: Option<String>,
    /// Username for app-password authentication.
    pub username: Option<String>,
    /// App password paired with `username`.
    pub app_password: Option<String>,
}

impl CredentialLayer {
    /// Builds a layer from the conventional `BITBUCKET_*` variables using the
    /// supplied lookup.
    ///
    /// # Example
    ///
    /// ```
    /// use bbpr::bitbucket::credential::CredentialLayer;
    ///
    /// let layer = CredentialLayer::from_lookup(|name| {
    ///     (name == "BITBUCKET_REPO_TOKEN").then(|| "secret".to_owned())
    /// });
    /// assert_eq!(layer.token.as_deref(), Some("secret"));
    /// assert!(layer.username.is_none());
    /// ```
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            token: lookup(REPO_TOKEN_VAR),
            oauth_token: lookup(OAUTH_TOKEN_VAR),
            username: lookup(USERNAME_VAR),
            app_password: lookup(APP_PASSWORD_VAR),
        }
    }

    fn resolve(&self, source: &str) -> Result<Option<Credential>, BitbucketError> {
        for (name, token) in [("token", &self.token), ("OAuth token", &self.oauth_token)] {
            if let Some(value) = token {
                return token_credential(value, &format!("{source} {name}")).map(Some);
            }
        }

        Ok(basic_credential(
            self.username.as_deref(),
            self.app_password.as_deref(),
        ))
    }
}

/// All credential sources for one invocation, highest precedence first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSources {
    /// Token supplied on the command line.
    pub explicit_token: Option<String>,
    /// Username supplied on the command line.
    pub explicit_username: Option<String>,
    /// App password supplied on the command line.
    pub explicit_app_password: Option<String>,
    /// Values read from `BITBUCKET_*` environment variables.
    pub environment: CredentialLayer,
    /// Values from the configuration file layer.
    pub config: CredentialLayer,
}

fn token_credential(value: &str, source: &str) -> Result<Credential, BitbucketError> {
    AccessToken::new(value)
        .map(Credential::Token)
        .map_err(|_| BitbucketError::Credential {
            message: format!("{source} is set but empty"),
        })
}

fn basic_credential(username: Option<&str>, secret: Option<&str>) -> Option<Credential> {
    let user = username.map(str::trim).filter(|value| !value.is_empty())?;
    let password = AppPassword::new(secret?).ok()?;
    Some(Credential::Basic {
        username: user.to_owned(),
        secret: password,
    })
}

/// Resolves exactly one credential from the layered sources.
///
/// Precedence, highest first: explicit token, explicit username and app
/// password, environment layer, config layer. Within a layer a token beats a
/// username/app-password pair. Incomplete pairs are skipped.
///
/// # Errors
///
/// Returns [`BitbucketError::Credential`] when the winning token is blank or
/// when no source yields a complete credential.
pub fn resolve(sources: &CredentialSources) -> Result<Credential, BitbucketError> {
    if let Some(token) = sources.explicit_token.as_deref() {
        return token_credential(token, "--token");
    }

    if let Some(credential) = basic_credential(
        sources.explicit_username.as_deref(),
        sources.explicit_app_password.as_deref(),
    ) {
        return Ok(credential);
    }

    if let Some(credential) = sources.environment.resolve("environment")? {
        return Ok(credential);
    }

    if let Some(credential) = sources.config.resolve("config")? {
        return Ok(credential);
    }

    Err(BitbucketError::Credential {
        message: format!(
            "set {REPO_TOKEN_VAR}, pass --token, or configure username and app_password"
        ),
    })
}
