//! Identity wrappers and endpoint construction for Bitbucket resources.

use url::Url;

use super::error::BitbucketError;
use super::models::PullRequest;

/// Default Bitbucket Cloud REST API base.
pub const DEFAULT_API_BASE: &str = "https://api.bitbucket.org/2.0";

/// Hosts serving Bitbucket Cloud pull request pages.
const WEB_HOSTS: [&str; 2] = ["bitbucket.org", "www.bitbucket.org"];

/// Workspace slug wrapper to avoid stringly typed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSlug(String);

impl WorkspaceSlug {
    /// Validates that the slug is non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidArgument`] for a blank slug.
    pub fn new(value: &str) -> Result<Self, BitbucketError> {
        non_blank(value, "workspace").map(Self)
    }

    /// Borrow the slug.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Repository slug wrapper to prevent parameter mix-ups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySlug(String);

impl RepositorySlug {
    /// Validates that the slug is non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidArgument`] for a blank slug.
    pub fn new(value: &str) -> Result<Self, BitbucketError> {
        non_blank(value, "repository").map(Self)
    }

    /// Borrow the slug.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Pull request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PullRequestId(u64);

impl PullRequestId {
    /// Validates that the identifier is positive.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidArgument`] for zero.
    pub fn new(value: u64) -> Result<Self, BitbucketError> {
        if value == 0 {
            return Err(invalid_number_text("0"));
        }
        Ok(Self(value))
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

fn non_blank(value: &str, what: &str) -> Result<String, BitbucketError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BitbucketError::InvalidArgument {
            message: format!("{what} is required"),
        });
    }
    Ok(trimmed.to_owned())
}

fn parse_api_base(api_base: &str) -> Result<Url, BitbucketError> {
    let parsed = Url::parse(api_base).map_err(|error| BitbucketError::Configuration {
        message: format!("invalid API base URL '{api_base}': {error}"),
    })?;
    if parsed.cannot_be_a_base() {
        return Err(BitbucketError::Configuration {
            message: format!("API base URL '{api_base}' cannot carry a path"),
        });
    }
    Ok(parsed)
}

/// Builds an endpoint URL by appending percent-encoded segments to `base`.
fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// A repository within a workspace, plus the API base it is served from.
///
/// # Example
///
/// ```
/// use bbpr::bitbucket::locator::RepositoryLocator;
///
/// let locator = RepositoryLocator::new("https://api.bitbucket.org/2.0", "acme", "widgets")
///     .expect("locator should build");
/// assert_eq!(
///     locator.pull_requests_url().as_str(),
///     "https://api.bitbucket.org/2.0/repositories/acme/widgets/pullrequests"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLocator {
    api_base: Url,
    workspace: WorkspaceSlug,
    repository: RepositorySlug,
}

impl RepositoryLocator {
    /// Creates a locator from an API base and slugs.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Configuration`] for an unusable API base or
    /// [`BitbucketError::InvalidArgument`] for blank slugs.
    pub fn new(api_base: &str, workspace: &str, repository: &str) -> Result<Self, BitbucketError> {
        Ok(Self {
            api_base: parse_api_base(api_base)?,
            workspace: WorkspaceSlug::new(workspace)?,
            repository: RepositorySlug::new(repository)?,
        })
    }

    /// API base URL.
    #[must_use]
    pub const fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Workspace slug.
    #[must_use]
    pub const fn workspace(&self) -> &WorkspaceSlug {
        &self.workspace
    }

    /// Repository slug.
    #[must_use]
    pub const fn repository(&self) -> &RepositorySlug {
        &self.repository
    }

    /// Addresses a pull request within this repository.
    #[must_use]
    pub fn pull_request(&self, id: PullRequestId) -> PullRequestLocator {
        PullRequestLocator {
            repository: self.clone(),
            id,
        }
    }

    /// Returns the collection URL for pull requests.
    #[must_use]
    pub fn pull_requests_url(&self) -> Url {
        endpoint(
            &self.api_base,
            &[
                "repositories",
                self.workspace.as_str(),
                self.repository.as_str(),
                "pullrequests",
            ],
        )
    }
}

/// A single pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestLocator {
    repository: RepositoryLocator,
    id: PullRequestId,
}

impl PullRequestLocator {
    /// Creates a locator from an API base, slugs, and a numeric id.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`RepositoryLocator::new`], plus
    /// [`BitbucketError::InvalidArgument`] when `id` is zero.
    pub fn new(
        api_base: &str,
        workspace: &str,
        repository: &str,
        id: u64,
    ) -> Result<Self, BitbucketError> {
        let repository_locator = RepositoryLocator::new(api_base, workspace, repository)?;
        Ok(repository_locator.pull_request(PullRequestId::new(id)?))
    }

    /// Parses a browser URL such as
    /// `https://bitbucket.org/<workspace>/<repo>/pull-requests/<id>`.
    ///
    /// Trailing segments (`/diff`, `/overview`) are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidArgument`] when the URL is not on
    /// `bitbucket.org`, does not have that shape, or the id is not a positive
    /// integer.
    pub fn parse_web_url(input: &str, api_base: &str) -> Result<Self, BitbucketError> {
        let shape_error = || BitbucketError::InvalidArgument {
            message: format!(
                "pull request URL must match /<workspace>/<repo>/pull-requests/<id>: {input}"
            ),
        };
        let parsed = Url::parse(input).map_err(|_| shape_error())?;
        let host = parsed.host_str().unwrap_or_default();
        if !WEB_HOSTS.contains(&host) {
            return Err(BitbucketError::InvalidArgument {
                message: format!("pull request URL must be on bitbucket.org, got host '{host}'"),
            });
        }
        let mut segments = parsed.path_segments().ok_or_else(shape_error)?;

        let workspace = segments.next().ok_or_else(shape_error)?;
        let repository = segments.next().ok_or_else(shape_error)?;
        let marker = segments.next().ok_or_else(shape_error)?;
        let number = segments.next().ok_or_else(shape_error)?;

        if marker != "pull-requests" || number.is_empty() {
            return Err(shape_error());
        }

        let id = number
            .parse::<u64>()
            .map_err(|_| invalid_number_text(number))?;
        Self::new(api_base, workspace, repository, id)
    }

    /// Repository containing the pull request.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryLocator {
        &self.repository
    }

    /// Pull request identifier.
    #[must_use]
    pub const fn id(&self) -> PullRequestId {
        self.id
    }

    /// Returns true when `snapshot` describes this pull request.
    #[must_use]
    pub fn identifies(&self, snapshot: &PullRequest) -> bool {
        snapshot.is_identified_by(
            self.repository.workspace.as_str(),
            self.repository.repository.as_str(),
            self.id.get(),
        )
    }

    /// URL of the pull request resource.
    #[must_use]
    pub fn url(&self) -> Url {
        self.sub_resource(&[])
    }

    /// URL of a sub-resource such as `comments` or `approve`.
    #[must_use]
    pub fn sub_resource(&self, segments: &[&str]) -> Url {
        let id = self.id.get().to_string();
        let mut full = vec![
            "repositories",
            self.repository.workspace.as_str(),
            self.repository.repository.as_str(),
            "pullrequests",
            id.as_str(),
        ];
        full.extend_from_slice(segments);
        endpoint(&self.repository.api_base, &full)
    }
}

fn invalid_number_text(value: &str) -> BitbucketError {
    BitbucketError::InvalidArgument {
        message: format!("pull request id must be a positive integer, got '{value}'"),
    }
}

/// URL of the authenticated user's profile endpoint.
#[must_use]
pub fn current_user_url(api_base: &Url) -> Url {
    endpoint(api_base, &["user"])
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{DEFAULT_API_BASE, PullRequestLocator, RepositoryLocator};
    use crate::bitbucket::error::BitbucketError;

    #[rstest]
    fn builds_pull_request_urls() {
        let locator = PullRequestLocator::new(DEFAULT_API_BASE, "acme", "widgets", 42)
            .expect("locator should build");

        assert_eq!(
            locator.url().as_str(),
            "https://api.bitbucket.org/2.0/repositories/acme/widgets/pullrequests/42"
        );
        assert_eq!(
            locator.sub_resource(&["approve"]).as_str(),
            "https://api.bitbucket.org/2.0/repositories/acme/widgets/pullrequests/42/approve"
        );
    }

    #[rstest]
    fn tolerates_trailing_slash_on_api_base() {
        let locator = RepositoryLocator::new("http://127.0.0.1:8080/", "acme", "widgets")
            .expect("locator should build");

        assert_eq!(
            locator.pull_requests_url().as_str(),
            "http://127.0.0.1:8080/repositories/acme/widgets/pullrequests"
        );
    }

    #[rstest]
    fn percent_encodes_slug_segments() {
        let locator = RepositoryLocator::new(DEFAULT_API_BASE, "acme", "../admin")
            .expect("locator should build");

        assert!(
            locator.pull_requests_url().path().contains("..%2Fadmin"),
            "slug should be encoded as one segment: {}",
            locator.pull_requests_url()
        );
    }

    #[rstest]
    fn parses_web_url_with_trailing_segments() {
        let locator = PullRequestLocator::parse_web_url(
            "https://bitbucket.org/acme/widgets/pull-requests/12/diff",
            DEFAULT_API_BASE,
        )
        .expect("web URL should parse");

        assert_eq!(locator.repository().workspace().as_str(), "acme");
        assert_eq!(locator.repository().repository().as_str(), "widgets");
        assert_eq!(locator.id().get(), 12);
    }

    #[rstest]
    #[case::wrong_marker("https://bitbucket.org/acme/widgets/pull/12")]
    #[case::missing_number("https://bitbucket.org/acme/widgets/pull-requests/")]
    #[case::not_a_url("acme/widgets/pull-requests/12")]
    #[case::non_numeric("https://bitbucket.org/acme/widgets/pull-requests/abc")]
    #[case::zero("https://bitbucket.org/acme/widgets/pull-requests/0")]
    #[case::foreign_host("https://evil.example/acme/widgets/pull-requests/1")]
    #[case::lookalike_host("https://bitbucket.org.evil.example/acme/widgets/pull-requests/1")]
    fn rejects_malformed_web_urls(#[case] input: &str) {
        let result = PullRequestLocator::parse_web_url(input, DEFAULT_API_BASE);

        assert!(
            matches!(result, Err(BitbucketError::InvalidArgument { .. })),
            "expected InvalidArgument for {input}, got {result:?}"
        );
    }

    #[rstest]
    fn rejects_blank_workspace() {
        let result = RepositoryLocator::new(DEFAULT_API_BASE, " ", "widgets");

        assert!(matches!(result, Err(BitbucketError::InvalidArgument { .. })));
    }

    #[rstest]
    fn rejects_unusable_api_base() {
        let result = RepositoryLocator::new("not a url", "acme", "widgets");

        assert!(matches!(result, Err(BitbucketError::Configuration { .. })));
    }
}
