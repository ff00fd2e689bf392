//! Pull request description templates.
//!
//! A template is a plain text or markdown file. Its first line is the title,
//! with any leading `#` heading markers removed; everything after it is the
//! description.

use std::fs;
use std::path::Path;

use super::error::BitbucketError;

/// Title and description read from a template file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestTemplate {
    /// First line of the template.
    pub title: String,
    /// Remaining lines, trimmed.
    pub description: String,
}

impl PullRequestTemplate {
    /// Splits template text into title and description.
    ///
    /// # Example
    ///
    /// ```
    /// use bbpr::bitbucket::template::PullRequestTemplate;
    ///
    /// let template = PullRequestTemplate::parse("# Add retries\n\nRetries 503s.\n");
    /// assert_eq!(template.title, "Add retries");
    /// assert_eq!(template.description, "Retries 503s.");
    /// ```
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let trimmed = content.trim();
        let (first, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
        Self {
            title: first.trim_start_matches(['#', ' ']).trim().to_owned(),
            description: rest.trim().to_owned(),
        }
    }

    /// Reads and parses the template at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidArgument`] when the file cannot be
    /// read.
    pub fn load(path: &Path) -> Result<Self, BitbucketError> {
        let content =
            fs::read_to_string(path).map_err(|error| BitbucketError::InvalidArgument {
                message: format!("failed to load template {}: {error}", path.display()),
            })?;
        Ok(Self::parse(&content))
    }
}
