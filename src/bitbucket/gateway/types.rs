//! Parameter and result types for gateway operations.

use serde_json::{Map, Value, json};
use url::Url;

use crate::bitbucket::error::BitbucketError;
use crate::bitbucket::models::{InlineAnchor, MergeStrategy, PullRequestStatus};

/// A reviewer reference accepted by the create and update endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewerRef {
    /// Bitbucket UUID including braces, e.g. `{a1b2...}`.
    Uuid(String),
    /// Atlassian account id.
    AccountId(String),
}

impl ReviewerRef {
    /// Parses a CLI value: braced values are UUIDs, anything else an
    /// account id.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidArgument`] for blank input.
    pub fn parse(value: &str) -> Result<Self, BitbucketError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(BitbucketError::InvalidArgument {
                message: "reviewer reference must not be blank".to_owned(),
            });
        }
        if trimmed.starts_with('{') && trimmed.ends_with('}') {
            Ok(Self::Uuid(trimmed.to_owned()))
        } else {
            Ok(Self::AccountId(trimmed.to_owned()))
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Uuid(uuid) => json!({ "uuid": uuid }),
            Self::AccountId(account_id) => json!({ "account_id": account_id }),
        }
    }
}

fn branch(name: &str) -> Value {
    json!({ "branch": { "name": name } })
}

fn reviewers_json(reviewers: &[ReviewerRef]) -> Value {
    Value::Array(reviewers.iter().map(ReviewerRef::to_json).collect())
}

/// Parameters for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    /// Title.
    pub title: String,
    /// Branch with the changes.
    pub source_branch: String,
    /// Branch to merge into.
    pub destination_branch: String,
    /// Markdown description.
    pub description: Option<String>,
    /// Requested reviewers.
    pub reviewers: Vec<ReviewerRef>,
    /// Close the source branch once merged.
    pub close_source_branch: bool,
}

impl NewPullRequest {
    /// Request body for `POST .../pullrequests`.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "title": self.title,
            "description": self.description.as_deref().unwrap_or_default(),
            "source": branch(&self.source_branch),
            "destination": branch(&self.destination_branch),
            "close_source_branch": self.close_source_branch,
        });
        if !self.reviewers.is_empty()
            && let Some(object) = payload.as_object_mut()
        {
            object.insert("reviewers".to_owned(), reviewers_json(&self.reviewers));
        }
        payload
    }
}

/// Fields to change on an existing pull request. `None` leaves a field
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestUpdate {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New destination branch.
    pub destination_branch: Option<String>,
    /// Replacement reviewer list.
    pub reviewers: Option<Vec<ReviewerRef>>,
}

impl PullRequestUpdate {
    /// Returns true when no field would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.destination_branch.is_none()
            && self.reviewers.is_none()
    }

    /// Request body for `PUT .../pullrequests/{id}`.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        if let Some(title) = &self.title {
            payload.insert("title".to_owned(), Value::from(title.as_str()));
        }
        if let Some(description) = &self.description {
            payload.insert("description".to_owned(), Value::from(description.as_str()));
        }
        if let Some(destination) = &self.destination_branch {
            payload.insert("destination".to_owned(), branch(destination));
        }
        if let Some(reviewers) = &self.reviewers {
            payload.insert("reviewers".to_owned(), reviewers_json(reviewers));
        }
        Value::Object(payload)
    }
}

/// A comment to post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    /// Raw markdown content.
    pub content: String,
    /// Comment being replied to.
    pub parent_id: Option<u64>,
    /// Diff position for inline comments.
    pub inline: Option<InlineAnchor>,
}

impl NewComment {
    /// A top-level comment with the given content.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            parent_id: None,
            inline: None,
        }
    }

    /// Request body for `POST .../comments`.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("content".to_owned(), json!({ "raw": self.content }));
        if let Some(parent_id) = self.parent_id {
            payload.insert("parent".to_owned(), json!({ "id": parent_id }));
        }
        if let Some(inline) = &self.inline {
            payload.insert("inline".to_owned(), json!(inline));
        }
        Value::Object(payload)
    }
}

/// Parameters for declining a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclineRequest {
    /// Optional reason shown on the pull request.
    pub message: Option<String>,
}

impl DeclineRequest {
    /// Request body for `POST .../decline`.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        if let Some(message) = &self.message {
            payload.insert("message".to_owned(), Value::from(message.as_str()));
        }
        Value::Object(payload)
    }
}

/// Parameters for merging a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeRequest {
    /// Merge strategy.
    pub strategy: MergeStrategy,
    /// Merge commit message.
    pub message: Option<String>,
    /// Close the source branch after merging.
    pub close_source_branch: bool,
}

impl MergeRequest {
    /// Request body for `POST .../merge`.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert(
            "merge_strategy".to_owned(),
            Value::from(self.strategy.as_str()),
        );
        payload.insert(
            "close_source_branch".to_owned(),
            Value::from(self.close_source_branch),
        );
        if let Some(message) = &self.message {
            payload.insert("message".to_owned(), Value::from(message.as_str()));
        }
        Value::Object(payload)
    }
}

/// Filters applied when listing pull requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Only pull requests in this state. Bitbucket defaults to `OPEN`.
    pub state: Option<PullRequestStatus>,
    /// Author username.
    pub author: Option<String>,
    /// Destination branch name.
    pub destination_branch: Option<String>,
    /// Reviewer username.
    pub reviewer: Option<String>,
    /// Page size requested from the server.
    pub page_len: Option<u32>,
}

/// Quotes a value for a Bitbucket `q` filter expression.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

impl ListFilter {
    /// Builds the `q` expression, or `None` when no field needs one.
    ///
    /// # Example
    ///
    /// ```
    /// use bbpr::bitbucket::gateway::ListFilter;
    ///
    /// let filter = ListFilter {
    ///     author: Some("ada".to_owned()),
    ///     destination_branch: Some("main".to_owned()),
    ///     ..ListFilter::default()
    /// };
    /// assert_eq!(
    ///     filter.query_expression().as_deref(),
    ///     Some(r#"author.username = "ada" AND destination.branch.name = "main""#)
    /// );
    /// ```
    #[must_use]
    pub fn query_expression(&self) -> Option<String> {
        let clauses: Vec<String> = [
            ("author.username", self.author.as_deref()),
            ("destination.branch.name", self.destination_branch.as_deref()),
            ("reviewers.username", self.reviewer.as_deref()),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| format!("{field} = {}", quote(v))))
        .collect();

        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }

    /// Appends `state`, `q`, and `pagelen` to `url`.
    pub(crate) fn apply(&self, url: &mut Url) {
        let pairs: Vec<(&str, String)> = [
            ("state", self.state.map(|state| state.as_str().to_owned())),
            ("q", self.query_expression()),
            ("pagelen", self.page_len.map(|len| len.to_string())),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect();

        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
    }
}

/// Position within a paginated collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// The first page, built from the caller's parameters.
    First,
    /// A `next` link returned by the previous page.
    Next(Url),
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Link to the following page, if any.
    pub next: Option<Url>,
}
