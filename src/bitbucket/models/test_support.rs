//! JSON fixture builders for Bitbucket payloads.
//!
//! These helpers produce the wire shapes Bitbucket returns so tests can mount
//! them on a mock server without repeating the nesting by hand.
//!
//! # Examples
//!
//! ```
//! use bbpr::bitbucket::models::test_support::pull_request_json;
//!
//! let payload = pull_request_json(42, "OPEN");
//! assert_eq!(payload["id"], 42);
//! assert_eq!(payload["state"], "OPEN");
//! ```

use serde_json::{Value, json};

use super::{PullRequest, PullRequestStatus};

/// Builds a domain pull request snapshot, matching [`pull_request_json`].
#[must_use]
pub fn pull_request(id: u64, status: PullRequestStatus) -> PullRequest {
    PullRequest {
        workspace: "acme".to_owned(),
        repo_slug: "widgets".to_owned(),
        id,
        title: format!("Pull request {id}"),
        description: String::new(),
        source_branch: format!("feature/{id}"),
        destination_branch: "main".to_owned(),
        status,
        author: "Ada Lovelace".to_owned(),
        reviewers: Vec::new(),
        created_on: None,
        updated_on: None,
        html_url: Some(format!("https://bitbucket.org/acme/widgets/pull-requests/{id}")),
        close_source_branch: false,
        merge_commit: None,
        comment_count: 0,
        task_count: 0,
    }
}

/// Builds a pull request payload with the given id and state.
///
/// The author carries both `display_name` and `nickname`; use
/// [`pull_request_json_with_author`] to exercise other shapes.
#[must_use]
pub fn pull_request_json(id: u64, state: &str) -> Value {
    pull_request_json_with_author(
        id,
        state,
        json!({ "display_name": "Ada Lovelace", "nickname": "ada", "uuid": "{ada}" }),
    )
}

/// Builds a pull request payload with a caller-supplied author object.
#[must_use]
pub fn pull_request_json_with_author(id: u64, state: &str, author: Value) -> Value {
    json!({
        "type": "pullrequest",
        "id": id,
        "title": format!("Pull request {id}"),
        "description": "",
        "state": state,
        "author": author,
        "source": { "branch": { "name": format!("feature/{id}") } },
        "destination": {
            "branch": { "name": "main" },
            "repository": { "full_name": "acme/widgets" }
        },
        "reviewers": [],
        "participants": [],
        "created_on": "2025-01-01T00:00:00.000000+00:00",
        "updated_on": "2025-01-02T00:00:00.000000+00:00",
        "links": {
            "html": { "href": format!("https://bitbucket.org/acme/widgets/pull-requests/{id}") }
        },
        "close_source_branch": false,
        "comment_count": 0,
        "task_count": 0
    })
}

/// Builds a comment payload with the given id and raw content.
#[must_use]
pub fn comment_json(id: u64, raw: &str) -> Value {
    json!({
        "type": "pullrequest_comment",
        "id": id,
        "content": { "raw": raw, "markup": "markdown", "html": format!("<p>{raw}</p>") },
        "user": { "display_name": "Grace Hopper", "nickname": "grace" },
        "created_on": "2025-01-03T00:00:00.000000+00:00",
        "deleted": false
    })
}

/// Builds a participant payload as returned by the approve endpoint.
#[must_use]
pub fn participant_json(display_name: &str, approved: bool) -> Value {
    json!({
        "type": "participant",
        "user": { "display_name": display_name, "uuid": format!("{{{display_name}}}") },
        "role": "REVIEWER",
        "approved": approved,
        "state": if approved { Value::from("approved") } else { Value::Null }
    })
}

/// Builds an activity entry recording an update to the given state.
#[must_use]
pub fn update_activity_json(state: &str) -> Value {
    json!({
        "update": {
            "state": state,
            "title": "Pull request 42",
            "author": { "display_name": "Ada Lovelace" },
            "date": "2025-01-02T00:00:00.000000+00:00"
        }
    })
}

/// Builds an activity entry recording an approval.
#[must_use]
pub fn approval_activity_json(display_name: &str) -> Value {
    json!({
        "approval": {
            "user": { "display_name": display_name },
            "date": "2025-01-03T00:00:00.000000+00:00"
        }
    })
}

/// Builds an activity entry wrapping a comment.
#[must_use]
pub fn comment_activity_json(id: u64, raw: &str) -> Value {
    json!({ "comment": comment_json(id, raw) })
}

/// Wraps values in a paginated envelope with an optional `next` link.
#[must_use]
pub fn page_json(values: Vec<Value>, next: Option<&str>) -> Value {
    let size = values.len();
    let mut page = json!({
        "values": values,
        "pagelen": 10,
        "size": size,
        "page": 1
    });
    if let (Some(link), Some(object)) = (next, page.as_object_mut()) {
        object.insert("next".to_owned(), Value::from(link));
    }
    page
}

/// Builds a Bitbucket error envelope.
#[must_use]
pub fn error_json(message: &str) -> Value {
    json!({ "type": "error", "error": { "message": message } })
}
