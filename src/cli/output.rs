//! Output formatting for CLI commands.
//!
//! Every writer takes an explicit `Write` so tests can capture output in a
//! buffer. Text output is meant for people; JSON output is stable for
//! scripts and agents.

use std::io::{self, Write};

use bbpr::bitbucket::models::{Activity, Comment, DiffStat, Participant, UserIdentity};
use bbpr::{ActionOutcome, BitbucketError, PullRequest};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

/// How command results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable lines.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Converts an I/O error to a [`BitbucketError::Io`].
pub fn io_error(error: &io::Error) -> BitbucketError {
    BitbucketError::Io {
        message: error.to_string(),
    }
}

fn write_json<W: Write, T: Serialize + ?Sized>(
    writer: &mut W,
    value: &T,
) -> Result<(), BitbucketError> {
    serde_json::to_writer_pretty(&mut *writer, value).map_err(|error| BitbucketError::Io {
        message: error.to_string(),
    })?;
    writeln!(writer).map_err(|e| io_error(&e))
}

/// Writes the result of a pull request action.
pub fn write_outcome_to<W: Write>(
    writer: &mut W,
    format: OutputFormat,
    outcome: &ActionOutcome,
) -> Result<(), BitbucketError> {
    if format == OutputFormat::Json {
        return match outcome {
            ActionOutcome::Created(pr)
            | ActionOutcome::Shown(pr)
            | ActionOutcome::Declined(pr)
            | ActionOutcome::Merged(pr) => write_json(writer, pr),
            ActionOutcome::Listed(prs) => write_json(writer, prs),
            ActionOutcome::Commented(comment) => write_json(writer, comment),
            ActionOutcome::Approved(participant) => write_json(writer, participant),
            ActionOutcome::Unapproved => write_json(writer, &json!({ "approved": false })),
        };
    }

    match outcome {
        ActionOutcome::Created(pr) => {
            writeln!(writer, "Created pull request #{}", pr.id).map_err(|e| io_error(&e))?;
            write_pull_request_text(writer, pr)
        }
        ActionOutcome::Shown(pr) => write_pull_request_text(writer, pr),
        ActionOutcome::Listed(prs) => write_listing_text(writer, prs),
        ActionOutcome::Commented(comment) => {
            writeln!(writer, "Added comment {}", comment.id).map_err(|e| io_error(&e))
        }
        ActionOutcome::Approved(participant) => write_approval_text(writer, participant),
        ActionOutcome::Unapproved => writeln!(writer, "Approval removed").map_err(|e| io_error(&e)),
        ActionOutcome::Declined(pr) => {
            writeln!(writer, "Declined pull request #{}", pr.id).map_err(|e| io_error(&e))
        }
        ActionOutcome::Merged(pr) => {
            let commit = pr.merge_commit.as_deref().unwrap_or("unknown commit");
            writeln!(writer, "Merged pull request #{} ({commit})", pr.id).map_err(|e| io_error(&e))
        }
    }
}

fn write_approval_text<W: Write>(
    writer: &mut W,
    participant: &Participant,
) -> Result<(), BitbucketError> {
    writeln!(writer, "Approved as {}", participant.display_name).map_err(|e| io_error(&e))
}

fn reviewer_label(reviewer: &Participant) -> String {
    if reviewer.approved {
        format!("{} (approved)", reviewer.display_name)
    } else {
        reviewer.display_name.clone()
    }
}

/// Writes the detail view of one pull request.
pub fn write_pull_request_text<W: Write>(
    writer: &mut W,
    pr: &PullRequest,
) -> Result<(), BitbucketError> {
    let reviewers = if pr.reviewers.is_empty() {
        "none".to_owned()
    } else {
        pr.reviewers
            .iter()
            .map(reviewer_label)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let url = pr.html_url.as_deref().unwrap_or("no HTML URL provided");

    let mut lines = vec![
        format!("#{} [{}] {}", pr.id, pr.status, pr.title),
        format!("Author: {}", pr.author),
        format!("Branch: {} -> {}", pr.source_branch, pr.destination_branch),
        format!("Reviewers: {reviewers}"),
        format!(
            "Approvals: {}/{}",
            pr.approval_count(),
            pr.reviewers.len()
        ),
        format!("Comments: {}  Tasks: {}", pr.comment_count, pr.task_count),
    ];
    if let Some(created) = pr.created_on {
        lines.push(format!("Created: {}", created.to_rfc3339()));
    }
    if let Some(updated) = pr.updated_on {
        lines.push(format!("Updated: {}", updated.to_rfc3339()));
    }
    lines.push(format!("URL: {url}"));

    for line in lines {
        writeln!(writer, "{line}").map_err(|e| io_error(&e))?;
    }
    if !pr.description.is_empty() {
        writeln!(writer).map_err(|e| io_error(&e))?;
        writeln!(writer, "{}", pr.description).map_err(|e| io_error(&e))?;
    }
    Ok(())
}

/// Writes one line per pull request followed by a count.
pub fn write_listing_text<W: Write>(
    writer: &mut W,
    prs: &[PullRequest],
) -> Result<(), BitbucketError> {
    if prs.is_empty() {
        return writeln!(writer, "No pull requests found.").map_err(|e| io_error(&e));
    }

    for pr in prs {
        writeln!(
            writer,
            "  #{} [{}] {} ({}) {} -> {}",
            pr.id, pr.status, pr.title, pr.author, pr.source_branch, pr.destination_branch
        )
        .map_err(|e| io_error(&e))?;
    }
    writeln!(writer).map_err(|e| io_error(&e))?;
    writeln!(writer, "{} pull request(s)", prs.len()).map_err(|e| io_error(&e))
}

/// Writes a comment thread listing.
pub fn write_comments_to<W: Write>(
    writer: &mut W,
    format: OutputFormat,
    comments: &[Comment],
) -> Result<(), BitbucketError> {
    if format == OutputFormat::Json {
        return write_json(writer, comments);
    }
    if comments.is_empty() {
        return writeln!(writer, "No comments.").map_err(|e| io_error(&e));
    }

    for comment in comments {
        let mut header = format!("[{}] {}", comment.id, comment.author);
        if let Some(parent) = comment.parent_id {
            header.push_str(&format!(" (reply to {parent})"));
        }
        if let Some(inline) = &comment.inline {
            let location = inline.to.or(inline.from).map_or_else(
                || inline.path.clone(),
                |number| format!("{}:{number}", inline.path),
            );
            header.push_str(&format!(" on {location}"));
        }
        writeln!(writer, "{header}").map_err(|e| io_error(&e))?;
        for line in comment.content.lines() {
            writeln!(writer, "    {line}").map_err(|e| io_error(&e))?;
        }
    }
    Ok(())
}

fn activity_date(date: Option<&DateTime<Utc>>) -> String {
    date.map_or_else(
        || "unknown date".to_owned(),
        |when| when.format("%Y-%m-%d %H:%M").to_string(),
    )
}

/// Writes the activity timeline, one entry per line.
pub fn write_activity_to<W: Write>(
    writer: &mut W,
    format: OutputFormat,
    entries: &[Activity],
) -> Result<(), BitbucketError> {
    if format == OutputFormat::Json {
        return write_json(writer, entries);
    }
    if entries.is_empty() {
        return writeln!(writer, "No activity found.").map_err(|e| io_error(&e));
    }

    for entry in entries {
        let line = match entry {
            Activity::Update {
                author,
                status,
                date,
                ..
            } => {
                let state = status.map_or_else(|| "updated".to_owned(), |next| next.to_string());
                format!("{} update by {author}: {state}", activity_date(date.as_ref()))
            }
            Activity::Approval { user, date } => {
                format!("{} approved by {user}", activity_date(date.as_ref()))
            }
            Activity::ChangesRequested { user, date } => {
                format!("{} changes requested by {user}", activity_date(date.as_ref()))
            }
            Activity::Comment { comment } => format!(
                "{} comment [{}] by {}: {}",
                activity_date(comment.created_on.as_ref()),
                comment.id,
                comment.author,
                comment.content.lines().next().unwrap_or_default()
            ),
            Activity::Other => "other activity".to_owned(),
        };
        writeln!(writer, "{line}").map_err(|e| io_error(&e))?;
    }
    Ok(())
}

/// Writes the per-file change summary.
pub fn write_diffstat_to<W: Write>(
    writer: &mut W,
    format: OutputFormat,
    stats: &[DiffStat],
) -> Result<(), BitbucketError> {
    if format == OutputFormat::Json {
        return write_json(writer, stats);
    }

    let mut added: u64 = 0;
    let mut removed: u64 = 0;
    for stat in stats {
        let path = stat
            .new_path
            .as_deref()
            .or(stat.old_path.as_deref())
            .unwrap_or("(unknown path)");
        writeln!(
            writer,
            "  {path} +{} -{} [{}]",
            stat.lines_added, stat.lines_removed, stat.status
        )
        .map_err(|e| io_error(&e))?;
        added = added.saturating_add(stat.lines_added);
        removed = removed.saturating_add(stat.lines_removed);
    }
    writeln!(
        writer,
        "{} file(s) changed, +{added} -{removed}",
        stats.len()
    )
    .map_err(|e| io_error(&e))
}

/// Writes the authenticated caller's identity.
pub fn write_user_to<W: Write>(
    writer: &mut W,
    format: OutputFormat,
    user: &UserIdentity,
) -> Result<(), BitbucketError> {
    if format == OutputFormat::Json {
        return write_json(writer, user);
    }
    let id = user
        .uuid
        .as_deref()
        .or(user.account_id.as_deref())
        .unwrap_or("unknown id");
    writeln!(writer, "{} {id}", user.display_name).map_err(|e| io_error(&e))
}

/// Writes a raw unified diff unchanged.
pub fn write_diff_to<W: Write>(writer: &mut W, diff: &str) -> Result<(), BitbucketError> {
    writer
        .write_all(diff.as_bytes())
        .map_err(|e| io_error(&e))?;
    if diff.ends_with('\n') || diff.is_empty() {
        Ok(())
    } else {
        writeln!(writer).map_err(|e| io_error(&e))
    }
}

/// Writes an error report. JSON reports carry the stable error kind.
pub fn write_error_to<W: Write>(
    writer: &mut W,
    format: OutputFormat,
    error: &BitbucketError,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => writeln!(writer, "error: {error}"),
        OutputFormat::Json => {
            let report = json!({
                "error": {
                    "kind": error.kind().as_str(),
                    "status": error.status(),
                    "message": error.to_string(),
                }
            });
            writeln!(writer, "{report}")
        }
    }
}
