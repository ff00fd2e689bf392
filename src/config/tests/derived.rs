//! Tests for values derived from a loaded configuration.

use std::time::Duration;

use rstest::rstest;
use serde_json::json;

use super::helpers::build_config_from_layers;
use crate::BbprConfig;
use crate::bitbucket::credential::{CredentialSources, resolve};
use crate::bitbucket::error::BitbucketError;
use crate::bitbucket::models::MergeStrategy;

#[rstest]
fn retry_policy_reflects_configured_delays() {
    let config = build_config_from_layers(&[(
        "file",
        json!({"max_attempts": 3, "base_delay_ms": 250, "backoff_multiplier": 3}),
    )]);

    let policy = config.retry_policy();

    assert_eq!(policy.max_attempts(), 3);
    assert_eq!(policy.base_delay(), Duration::from_millis(250));
    assert_eq!(policy.backoff_delay(2), Duration::from_millis(750));
}

#[rstest]
fn default_timeout_is_thirty_seconds() {
    assert_eq!(BbprConfig::default().timeout(), Duration::from_secs(30));
}

#[rstest]
fn credential_layer_feeds_the_resolver() {
    let config = build_config_from_layers(&[(
        "file",
        json!({"username": "ada", "app_password": "secret"}),
    )]);
    let sources = CredentialSources {
        config: config.credential_layer(),
        ..CredentialSources::default()
    };

    let credential = resolve(&sources).expect("config credential should resolve");

    assert_eq!(credential.scheme(), "basic");
}

#[rstest]
fn explicit_token_beats_config_token() {
    let config = build_config_from_layers(&[("file", json!({"token": "from-config"}))]);
    let sources = CredentialSources {
        explicit_token: Some("from-flag".to_owned()),
        config: config.credential_layer(),
        ..CredentialSources::default()
    };

    let credential = resolve(&sources).expect("explicit token should resolve");

    let crate::bitbucket::credential::Credential::Token(token) = credential else {
        panic!("expected a bearer token, got {credential:?}");
    };
    assert_eq!(token.value(), "from-flag");
}

#[rstest]
#[case::config_only(None, None, "acme", "widgets")]
#[case::flag_overrides_workspace(Some("other"), None, "other", "widgets")]
#[case::flag_overrides_both(Some("other"), Some("gadgets"), "other", "gadgets")]
fn require_repository_prefers_overrides(
    #[case] workspace: Option<&str>,
    #[case] repo: Option<&str>,
    #[case] expected_workspace: &str,
    #[case] expected_repo: &str,
) {
    let config =
        build_config_from_layers(&[("file", json!({"workspace": "acme", "repo": "widgets"}))]);

    let repository = config
        .require_repository(workspace, repo)
        .expect("repository should resolve");

    assert_eq!(repository.workspace().as_str(), expected_workspace);
    assert_eq!(repository.repository().as_str(), expected_repo);
}

#[rstest]
fn require_repository_reports_missing_workspace() {
    let config = BbprConfig {
        repo: Some("widgets".to_owned()),
        ..BbprConfig::default()
    };

    let result = config.require_repository(None, None);

    assert!(
        matches!(result, Err(BitbucketError::Configuration { ref message }) if message.contains("workspace")),
        "unexpected result {result:?}"
    );
}

#[rstest]
#[case::squash("squash", MergeStrategy::Squash)]
#[case::fast_forward("fast-forward", MergeStrategy::FastForward)]
#[case::default("merge_commit", MergeStrategy::MergeCommit)]
fn merge_strategy_parses_configured_value(#[case] value: &str, #[case] expected: MergeStrategy) {
    let config = build_config_from_layers(&[("file", json!({"merge_strategy": value}))]);

    assert_eq!(config.merge_strategy(), Ok(expected));
}

#[rstest]
#[case::zero_timeout(json!({"timeout_seconds": 0}), "timeout_seconds")]
#[case::zero_attempts(json!({"max_attempts": 0}), "max_attempts")]
#[case::bad_strategy(json!({"merge_strategy": "rebase"}), "merge_strategy")]
fn validate_rejects_unusable_values(#[case] layer: serde_json::Value, #[case] field: &str) {
    let config = build_config_from_layers(&[("file", layer)]);

    let result = config.validate();

    assert!(
        matches!(result, Err(BitbucketError::Configuration { ref message }) if message.contains(field)),
        "expected configuration error mentioning {field}, got {result:?}"
    );
}
