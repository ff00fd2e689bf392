//! Tests for configuration layer precedence.

use ortho_config::MergeComposer;
use rstest::rstest;
use serde_json::{Value, json};

use super::helpers::{apply_layer, build_config_from_layers};
use crate::BbprConfig;

#[rstest]
#[case::file_overrides_defaults(
    vec![("defaults", json!({"workspace": "default-ws"})), ("file", json!({"workspace": "file-ws"}))],
    "workspace",
    "file-ws",
    "file should override default"
)]
#[case::environment_overrides_file(
    vec![("file", json!({"token": "file-token"})), ("environment", json!({"token": "env-token"}))],
    "token",
    "env-token",
    "environment should override file"
)]
#[case::cli_overrides_environment(
    vec![("environment", json!({"repo": "env-repo"})), ("cli", json!({"repo": "cli-repo"}))],
    "repo",
    "cli-repo",
    "CLI should override environment"
)]
#[case::username_defaults_file_env_cli(
    vec![
        ("defaults", json!({"username": "default-user"})),
        ("file", json!({"username": "file-user"})),
        ("environment", json!({"username": "env-user"})),
        ("cli", json!({"username": "cli-user"}))
    ],
    "username",
    "cli-user",
    "CLI should win for username"
)]
fn test_layer_precedence(
    #[case] layers: Vec<(&str, Value)>,
    #[case] field: &str,
    #[case] expected: &str,
    #[case] message: &str,
) {
    let mut composer = MergeComposer::new();

    for (layer_type, value) in layers {
        apply_layer(&mut composer, layer_type, value);
    }

    let config = BbprConfig::merge_from_layers(composer.layers()).expect("merge should succeed");

    let actual = match field {
        "workspace" => config.workspace.as_deref(),
        "repo" => config.repo.as_deref(),
        "token" => config.token.as_deref(),
        "username" => config.username.as_deref(),
        _ => panic!("unknown field: {field}"),
    };

    assert_eq!(actual, Some(expected), "{message}");
}

#[rstest]
fn defaults_apply_when_no_sources_provided() {
    let mut composer = MergeComposer::new();
    composer.push_defaults(json!({"workspace": null, "token": null}));

    let config = BbprConfig::merge_from_layers(composer.layers())
        .expect("merge should succeed with empty defaults");

    assert!(config.workspace.is_none(), "workspace should be None");
    assert!(config.token.is_none(), "token should be None");
    assert_eq!(config.api_base_url, "https://api.bitbucket.org/2.0");
    assert_eq!(config.timeout_seconds, 30);
    assert_eq!(config.max_attempts, 4);
    assert_eq!(config.base_delay_ms, 1_000);
    assert_eq!(config.merge_strategy, "merge_commit");
    assert_eq!(config.default_destination_branch, "main");
    assert!(config.close_source_branch);
}

#[rstest]
#[case::file(vec![("file", json!({"max_attempts": 6}))], 6)]
#[case::environment_over_file(
    vec![("file", json!({"max_attempts": 6})), ("environment", json!({"max_attempts": 2}))],
    2
)]
fn numeric_fields_follow_precedence(#[case] layers: Vec<(&str, Value)>, #[case] expected: u32) {
    let config = build_config_from_layers(&layers);

    assert_eq!(config.max_attempts, expected);
}

#[rstest]
fn file_can_disable_close_source_branch() {
    let config = build_config_from_layers(&[("file", json!({"close_source_branch": false}))]);

    assert!(!config.close_source_branch);
}

#[rstest]
fn default_reviewers_load_from_file() {
    let config = build_config_from_layers(&[(
        "file",
        json!({"default_reviewers": ["{ada}", "557058:grace"]}),
    )]);

    assert_eq!(config.default_reviewers, vec!["{ada}", "557058:grace"]);
}
