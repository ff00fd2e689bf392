//! Subcommand dispatch.
//!
//! Resolves the credential and gateway once per invocation, turns the parsed
//! subcommand into a pull request action, and renders the result.

use std::env;
use std::io::Write;

use bbpr::bitbucket::credential::{self, CredentialLayer};
use bbpr::bitbucket::gateway::{
    DeclineRequest, ListFilter, MergeRequest, NewComment, NewPullRequest, PullRequestUpdate,
    ReviewerRef,
};
use bbpr::bitbucket::locator::PullRequestId;
use bbpr::bitbucket::models::InlineAnchor;
use bbpr::bitbucket::template::PullRequestTemplate;
use bbpr::bitbucket::transport::ReqwestTransport;
use bbpr::{
    ActionOutcome, ActionRequest, BbprConfig, BitbucketError, BitbucketGateway, Credential,
    CredentialSources, PullRequestActions, PullRequestGateway, PullRequestLocator,
    RepositoryLocator,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::output::{
    OutputFormat, write_activity_to, write_comments_to, write_diff_to, write_diffstat_to,
    write_outcome_to, write_user_to,
};
use super::{
    Command, CommentArgs, CreateArgs, GlobalArgs, ListArgs, MergeArgs,
    PullRequestArg, UpdateArgs,
};

/// Configuration and global flags shared by every subcommand.
#[derive(Debug)]
pub struct Invocation<'a> {
    config: &'a BbprConfig,
    global: &'a GlobalArgs,
}

impl<'a> Invocation<'a> {
    /// Pairs loaded configuration with the parsed global flags.
    #[must_use]
    pub const fn new(config: &'a BbprConfig, global: &'a GlobalArgs) -> Self {
        Self { config, global }
    }

    /// Output format selected by `--json`.
    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        if self.global.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }

    /// Credential sources in precedence order: flags, `BITBUCKET_*`
    /// variables, then configuration.
    #[must_use]
    pub fn credential_sources<F>(&self, lookup: F) -> CredentialSources
    where
        F: Fn(&str) -> Option<String>,
    {
        CredentialSources {
            explicit_token: self.global.token.clone(),
            explicit_username: self.global.username.clone(),
            explicit_app_password: self.global.app_password.clone(),
            environment: CredentialLayer::from_lookup(lookup),
            config: self.config.credential_layer(),
        }
    }

    fn repository(&self) -> Result<RepositoryLocator, BitbucketError> {
        self.config.require_repository(
            self.global.workspace.as_deref(),
            self.global.repo.as_deref(),
        )
    }

    /// Resolves a numeric id against the current repository, or parses a
    /// web URL on its own.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::InvalidArgument`] for a zero id or an
    /// unrecognised URL, and [`BitbucketError::Configuration`] when a
    /// numeric id has no repository to resolve against.
    pub fn pull_request(&self, arg: &PullRequestArg) -> Result<PullRequestLocator, BitbucketError> {
        arg.pr.trim().parse::<u64>().map_or_else(
            |_| PullRequestLocator::parse_web_url(&arg.pr, &self.config.api_base_url),
            |id| Ok(self.repository()?.pull_request(PullRequestId::new(id)?)),
        )
    }
}

/// Runs one subcommand against the live Bitbucket API.
///
/// # Errors
///
/// Returns credential, configuration, and request errors unchanged.
pub async fn run<W: Write>(
    invocation: &Invocation<'_>,
    command: &Command,
    cancel: CancellationToken,
    writer: &mut W,
) -> Result<(), BitbucketError> {
    let credential = credential::resolve(&invocation.credential_sources(|name| env::var(name).ok()))?;
    let gateway = build_gateway(invocation.config, credential, cancel)?;
    dispatch(&gateway, invocation, command, writer).await
}

fn build_gateway(
    config: &BbprConfig,
    credential: Credential,
    cancel: CancellationToken,
) -> Result<BitbucketGateway<ReqwestTransport>, BitbucketError> {
    let api_base = Url::parse(&config.api_base_url).map_err(|error| {
        BitbucketError::Configuration {
            message: format!("invalid api_base_url '{}': {error}", config.api_base_url),
        }
    })?;
    debug!(scheme = credential.scheme(), api_base = %api_base, "resolved credential");
    BitbucketGateway::for_credential(
        credential,
        api_base,
        config.timeout(),
        config.retry_policy(),
        cancel,
    )
}

/// Executes `command` through `gateway` and writes the rendered result.
///
/// # Errors
///
/// Returns argument, state, and request errors unchanged.
pub async fn dispatch<G, W>(
    gateway: &G,
    invocation: &Invocation<'_>,
    command: &Command,
    writer: &mut W,
) -> Result<(), BitbucketError>
where
    G: PullRequestGateway + ?Sized,
    W: Write,
{
    let actions = PullRequestActions::new(gateway);
    let format = invocation.format();

    match command {
        Command::Comments(arg) => {
            let comments = actions.comments(&invocation.pull_request(arg)?).await?;
            write_comments_to(writer, format, &comments)
        }
        Command::Update(args) => {
            let locator = invocation.pull_request(&args.target)?;
            let updated = actions.update(&locator, &update_request(args)?).await?;
            write_outcome_to(writer, format, &ActionOutcome::Shown(updated))
        }
        Command::Diff(arg) => {
            let diff = actions.diff(&invocation.pull_request(arg)?).await?;
            write_diff_to(writer, &diff)
        }
        Command::Diffstat(arg) => {
            let stats = actions.diffstat(&invocation.pull_request(arg)?).await?;
            write_diffstat_to(writer, format, &stats)
        }
        Command::Activity(args) => {
            let locator = invocation.pull_request(&args.target)?;
            let entries = actions.activity(&locator, Some(args.limit)).await?;
            write_activity_to(writer, format, &entries)
        }
        Command::Whoami => {
            let user = gateway.current_user().await?;
            write_user_to(writer, format, &user)
        }
        action_command => {
            let request = action_request(invocation, action_command)?;
            let outcome = actions.execute(&request, None).await?;
            write_outcome_to(writer, format, &outcome)
        }
    }
}

fn action_request(
    invocation: &Invocation<'_>,
    command: &Command,
) -> Result<ActionRequest, BitbucketError> {
    match command {
        Command::Create(args) => {
            let template = args
                .template
                .as_deref()
                .map(PullRequestTemplate::load)
                .transpose()?;
            Ok(ActionRequest::Create {
                repository: invocation.repository()?,
                pull_request: create_request(invocation.config, args, template.as_ref())?,
            })
        }
        Command::List(args) => Ok(ActionRequest::List {
            repository: invocation.repository()?,
            filter: list_filter(args),
            limit: args.limit,
        }),
        Command::Show(arg) => Ok(ActionRequest::Show {
            locator: invocation.pull_request(arg)?,
        }),
        Command::Comment(args) => Ok(ActionRequest::Comment {
            locator: invocation.pull_request(&args.target)?,
            comment: comment_request(args),
        }),
        Command::Approve(arg) => Ok(ActionRequest::Approve {
            locator: invocation.pull_request(arg)?,
        }),
        Command::Unapprove(arg) => Ok(ActionRequest::Unapprove {
            locator: invocation.pull_request(arg)?,
        }),
        Command::Decline(args) => Ok(ActionRequest::Decline {
            locator: invocation.pull_request(&args.target)?,
            request: DeclineRequest {
                message: args.message.clone(),
            },
        }),
        Command::Merge(args) => Ok(ActionRequest::Merge {
            locator: invocation.pull_request(&args.target)?,
            request: merge_request(invocation.config, args)?,
        }),
        Command::Comments(_)
        | Command::Update(_)
        | Command::Diff(_)
        | Command::Diffstat(_)
        | Command::Activity(_)
        | Command::Whoami => Err(BitbucketError::InvalidArgument {
            message: "command is not a pull request action".to_owned(),
        }),
    }
}

fn parse_reviewers(values: &[String]) -> Result<Vec<ReviewerRef>, BitbucketError> {
    values
        .iter()
        .map(String::as_str)
        .map(ReviewerRef::parse)
        .collect()
}

/// Flag reviewers first, then configured defaults, without repeats.
fn merged_reviewers(
    flagged: &[String],
    defaults: &[String],
) -> Result<Vec<ReviewerRef>, BitbucketError> {
    let mut merged: Vec<ReviewerRef> = Vec::new();
    for reviewer in parse_reviewers(flagged)?
        .into_iter()
        .chain(parse_reviewers(defaults)?)
    {
        if !merged.contains(&reviewer) {
            merged.push(reviewer);
        }
    }
    Ok(merged)
}

fn create_request(
    config: &BbprConfig,
    args: &CreateArgs,
    template: Option<&PullRequestTemplate>,
) -> Result<NewPullRequest, BitbucketError> {
    let title = args
        .title
        .clone()
        .or_else(|| template.map(|loaded| loaded.title.clone()))
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| BitbucketError::InvalidArgument {
            message: "title is required (use --title or a template with a first line)"
                .to_owned(),
        })?;
    let description = args.description.clone().or_else(|| {
        template
            .map(|loaded| loaded.description.clone())
            .filter(|value| !value.is_empty())
    });
    Ok(NewPullRequest {
        title,
        source_branch: args.source.clone(),
        destination_branch: args
            .destination
            .clone()
            .unwrap_or_else(|| config.default_destination_branch.clone()),
        description,
        reviewers: merged_reviewers(&args.reviewers, &config.default_reviewers)?,
        close_source_branch: config.close_source_branch && !args.keep_source_branch,
    })
}

fn list_filter(args: &ListArgs) -> ListFilter {
    ListFilter {
        state: args.state,
        author: args.author.clone(),
        destination_branch: args.destination.clone(),
        reviewer: args.reviewer.clone(),
        page_len: args.pagelen,
    }
}

fn comment_request(args: &CommentArgs) -> NewComment {
    NewComment {
        content: args.message.clone(),
        parent_id: args.reply_to,
        inline: args.path.as_ref().map(|path| InlineAnchor {
            path: path.clone(),
            from: args.from_line,
            to: args.line,
        }),
    }
}

fn merge_request(config: &BbprConfig, args: &MergeArgs) -> Result<MergeRequest, BitbucketError> {
    let strategy = args.strategy.map_or_else(|| config.merge_strategy(), Ok)?;
    Ok(MergeRequest {
        strategy,
        message: args.message.clone(),
        close_source_branch: config.close_source_branch && !args.keep_source_branch,
    })
}

fn update_request(args: &UpdateArgs) -> Result<PullRequestUpdate, BitbucketError> {
    let reviewers = if args.reviewers.is_empty() {
        None
    } else {
        Some(parse_reviewers(&args.reviewers)?)
    };
    Ok(PullRequestUpdate {
        title: args.title.clone(),
        description: args.description.clone(),
        destination_branch: args.destination.clone(),
        reviewers,
    })
}

#[cfg(test)]
mod tests {
    use bbpr::BbprConfig;
    use bbpr::bitbucket::gateway::ReviewerRef;
    use bbpr::bitbucket::models::MergeStrategy;
    use bbpr::bitbucket::template::PullRequestTemplate;
    use rstest::rstest;

    use super::{Invocation, create_request, merge_request};
    use crate::cli::{CreateArgs, GlobalArgs, MergeArgs, PullRequestArg};

    fn config() -> BbprConfig {
        BbprConfig {
            workspace: Some("acme".to_owned()),
            repo: Some("widgets".to_owned()),
            token: Some("from-config".to_owned()),
            merge_strategy: "squash".to_owned(),
            ..BbprConfig::default()
        }
    }

    fn target(pr: &str) -> PullRequestArg {
        PullRequestArg { pr: pr.to_owned() }
    }

    fn create_args(title: Option<&str>, reviewers: &[&str]) -> CreateArgs {
        CreateArgs {
            title: title.map(str::to_owned),
            template: None,
            source: "feature/retries".to_owned(),
            destination: None,
            description: None,
            reviewers: reviewers.iter().map(|value| (*value).to_owned()).collect(),
            keep_source_branch: false,
        }
    }

    #[rstest]
    #[case::numeric_id("42", "acme", "widgets", 42)]
    #[case::web_url("https://bitbucket.org/other/gadgets/pull-requests/7", "other", "gadgets", 7)]
    fn pull_request_target_resolves(
        #[case] input: &str,
        #[case] workspace: &str,
        #[case] repo: &str,
        #[case] id: u64,
    ) {
        let config = config();
        let global = GlobalArgs::default();
        let invocation = Invocation::new(&config, &global);

        let locator = invocation
            .pull_request(&target(input))
            .expect("target should resolve");

        assert_eq!(locator.repository().workspace().as_str(), workspace);
        assert_eq!(locator.repository().repository().as_str(), repo);
        assert_eq!(locator.id().get(), id);
    }

    #[rstest]
    fn flag_token_wins_over_environment_and_config() {
        let config = config();
        let global = GlobalArgs {
            token: Some("from-flag".to_owned()),
            ..GlobalArgs::default()
        };
        let invocation = Invocation::new(&config, &global);

        let sources = invocation.credential_sources(|name| {
            (name == "BITBUCKET_REPO_TOKEN").then(|| "from-env".to_owned())
        });
        let first = bbpr::bitbucket::credential::resolve(&sources).expect("should resolve");
        let second = bbpr::bitbucket::credential::resolve(&sources).expect("should resolve");

        let bbpr::Credential::Token(token) = &first else {
            panic!("expected token credential, got {first:?}");
        };
        assert_eq!(token.value(), "from-flag");
        assert_eq!(first, second);
    }

    #[rstest]
    fn merge_falls_back_to_configured_strategy() {
        let config = config();
        let args = MergeArgs {
            target: target("42"),
            strategy: None,
            message: None,
            keep_source_branch: true,
        };

        let request = merge_request(&config, &args).expect("merge request should build");

        assert_eq!(request.strategy, MergeStrategy::Squash);
        assert!(!request.close_source_branch);
    }

    #[rstest]
    fn create_merges_default_reviewers_without_repeats() {
        let config = BbprConfig {
            default_reviewers: vec!["{grace}".to_owned(), "{ada}".to_owned()],
            ..config()
        };
        let args = create_args(Some("Add retries"), &["{ada}", "557058:linus"]);

        let request = create_request(&config, &args, None).expect("request should build");

        assert_eq!(
            request.reviewers,
            vec![
                ReviewerRef::Uuid("{ada}".to_owned()),
                ReviewerRef::AccountId("557058:linus".to_owned()),
                ReviewerRef::Uuid("{grace}".to_owned()),
            ]
        );
        assert_eq!(request.destination_branch, "main");
    }

    #[rstest]
    fn template_fills_title_and_description_unless_given() {
        let config = config();
        let template = PullRequestTemplate::parse("# Template title\nTemplate body");
        let from_template = create_args(None, &[]);
        let explicit = CreateArgs {
            description: Some("Flag body".to_owned()),
            ..create_args(Some("Flag title"), &[])
        };

        let templated =
            create_request(&config, &from_template, Some(&template)).expect("request should build");
        let overridden =
            create_request(&config, &explicit, Some(&template)).expect("request should build");

        assert_eq!(templated.title, "Template title");
        assert_eq!(templated.description.as_deref(), Some("Template body"));
        assert_eq!(overridden.title, "Flag title");
        assert_eq!(overridden.description.as_deref(), Some("Flag body"));
    }

    #[rstest]
    fn blank_template_title_is_rejected() {
        let config = config();
        let template = PullRequestTemplate::parse("\n\n");

        let result = create_request(&config, &create_args(None, &[]), Some(&template));

        assert!(matches!(
            result,
            Err(bbpr::BitbucketError::InvalidArgument { .. })
        ));
    }
}
