//! Runtime configuration for `threadrelay serve`.
//!
//! Every option can come from the command line or the environment; secrets are
//! redacted from `Debug` output.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use threadrelay_connectors::linear::DEFAULT_LINEAR_API_URL;
use threadrelay_connectors::slack::DEFAULT_SLACK_API_BASE;

use crate::transition::TransitionPolicy;
use crate::workflow::{parse_rule_overrides, WorkflowTable};

/// How `/create-task` collects its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CommandMode {
    /// Open a modal form when Slack provides a trigger id.
    Modal,
    /// Parse `title | team | details` from the command text.
    Text,
}

/// What to compare against when an issue's previous state is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UnknownPrevious {
    /// Treat the issue as coming from the base stage.
    AssumeBase,
    /// Stay silent.
    Suppress,
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "THREADRELAY_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Slack bot token (xoxb-…)
    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    pub slack_bot_token: String,

    #[arg(long, env = "THREADRELAY_SLACK_API_BASE", default_value = DEFAULT_SLACK_API_BASE)]
    pub slack_api_base: String,

    /// Linear API key
    #[arg(long, env = "LINEAR_API_KEY", hide_env_values = true)]
    pub linear_api_key: String,

    #[arg(long, env = "THREADRELAY_LINEAR_API_URL", default_value = DEFAULT_LINEAR_API_URL)]
    pub linear_api_url: String,

    /// Team key or name: scopes webhook events and is the default team for new issues
    #[arg(long, env = "THREADRELAY_TEAM")]
    pub team: Option<String>,

    #[arg(long, env = "THREADRELAY_COMMAND_MODE", value_enum, default_value = "modal")]
    pub command_mode: CommandMode,

    #[arg(
        long,
        env = "THREADRELAY_UNKNOWN_PREVIOUS",
        value_enum,
        default_value = "assume-base"
    )]
    pub unknown_previous: UnknownPrevious,

    /// Extra `keyword=position` workflow rules, evaluated before the defaults
    #[arg(long, env = "THREADRELAY_STATE_RULES")]
    pub state_rules: Option<String>,

    /// Data directory (logs)
    #[arg(long, env = "THREADRELAY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Clone)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    pub slack_bot_token: String,
    pub slack_api_base: String,
    pub linear_api_key: String,
    pub linear_api_url: String,
    pub team: Option<String>,
    pub command_mode: CommandMode,
    pub unknown_previous: UnknownPrevious,
    pub workflow: WorkflowTable,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RelayConfig")
            .field("bind", &self.bind)
            .field("slack_bot_token", &"<redacted>")
            .field("slack_api_base", &self.slack_api_base)
            .field("linear_api_key", &"<redacted>")
            .field("linear_api_url", &self.linear_api_url)
            .field("team", &self.team)
            .field("command_mode", &self.command_mode)
            .field("unknown_previous", &self.unknown_previous)
            .field("workflow_rules", &self.workflow.rules().len())
            .finish()
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            slack_bot_token: String::new(),
            slack_api_base: DEFAULT_SLACK_API_BASE.to_string(),
            linear_api_key: String::new(),
            linear_api_url: DEFAULT_LINEAR_API_URL.to_string(),
            team: None,
            command_mode: CommandMode::Modal,
            unknown_previous: UnknownPrevious::AssumeBase,
            workflow: WorkflowTable::default(),
        }
    }
}

impl RelayConfig {
    pub fn from_args(args: &ServeArgs) -> anyhow::Result<Self> {
        let slack_bot_token = args.slack_bot_token.trim();
        if slack_bot_token.is_empty() {
            anyhow::bail!("SLACK_BOT_TOKEN is empty. Provide a bot token.");
        }
        let linear_api_key = args.linear_api_key.trim();
        if linear_api_key.is_empty() {
            anyhow::bail!("LINEAR_API_KEY is empty. Provide a non-empty API key.");
        }

        let overrides = match args.state_rules.as_deref() {
            Some(raw) => parse_rule_overrides(raw)
                .map_err(|err| anyhow::anyhow!("THREADRELAY_STATE_RULES: {err}"))?,
            None => Vec::new(),
        };

        Ok(Self {
            bind: args.bind,
            slack_bot_token: slack_bot_token.to_string(),
            slack_api_base: args.slack_api_base.trim().to_string(),
            linear_api_key: linear_api_key.to_string(),
            linear_api_url: args.linear_api_url.trim().to_string(),
            team: args
                .team
                .as_deref()
                .map(str::trim)
                .filter(|team| !team.is_empty())
                .map(ToOwned::to_owned),
            command_mode: args.command_mode,
            unknown_previous: args.unknown_previous,
            workflow: WorkflowTable::with_overrides(overrides),
        })
    }

    pub fn transition_policy(&self) -> TransitionPolicy {
        TransitionPolicy::new(self.workflow.clone(), self.unknown_previous)
    }

    /// Whether an event for a team with this key/name belongs to the relay.
    /// No configured team accepts everything.
    pub fn team_in_scope(&self, key: Option<&str>, name: Option<&str>) -> bool {
        let Some(scope) = self.team.as_deref() else {
            return true;
        };
        team_matches(scope, key.unwrap_or_default(), name.unwrap_or_default())
    }
}

/// Case-insensitive team match on key or name.
pub fn team_matches(wanted: &str, key: &str, name: &str) -> bool {
    let wanted = wanted.trim();
    !wanted.is_empty()
        && (key.trim().eq_ignore_ascii_case(wanted) || name.trim().eq_ignore_ascii_case(wanted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        serve: ServeArgs,
    }

    fn parse(args: &[&str]) -> ServeArgs {
        let mut argv = vec![
            "threadrelay",
            "--slack-bot-token",
            "xoxb-test",
            "--linear-api-key",
            "lin_api_test",
        ];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).expect("args should parse").serve
    }

    #[test]
    fn defaults_are_applied() {
        let config = RelayConfig::from_args(&parse(&[])).expect("config");
        assert_eq!(config.command_mode, CommandMode::Modal);
        assert_eq!(config.unknown_previous, UnknownPrevious::AssumeBase);
        assert_eq!(config.workflow, WorkflowTable::default());
        assert!(config.team.is_none());
    }

    #[test]
    fn state_rules_extend_the_workflow_table() {
        let config =
            RelayConfig::from_args(&parse(&["--state-rules", "qa=3", "--command-mode", "text"]))
                .expect("config");
        assert_eq!(config.workflow.position("In QA"), 3);
        assert_eq!(config.command_mode, CommandMode::Text);
    }

    #[test]
    fn malformed_state_rules_are_rejected() {
        let err = RelayConfig::from_args(&parse(&["--state-rules", "qa"]))
            .expect_err("should fail");
        assert!(err.to_string().contains("THREADRELAY_STATE_RULES"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = RelayConfig::from_args(&parse(&[])).expect("config");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("xoxb-test"));
        assert!(!rendered.contains("lin_api_test"));
    }

    #[test]
    fn team_scope_matches_key_or_name_case_insensitively() {
        let config = RelayConfig {
            team: Some("LAN".to_string()),
            ..RelayConfig::default()
        };
        assert!(config.team_in_scope(Some("lan"), None));
        assert!(!config.team_in_scope(Some("ENG"), Some("Engineering")));
        assert!(!config.team_in_scope(None, None));

        let open = RelayConfig::default();
        assert!(open.team_in_scope(None, None));
    }

    #[test]
    fn team_lookup_matches_key_or_name() {
        assert!(team_matches("landing", "LAN", "Landing"));
        assert!(team_matches("lan", "LAN", "Landing"));
        assert!(!team_matches("eng", "LAN", "Landing"));
        assert!(!team_matches("  ", "LAN", "Landing"));
    }
}
