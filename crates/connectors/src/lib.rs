//! threadrelay Connectors
//!
//! Outbound collaborators of the relay: the chat platform (Slack) and the
//! issue tracker (Linear). Handlers only see the [`ChatPlatform`] and
//! [`IssueTracker`] traits so they can run against in-memory fakes.

pub mod linear;
pub mod slack;

use async_trait::async_trait;
use thiserror::Error;
use threadrelay_protocol::{Block, ModalView};

pub use linear::LinearClient;
pub use slack::SlackClient;

/// Errors that can occur in connectors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("HTTP transport error: {0}")]
    TransportError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{service} returned HTTP {status}: {body}")]
    HttpStatus {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} API error: {message}")]
    ApiError {
        service: &'static str,
        message: String,
    },

    #[error("{service} response did not include {field}")]
    MissingField {
        service: &'static str,
        field: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Chat platform
// ---------------------------------------------------------------------------

/// Message to post into a channel, optionally threaded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingMessage {
    pub channel: String,
    pub thread_ts: Option<String>,
    /// Fallback text for notifications and clients without Block Kit
    pub text: String,
    pub blocks: Vec<Block>,
}

/// Location of a posted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn open_modal(&self, trigger_id: &str, view: &ModalView) -> Result<(), ConnectorError>;

    async fn post_message(&self, message: OutgoingMessage)
        -> Result<PostedMessage, ConnectorError>;

    /// Post a message only `user` can see.
    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
    ) -> Result<(), ConnectorError>;

    async fn user_display_name(&self, user_id: &str) -> Result<String, ConnectorError>;

    /// Workspace subdomain, e.g. `acme` for `acme.slack.com`.
    async fn workspace_domain(&self) -> Result<String, ConnectorError>;
}

// ---------------------------------------------------------------------------
// Issue tracker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerTeam {
    pub id: String,
    pub key: String,
    pub name: String,
}

/// One page of teams; `next_cursor` is `None` on the last page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamPage {
    pub teams: Vec<TrackerTeam>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    pub team_id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerIssue {
    pub id: String,
    pub identifier: String,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub state_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerWorkflowState {
    pub id: String,
    pub name: String,
    pub position: Option<f64>,
}

/// A single state change recorded in an issue's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueStateChange {
    pub created_at: String,
    pub from_state: Option<String>,
    pub to_state: Option<String>,
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn list_teams(&self, after: Option<&str>) -> Result<TeamPage, ConnectorError>;

    async fn create_issue(&self, issue: NewIssue) -> Result<TrackerIssue, ConnectorError>;

    async fn update_issue_description(
        &self,
        issue_id: &str,
        description: &str,
    ) -> Result<(), ConnectorError>;

    async fn update_issue_state(&self, issue_id: &str, state_id: &str)
        -> Result<(), ConnectorError>;

    async fn fetch_issue(&self, issue_id: &str) -> Result<TrackerIssue, ConnectorError>;

    /// Workflow states of the team owning the issue.
    async fn workflow_states(
        &self,
        issue_id: &str,
    ) -> Result<Vec<TrackerWorkflowState>, ConnectorError>;

    /// State changes of the issue, newest first.
    async fn issue_history(&self, issue_id: &str) -> Result<Vec<IssueStateChange>, ConnectorError>;
}

pub(crate) fn truncate_for_error(body: &str) -> String {
    const MAX_LEN: usize = 200;
    if body.chars().count() <= MAX_LEN {
        body.to_owned()
    } else {
        format!("{}...", body.chars().take(MAX_LEN).collect::<String>())
    }
}
