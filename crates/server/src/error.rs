//! Relay error taxonomy.

use thiserror::Error;
use threadrelay_connectors::ConnectorError;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or blank required input. Recovered locally and shown only to the requester.
    #[error("{0}")]
    Validation(String),

    #[error("no team matching `{0}` was found")]
    TeamNotFound(String),

    #[error("no workflow state matching `{target}` exists for issue {issue_id}")]
    TargetStateNotFound { issue_id: String, target: String },

    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

impl RelayError {
    /// Text safe to show to the Slack user who triggered the request.
    pub fn user_message(&self) -> String {
        match self {
            RelayError::Validation(message) => format!(":warning: {message}"),
            RelayError::TeamNotFound(wanted) if wanted.is_empty() => {
                ":x: No Linear team is available to create the task in.".to_string()
            }
            RelayError::TeamNotFound(wanted) => {
                format!(":x: Couldn't find a Linear team matching *{wanted}*. No task was created.")
            }
            RelayError::TargetStateNotFound { target, .. } => {
                format!(":x: This issue's workflow has no *{target}* state, so it was not changed.")
            }
            RelayError::Connector(_) => {
                ":x: Something went wrong talking to Slack or Linear. Please try again.".to_string()
            }
        }
    }
}
