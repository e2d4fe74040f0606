//! Slack interactivity: modal submissions and message buttons.
//!
//! Slack expects an answer within three seconds, so anything that talks to
//! Linear runs in a spawned task after the acknowledgment.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use tracing::{info, warn};

use threadrelay_protocol::slack::{BlockAction, InteractionForm, ViewErrorsResponse};
use threadrelay_protocol::InteractionPayload;

use crate::commands::{run_create_task, TaskRequest};
use crate::error::RelayError;
use crate::render::{self, ApproveValue};
use crate::state::AppState;
use crate::workflow::normalize_state_name;

#[derive(Debug)]
pub enum InteractionReply {
    /// Empty 200; closes a submitted modal.
    Ack,
    Errors(ViewErrorsResponse),
}

impl IntoResponse for InteractionReply {
    fn into_response(self) -> Response {
        match self {
            InteractionReply::Ack => StatusCode::OK.into_response(),
            InteractionReply::Errors(errors) => Json(errors).into_response(),
        }
    }
}

/// HTTP POST handler for `/slack/interactivity`.
pub async fn slack_interactivity(
    State(state): State<Arc<AppState>>,
    Form(form): Form<InteractionForm>,
) -> InteractionReply {
    match serde_json::from_str::<InteractionPayload>(&form.payload) {
        Ok(payload) => handle_interaction(&state, payload),
        Err(err) => {
            warn!(
                component = "interactivity",
                event = "interactivity.malformed",
                error = %err,
                "Ignoring undecodable interaction payload"
            );
            InteractionReply::Ack
        }
    }
}

pub fn handle_interaction(state: &Arc<AppState>, payload: InteractionPayload) -> InteractionReply {
    match payload {
        InteractionPayload::ViewSubmission { user, view } => {
            if view.callback_id != render::CREATE_TASK_CALLBACK {
                return InteractionReply::Ack;
            }
            let request =
                TaskRequest::from_view_state(&view.state, &user.id, &view.private_metadata);
            if let Err(err) = request.validate() {
                return InteractionReply::Errors(ViewErrorsResponse::single(
                    render::TITLE_BLOCK,
                    err.to_string(),
                ));
            }
            let state = Arc::clone(state);
            tokio::spawn(async move {
                run_create_task(&state, request).await;
            });
            InteractionReply::Ack
        }
        InteractionPayload::BlockActions {
            user,
            channel,
            container,
            actions,
        } => {
            let channel_id = channel
                .map(|channel| channel.id)
                .or_else(|| container.and_then(|container| container.channel_id));
            for action in actions {
                let Some(value) = approve_value(&action) else {
                    continue;
                };
                let state = Arc::clone(state);
                let user_id = user.id.clone();
                let channel_id = channel_id.clone();
                tokio::spawn(async move {
                    run_approve(&state, value, &user_id, channel_id.as_deref()).await;
                });
            }
            InteractionReply::Ack
        }
        InteractionPayload::Unsupported => InteractionReply::Ack,
    }
}

fn approve_value(action: &BlockAction) -> Option<ApproveValue> {
    if action.action_id != render::APPROVE_ACTION {
        return None;
    }
    let raw = action.value.as_deref()?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                component = "interactivity",
                event = "interactivity.approve_value_invalid",
                error = %err,
                "Approve button carried an unreadable value"
            );
            None
        }
    }
}

/// Run an approval and tell the approver if it failed.
pub async fn run_approve(
    state: &AppState,
    value: ApproveValue,
    approver_id: &str,
    channel_id: Option<&str>,
) {
    let issue_id = value.issue_id.clone();
    let Err(err) = approve_issue(state, &value.issue_id, &value.target, approver_id).await else {
        return;
    };
    warn!(
        component = "interactivity",
        event = "interactivity.approve_failed",
        issue_id = %issue_id,
        error = %err,
        "Approval failed"
    );
    let Some(channel_id) = channel_id else {
        return;
    };
    if let Err(post_err) = state
        .chat
        .post_ephemeral(channel_id, approver_id, &err.user_message())
        .await
    {
        warn!(
            component = "interactivity",
            event = "interactivity.ephemeral_failed",
            error = %post_err,
            "Failed to tell approver about the failure"
        );
    }
}

/// Move the issue into the workflow state matching `target` and confirm in its thread.
/// Returns the name of the state the issue was moved to.
pub async fn approve_issue(
    state: &AppState,
    issue_id: &str,
    target: &str,
    approver_id: &str,
) -> Result<String, RelayError> {
    let target_key = normalize_state_name(target);
    if target_key.is_empty() {
        return Err(RelayError::TargetStateNotFound {
            issue_id: issue_id.to_string(),
            target: target.to_string(),
        });
    }
    let states = state.tracker.workflow_states(issue_id).await?;
    let chosen = states
        .iter()
        .find(|candidate| normalize_state_name(&candidate.name) == target_key)
        .or_else(|| {
            states
                .iter()
                .find(|candidate| normalize_state_name(&candidate.name).contains(&target_key))
        })
        .ok_or_else(|| RelayError::TargetStateNotFound {
            issue_id: issue_id.to_string(),
            target: target.to_string(),
        })?;

    state.tracker.update_issue_state(issue_id, &chosen.id).await?;
    info!(
        component = "interactivity",
        event = "interactivity.approved",
        issue_id = %issue_id,
        state = %chosen.name,
        approver_id = %approver_id,
        "Issue approved"
    );

    if let Some(link) = state.directory.get(issue_id) {
        let message = render::approval_message(&link, approver_id, &chosen.name);
        if let Err(err) = state.chat.post_message(message).await {
            warn!(
                component = "interactivity",
                event = "interactivity.confirmation_failed",
                issue_id = %issue_id,
                error = %err,
                "Failed to confirm approval in thread"
            );
        }
    }

    Ok(chosen.name.clone())
}
