//! Linear webhook ingestion.
//!
//! Linear retries deliveries that do not get a 2xx, so every delivery is
//! acknowledged with `200 OK` no matter what happened while processing it.
//! Events are processed inline rather than spawned so that two deliveries for
//! the same issue update the state cache in arrival order.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{debug, info, warn};

use threadrelay_connectors::OutgoingMessage;
use threadrelay_protocol::{IssueThreadLink, LinearWebhook};

use crate::render;
use crate::state::AppState;
use crate::transition::{assignment_notice, PreviousState, TransitionDecision};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotAnIssue,
    Removed,
    Malformed,
    OutOfScope,
    Unmapped,
    NoState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Ignored(IgnoreReason),
    Processed {
        previous: PreviousState,
        decision: TransitionDecision,
        /// A transition message reached the thread.
        notified: bool,
        /// An assignment message reached the thread.
        assigned: bool,
    },
}

impl EventOutcome {
    pub fn notified(&self) -> bool {
        matches!(self, EventOutcome::Processed { notified: true, .. })
    }
}

/// HTTP POST handler for `/webhook/linear`.
///
/// Takes the raw body so malformed JSON is logged and acknowledged instead of
/// being rejected by the extractor.
pub async fn linear_webhook(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    match serde_json::from_slice::<LinearWebhook>(&body) {
        Ok(event) => {
            let outcome = process_event(&state, event).await;
            debug!(
                component = "webhook",
                event = "webhook.processed",
                notified = outcome.notified(),
                outcome = ?outcome,
                "Linear webhook processed"
            );
        }
        Err(err) => {
            warn!(
                component = "webhook",
                event = "webhook.malformed",
                error = %err,
                bytes = body.len(),
                "Ignoring malformed Linear webhook"
            );
        }
    }
    (StatusCode::OK, "OK")
}

pub async fn process_event(state: &AppState, event: LinearWebhook) -> EventOutcome {
    if !event.is_issue() {
        return EventOutcome::Ignored(IgnoreReason::NotAnIssue);
    }
    if event.action.eq_ignore_ascii_case("remove") {
        return EventOutcome::Ignored(IgnoreReason::Removed);
    }

    let issue = match event.issue() {
        Ok(issue) => issue,
        Err(err) => {
            warn!(
                component = "webhook",
                event = "webhook.issue_malformed",
                error = %err,
                "Issue webhook data could not be decoded"
            );
            return EventOutcome::Ignored(IgnoreReason::Malformed);
        }
    };

    let team_key = issue.team.as_ref().and_then(|team| team.key.as_deref());
    let team_name = issue.team.as_ref().and_then(|team| team.name.as_deref());
    if !state.config.team_in_scope(team_key, team_name) {
        return EventOutcome::Ignored(IgnoreReason::OutOfScope);
    }

    let Some(link) = state.directory.get(&issue.id) else {
        debug!(
            component = "webhook",
            event = "webhook.unmapped",
            issue_id = %issue.id,
            "No thread linked to issue"
        );
        return EventOutcome::Ignored(IgnoreReason::Unmapped);
    };

    let Some(current) = issue.state_name().map(ToOwned::to_owned) else {
        return EventOutcome::Ignored(IgnoreReason::NoState);
    };

    let explicit = explicit_previous_state(state, &event, &issue.id, &current).await;
    let cached = state.states.get(&issue.id);
    let previous = state
        .policy
        .resolve_previous_state(explicit.as_deref(), cached.as_ref(), &current);
    let decision = state.policy.evaluate(&previous, &current);

    info!(
        component = "webhook",
        event = "webhook.transition",
        issue_id = %issue.id,
        identifier = %link.identifier,
        previous = ?previous,
        current = %current,
        notify = decision.is_notify(),
        "Evaluated issue transition"
    );

    let notified = match &decision {
        TransitionDecision::Notify(announcement) => {
            let message =
                render::transition_message(&link, issue.url.as_deref(), &current, announcement);
            post_to_thread(state, &link, message).await
        }
        TransitionDecision::Skip(_) => false,
    };

    let assigned = match assignment_notice(
        event.updated_from.as_ref().and_then(|from| from.previously_assigned()),
        issue.assignee.as_ref(),
    ) {
        Some(notice) => {
            post_to_thread(state, &link, render::assignment_message(&link, &notice)).await
        }
        None => false,
    };

    state.states.put(&issue.id, &current, Utc::now());

    EventOutcome::Processed {
        previous,
        decision,
        notified,
        assigned,
    }
}

/// Previous state name reported by the event itself.
///
/// When Linear only sent the previous `stateId`, the name is recovered from the
/// newest history entry that moved the issue into its current state.
async fn explicit_previous_state(
    state: &AppState,
    event: &LinearWebhook,
    issue_id: &str,
    current: &str,
) -> Option<String> {
    let updated_from = event.updated_from.as_ref()?;
    if let Some(name) = updated_from.state_name() {
        return Some(name.to_string());
    }
    if !updated_from.state_changed_without_name() {
        return None;
    }

    match state.tracker.issue_history(issue_id).await {
        Ok(history) => history
            .into_iter()
            .find(|change| {
                change
                    .to_state
                    .as_deref()
                    .is_some_and(|to| to.trim().eq_ignore_ascii_case(current.trim()))
            })
            .and_then(|change| change.from_state)
            .filter(|name| !name.trim().is_empty()),
        Err(err) => {
            warn!(
                component = "webhook",
                event = "webhook.history_failed",
                issue_id = %issue_id,
                error = %err,
                "Could not recover previous state from issue history"
            );
            None
        }
    }
}

async fn post_to_thread(
    state: &AppState,
    link: &IssueThreadLink,
    message: OutgoingMessage,
) -> bool {
    match state.chat.post_message(message).await {
        Ok(_) => true,
        Err(err) => {
            warn!(
                component = "webhook",
                event = "webhook.post_failed",
                issue_id = %link.issue_id,
                channel_id = %link.channel_id,
                error = %err,
                "Failed to post into issue thread"
            );
            false
        }
    }
}
