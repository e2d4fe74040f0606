//! `/create-task` slash command and the issue creation flow it drives.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use chrono::Utc;
use tracing::{debug, info, warn};

use threadrelay_connectors::{NewIssue, TrackerIssue, TrackerTeam};
use threadrelay_protocol::slack::{SlashResponse, ViewState};
use threadrelay_protocol::{IssueThreadLink, SlashCommand};

use crate::config::{team_matches, CommandMode};
use crate::error::RelayError;
use crate::render;
use crate::state::AppState;

/// Everything needed to create one issue from Slack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    pub title: String,
    /// Team name or key; falls back to the configured default team.
    pub team: Option<String>,
    pub details: Option<String>,
    pub category: Option<String>,
    pub requester_id: String,
    pub channel_id: String,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

impl TaskRequest {
    /// Parse `title | team | details`. Team and details are optional and
    /// details may contain further `|` characters.
    pub fn from_command_text(text: &str, requester_id: &str, channel_id: &str) -> Self {
        let mut parts = text.splitn(3, '|');
        Self {
            title: parts.next().unwrap_or_default().trim().to_string(),
            team: non_blank(parts.next()),
            details: non_blank(parts.next()),
            category: None,
            requester_id: requester_id.to_string(),
            channel_id: channel_id.to_string(),
        }
    }

    /// Read the fields of a submitted create-task modal.
    pub fn from_view_state(values: &ViewState, requester_id: &str, channel_id: &str) -> Self {
        Self {
            title: values
                .value(render::TITLE_BLOCK, render::TITLE_INPUT)
                .unwrap_or_default(),
            team: values.value(render::TEAM_BLOCK, render::TEAM_INPUT),
            details: values.value(render::DETAILS_BLOCK, render::DETAILS_INPUT),
            category: values.value(render::CATEGORY_BLOCK, render::CATEGORY_SELECT),
            requester_id: requester_id.to_string(),
            channel_id: channel_id.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.title.trim().is_empty() {
            return Err(RelayError::Validation(
                "A title is required. Try `/create-task Fix login | LAN | details`.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of a successful creation
#[derive(Debug, Clone)]
pub struct CreatedTask {
    pub issue: TrackerIssue,
    pub team: TrackerTeam,
    pub link: IssueThreadLink,
}

/// Immediate answer to a slash command invocation.
#[derive(Debug, PartialEq)]
pub enum CommandReply {
    /// Empty 200: Slack shows nothing (a modal was opened).
    Empty,
    Ephemeral(String),
}

impl IntoResponse for CommandReply {
    fn into_response(self) -> Response {
        match self {
            CommandReply::Empty => StatusCode::OK.into_response(),
            CommandReply::Ephemeral(text) => Json(SlashResponse::ephemeral(text)).into_response(),
        }
    }
}

/// HTTP POST handler for `/slack/commands/create-task`.
pub async fn create_task_command(
    State(state): State<Arc<AppState>>,
    Form(command): Form<SlashCommand>,
) -> CommandReply {
    handle_command(&state, command).await
}

pub async fn handle_command(state: &Arc<AppState>, command: SlashCommand) -> CommandReply {
    info!(
        component = "commands",
        event = "commands.received",
        command = %command.command,
        user_id = %command.user_id,
        channel_id = %command.channel_id,
        "Slash command received"
    );

    let trigger_id = command
        .trigger_id
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if state.config.command_mode == CommandMode::Modal && !trigger_id.is_empty() {
        let modal = render::create_task_modal(&command.channel_id, state.config.team.as_deref());
        return match state.chat.open_modal(trigger_id, &modal).await {
            Ok(()) => CommandReply::Empty,
            Err(err) => {
                warn!(
                    component = "commands",
                    event = "commands.modal_failed",
                    error = %err,
                    "Failed to open create-task modal"
                );
                CommandReply::Ephemeral(RelayError::from(err).user_message())
            }
        };
    }

    let request =
        TaskRequest::from_command_text(&command.text, &command.user_id, &command.channel_id);
    if let Err(err) = request.validate() {
        return CommandReply::Ephemeral(err.user_message());
    }

    let title = request.title.clone();
    let state = Arc::clone(state);
    tokio::spawn(async move {
        run_create_task(&state, request).await;
    });
    CommandReply::Ephemeral(format!(":hourglass_flowing_sand: Creating *{title}*…"))
}

/// Create the task and report failures to the requester.
pub async fn run_create_task(state: &AppState, request: TaskRequest) {
    let channel_id = request.channel_id.clone();
    let requester_id = request.requester_id.clone();
    let err = match create_task(state, request).await {
        Ok(created) => {
            debug!(
                component = "commands",
                event = "commands.create_finished",
                issue_id = %created.issue.id,
                team_key = %created.team.key,
                thread_ts = %created.link.thread_ts,
                "Task creation finished"
            );
            return;
        }
        Err(err) => err,
    };
    warn!(
        component = "commands",
        event = "commands.create_failed",
        channel_id = %channel_id,
        error = %err,
        "Task creation failed"
    );
    if let Err(post_err) = state
        .chat
        .post_ephemeral(&channel_id, &requester_id, &err.user_message())
        .await
    {
        warn!(
            component = "commands",
            event = "commands.ephemeral_failed",
            error = %post_err,
            "Failed to tell requester about the failure"
        );
    }
}

pub async fn create_task(
    state: &AppState,
    request: TaskRequest,
) -> Result<CreatedTask, RelayError> {
    request.validate()?;

    let team = find_team(state, request.team.as_deref()).await?;

    let requester_name = match state.chat.user_display_name(&request.requester_id).await {
        Ok(name) => name,
        Err(err) => {
            warn!(
                component = "commands",
                event = "commands.display_name_failed",
                user_id = %request.requester_id,
                error = %err,
                "Falling back to user id for requester name"
            );
            request.requester_id.clone()
        }
    };

    let description = render::issue_description(&request, &requester_name);
    let issue = state
        .tracker
        .create_issue(NewIssue {
            team_id: team.id.clone(),
            title: request.title.trim().to_string(),
            description: description.clone(),
        })
        .await?;

    let posted = state
        .chat
        .post_message(render::issue_created_message(
            &request.channel_id,
            &issue,
            &team,
            &request,
        ))
        .await?;

    let link = IssueThreadLink {
        issue_id: issue.id.clone(),
        channel_id: posted.channel.clone(),
        thread_ts: posted.ts.clone(),
        identifier: issue.identifier.clone(),
        created_by: format!("<@{}>", request.requester_id),
    };
    state.directory.put(link.clone());
    if let Some(state_name) = initial_state(state, &issue).await {
        state.states.put(&issue.id, &state_name, Utc::now());
    }

    info!(
        component = "commands",
        event = "commands.task_created",
        issue_id = %issue.id,
        identifier = %issue.identifier,
        team = %team.key,
        channel_id = %link.channel_id,
        thread_ts = %link.thread_ts,
        "Task created and linked to thread"
    );

    attach_thread_permalink(state, &link, &description).await;

    Ok(CreatedTask { issue, team, link })
}

/// State the issue was created in; refetched when the create response lacks it.
async fn initial_state(state: &AppState, issue: &TrackerIssue) -> Option<String> {
    if let Some(name) = issue.state_name.as_deref() {
        return Some(name.to_string());
    }
    match state.tracker.fetch_issue(&issue.id).await {
        Ok(fetched) => fetched.state_name,
        Err(err) => {
            warn!(
                component = "commands",
                event = "commands.initial_state_unknown",
                issue_id = %issue.id,
                error = %err,
                "Issue created without a known initial state"
            );
            None
        }
    }
}

/// Resolve the requested team, or the configured default, by walking every
/// page of teams. With neither, the first team listed is used.
async fn find_team(state: &AppState, hint: Option<&str>) -> Result<TrackerTeam, RelayError> {
    let wanted = hint
        .map(str::trim)
        .filter(|hint| !hint.is_empty())
        .or(state.config.team.as_deref());

    let mut cursor: Option<String> = None;
    loop {
        let page = state.tracker.list_teams(cursor.as_deref()).await?;
        let found = match wanted {
            Some(wanted) => page
                .teams
                .into_iter()
                .find(|team| team_matches(wanted, &team.key, &team.name)),
            None => page.teams.into_iter().next(),
        };
        if let Some(team) = found {
            return Ok(team);
        }
        match page.next_cursor {
            Some(next) if wanted.is_some() && cursor.as_deref() != Some(next.as_str()) => {
                cursor = Some(next);
            }
            _ => return Err(RelayError::TeamNotFound(wanted.unwrap_or_default().to_string())),
        }
    }
}

async fn attach_thread_permalink(state: &AppState, link: &IssueThreadLink, description: &str) {
    let domain = match state.chat.workspace_domain().await {
        Ok(domain) => domain,
        Err(err) => {
            warn!(
                component = "commands",
                event = "commands.permalink_skipped",
                issue_id = %link.issue_id,
                error = %err,
                "Workspace domain unavailable; issue keeps its original description"
            );
            return;
        }
    };
    let permalink = render::thread_permalink(&domain, &link.channel_id, &link.thread_ts);
    let linked = render::with_thread_link(description, &permalink);
    if let Err(err) = state.tracker.update_issue_description(&link.issue_id, &linked).await {
        warn!(
            component = "commands",
            event = "commands.permalink_failed",
            issue_id = %link.issue_id,
            error = %err,
            "Failed to add thread permalink to issue"
        );
    }
}
