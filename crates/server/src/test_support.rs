//! In-memory collaborators for handler tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use threadrelay_connectors::{
    ChatPlatform, ConnectorError, IssueStateChange, IssueTracker, NewIssue, OutgoingMessage,
    PostedMessage, TeamPage, TrackerIssue, TrackerTeam, TrackerWorkflowState,
};
use threadrelay_protocol::{IssueThreadLink, ModalView};

use crate::config::RelayConfig;
use crate::directory::IssueDirectory;
use crate::state::AppState;
use crate::state_cache::StateCache;

fn unavailable(service: &'static str) -> ConnectorError {
    ConnectorError::ApiError {
        service,
        message: "unavailable".to_string(),
    }
}

#[derive(Default)]
pub struct FakeChat {
    posts: Mutex<Vec<OutgoingMessage>>,
    ephemerals: Mutex<Vec<(String, String, String)>>,
    modals: Mutex<Vec<(String, ModalView)>>,
    fail_posts: Mutex<bool>,
    fail_domain: Mutex<bool>,
}

impl FakeChat {
    pub fn posts(&self) -> Vec<OutgoingMessage> {
        self.posts.lock().unwrap().clone()
    }

    /// `(channel, user, text)` triples.
    pub fn ephemerals(&self) -> Vec<(String, String, String)> {
        self.ephemerals.lock().unwrap().clone()
    }

    pub fn modals(&self) -> Vec<(String, ModalView)> {
        self.modals.lock().unwrap().clone()
    }

    pub fn fail_posts(&self) {
        *self.fail_posts.lock().unwrap() = true;
    }

    pub fn fail_domain(&self) {
        *self.fail_domain.lock().unwrap() = true;
    }
}

#[async_trait]
impl ChatPlatform for FakeChat {
    async fn open_modal(&self, trigger_id: &str, view: &ModalView) -> Result<(), ConnectorError> {
        self.modals
            .lock()
            .unwrap()
            .push((trigger_id.to_string(), view.clone()));
        Ok(())
    }

    async fn post_message(
        &self,
        message: OutgoingMessage,
    ) -> Result<PostedMessage, ConnectorError> {
        if *self.fail_posts.lock().unwrap() {
            return Err(unavailable("slack"));
        }
        let mut posts = self.posts.lock().unwrap();
        posts.push(message.clone());
        Ok(PostedMessage {
            channel: message.channel,
            ts: format!("1700000001.{:06}", posts.len()),
        })
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
    ) -> Result<(), ConnectorError> {
        self.ephemerals
            .lock()
            .unwrap()
            .push((channel.to_string(), user.to_string(), text.to_string()));
        Ok(())
    }

    async fn user_display_name(&self, user_id: &str) -> Result<String, ConnectorError> {
        Ok(format!("Display {user_id}"))
    }

    async fn workspace_domain(&self) -> Result<String, ConnectorError> {
        if *self.fail_domain.lock().unwrap() {
            return Err(unavailable("slack"));
        }
        Ok("acme".to_string())
    }
}

#[derive(Default)]
pub struct FakeTracker {
    team_pages: Vec<Vec<TrackerTeam>>,
    workflow_states: Vec<TrackerWorkflowState>,
    /// `(from, to)` pairs, newest first
    history: Vec<(String, String)>,
    /// Initial state only available through `fetch_issue`
    fetched_state: Option<String>,
    team_calls: Mutex<usize>,
    created: Mutex<Vec<NewIssue>>,
    description_updates: Mutex<Vec<(String, String)>>,
    state_updates: Mutex<Vec<(String, String)>>,
}

impl FakeTracker {
    /// Page `n` is served for cursor `page-n`; every page but the last has a next cursor.
    pub fn with_team_pages(mut self, pages: Vec<Vec<TrackerTeam>>) -> Self {
        self.team_pages = pages;
        self
    }

    pub fn with_workflow_states(mut self, states: Vec<TrackerWorkflowState>) -> Self {
        self.workflow_states = states;
        self
    }

    pub fn with_history(mut self, history: Vec<(&str, &str)>) -> Self {
        self.history = history
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        self
    }

    pub fn with_fetched_initial_state(mut self, name: &str) -> Self {
        self.fetched_state = Some(name.to_string());
        self
    }

    pub fn team_calls(&self) -> usize {
        *self.team_calls.lock().unwrap()
    }

    pub fn created_issues(&self) -> Vec<NewIssue> {
        self.created.lock().unwrap().clone()
    }

    pub fn description_updates(&self) -> Vec<(String, String)> {
        self.description_updates.lock().unwrap().clone()
    }

    pub fn state_updates(&self) -> Vec<(String, String)> {
        self.state_updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn list_teams(&self, after: Option<&str>) -> Result<TeamPage, ConnectorError> {
        *self.team_calls.lock().unwrap() += 1;
        let index = match after {
            None => 0,
            Some(cursor) => cursor
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| unavailable("linear"))?,
        };
        let teams = self.team_pages.get(index).cloned().unwrap_or_default();
        let next_cursor =
            (index + 1 < self.team_pages.len()).then(|| format!("page-{}", index + 1));
        Ok(TeamPage { teams, next_cursor })
    }

    async fn create_issue(&self, issue: NewIssue) -> Result<TrackerIssue, ConnectorError> {
        let mut created = self.created.lock().unwrap();
        created.push(issue.clone());
        let number = created.len();
        Ok(TrackerIssue {
            id: format!("created-{number}"),
            identifier: format!("LAN-{}", 100 + number),
            title: issue.title,
            url: format!("https://linear.app/acme/issue/LAN-{}", 100 + number),
            description: Some(issue.description),
            state_name: match self.fetched_state {
                Some(_) => None,
                None => Some("Todo".to_string()),
            },
        })
    }

    async fn update_issue_description(
        &self,
        issue_id: &str,
        description: &str,
    ) -> Result<(), ConnectorError> {
        self.description_updates
            .lock()
            .unwrap()
            .push((issue_id.to_string(), description.to_string()));
        Ok(())
    }

    async fn update_issue_state(
        &self,
        issue_id: &str,
        state_id: &str,
    ) -> Result<(), ConnectorError> {
        self.state_updates
            .lock()
            .unwrap()
            .push((issue_id.to_string(), state_id.to_string()));
        Ok(())
    }

    async fn fetch_issue(&self, issue_id: &str) -> Result<TrackerIssue, ConnectorError> {
        let state_name = self.fetched_state.clone().ok_or_else(|| ConnectorError::ApiError {
            service: "linear",
            message: format!("issue {issue_id} not found"),
        })?;
        Ok(TrackerIssue {
            id: issue_id.to_string(),
            identifier: "LAN-0".to_string(),
            title: String::new(),
            url: String::new(),
            description: None,
            state_name: Some(state_name),
        })
    }

    async fn workflow_states(
        &self,
        _issue_id: &str,
    ) -> Result<Vec<TrackerWorkflowState>, ConnectorError> {
        Ok(self.workflow_states.clone())
    }

    async fn issue_history(
        &self,
        _issue_id: &str,
    ) -> Result<Vec<IssueStateChange>, ConnectorError> {
        Ok(self
            .history
            .iter()
            .enumerate()
            .map(|(index, (from, to))| IssueStateChange {
                created_at: format!("2024-01-0{}T00:00:00Z", 9 - index.min(8)),
                from_state: Some(from.clone()),
                to_state: Some(to.clone()),
            })
            .collect())
    }
}

pub fn team(id: &str, key: &str, name: &str) -> TrackerTeam {
    TrackerTeam {
        id: id.to_string(),
        key: key.to_string(),
        name: name.to_string(),
    }
}

pub fn workflow_state(id: &str, name: &str) -> TrackerWorkflowState {
    TrackerWorkflowState {
        id: id.to_string(),
        name: name.to_string(),
        position: None,
    }
}

/// State with empty stores.
pub fn app_state(
    config: RelayConfig,
    tracker: FakeTracker,
) -> (AppState, Arc<FakeChat>, Arc<FakeTracker>) {
    let chat = Arc::new(FakeChat::default());
    let tracker = Arc::new(tracker);
    let state = AppState::new(
        config,
        Arc::new(IssueDirectory::new()),
        Arc::new(StateCache::new()),
        chat.clone(),
        tracker.clone(),
    );
    (state, chat, tracker)
}

/// State where `issue-1` (`LAN-1`) is linked to thread `1700000000.000100` in `C1`
/// and nothing is cached yet.
pub fn linked_state(
    config: RelayConfig,
    tracker: FakeTracker,
) -> (AppState, Arc<FakeChat>, Arc<FakeTracker>) {
    let (state, chat, tracker) = app_state(config, tracker);
    state.directory.put(IssueThreadLink {
        issue_id: "issue-1".to_string(),
        channel_id: "C1".to_string(),
        thread_ts: "1700000000.000100".to_string(),
        identifier: "LAN-1".to_string(),
        created_by: "<@U1>".to_string(),
    });
    (state, chat, tracker)
}
