//! Application state

use std::sync::Arc;

use threadrelay_connectors::{ChatPlatform, IssueTracker};

use crate::config::RelayConfig;
use crate::directory::IssueDirectory;
use crate::state_cache::StateCache;
use crate::transition::TransitionPolicy;

/// Shared state handed to every HTTP handler
pub struct AppState {
    pub config: RelayConfig,
    pub policy: TransitionPolicy,
    pub directory: Arc<IssueDirectory>,
    pub states: Arc<StateCache>,
    pub chat: Arc<dyn ChatPlatform>,
    pub tracker: Arc<dyn IssueTracker>,
}

impl AppState {
    pub fn new(
        config: RelayConfig,
        directory: Arc<IssueDirectory>,
        states: Arc<StateCache>,
        chat: Arc<dyn ChatPlatform>,
        tracker: Arc<dyn IssueTracker>,
    ) -> Self {
        let policy = config.transition_policy();
        Self {
            config,
            policy,
            directory,
            states,
            chat,
            tracker,
        }
    }
}
