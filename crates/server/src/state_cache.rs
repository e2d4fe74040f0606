//! Last processed workflow state per issue.
//!
//! Used as the comparison baseline when a webhook omits the previous state.
//! Every processed event overwrites the entry, whether or not it notified.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use threadrelay_protocol::IssueStateSnapshot;

#[derive(Debug, Default)]
pub struct StateCache {
    states: DashMap<String, IssueStateSnapshot>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, issue_id: &str) -> Option<IssueStateSnapshot> {
        self.states.get(issue_id).map(|entry| entry.value().clone())
    }

    /// Record `state_name` as the latest state, returning the replaced snapshot.
    pub fn put(
        &self,
        issue_id: &str,
        state_name: &str,
        observed_at: DateTime<Utc>,
    ) -> Option<IssueStateSnapshot> {
        self.states.insert(
            issue_id.to_string(),
            IssueStateSnapshot {
                issue_id: issue_id.to_string(),
                state_name: state_name.to_string(),
                observed_at,
            },
        )
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// All snapshots, sorted by issue id.
    pub fn entries(&self) -> Vec<IssueStateSnapshot> {
        let mut states: Vec<_> = self
            .states
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        states.sort_by(|a, b| a.issue_id.cmp(&b.issue_id));
        states
    }
}
