//! Core types shared across the relay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Association between a tracker issue and the chat thread it was created from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueThreadLink {
    pub issue_id: String,
    pub channel_id: String,
    pub thread_ts: String,
    /// Human-readable issue code, e.g. `LAN-42`
    pub identifier: String,
    /// Mentionable handle of the requester, e.g. `<@U123>`
    pub created_by: String,
}

/// Last processed workflow state of an issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueStateSnapshot {
    pub issue_id: String,
    pub state_name: String,
    pub observed_at: DateTime<Utc>,
}

/// `GET /health` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub mapped_issues: usize,
    pub cached_states: usize,
    pub timestamp: DateTime<Utc>,
}

/// `GET /debug/mappings` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingsDump {
    pub mappings: Vec<IssueThreadLink>,
    pub states: Vec<IssueStateSnapshot>,
}
