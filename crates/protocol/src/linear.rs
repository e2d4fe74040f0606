//! Linear webhook payloads (Linear → relay)

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Envelope of every Linear webhook delivery.
///
/// `data` stays untyped until the event kind is known; only `Issue`
/// deliveries are decoded further via [`LinearWebhook::issue`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearWebhook {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub updated_from: Option<IssueUpdatedFrom>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub webhook_id: Option<String>,
}

impl LinearWebhook {
    pub const ISSUE_KIND: &'static str = "Issue";

    pub fn is_issue(&self) -> bool {
        self.kind.eq_ignore_ascii_case(Self::ISSUE_KIND)
    }

    /// Decode `data` as an issue payload.
    pub fn issue(&self) -> Result<IssueData, serde_json::Error> {
        IssueData::deserialize(&self.data)
    }
}

/// Issue fields carried in `data`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueData {
    pub id: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub state: Option<StateRef>,
    #[serde(default)]
    pub assignee: Option<UserRef>,
    #[serde(default)]
    pub team: Option<TeamRef>,
}

impl IssueData {
    /// Current state name, if the payload carries a non-blank one.
    pub fn state_name(&self) -> Option<&str> {
        self.state
            .as_ref()
            .map(|state| state.name.trim())
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub position: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl UserRef {
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Previous values of the fields that changed in an `update` delivery.
///
/// Linear only includes keys that changed, so a present-but-null
/// `assigneeId` means "was unassigned" while an absent key means
/// "assignee unchanged".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueUpdatedFrom {
    #[serde(default)]
    pub state: Option<PreviousState>,
    #[serde(default)]
    pub state_id: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub assignee_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub assignee: Option<Option<UserRef>>,
}

impl IssueUpdatedFrom {
    /// Explicit previous state name, if the delivery carried one.
    pub fn state_name(&self) -> Option<&str> {
        self.state
            .as_ref()
            .map(PreviousState::name)
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// The state changed but only its id was reported.
    pub fn state_changed_without_name(&self) -> bool {
        self.state_name().is_none() && self.state_id.is_some()
    }

    /// `None` when the assignee did not change; `Some(false)` when the issue
    /// previously had no assignee.
    pub fn previously_assigned(&self) -> Option<bool> {
        match (&self.assignee_id, &self.assignee) {
            (Some(Some(_)), _) | (_, Some(Some(_))) => Some(true),
            (Some(None), _) | (_, Some(None)) => Some(false),
            (None, None) => None,
        }
    }
}

/// Previous state, sent either as a bare name or as a state object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreviousState {
    Name(String),
    State(StateRef),
}

impl PreviousState {
    pub fn name(&self) -> &str {
        match self {
            PreviousState::Name(name) => name,
            PreviousState::State(state) => &state.name,
        }
    }
}

/// Distinguishes an explicit `null` from an absent key.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_issue_update_with_state_object() {
        let payload: LinearWebhook = serde_json::from_value(json!({
            "type": "Issue",
            "action": "update",
            "data": {
                "id": "issue-1",
                "identifier": "LAN-42",
                "title": "Fix login",
                "state": { "id": "s2", "name": "In Progress", "position": 2.0 },
                "team": { "key": "LAN", "name": "Landing" },
                "url": "https://linear.app/acme/issue/LAN-42"
            },
            "updatedFrom": { "state": { "name": "Todo" }, "stateId": "s1" }
        }))
        .expect("payload should decode");

        assert!(payload.is_issue());
        let issue = payload.issue().expect("issue data");
        assert_eq!(issue.identifier, "LAN-42");
        assert_eq!(issue.state_name(), Some("In Progress"));
        let from = payload.updated_from.expect("updatedFrom");
        assert_eq!(from.state_name(), Some("Todo"));
        assert!(!from.state_changed_without_name());
        assert_eq!(from.previously_assigned(), None);
    }

    #[test]
    fn previous_state_may_be_a_bare_name() {
        let from: IssueUpdatedFrom =
            serde_json::from_value(json!({ "state": "In Review" })).expect("decode");
        assert_eq!(from.state_name(), Some("In Review"));
    }

    #[test]
    fn null_assignee_id_means_previously_unassigned() {
        let from: IssueUpdatedFrom =
            serde_json::from_value(json!({ "assigneeId": null })).expect("decode");
        assert_eq!(from.previously_assigned(), Some(false));

        let from: IssueUpdatedFrom =
            serde_json::from_value(json!({ "assigneeId": "user-9" })).expect("decode");
        assert_eq!(from.previously_assigned(), Some(true));

        let from: IssueUpdatedFrom =
            serde_json::from_value(json!({ "stateId": "s1" })).expect("decode");
        assert_eq!(from.previously_assigned(), None);
        assert!(from.state_changed_without_name());
    }

    #[test]
    fn blank_state_name_is_treated_as_missing() {
        let issue: IssueData = serde_json::from_value(json!({
            "id": "issue-1",
            "state": { "name": "   " }
        }))
        .expect("decode");
        assert_eq!(issue.state_name(), None);
    }
}
