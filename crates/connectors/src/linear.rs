//! Linear GraphQL client.

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    truncate_for_error, ConnectorError, IssueStateChange, IssueTracker, NewIssue, TeamPage,
    TrackerIssue, TrackerTeam, TrackerWorkflowState,
};

pub const DEFAULT_LINEAR_API_URL: &str = "https://api.linear.app/graphql";
const SERVICE: &str = "linear";
const TEAM_PAGE_SIZE: u32 = 50;
const HISTORY_PAGE_SIZE: u32 = 50;

const TEAMS_QUERY: &str = r#"
query Teams($first: Int!, $after: String) {
  teams(first: $first, after: $after) {
    nodes {
      id
      key
      name
    }
    pageInfo {
      hasNextPage
      endCursor
    }
  }
}
"#;

const ISSUE_CREATE_MUTATION: &str = r#"
mutation CreateIssue($input: IssueCreateInput!) {
  issueCreate(input: $input) {
    success
    issue {
      id
      identifier
      title
      url
      description
      state {
        name
      }
    }
  }
}
"#;

const ISSUE_DETAILS_QUERY: &str = r#"
query IssueDetails($id: String!) {
  issue(id: $id) {
    id
    identifier
    title
    url
    description
    state {
      name
    }
  }
}
"#;

const UPDATE_ISSUE_DESCRIPTION_MUTATION: &str = r#"
mutation UpdateIssueDescription($id: String!, $description: String!) {
  issueUpdate(id: $id, input: { description: $description }) {
    success
  }
}
"#;

const UPDATE_ISSUE_STATE_MUTATION: &str = r#"
mutation UpdateIssueState($id: String!, $stateId: String!) {
  issueUpdate(id: $id, input: { stateId: $stateId }) {
    success
  }
}
"#;

const ISSUE_TEAM_STATES_QUERY: &str = r#"
query IssueTeamStates($id: String!) {
  issue(id: $id) {
    id
    team {
      states {
        nodes {
          id
          name
          position
        }
      }
    }
  }
}
"#;

const ISSUE_HISTORY_QUERY: &str = r#"
query IssueHistory($id: String!, $first: Int!) {
  issue(id: $id) {
    history(first: $first) {
      nodes {
        createdAt
        fromState {
          name
        }
        toState {
          name
        }
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Nodes<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    #[serde(default)]
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamConnection {
    nodes: Vec<TeamNode>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct TeamNode {
    id: String,
    key: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct TeamsData {
    teams: TeamConnection,
}

#[derive(Debug, Deserialize)]
struct NamedNode {
    name: String,
}

#[derive(Debug, Deserialize)]
struct IssueNode {
    id: String,
    identifier: String,
    title: String,
    url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    state: Option<NamedNode>,
}

impl From<IssueNode> for TrackerIssue {
    fn from(node: IssueNode) -> Self {
        Self {
            id: node.id,
            identifier: node.identifier,
            title: node.title,
            url: node.url,
            description: node.description,
            state_name: node.state.map(|state| state.name),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueCreateData {
    issue_create: IssueCreatePayload,
}

#[derive(Debug, Deserialize)]
struct IssueCreatePayload {
    success: bool,
    #[serde(default)]
    issue: Option<IssueNode>,
}

#[derive(Debug, Deserialize)]
struct IssueData<T> {
    issue: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueUpdateData {
    issue_update: SuccessPayload,
}

#[derive(Debug, Deserialize)]
struct SuccessPayload {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct IssueTeamStates {
    team: TeamStates,
}

#[derive(Debug, Deserialize)]
struct TeamStates {
    states: Nodes<StateNode>,
}

#[derive(Debug, Deserialize)]
struct StateNode {
    id: String,
    name: String,
    #[serde(default)]
    position: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct IssueHistory {
    history: Nodes<HistoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryNode {
    created_at: String,
    #[serde(default)]
    from_state: Option<NamedNode>,
    #[serde(default)]
    to_state: Option<NamedNode>,
}

#[derive(Clone)]
pub struct LinearClient {
    endpoint: String,
    api_key: String,
    http: reqwest::Client,
}

impl fmt::Debug for LinearClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LinearClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl LinearClient {
    pub fn new(endpoint: &str, api_key: &str) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder()
            .user_agent("threadrelay/linear")
            .build()?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            api_key: api_key.trim().to_string(),
            http,
        })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<T, ConnectorError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", &self.api_key)
            .json(&json!({
                "query": query,
                "variables": variables,
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ConnectorError::HttpStatus {
                service: SERVICE,
                status: status.as_u16(),
                body: truncate_for_error(&body),
            });
        }

        let envelope: GraphqlEnvelope = serde_json::from_str(&body)?;
        if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
            let message = errors
                .into_iter()
                .map(|error| error.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ConnectorError::ApiError {
                service: SERVICE,
                message: format!("{operation} failed: {message}"),
            });
        }

        let data = envelope.data.ok_or(ConnectorError::MissingField {
            service: SERVICE,
            field: "data",
        })?;
        debug!(component = "linear", operation, "Linear GraphQL call succeeded");
        Ok(serde_json::from_value(data)?)
    }

    async fn issue_node<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<T, ConnectorError> {
        let data: IssueData<T> = self.execute(operation, query, variables).await?;
        data.issue.ok_or(ConnectorError::MissingField {
            service: SERVICE,
            field: "issue",
        })
    }

    fn ensure_success(operation: &str, success: bool) -> Result<(), ConnectorError> {
        if success {
            Ok(())
        } else {
            Err(ConnectorError::ApiError {
                service: SERVICE,
                message: format!("{operation} reported success=false"),
            })
        }
    }
}

#[async_trait]
impl IssueTracker for LinearClient {
    async fn list_teams(&self, after: Option<&str>) -> Result<TeamPage, ConnectorError> {
        let data: TeamsData = self
            .execute(
                "teams",
                TEAMS_QUERY,
                json!({ "first": TEAM_PAGE_SIZE, "after": after }),
            )
            .await?;
        let connection = data.teams;
        let next_cursor = if connection.page_info.has_next_page {
            connection.page_info.end_cursor
        } else {
            None
        };
        Ok(TeamPage {
            teams: connection
                .nodes
                .into_iter()
                .map(|node| TrackerTeam {
                    id: node.id,
                    key: node.key,
                    name: node.name,
                })
                .collect(),
            next_cursor,
        })
    }

    async fn create_issue(&self, issue: NewIssue) -> Result<TrackerIssue, ConnectorError> {
        let data: IssueCreateData = self
            .execute(
                "issueCreate",
                ISSUE_CREATE_MUTATION,
                json!({
                    "input": {
                        "teamId": issue.team_id,
                        "title": issue.title,
                        "description": issue.description,
                    }
                }),
            )
            .await?;
        Self::ensure_success("issueCreate", data.issue_create.success)?;
        data.issue_create
            .issue
            .map(TrackerIssue::from)
            .ok_or(ConnectorError::MissingField {
                service: SERVICE,
                field: "issueCreate.issue",
            })
    }

    async fn update_issue_description(
        &self,
        issue_id: &str,
        description: &str,
    ) -> Result<(), ConnectorError> {
        let data: IssueUpdateData = self
            .execute(
                "issueUpdate",
                UPDATE_ISSUE_DESCRIPTION_MUTATION,
                json!({ "id": issue_id, "description": description }),
            )
            .await?;
        Self::ensure_success("issueUpdate", data.issue_update.success)
    }

    async fn update_issue_state(
        &self,
        issue_id: &str,
        state_id: &str,
    ) -> Result<(), ConnectorError> {
        let data: IssueUpdateData = self
            .execute(
                "issueUpdate",
                UPDATE_ISSUE_STATE_MUTATION,
                json!({ "id": issue_id, "stateId": state_id }),
            )
            .await?;
        Self::ensure_success("issueUpdate", data.issue_update.success)
    }

    async fn fetch_issue(&self, issue_id: &str) -> Result<TrackerIssue, ConnectorError> {
        let node: IssueNode = self
            .issue_node("issue", ISSUE_DETAILS_QUERY, json!({ "id": issue_id }))
            .await?;
        Ok(node.into())
    }

    async fn workflow_states(
        &self,
        issue_id: &str,
    ) -> Result<Vec<TrackerWorkflowState>, ConnectorError> {
        let node: IssueTeamStates = self
            .issue_node(
                "issueTeamStates",
                ISSUE_TEAM_STATES_QUERY,
                json!({ "id": issue_id }),
            )
            .await?;
        Ok(node
            .team
            .states
            .nodes
            .into_iter()
            .map(|state| TrackerWorkflowState {
                id: state.id,
                name: state.name,
                position: state.position,
            })
            .collect())
    }

    async fn issue_history(&self, issue_id: &str) -> Result<Vec<IssueStateChange>, ConnectorError> {
        let node: IssueHistory = self
            .issue_node(
                "issueHistory",
                ISSUE_HISTORY_QUERY,
                json!({ "id": issue_id, "first": HISTORY_PAGE_SIZE }),
            )
            .await?;
        let mut changes: Vec<IssueStateChange> = node
            .history
            .nodes
            .into_iter()
            .filter(|entry| entry.from_state.is_some() || entry.to_state.is_some())
            .map(|entry| IssueStateChange {
                created_at: entry.created_at,
                from_state: entry.from_state.map(|state| state.name),
                to_state: entry.to_state.map(|state| state.name),
            })
            .collect();
        changes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> LinearClient {
        LinearClient::new(&server.url("/graphql"), "lin_api_test").expect("client")
    }

    #[tokio::test]
    async fn list_teams_reports_next_cursor_only_when_more_pages_exist() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(POST)
                .path("/graphql")
                .header("authorization", "lin_api_test")
                .body_includes("\"after\":null");
            then.status(200).json_body(json!({
                "data": { "teams": {
                    "nodes": [{ "id": "t1", "key": "ENG", "name": "Engineering" }],
                    "pageInfo": { "hasNextPage": true, "endCursor": "cursor-1" }
                } }
            }));
        });
        let second = server.mock(|when, then| {
            when.method(POST)
                .path("/graphql")
                .body_includes("\"after\":\"cursor-1\"");
            then.status(200).json_body(json!({
                "data": { "teams": {
                    "nodes": [{ "id": "t2", "key": "LAN", "name": "Landing" }],
                    "pageInfo": { "hasNextPage": false, "endCursor": "cursor-2" }
                } }
            }));
        });

        let client = client(&server);
        let page = client.list_teams(None).await.expect("first page");
        assert_eq!(page.teams[0].key, "ENG");
        assert_eq!(page.next_cursor.as_deref(), Some("cursor-1"));

        let page = client.list_teams(Some("cursor-1")).await.expect("second page");
        assert_eq!(page.teams[0].key, "LAN");
        assert_eq!(page.next_cursor, None);

        first.assert();
        second.assert();
    }

    #[tokio::test]
    async fn graphql_errors_become_api_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/graphql");
            then.status(200).json_body(json!({
                "errors": [{ "message": "Entity not found" }]
            }));
        });

        let err = client(&server)
            .fetch_issue("missing")
            .await
            .expect_err("should fail");
        assert!(matches!(err, ConnectorError::ApiError { .. }));
        assert!(err.to_string().contains("Entity not found"));
    }

    #[tokio::test]
    async fn history_is_sorted_newest_first_and_skips_non_state_entries() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/graphql");
            then.status(200).json_body(json!({
                "data": { "issue": { "history": { "nodes": [
                    { "createdAt": "2024-05-01T10:00:00.000Z",
                      "fromState": { "name": "Todo" }, "toState": { "name": "In Progress" } },
                    { "createdAt": "2024-05-01T09:00:00.000Z",
                      "fromState": null, "toState": null },
                    { "createdAt": "2024-05-02T10:00:00.000Z",
                      "fromState": { "name": "In Progress" }, "toState": { "name": "In Review" } }
                ] } } }
            }));
        });

        let history = client(&server)
            .issue_history("issue-1")
            .await
            .expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].to_state.as_deref(), Some("In Review"));
        assert_eq!(history[1].from_state.as_deref(), Some("Todo"));
    }

    #[tokio::test]
    async fn create_issue_rejects_unsuccessful_mutation() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/graphql").body_includes("issueCreate");
            then.status(200).json_body(json!({
                "data": { "issueCreate": { "success": false, "issue": null } }
            }));
        });

        let err = client(&server)
            .create_issue(NewIssue {
                team_id: "t1".into(),
                title: "Title".into(),
                description: "Body".into(),
            })
            .await
            .expect_err("should fail");
        assert!(err.to_string().contains("success=false"));
    }
}
