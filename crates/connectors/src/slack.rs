//! Slack Web API client.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use threadrelay_protocol::ModalView;
use tracing::debug;

use crate::{truncate_for_error, ChatPlatform, ConnectorError, OutgoingMessage, PostedMessage};

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
const SERVICE: &str = "slack";

#[derive(Debug, Deserialize)]
struct SlackEnvelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Deserialize)]
struct Empty {}

#[derive(Debug, Deserialize)]
struct ChatMessageBody {
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfoBody {
    #[serde(default)]
    user: Option<SlackUserInfo>,
}

#[derive(Debug, Deserialize)]
struct SlackUserInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<SlackProfile>,
}

#[derive(Debug, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TeamInfoBody {
    #[serde(default)]
    team: Option<SlackTeamInfo>,
}

#[derive(Debug, Deserialize)]
struct SlackTeamInfo {
    #[serde(default)]
    domain: Option<String>,
}

#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("api_base", &self.api_base)
            .field("bot_token", &"<redacted>")
            .finish()
    }
}

impl SlackClient {
    pub fn new(api_base: &str, bot_token: &str) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder()
            .user_agent("threadrelay/slack")
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.trim().to_string(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ConnectorError> {
        let response = request.bearer_auth(&self.bot_token).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ConnectorError::HttpStatus {
                service: SERVICE,
                status: status.as_u16(),
                body: truncate_for_error(&body),
            });
        }

        let envelope: SlackEnvelope<T> = serde_json::from_str(&body)?;
        if !envelope.ok {
            return Err(ConnectorError::ApiError {
                service: SERVICE,
                message: format!(
                    "{method} failed: {}",
                    envelope.error.unwrap_or_else(|| "unknown error".to_string())
                ),
            });
        }
        debug!(component = "slack", method, "Slack API call succeeded");
        Ok(envelope.body)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &Value,
    ) -> Result<T, ConnectorError> {
        let request = self
            .http
            .post(format!("{}/{}", self.api_base, method))
            .json(payload);
        self.call(method, request).await
    }

    async fn get_query<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ConnectorError> {
        let request = self
            .http
            .get(format!("{}/{}", self.api_base, method))
            .query(query);
        self.call(method, request).await
    }
}

#[async_trait]
impl ChatPlatform for SlackClient {
    async fn open_modal(&self, trigger_id: &str, view: &ModalView) -> Result<(), ConnectorError> {
        let payload = json!({
            "trigger_id": trigger_id,
            "view": view,
        });
        let _: Empty = self.post_json("views.open", &payload).await?;
        Ok(())
    }

    async fn post_message(
        &self,
        message: OutgoingMessage,
    ) -> Result<PostedMessage, ConnectorError> {
        let mut payload = json!({
            "channel": message.channel,
            "text": message.text,
            "unfurl_links": false,
            "unfurl_media": false,
        });
        if !message.blocks.is_empty() {
            payload["blocks"] = serde_json::to_value(&message.blocks)?;
        }
        if let Some(thread_ts) = &message.thread_ts {
            payload["thread_ts"] = Value::String(thread_ts.clone());
        }

        let body: ChatMessageBody = self.post_json("chat.postMessage", &payload).await?;
        let ts = body
            .ts
            .filter(|ts| !ts.trim().is_empty())
            .ok_or(ConnectorError::MissingField {
                service: SERVICE,
                field: "ts",
            })?;
        Ok(PostedMessage {
            channel: body.channel.unwrap_or(message.channel),
            ts,
        })
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
    ) -> Result<(), ConnectorError> {
        let payload = json!({
            "channel": channel,
            "user": user,
            "text": text,
        });
        let _: Empty = self.post_json("chat.postEphemeral", &payload).await?;
        Ok(())
    }

    async fn user_display_name(&self, user_id: &str) -> Result<String, ConnectorError> {
        let body: UserInfoBody = self.get_query("users.info", &[("user", user_id)]).await?;
        let user = body.user.ok_or(ConnectorError::MissingField {
            service: SERVICE,
            field: "user",
        })?;
        let profile = user.profile.as_ref();
        [
            profile.and_then(|p| p.display_name.clone()),
            profile.and_then(|p| p.real_name.clone()),
            user.real_name,
            user.name,
        ]
        .into_iter()
        .flatten()
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .ok_or(ConnectorError::MissingField {
            service: SERVICE,
            field: "user.name",
        })
    }

    async fn workspace_domain(&self) -> Result<String, ConnectorError> {
        let body: TeamInfoBody = self.get_query("team.info", &[]).await?;
        body.team
            .and_then(|team| team.domain)
            .filter(|domain| !domain.trim().is_empty())
            .ok_or(ConnectorError::MissingField {
                service: SERVICE,
                field: "team.domain",
            })
    }
}
