//! Slack payloads: inbound commands/interactions and outbound Block Kit

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Form body of a slash command (`application/x-www-form-urlencoded`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlashCommand {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub trigger_id: Option<String>,
    #[serde(default)]
    pub response_url: Option<String>,
}

/// Form body of an interactivity request: a single JSON-encoded `payload` field
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionForm {
    pub payload: String,
}

/// Decoded interactivity payload
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionPayload {
    ViewSubmission {
        user: SlackUser,
        view: SubmittedView,
    },
    BlockActions {
        user: SlackUser,
        #[serde(default)]
        channel: Option<SlackChannel>,
        #[serde(default)]
        container: Option<Container>,
        #[serde(default)]
        actions: Vec<BlockAction>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackChannel {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub message_ts: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockAction {
    pub action_id: String,
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedView {
    #[serde(default)]
    pub callback_id: String,
    #[serde(default)]
    pub private_metadata: String,
    #[serde(default)]
    pub state: ViewState,
}

/// `view.state.values[block_id][action_id]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewState {
    #[serde(default)]
    pub values: HashMap<String, HashMap<String, InputValue>>,
}

impl ViewState {
    /// Submitted value of a text input or static select, trimmed; blank → `None`.
    pub fn value(&self, block_id: &str, action_id: &str) -> Option<String> {
        let input = self.values.get(block_id)?.get(action_id)?;
        input
            .value
            .as_deref()
            .or(input.selected_option.as_ref().map(|o| o.value.as_str()))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputValue {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub selected_option: Option<SelectedOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectedOption {
    pub value: String,
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Block Kit text object
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Text {
    #[serde(rename = "mrkdwn")]
    Markdown { text: String },
    #[serde(rename = "plain_text")]
    Plain { text: String, emoji: bool },
}

impl Text {
    pub fn markdown(text: impl Into<String>) -> Self {
        Text::Markdown { text: text.into() }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Text::Plain {
            text: text.into(),
            emoji: true,
        }
    }
}

/// Layout block
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        text: Text,
    },
    Context {
        elements: Vec<Text>,
    },
    Divider,
    Actions {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        elements: Vec<Element>,
    },
    Input {
        block_id: String,
        label: Text,
        element: Element,
        optional: bool,
    },
}

/// Interactive element
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Button {
        action_id: String,
        text: Text,
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<String>,
    },
    PlainTextInput {
        action_id: String,
        multiline: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<Text>,
    },
    StaticSelect {
        action_id: String,
        placeholder: Text,
        options: Vec<SelectOption>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub text: Text,
    pub value: String,
}

/// Modal opened through `views.open`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "modal")]
pub struct ModalView {
    pub callback_id: String,
    pub private_metadata: String,
    pub title: Text,
    pub submit: Text,
    pub close: Text,
    pub blocks: Vec<Block>,
}

/// Immediate response to a slash command
#[derive(Debug, Clone, Serialize)]
pub struct SlashResponse {
    pub response_type: &'static str,
    pub text: String,
}

impl SlashResponse {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            response_type: "ephemeral",
            text: text.into(),
        }
    }
}

/// Response to a `view_submission` carrying per-block validation errors
#[derive(Debug, Clone, Serialize)]
pub struct ViewErrorsResponse {
    pub response_action: &'static str,
    pub errors: HashMap<String, String>,
}

impl ViewErrorsResponse {
    pub fn single(block_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            response_action: "errors",
            errors: HashMap::from([(block_id.into(), message.into())]),
        }
    }
}
