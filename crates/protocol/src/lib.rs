//! threadrelay Protocol
//!
//! Wire types shared by the relay server and its connectors:
//! Linear webhook payloads, Slack command/interactivity payloads,
//! Block Kit blocks, and the relay's own HTTP responses.

use uuid::Uuid;

pub mod linear;
pub mod slack;
pub mod types;

pub use linear::{IssueData, IssueUpdatedFrom, LinearWebhook};
pub use slack::{Block, Element, InteractionPayload, ModalView, SlashCommand, Text};
pub use types::*;

/// Generate a new unique ID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
