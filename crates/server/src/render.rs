//! Slack message and modal payloads.

use serde::{Deserialize, Serialize};
use threadrelay_connectors::{OutgoingMessage, TrackerIssue, TrackerTeam};
use threadrelay_protocol::slack::SelectOption;
use threadrelay_protocol::{Block, Element, IssueThreadLink, ModalView, Text};

use crate::commands::TaskRequest;
use crate::transition::{Announcement, AssignmentNotice};

pub const CREATE_TASK_CALLBACK: &str = "create_task";
pub const TITLE_BLOCK: &str = "title_block";
pub const TITLE_INPUT: &str = "title_input";
pub const TEAM_BLOCK: &str = "team_block";
pub const TEAM_INPUT: &str = "team_input";
pub const CATEGORY_BLOCK: &str = "category_block";
pub const CATEGORY_SELECT: &str = "category_select";
pub const DETAILS_BLOCK: &str = "details_block";
pub const DETAILS_INPUT: &str = "details_input";
pub const APPROVE_ACTION: &str = "approve_issue";
/// Keyword of the state an approval moves an issue into.
pub const APPROVE_TARGET: &str = "done";

const CATEGORIES: [(&str, &str); 4] = [
    ("feature", "✨ Feature"),
    ("bug", "🐛 Bug"),
    ("improvement", "🔧 Improvement"),
    ("task", "📋 Task"),
];

/// Value carried by the approve button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveValue {
    pub issue_id: String,
    pub target: String,
}

pub fn create_task_modal(channel_id: &str, default_team: Option<&str>) -> ModalView {
    let team_hint = match default_team {
        Some(team) => format!("Team name or key (defaults to {team})"),
        None => "Team name or key".to_string(),
    };
    ModalView {
        callback_id: CREATE_TASK_CALLBACK.to_string(),
        private_metadata: channel_id.to_string(),
        title: Text::plain("Create task"),
        submit: Text::plain("Create"),
        close: Text::plain("Cancel"),
        blocks: vec![
            Block::Input {
                block_id: TITLE_BLOCK.to_string(),
                label: Text::plain("Title"),
                element: Element::PlainTextInput {
                    action_id: TITLE_INPUT.to_string(),
                    multiline: false,
                    placeholder: Some(Text::plain("What needs to be done?")),
                },
                optional: false,
            },
            Block::Input {
                block_id: TEAM_BLOCK.to_string(),
                label: Text::plain("Team"),
                element: Element::PlainTextInput {
                    action_id: TEAM_INPUT.to_string(),
                    multiline: false,
                    placeholder: Some(Text::plain(team_hint)),
                },
                optional: default_team.is_some(),
            },
            Block::Input {
                block_id: CATEGORY_BLOCK.to_string(),
                label: Text::plain("Category"),
                element: Element::StaticSelect {
                    action_id: CATEGORY_SELECT.to_string(),
                    placeholder: Text::plain("Pick a category"),
                    options: CATEGORIES
                        .iter()
                        .map(|(value, label)| SelectOption {
                            text: Text::plain(*label),
                            value: (*value).to_string(),
                        })
                        .collect(),
                },
                optional: true,
            },
            Block::Input {
                block_id: DETAILS_BLOCK.to_string(),
                label: Text::plain("Details"),
                element: Element::PlainTextInput {
                    action_id: DETAILS_INPUT.to_string(),
                    multiline: true,
                    placeholder: Some(Text::plain("Context, links, acceptance criteria…")),
                },
                optional: true,
            },
        ],
    }
}

fn category_label(value: &str) -> &str {
    CATEGORIES
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(value))
        .map(|(_, label)| *label)
        .unwrap_or(value)
}

/// Markdown description of an issue created from Slack.
pub fn issue_description(request: &TaskRequest, requester_name: &str) -> String {
    let mut description = match request.details.as_deref() {
        Some(details) => details.to_string(),
        None => "_No details provided._".to_string(),
    };
    description.push_str("\n\n---\n");
    if let Some(category) = request.category.as_deref() {
        description.push_str(&format!("**Category:** {}\n", category_label(category)));
    }
    description.push_str(&format!(
        "**Requested by:** {requester_name} (Slack user `{}`)\n",
        request.requester_id
    ));
    description.push_str(&format!("**Slack channel:** `{}`\n", request.channel_id));
    description
}

/// `https://<domain>.slack.com/archives/<channel>/p<ts without dot>`
pub fn thread_permalink(domain: &str, channel_id: &str, thread_ts: &str) -> String {
    format!(
        "https://{domain}.slack.com/archives/{channel_id}/p{}",
        thread_ts.replace('.', "")
    )
}

pub fn with_thread_link(description: &str, permalink: &str) -> String {
    format!("{}\n**Slack thread:** {permalink}\n", description.trim_end())
}

pub fn issue_created_message(
    channel_id: &str,
    issue: &TrackerIssue,
    team: &TrackerTeam,
    request: &TaskRequest,
) -> OutgoingMessage {
    let state = issue.state_name.as_deref().unwrap_or("Unknown");
    let mut context = vec![
        Text::markdown(format!("*Team:* {}", team.name)),
        Text::markdown(format!("*State:* {state}")),
        Text::markdown(format!("*Requested by:* <@{}>", request.requester_id)),
    ];
    if let Some(category) = request.category.as_deref() {
        context.push(Text::markdown(format!("*Category:* {}", category_label(category))));
    }
    OutgoingMessage {
        channel: channel_id.to_string(),
        thread_ts: None,
        text: format!("Task created: {} {}", issue.identifier, issue.title),
        blocks: vec![
            Block::Section {
                text: Text::markdown(format!(
                    ":white_check_mark: Task created: *<{}|{}>* {}",
                    issue.url, issue.identifier, issue.title
                )),
            },
            Block::Context { elements: context },
            Block::Divider,
            Block::Context {
                elements: vec![Text::markdown(
                    "Updates to this issue will be posted in this thread.",
                )],
            },
        ],
    }
}

pub fn transition_message(
    link: &IssueThreadLink,
    issue_url: Option<&str>,
    state_name: &str,
    announcement: &Announcement,
) -> OutgoingMessage {
    let title = match issue_url {
        Some(url) => format!("<{url}|{}>", link.identifier),
        None => link.identifier.clone(),
    };
    let mut blocks = vec![
        Block::Section {
            text: Text::markdown(format!(
                "{} *{title}* {} ({state_name})",
                announcement.emoji, announcement.action_text
            )),
        },
        Block::Context {
            elements: vec![Text::markdown(format!("Requested by {}", link.created_by))],
        },
    ];
    if announcement.offers_approval {
        blocks.push(approve_actions(&link.issue_id));
    }
    OutgoingMessage {
        channel: link.channel_id.clone(),
        thread_ts: Some(link.thread_ts.clone()),
        text: format!(
            "{} {} {} ({state_name})",
            announcement.emoji, link.identifier, announcement.action_text
        ),
        blocks,
    }
}

fn approve_actions(issue_id: &str) -> Block {
    let value = ApproveValue {
        issue_id: issue_id.to_string(),
        target: APPROVE_TARGET.to_string(),
    };
    Block::Actions {
        block_id: Some(format!("approve:{issue_id}")),
        elements: vec![Element::Button {
            action_id: APPROVE_ACTION.to_string(),
            text: Text::plain("✅ Approve"),
            value: serde_json::to_string(&value).unwrap_or_else(|_| issue_id.to_string()),
            style: Some("primary".to_string()),
        }],
    }
}

pub fn assignment_message(link: &IssueThreadLink, notice: &AssignmentNotice) -> OutgoingMessage {
    let text = format!("👤 *{}* was assigned to {}", link.identifier, notice.assignee);
    OutgoingMessage {
        channel: link.channel_id.clone(),
        thread_ts: Some(link.thread_ts.clone()),
        text: text.replace('*', ""),
        blocks: vec![Block::Section {
            text: Text::markdown(text),
        }],
    }
}

pub fn approval_message(
    link: &IssueThreadLink,
    approver_id: &str,
    state_name: &str,
) -> OutgoingMessage {
    let text = format!(
        "✅ *{}* approved by <@{approver_id}> and moved to {state_name}",
        link.identifier
    );
    OutgoingMessage {
        channel: link.channel_id.clone(),
        thread_ts: Some(link.thread_ts.clone()),
        text: text.replace('*', ""),
        blocks: vec![Block::Section {
            text: Text::markdown(text),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> IssueThreadLink {
        IssueThreadLink {
            issue_id: "issue-1".to_string(),
            channel_id: "C1".to_string(),
            thread_ts: "1700000000.123456".to_string(),
            identifier: "LAN-42".to_string(),
            created_by: "<@U1>".to_string(),
        }
    }

    fn request() -> TaskRequest {
        TaskRequest {
            title: "Fix login".to_string(),
            team: None,
            details: Some("Users get logged out.".to_string()),
            category: Some("bug".to_string()),
            requester_id: "U1".to_string(),
            channel_id: "C1".to_string(),
        }
    }

    fn announcement(offers_approval: bool) -> Announcement {
        Announcement {
            emoji: "👀".to_string(),
            action_text: "entered review".to_string(),
            from_position: 2,
            to_position: 3,
            offers_approval,
        }
    }

    #[test]
    fn transition_message_is_threaded_and_offers_approval() {
        let message = transition_message(
            &link(),
            Some("https://linear.app/acme/issue/LAN-42"),
            "In Review",
            &announcement(true),
        );
        assert_eq!(message.channel, "C1");
        assert_eq!(message.thread_ts.as_deref(), Some("1700000000.123456"));
        assert_eq!(message.text, "👀 LAN-42 entered review (In Review)");

        let Some(Block::Actions { elements, .. }) = message.blocks.last() else {
            panic!("expected approve actions block");
        };
        let Element::Button { action_id, value, .. } = &elements[0] else {
            panic!("expected button");
        };
        assert_eq!(action_id, APPROVE_ACTION);
        let value: ApproveValue = serde_json::from_str(value).expect("button value");
        assert_eq!(value.issue_id, "issue-1");
        assert_eq!(value.target, "done");
    }

    #[test]
    fn transition_message_without_approval_has_no_actions() {
        let message = transition_message(&link(), None, "In Progress", &announcement(false));
        assert!(!message
            .blocks
            .iter()
            .any(|block| matches!(block, Block::Actions { .. })));
    }

    #[test]
    fn description_embeds_form_fields_and_requester() {
        let description = issue_description(&request(), "Jane Doe");
        assert!(description.starts_with("Users get logged out."));
        assert!(description.contains("**Category:** 🐛 Bug"));
        assert!(description.contains("**Requested by:** Jane Doe (Slack user `U1`)"));
        assert!(description.contains("**Slack channel:** `C1`"));
    }

    #[test]
    fn permalink_strips_the_timestamp_dot() {
        assert_eq!(
            thread_permalink("acme", "C1", "1700000000.123456"),
            "https://acme.slack.com/archives/C1/p1700000000123456"
        );
    }

    #[test]
    fn modal_round_trips_channel_in_private_metadata() {
        let modal = create_task_modal("C9", Some("LAN"));
        assert_eq!(modal.callback_id, CREATE_TASK_CALLBACK);
        assert_eq!(modal.private_metadata, "C9");
        assert_eq!(modal.blocks.len(), 4);
        assert!(matches!(
            &modal.blocks[1],
            Block::Input { optional: true, .. }
        ));
    }
}
