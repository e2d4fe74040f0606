//! Workflow position table
//!
//! Maps free-text tracker state names to ordinal positions through an ordered
//! list of keyword rules. The first rule whose keyword is contained in the
//! normalized state name wins; names matching no rule are unranked.

use std::collections::BTreeSet;

/// Position of names matching no rule.
pub const UNRANKED: u8 = 0;
/// Position of the initial backlog stage.
pub const BASE_POSITION: u8 = 1;
/// First position an observer is notified about.
pub const FIRST_ACTIVE_POSITION: u8 = 2;

const GENERIC_EMOJI: &str = "🚀";
const GENERIC_ACTION: &str = "progressed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub emoji: String,
    pub action_text: String,
}

impl Presentation {
    pub fn new(emoji: &str, action_text: &str) -> Self {
        Self {
            emoji: emoji.to_string(),
            action_text: action_text.to_string(),
        }
    }

    pub fn generic() -> Self {
        Self::new(GENERIC_EMOJI, GENERIC_ACTION)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRule {
    pub keyword: String,
    pub position: u8,
    /// `None` falls back to the generic presentation.
    pub presentation: Option<Presentation>,
    /// Announcements into this stage carry an approval button.
    pub offers_approval: bool,
}

impl WorkflowRule {
    pub fn ranked(keyword: &str, position: u8) -> Self {
        Self {
            keyword: normalize_state_name(keyword),
            position,
            presentation: None,
            offers_approval: false,
        }
    }

    fn presented(keyword: &str, position: u8, emoji: &str, action_text: &str) -> Self {
        Self {
            presentation: Some(Presentation::new(emoji, action_text)),
            ..Self::ranked(keyword, position)
        }
    }

    fn with_approval(mut self) -> Self {
        self.offers_approval = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowTable {
    rules: Vec<WorkflowRule>,
}

impl Default for WorkflowTable {
    fn default() -> Self {
        Self::new(vec![
            WorkflowRule::presented("review", 3, "👀", "entered review").with_approval(),
            WorkflowRule::ranked("todo", BASE_POSITION),
            WorkflowRule::ranked("to do", BASE_POSITION),
            // before "started", which it contains
            WorkflowRule::ranked("unstarted", BASE_POSITION),
            WorkflowRule::presented("progress", 2, "🚀", "entered development"),
            WorkflowRule::ranked("started", 2),
            WorkflowRule::ranked("testing", 3),
            WorkflowRule::presented("done", 4, "✅", "completed"),
            WorkflowRule::presented("completed", 4, "✅", "completed"),
            WorkflowRule::ranked("backlog", BASE_POSITION),
            WorkflowRule::ranked("triage", BASE_POSITION),
        ])
    }
}

impl WorkflowTable {
    pub fn new(rules: Vec<WorkflowRule>) -> Self {
        Self { rules }
    }

    /// Default table with `overrides` evaluated first.
    pub fn with_overrides(overrides: Vec<WorkflowRule>) -> Self {
        let mut rules = overrides;
        rules.extend(Self::default().rules);
        Self::new(rules)
    }

    pub fn rules(&self) -> &[WorkflowRule] {
        &self.rules
    }

    pub fn rule_for(&self, state_name: &str) -> Option<&WorkflowRule> {
        let normalized = normalize_state_name(state_name);
        if normalized.is_empty() {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| !rule.keyword.is_empty() && normalized.contains(&rule.keyword))
    }

    pub fn position(&self, state_name: &str) -> u8 {
        self.rule_for(state_name)
            .map(|rule| rule.position)
            .unwrap_or(UNRANKED)
    }

    pub fn presentation(&self, state_name: &str) -> Presentation {
        self.rule_for(state_name)
            .and_then(|rule| rule.presentation.clone())
            .unwrap_or_else(Presentation::generic)
    }

    pub fn offers_approval(&self, state_name: &str) -> bool {
        self.rule_for(state_name)
            .is_some_and(|rule| rule.offers_approval)
    }

    /// Keyword standing in for the base stage when the real origin is unknown.
    pub fn base_keyword(&self) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.position == BASE_POSITION)
            .map(|rule| rule.keyword.as_str())
    }
}

/// Lowercase, trim, fold `-`/`_` into spaces and collapse whitespace.
pub fn normalize_state_name(name: &str) -> String {
    name.replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse `keyword=position` pairs separated by commas.
pub fn parse_rule_overrides(value: &str) -> Result<Vec<WorkflowRule>, String> {
    let defaults = WorkflowTable::default();
    let mut rules = Vec::new();
    let mut seen = BTreeSet::new();
    for raw_pair in value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
    {
        let (raw_keyword, raw_position) = raw_pair
            .split_once('=')
            .ok_or_else(|| format!("state rule `{raw_pair}` must use `keyword=position` format"))?;
        let keyword = normalize_state_name(raw_keyword);
        if keyword.is_empty() {
            return Err(format!("state rule `{raw_pair}` has an empty keyword"));
        }
        let position = raw_position
            .trim()
            .parse::<u8>()
            .map_err(|_| format!("state rule `{raw_pair}` position must be 0-255"))?;
        if !seen.insert(keyword.clone()) {
            return Err(format!("duplicate state rule for keyword `{keyword}`"));
        }
        // Re-ranking a built-in keyword keeps its text and approval button.
        let rule = match defaults.rules.iter().find(|rule| rule.keyword == keyword) {
            Some(builtin) => WorkflowRule {
                position,
                ..builtin.clone()
            },
            None => WorkflowRule::ranked(&keyword, position),
        };
        rules.push(rule);
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_ranks_common_linear_states() {
        let table = WorkflowTable::default();
        assert_eq!(table.position("Backlog"), 1);
        assert_eq!(table.position("Todo"), 1);
        assert_eq!(table.position("To Do"), 1);
        assert_eq!(table.position("to-do"), 1);
        assert_eq!(table.position("In Progress"), 2);
        assert_eq!(table.position("in_progress"), 2);
        assert_eq!(table.position("In Review"), 3);
        assert_eq!(table.position("Ready for Review"), 3);
        assert_eq!(table.position("Done"), 4);
        assert_eq!(table.position("Completed"), 4);
    }

    #[test]
    fn unknown_and_blank_names_are_unranked() {
        let table = WorkflowTable::default();
        assert_eq!(table.position("Canceled"), UNRANKED);
        assert_eq!(table.position("Duplicate"), UNRANKED);
        assert_eq!(table.position(""), UNRANKED);
        assert_eq!(table.position("   "), UNRANKED);
    }

    #[test]
    fn rule_order_decides_overlapping_keywords() {
        let table = WorkflowTable::default();
        assert_eq!(table.position("Unstarted"), BASE_POSITION);
        assert_eq!(table.position("Started"), 2);
    }

    #[test]
    fn presentation_falls_back_to_generic() {
        let table = WorkflowTable::default();
        assert_eq!(table.presentation("In Progress").emoji, "🚀");
        assert_eq!(
            table.presentation("In Progress").action_text,
            "entered development"
        );
        assert_eq!(table.presentation("In Review").emoji, "👀");
        assert_eq!(table.presentation("Done").action_text, "completed");
        assert_eq!(table.presentation("Testing"), Presentation::generic());
        assert_eq!(table.presentation("Started").action_text, "progressed");
    }

    #[test]
    fn only_review_offers_approval() {
        let table = WorkflowTable::default();
        assert!(table.offers_approval("In Review"));
        assert!(!table.offers_approval("In Progress"));
        assert!(!table.offers_approval("Done"));
    }

    #[test]
    fn overrides_take_precedence() {
        let overrides = parse_rule_overrides("qa=3, review=2").expect("parse");
        let table = WorkflowTable::with_overrides(overrides);
        assert_eq!(table.position("In QA"), 3);
        assert_eq!(table.position("In Review"), 2);
        assert_eq!(table.base_keyword(), Some("todo"));
    }

    #[test]
    fn reranked_builtin_keeps_presentation_and_approval() {
        let overrides = parse_rule_overrides("review=2,qa=3").expect("parse");
        let table = WorkflowTable::with_overrides(overrides);
        assert_eq!(table.position("In Review"), 2);
        assert_eq!(table.presentation("In Review").action_text, "entered review");
        assert!(table.offers_approval("In Review"));
        assert_eq!(table.presentation("In QA"), Presentation::generic());
        assert!(!table.offers_approval("In QA"));
    }

    #[test]
    fn rejects_malformed_overrides() {
        assert!(parse_rule_overrides("qa").is_err());
        assert!(parse_rule_overrides("=3").is_err());
        assert!(parse_rule_overrides("qa=high").is_err());
        assert!(parse_rule_overrides("qa=3,QA=2").is_err());
        assert_eq!(parse_rule_overrides(" , ").expect("empty is fine"), Vec::new());
    }
}
