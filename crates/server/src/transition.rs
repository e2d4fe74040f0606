//! Pure transition policy
//!
//! Decides whether an issue state change is worth announcing in chat:
//! `should_notify(previous, current) -> TransitionDecision`.
//! No IO, no async, no locking.

use threadrelay_protocol::linear::UserRef;
use threadrelay_protocol::IssueStateSnapshot;

use crate::config::UnknownPrevious;
use crate::workflow::{WorkflowTable, BASE_POSITION, FIRST_ACTIVE_POSITION, UNRANKED};

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Presentation of a notify-worthy transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub emoji: String,
    pub action_text: String,
    pub from_position: u8,
    pub to_position: u8,
    pub offers_approval: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// One of the two states matched no workflow rule.
    UnrankedState,
    /// Lateral or backward move, including moves within the base stage.
    NotForward,
    /// First sighting of an issue sitting in the base stage.
    InitialObservation,
    /// No previous state known and assuming one is disabled.
    UnknownPrevious,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionDecision {
    Notify(Announcement),
    Skip(SkipReason),
}

impl TransitionDecision {
    pub fn is_notify(&self) -> bool {
        matches!(self, TransitionDecision::Notify(_))
    }

    pub fn emoji(&self) -> Option<&str> {
        match self {
            TransitionDecision::Notify(announcement) => Some(&announcement.emoji),
            TransitionDecision::Skip(_) => None,
        }
    }

    pub fn action_text(&self) -> Option<&str> {
        match self {
            TransitionDecision::Notify(announcement) => Some(&announcement.action_text),
            TransitionDecision::Skip(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Previous-state resolution
// ---------------------------------------------------------------------------

/// Where the "previous" side of a comparison came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviousState {
    Explicit(String),
    Cached(String),
    /// Nothing known; the issue is assumed to have left the base stage.
    AssumedBase(String),
    InitialObservation,
    Unknown,
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TransitionPolicy {
    table: WorkflowTable,
    unknown_previous: UnknownPrevious,
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self::new(WorkflowTable::default(), UnknownPrevious::AssumeBase)
    }
}

impl TransitionPolicy {
    pub fn new(table: WorkflowTable, unknown_previous: UnknownPrevious) -> Self {
        Self {
            table,
            unknown_previous,
        }
    }

    #[cfg(test)]
    pub fn table(&self) -> &WorkflowTable {
        &self.table
    }

    /// Forward progress into an active stage notifies; everything else is silent.
    pub fn should_notify(&self, previous: &str, current: &str) -> TransitionDecision {
        let from_position = self.table.position(previous);
        let to_position = self.table.position(current);

        if from_position == UNRANKED || to_position == UNRANKED {
            return TransitionDecision::Skip(SkipReason::UnrankedState);
        }
        if to_position <= from_position {
            return TransitionDecision::Skip(SkipReason::NotForward);
        }
        // both ranked and strictly forward, so the destination is past the base stage
        debug_assert!(to_position >= FIRST_ACTIVE_POSITION);

        let presentation = self.table.presentation(current);
        TransitionDecision::Notify(Announcement {
            emoji: presentation.emoji,
            action_text: presentation.action_text,
            from_position,
            to_position,
            offers_approval: self.table.offers_approval(current),
        })
    }

    /// Pick the previous state: explicit > cached > assumed base stage.
    pub fn resolve_previous_state(
        &self,
        explicit: Option<&str>,
        cached: Option<&IssueStateSnapshot>,
        current: &str,
    ) -> PreviousState {
        if let Some(name) = explicit.map(str::trim).filter(|name| !name.is_empty()) {
            return PreviousState::Explicit(name.to_string());
        }
        if let Some(snapshot) = cached {
            return PreviousState::Cached(snapshot.state_name.clone());
        }
        if self.table.position(current) == BASE_POSITION {
            return PreviousState::InitialObservation;
        }
        match (self.unknown_previous, self.table.base_keyword()) {
            (UnknownPrevious::AssumeBase, Some(base)) => {
                PreviousState::AssumedBase(base.to_string())
            }
            _ => PreviousState::Unknown,
        }
    }

    /// `should_notify` against a resolved previous state.
    pub fn evaluate(&self, previous: &PreviousState, current: &str) -> TransitionDecision {
        match previous {
            PreviousState::InitialObservation => {
                TransitionDecision::Skip(SkipReason::InitialObservation)
            }
            PreviousState::Unknown => TransitionDecision::Skip(SkipReason::UnknownPrevious),
            PreviousState::Explicit(name)
            | PreviousState::Cached(name)
            | PreviousState::AssumedBase(name) => self.should_notify(name, current),
        }
    }
}

// ---------------------------------------------------------------------------
// Assignment side-channel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentNotice {
    pub assignee: String,
}

/// An issue that had no assignee and now has one.
///
/// `previously_assigned` is `None` when the event did not touch the assignee.
pub fn assignment_notice(
    previously_assigned: Option<bool>,
    current: Option<&UserRef>,
) -> Option<AssignmentNotice> {
    match (previously_assigned, current) {
        (Some(false), Some(user)) => Some(AssignmentNotice {
            assignee: user.label().to_string(),
        }),
        _ => None,
    }
}
