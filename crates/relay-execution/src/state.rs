//! Per-node state machine, grounded on `execution/src/{state.rs,transition.rs}`.
//!
//! The teacher's node machine has an extra `Ready` sub-state between
//! `Pending` and `Running`; this engine's node state is exactly the set §3
//! names (`pending | running | retrying | completed | failed | skipped |
//! cancelled`) — "ready to run" is tracked by the scheduler's own ready set
//! in `relay-engine`, not as a persisted node state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Running,
    Retrying,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl NodeState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Skipped | Self::Cancelled
        )
    }

    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Every transition the machine permits (§3: "transitions are monotone per
/// execution, pending -> running -> {completed,failed,skipped,cancelled},
/// with retrying as a transient sub-state of running").
#[must_use]
pub fn can_transition(from: NodeState, to: NodeState) -> bool {
    use NodeState::{Cancelled, Completed, Failed, Pending, Retrying, Running, Skipped};
    matches!(
        (from, to),
        (Pending, Running)
            | (Pending, Skipped)
            | (Pending, Cancelled)
            | (Running, Completed)
            | (Running, Failed)
            | (Running, Skipped)
            | (Running, Cancelled)
            | (Running, Retrying)
            | (Retrying, Running)
            | (Retrying, Failed)
            | (Retrying, Cancelled)
    )
}

pub fn validate_transition(from: NodeState, to: NodeState) -> Result<(), relay_error::RelayError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(relay_error::RelayError::internal(format!(
            "invalid node state transition: {from} -> {to}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_moves_to_running_or_terminal_without_running() {
        assert!(can_transition(NodeState::Pending, NodeState::Running));
        assert!(can_transition(NodeState::Pending, NodeState::Skipped));
        assert!(can_transition(NodeState::Pending, NodeState::Cancelled));
        assert!(!can_transition(NodeState::Pending, NodeState::Completed));
    }

    #[test]
    fn retrying_is_reachable_only_from_running() {
        assert!(can_transition(NodeState::Running, NodeState::Retrying));
        assert!(!can_transition(NodeState::Pending, NodeState::Retrying));
        assert!(!can_transition(NodeState::Completed, NodeState::Retrying));
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        for terminal in [
            NodeState::Completed,
            NodeState::Failed,
            NodeState::Skipped,
            NodeState::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            assert!(!can_transition(terminal, NodeState::Running));
        }
    }

    #[test]
    fn validate_transition_surfaces_an_error_on_violation() {
        assert!(validate_transition(NodeState::Completed, NodeState::Running).is_err());
    }
}
