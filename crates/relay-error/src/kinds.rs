//! Cancellation reasons retained on a cancelled execution.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    UserCancelled,
    ExecutionTimeout,
    SchedulerShutdown,
    FatalNodeFailure,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::UserCancelled => "user_cancelled",
            Self::ExecutionTimeout => "execution_timeout",
            Self::SchedulerShutdown => "scheduler_shutdown",
            Self::FatalNodeFailure => "fatal_node_failure",
        };
        f.write_str(s)
    }
}
