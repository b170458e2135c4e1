//! Variable scope levels.

use serde::{Deserialize, Serialize};

/// Where a variable write is visible.
///
/// `Global` variables are visible to every nested sub-workflow context of
/// the same root execution; `Local` variables are visible only within the
/// context that wrote them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeLevel {
    Local,
    Global,
}

impl Default for ScopeLevel {
    fn default() -> Self {
        Self::Local
    }
}
