//! The unified error type for the relay workflow engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::ErrorContext;
use crate::kinds::CancelReason;

/// Every error the engine can raise, spanning validation, expression
/// evaluation, transport, connector, and scheduling failures.
///
/// Variant set is closed and mirrors the error taxonomy the engine commits
/// to at its external boundary: whatever a subscriber or caller sees is one
/// of these kinds, never a host stack trace.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RelayError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("expression error: {message}")]
    Expr {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("expression evaluation timed out after {budget_ms}ms")]
    ExprTimeout { budget_ms: u64 },

    #[error("expression evaluation exceeded its memory budget ({limit_bytes} bytes)")]
    ExprMemory { limit_bytes: usize },

    #[error("transport error: {message}")]
    Transport {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("connector error: {message}")]
    Adapter {
        message: String,
        retryable: bool,
        context: Option<ErrorContext>,
    },

    #[error("retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    #[error("loop exceeded its iteration limit ({max_iterations})")]
    LoopLimitExceeded { max_iterations: u64 },

    #[error("sub-workflow depth limit exceeded (limit {limit})")]
    SubworkflowDepthExceeded { limit: u32 },

    #[error("cancelled: {reason}")]
    Cancelled { reason: CancelReason },

    #[error("capacity exceeded: {in_flight}/{limit} concurrent executions")]
    CapacityExceeded { in_flight: usize, limit: usize },

    #[error("internal error: {message}")]
    Internal {
        message: String,
        context: Option<ErrorContext>,
    },
}

impl RelayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            context: None,
        }
    }

    pub fn expr(message: impl Into<String>) -> Self {
        Self::Expr {
            message: message.into(),
            context: None,
        }
    }

    pub fn expr_timeout(budget: Duration) -> Self {
        Self::ExprTimeout {
            budget_ms: budget.as_millis() as u64,
        }
    }

    pub fn expr_memory(limit_bytes: usize) -> Self {
        Self::ExprMemory { limit_bytes }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            context: None,
        }
    }

    pub fn adapter(message: impl Into<String>, retryable: bool) -> Self {
        Self::Adapter {
            message: message.into(),
            retryable,
            context: None,
        }
    }

    pub fn retry_exhausted(attempts: u32, last_error: impl Into<String>) -> Self {
        Self::RetryExhausted {
            attempts,
            last_error: last_error.into(),
        }
    }

    pub fn loop_limit_exceeded(max_iterations: u64) -> Self {
        Self::LoopLimitExceeded { max_iterations }
    }

    pub fn subworkflow_depth_exceeded(limit: u32) -> Self {
        Self::SubworkflowDepthExceeded { limit }
    }

    pub fn cancelled(reason: CancelReason) -> Self {
        Self::Cancelled { reason }
    }

    pub fn capacity_exceeded(in_flight: usize, limit: usize) -> Self {
        Self::CapacityExceeded { in_flight, limit }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, ctx: ErrorContext) -> Self {
        match &mut self {
            Self::Validation { context, .. }
            | Self::Expr { context, .. }
            | Self::Transport { context, .. }
            | Self::Adapter { context, .. }
            | Self::Internal { context, .. } => *context = Some(ctx),
            _ => {}
        }
        self
    }

    /// Whether this error is eligible for a `retry` node to attempt again.
    ///
    /// Mirrors the error-handling design's non-retryable set: validation,
    /// config, and depth/limit errors must short-circuit retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::ExprTimeout { .. } => true,
            Self::Adapter { retryable, .. } => *retryable,
            Self::Validation { .. }
            | Self::Expr { .. }
            | Self::ExprMemory { .. }
            | Self::RetryExhausted { .. }
            | Self::LoopLimitExceeded { .. }
            | Self::SubworkflowDepthExceeded { .. }
            | Self::Cancelled { .. }
            | Self::CapacityExceeded { .. }
            | Self::Internal { .. } => false,
        }
    }

    /// Stable machine-readable code for programmatic handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Expr { .. } => "expr_error",
            Self::ExprTimeout { .. } => "expr_timeout",
            Self::ExprMemory { .. } => "expr_memory",
            Self::Transport { .. } => "transport_error",
            Self::Adapter { .. } => "adapter_error",
            Self::RetryExhausted { .. } => "retry_exhausted",
            Self::LoopLimitExceeded { .. } => "loop_limit_exceeded",
            Self::SubworkflowDepthExceeded { .. } => "subworkflow_depth_exceeded",
            Self::Cancelled { .. } => "cancelled",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::Internal { .. } => "internal",
        }
    }

    /// The shape a subscriber or caller is allowed to see: kind, message,
    /// and the node id if the error originated inside one. Never includes
    /// `context`'s component/operation internals or a host stack trace.
    pub fn to_public(&self) -> PublicError {
        let node_id = match self {
            Self::Validation { context, .. }
            | Self::Expr { context, .. }
            | Self::Transport { context, .. }
            | Self::Adapter { context, .. }
            | Self::Internal { context, .. } => {
                context.as_ref().and_then(|c| c.node_id().map(str::to_owned))
            }
            _ => None,
        };
        PublicError {
            error_kind: self.error_code(),
            message: self.to_string(),
            node_id,
        }
    }
}

/// The only shape ever surfaced to a subscriber or caller (§7 "user-visible surface").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicError {
    pub error_kind: &'static str,
    pub message: String,
    pub node_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_retryable_kinds() {
        assert!(!RelayError::validation("bad").is_retryable());
        assert!(!RelayError::subworkflow_depth_exceeded(5).is_retryable());
        assert!(!RelayError::cancelled(CancelReason::UserCancelled).is_retryable());
    }

    #[test]
    fn adapter_retryability_follows_flag() {
        assert!(RelayError::adapter("timeout", true).is_retryable());
        assert!(!RelayError::adapter("bad request", false).is_retryable());
    }

    #[test]
    fn public_error_strips_internal_context() {
        let err = RelayError::internal("boom")
            .with_context(ErrorContext::new("dispatch").with_node_id("n1").with_component("engine"));
        let public = err.to_public();
        assert_eq!(public.error_kind, "internal");
        assert_eq!(public.node_id.as_deref(), Some("n1"));
    }
}
