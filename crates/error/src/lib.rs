//! # weir-error
//!
//! Unified error types for the Weir adaptive join core.
//!
//! Every error carries:
//! - A stable numeric code (WEIR-XXXX)
//! - Optional structured JSON context
//! - An optional hint describing how to recover

mod code;
mod context;
mod convert;

pub use code::{ErrorCategory, ErrorCode};
pub use context::{ErrorContext, JoinPhase};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The unified error type for all Weir operations.
///
/// Errors are `Clone` so that a failure observed by one cursor of a shared
/// bindings stream can be replayed to every other cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeirError {
    /// Numeric error code (e.g., "WEIR-2001")
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Structured context for programmatic handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,

    /// Suggestion for recovering from the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    /// Correlation ID for distributed tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl WeirError {
    /// Create a new error with code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            hint: None,
            trace_id: None,
        }
    }

    /// Admission failure: the adaptive join actor declines to handle an action.
    pub fn adaptive_join_disabled(actor: impl Into<String>, reason: impl Into<String>) -> Self {
        let actor = actor.into();
        let reason = reason.into();
        Self::new(
            ErrorCode::AdaptiveJoinDisabled,
            format!(
                "Actor {} could not run because adaptive join processing is disabled",
                actor
            ),
        )
        .with_context(ErrorContext::Admission { actor, reason })
        .with_hint("Route the join to a non-adaptive join strategy")
    }

    /// Add structured context
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Add structured context unless the error already carries some
    pub fn or_context(self, context: ErrorContext) -> Self {
        if self.context.is_some() {
            self
        } else {
            self.with_context(context)
        }
    }

    /// Add a recovery hint
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Add trace ID for correlation
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Whether the caller can recover by picking another strategy.
    pub fn is_recoverable(&self) -> bool {
        self.code.is_recoverable()
    }

    /// Serialize to JSON for API responses
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize WeirError: {}", e);
            format!(
                r#"{{"code":"{}","message":"Serialization failed"}}"#,
                self.code
            )
        })
    }

    /// Serialize to pretty JSON for logging
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

impl fmt::Display for WeirError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (Hint: {})", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for WeirError {}

/// Result type alias for Weir operations
pub type Result<T> = std::result::Result<T, WeirError>;
