//! # Error Contexts
//!
//! Structured metadata attached to errors for programmatic handling.

use serde::{Deserialize, Serialize};

/// Which phase of an adaptive join an error was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPhase {
    First,
    Second,
}

/// Structured context for errors.
///
/// Each variant provides specific fields relevant to that error type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorContext {
    /// Context for WEIR-2001 (AdaptiveJoinDisabled)
    Admission {
        actor: String,
        /// Why the actor declined, e.g. nesting or configuration
        reason: String,
    },

    /// A join phase failed to start
    Join {
        phase: JoinPhase,
        entries: usize,
    },

    /// Context for WEIR-2004 (InvalidCardinality)
    Cardinality {
        kind: String,
        value: String,
    },

    /// A metadata probe of a join entry failed
    Metadata {
        operation: String,
    },

    /// Context for WEIR-3xxx (config errors)
    Config {
        file_path: Option<String>,
        field: Option<String>,
    },

    /// Generic key-value context for extensibility
    Generic {
        #[serde(flatten)]
        data: std::collections::HashMap<String, serde_json::Value>,
    },
}
