//! Crate-level error taxonomy.
//!
//! Every public entry point returns a tagged result rather than raising —
//! these enums are the "reason" payloads carried inside `MasteryResult`,
//! `SessionCompositionResult` and the registry's `Result`s. One variant per
//! failure kind, modeled with `thiserror` rather than ad hoc strings.

use thiserror::Error;

/// Registry validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("template id {0:?} is already registered")]
    DuplicateId(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value {value:?} for field {field}")]
    InvalidEnum { field: &'static str, value: String },

    #[error("template requires at least {required} hint providers, found {found}")]
    InsufficientHints { required: usize, found: usize },
}

/// Composer-level configuration validation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidConfig {
    #[error("composition percentages must be within [0, 100], got {0}")]
    PercentOutOfRange(i64),

    #[error("composition percentages must sum to 100 (±1), got {0}")]
    PercentSumMismatch(i64),

    #[error("total_exercises must be within [5, 100], got {0}")]
    TotalOutOfRange(u32),
}

/// Internal invariant violation. Reserved for conditions that should be
/// unreachable given well-formed inputs — NaN/∞ propagation or an
/// index/bucket inconsistency in the registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("non-finite value encountered while computing {context}")]
    NonFinite { context: &'static str },

    #[error("registry index inconsistency: {0}")]
    IndexInconsistency(String),
}
