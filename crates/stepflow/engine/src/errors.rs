//! Engine error types
//!
//! These are caller mistakes or declined edits, not evaluation
//! failures; evaluation itself always succeeds and reports
//! inconsistencies as violations instead.

use stepflow_types::{ModelId, OptionRef, StepKey, ValidationError};

/// Errors from selection-session calls
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("unknown step '{0}'")]
    UnknownStep(StepKey),

    #[error("step '{}' has no option '{}'", .0.step, .0.option)]
    UnknownOption(OptionRef),
}

/// Errors from the model registry
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("model not found: {0}")]
    ModelNotFound(ModelId),
}

/// Errors from guarded model editing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    /// The confirmation collaborator declined a destructive edit
    #[error("edit aborted by confirmation guard")]
    Aborted,

    #[error("unknown step '{0}'")]
    UnknownStep(StepKey),

    #[error("step '{}' has no option '{}'", .0.step, .0.option)]
    UnknownOption(OptionRef),

    #[error("no constraint at index {0}")]
    UnknownConstraint(usize),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
