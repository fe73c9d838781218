//! Validation errors and runtime violations
//!
//! The split matters: a [`ValidationError`] is fatal to a model; it is
//! returned from `build` and the model never exists. A [`Violation`] is
//! a non-fatal inconsistency between a live selection and the current
//! availability; evaluation always succeeds and hands violations back
//! as data for the caller to act on.

use crate::{OptionKey, OptionRef, StepKey};
use serde::{Deserialize, Serialize};

/// Errors that reject a workflow model at build time
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("workflow has no steps")]
    EmptyModel,

    #[error("step '{0}' has no options")]
    EmptyStep(StepKey),

    #[error("duplicate step key '{0}'")]
    DuplicateStep(StepKey),

    #[error("step key '{0}' contains '.', the reference separator")]
    InvalidStepKey(StepKey),

    #[error("duplicate option key '{option}' in step '{step}'")]
    DuplicateOption { step: StepKey, option: OptionKey },

    #[error("constraint {constraint} references unknown option '{reference}'")]
    InvalidReference {
        constraint: usize,
        reference: OptionRef,
    },

    #[error("constraint {constraint} range endpoint '{step}' is not a step in this workflow")]
    InvalidRange { constraint: usize, step: StepKey },

    #[error("constraint {constraint} targets its own source")]
    SelfConstraint { constraint: usize },

    #[error("require constraints form a cycle: {}", format_cycle(.cycle))]
    RequireCycle { cycle: Vec<OptionRef> },

    #[error("constraint {constraint} uses a Require action over a step range")]
    RangeRequire { constraint: usize },
}

fn format_cycle(cycle: &[OptionRef]) -> String {
    cycle
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type alias for model construction
pub type ValidationResult<T> = Result<T, ValidationError>;

/// A detected inconsistency between current selections and current
/// availability. Non-fatal: callers decide whether to block progression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum Violation {
    /// An option is selected but its resolved state is disabled:
    /// either a direct conflict or a prerequisite that was cleared
    /// after the fact
    #[error("selected option '{option}' at step '{step}' is disabled")]
    SelectedButDisabled { step: StepKey, option: OptionKey },

    /// A required option is unselected at a step the user has already
    /// moved past
    #[error("required option '{option}' at step '{step}' is not selected")]
    RequiredButUnselected { step: StepKey, option: OptionKey },

    /// Two or more options are simultaneously required at one step,
    /// an authoring error, flagged rather than silently resolved
    #[error("step '{step}' has multiple required options: {}", format_keys(.options))]
    AmbiguousRequirement {
        step: StepKey,
        options: Vec<OptionKey>,
    },
}

impl Violation {
    /// The step this violation points at
    pub fn step(&self) -> &StepKey {
        match self {
            Self::SelectedButDisabled { step, .. } => step,
            Self::RequiredButUnselected { step, .. } => step,
            Self::AmbiguousRequirement { step, .. } => step,
        }
    }
}

fn format_keys(keys: &[OptionKey]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display() {
        let err = ValidationError::RequireCycle {
            cycle: vec![
                OptionRef::new("a", "x"),
                OptionRef::new("b", "y"),
                OptionRef::new("a", "x"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "require constraints form a cycle: a.x -> b.y -> a.x"
        );
    }

    #[test]
    fn test_violation_step() {
        let v = Violation::RequiredButUnselected {
            step: StepKey::new("plan"),
            option: OptionKey::new("premium"),
        };
        assert_eq!(v.step(), &StepKey::new("plan"));
    }

    #[test]
    fn test_ambiguous_requirement_display() {
        let v = Violation::AmbiguousRequirement {
            step: StepKey::new("features"),
            options: vec![OptionKey::new("basic"), OptionKey::new("advanced")],
        };
        assert_eq!(
            v.to_string(),
            "step 'features' has multiple required options: basic, advanced"
        );
    }
}
