//! Stepflow domain types: workflows as constrained option graphs
//!
//! A workflow is an ordered sequence of steps, each offering selectable
//! options. Constraints connect selections to the availability of other
//! options: selecting one option can disable, enable, or require another.
//!
//! The model here is deliberately split from evaluation:
//!
//! - [`WorkflowModel`] is the immutable, validated description of steps,
//!   options, and constraints. It is built once through [`ModelBuilder`]
//!   and never mutated; edits produce a new model.
//! - [`Selection`] is the mutable per-session record of choices.
//! - [`AvailabilityMap`] is derived state: recomputed wholesale from a
//!   model, a selection, and an [`EvalContext`], never patched in place.
//!
//! Everything a workflow author can get wrong structurally (dangling
//! references, self-targeting constraints, cycles of requirements,
//! duplicate keys) is rejected at build time with a [`ValidationError`].
//! Inconsistencies that only exist relative to a selection (a selected
//! option that became disabled, a required option left unselected) are
//! [`Violation`]s: data, not errors, because a half-edited workflow is
//! an expected state.

#![deny(unsafe_code)]

pub mod constraint;
pub mod context;
pub mod errors;
pub mod model;
pub mod selection;
pub mod step;

pub use constraint::{
    Constraint, ConstraintAction, ConstraintKind, ConstraintRule, OptionFilter, StepRange,
};
pub use context::{ContextPredicate, EvalContext};
pub use errors::{ValidationError, ValidationResult, Violation};
pub use model::{ModelBuilder, ModelId, WorkflowModel};
pub use selection::{AvailabilityMap, OptionState, Selection};
pub use step::{OptionKey, OptionRef, Step, StepKey, StepOption};
