//! Stepflow constraint resolution engine
//!
//! Given a validated [`WorkflowModel`](stepflow_types::WorkflowModel)
//! and a set of user selections, the engine answers three questions:
//! which options are currently selectable, forced, or blocked; whether
//! the current selections are mutually consistent; and what complete
//! paths through the workflow remain.
//!
//! # Key Principle
//!
//! **Availability is derived, never stored.** Every change re-derives
//! the full availability map from the model, the selection, and the
//! external context. There is no incremental patching and no cached
//! conflict state; resolution order (priority, then declaration
//! order) is total and applied fresh on every call.
//!
//! # Architecture
//!
//! - [`ConstraintEvaluator`]: resolves every option's availability and
//!   collects violations and conflict records
//! - [`SelectionSession`]: holds live selections and the freshly
//!   recomputed map
//! - [`PathEnumerator`]: lazily yields every valid complete selection
//! - [`ModelRegistry`]: stores validated models for the authoring UI
//! - [`ModelEditor`]: rebuild-style edits, guarded by an [`EditGuard`]
//!   before destructive changes
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use stepflow_engine::SelectionSession;
//! use stepflow_types::*;
//!
//! let model = ModelBuilder::new("Signup")
//!     .with_step(
//!         Step::new("plan", "Choose a plan")
//!             .with_option(StepOption::new("free", "Free"))
//!             .with_option(StepOption::new("premium", "Premium")),
//!     )
//!     .with_step(
//!         Step::new("features", "Pick features")
//!             .with_option(StepOption::new("basic", "Basic"))
//!             .with_option(StepOption::new("advanced", "Advanced").disabled_by_default()),
//!     )
//!     .with_constraint(Constraint::next_step(
//!         OptionRef::new("plan", "premium"),
//!         OptionRef::new("features", "advanced"),
//!         ConstraintAction::Enable,
//!     ))
//!     .build()
//!     .unwrap();
//!
//! let mut session = SelectionSession::new(Arc::new(model), EvalContext::new());
//! let map = session
//!     .select(StepKey::new("plan"), OptionKey::new("premium"))
//!     .unwrap();
//!
//! assert!(map.is_selectable(&StepKey::new("features"), &OptionKey::new("advanced")));
//! assert!(session.is_valid());
//! ```

#![deny(unsafe_code)]

pub mod editor;
pub mod enumerator;
pub mod errors;
pub mod evaluator;
pub mod registry;
pub mod session;

// Re-export main types
pub use editor::{AutoConfirm, EditGuard, ModelEditor};
pub use enumerator::PathEnumerator;
pub use errors::{EditError, RegistryError, SessionError};
pub use evaluator::{ConflictResolved, ConstraintEvaluator, Evaluation};
pub use registry::ModelRegistry;
pub use session::SelectionSession;
