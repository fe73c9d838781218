//! Constraints: directional rules linking selections to availability
//!
//! A constraint names what triggers it (a selection, a missing
//! prerequisite, or an external condition), what it targets (one option
//! or a range of steps), and what it does to the target (disable,
//! enable, or require). When several triggered constraints disagree
//! about the same target, the highest priority wins; ties go to the
//! earlier-declared constraint.

use crate::{ContextPredicate, OptionKey, OptionRef, StepKey};
use serde::{Deserialize, Serialize};

// ── Action ───────────────────────────────────────────────────────────

/// What a triggered constraint does to its target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintAction {
    /// Make the target unselectable
    Disable,
    /// Make the target selectable, overriding a disabled base state
    /// or a lower-priority disable
    Enable,
    /// Force the target: it must be the choice at its step
    Require,
}

// ── Rule ─────────────────────────────────────────────────────────────

/// The trigger and target of a constraint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConstraintRule {
    /// Selecting `source` applies the action to a later option
    NextStep { source: OptionRef, target: OptionRef },

    /// `target` has `prerequisite` as a precondition: whenever the
    /// prerequisite is not selected, the action applies to the target.
    /// A target that is already selected surfaces as a violation.
    PreviousStep {
        prerequisite: OptionRef,
        target: OptionRef,
    },

    /// Selecting `source` applies the action across a range of steps
    RangeSkip { source: OptionRef, range: StepRange },

    /// The action applies whenever the context predicate holds,
    /// independent of any selection
    Conditional {
        predicate: ContextPredicate,
        target: OptionRef,
    },
}

/// Discriminant for reporting and diagnostics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    NextStep,
    PreviousStep,
    RangeSkip,
    Conditional,
}

// ── Range ────────────────────────────────────────────────────────────

/// An inclusive span of consecutive steps with an option filter.
///
/// A range whose endpoints are reversed expands to nothing; an empty
/// range is a no-op, not an error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRange {
    /// First step covered (inclusive)
    pub from: StepKey,
    /// Last step covered (inclusive)
    pub to: StepKey,
    /// Which options within the covered steps are affected
    pub filter: OptionFilter,
}

impl StepRange {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: StepKey::new(from),
            to: StepKey::new(to),
            filter: OptionFilter::All,
        }
    }

    pub fn with_filter(mut self, filter: OptionFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Selects which options inside a step range a constraint touches
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OptionFilter {
    /// Every option in the covered steps
    All,
    /// Only options with one of these keys
    Only(Vec<OptionKey>),
    /// Every option except those with one of these keys
    Except(Vec<OptionKey>),
}

impl OptionFilter {
    /// Check whether an option key passes this filter
    pub fn matches(&self, key: &OptionKey) -> bool {
        match self {
            Self::All => true,
            Self::Only(keys) => keys.contains(key),
            Self::Except(keys) => !keys.contains(key),
        }
    }
}

// ── Constraint ───────────────────────────────────────────────────────

/// A directional rule changing an option's availability
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Trigger and target
    pub rule: ConstraintRule,
    /// What happens to the target when triggered
    pub action: ConstraintAction,
    /// Higher priority wins when constraints disagree on a target;
    /// ties are broken by declaration order, earlier wins
    pub priority: i32,
    /// Human-readable label for authoring diagnostics
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
}

impl Constraint {
    /// Selecting `source` applies `action` to `target`
    pub fn next_step(source: OptionRef, target: OptionRef, action: ConstraintAction) -> Self {
        Self {
            rule: ConstraintRule::NextStep { source, target },
            action,
            priority: 0,
            label: String::new(),
        }
    }

    /// `target` requires `prerequisite` to have been selected; while it
    /// is not, the target is disabled
    pub fn previous_step(prerequisite: OptionRef, target: OptionRef) -> Self {
        Self {
            rule: ConstraintRule::PreviousStep {
                prerequisite,
                target,
            },
            action: ConstraintAction::Disable,
            priority: 0,
            label: String::new(),
        }
    }

    /// Selecting `source` applies `action` to every option the range
    /// covers
    pub fn range_skip(source: OptionRef, range: StepRange, action: ConstraintAction) -> Self {
        Self {
            rule: ConstraintRule::RangeSkip { source, range },
            action,
            priority: 0,
            label: String::new(),
        }
    }

    /// `action` applies to `target` whenever `predicate` holds
    pub fn conditional(
        predicate: ContextPredicate,
        target: OptionRef,
        action: ConstraintAction,
    ) -> Self {
        Self {
            rule: ConstraintRule::Conditional { predicate, target },
            action,
            priority: 0,
            label: String::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// The rule discriminant
    pub fn kind(&self) -> ConstraintKind {
        match &self.rule {
            ConstraintRule::NextStep { .. } => ConstraintKind::NextStep,
            ConstraintRule::PreviousStep { .. } => ConstraintKind::PreviousStep,
            ConstraintRule::RangeSkip { .. } => ConstraintKind::RangeSkip,
            ConstraintRule::Conditional { .. } => ConstraintKind::Conditional,
        }
    }

    /// The option whose selection state triggers this constraint, if any.
    /// Conditional constraints trigger from context alone.
    pub fn source(&self) -> Option<&OptionRef> {
        match &self.rule {
            ConstraintRule::NextStep { source, .. } => Some(source),
            ConstraintRule::PreviousStep { prerequisite, .. } => Some(prerequisite),
            ConstraintRule::RangeSkip { source, .. } => Some(source),
            ConstraintRule::Conditional { .. } => None,
        }
    }

    /// The single-option target, if this constraint has one.
    /// Range constraints expand against a model instead.
    pub fn single_target(&self) -> Option<&OptionRef> {
        match &self.rule {
            ConstraintRule::NextStep { target, .. } => Some(target),
            ConstraintRule::PreviousStep { target, .. } => Some(target),
            ConstraintRule::Conditional { target, .. } => Some(target),
            ConstraintRule::RangeSkip { .. } => None,
        }
    }
}
