//! Selections and the derived availability map
//!
//! A selection records at most one chosen option per step. The
//! availability map is the evaluator's output: the resolved state of
//! every option under a given selection and context. It is replaced
//! wholesale on every recompute so readers never observe a torn
//! intermediate state.

use crate::{OptionKey, OptionRef, StepKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Option State ─────────────────────────────────────────────────────

/// The resolved availability of one option
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OptionState {
    /// Selectable
    #[default]
    Available,
    /// Not selectable
    Disabled,
    /// Forced: must be the choice at its step. Required implies
    /// selectable; an option is never required and disabled at once.
    Required,
}

impl OptionState {
    /// Whether a user may pick an option in this state
    pub fn is_selectable(&self) -> bool {
        matches!(self, Self::Available | Self::Required)
    }
}

// ── Selection ────────────────────────────────────────────────────────

/// The chosen option per step; absent means unselected
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    choices: BTreeMap<StepKey, OptionKey>,
}

impl Selection {
    pub fn new() -> Self {
        Self {
            choices: BTreeMap::new(),
        }
    }

    /// Choose an option at a step, replacing any prior choice there
    pub fn select(&mut self, step: StepKey, option: OptionKey) {
        self.choices.insert(step, option);
    }

    /// Unset a step's choice. Returns the previous choice, if any.
    pub fn clear(&mut self, step: &StepKey) -> Option<OptionKey> {
        self.choices.remove(step)
    }

    /// Unset every choice
    pub fn clear_all(&mut self) {
        self.choices.clear();
    }

    /// The chosen option at a step
    pub fn get(&self, step: &StepKey) -> Option<&OptionKey> {
        self.choices.get(step)
    }

    /// Check whether exactly this option is the choice at its step
    pub fn is_selected(&self, reference: &OptionRef) -> bool {
        self.choices.get(&reference.step) == Some(&reference.option)
    }

    /// Iterate choices in step-key order
    pub fn iter(&self) -> impl Iterator<Item = (&StepKey, &OptionKey)> {
        self.choices.iter()
    }

    /// Number of steps with a choice
    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }
}

impl FromIterator<(StepKey, OptionKey)> for Selection {
    fn from_iter<T: IntoIterator<Item = (StepKey, OptionKey)>>(iter: T) -> Self {
        Self {
            choices: iter.into_iter().collect(),
        }
    }
}

// ── Availability Map ─────────────────────────────────────────────────

/// The resolved state of every option for one (selection, context) pair.
///
/// Derived, never stored: whoever computed it owns it, and a recompute
/// produces a fresh map rather than patching this one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityMap {
    states: BTreeMap<OptionRef, OptionState>,
}

impl AvailabilityMap {
    pub fn new() -> Self {
        Self {
            states: BTreeMap::new(),
        }
    }

    /// Record an option's resolved state
    pub fn set(&mut self, reference: OptionRef, state: OptionState) {
        self.states.insert(reference, state);
    }

    /// The resolved state of an option. Options the map does not cover
    /// are available, the base state of an unconstrained option.
    pub fn state(&self, step: &StepKey, option: &OptionKey) -> OptionState {
        self.states
            .get(&OptionRef {
                step: step.clone(),
                option: option.clone(),
            })
            .copied()
            .unwrap_or_default()
    }

    /// Shorthand for `state(..).is_selectable()`
    pub fn is_selectable(&self, step: &StepKey, option: &OptionKey) -> bool {
        self.state(step, option).is_selectable()
    }

    /// Iterate entries in deterministic (step, option) order
    pub fn iter(&self) -> impl Iterator<Item = (&OptionRef, &OptionState)> {
        self.states.iter()
    }

    /// Options in the given step with the given state, in map order
    pub fn options_in_state(&self, step: &StepKey, state: OptionState) -> Vec<&OptionKey> {
        self.states
            .iter()
            .filter(|(r, s)| &r.step == step && **s == state)
            .map(|(r, _)| &r.option)
            .collect()
    }

    /// Number of options covered
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
