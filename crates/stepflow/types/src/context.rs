//! Evaluation context and conditional predicates
//!
//! Conditional constraints fire based on externally sourced values
//! (user level, inventory counts, the clock) rather than on selections.
//! Those values arrive through an [`EvalContext`] snapshot that the
//! evaluator reads exactly once per pass, keeping evaluation pure and
//! repeatable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ── Evaluation Context ───────────────────────────────────────────────

/// A read-only snapshot of external state consulted by conditional
/// constraints
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvalContext {
    /// The current user's level
    pub user_level: u32,
    /// Named inventory counts
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub inventory: HashMap<String, u64>,
    /// The moment the snapshot was taken
    pub now: DateTime<Utc>,
    /// Free-form boolean flags
    #[serde(default, skip_serializing_if = "HashSet::is_empty")]
    pub flags: HashSet<String>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self {
            user_level: 0,
            inventory: HashMap::new(),
            now: Utc::now(),
            flags: HashSet::new(),
        }
    }

    pub fn with_user_level(mut self, level: u32) -> Self {
        self.user_level = level;
        self
    }

    pub fn with_inventory(mut self, item: impl Into<String>, count: u64) -> Self {
        self.inventory.insert(item.into(), count);
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    /// Pin the snapshot to a specific moment
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Inventory count for an item, zero when absent
    pub fn inventory_count(&self, item: &str) -> u64 {
        self.inventory.get(item).copied().unwrap_or(0)
    }

    /// Check whether a flag is set
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

// ── Context Predicate ────────────────────────────────────────────────

/// The condition under which a conditional constraint fires.
///
/// Predicates form a closed, serializable tree over the evaluation
/// context. There are no callbacks and no side effects: the same
/// context always produces the same answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ContextPredicate {
    /// User level is at or above the threshold
    UserLevelAtLeast(u32),

    /// Inventory holds at least `count` of `item`
    InventoryAtLeast {
        item: String,
        count: u64,
    },

    /// The snapshot moment is at or after the given instant
    After(DateTime<Utc>),

    /// The snapshot moment is strictly before the given instant
    Before(DateTime<Utc>),

    /// The named flag is set
    FlagSet(String),

    /// Composite: all sub-predicates must hold
    AllOf(Vec<ContextPredicate>),

    /// Composite: at least one sub-predicate must hold
    AnyOf(Vec<ContextPredicate>),

    /// Negation
    Not(Box<ContextPredicate>),
}

impl ContextPredicate {
    pub fn all_of(preds: Vec<ContextPredicate>) -> Self {
        Self::AllOf(preds)
    }

    pub fn any_of(preds: Vec<ContextPredicate>) -> Self {
        Self::AnyOf(preds)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(pred: ContextPredicate) -> Self {
        Self::Not(Box::new(pred))
    }

    /// Evaluate this predicate against a context snapshot
    pub fn eval(&self, ctx: &EvalContext) -> bool {
        match self {
            Self::UserLevelAtLeast(level) => ctx.user_level >= *level,
            Self::InventoryAtLeast { item, count } => ctx.inventory_count(item) >= *count,
            Self::After(instant) => ctx.now >= *instant,
            Self::Before(instant) => ctx.now < *instant,
            Self::FlagSet(flag) => ctx.has_flag(flag),
            Self::AllOf(preds) => preds.iter().all(|p| p.eval(ctx)),
            Self::AnyOf(preds) => preds.iter().any(|p| p.eval(ctx)),
            Self::Not(pred) => !pred.eval(ctx),
        }
    }
}
