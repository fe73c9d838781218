//! Constraint evaluator: resolves the availability of every option
//!
//! Evaluation is a single pass: collect the constraints triggered by
//! the current selection and context, expand range targets, and let the
//! highest-priority constraint win each contested target. The result is
//! a total availability map plus a violations list. Evaluation never
//! fails, because a workflow in an inconsistent intermediate state is
//! an expected condition, not a bug.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stepflow_types::{
    AvailabilityMap, Constraint, ConstraintAction, ConstraintRule, EvalContext, OptionRef,
    OptionState, Selection, Violation, WorkflowModel,
};

// ── Conflict Records ─────────────────────────────────────────────────

/// Informational record of overlap: several triggered constraints
/// named one target, and priority (then declaration order) picked a
/// winner. Not an error; surfaced so the authoring UI can warn about
/// overlapping rules even when they happen to agree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolved {
    /// The contested option
    pub target: OptionRef,
    /// The action that won
    pub action: ConstraintAction,
    /// Declaration index of the winning constraint
    pub winner: usize,
    /// Declaration indices of the overridden constraints
    pub losers: Vec<usize>,
}

// ── Evaluation Output ────────────────────────────────────────────────

/// The complete output of one evaluation pass
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    availability: AvailabilityMap,
    violations: Vec<Violation>,
    conflicts: Vec<ConflictResolved>,
}

impl Evaluation {
    /// The resolved state of every option
    pub fn availability(&self) -> &AvailabilityMap {
        &self.availability
    }

    /// Inconsistencies between the selection and the resolved states
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Overlapping rules that were resolved deterministically
    pub fn conflicts(&self) -> &[ConflictResolved] {
        &self.conflicts
    }

    /// True when the selection carries no violations
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

// ── Evaluator ────────────────────────────────────────────────────────

/// A triggered constraint aimed at one concrete target
struct Triggered {
    index: usize,
    action: ConstraintAction,
    priority: i32,
}

/// Resolves option availability from a model, a selection, and a
/// context snapshot. Stateless: every call derives the full map from
/// scratch.
#[derive(Clone, Debug, Default)]
pub struct ConstraintEvaluator;

impl ConstraintEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Compute the availability map and violations for one selection
    /// state. Deterministic: identical inputs give identical output.
    pub fn evaluate(
        &self,
        model: &WorkflowModel,
        selection: &Selection,
        context: &EvalContext,
    ) -> Evaluation {
        // Base states first; constraints override below.
        let mut availability = AvailabilityMap::new();
        for (step_key, option) in model.options() {
            let state = if option.available_by_default {
                OptionState::Available
            } else {
                OptionState::Disabled
            };
            availability.set(
                OptionRef {
                    step: step_key.clone(),
                    option: option.key.clone(),
                },
                state,
            );
        }

        // Collect triggered constraints per target, in declaration
        // order so the priority tiebreak falls out of iteration order.
        let mut by_target: BTreeMap<OptionRef, Vec<Triggered>> = BTreeMap::new();
        for (index, constraint) in model.constraints.iter().enumerate() {
            for target in triggered_targets(model, selection, context, constraint) {
                by_target.entry(target).or_default().push(Triggered {
                    index,
                    action: constraint.action,
                    priority: constraint.priority,
                });
            }
        }

        let mut conflicts = Vec::new();
        for (target, candidates) in &by_target {
            // Earlier declaration wins ties because we only replace on
            // a strictly higher priority.
            let mut winner = &candidates[0];
            for candidate in &candidates[1..] {
                if candidate.priority > winner.priority {
                    winner = candidate;
                }
            }

            let state = match winner.action {
                ConstraintAction::Disable => OptionState::Disabled,
                ConstraintAction::Enable => OptionState::Available,
                ConstraintAction::Require => OptionState::Required,
            };
            availability.set(target.clone(), state);

            if candidates.len() > 1 {
                let conflict = ConflictResolved {
                    target: target.clone(),
                    action: winner.action,
                    winner: winner.index,
                    losers: candidates
                        .iter()
                        .map(|c| c.index)
                        .filter(|i| *i != winner.index)
                        .collect(),
                };
                tracing::debug!(
                    target = %conflict.target,
                    winner = conflict.winner,
                    "overlapping constraints resolved by priority"
                );
                conflicts.push(conflict);
            }
        }

        let violations = collect_violations(model, selection, &availability);
        Evaluation {
            availability,
            violations,
            conflicts,
        }
    }
}

/// The concrete targets a constraint acts on under this selection and
/// context; empty when the constraint is not triggered.
fn triggered_targets(
    model: &WorkflowModel,
    selection: &Selection,
    context: &EvalContext,
    constraint: &Constraint,
) -> Vec<OptionRef> {
    match &constraint.rule {
        ConstraintRule::NextStep { source, target } => {
            if selection.is_selected(source) {
                vec![target.clone()]
            } else {
                Vec::new()
            }
        }
        // Direction-inverted: fires while the prerequisite is absent,
        // so unreached targets are held back and an already-selected
        // target surfaces as a violation.
        ConstraintRule::PreviousStep {
            prerequisite,
            target,
        } => {
            if selection.is_selected(prerequisite) {
                Vec::new()
            } else {
                vec![target.clone()]
            }
        }
        ConstraintRule::RangeSkip { source, range } => {
            if selection.is_selected(source) {
                model.expand_range(range)
            } else {
                Vec::new()
            }
        }
        ConstraintRule::Conditional { predicate, target } => {
            if predicate.eval(context) {
                vec![target.clone()]
            } else {
                Vec::new()
            }
        }
    }
}

fn collect_violations(
    model: &WorkflowModel,
    selection: &Selection,
    availability: &AvailabilityMap,
) -> Vec<Violation> {
    let last_selected = model
        .steps
        .iter()
        .enumerate()
        .filter(|(_, s)| selection.get(&s.key).is_some())
        .map(|(i, _)| i)
        .max();

    let mut violations = Vec::new();
    for (index, step) in model.steps.iter().enumerate() {
        let chosen = selection.get(&step.key);

        if let Some(option) = chosen {
            if availability.state(&step.key, option) == OptionState::Disabled {
                violations.push(Violation::SelectedButDisabled {
                    step: step.key.clone(),
                    option: option.clone(),
                });
            }
        }

        let required: Vec<_> = step
            .options
            .iter()
            .filter(|o| availability.state(&step.key, &o.key) == OptionState::Required)
            .map(|o| o.key.clone())
            .collect();

        // A required option left unselected only counts once the user
        // has moved past this step.
        let passed = last_selected.is_some_and(|last| last > index);
        if passed {
            for option in &required {
                if chosen != Some(option) {
                    violations.push(Violation::RequiredButUnselected {
                        step: step.key.clone(),
                        option: option.clone(),
                    });
                }
            }
        }

        if required.len() > 1 {
            violations.push(Violation::AmbiguousRequirement {
                step: step.key.clone(),
                options: required,
            });
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use stepflow_types::{
        ContextPredicate, ModelBuilder, OptionFilter, OptionKey, Step, StepKey, StepOption,
        StepRange,
    };

    fn plan_features_model(constraints: Vec<Constraint>) -> WorkflowModel {
        let mut builder = ModelBuilder::new("Signup")
            .with_step(
                Step::new("plan", "Choose a plan")
                    .with_option(StepOption::new("free", "Free"))
                    .with_option(StepOption::new("premium", "Premium")),
            )
            .with_step(
                Step::new("features", "Pick features")
                    .with_option(StepOption::new("basic", "Basic"))
                    .with_option(StepOption::new("advanced", "Advanced").disabled_by_default()),
            );
        for c in constraints {
            builder = builder.with_constraint(c);
        }
        builder.build().unwrap()
    }

    fn select(pairs: &[(&str, &str)]) -> Selection {
        pairs
            .iter()
            .map(|(s, o)| (StepKey::new(*s), OptionKey::new(*o)))
            .collect()
    }

    #[test]
    fn test_no_constraints_all_base_states() {
        let model = ModelBuilder::new("Plain")
            .with_step(
                Step::new("a", "A")
                    .with_option(StepOption::new("x", "X"))
                    .with_option(StepOption::new("y", "Y")),
            )
            .build()
            .unwrap();

        let eval = ConstraintEvaluator::new().evaluate(
            &model,
            &Selection::new(),
            &EvalContext::new(),
        );
        assert!(eval.is_valid());
        assert!(eval.conflicts().is_empty());
        for (_, state) in eval.availability().iter() {
            assert_eq!(*state, OptionState::Available);
        }
    }

    #[test]
    fn test_premium_enables_advanced() {
        // Advanced is disabled by default; selecting Premium enables it.
        let model = plan_features_model(vec![Constraint::next_step(
            OptionRef::new("plan", "premium"),
            OptionRef::new("features", "advanced"),
            ConstraintAction::Enable,
        )]);
        let evaluator = ConstraintEvaluator::new();
        let ctx = EvalContext::new();

        let eval = evaluator.evaluate(&model, &select(&[("plan", "free")]), &ctx);
        assert_eq!(
            eval.availability()
                .state(&StepKey::new("features"), &OptionKey::new("advanced")),
            OptionState::Disabled
        );

        let eval = evaluator.evaluate(&model, &select(&[("plan", "premium")]), &ctx);
        assert_eq!(
            eval.availability()
                .state(&StepKey::new("features"), &OptionKey::new("advanced")),
            OptionState::Available
        );
    }

    #[test]
    fn test_priority_resolution_flips_with_priorities() {
        let disable = Constraint::next_step(
            OptionRef::new("plan", "free"),
            OptionRef::new("features", "basic"),
            ConstraintAction::Disable,
        );
        let enable = Constraint::next_step(
            OptionRef::new("plan", "free"),
            OptionRef::new("features", "basic"),
            ConstraintAction::Enable,
        );
        let evaluator = ConstraintEvaluator::new();
        let ctx = EvalContext::new();
        let selection = select(&[("plan", "free")]);

        let model = plan_features_model(vec![
            disable.clone().with_priority(1),
            enable.clone().with_priority(5),
        ]);
        let eval = evaluator.evaluate(&model, &selection, &ctx);
        assert_eq!(
            eval.availability()
                .state(&StepKey::new("features"), &OptionKey::new("basic")),
            OptionState::Available
        );
        assert_eq!(eval.conflicts().len(), 1);
        assert_eq!(eval.conflicts()[0].winner, 1);
        assert_eq!(eval.conflicts()[0].losers, vec![0]);

        let model = plan_features_model(vec![
            disable.with_priority(5),
            enable.with_priority(1),
        ]);
        let eval = evaluator.evaluate(&model, &selection, &ctx);
        assert_eq!(
            eval.availability()
                .state(&StepKey::new("features"), &OptionKey::new("basic")),
            OptionState::Disabled
        );
    }

    #[test]
    fn test_priority_tie_earlier_declaration_wins() {
        let model = plan_features_model(vec![
            Constraint::next_step(
                OptionRef::new("plan", "free"),
                OptionRef::new("features", "basic"),
                ConstraintAction::Disable,
            )
            .with_priority(3),
            Constraint::next_step(
                OptionRef::new("plan", "free"),
                OptionRef::new("features", "basic"),
                ConstraintAction::Enable,
            )
            .with_priority(3),
        ]);
        let eval = ConstraintEvaluator::new().evaluate(
            &model,
            &select(&[("plan", "free")]),
            &EvalContext::new(),
        );
        assert_eq!(
            eval.availability()
                .state(&StepKey::new("features"), &OptionKey::new("basic")),
            OptionState::Disabled
        );
        assert_eq!(eval.conflicts()[0].winner, 0);
    }

    #[test]
    fn test_disable_beats_lower_priority_require() {
        // A required option is never simultaneously disabled: the
        // higher-priority disable simply wins and the clash is reported.
        let model = plan_features_model(vec![
            Constraint::next_step(
                OptionRef::new("plan", "free"),
                OptionRef::new("features", "basic"),
                ConstraintAction::Require,
            )
            .with_priority(1),
            Constraint::next_step(
                OptionRef::new("plan", "free"),
                OptionRef::new("features", "basic"),
                ConstraintAction::Disable,
            )
            .with_priority(2),
        ]);
        let eval = ConstraintEvaluator::new().evaluate(
            &model,
            &select(&[("plan", "free")]),
            &EvalContext::new(),
        );
        assert_eq!(
            eval.availability()
                .state(&StepKey::new("features"), &OptionKey::new("basic")),
            OptionState::Disabled
        );
        assert_eq!(eval.conflicts().len(), 1);
        assert!(eval.is_valid());
    }

    #[test]
    fn test_require_marks_option_required() {
        let model = plan_features_model(vec![Constraint::next_step(
            OptionRef::new("plan", "free"),
            OptionRef::new("features", "basic"),
            ConstraintAction::Require,
        )]);
        let eval = ConstraintEvaluator::new().evaluate(
            &model,
            &select(&[("plan", "free")]),
            &EvalContext::new(),
        );
        let state = eval
            .availability()
            .state(&StepKey::new("features"), &OptionKey::new("basic"));
        assert_eq!(state, OptionState::Required);
        assert!(state.is_selectable());
    }

    #[test]
    fn test_previous_step_violation_references_stale_selection() {
        // Advanced features require Premium. Selecting advanced while
        // plan is unselected flags the advanced selection.
        let model = plan_features_model(vec![Constraint::previous_step(
            OptionRef::new("plan", "premium"),
            OptionRef::new("features", "basic"),
        )]);
        let evaluator = ConstraintEvaluator::new();
        let ctx = EvalContext::new();

        let eval = evaluator.evaluate(&model, &select(&[("features", "basic")]), &ctx);
        assert_eq!(
            eval.violations(),
            &[Violation::SelectedButDisabled {
                step: StepKey::new("features"),
                option: OptionKey::new("basic"),
            }]
        );

        // Satisfying the prerequisite clears the violation.
        let eval = evaluator.evaluate(
            &model,
            &select(&[("plan", "premium"), ("features", "basic")]),
            &ctx,
        );
        assert!(eval.is_valid());
    }

    #[test]
    fn test_previous_step_holds_back_unreached_target() {
        let model = plan_features_model(vec![Constraint::previous_step(
            OptionRef::new("plan", "premium"),
            OptionRef::new("features", "basic"),
        )]);
        let eval = ConstraintEvaluator::new().evaluate(
            &model,
            &Selection::new(),
            &EvalContext::new(),
        );
        assert_eq!(
            eval.availability()
                .state(&StepKey::new("features"), &OptionKey::new("basic")),
            OptionState::Disabled
        );
        assert!(eval.is_valid());
    }

    #[test]
    fn test_range_skip_disables_covered_options() {
        let model = ModelBuilder::new("Checkout")
            .with_step(
                Step::new("plan", "Plan")
                    .with_option(StepOption::new("standard", "Standard"))
                    .with_option(StepOption::new("express", "Express")),
            )
            .with_step(
                Step::new("addons", "Add-ons")
                    .with_option(StepOption::new("none", "None"))
                    .with_option(StepOption::new("gift", "Gift wrap")),
            )
            .with_step(
                Step::new("review", "Review")
                    .with_option(StepOption::new("quick", "Quick"))
                    .with_option(StepOption::new("detailed", "Detailed")),
            )
            .with_constraint(Constraint::range_skip(
                OptionRef::new("plan", "express"),
                StepRange::new("addons", "review")
                    .with_filter(OptionFilter::Except(vec![OptionKey::new("none")])),
                ConstraintAction::Disable,
            ))
            .build()
            .unwrap();

        let eval = ConstraintEvaluator::new().evaluate(
            &model,
            &select(&[("plan", "express")]),
            &EvalContext::new(),
        );
        let map = eval.availability();
        assert_eq!(
            map.state(&StepKey::new("addons"), &OptionKey::new("gift")),
            OptionState::Disabled
        );
        assert_eq!(
            map.state(&StepKey::new("review"), &OptionKey::new("quick")),
            OptionState::Disabled
        );
        // Filtered out of the range, untouched.
        assert_eq!(
            map.state(&StepKey::new("addons"), &OptionKey::new("none")),
            OptionState::Available
        );
    }

    #[test]
    fn test_conditional_fires_from_context_alone() {
        let model = plan_features_model(vec![Constraint::conditional(
            ContextPredicate::UserLevelAtLeast(10),
            OptionRef::new("features", "advanced"),
            ConstraintAction::Enable,
        )]);
        let evaluator = ConstraintEvaluator::new();

        let eval = evaluator.evaluate(
            &model,
            &Selection::new(),
            &EvalContext::new().with_user_level(3),
        );
        assert_eq!(
            eval.availability()
                .state(&StepKey::new("features"), &OptionKey::new("advanced")),
            OptionState::Disabled
        );

        let eval = evaluator.evaluate(
            &model,
            &Selection::new(),
            &EvalContext::new().with_user_level(12),
        );
        assert_eq!(
            eval.availability()
                .state(&StepKey::new("features"), &OptionKey::new("advanced")),
            OptionState::Available
        );
    }

    #[test]
    fn test_required_but_unselected_only_after_step_passed() {
        let model = plan_features_model(vec![Constraint::conditional(
            ContextPredicate::FlagSet("promo".into()),
            OptionRef::new("plan", "premium"),
            ConstraintAction::Require,
        )]);
        let evaluator = ConstraintEvaluator::new();
        let ctx = EvalContext::new().with_flag("promo");

        // Plan step not passed yet: no violation.
        let eval = evaluator.evaluate(&model, &Selection::new(), &ctx);
        assert!(eval.is_valid());

        // A later step holds a selection: the unfilled requirement counts.
        let eval = evaluator.evaluate(&model, &select(&[("features", "basic")]), &ctx);
        assert_eq!(
            eval.violations(),
            &[Violation::RequiredButUnselected {
                step: StepKey::new("plan"),
                option: OptionKey::new("premium"),
            }]
        );
    }

    #[test]
    fn test_ambiguous_requirement_flagged() {
        let model = plan_features_model(vec![
            Constraint::next_step(
                OptionRef::new("plan", "free"),
                OptionRef::new("features", "basic"),
                ConstraintAction::Require,
            ),
            Constraint::next_step(
                OptionRef::new("plan", "free"),
                OptionRef::new("features", "advanced"),
                ConstraintAction::Require,
            ),
        ]);
        let eval = ConstraintEvaluator::new().evaluate(
            &model,
            &select(&[("plan", "free")]),
            &EvalContext::new(),
        );
        assert!(eval
            .violations()
            .iter()
            .any(|v| matches!(v, Violation::AmbiguousRequirement { .. })));
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let model = plan_features_model(vec![
            Constraint::next_step(
                OptionRef::new("plan", "premium"),
                OptionRef::new("features", "advanced"),
                ConstraintAction::Enable,
            ),
            Constraint::previous_step(
                OptionRef::new("plan", "premium"),
                OptionRef::new("features", "basic"),
            ),
        ]);
        let evaluator = ConstraintEvaluator::new();
        let ctx = EvalContext::new().with_user_level(5);
        let selection = select(&[("plan", "premium"), ("features", "basic")]);

        let first = evaluator.evaluate(&model, &selection, &ctx);
        let second = evaluator.evaluate(&model, &selection, &ctx);
        assert_eq!(first, second);
    }

    #[test]
    fn test_overlapping_agreeing_rules_still_reported() {
        // Two rules, same action, same target: resolution is trivial
        // but the overlap is still recorded for the authoring UI.
        let rule = Constraint::next_step(
            OptionRef::new("plan", "free"),
            OptionRef::new("features", "advanced"),
            ConstraintAction::Disable,
        );
        let model = plan_features_model(vec![rule.clone(), rule]);
        let eval = ConstraintEvaluator::new().evaluate(
            &model,
            &select(&[("plan", "free")]),
            &EvalContext::new(),
        );

        assert_eq!(eval.conflicts().len(), 1);
        assert_eq!(eval.conflicts()[0].winner, 0);
        assert_eq!(eval.conflicts()[0].losers, vec![1]);
        assert_eq!(eval.conflicts()[0].action, ConstraintAction::Disable);
    }

    #[test]
    fn test_evaluation_serializes_for_ui_consumers() {
        let model = plan_features_model(vec![Constraint::next_step(
            OptionRef::new("plan", "premium"),
            OptionRef::new("features", "advanced"),
            ConstraintAction::Enable,
        )]);
        let eval = ConstraintEvaluator::new().evaluate(
            &model,
            &select(&[("plan", "premium")]),
            &EvalContext::new(),
        );

        let json = serde_json::to_string(&eval).unwrap();
        let back: Evaluation = serde_json::from_str(&json).unwrap();
        assert_eq!(eval, back);
    }

    // ── Property tests ───────────────────────────────────────────────

    /// A 3×3 grid model with generated disable/enable constraints.
    /// Require is excluded so generated models always pass validation.
    fn arb_model() -> impl Strategy<Value = WorkflowModel> {
        let pair = (0usize..3, 0usize..3);
        let constraint = (pair.clone(), pair, any::<bool>(), 0i32..4).prop_filter_map(
            "self-targeting constraints are invalid",
            |(src, tgt, enable, priority)| {
                if src == tgt {
                    return None;
                }
                let action = if enable {
                    ConstraintAction::Enable
                } else {
                    ConstraintAction::Disable
                };
                Some(
                    Constraint::next_step(
                        OptionRef::new(format!("s{}", src.0), format!("o{}", src.1)),
                        OptionRef::new(format!("s{}", tgt.0), format!("o{}", tgt.1)),
                        action,
                    )
                    .with_priority(priority),
                )
            },
        );

        proptest::collection::vec(constraint, 0..6).prop_map(|constraints| {
            let mut builder = ModelBuilder::new("Generated");
            for s in 0..3 {
                let mut step = Step::new(format!("s{}", s), format!("Step {}", s));
                for o in 0..3 {
                    step = step.with_option(StepOption::new(format!("o{}", o), format!("O{}", o)));
                }
                builder = builder.with_step(step);
            }
            for c in constraints {
                builder = builder.with_constraint(c);
            }
            builder.build().unwrap()
        })
    }

    fn arb_selection() -> impl Strategy<Value = Selection> {
        proptest::collection::btree_map(0usize..3, 0usize..3, 0..3).prop_map(|m| {
            m.into_iter()
                .map(|(s, o)| (StepKey::new(format!("s{}", s)), OptionKey::new(format!("o{}", o))))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_evaluate_idempotent(model in arb_model(), selection in arb_selection()) {
            let evaluator = ConstraintEvaluator::new();
            let ctx = EvalContext::new();
            prop_assert_eq!(
                evaluator.evaluate(&model, &selection, &ctx),
                evaluator.evaluate(&model, &selection, &ctx)
            );
        }

        #[test]
        fn prop_map_is_total(model in arb_model(), selection in arb_selection()) {
            let eval = ConstraintEvaluator::new().evaluate(&model, &selection, &EvalContext::new());
            prop_assert_eq!(eval.availability().len(), model.option_count());
        }

        #[test]
        fn prop_no_constraints_all_available(selection in arb_selection()) {
            let mut builder = ModelBuilder::new("Plain");
            for s in 0..3 {
                let mut step = Step::new(format!("s{}", s), format!("Step {}", s));
                for o in 0..3 {
                    step = step.with_option(StepOption::new(format!("o{}", o), format!("O{}", o)));
                }
                builder = builder.with_step(step);
            }
            let model = builder.build().unwrap();

            let eval = ConstraintEvaluator::new().evaluate(&model, &selection, &EvalContext::new());
            prop_assert!(eval.is_valid());
            for (_, state) in eval.availability().iter() {
                prop_assert_eq!(*state, OptionState::Available);
            }
        }
    }
}
