//! Path enumeration: every constraint-satisfying way through a workflow
//!
//! Depth-first over steps in declared order. Availability at each step
//! is recomputed from the selections made so far, so constraint effects
//! propagate into the traversal and infeasible branches are pruned
//! before they grow. The enumerator is a plain iterator: lazy, bounded
//! by the (pruned) product of per-step option counts, and restartable:
//! each construction owns an independent traversal stack, so consumers
//! can stop, interleave with rendering, or run several enumerations at
//! once.

use crate::ConstraintEvaluator;
use std::sync::Arc;
use stepflow_types::{EvalContext, OptionKey, OptionState, Selection, WorkflowModel};

/// One branch of the depth-first traversal: the selection made for
/// steps `0..depth`.
#[derive(Clone, Debug)]
struct Frame {
    selection: Selection,
    depth: usize,
}

/// Lazily yields every complete, violation-free selection
#[derive(Clone, Debug)]
pub struct PathEnumerator {
    model: Arc<WorkflowModel>,
    context: EvalContext,
    anchor: Selection,
    evaluator: ConstraintEvaluator,
    stack: Vec<Frame>,
}

impl PathEnumerator {
    /// Enumerate all paths through the model
    pub fn new(model: Arc<WorkflowModel>, context: EvalContext) -> Self {
        Self::anchored(model, context, Selection::new())
    }

    /// Enumerate only paths that agree with `anchor`: any step the
    /// anchor selects is fixed to that choice, and branches where the
    /// anchored choice is not viable are pruned
    pub fn anchored(model: Arc<WorkflowModel>, context: EvalContext, anchor: Selection) -> Self {
        Self {
            model,
            context,
            anchor,
            evaluator: ConstraintEvaluator::new(),
            stack: vec![Frame {
                selection: Selection::new(),
                depth: 0,
            }],
        }
    }

    /// The candidate options at the frame's current step, honoring
    /// availability, required options, and the anchor. Empty means the
    /// branch is pruned.
    fn candidates(&self, frame: &Frame) -> Vec<OptionKey> {
        let step = &self.model.steps[frame.depth];
        let eval = self
            .evaluator
            .evaluate(&self.model, &frame.selection, &self.context);

        let required: Vec<OptionKey> = step
            .options
            .iter()
            .filter(|o| eval.availability().state(&step.key, &o.key) == OptionState::Required)
            .map(|o| o.key.clone())
            .collect();

        // Several simultaneously required options is an authoring
        // ambiguity: the evaluator flags it, we refuse to guess.
        if required.len() > 1 {
            return Vec::new();
        }

        if let Some(anchored) = self.anchor.get(&step.key) {
            let viable = step.has_option(anchored)
                && eval.availability().is_selectable(&step.key, anchored)
                && required.first().map_or(true, |r| r == anchored);
            return if viable {
                vec![anchored.clone()]
            } else {
                Vec::new()
            };
        }

        if let Some(required) = required.into_iter().next() {
            return vec![required];
        }

        step.options
            .iter()
            .filter(|o| eval.availability().is_selectable(&step.key, &o.key))
            .map(|o| o.key.clone())
            .collect()
    }
}

impl Iterator for PathEnumerator {
    type Item = Selection;

    fn next(&mut self) -> Option<Selection> {
        while let Some(frame) = self.stack.pop() {
            if frame.depth == self.model.step_count() {
                // Complete branch: yield only if fully consistent.
                let eval = self
                    .evaluator
                    .evaluate(&self.model, &frame.selection, &self.context);
                if eval.is_valid() {
                    return Some(frame.selection);
                }
                continue;
            }

            let step_key = self.model.steps[frame.depth].key.clone();
            // Reverse push so the first declared option is explored first.
            for option in self.candidates(&frame).into_iter().rev() {
                let mut selection = frame.selection.clone();
                selection.select(step_key.clone(), option);
                self.stack.push(Frame {
                    selection,
                    depth: frame.depth + 1,
                });
            }
        }
        None
    }
}
