//! Guarded model editing
//!
//! Models are immutable: every edit rebuilds through the validating
//! builder and bumps the version. Destructive edits (removing a step
//! or option that other constraints reference) go through an
//! [`EditGuard`], the confirmation collaborator: the guard is asked
//! first, and a decline aborts the edit with the model untouched.

use crate::EditError;
use stepflow_types::{
    Constraint, ConstraintRule, OptionRef, Step, StepKey, WorkflowModel,
};

// ── Edit Guard ───────────────────────────────────────────────────────

/// Confirmation collaborator consulted before destructive edits
pub trait EditGuard {
    /// Return true to proceed with the described edit
    fn confirm(&self, prompt: &str) -> bool;
}

/// Guard that approves every edit, for non-interactive callers
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoConfirm;

impl EditGuard for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

// ── Model Editor ─────────────────────────────────────────────────────

/// Applies edits to a model by rebuilding it; the original is replaced
/// only when the rebuilt model validates
#[derive(Clone, Debug)]
pub struct ModelEditor {
    model: WorkflowModel,
}

impl ModelEditor {
    pub fn new(model: WorkflowModel) -> Self {
        Self { model }
    }

    /// The current model
    pub fn model(&self) -> &WorkflowModel {
        &self.model
    }

    /// Finish editing and take the model
    pub fn into_model(self) -> WorkflowModel {
        self.model
    }

    /// Append a step at the end of the workflow
    pub fn add_step(&mut self, step: Step) -> Result<(), EditError> {
        let rebuilt = self
            .model
            .to_builder()
            .with_version(self.model.version + 1)
            .with_step(step)
            .build()?;
        self.model = rebuilt;
        Ok(())
    }

    /// Append a constraint
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), EditError> {
        let rebuilt = self
            .model
            .to_builder()
            .with_version(self.model.version + 1)
            .with_constraint(constraint)
            .build()?;
        self.model = rebuilt;
        Ok(())
    }

    /// Remove a constraint by declaration index
    pub fn remove_constraint(&mut self, index: usize) -> Result<Constraint, EditError> {
        if index >= self.model.constraints.len() {
            return Err(EditError::UnknownConstraint(index));
        }
        let mut constraints = self.model.constraints.clone();
        let removed = constraints.remove(index);
        self.rebuild(self.model.steps.clone(), constraints)?;
        Ok(removed)
    }

    /// Remove a step. When other constraints reference the step, the
    /// guard is asked first; on confirmation those constraints are
    /// removed along with the step.
    pub fn remove_step(&mut self, key: &StepKey, guard: &dyn EditGuard) -> Result<(), EditError> {
        if self.model.step(key).is_none() {
            return Err(EditError::UnknownStep(key.clone()));
        }

        let referencing = self
            .model
            .constraints
            .iter()
            .filter(|c| references_step(c, key))
            .count();
        if referencing > 0 {
            let prompt = format!(
                "Removing step '{}' also removes {} constraint(s) referencing it. Continue?",
                key, referencing
            );
            if !guard.confirm(&prompt) {
                tracing::debug!(step = %key, "step removal declined");
                return Err(EditError::Aborted);
            }
        }

        let steps: Vec<Step> = self
            .model
            .steps
            .iter()
            .filter(|s| &s.key != key)
            .cloned()
            .collect();
        let constraints: Vec<Constraint> = self
            .model
            .constraints
            .iter()
            .filter(|c| !references_step(c, key))
            .cloned()
            .collect();
        self.rebuild(steps, constraints)
    }

    /// Remove one option from its step, with the same guard protocol
    /// as [`ModelEditor::remove_step`]
    pub fn remove_option(
        &mut self,
        reference: &OptionRef,
        guard: &dyn EditGuard,
    ) -> Result<(), EditError> {
        if self.model.option(reference).is_none() {
            return Err(EditError::UnknownOption(reference.clone()));
        }

        let referencing = self
            .model
            .constraints
            .iter()
            .filter(|c| references_option(c, reference))
            .count();
        if referencing > 0 {
            let prompt = format!(
                "Removing option '{}' also removes {} constraint(s) referencing it. Continue?",
                reference, referencing
            );
            if !guard.confirm(&prompt) {
                tracing::debug!(option = %reference, "option removal declined");
                return Err(EditError::Aborted);
            }
        }

        let steps: Vec<Step> = self
            .model
            .steps
            .iter()
            .map(|s| {
                if s.key != reference.step {
                    return s.clone();
                }
                let mut step = s.clone();
                step.options.retain(|o| o.key != reference.option);
                step
            })
            .collect();
        let constraints: Vec<Constraint> = self
            .model
            .constraints
            .iter()
            .filter(|c| !references_option(c, reference))
            .cloned()
            .collect();
        self.rebuild(steps, constraints)
    }

    fn rebuild(&mut self, steps: Vec<Step>, constraints: Vec<Constraint>) -> Result<(), EditError> {
        self.model = self
            .model
            .to_builder()
            .with_version(self.model.version + 1)
            .replace_content(steps, constraints)
            .build()?;
        Ok(())
    }
}

fn references_step(constraint: &Constraint, key: &StepKey) -> bool {
    if constraint.source().is_some_and(|r| &r.step == key)
        || constraint.single_target().is_some_and(|r| &r.step == key)
    {
        return true;
    }
    match &constraint.rule {
        ConstraintRule::RangeSkip { range, .. } => &range.from == key || &range.to == key,
        _ => false,
    }
}

fn references_option(constraint: &Constraint, reference: &OptionRef) -> bool {
    constraint.source() == Some(reference) || constraint.single_target() == Some(reference)
}
