//! Selection sessions: live selection state plus derived availability
//!
//! A session owns one selection against one shared model. Every change
//! re-derives the full availability map from scratch; workflows stay
//! small, so recomputing beats incremental bookkeeping. The model is behind
//! an `Arc` and safely shared across any number of sessions; the
//! selection and evaluation belong to this session alone.

use crate::{ConstraintEvaluator, Evaluation, SessionError};
use std::sync::Arc;
use stepflow_types::{
    AvailabilityMap, EvalContext, OptionKey, OptionRef, Selection, StepKey, Violation,
    WorkflowModel,
};

/// Stateful wrapper around a selection and its freshly computed
/// availability
#[derive(Clone, Debug)]
pub struct SelectionSession {
    model: Arc<WorkflowModel>,
    context: EvalContext,
    selection: Selection,
    evaluation: Evaluation,
    evaluator: ConstraintEvaluator,
}

impl SelectionSession {
    /// Open a session with an empty selection
    pub fn new(model: Arc<WorkflowModel>, context: EvalContext) -> Self {
        let evaluator = ConstraintEvaluator::new();
        let selection = Selection::new();
        let evaluation = evaluator.evaluate(&model, &selection, &context);
        Self {
            model,
            context,
            selection,
            evaluation,
            evaluator,
        }
    }

    /// Resume a session from a stored selection
    pub fn with_selection(
        model: Arc<WorkflowModel>,
        context: EvalContext,
        selection: Selection,
    ) -> Self {
        let evaluator = ConstraintEvaluator::new();
        let evaluation = evaluator.evaluate(&model, &selection, &context);
        Self {
            model,
            context,
            selection,
            evaluation,
            evaluator,
        }
    }

    /// Choose an option at a step, replacing any prior choice there,
    /// and return the recomputed availability map
    pub fn select(
        &mut self,
        step: StepKey,
        option: OptionKey,
    ) -> Result<&AvailabilityMap, SessionError> {
        let model_step = self
            .model
            .step(&step)
            .ok_or_else(|| SessionError::UnknownStep(step.clone()))?;
        if !model_step.has_option(&option) {
            return Err(SessionError::UnknownOption(OptionRef {
                step,
                option,
            }));
        }

        tracing::debug!(step = %step, option = %option, "selection changed");
        self.selection.select(step, option);
        self.recompute();
        Ok(self.evaluation.availability())
    }

    /// Unset a step's choice and return the recomputed availability map
    pub fn clear(&mut self, step: &StepKey) -> Result<&AvailabilityMap, SessionError> {
        if self.model.step(step).is_none() {
            return Err(SessionError::UnknownStep(step.clone()));
        }
        self.selection.clear(step);
        self.recompute();
        Ok(self.evaluation.availability())
    }

    /// Unset every choice
    pub fn clear_all(&mut self) -> &AvailabilityMap {
        self.selection.clear_all();
        self.recompute();
        self.evaluation.availability()
    }

    /// Replace the external context snapshot and re-evaluate
    pub fn set_context(&mut self, context: EvalContext) -> &AvailabilityMap {
        self.context = context;
        self.recompute();
        self.evaluation.availability()
    }

    /// True when the current selection carries no violations
    pub fn is_valid(&self) -> bool {
        self.evaluation.is_valid()
    }

    /// Current violations, if any
    pub fn violations(&self) -> &[Violation] {
        self.evaluation.violations()
    }

    /// The current availability map
    pub fn availability(&self) -> &AvailabilityMap {
        self.evaluation.availability()
    }

    /// The full last evaluation, including conflict records
    pub fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }

    /// The current selection
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// The model this session runs against
    pub fn model(&self) -> &WorkflowModel {
        &self.model
    }

    fn recompute(&mut self) {
        // Replaced wholesale: readers of the previous map never see a
        // partially updated state.
        self.evaluation = self
            .evaluator
            .evaluate(&self.model, &self.selection, &self.context);
        if !self.evaluation.is_valid() {
            tracing::debug!(
                violations = self.evaluation.violations().len(),
                "selection has violations"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepflow_types::{
        Constraint, ConstraintAction, ModelBuilder, OptionState, Step, StepOption,
    };

    fn session() -> SelectionSession {
        let model = ModelBuilder::new("Signup")
            .with_step(
                Step::new("plan", "Choose a plan")
                    .with_option(StepOption::new("free", "Free"))
                    .with_option(StepOption::new("premium", "Premium")),
            )
            .with_step(
                Step::new("features", "Pick features")
                    .with_option(StepOption::new("basic", "Basic"))
                    .with_option(StepOption::new("advanced", "Advanced").disabled_by_default()),
            )
            .with_constraint(Constraint::next_step(
                OptionRef::new("plan", "premium"),
                OptionRef::new("features", "advanced"),
                ConstraintAction::Enable,
            ))
            .build()
            .unwrap();
        SelectionSession::new(Arc::new(model), EvalContext::new())
    }

    #[test]
    fn test_select_updates_availability() {
        let mut session = session();
        assert_eq!(
            session
                .availability()
                .state(&StepKey::new("features"), &OptionKey::new("advanced")),
            OptionState::Disabled
        );

        let map = session
            .select(StepKey::new("plan"), OptionKey::new("premium"))
            .unwrap();
        assert_eq!(
            map.state(&StepKey::new("features"), &OptionKey::new("advanced")),
            OptionState::Available
        );
    }

    #[test]
    fn test_select_replaces_prior_choice() {
        let mut session = session();
        session
            .select(StepKey::new("plan"), OptionKey::new("premium"))
            .unwrap();
        session
            .select(StepKey::new("plan"), OptionKey::new("free"))
            .unwrap();

        assert_eq!(session.selection().len(), 1);
        assert_eq!(
            session.selection().get(&StepKey::new("plan")),
            Some(&OptionKey::new("free"))
        );
    }

    #[test]
    fn test_unknown_step_and_option_rejected() {
        let mut session = session();
        let result = session.select(StepKey::new("nonexistent"), OptionKey::new("free"));
        assert!(matches!(result, Err(SessionError::UnknownStep(_))));

        let result = session.select(StepKey::new("plan"), OptionKey::new("enterprise"));
        assert!(matches!(result, Err(SessionError::UnknownOption(_))));

        let result = session.clear(&StepKey::new("nonexistent"));
        assert!(matches!(result, Err(SessionError::UnknownStep(_))));
    }

    #[test]
    fn test_clear_restores_constrained_state() {
        let mut session = session();
        session
            .select(StepKey::new("plan"), OptionKey::new("premium"))
            .unwrap();
        let map = session.clear(&StepKey::new("plan")).unwrap();
        assert_eq!(
            map.state(&StepKey::new("features"), &OptionKey::new("advanced")),
            OptionState::Disabled
        );
        assert!(session.selection().is_empty());
    }

    #[test]
    fn test_validity_tracks_stale_selections() {
        // Selecting advanced then dropping premium leaves a stale,
        // now-disabled selection behind.
        let mut session = session();
        session
            .select(StepKey::new("plan"), OptionKey::new("premium"))
            .unwrap();
        session
            .select(StepKey::new("features"), OptionKey::new("advanced"))
            .unwrap();
        assert!(session.is_valid());

        session.select(StepKey::new("plan"), OptionKey::new("free")).unwrap();
        assert!(!session.is_valid());
        assert_eq!(session.violations().len(), 1);

        session.clear_all();
        assert!(session.is_valid());
    }

    #[test]
    fn test_set_context_reevaluates() {
        use stepflow_types::ContextPredicate;

        let model = ModelBuilder::new("Gated")
            .with_step(
                Step::new("features", "Features")
                    .with_option(StepOption::new("basic", "Basic"))
                    .with_option(StepOption::new("expert", "Expert").disabled_by_default()),
            )
            .with_constraint(Constraint::conditional(
                ContextPredicate::UserLevelAtLeast(10),
                OptionRef::new("features", "expert"),
                ConstraintAction::Enable,
            ))
            .build()
            .unwrap();

        let mut session = SelectionSession::new(Arc::new(model), EvalContext::new());
        assert_eq!(
            session
                .availability()
                .state(&StepKey::new("features"), &OptionKey::new("expert")),
            OptionState::Disabled
        );

        let map = session.set_context(EvalContext::new().with_user_level(11));
        assert_eq!(
            map.state(&StepKey::new("features"), &OptionKey::new("expert")),
            OptionState::Available
        );
    }

    #[test]
    fn test_sessions_share_one_model() {
        let model = Arc::new(
            ModelBuilder::new("Shared")
                .with_step(Step::new("a", "A").with_option(StepOption::new("x", "X")))
                .build()
                .unwrap(),
        );
        let mut first = SelectionSession::new(Arc::clone(&model), EvalContext::new());
        let second = SelectionSession::new(Arc::clone(&model), EvalContext::new());

        first
            .select(StepKey::new("a"), OptionKey::new("x"))
            .unwrap();
        assert_eq!(first.selection().len(), 1);
        assert!(second.selection().is_empty());
    }

    #[test]
    fn test_resume_from_stored_selection() {
        let mut stored = Selection::new();
        stored.select(StepKey::new("plan"), OptionKey::new("premium"));

        let base = session();
        let resumed = SelectionSession::with_selection(
            Arc::new(base.model().clone()),
            EvalContext::new(),
            stored,
        );
        assert!(resumed.is_valid());
        assert_eq!(
            resumed
                .availability()
                .state(&StepKey::new("features"), &OptionKey::new("advanced")),
            OptionState::Available
        );
    }
}
