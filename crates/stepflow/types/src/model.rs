//! Workflow models: validated, immutable step/constraint graphs
//!
//! A WorkflowModel is built once from authoring input and never
//! mutated. Every structural mistake is caught at build time so
//! evaluation can assume a well-formed model and never fail.
//!
//! To change a model, rebuild it: [`WorkflowModel::to_builder`] hands
//! back a builder seeded with the model's content.

use crate::{
    Constraint, ConstraintAction, ConstraintRule, OptionRef, Step, StepKey, StepRange,
    ValidationError, ValidationResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ── Identifier ───────────────────────────────────────────────────────

/// Unique identifier for a workflow model
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId(pub String);

impl ModelId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The first eight characters, for compact log output
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Workflow Model ───────────────────────────────────────────────────

/// An immutable description of steps, options, and constraints
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowModel {
    /// Unique identifier
    pub id: ModelId,
    /// Human-readable name
    pub name: String,
    /// Description of what this workflow accomplishes
    pub description: String,
    /// Version, bumped on every edit
    pub version: u32,
    /// Steps in workflow order
    pub steps: Vec<Step>,
    /// Constraints in declaration order. Order is the priority
    /// tiebreak, so it is load-bearing.
    pub constraints: Vec<Constraint>,
    /// When this model was built
    pub created_at: DateTime<Utc>,
    /// Metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl WorkflowModel {
    /// Get a step by key
    pub fn step(&self, key: &StepKey) -> Option<&Step> {
        self.steps.iter().find(|s| &s.key == key)
    }

    /// The position of a step in workflow order
    pub fn step_index(&self, key: &StepKey) -> Option<usize> {
        self.steps.iter().position(|s| &s.key == key)
    }

    /// Resolve an option reference
    pub fn option(&self, reference: &OptionRef) -> Option<&crate::StepOption> {
        self.step(&reference.step)
            .and_then(|s| s.option(&reference.option))
    }

    /// Check whether a reference resolves in this model
    pub fn contains(&self, reference: &OptionRef) -> bool {
        self.option(reference).is_some()
    }

    /// Iterate every (step, option) pair in workflow order
    pub fn options(&self) -> impl Iterator<Item = (&StepKey, &crate::StepOption)> {
        self.steps
            .iter()
            .flat_map(|s| s.options.iter().map(move |o| (&s.key, o)))
    }

    /// Expand a step range into the individual options it covers.
    ///
    /// Endpoints are inclusive. A reversed or unresolvable range
    /// expands to nothing.
    pub fn expand_range(&self, range: &StepRange) -> Vec<OptionRef> {
        let (Some(from), Some(to)) = (self.step_index(&range.from), self.step_index(&range.to))
        else {
            return Vec::new();
        };
        if from > to {
            return Vec::new();
        }

        self.steps[from..=to]
            .iter()
            .flat_map(|step| {
                step.options
                    .iter()
                    .filter(|o| range.filter.matches(&o.key))
                    .map(|o| OptionRef {
                        step: step.key.clone(),
                        option: o.key.clone(),
                    })
            })
            .collect()
    }

    /// Number of steps
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Total number of options across all steps
    pub fn option_count(&self) -> usize {
        self.steps.iter().map(|s| s.options.len()).sum()
    }

    /// Start a rebuild of this model. The builder carries the same id,
    /// name, version, and metadata; callers bump the version for edits.
    pub fn to_builder(&self) -> ModelBuilder {
        ModelBuilder {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            description: self.description.clone(),
            version: self.version,
            steps: self.steps.clone(),
            constraints: self.constraints.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

// ── Builder ──────────────────────────────────────────────────────────

/// Collects steps and constraints and validates them into a
/// [`WorkflowModel`]
#[derive(Clone, Debug)]
pub struct ModelBuilder {
    id: Option<ModelId>,
    name: String,
    description: String,
    version: u32,
    steps: Vec<Step>,
    constraints: Vec<Constraint>,
    metadata: HashMap<String, String>,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            version: 1,
            steps: Vec::new(),
            constraints: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Append a step at the end of the workflow order
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append a constraint. Declaration order breaks priority ties.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Replace steps and constraints wholesale, for editors that
    /// rebuild a model from modified content
    pub fn replace_content(mut self, steps: Vec<Step>, constraints: Vec<Constraint>) -> Self {
        self.steps = steps;
        self.constraints = constraints;
        self
    }

    /// Validate and construct the model. Fails fast: evaluation never
    /// re-checks any of this.
    pub fn build(self) -> ValidationResult<WorkflowModel> {
        let model = WorkflowModel {
            id: self.id.unwrap_or_else(ModelId::generate),
            name: self.name,
            description: self.description,
            version: self.version,
            steps: self.steps,
            constraints: self.constraints,
            created_at: Utc::now(),
            metadata: self.metadata,
        };
        validate(&model)?;
        Ok(model)
    }
}

// ── Validation ───────────────────────────────────────────────────────

fn validate(model: &WorkflowModel) -> ValidationResult<()> {
    if model.steps.is_empty() {
        return Err(ValidationError::EmptyModel);
    }

    let mut seen_steps = HashSet::new();
    for step in &model.steps {
        // Step keys appear before the '.' in serialized option
        // references, so a dotted key would not round-trip.
        if step.key.0.contains('.') {
            return Err(ValidationError::InvalidStepKey(step.key.clone()));
        }
        if !seen_steps.insert(&step.key) {
            return Err(ValidationError::DuplicateStep(step.key.clone()));
        }
        if step.options.is_empty() {
            return Err(ValidationError::EmptyStep(step.key.clone()));
        }
        let mut seen_options = HashSet::new();
        for option in &step.options {
            if !seen_options.insert(&option.key) {
                return Err(ValidationError::DuplicateOption {
                    step: step.key.clone(),
                    option: option.key.clone(),
                });
            }
        }
    }

    for (index, constraint) in model.constraints.iter().enumerate() {
        validate_constraint(model, index, constraint)?;
    }

    check_require_cycles(model)?;
    Ok(())
}

fn validate_constraint(
    model: &WorkflowModel,
    index: usize,
    constraint: &Constraint,
) -> ValidationResult<()> {
    if let Some(source) = constraint.source() {
        if !model.contains(source) {
            return Err(ValidationError::InvalidReference {
                constraint: index,
                reference: source.clone(),
            });
        }
    }

    match &constraint.rule {
        ConstraintRule::RangeSkip { source, range } => {
            for endpoint in [&range.from, &range.to] {
                if model.step_index(endpoint).is_none() {
                    return Err(ValidationError::InvalidRange {
                        constraint: index,
                        step: endpoint.clone(),
                    });
                }
            }
            if constraint.action == ConstraintAction::Require {
                return Err(ValidationError::RangeRequire { constraint: index });
            }
            if model.expand_range(range).contains(source) {
                return Err(ValidationError::SelfConstraint { constraint: index });
            }
        }
        _ => {
            // Single-target rules: target must resolve and differ from
            // the source.
            if let Some(target) = constraint.single_target() {
                if !model.contains(target) {
                    return Err(ValidationError::InvalidReference {
                        constraint: index,
                        reference: target.clone(),
                    });
                }
                if constraint.source() == Some(target) {
                    return Err(ValidationError::SelfConstraint { constraint: index });
                }
            }
        }
    }

    Ok(())
}

/// Detect directed cycles over "A requires B" edges. Only Require
/// actions participate: disable/enable toggles are idempotent and may
/// loop freely, but a cycle of existential prerequisites makes the
/// workflow unsatisfiable.
fn check_require_cycles(model: &WorkflowModel) -> ValidationResult<()> {
    let mut edges: HashMap<OptionRef, Vec<OptionRef>> = HashMap::new();
    for constraint in &model.constraints {
        if constraint.action != ConstraintAction::Require {
            continue;
        }
        match &constraint.rule {
            // Selecting the source forces the target: source requires target.
            ConstraintRule::NextStep { source, target } => {
                edges
                    .entry(source.clone())
                    .or_default()
                    .push(target.clone());
            }
            // The target has the prerequisite as a precondition.
            ConstraintRule::PreviousStep {
                prerequisite,
                target,
            } => {
                edges
                    .entry(target.clone())
                    .or_default()
                    .push(prerequisite.clone());
            }
            // Conditional requirements trigger from context, not from
            // another option; they cannot form a prerequisite cycle.
            // RangeSkip + Require is rejected before we get here.
            ConstraintRule::Conditional { .. } | ConstraintRule::RangeSkip { .. } => {}
        }
    }

    let mut visiting = Vec::new();
    let mut done: HashSet<OptionRef> = HashSet::new();
    for start in edges.keys() {
        if !done.contains(start) {
            dfs(start, &edges, &mut visiting, &mut done)?;
        }
    }
    Ok(())
}

fn dfs(
    node: &OptionRef,
    edges: &HashMap<OptionRef, Vec<OptionRef>>,
    visiting: &mut Vec<OptionRef>,
    done: &mut HashSet<OptionRef>,
) -> ValidationResult<()> {
    if let Some(pos) = visiting.iter().position(|n| n == node) {
        let mut cycle: Vec<OptionRef> = visiting[pos..].to_vec();
        cycle.push(node.clone());
        return Err(ValidationError::RequireCycle { cycle });
    }
    if done.contains(node) {
        return Ok(());
    }

    visiting.push(node.clone());
    if let Some(next) = edges.get(node) {
        for target in next {
            dfs(target, edges, visiting, done)?;
        }
    }
    visiting.pop();
    done.insert(node.clone());
    Ok(())
}
