//! Model registry: stores validated workflow models
//!
//! Models are immutable once registered; an edit re-registers the
//! rebuilt model under the same id, and the name index keeps the
//! registration order so callers can ask for the latest version of a
//! named workflow.

use crate::RegistryError;
use std::collections::HashMap;
use stepflow_types::{ModelId, WorkflowModel};

/// Registry of workflow models
#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    /// All registered models, keyed by id
    models: HashMap<ModelId, WorkflowModel>,
    /// Name → registration-ordered ids
    by_name: HashMap<String, Vec<ModelId>>,
}

impl ModelRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model. Re-registering an id (an edited version)
    /// replaces the stored model. Returns the model id.
    pub fn register(&mut self, model: WorkflowModel) -> ModelId {
        let id = model.id.clone();
        let name = model.name.clone();

        let replaced = self.models.insert(id.clone(), model).is_some();
        if !replaced {
            self.by_name.entry(name).or_default().push(id.clone());
        }

        tracing::info!(model_id = %id, replaced, "workflow model registered");
        id
    }

    /// Get a model by id
    pub fn get(&self, id: &ModelId) -> Result<&WorkflowModel, RegistryError> {
        self.models
            .get(id)
            .ok_or_else(|| RegistryError::ModelNotFound(id.clone()))
    }

    /// The most recently registered model with this name
    pub fn latest_by_name(&self, name: &str) -> Option<&WorkflowModel> {
        self.by_name
            .get(name)
            .and_then(|ids| ids.last())
            .and_then(|id| self.models.get(id))
    }

    /// Every registered model with this name, oldest first
    pub fn versions_by_name(&self, name: &str) -> Vec<&WorkflowModel> {
        self.by_name
            .get(name)
            .map(|ids| ids.iter().filter_map(|id| self.models.get(id)).collect())
            .unwrap_or_default()
    }

    /// List all registered models
    pub fn list(&self) -> Vec<&WorkflowModel> {
        self.models.values().collect()
    }

    /// Number of registered models
    pub fn count(&self) -> usize {
        self.models.len()
    }

    /// Check whether a model is registered
    pub fn contains(&self, id: &ModelId) -> bool {
        self.models.contains_key(id)
    }

    /// Remove a model and return it
    pub fn remove(&mut self, id: &ModelId) -> Result<WorkflowModel, RegistryError> {
        let model = self
            .models
            .remove(id)
            .ok_or_else(|| RegistryError::ModelNotFound(id.clone()))?;

        if let Some(ids) = self.by_name.get_mut(&model.name) {
            ids.retain(|i| i != id);
            if ids.is_empty() {
                self.by_name.remove(&model.name);
            }
        }

        tracing::info!(model_id = %id, "workflow model removed");
        Ok(model)
    }
}
