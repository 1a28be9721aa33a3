use std::collections::HashSet;

use crate::action::{ActionDefinition, ActionId, ExecutionContext, SequenceKind};
use crate::error::{Result, RolloutError};

// ---------------------------------------------------------------------------
// ActionRegistry
// ---------------------------------------------------------------------------

/// The full set of registered action definitions, in registration order.
/// Registration order is load-bearing: it breaks ties among actions
/// anchored to the same point, so plans stay deterministic.
#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<ActionDefinition>,
    ids: HashSet<ActionId>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. A duplicate id is a configuration error.
    pub fn register(&mut self, def: ActionDefinition) -> Result<()> {
        if !self.ids.insert(def.id.clone()) {
            return Err(RolloutError::DuplicateAction(def.id.to_string()));
        }
        self.actions.push(def);
        Ok(())
    }

    pub fn get(&self, id: &ActionId) -> Option<&ActionDefinition> {
        self.actions.iter().find(|a| &a.id == id)
    }

    pub fn contains(&self, id: &ActionId) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionDefinition> {
        self.actions.iter()
    }

    /// Members of one top-level sequence, in registration order.
    pub fn members(&self, kind: SequenceKind) -> impl Iterator<Item = &ActionDefinition> {
        self.actions.iter().filter(move |a| a.in_sequence(kind))
    }

    /// The rollback action paired with `forward`, if one is registered.
    pub fn compensation_for(&self, forward: &ActionId) -> Option<&ActionDefinition> {
        self.actions.iter().find(|a| {
            a.context == ExecutionContext::Rollback && a.compensates.as_ref() == Some(forward)
        })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
