use stategraph_core::{FieldError, Schema, StateMap};

/// Trait for graph state. Types implementing this can be used as graph state.
///
/// Nodes never mutate the state they are handed; they return an `Update`
/// which the executor merges into the state it owns.
pub trait State: Clone + Send + Sync + 'static {
    /// Partial update produced by a node.
    type Update: Send + 'static;

    /// Merge a partial update into this state (field-level overwrite).
    fn merge(&mut self, update: Self::Update);
}

impl State for StateMap {
    type Update = StateMap;

    fn merge(&mut self, update: StateMap) {
        StateMap::merge(self, update);
    }
}

/// Validation applied to the initial state and to the state after every merge.
pub trait StateSchema<S>: Send + Sync {
    fn validate(&self, state: &S) -> Result<(), FieldError>;
}

impl StateSchema<StateMap> for Schema {
    fn validate(&self, state: &StateMap) -> Result<(), FieldError> {
        Schema::validate(self, state)
    }
}
