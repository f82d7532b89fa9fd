use crate::error::{FabricError, FabricResult};

/// Access state of a simulation array on the command stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessState {
    /// Freshly allocated, contents undefined
    Undefined,
    /// Target of the seeding copy
    CopyDestination,
    /// Bound read/write by a compute kernel
    WritableByCompute,
    /// Sampled by a downstream consumer
    ReadableByConsumer,
}

impl AccessState {
    pub fn can_transition_to(self, to: AccessState) -> bool {
        use AccessState::*;
        matches!(
            (self, to),
            (Undefined, CopyDestination)
                | (CopyDestination, WritableByCompute)
                | (CopyDestination, ReadableByConsumer)
                | (WritableByCompute, ReadableByConsumer)
                | (ReadableByConsumer, WritableByCompute)
        )
    }
}

/// A single array state change recorded on the command stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: AccessState,
    pub to: AccessState,
}

impl Transition {
    /// Build a transition, rejecting edges the state machine does not allow
    pub fn new(array: &str, from: AccessState, to: AccessState) -> FabricResult<Self> {
        if !from.can_transition_to(to) {
            return Err(FabricError::InvalidStateTransition {
                array: array.to_string(),
                from,
                to,
            });
        }
        Ok(Self { from, to })
    }
}
