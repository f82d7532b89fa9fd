//! Fabric simulation error handling
//!
//! Every fallible operation in the crate returns [`FabricResult`]. None of these
//! errors are retried internally: a simulation that hit a resource or command
//! stream failure is expected to be dropped and rebuilt by the caller.

use crate::fabric::{AccessState, KernelKind};
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate
pub type FabricResult<T> = Result<T, FabricError>;

#[derive(Debug, Error)]
pub enum FabricError {
    #[error("Construction precondition violated for {rows}x{cols} grid: {reason}")]
    ConstructionPrecondition { rows: u32, cols: u32, reason: String },

    #[error("Resource allocation failed for {resource}: {message}")]
    ResourceAllocation { resource: String, message: String },

    #[error("Invalid state transition on {array}: {from:?} -> {to:?}")]
    InvalidStateTransition {
        array: String,
        from: AccessState,
        to: AccessState,
    },

    #[error("Array {array} must be {required:?} but is {actual:?}")]
    AccessStateMismatch {
        array: String,
        required: AccessState,
        actual: AccessState,
    },

    #[error("Invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: String },

    #[error("Invalid elapsed time: {elapsed}")]
    InvalidTimeDelta { elapsed: f32 },

    #[error("Disturb target ({row}, {col}) outside {rows}x{cols} grid")]
    DisturbOutOfBounds { row: u32, col: u32, rows: u32, cols: u32 },

    #[error("Views have not been registered; call build_descriptors first")]
    DescriptorsUnbound,

    #[error("Descriptor range {base}..{end} exceeds table capacity {capacity}")]
    DescriptorRange { base: u32, end: u32, capacity: u32 },

    #[error("View slot {slot} is {actual} but {expected} was required")]
    ViewAccessMismatch {
        slot: u32,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Expected {expected:?} kernel, got {actual:?}")]
    KernelMismatch { expected: KernelKind, actual: KernelKind },

    #[error("Array {array} bound to more than one kernel binding")]
    AliasedBinding { array: String },

    #[error("GPU operation failed: {message}")]
    Gpu { message: String },

    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ConfigParse { message: String },
}

impl FabricError {
    /// Shorthand for parameter validation failures
    pub fn invalid_parameter(name: &'static str, value: impl std::fmt::Display) -> Self {
        FabricError::InvalidParameter {
            name,
            value: value.to_string(),
        }
    }

    /// Shorthand for allocation failures
    pub fn allocation(resource: impl Into<String>, message: impl std::fmt::Display) -> Self {
        FabricError::ResourceAllocation {
            resource: resource.into(),
            message: message.to_string(),
        }
    }

    /// True for errors that leave the simulation unusable
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FabricError::ConstructionPrecondition { .. }
                | FabricError::ResourceAllocation { .. }
                | FabricError::InvalidStateTransition { .. }
                | FabricError::AccessStateMismatch { .. }
                | FabricError::Gpu { .. }
        )
    }
}

impl From<toml::de::Error> for FabricError {
    fn from(error: toml::de::Error) -> Self {
        FabricError::ConfigParse {
            message: error.to_string(),
        }
    }
}

impl From<toml::ser::Error> for FabricError {
    fn from(error: toml::ser::Error) -> Self {
        FabricError::ConfigParse {
            message: error.to_string(),
        }
    }
}
