//! Error types.

use std::path::PathBuf;
use thiserror::Error;

/// Startup problems. Any of these keeps the service from serving.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No robot description was provided
    #[error("robot description missing")]
    MissingRobotDescription,

    /// Robot description could not be parsed or is inconsistent
    #[error("invalid robot description: {0}")]
    InvalidRobotDescription(String),

    /// Robot description parsed but leaves nothing to plan for
    #[error("planning scene for robot '{0}' is not configured")]
    SceneNotConfigured(String),

    /// Service configuration could not be parsed
    #[error("invalid configuration: {0}")]
    Parse(String),

    /// A configuration value is out of range
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Offending field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// A file could not be read
    #[error("cannot read {path:?}: {reason}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// OS error text
        reason: String,
    },
}

/// Lookups against the kinematic model.
#[derive(Debug, Error, PartialEq)]
pub enum KinematicsError {
    /// No link of that name
    #[error("unknown link '{0}'")]
    UnknownLink(String),

    /// No joint of that name
    #[error("unknown joint '{0}'")]
    UnknownJoint(String),

    /// No group of that name
    #[error("unknown joint group '{0}'")]
    UnknownGroup(String),

    /// Fixed joints carry no value
    #[error("joint '{0}' is fixed")]
    FixedJoint(String),

    /// Value count does not match the group
    #[error("group '{group}' expects {expected} values, got {actual}")]
    DimensionMismatch {
        /// Group name
        group: String,
        /// Variables in the group
        expected: usize,
        /// Values supplied
        actual: usize,
    },
}

/// The scene cannot be read.
#[derive(Debug, Error)]
pub enum SceneError {
    /// State tracking has not been started
    #[error("state monitor not running")]
    NotMonitoring,

    /// A writer panicked while holding the scene lock
    #[error("scene lock poisoned")]
    Poisoned,
}

/// One explored state could not be turned into a position.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Unknown link or group, or wrong configuration size
    #[error(transparent)]
    Kinematics(#[from] KinematicsError),

    /// Forward kinematics produced NaN or infinity
    #[error("non-finite position for link '{link}'")]
    NonFinite {
        /// Link being resolved
        link: String,
    },
}

/// A marker batch could not be delivered.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The output channel is gone or refused the message
    #[error("marker output unavailable: {0}")]
    Unavailable(String),
}

/// Why a visualization produced no published batch.
#[derive(Debug, Error)]
pub enum VisualizationError {
    /// The record is empty
    #[error("no explored states")]
    NoExploredStates,

    /// Not a single state resolved
    #[error("none of {attempted} explored states resolved for link '{link}'")]
    NothingResolved {
        /// Link being traced
        link: String,
        /// States in the record
        attempted: usize,
    },

    /// The sink refused the batch
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// A request could not be dispatched at all.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The scene snapshot is unusable
    #[error("unusable planning scene: {0}")]
    Scene(#[from] SceneError),
}
