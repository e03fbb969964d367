//! Error types for the combat simulation.
//!
//! Gameplay operations never fail: illegal requests are silent no-ops.
//! These errors only cover the fallible edges around the simulation:
//! data loading, validation and replication frame encoding.

use thiserror::Error;

use crate::components::EntityId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all combat simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Data file parsing error.
    #[error("Failed to parse data '{source_name}': {message}")]
    DataParseError {
        /// Name of the data source that failed to parse.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// Data parsed but holds values the simulation cannot use.
    #[error("Invalid data for '{id}': {reason}")]
    InvalidData {
        /// Identifier of the offending record.
        id: String,
        /// Why the record was rejected.
        reason: String,
    },

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Replication frame could not be encoded or decoded.
    #[error("Replication frame error: {0}")]
    Replication(String),

    /// Desync detected between authority and observer.
    #[error("Desync detected at tick {tick}: authority hash {authority_hash}, observer hash {observer_hash}")]
    DesyncDetected {
        /// Tick where desync occurred.
        tick: u64,
        /// Authority replicated-state hash.
        authority_hash: u64,
        /// Observer replicated-state hash.
        observer_hash: u64,
    },
}
