//! # FPS Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Scripted world collaborator
//! - Data and simulation fixtures
//! - Determinism and replication convergence harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;
