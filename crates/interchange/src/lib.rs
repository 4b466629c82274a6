//! assess-interchange: exercise definition JSON types and deserialization.
//!
//! Provides typed structs for the exercise interchange bundle (stages,
//! transitions, variable updates, hints, declared variables) and a single
//! `from_interchange()` entry point that deserializes a `serde_json::Value`
//! bundle into an `ExerciseBundle`.
//!
//! The player crate depends on this crate for initial JSON parsing, then
//! converts these shared types to its own validated domain representation.

pub mod deserialize;
pub mod types;

pub use deserialize::{from_interchange, InterchangeError};
pub use types::*;
