//! AMC data access
//!
//! This crate provides:
//! - The [`QueryExecutor`] boundary over the data store (parameterized queries)
//! - A fixture-backed [`MemoryExecutor`]
//! - Population loading ([`PopulationSource`], [`Population`])
//! - Candidate object collection per object type ([`ObjectCollector`])

pub mod collector;
pub mod memory;
pub mod population;
pub mod provider;

pub use collector::*;
pub use memory::*;
pub use population::*;
pub use provider::*;
