//! CLI functionality for the AMC tool
//!
//! This module contains:
//! - Run configuration files
//! - Rule batch execution
//! - Rule and object type listing
//! - Output formatting

pub mod config;
pub mod output;
pub mod rules;
pub mod run;
