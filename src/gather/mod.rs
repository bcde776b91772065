//! Gatherer execution and fact merging.
//!
//! This module runs the configured gatherer executables, parses their
//! INI-style output and merges the per-gatherer facts into one table.

pub mod ini;
pub mod merge;
pub mod runner;

pub use merge::merge;
pub use runner::GathererRunner;
