//! statecap CLI
//!
//! Command-line interface for running, validating and comparing UI state
//! verification scenarios.

pub mod commands;
pub mod output;
