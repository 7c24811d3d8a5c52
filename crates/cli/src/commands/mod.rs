//! CLI Commands

pub mod check;
pub mod compare;
pub mod config;
pub mod run;
