//! CLI command implementations

pub mod env;
pub mod generate;
pub mod providers;
