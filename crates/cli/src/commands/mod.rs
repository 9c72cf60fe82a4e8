//! Subcommand implementations

pub mod console;
pub mod phone;
pub mod token;
