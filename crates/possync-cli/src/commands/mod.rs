//! CLI subcommands

pub mod check;
pub mod config;
pub mod conflicts;
pub mod log;
pub mod status;
pub mod sync;
