//! Handlers for the CLI subcommands.
//!
//! Each module handles one family of subcommands. main.rs parses the command
//! line, loads the configuration and dispatches to these handlers.

pub mod allocation;
pub mod broadcast;
pub mod route;
