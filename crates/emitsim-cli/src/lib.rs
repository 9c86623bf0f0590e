//! Airport traffic simulator CLI library.
//!
//! Output formatting shared by the `emitsim-cli` subcommands.

pub mod output;
