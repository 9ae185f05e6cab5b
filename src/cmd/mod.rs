//! CLI command implementations.
//!
//! Every verb goes through `run`; the verbs themselves live in
//! `libdragon_cli::action`.

pub mod run;

pub use run::cmd_run;
