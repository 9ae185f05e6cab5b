pub mod action;
pub mod config;
pub mod deps;
pub mod errors;
pub mod path;
pub mod process;
pub mod toolchain;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

pub use action::Action;
pub use config::{CliOverrides, EnvSnapshot, Options};
pub use errors::ToolchainError;
pub use process::{CommandLine, CommandRunner, SystemRunner};
pub use toolchain::Toolchain;
