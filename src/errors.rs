//! Typed error hierarchy for the toolchain wrapper.
//!
//! `ToolchainError` covers everything the library can fail with. The binary
//! turns any of them into exit status 1.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while driving the toolchain container.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("`{command}` exited with status {status}")]
    Execution {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Failed to spawn `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Using the same dependency with different versions is not supported: {name} resolves to {}",
        display_paths(.paths)
    )]
    AmbiguousDependency { name: String, paths: Vec<PathBuf> },

    #[error("{} is outside of the mount path {}", .path.display(), .mount.display())]
    PathOutsideMount { path: PathBuf, mount: PathBuf },

    #[error("Failed to read project manifest at {}", .path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T, E = ToolchainError> = std::result::Result<T, E>;
