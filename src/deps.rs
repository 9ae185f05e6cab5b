//! Installing dependencies that ship a Makefile into the toolchain.
//!
//! Every direct and dev dependency of the project is resolved to its install
//! directory with the package manager. Those with a `Makefile` at their root
//! are built and installed inside the container with `make` and
//! `make install`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Context;
use futures::future::try_join_all;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::{Result, ToolchainError};
use crate::path::to_container_path;
use crate::process::{CommandLine, CommandRunner};
use crate::toolchain::Toolchain;

pub const MANIFEST_FILE: &str = "package.json";
pub const MAKEFILE: &str = "Makefile";

/// The parts of `package.json` we care about.
#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, serde_json::Value>,
}

/// Names of all direct and dev dependencies declared in `<dir>/package.json`,
/// sorted, without `exclude`.
pub fn dependency_names(dir: &Path, exclude: &str) -> Result<Vec<String>> {
    let path = dir.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&path).map_err(|e| ToolchainError::Manifest {
        path: path.clone(),
        source: e.into(),
    })?;
    let manifest: PackageManifest = serde_json::from_str(&content)
        .context("Invalid JSON")
        .map_err(|source| ToolchainError::Manifest {
            path: path.clone(),
            source,
        })?;

    let names: BTreeSet<String> = manifest
        .dependencies
        .into_keys()
        .chain(manifest.dev_dependencies.into_keys())
        .filter(|name| name != exclude)
        .collect();
    Ok(names.into_iter().collect())
}

/// A dependency and every distinct directory it is installed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEntry {
    pub name: String,
    pub paths: Vec<PathBuf>,
}

impl DependencyEntry {
    /// Build an entry from the resolver's one-path-per-line output.
    ///
    /// Blank lines and the project root itself are dropped. Lines that are not
    /// absolute paths cannot be install directories and are skipped.
    pub fn from_resolver_output(name: &str, output: &str, project_root: &Path) -> Self {
        let mut paths: Vec<PathBuf> = Vec::new();
        for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let path = PathBuf::from(line);
            if !path.is_absolute() {
                warn!(dependency = name, line, "Ignoring unexpected resolver output");
                continue;
            }
            if path == project_root || paths.contains(&path) {
                continue;
            }
            paths.push(path);
        }
        Self {
            name: name.to_string(),
            paths,
        }
    }

    /// The one install directory, `None` if not installed.
    pub fn single_path(&self) -> Result<Option<&Path>> {
        match self.paths.as_slice() {
            [] => Ok(None),
            [path] => Ok(Some(path.as_path())),
            _ => Err(ToolchainError::AmbiguousDependency {
                name: self.name.clone(),
                paths: self.paths.clone(),
            }),
        }
    }
}

/// Ask the package manager where `name` is installed, from the project
/// directory.
pub async fn resolve_dependency<R: CommandRunner>(
    toolchain: &Toolchain<R>,
    name: &str,
) -> Result<DependencyEntry> {
    let options = toolchain.options();
    let cmd = CommandLine::new(&options.resolver)
        .args(["ls", name, "--parseable=true"])
        .current_dir(&options.project_dir);
    let output = toolchain.runner().run(&cmd).await?;
    let entry = DependencyEntry::from_resolver_output(name, &output, &options.project_dir);
    debug!(dependency = name, paths = ?entry.paths, "Resolved dependency");
    Ok(entry)
}

/// Build and install every dependency that has a Makefile.
///
/// Fails before installing anything if a dependency is installed at more than
/// one place. Returns the names of the installed dependencies.
pub async fn install_dependencies<R: CommandRunner>(toolchain: &Toolchain<R>) -> Result<Vec<String>> {
    let options = toolchain.options();
    let names = dependency_names(&options.project_dir, &options.toolchain_name)?;

    let entries = try_join_all(names.iter().map(|name| resolve_dependency(toolchain, name))).await?;

    let mut resolved = Vec::new();
    for entry in &entries {
        match entry.single_path()? {
            Some(path) => resolved.push((entry.name.as_str(), path)),
            None => debug!(dependency = %entry.name, "Not installed, skipping"),
        }
    }

    let mut targets = Vec::new();
    for (name, path) in resolved {
        if tokio::fs::try_exists(path.join(MAKEFILE)).await.unwrap_or(false) {
            targets.push((name, path));
        } else {
            debug!(dependency = name, "No Makefile, skipping");
        }
    }

    try_join_all(
        targets
            .iter()
            .map(|(name, path)| install_one(toolchain, name, path)),
    )
    .await?;

    Ok(targets.into_iter().map(|(name, _)| name.to_string()).collect())
}

async fn install_one<R: CommandRunner>(toolchain: &Toolchain<R>, name: &str, path: &Path) -> Result<()> {
    let options = toolchain.options();
    let dir = to_container_path(path, &options.mount_path, &options.project_name)?;
    info!(dependency = name, dir = %dir, "Installing dependency");
    toolchain.make_at(&dir, &[]).await?;
    toolchain.make_at(&dir, &["install"]).await?;
    Ok(())
}
