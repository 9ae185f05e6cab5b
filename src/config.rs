//! Configuration for the toolchain wrapper.
//!
//! Settings are layered once at startup and then frozen into [`Options`]:
//! built-in defaults, then `libdragon.toml` in the mount path, then the
//! environment, then CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! name = "my-game"
//!
//! [toolchain]
//! image = "anacierdem/libdragon"
//! base_tag = "toolchain"
//! version = "10.2.1"
//! update_latest = true
//! engine = "podman"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Package name of the toolchain itself. A project with this name building in
/// CI is building the toolchain image.
pub const TOOLCHAIN_NAME: &str = "libdragon";
pub const DEFAULT_IMAGE: &str = "anacierdem/libdragon";
pub const DEFAULT_BASE_TAG: &str = "toolchain";
pub const LATEST_TAG: &str = "latest";
pub const CONFIG_FILE: &str = "libdragon.toml";

/// Environment variable set inside the toolchain container.
pub const IN_CONTAINER_ENV: &str = "IS_DOCKER";
pub const BYTE_SWAP_ENV: &str = "N64_BYTE_SWAP";

const UPDATE_LATEST_DEFAULT: bool = cfg!(feature = "update-latest");

/// The environment variables this tool reads, captured once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    /// `IS_DOCKER=true`: we are already inside the toolchain container
    pub in_container: bool,
    /// `CI=true`
    pub ci: bool,
    /// `npm_package_name`, set by npm when run as a package script
    pub package_name: Option<String>,
    /// `LIBDRAGON_ENGINE`
    pub engine: Option<String>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            in_container: lookup(IN_CONTAINER_ENV).as_deref() == Some("true"),
            ci: lookup("CI").as_deref() == Some("true"),
            package_name: non_empty("npm_package_name"),
            engine: non_empty("LIBDRAGON_ENGINE"),
        }
    }
}

/// Values taken from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub mount_path: Option<PathBuf>,
    pub byte_swap: bool,
}

/// `[project]` section of `libdragon.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectSection {
    #[serde(default)]
    pub name: Option<String>,
}

/// `[toolchain]` section of `libdragon.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolchainSection {
    /// Package name that identifies a self-build (default: "libdragon")
    #[serde(default)]
    pub name: Option<String>,
    /// Image repository
    #[serde(default)]
    pub image: Option<String>,
    /// Tag of the unversioned base toolchain image
    #[serde(default)]
    pub base_tag: Option<String>,
    /// Version tag (defaults to this tool's version)
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub update_latest: Option<bool>,
    /// Container engine program
    #[serde(default)]
    pub engine: Option<String>,
    /// Build file for the base image (`init`)
    #[serde(default)]
    pub base_dockerfile: Option<String>,
    /// Build file for the versioned image (`buildDragon`)
    #[serde(default)]
    pub dockerfile: Option<String>,
    /// Dependency resolution program
    #[serde(default)]
    pub resolver: Option<String>,
}

/// Contents of `libdragon.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibdragonToml {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub toolchain: ToolchainSection,
}

impl LibdragonToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse libdragon.toml")
    }

    /// Load `libdragon.toml` from `dir`, or defaults if there is none.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}

/// A container image repository and tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Resolved, immutable settings for one invocation.
#[derive(Debug, Clone)]
pub struct Options {
    /// Project name; also the container name and its mount root
    pub project_name: String,
    pub byte_swap: bool,
    /// Absolute host directory bind-mounted into the container
    pub mount_path: PathBuf,
    /// Directory of the invoking project, where `package.json` lives. The
    /// mount path is this directory or one of its ancestors.
    pub project_dir: PathBuf,
    pub in_container: bool,
    pub ci: bool,
    pub self_build: bool,
    pub toolchain_name: String,
    pub image: String,
    pub base_tag: String,
    pub version: String,
    pub update_latest: bool,
    pub engine: String,
    pub base_dockerfile: String,
    pub dockerfile: String,
    pub resolver: String,
}

impl Options {
    /// Resolve options for a run started in `cwd`.
    ///
    /// A relative `--mount-path` is taken relative to `cwd`, which is also
    /// the project directory.
    pub fn resolve(cwd: &Path, env: &EnvSnapshot, cli: &CliOverrides) -> Result<Self> {
        let project_dir = cwd
            .canonicalize()
            .with_context(|| format!("Failed to resolve project directory {}", cwd.display()))?;
        let mount_path = match &cli.mount_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => cwd.join(path),
            None => cwd.to_path_buf(),
        };
        let mount_path = mount_path
            .canonicalize()
            .with_context(|| format!("Failed to resolve mount path {}", mount_path.display()))?;

        let toml = LibdragonToml::load_or_default(&mount_path)?;
        Ok(Self::from_parts(mount_path, &toml, env, cli).with_project_dir(project_dir))
    }

    /// Layer file, environment and CLI values over the defaults. The project
    /// directory starts out as the mount path.
    pub fn from_parts(
        mount_path: PathBuf,
        toml: &LibdragonToml,
        env: &EnvSnapshot,
        cli: &CliOverrides,
    ) -> Self {
        let tc = &toml.toolchain;
        let toolchain_name = tc.name.clone().unwrap_or_else(|| TOOLCHAIN_NAME.to_string());
        let project_name = env
            .package_name
            .clone()
            .or_else(|| toml.project.name.clone())
            .unwrap_or_else(|| toolchain_name.clone());
        let self_build = is_self_build(&project_name, &toolchain_name, env.ci);

        Self {
            self_build,
            byte_swap: cli.byte_swap,
            project_dir: mount_path.clone(),
            mount_path,
            in_container: env.in_container,
            ci: env.ci,
            image: tc.image.clone().unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            base_tag: tc
                .base_tag
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_TAG.to_string()),
            version: tc
                .version
                .clone()
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            update_latest: tc.update_latest.unwrap_or(UPDATE_LATEST_DEFAULT),
            engine: env
                .engine
                .clone()
                .or_else(|| tc.engine.clone())
                .unwrap_or_else(|| "docker".to_string()),
            base_dockerfile: tc
                .base_dockerfile
                .clone()
                .unwrap_or_else(|| "Dockerfile".to_string()),
            dockerfile: tc
                .dockerfile
                .clone()
                .unwrap_or_else(|| "dragon.Dockerfile".to_string()),
            resolver: tc.resolver.clone().unwrap_or_else(|| "npm".to_string()),
            project_name,
            toolchain_name,
        }
    }

    pub fn with_project_dir(mut self, dir: PathBuf) -> Self {
        self.project_dir = dir;
        self
    }

    /// Name of the toolchain container.
    pub fn container_name(&self) -> &str {
        &self.project_name
    }

    pub fn base_image(&self) -> ImageRef {
        ImageRef::new(&self.image, &self.base_tag)
    }

    pub fn version_image(&self) -> ImageRef {
        ImageRef::new(&self.image, &self.version)
    }

    pub fn latest_image(&self) -> ImageRef {
        ImageRef::new(&self.image, LATEST_TAG)
    }

    /// Image the container is started from.
    ///
    /// A self-build uses the base image because the versioned one has not been
    /// built yet, unless `force_version` says it just was.
    pub fn start_image(&self, force_version: bool) -> ImageRef {
        if self.self_build && !force_version {
            self.base_image()
        } else {
            self.version_image()
        }
    }
}

/// True when the toolchain is building its own image in CI.
pub fn is_self_build(project_name: &str, toolchain_name: &str, ci: bool) -> bool {
    ci && project_name == toolchain_name
}
