//! Lifecycle of the toolchain container.
//!
//! There is only ever one container, named after the project. `start`
//! always recreates it from scratch so a stale container from an earlier
//! image or mount path can never linger. Inside the container (`IS_DOCKER`)
//! every lifecycle operation is a no-op and builds run directly.

use tracing::{debug, info};

use crate::config::{BYTE_SWAP_ENV, IN_CONTAINER_ENV, ImageRef, Options};
use crate::errors::Result;
use crate::path::container_root;
use crate::process::{CommandLine, CommandRunner};

/// Drives the container engine on behalf of one project.
pub struct Toolchain<R> {
    options: Options,
    runner: R,
}

impl<R: CommandRunner> Toolchain<R> {
    pub fn new(options: Options, runner: R) -> Self {
        Self { options, runner }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn engine(&self) -> CommandLine {
        CommandLine::new(&self.options.engine)
    }

    /// Ids of every container, running or not, carrying the reserved name.
    ///
    /// Empty or whitespace-only output means there is none.
    pub async fn find_container(&self) -> Result<Vec<String>> {
        let filter = format!("name=^/{}$", self.options.container_name());
        let out = self
            .runner
            .run(&self.engine().args(["container", "ls", "-qa", "-f"]).arg(filter))
            .await?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn remove_existing(&self) -> Result<bool> {
        let ids = self.find_container().await?;
        if ids.is_empty() {
            return Ok(false);
        }
        debug!(container = self.options.container_name(), ?ids, "Removing container");
        self.runner
            .run(&self.engine().args(["container", "rm", "-f"]).args(ids))
            .await?;
        Ok(true)
    }

    /// Recreate the toolchain container and leave it running.
    ///
    /// `force_version` picks the versioned image even during a self-build,
    /// for right after that image has been built.
    pub async fn ensure_started(&self, force_version: bool) -> Result<()> {
        if self.options.in_container {
            debug!("Already inside the toolchain container, not starting");
            return Ok(());
        }

        self.remove_existing().await?;

        let name = self.options.container_name();
        let root = container_root(name);
        let image = self.options.start_image(force_version);

        let mut cmd = self
            .engine()
            .arg("run")
            .arg(format!("--name={}", name))
            .arg("-e")
            .arg(format!("{}=true", IN_CONTAINER_ENV));
        if self.options.byte_swap {
            cmd = cmd.arg("-e").arg(format!("{}=true", BYTE_SWAP_ENV));
        }
        cmd = cmd
            .arg("-d")
            .arg("--mount")
            .arg(format!(
                "type=bind,source={},target={}",
                self.options.mount_path.display(),
                root
            ))
            .arg("-w")
            .arg(&root)
            .arg(image.to_string())
            .args(["tail", "-f", "/dev/null"]);

        self.runner.run(&cmd).await?;
        info!(container = name, image = %image, "Toolchain container started");
        Ok(())
    }

    /// Remove the toolchain container if there is one.
    pub async fn stop(&self) -> Result<()> {
        if self.options.in_container {
            debug!("Already inside the toolchain container, not stopping");
            return Ok(());
        }

        if self.remove_existing().await? {
            info!(container = self.options.container_name(), "Toolchain container removed");
        } else {
            debug!(container = self.options.container_name(), "No container to remove");
        }
        Ok(())
    }

    /// Pull the base image, and the versioned one unless it is ours to build.
    pub async fn download_images(&self) -> Result<()> {
        if self.options.in_container {
            return Ok(());
        }

        self.pull(&self.options.base_image()).await?;
        if !self.options.self_build {
            self.pull(&self.options.version_image()).await?;
        }
        Ok(())
    }

    async fn pull(&self, image: &ImageRef) -> Result<()> {
        info!(image = %image, "Pulling image");
        self.runner
            .run(&self.engine().arg("pull").arg(image.to_string()))
            .await?;
        Ok(())
    }

    /// Build the unversioned base toolchain image from the mount path.
    pub async fn build_base_image(&self) -> Result<()> {
        let image = self.options.base_image();
        info!(image = %image, "Building base toolchain image");
        let cmd = self
            .engine()
            .arg("build")
            .arg("-t")
            .arg(image.to_string())
            .arg("-f")
            .arg(self.build_file(&self.options.base_dockerfile))
            .arg(self.options.mount_path.display().to_string());
        self.runner.run(&cmd).await?;
        Ok(())
    }

    /// Build the versioned image on top of the base image, then restart the
    /// container from it.
    pub async fn build_own_image(&self) -> Result<()> {
        let base = self.options.base_image();
        let image = self.options.version_image();
        info!(image = %image, base = %base, "Building toolchain image");
        let cmd = self
            .engine()
            .arg("build")
            .args([
                "--build-arg".to_string(),
                format!("DOCKERHUB_IMAGE={}", base.repository),
            ])
            .args(["--build-arg".to_string(), format!("DOCKERHUB_TAG={}", base.tag)])
            .arg("-t")
            .arg(image.to_string())
            .arg("-f")
            .arg(self.build_file(&self.options.dockerfile))
            .arg(self.options.mount_path.display().to_string());
        self.runner.run(&cmd).await?;

        self.ensure_started(true).await
    }

    fn build_file(&self, file: &str) -> String {
        self.options.mount_path.join(file).display().to_string()
    }

    /// Push the versioned image, plus `latest` when enabled.
    ///
    /// The registry login has to have happened already.
    pub async fn push_images(&self) -> Result<()> {
        if self.options.in_container {
            return Ok(());
        }

        let image = self.options.version_image();
        info!(image = %image, "Pushing image");
        self.runner
            .run(&self.engine().arg("push").arg(image.to_string()))
            .await?;

        if self.options.update_latest {
            let latest = self.options.latest_image();
            info!(image = %latest, "Pushing image");
            self.runner
                .run(
                    &self
                        .engine()
                        .arg("tag")
                        .arg(image.to_string())
                        .arg(latest.to_string()),
                )
                .await?;
            self.runner
                .run(&self.engine().arg("push").arg(latest.to_string()))
                .await?;
        }
        Ok(())
    }

    /// Run `make` with `args` in the container's working directory.
    pub async fn make(&self, args: &[String]) -> Result<String> {
        self.runner
            .run(&self.in_toolchain(CommandLine::new("make").args(args.iter().cloned())))
            .await
    }

    /// Run `make -C <dir>` followed by `extra`; `dir` is a container path.
    pub async fn make_at(&self, dir: &str, extra: &[&str]) -> Result<String> {
        let cmd = CommandLine::new("make")
            .args(["-C", dir])
            .args(extra.iter().copied());
        self.runner.run(&self.in_toolchain(cmd)).await
    }

    /// Wrap `cmd` in an exec into the container unless we are already in it.
    fn in_toolchain(&self, cmd: CommandLine) -> CommandLine {
        if self.options.in_container {
            return cmd;
        }
        self.engine()
            .arg("exec")
            .arg(self.options.container_name())
            .arg(cmd.program())
            .args(cmd.get_args().iter().cloned())
    }
}
