//! CLI verbs and what each of them does.
//!
//! | Verb          | Operation                                          |
//! |---------------|----------------------------------------------------|
//! | `start`       | recreate and start the toolchain container         |
//! | `download`    | pull the toolchain images                          |
//! | `init`        | build the base image, then `buildDragon`           |
//! | `install`     | build and install Makefile dependencies            |
//! | `make`        | run `make` in the container with the given args    |
//! | `stop`        | remove the toolchain container                     |
//! | `buildDragon` | build the versioned image and restart from it      |
//! | `update`      | push the versioned (and `latest`) image            |

use std::fmt;

use tracing::debug;

use crate::deps::install_dependencies;
use crate::errors::Result;
use crate::process::CommandRunner;
use crate::toolchain::Toolchain;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Download,
    Init,
    Install,
    Make,
    Stop,
    BuildDragon,
    Update,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Download => "download",
            Action::Init => "init",
            Action::Install => "install",
            Action::Make => "make",
            Action::Stop => "stop",
            Action::BuildDragon => "buildDragon",
            Action::Update => "update",
        }
    }

    /// Run the action. `args` are the command-line arguments after the verb;
    /// only `make` uses them.
    pub async fn run<R: CommandRunner>(self, toolchain: &Toolchain<R>, args: &[String]) -> Result<()> {
        if self != Action::Make && !args.is_empty() {
            debug!(action = self.as_str(), ?args, "Ignoring extra arguments");
        }

        match self {
            Action::Start => toolchain.ensure_started(false).await,
            Action::Download => toolchain.download_images().await,
            Action::Init => {
                toolchain.build_base_image().await?;
                toolchain.build_own_image().await
            }
            Action::Install => install_dependencies(toolchain).await.map(|_| ()),
            Action::Make => toolchain.make(args).await.map(|_| ()),
            Action::Stop => toolchain.stop().await,
            Action::BuildDragon => toolchain.build_own_image().await,
            Action::Update => toolchain.push_images().await,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
