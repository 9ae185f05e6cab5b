//! Action dispatch for `libdragon <verb> [args...]`.

use anyhow::{Context, Result};
use console::style;
use tracing::debug;

use libdragon_cli::ui::icons::CHECK;
use libdragon_cli::{Action, CliOverrides, EnvSnapshot, Options, SystemRunner, Toolchain};

use super::super::Cli;

pub async fn cmd_run(cli: Cli) -> Result<()> {
    let Some((action, args)) = cli.command.and_then(|command| command.into_action()) else {
        return Ok(());
    };

    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let overrides = CliOverrides {
        mount_path: cli.mount_path,
        byte_swap: cli.byte_swap,
    };
    let options = Options::resolve(&cwd, &EnvSnapshot::capture(), &overrides)?;
    debug!(?options, "Resolved options");

    let toolchain = Toolchain::new(options, SystemRunner);
    action.run(&toolchain, &args).await?;

    // make output speaks for itself
    if action != Action::Make {
        eprintln!("{}{}", CHECK, style(action).green());
    }
    Ok(())
}
