use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use console::style;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use libdragon_cli::Action;
use libdragon_cli::ui::icons::CROSS;

mod cmd;

#[derive(Parser)]
#[command(name = "libdragon")]
#[command(version, about = "Manage the libdragon toolchain container and build inside it")]
pub struct Cli {
    /// Host directory bind-mounted into the container (defaults to the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub mount_path: Option<PathBuf>,

    /// Byte-swap the built ROM (sets N64_BYTE_SWAP in the container)
    #[arg(long, global = true)]
    pub byte_swap: bool,

    /// Log at debug level (no short form so `make -v` reaches make)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a fresh toolchain container for this project
    Start(ActionArgs),
    /// Pull the toolchain images
    Download(ActionArgs),
    /// Build the base toolchain image, then the versioned image
    Init(ActionArgs),
    /// Build and install dependencies that ship a Makefile
    Install(ActionArgs),
    /// Run make inside the toolchain container
    #[command(disable_help_flag = true)]
    Make(ActionArgs),
    /// Remove the toolchain container
    Stop(ActionArgs),
    /// Build the versioned toolchain image and restart the container from it
    #[command(name = "buildDragon")]
    BuildDragon(ActionArgs),
    /// Push the toolchain images to the registry
    Update(ActionArgs),
    #[command(external_subcommand)]
    Unknown(Vec<String>),
}

#[derive(Args, Clone, Debug)]
pub struct ActionArgs {
    /// Arguments passed through to the action
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

impl Commands {
    /// The action to run and its arguments; `None` for a verb we don't know.
    pub fn into_action(self) -> Option<(Action, Vec<String>)> {
        let (action, args) = match self {
            Commands::Start(a) => (Action::Start, a),
            Commands::Download(a) => (Action::Download, a),
            Commands::Init(a) => (Action::Init, a),
            Commands::Install(a) => (Action::Install, a),
            Commands::Make(a) => (Action::Make, a),
            Commands::Stop(a) => (Action::Stop, a),
            Commands::BuildDragon(a) => (Action::BuildDragon, a),
            Commands::Update(a) => (Action::Update, a),
            Commands::Unknown(words) => {
                tracing::debug!(?words, "Ignoring unknown action");
                return None;
            }
        };
        Some((action, args.args))
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "libdragon=debug,libdragon_cli=debug"
    } else {
        "libdragon=info,libdragon_cli=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Usage errors fail like any other action failure; help and version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing(cli.verbose);

    match cmd::cmd_run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "Action failed");
            eprintln!("{}{}", CROSS, style(format!("{:#}", err)).red());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_make_passes_through_flags() {
        let cli = Cli::try_parse_from(["libdragon", "make", "-j4", "--keep-going", "rom"]).unwrap();
        let (action, args) = cli.command.unwrap().into_action().unwrap();
        assert_eq!(action, Action::Make);
        assert_eq!(args, vec!["-j4", "--keep-going", "rom"]);
    }

    #[test]
    fn test_parse_make_forwards_short_flags() {
        for flag in ["-v", "-h", "--help"] {
            let cli = Cli::try_parse_from(["libdragon", "make", flag]).unwrap();
            assert!(!cli.verbose);
            let (action, args) = cli.command.unwrap().into_action().unwrap();
            assert_eq!(action, Action::Make);
            assert_eq!(args, vec![flag]);
        }
    }

    #[test]
    fn test_parse_verbose_has_no_short_form() {
        let cli = Cli::try_parse_from(["libdragon", "--verbose", "start"]).unwrap();
        assert!(cli.verbose);
        assert!(Cli::try_parse_from(["libdragon", "-v", "start"]).is_err());
    }

    #[test]
    fn test_subcommand_names_match_actions() {
        let cmd = Cli::command();
        let names: Vec<&str> = cmd.get_subcommands().map(|sc| sc.get_name()).collect();
        for action in [
            Action::Start,
            Action::Download,
            Action::Init,
            Action::Install,
            Action::Make,
            Action::Stop,
            Action::BuildDragon,
            Action::Update,
        ] {
            assert!(names.contains(&action.as_str()), "missing {action}");
        }
    }

    #[test]
    fn test_parse_mount_path_and_byte_swap() {
        let cli =
            Cli::try_parse_from(["libdragon", "--mount-path=../game", "--byte-swap", "start"]).unwrap();
        assert_eq!(cli.mount_path, Some(PathBuf::from("../game")));
        assert!(cli.byte_swap);
        let (action, args) = cli.command.unwrap().into_action().unwrap();
        assert_eq!(action, Action::Start);
        assert!(args.is_empty());
    }

    #[test]
    fn test_parse_flags_after_verb() {
        let cli = Cli::try_parse_from(["libdragon", "start", "--byte-swap"]).unwrap();
        assert!(cli.byte_swap);
    }

    #[test]
    fn test_parse_build_dragon_verb_is_exact() {
        let cli = Cli::try_parse_from(["libdragon", "buildDragon"]).unwrap();
        let (action, _) = cli.command.unwrap().into_action().unwrap();
        assert_eq!(action, Action::BuildDragon);

        let cli = Cli::try_parse_from(["libdragon", "build-dragon"]).unwrap();
        assert!(cli.command.unwrap().into_action().is_none());
    }

    #[test]
    fn test_parse_unknown_verb_is_ignored() {
        let cli = Cli::try_parse_from(["libdragon", "deploy", "now"]).unwrap();
        assert!(cli.command.unwrap().into_action().is_none());
    }

    #[test]
    fn test_parse_no_verb() {
        let cli = Cli::try_parse_from(["libdragon"]).unwrap();
        assert!(cli.command.is_none());
    }
}
