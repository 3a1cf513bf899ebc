//! Kiln CLI: incremental builds for computational pipelines.
//!
//! Reads `kiln.toml`, expands its targets into a dependency graph and runs the
//! stale ones as shell commands. `kiln make` builds, `kiln outdated` previews,
//! and the remaining subcommands inspect or clear the cache.

#![warn(missing_docs)]

mod cache_cmds;
mod deps;
mod make;
mod outdated;
mod project;
mod shell;

use std::io::IsTerminal;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Kiln: build only what changed.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln pipeline build tool")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `kiln.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build every stale target.
    Make(MakeArgs),
    /// List targets the next `make` would rebuild.
    Outdated,
    /// Print a target's cached value.
    Show {
        /// Target name.
        target: String,
    },
    /// List cached target names.
    Cached,
    /// Show recorded build times.
    Times {
        /// Order by duration, slowest first.
        #[arg(long)]
        slowest: bool,
    },
    /// Remove cache entries (all of them when no target is given).
    Clean {
        /// Targets or group names to remove.
        targets: Vec<String>,
    },
    /// Print the dependency graph in build order.
    Deps(DepsArgs),
}

/// Arguments for the `kiln make` subcommand.
#[derive(Parser, Debug)]
pub struct MakeArgs {
    /// Maximum concurrent commands (default from `kiln.toml`).
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Stop dispatching new targets after the first failure.
    #[arg(long)]
    pub fail_fast: bool,
}

/// Arguments for the `kiln deps` subcommand.
#[derive(Parser, Debug)]
pub struct DepsArgs {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Listing output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

impl GlobalArgs {
    /// Prints a right-aligned status line to stderr unless quiet.
    pub fn status(&self, verb: &str, message: impl std::fmt::Display) {
        if self.quiet {
            return;
        }
        if self.color {
            eprintln!("\x1b[1;32m{verb:>11}\x1b[0m {message}");
        } else {
            eprintln!("{verb:>11} {message}");
        }
    }

    /// Prints an error line to stderr, even when quiet.
    pub fn error(&self, message: impl std::fmt::Display) {
        if self.color {
            eprintln!("\x1b[1;31merror\x1b[0m: {message}");
        } else {
            eprintln!("error: {message}");
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::io::stderr().is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };
    init_tracing(&global);

    let result = match cli.command {
        Command::Make(ref args) => make::run(args, &global),
        Command::Outdated => outdated::run(&global),
        Command::Show { ref target } => cache_cmds::show(target, &global),
        Command::Cached => cache_cmds::cached(&global),
        Command::Times { slowest } => cache_cmds::times(slowest, &global),
        Command::Clean { ref targets } => cache_cmds::clean(targets, &global),
        Command::Deps(ref args) => deps::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            global.error(e);
            process::exit(1);
        }
    }
}

/// Installs the log subscriber. `RUST_LOG` wins over the CLI flags.
fn init_tracing(global: &GlobalArgs) {
    let default = if global.verbose {
        "debug"
    } else if global.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(global.color)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_make_defaults() {
        let cli = Cli::parse_from(["kiln", "make"]);
        match cli.command {
            Command::Make(args) => {
                assert_eq!(args.jobs, None);
                assert!(!args.fail_fast);
            }
            _ => panic!("expected Make command"),
        }
        assert!(!cli.quiet);
        assert_eq!(cli.color, ColorChoice::Auto);
    }

    #[test]
    fn parse_make_with_args() {
        let cli = Cli::parse_from(["kiln", "make", "-j", "8", "--fail-fast"]);
        match cli.command {
            Command::Make(args) => {
                assert_eq!(args.jobs, Some(8));
                assert!(args.fail_fast);
            }
            _ => panic!("expected Make command"),
        }
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "kiln",
            "outdated",
            "--quiet",
            "--color",
            "never",
            "--config",
            "ci/kiln.toml",
        ]);
        assert!(matches!(cli.command, Command::Outdated));
        assert!(cli.quiet);
        assert_eq!(cli.color, ColorChoice::Never);
        assert_eq!(cli.config.as_deref(), Some("ci/kiln.toml"));
    }

    #[test]
    fn parse_show_and_clean() {
        let cli = Cli::parse_from(["kiln", "show", "model_16"]);
        assert!(matches!(cli.command, Command::Show { ref target } if target == "model_16"));

        let cli = Cli::parse_from(["kiln", "clean"]);
        assert!(matches!(cli.command, Command::Clean { ref targets } if targets.is_empty()));

        let cli = Cli::parse_from(["kiln", "clean", "model", "data"]);
        match cli.command {
            Command::Clean { targets } => assert_eq!(targets, vec!["model", "data"]),
            _ => panic!("expected Clean command"),
        }
    }

    #[test]
    fn parse_times_and_deps() {
        let cli = Cli::parse_from(["kiln", "times", "--slowest"]);
        assert!(matches!(cli.command, Command::Times { slowest: true }));

        let cli = Cli::parse_from(["kiln", "deps", "--format", "json"]);
        match cli.command {
            Command::Deps(args) => assert_eq!(args.format, ReportFormat::Json),
            _ => panic!("expected Deps command"),
        }
    }

    #[test]
    fn show_requires_a_target() {
        assert!(Cli::try_parse_from(["kiln", "show"]).is_err());
    }
}
