#![forbid(unsafe_code)]

mod cmd;
mod context;
mod output;
mod user;

use clap::{Parser, Subcommand};
use cmd::roster::RosterAction;
use context::Context;
use output::{OutputMode, resolve_output_mode};
use std::env;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "dutycal: duty-roster calendar",
    long_about = None
)]
struct Cli {
    /// Config file; defaults to the user config dir, then built-in defaults.
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Output format: pretty, text or json.
    #[arg(long, value_enum, global = true)]
    format: Option<OutputMode>,

    /// Emit JSON output (alias for `--format json`).
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Acting user for take/disclaim/delete and `upcoming --mine`.
    #[arg(long, short = 'u', global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Scheduling",
        about = "Create missing recurring shifts",
        long_about = "Materialize every configured recurring event up to the schedule-ahead horizon. Existing occurrences are skipped, so reruns are safe.",
        after_help = "EXAMPLES:\n    # Fill the horizon from today\n    dutycal generate\n\n    # Start from a given day\n    dutycal generate --start 2024-01-01 --json"
    )]
    Generate(cmd::generate::GenerateArgs),

    #[command(
        next_help_heading = "Scheduling",
        about = "List required shifts nobody has taken",
        after_help = "EXAMPLES:\n    # Evaluate every configured notification\n    dutycal alert\n\n    # Look one week ahead and fail if anything is open\n    dutycal alert --lookahead 7 --fail-on-uncovered"
    )]
    Alert(cmd::alert::AlertArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one week, day by day",
        after_help = "EXAMPLES:\n    # Current week\n    dutycal week\n\n    # The week containing a date\n    dutycal week --date 2024-01-10 --json"
    )]
    Week(cmd::week::WeekArgs),

    #[command(
        next_help_heading = "Read",
        about = "List the next events of this week",
        after_help = "EXAMPLES:\n    # Open shifts\n    dutycal upcoming --open\n\n    # My shifts\n    dutycal upcoming --mine --user alice"
    )]
    Upcoming(cmd::upcoming::UpcomingArgs),

    #[command(next_help_heading = "Read", about = "Show one event")]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Roster",
        about = "Create a one-off event",
        after_help = "EXAMPLES:\n    dutycal create --title Bar -d \"evening bar\" --start \"2024-01-12 19:00\" --duration 4h --required"
    )]
    Create(cmd::create::CreateArgs),

    #[command(next_help_heading = "Roster", about = "Take a shift as the acting user")]
    Take(cmd::roster::RosterArgs),

    #[command(next_help_heading = "Roster", about = "Release a shift you own")]
    Disclaim(cmd::roster::RosterArgs),

    #[command(
        next_help_heading = "Roster",
        about = "Delete an optional shift you own"
    )]
    Delete(cmd::roster::RosterArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DUTYCAL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "dutycal=debug,dutycal_core=debug,info"
        } else {
            "dutycal=info,dutycal_core=info,warn"
        })
    });

    let format = env::var("DUTYCAL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    // Logs go to stderr so stdout stays parseable.
    let registry = tracing_subscriber::registry().with(filter);
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let output = cli.output_mode();
    let ctx = Context::open(cli.config.as_deref())?;
    let user = cli.user.as_deref();
    debug!(command = ?cli.command, "dispatching");

    match &cli.command {
        Commands::Generate(args) => cmd::generate::run_generate(args, &ctx, output),
        Commands::Alert(args) => cmd::alert::run_alert(args, &ctx, output),
        Commands::Week(args) => cmd::week::run_week(args, &ctx, output),
        Commands::Upcoming(args) => cmd::upcoming::run_upcoming(args, user, &ctx, output),
        Commands::Show(args) => cmd::show::run_show(args, &ctx, output),
        Commands::Create(args) => cmd::create::run_create(args, &ctx, output),
        Commands::Take(args) => {
            cmd::roster::run_roster(RosterAction::Take, args, user, &ctx, output)
        }
        Commands::Disclaim(args) => {
            cmd::roster::run_roster(RosterAction::Disclaim, args, user, &ctx, output)
        }
        Commands::Delete(args) => {
            cmd::roster::run_roster(RosterAction::Delete, args, user, &ctx, output)
        }
    }
}
