use clap::{ArgAction, Parser, Subcommand};
use commands::{clear, config, status};

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "watchkeep")]
#[command(about = "Watchkeep - inspect and manage the watch-progress cache")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show persisted cache status
    #[command(
        long_about = "Show every persisted cache class with its item count, age, TTL, and whether it has expired."
    )]
    Status,

    /// Clear persisted cache data
    #[command(
        long_about = "Clear persisted cache entries. Use --progress, --history, or --watchlists to clear one tier, or --all to clear everything."
    )]
    Clear {
        /// Clear every persisted cache class
        #[arg(long, action = ArgAction::SetTrue)]
        all: bool,

        /// Clear the series progress cache
        #[arg(long, action = ArgAction::SetTrue)]
        progress: bool,

        /// Clear the movie history cache
        #[arg(long, action = ArgAction::SetTrue)]
        history: bool,

        /// Clear all watchlist caches
        #[arg(long, action = ArgAction::SetTrue)]
        watchlists: bool,
    },

    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        cmd: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Write a default configuration file if none exists
    Init,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    logging::init_logging(cli.verbose, cli.quiet)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;
    tracing::debug!("Logging initialized (verbosity {})", cli.verbose);

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Status => status::run_status(&output),
        Commands::Clear {
            all,
            progress,
            history,
            watchlists,
        } => clear::run_clear(all, progress, history, watchlists, &output),
        Commands::Config { cmd } => {
            let cmd = cmd.unwrap_or(ConfigCommands::Show);
            config::run_config(cmd, &output)
        }
    }
}
