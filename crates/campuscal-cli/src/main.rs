use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "campuscal", version, about = "Campus calendar CLI")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Month view
    Calendar {
        #[command(subcommand)]
        action: commands::calendar::CalendarAction,
    },
    /// Local event management
    Event {
        #[command(subcommand)]
        action: commands::event::EventAction,
    },
    /// Remote catalog sync
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Organizations, channels and subscriptions
    Catalog {
        #[command(subcommand)]
        action: commands::catalog::CatalogAction,
    },
    /// Session credential management
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Calendar { .. } => "calendar",
            Commands::Event { .. } => "event",
            Commands::Sync { .. } => "sync",
            Commands::Catalog { .. } => "catalog",
            Commands::Auth { .. } => "auth",
            Commands::Config { .. } => "config",
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    debug!(command = cli.command.name(), "dispatching");
    let result = match cli.command {
        Commands::Calendar { action } => commands::calendar::run(action),
        Commands::Event { action } => commands::event::run(action),
        Commands::Sync { action } => commands::sync::run(action),
        Commands::Catalog { action } => commands::catalog::run(action),
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
