use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod analysis;
mod commands;
mod config;
mod coordinator;
mod db;
mod models;
mod stats;

use commands::{ConfigCommand, MealCommand, StatsCommand};
use config::Config;
use coordinator::MealLogCoordinator;
use db::{init_db, MealRepository};

#[derive(Parser)]
#[command(name = "mealsnap")]
#[command(version)]
#[command(about = "Log meals, analyze their photos, and track nutrition", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log and browse meals
    Meal(MealCommand),

    /// Show nutrition totals and goal progress
    Stats(StatsCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;
    init_tracing(&config.log_level.value);

    if let Some(path) = &config.config_file {
        tracing::debug!("Config file: {}", path.display());
    }

    match cli.command {
        Some(Commands::Meal(cmd)) => {
            let pool = init_db(&config.database_path.value).await?;
            let analyzer = analysis::from_config(&config.analyzer)?;
            let mut coordinator =
                MealLogCoordinator::load(MealRepository::new(pool), analyzer).await?;
            cmd.run(&mut coordinator).await?;
        }
        Some(Commands::Stats(cmd)) => {
            let pool = init_db(&config.database_path.value).await?;
            let store = MealRepository::new(pool);
            cmd.run(&store, &config).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

/// Logs go to stderr so command output stays parseable. `RUST_LOG` wins over
/// the configured level.
fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("mealsnap={}", default_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
