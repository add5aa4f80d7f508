mod config_cmd;
mod meal;
mod stats_cmd;

pub use config_cmd::ConfigCommand;
pub use meal::MealCommand;
pub use stats_cmd::StatsCommand;

use clap::ValueEnum;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
