use clap::{Args, Subcommand};

use super::OutputFormat;
use crate::config::{AnalyzerKind, Config};

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => print!("{}", render(config)),
                }
                Ok(())
            }
        }
    }
}

fn render(config: &Config) -> String {
    let mut out = String::from("Configuration\n=============\n\n");

    match &config.config_file {
        Some(path) => out.push_str(&format!("Config file: {}\n\n", path.display())),
        None => out.push_str(&format!(
            "Config file: {} (not found)\n\n",
            Config::default_config_path().display()
        )),
    }

    out.push_str(&format!(
        "database_path: {}\n  source: {}\n\n",
        config.database_path.value.display(),
        config.database_path.source
    ));
    out.push_str(&format!(
        "log_level: {}\n  source: {}\n\n",
        config.log_level.value, config.log_level.source
    ));

    out.push_str(&format!("analyzer: {}\n", config.analyzer.kind));
    match config.analyzer.kind {
        AnalyzerKind::Stub => {
            out.push_str(&format!("  reply: {:?}\n", config.analyzer.reply));
        }
        AnalyzerKind::Command => {
            let program = config.analyzer.program.as_deref().unwrap_or("(not set)");
            out.push_str(&format!("  program: {}\n", program));
            if !config.analyzer.args.is_empty() {
                out.push_str(&format!("  args: {}\n", config.analyzer.args.join(" ")));
            }
        }
    }
    out.push('\n');

    out.push_str("goals (per day):\n");
    let goals = &config.goals;
    out.push_str(&format!("  calories: {} kcal\n", goals.calories));
    out.push_str(&format!("  protein: {} g\n", goals.protein));
    out.push_str(&format!("  carbs: {} g\n", goals.carbs));
    out.push_str(&format!("  fat: {} g\n", goals.fat));

    out
}
