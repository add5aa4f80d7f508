use chrono::{Local, NaiveDate};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use super::OutputFormat;
use crate::coordinator::{MealLogCoordinator, MergeOutcome};
use crate::models::MealRecord;

#[derive(Args)]
pub struct MealCommand {
    #[command(subcommand)]
    pub command: MealSubcommand,
}

#[derive(Subcommand)]
pub enum MealSubcommand {
    /// Log a meal, analyzing its photo if one is given
    Add {
        /// Meal name
        name: String,

        /// Photo of the meal
        #[arg(long, short)]
        photo: Option<PathBuf>,
    },

    /// List logged meals, newest first
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Show at most this many meals
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show a single meal
    Show {
        /// Meal ID (UUID)
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete a meal
    Delete {
        /// Meal ID (UUID)
        id: String,
    },
}

impl MealCommand {
    pub async fn run(
        &self,
        coordinator: &mut MealLogCoordinator,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            MealSubcommand::Add { name, photo } => self.add(name, photo, coordinator).await,
            MealSubcommand::List { format, limit } => list(format, *limit, coordinator),
            MealSubcommand::Show { id, format } => show(id, format, coordinator),
            MealSubcommand::Delete { id } => {
                let uuid = parse_id(id)?;
                let removed = coordinator.delete_meal(uuid).await?;
                if removed == 0 {
                    return Err(format!("Meal not found: {}", id).into());
                }
                println!("Deleted meal {}", id);
                Ok(())
            }
        }
    }

    async fn add(
        &self,
        name: &str,
        photo: &Option<PathBuf>,
        coordinator: &mut MealLogCoordinator,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let photo = match photo {
            Some(path) => Some(
                std::fs::read(path)
                    .map_err(|e| format!("Failed to read photo '{}': {}", path.display(), e))?,
            ),
            None => None,
        };

        let meal = coordinator.add_meal(name, photo).await?;
        if coordinator.pending() > 0 {
            tracing::debug!("Waiting for analysis of meal {}", meal.id);
        }

        // A CLI run ends here, so wait for the analysis instead of leaving it
        // behind.
        for outcome in coordinator.settle().await? {
            if let MergeOutcome::Failed { error, .. } = outcome {
                tracing::warn!("Meal logged without nutrition data: {}", error);
            }
        }

        let meal = coordinator.get(meal.id).cloned().unwrap_or(meal);
        println!("Logged meal:");
        println!();
        print!("{}", meal);
        println!();
        println!("Meal ID: {}", meal.id);
        Ok(())
    }
}

fn parse_id(id: &str) -> Result<Uuid, String> {
    Uuid::parse_str(id).map_err(|_| format!("Invalid meal UUID: {}", id))
}

fn list(
    format: &OutputFormat,
    limit: Option<usize>,
    coordinator: &MealLogCoordinator,
) -> Result<(), Box<dyn std::error::Error>> {
    let meals = coordinator.meals();
    let meals = &meals[..limit.unwrap_or(meals.len()).min(meals.len())];

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(meals)?);
        }
        OutputFormat::Text => {
            if meals.is_empty() {
                println!("No meals logged yet");
                return Ok(());
            }

            let mut current_date: Option<NaiveDate> = None;
            for meal in meals {
                let local = meal.captured_at.with_timezone(&Local);

                // Print date header when it changes
                if current_date != Some(local.date_naive()) {
                    if current_date.is_some() {
                        println!();
                    }
                    println!("{}", local.date_naive());
                    println!("{}", "-".repeat(10));
                    current_date = Some(local.date_naive());
                }

                println!("  {}  {}", local.format("%H:%M"), summary_line(meal));
            }

            println!("\nTotal: {} meal(s)", meals.len());
        }
    }

    Ok(())
}

fn show(
    id: &str,
    format: &OutputFormat,
    coordinator: &MealLogCoordinator,
) -> Result<(), Box<dyn std::error::Error>> {
    let uuid = parse_id(id)?;
    let meal = coordinator
        .get(uuid)
        .ok_or_else(|| format!("Meal not found: {}", id))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(meal)?),
        OutputFormat::Text => {
            print!("{}", meal);
            println!();
            println!("Meal ID: {}", meal.id);
        }
    }
    Ok(())
}

fn summary_line(meal: &MealRecord) -> String {
    let status = if meal.photo.is_some() && !meal.is_analyzed() {
        " (not analyzed)"
    } else {
        ""
    };
    format!(
        "{:20} {:>5} kcal  P {}g  C {}g  F {}g{}",
        meal.name, meal.calories, meal.protein, meal.carbs, meal.fat, status
    )
}
