use chrono::{Local, NaiveDate};
use clap::Args;

use super::OutputFormat;
use crate::config::Config;
use crate::db::MealRepository;
use crate::stats::{Period, Summary};

const RECENT_MEALS: usize = 3;

/// Show nutrition totals and goal progress
#[derive(Args)]
pub struct StatsCommand {
    /// Period to summarize
    #[arg(long, short, value_enum, default_value = "day")]
    period: Period,

    /// Any date inside the period (YYYY-MM-DD), defaults to today
    #[arg(long, short)]
    date: Option<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl StatsCommand {
    pub async fn run(
        &self,
        store: &MealRepository,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let date = match &self.date {
            Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|_| format!("Invalid date format '{}'. Use YYYY-MM-DD.", d))?,
            None => Local::now().date_naive(),
        };

        let (from, to) = self.period.range_containing(date);
        let meals = store.list_range(from, to).await?;
        let summary = Summary::build(self.period, date, &meals, &config.goals, RECENT_MEALS);

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            OutputFormat::Text => print!("{}", render(&summary)),
        }
        Ok(())
    }
}

fn render(summary: &Summary) -> String {
    let mut out = String::new();

    let title = if summary.from == summary.to {
        format!("Intake for {}", summary.from)
    } else {
        format!(
            "Intake for {} {} to {}",
            summary.period, summary.from, summary.to
        )
    };
    out.push_str(&format!("{}\n{}\n\n", title, "=".repeat(title.len())));

    out.push_str(&format!("Meals: {}\n", summary.totals.meals));
    for goal in &summary.goals {
        out.push_str(&format!(
            "  {:9} {:>6} / {} {}  (remaining {}, {:.0}%)\n",
            format!("{}:", goal.nutrient),
            goal.current,
            goal.target,
            goal.nutrient.unit(),
            goal.remaining,
            goal.fraction * 100.0
        ));
    }

    if !summary.recent.is_empty() {
        out.push_str(&format!("\nLast {} meal(s):\n", summary.recent.len()));
        for meal in &summary.recent {
            out.push_str(&format!(
                "  - {} ({} kcal, {})\n",
                meal.name,
                meal.calories,
                meal.captured_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            ));
        }
    }

    out
}
