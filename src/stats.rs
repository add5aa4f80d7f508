//! Nutrition totals, goal progress, and calendar periods for summaries.

use chrono::{DateTime, Datelike, Duration, Local, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{MealRecord, Nutrient};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NutritionTotals {
    pub meals: usize,
    pub calories: u64,
    pub protein: u64,
    pub carbs: u64,
    pub fat: u64,
}

impl NutritionTotals {
    pub fn get(&self, nutrient: Nutrient) -> u64 {
        match nutrient {
            Nutrient::Calories => self.calories,
            Nutrient::Protein => self.protein,
            Nutrient::Carbs => self.carbs,
            Nutrient::Fat => self.fat,
        }
    }
}

pub fn totals<'a>(meals: impl IntoIterator<Item = &'a MealRecord>) -> NutritionTotals {
    meals
        .into_iter()
        .fold(NutritionTotals::default(), |mut acc, meal| {
            acc.meals += 1;
            acc.calories += u64::from(meal.calories);
            acc.protein += u64::from(meal.protein);
            acc.carbs += u64::from(meal.carbs);
            acc.fat += u64::from(meal.fat);
            acc
        })
}

/// The `n` most recent meals of a newest-first list.
pub fn recent(meals: &[MealRecord], n: usize) -> &[MealRecord] {
    &meals[..n.min(meals.len())]
}

/// Daily intake targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NutritionGoals {
    pub calories: u32,
    pub protein: u32,
    pub carbs: u32,
    pub fat: u32,
}

impl Default for NutritionGoals {
    fn default() -> Self {
        Self {
            calories: 2000,
            protein: 150,
            carbs: 250,
            fat: 70,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProgress {
    pub nutrient: Nutrient,
    pub current: u64,
    pub target: u64,
    pub remaining: u64,
    /// Share of the target reached, 0.0 when the target is zero.
    pub fraction: f64,
}

impl NutritionGoals {
    pub fn target(&self, nutrient: Nutrient) -> u32 {
        match nutrient {
            Nutrient::Calories => self.calories,
            Nutrient::Protein => self.protein,
            Nutrient::Carbs => self.carbs,
            Nutrient::Fat => self.fat,
        }
    }

    /// Progress against these goals. Targets are per day, so they are scaled
    /// by `days` for longer periods.
    pub fn progress(&self, totals: &NutritionTotals, days: u32) -> Vec<GoalProgress> {
        Nutrient::ALL
            .iter()
            .map(|&nutrient| {
                let current = totals.get(nutrient);
                let target = u64::from(self.target(nutrient)) * u64::from(days.max(1));
                let fraction = if target == 0 {
                    0.0
                } else {
                    current as f64 / target as f64
                };
                GoalProgress {
                    nutrient,
                    current,
                    target,
                    remaining: target.saturating_sub(current),
                    fraction,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Day => write!(f, "day"),
            Period::Week => write!(f, "week"),
            Period::Month => write!(f, "month"),
            Period::Year => write!(f, "year"),
        }
    }
}

impl Period {
    /// First and one-past-last local calendar day of the period holding
    /// `date`. Weeks start on Monday.
    pub fn days_containing(&self, date: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Period::Day => (date, date + Duration::days(1)),
            Period::Week => {
                let monday =
                    date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
                (monday, monday + Duration::days(7))
            }
            Period::Month => {
                let first = date - Duration::days(i64::from(date.day0()));
                let next = first
                    .checked_add_months(Months::new(1))
                    .unwrap_or(NaiveDate::MAX);
                (first, next)
            }
            Period::Year => {
                let first = date - Duration::days(i64::from(date.ordinal0()));
                let next = first
                    .checked_add_months(Months::new(12))
                    .unwrap_or(NaiveDate::MAX);
                (first, next)
            }
        }
    }

    /// The period holding `date` as a `[start, end)` UTC range, with day
    /// boundaries at local midnight.
    pub fn range_containing(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let (first, next) = self.days_containing(date);
        (local_midnight(first), local_midnight(next))
    }

    pub fn day_count(&self, date: NaiveDate) -> u32 {
        let (first, next) = self.days_containing(date);
        u32::try_from((next - first).num_days()).unwrap_or(1)
    }
}

fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    // Midnight can be skipped by a DST transition; fall back to UTC midnight.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

/// Everything shown on the summary screen.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub period: Period,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub totals: NutritionTotals,
    pub goals: Vec<GoalProgress>,
    pub recent: Vec<MealRecord>,
}

impl Summary {
    /// Builds a summary from the meals of one period, newest first.
    pub fn build(
        period: Period,
        date: NaiveDate,
        meals: &[MealRecord],
        goals: &NutritionGoals,
        recent_count: usize,
    ) -> Self {
        let (from, next) = period.days_containing(date);
        let totals = totals(meals);
        Self {
            period,
            from,
            to: next - Duration::days(1),
            goals: goals.progress(&totals, period.day_count(date)),
            totals,
            recent: recent(meals, recent_count).to_vec(),
        }
    }
}
