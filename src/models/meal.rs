use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::nutrient::Nutrient;

/// A logged meal and the nutrition data reported for its photo.
///
/// Nutrients stay at zero until an analysis result is merged in, which is
/// indistinguishable from a meal that genuinely has no nutrition content
/// except through `analysis_raw`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealRecord {
    pub id: Uuid,
    pub name: String,
    pub calories: u32,
    pub protein: u32,
    pub carbs: u32,
    pub fat: u32,
    pub captured_at: DateTime<Utc>,
    /// Raw image bytes. Kept out of JSON; only the store persists them.
    #[serde(skip)]
    pub photo: Option<Vec<u8>>,
    pub analysis_raw: Option<String>,
}

impl MealRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            calories: 0,
            protein: 0,
            carbs: 0,
            fat: 0,
            // Stored timestamps carry microseconds; truncate so the in-memory
            // record compares equal to what the store hands back.
            captured_at: Utc::now().trunc_subsecs(6),
            photo: None,
            analysis_raw: None,
        }
    }

    pub fn with_photo(mut self, photo: Vec<u8>) -> Self {
        self.photo = Some(photo);
        self
    }

    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at.trunc_subsecs(6);
        self
    }

    pub fn nutrient(&self, nutrient: Nutrient) -> u32 {
        match nutrient {
            Nutrient::Calories => self.calories,
            Nutrient::Protein => self.protein,
            Nutrient::Carbs => self.carbs,
            Nutrient::Fat => self.fat,
        }
    }

    pub fn set_nutrient(&mut self, nutrient: Nutrient, value: u32) {
        match nutrient {
            Nutrient::Calories => self.calories = value,
            Nutrient::Protein => self.protein = value,
            Nutrient::Carbs => self.carbs = value,
            Nutrient::Fat => self.fat = value,
        }
    }

    pub fn is_analyzed(&self) -> bool {
        self.analysis_raw.is_some()
    }
}

impl fmt::Display for MealRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", "=".repeat(self.name.chars().count().max(10)))?;
        writeln!(
            f,
            "Captured: {}",
            self.captured_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
        )?;
        for nutrient in Nutrient::ALL {
            writeln!(
                f,
                "  {:9} {} {}",
                format!("{}:", nutrient),
                self.nutrient(nutrient),
                nutrient.unit()
            )?;
        }
        match (&self.photo, &self.analysis_raw) {
            (None, _) => writeln!(f, "Photo: none")?,
            (Some(bytes), None) => writeln!(f, "Photo: {} bytes (not analyzed)", bytes.len())?,
            (Some(bytes), Some(_)) => writeln!(f, "Photo: {} bytes", bytes.len())?,
        }
        if let Some(raw) = &self.analysis_raw {
            writeln!(f, "Analysis: {}", raw)?;
        }
        Ok(())
    }
}
