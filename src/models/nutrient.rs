use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of nutrients tracked per meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nutrient {
    Calories,
    Protein,
    Carbs,
    Fat,
}

impl Nutrient {
    pub const ALL: [Nutrient; 4] = [
        Nutrient::Calories,
        Nutrient::Protein,
        Nutrient::Carbs,
        Nutrient::Fat,
    ];

    pub fn unit(&self) -> &'static str {
        match self {
            Nutrient::Calories => "kcal",
            _ => "g",
        }
    }
}

impl fmt::Display for Nutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nutrient::Calories => write!(f, "calories"),
            Nutrient::Protein => write!(f, "protein"),
            Nutrient::Carbs => write!(f, "carbs"),
            Nutrient::Fat => write!(f, "fat"),
        }
    }
}

impl FromStr for Nutrient {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "calories" => Ok(Nutrient::Calories),
            "protein" => Ok(Nutrient::Protein),
            "carbs" => Ok(Nutrient::Carbs),
            "fat" => Ok(Nutrient::Fat),
            _ => Err(format!(
                "Invalid nutrient '{}'. Valid options: calories, protein, carbs, fat",
                s
            )),
        }
    }
}
