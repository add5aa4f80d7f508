//! Parser for analysis replies.
//!
//! A reply is a list of `Key: value` pairs joined by `", "`, e.g.
//! `"Calories: 500, Protein: 30, Carbs: 60, Fat: 20"`. Keys are matched
//! case-insensitively against [`Nutrient`]; anything else is ignored.

use std::collections::BTreeMap;

use crate::models::{MealRecord, Nutrient};

const PAIR_SEPARATOR: &str = ", ";
const KEY_VALUE_SEPARATOR: &str = ": ";

/// A nutrient value found in a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NutrientValue {
    Parsed(u32),
    /// The key was present but its value was not a non-negative integer.
    Unparsed,
}

impl NutrientValue {
    /// The value applied to a meal; unparsed values count as zero.
    pub fn value(&self) -> u32 {
        match self {
            NutrientValue::Parsed(v) => *v,
            NutrientValue::Unparsed => 0,
        }
    }
}

/// How much of the nutrient vocabulary a reply covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Complete,
    Partial,
    Empty,
}

impl std::fmt::Display for ParseOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseOutcome::Complete => write!(f, "complete"),
            ParseOutcome::Partial => write!(f, "partial"),
            ParseOutcome::Empty => write!(f, "empty"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAnalysis {
    values: BTreeMap<Nutrient, NutrientValue>,
}

impl ParsedAnalysis {
    #[cfg(test)]
    pub fn get(&self, nutrient: Nutrient) -> Option<NutrientValue> {
        self.values.get(&nutrient).copied()
    }

    /// Nutrients found in the reply, with unparsed values coerced to zero.
    pub fn to_map(&self) -> BTreeMap<Nutrient, u32> {
        self.values
            .iter()
            .map(|(nutrient, value)| (*nutrient, value.value()))
            .collect()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn outcome(&self) -> ParseOutcome {
        match self.values.len() {
            0 => ParseOutcome::Empty,
            n if n == Nutrient::ALL.len() => ParseOutcome::Complete,
            _ => ParseOutcome::Partial,
        }
    }

    /// Writes every nutrient found onto `meal`. Nutrients missing from the
    /// reply keep whatever value the meal already had.
    pub fn apply_to(&self, meal: &mut MealRecord) {
        for (nutrient, value) in &self.values {
            meal.set_nutrient(*nutrient, value.value());
        }
    }
}

pub fn parse(text: &str) -> ParsedAnalysis {
    let mut values = BTreeMap::new();

    for component in text.trim().split(PAIR_SEPARATOR) {
        let parts: Vec<&str> = component.split(KEY_VALUE_SEPARATOR).collect();
        let [key, value] = parts.as_slice() else {
            continue;
        };

        let Ok(nutrient) = key.parse::<Nutrient>() else {
            continue;
        };

        let value = match value.parse::<u32>() {
            Ok(v) => NutrientValue::Parsed(v),
            Err(_) => NutrientValue::Unparsed,
        };
        values.insert(nutrient, value);
    }

    ParsedAnalysis { values }
}
