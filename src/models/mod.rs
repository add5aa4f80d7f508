mod meal;
mod nutrient;

pub use meal::MealRecord;
pub use nutrient::Nutrient;
