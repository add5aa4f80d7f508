use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::StoreError;
use crate::models::MealRecord;

pub struct MealRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct MealRow {
    id: String,
    name: String,
    calories: i64,
    protein: i64,
    carbs: i64,
    fat: i64,
    captured_at: String,
    photo: Option<Vec<u8>>,
    analysis_raw: Option<String>,
}

impl TryFrom<MealRow> for MealRecord {
    type Error = StoreError;

    fn try_from(row: MealRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::CorruptRow {
            id: row.id.clone(),
            reason,
        };

        let id = Uuid::parse_str(&row.id).map_err(|e| corrupt(e.to_string()))?;
        let captured_at = DateTime::parse_from_rfc3339(&row.captured_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| corrupt(format!("bad captured_at: {}", e)))?;

        Ok(MealRecord {
            id,
            calories: clamp_count(row.calories),
            protein: clamp_count(row.protein),
            carbs: clamp_count(row.carbs),
            fat: clamp_count(row.fat),
            captured_at,
            name: row.name,
            photo: row.photo,
            analysis_raw: row.analysis_raw,
        })
    }
}

fn clamp_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl MealRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, meal: &MealRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO meals (id, name, calories, protein, carbs, fat, captured_at, photo, analysis_raw)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(meal.id.to_string())
        .bind(&meal.name)
        .bind(i64::from(meal.calories))
        .bind(i64::from(meal.protein))
        .bind(i64::from(meal.carbs))
        .bind(i64::from(meal.fat))
        .bind(timestamp(&meal.captured_at))
        .bind(&meal.photo)
        .bind(&meal.analysis_raw)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Inserted meal {} ({})", meal.id, meal.name);
        Ok(())
    }

    /// All meals, newest first. Meals captured at the same instant come back
    /// in reverse insertion order.
    pub async fn list_all(&self) -> Result<Vec<MealRecord>, StoreError> {
        let rows: Vec<MealRow> =
            sqlx::query_as("SELECT * FROM meals ORDER BY captured_at DESC, rowid DESC")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(MealRecord::try_from).collect()
    }

    /// Meals captured in `[from, to)`, newest first.
    pub async fn list_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MealRecord>, StoreError> {
        let rows: Vec<MealRow> = sqlx::query_as(
            "SELECT * FROM meals WHERE captured_at >= ? AND captured_at < ? ORDER BY captured_at DESC, rowid DESC",
        )
        .bind(timestamp(&from))
        .bind(timestamp(&to))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MealRecord::try_from).collect()
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<MealRecord>, StoreError> {
        let row: Option<MealRow> = sqlx::query_as("SELECT * FROM meals WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(MealRecord::try_from).transpose()
    }

    /// Replaces the stored copy of `meal`. Returns the number of rows touched;
    /// an unknown id touches none and is not an error.
    pub async fn update(&self, meal: &MealRecord) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE meals
            SET name = ?, calories = ?, protein = ?, carbs = ?, fat = ?,
                photo = ?, analysis_raw = ?
            WHERE id = ?
            "#,
        )
        .bind(&meal.name)
        .bind(i64::from(meal.calories))
        .bind(i64::from(meal.protein))
        .bind(i64::from(meal.carbs))
        .bind(i64::from(meal.fat))
        .bind(&meal.photo)
        .bind(&meal.analysis_raw)
        .bind(meal.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!("Update of meal {} matched no rows", meal.id);
        }
        Ok(result.rows_affected())
    }

    /// Removes the meal with `id`. Returns the number of rows removed.
    pub async fn delete(&self, id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM meals WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    struct TestContext {
        repo: MealRepository,
        _temp_dir: TempDir,
    }

    async fn setup() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = init_db(&db_path).await.unwrap();
        TestContext {
            repo: MealRepository::new(pool),
            _temp_dir: temp_dir,
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get_meal() {
        let ctx = setup().await;
        let meal = MealRecord::new("Lunch").with_photo(vec![0xff, 0xd8, 0xff]);

        ctx.repo.insert(&meal).await.unwrap();

        let fetched = ctx.repo.get_by_id(meal.id).await.unwrap().unwrap();
        assert_eq!(fetched, meal);
    }

    #[tokio::test]
    async fn test_get_missing_meal() {
        let ctx = setup().await;
        assert!(ctx.repo.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_all_newest_first() {
        let ctx = setup().await;

        let breakfast = MealRecord::new("Breakfast").with_captured_at(at(8));
        let dinner = MealRecord::new("Dinner").with_captured_at(at(19));
        let lunch = MealRecord::new("Lunch").with_captured_at(at(12));
        for meal in [&breakfast, &dinner, &lunch] {
            ctx.repo.insert(meal).await.unwrap();
        }

        let names: Vec<String> = ctx
            .repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["Dinner", "Lunch", "Breakfast"]);
    }

    #[tokio::test]
    async fn test_list_all_orders_by_time_not_text_length() {
        let ctx = setup().await;

        // Sub-second digits must not break ordering.
        let whole = MealRecord::new("Whole").with_captured_at(at(12));
        let fractional =
            MealRecord::new("Fractional").with_captured_at(at(12) + Duration::microseconds(500));
        ctx.repo.insert(&fractional).await.unwrap();
        ctx.repo.insert(&whole).await.unwrap();

        let meals = ctx.repo.list_all().await.unwrap();
        assert_eq!(meals[0].name, "Fractional");
        assert_eq!(meals[1].name, "Whole");
    }

    #[tokio::test]
    async fn test_list_all_same_instant_newest_insert_first() {
        let ctx = setup().await;

        let first = MealRecord::new("First").with_captured_at(at(12));
        let second = MealRecord::new("Second").with_captured_at(at(12));
        ctx.repo.insert(&first).await.unwrap();
        ctx.repo.insert(&second).await.unwrap();

        let meals = ctx.repo.list_all().await.unwrap();
        assert_eq!(meals[0].id, second.id);
        assert_eq!(meals[1].id, first.id);
    }

    #[tokio::test]
    async fn test_list_all_is_stable_without_writes() {
        let ctx = setup().await;
        for hour in [7, 12, 12, 18] {
            ctx.repo
                .insert(&MealRecord::new(format!("Meal {}", hour)).with_captured_at(at(hour)))
                .await
                .unwrap();
        }

        let first = ctx.repo.list_all().await.unwrap();
        let second = ctx.repo.list_all().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_list_range() {
        let ctx = setup().await;
        for hour in [6, 12, 18] {
            ctx.repo
                .insert(&MealRecord::new(format!("Meal {}", hour)).with_captured_at(at(hour)))
                .await
                .unwrap();
        }

        let meals = ctx.repo.list_range(at(6), at(18)).await.unwrap();
        let names: Vec<&str> = meals.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Meal 12", "Meal 6"]);
    }

    #[tokio::test]
    async fn test_update_meal() {
        let ctx = setup().await;
        let mut meal = MealRecord::new("Dinner");
        ctx.repo.insert(&meal).await.unwrap();

        meal.calories = 650;
        meal.protein = 40;
        meal.analysis_raw = Some("Calories: 650, Protein: 40".to_string());
        let touched = ctx.repo.update(&meal).await.unwrap();
        assert_eq!(touched, 1);

        let fetched = ctx.repo.get_by_id(meal.id).await.unwrap().unwrap();
        assert_eq!(fetched.calories, 650);
        assert_eq!(fetched.protein, 40);
        assert_eq!(fetched.carbs, 0);
        assert_eq!(fetched.analysis_raw, meal.analysis_raw);
        assert_eq!(fetched.captured_at, meal.captured_at);
    }

    #[tokio::test]
    async fn test_update_unknown_meal_is_noop() {
        let ctx = setup().await;
        let stored = MealRecord::new("Stored");
        ctx.repo.insert(&stored).await.unwrap();

        let mut ghost = MealRecord::new("Ghost");
        ghost.calories = 100;
        let touched = ctx.repo.update(&ghost).await.unwrap();

        assert_eq!(touched, 0);
        let meals = ctx.repo.list_all().await.unwrap();
        assert_eq!(meals, vec![stored]);
    }

    #[tokio::test]
    async fn test_update_keys_by_id_not_name() {
        let ctx = setup().await;
        let a = MealRecord::new("Snack").with_captured_at(at(10));
        let b = MealRecord::new("Snack").with_captured_at(at(10));
        ctx.repo.insert(&a).await.unwrap();
        ctx.repo.insert(&b).await.unwrap();

        let mut changed = a.clone();
        changed.fat = 9;
        ctx.repo.update(&changed).await.unwrap();

        assert_eq!(ctx.repo.get_by_id(a.id).await.unwrap().unwrap().fat, 9);
        assert_eq!(ctx.repo.get_by_id(b.id).await.unwrap().unwrap().fat, 0);
    }

    #[tokio::test]
    async fn test_delete_meal() {
        let ctx = setup().await;
        let meal = MealRecord::new("Dinner");
        ctx.repo.insert(&meal).await.unwrap();

        assert_eq!(ctx.repo.delete(meal.id).await.unwrap(), 1);
        assert!(ctx.repo.get_by_id(meal.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_meal_is_not_error() {
        let ctx = setup().await;
        assert_eq!(ctx.repo.delete(Uuid::new_v4()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_fails() {
        let ctx = setup().await;
        let meal = MealRecord::new("Twice");
        ctx.repo.insert(&meal).await.unwrap();

        let result = ctx.repo.insert(&meal).await;
        assert!(matches!(result, Err(StoreError::Database(_))));
    }
}
