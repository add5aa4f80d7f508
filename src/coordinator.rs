//! Meal log coordinator.
//!
//! Sole writer of both the meal store and the in-memory meal list. Creating a
//! meal persists it first and only then hands its photo to the analyzer on a
//! background task. The task never touches shared state: it sends its result
//! back over a channel and the coordinator merges it on the caller's side, so
//! the list is only ever mutated through `&mut self`.

use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::analysis::{parse, AnalysisError, Analyzer, ParseOutcome};
use crate::db::{MealRepository, StoreError};
use crate::models::MealRecord;

/// Result of one analysis, addressed to the meal it was started for.
#[derive(Debug)]
pub struct AnalysisCompletion {
    pub meal_id: Uuid,
    pub result: Result<String, AnalysisError>,
    dispatch: u64,
}

/// Analysis started for a meal. `delivered` flips once its completion has
/// been handed out by `next_completion`.
struct Dispatch {
    token: u64,
    handle: JoinHandle<()>,
    delivered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Parsed nutrients were written onto the meal and persisted.
    Merged { meal_id: Uuid, outcome: ParseOutcome },
    /// The result belongs to a deleted record, or the meal already holds an
    /// analysis; nothing was written.
    Dropped { meal_id: Uuid },
    /// The analyzer failed; the meal keeps its values.
    Failed { meal_id: Uuid, error: AnalysisError },
}

pub struct MealLogCoordinator {
    store: MealRepository,
    analyzer: Arc<dyn Analyzer>,
    meals: Vec<MealRecord>,
    dispatches: HashMap<Uuid, Dispatch>,
    next_token: u64,
    completions_tx: mpsc::UnboundedSender<AnalysisCompletion>,
    completions_rx: mpsc::UnboundedReceiver<AnalysisCompletion>,
}

impl MealLogCoordinator {
    /// Creates a coordinator whose meal list mirrors the store's contents.
    pub async fn load(
        store: MealRepository,
        analyzer: Arc<dyn Analyzer>,
    ) -> Result<Self, StoreError> {
        let meals = store.list_all().await?;
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        tracing::debug!("Loaded {} meal(s)", meals.len());

        Ok(Self {
            store,
            analyzer,
            meals,
            dispatches: HashMap::new(),
            next_token: 0,
            completions_tx,
            completions_rx,
        })
    }

    /// Meals in display order, newest first.
    pub fn meals(&self) -> &[MealRecord] {
        &self.meals
    }

    pub fn get(&self, id: Uuid) -> Option<&MealRecord> {
        self.meals.iter().find(|m| m.id == id)
    }

    #[cfg(test)]
    pub fn store(&self) -> &MealRepository {
        &self.store
    }

    /// Number of analyses started and not yet delivered.
    pub fn pending(&self) -> usize {
        self.dispatches.values().filter(|d| !d.delivered).count()
    }

    /// Logs a new meal captured now.
    pub async fn add_meal(
        &mut self,
        name: impl Into<String>,
        photo: Option<Vec<u8>>,
    ) -> Result<MealRecord, StoreError> {
        let mut meal = MealRecord::new(name);
        meal.photo = photo;
        self.add(meal).await
    }

    /// Persists `meal`, makes it visible in the meal list, then starts the
    /// analysis of its photo. Returns without waiting for the analysis.
    pub async fn add(&mut self, meal: MealRecord) -> Result<MealRecord, StoreError> {
        self.store.insert(&meal).await?;

        let position = self
            .meals
            .partition_point(|m| m.captured_at > meal.captured_at);
        self.meals.insert(position, meal.clone());
        tracing::info!("Logged meal '{}' ({})", meal.name, meal.id);

        self.dispatch(&meal);
        Ok(meal)
    }

    fn dispatch(&mut self, meal: &MealRecord) {
        if meal.is_analyzed() {
            tracing::debug!("Meal {} already analyzed, skipping analysis", meal.id);
            return;
        }

        let photo = match &meal.photo {
            Some(photo) if !photo.is_empty() => photo.clone(),
            _ => {
                tracing::debug!("Meal {} has no photo, skipping analysis", meal.id);
                return;
            }
        };

        let meal_id = meal.id;
        let token = self.next_token;
        self.next_token += 1;
        let analyzer = Arc::clone(&self.analyzer);
        let tx = self.completions_tx.clone();

        let handle = tokio::spawn(async move {
            let result = AssertUnwindSafe(analyzer.analyze(&photo))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(AnalysisError::Rejected("analyzer panicked".to_string())));
            // The receiver lives as long as the coordinator.
            let _ = tx.send(AnalysisCompletion {
                meal_id,
                result,
                dispatch: token,
            });
        });

        tracing::debug!("Started analysis {} for meal {}", token, meal_id);
        self.dispatches.insert(
            meal_id,
            Dispatch {
                token,
                handle,
                delivered: false,
            },
        );
    }

    /// Waits for the next analysis result. Returns `None` once nothing is in
    /// flight and no result is waiting.
    ///
    /// Results from analyses that were cancelled or replaced, such as those of
    /// a deleted record, are discarded here.
    pub async fn next_completion(&mut self) -> Option<AnalysisCompletion> {
        loop {
            let completion = match self.completions_rx.try_recv() {
                Ok(completion) => completion,
                Err(_) if self.pending() == 0 => return None,
                Err(_) => self.completions_rx.recv().await?,
            };

            match self.dispatches.get_mut(&completion.meal_id) {
                Some(d) if d.token == completion.dispatch && !d.delivered => {
                    d.delivered = true;
                    return Some(completion);
                }
                _ => tracing::debug!(
                    "Discarding stale analysis {} for meal {}",
                    completion.dispatch,
                    completion.meal_id
                ),
            }
        }
    }

    /// Merges an analysis result into its meal and writes the meal back.
    ///
    /// Nutrients missing from the reply keep their current value. A result
    /// for a meal that has since been deleted is dropped, even when a record
    /// with the same id was added back. A blank reply leaves `analysis_raw`
    /// unset.
    pub async fn apply_completion(
        &mut self,
        completion: AnalysisCompletion,
    ) -> Result<MergeOutcome, StoreError> {
        let AnalysisCompletion {
            meal_id,
            result,
            dispatch,
        } = completion;

        if self.dispatches.get(&meal_id).map(|d| d.token) != Some(dispatch) {
            tracing::debug!("Analysis {} for meal {} is stale, dropping", dispatch, meal_id);
            return Ok(MergeOutcome::Dropped { meal_id });
        }
        self.dispatches.remove(&meal_id);

        let text = match result {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!("Analysis of meal {} failed: {}", meal_id, error);
                return Ok(MergeOutcome::Failed { meal_id, error });
            }
        };

        let Some(meal) = self.meals.iter_mut().find(|m| m.id == meal_id) else {
            tracing::debug!("Meal {} is gone, dropping analysis result", meal_id);
            return Ok(MergeOutcome::Dropped { meal_id });
        };

        if meal.is_analyzed() {
            tracing::debug!("Meal {} already analyzed, dropping analysis result", meal_id);
            return Ok(MergeOutcome::Dropped { meal_id });
        }

        let parsed = parse(&text);
        parsed.apply_to(meal);
        if !text.trim().is_empty() {
            meal.analysis_raw = Some(text);
        }

        match self.store.update(meal).await {
            Ok(0) => {
                tracing::warn!("Meal {} missing from store during merge", meal_id);
            }
            Ok(_) => {}
            Err(e) => {
                // The in-memory copy keeps the merged values.
                tracing::warn!("Failed to persist analysis for meal {}: {}", meal_id, e);
                return Err(e);
            }
        }

        let outcome = parsed.outcome();
        tracing::info!(
            "Merged {} analysis into meal {}: {:?}",
            outcome,
            meal_id,
            parsed.to_map()
        );
        Ok(MergeOutcome::Merged { meal_id, outcome })
    }

    /// Applies results until no analysis is left in flight.
    pub async fn settle(&mut self) -> Result<Vec<MergeOutcome>, StoreError> {
        let mut outcomes = Vec::new();
        while let Some(completion) = self.next_completion().await {
            outcomes.push(self.apply_completion(completion).await?);
        }
        Ok(outcomes)
    }

    /// Deletes a meal, cancels its analysis, and re-reads the meal list from
    /// the store. Returns the number of stored meals removed.
    pub async fn delete_meal(&mut self, id: Uuid) -> Result<u64, StoreError> {
        if let Some(dispatch) = self.dispatches.remove(&id) {
            dispatch.handle.abort();
            tracing::debug!("Cancelled analysis for meal {}", id);
        }

        let removed = self.store.delete(id).await?;
        self.refresh().await?;

        tracing::info!("Deleted meal {} ({} row(s))", id, removed);
        Ok(removed)
    }

    /// Replaces the meal list with a fresh read of the store.
    pub async fn refresh(&mut self) -> Result<(), StoreError> {
        self.meals = self.store.list_all().await?;
        Ok(())
    }
}
