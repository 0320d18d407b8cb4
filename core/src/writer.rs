use anyhow::Result;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::models::{FoodRecord, NutrientEntry};
use crate::normalize::split_description;
use crate::nutrients::{NutrientMapper, WideNutrients, truncate_entry};

/// Records between commits during a crawl or replay.
pub const COMMIT_INTERVAL: usize = 10;

/// Storage operations the writer needs. `Database` is the SQLite
/// implementation; tests wrap it to inject failures.
///
/// `begin_record`/`release_record`/`rollback_record` bracket one record so a
/// failure discards only that record's rows. `commit` makes everything
/// released so far durable.
pub trait NutrientStore {
    fn upsert_food(&self, code: &str, class: &str, name: &str) -> Result<(i64, bool)>;
    fn insert_variation(&self, food_id: i64, description: &str) -> Result<i64>;
    fn insert_legacy_nutrient(&self, variation_id: i64, entry: &NutrientEntry) -> Result<()>;
    fn insert_wide_nutrients(&self, variation_id: i64, values: &WideNutrients) -> Result<i64>;
    fn begin_record(&self) -> Result<()>;
    fn release_record(&self) -> Result<()>;
    fn rollback_record(&self) -> Result<()>;
    fn commit(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved {
        food_id: i64,
        variation_id: i64,
        food_created: bool,
        nutrients_written: usize,
        fields_mapped: usize,
    },
    Failed {
        code: String,
        reason: String,
    },
}

impl SaveOutcome {
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveFailure {
    pub code: String,
    pub reason: String,
}

/// Running totals across every `save` call of one writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub saved: usize,
    pub failed: usize,
    pub foods_created: usize,
    pub nutrients_written: usize,
    pub failures: Vec<SaveFailure>,
    /// Periodic commits that failed. Their records stay pending until a later
    /// commit succeeds.
    pub commit_failures: usize,
}

impl WriteSummary {
    fn record(&mut self, outcome: &SaveOutcome) {
        match outcome {
            SaveOutcome::Saved {
                food_created,
                nutrients_written,
                ..
            } => {
                self.saved += 1;
                self.nutrients_written += nutrients_written;
                if *food_created {
                    self.foods_created += 1;
                }
            }
            SaveOutcome::Failed { code, reason } => {
                self.failed += 1;
                self.failures.push(SaveFailure {
                    code: code.clone(),
                    reason: reason.clone(),
                });
            }
        }
    }
}

/// Writes scraped records into both nutrient schema generations.
pub struct FoodWriter<'a, S: NutrientStore> {
    store: &'a S,
    summary: WriteSummary,
}

impl<'a, S: NutrientStore> FoodWriter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            summary: WriteSummary::default(),
        }
    }

    /// Persist one record. Never returns an error: a failure rolls back this
    /// record's rows and is reported as `SaveOutcome::Failed`.
    pub fn save(&mut self, record: &FoodRecord) -> SaveOutcome {
        let outcome = match self.save_in_unit(record) {
            Ok(saved) => saved,
            Err(e) => {
                warn!(code = %record.code, error = %format!("{e:#}"), "failed to save food");
                SaveOutcome::Failed {
                    code: record.code.clone(),
                    reason: format!("{e:#}"),
                }
            }
        };
        self.summary.record(&outcome);
        outcome
    }

    pub fn commit(&self) -> Result<()> {
        self.store.commit()
    }

    /// Commit after every `COMMIT_INTERVAL` processed records. A failure here
    /// is logged and counted; the pending records ride along to the next
    /// commit.
    pub fn checkpoint(&mut self, processed: usize) {
        if processed == 0 || processed % COMMIT_INTERVAL != 0 {
            return;
        }
        match self.store.commit() {
            Ok(()) => debug!(processed, "committed"),
            Err(e) => {
                self.summary.commit_failures += 1;
                warn!(processed, error = %format!("{e:#}"), "periodic commit failed, continuing");
            }
        }
    }

    #[must_use]
    pub fn summary(&self) -> &WriteSummary {
        &self.summary
    }

    #[must_use]
    pub fn into_summary(self) -> WriteSummary {
        self.summary
    }

    fn save_in_unit(&self, record: &FoodRecord) -> Result<SaveOutcome> {
        self.store.begin_record()?;
        match self.write(record) {
            Ok(outcome) => {
                self.store.release_record()?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = self.store.rollback_record() {
                    error!(code = %record.code, error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    fn write(&self, record: &FoodRecord) -> Result<SaveOutcome> {
        let (main_part, observations_line) = split_description(&record.description);

        let (food_id, food_created) =
            self.store
                .upsert_food(&record.code, &record.class, &main_part)?;
        let variation_id = self.store.insert_variation(food_id, &observations_line)?;

        let mut mapper = NutrientMapper::for_payload(&record.nutrients);
        for entry in &record.nutrients {
            let entry = truncate_entry(entry);
            self.store.insert_legacy_nutrient(variation_id, &entry)?;
            mapper.add(&entry);
        }
        let wide = mapper.finish();
        self.store.insert_wide_nutrients(variation_id, &wide)?;

        debug!(
            code = %record.code,
            food_id,
            variation_id,
            nutrients = record.nutrients.len(),
            mapped = wide.len(),
            "saved food"
        );

        Ok(SaveOutcome::Saved {
            food_id,
            variation_id,
            food_created,
            nutrients_written: record.nutrients.len(),
            fields_mapped: wide.len(),
        })
    }
}
