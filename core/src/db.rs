use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, info};

use crate::models::{Food, FoodVariation, NutrientEntry, NutrientObservation, TableCounts};
use crate::nutrients::{NUTRIENT_CATALOG, NutrientField, WideNutrients, map_nutrients};
use crate::writer::NutrientStore;

const RECORD_SAVEPOINT: &str = "food_record";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS foods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    code TEXT NOT NULL UNIQUE,
                    class TEXT NOT NULL,
                    name TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS food_variations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    food_id INTEGER NOT NULL REFERENCES foods(id),
                    description TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS food_nutrients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    variation_id INTEGER NOT NULL REFERENCES food_variations(id),
                    component TEXT NOT NULL,
                    unit TEXT NOT NULL,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS nutrients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    unit TEXT NOT NULL,
                    category TEXT NOT NULL,
                    UNIQUE (name, unit)
                );

                CREATE INDEX IF NOT EXISTS idx_food_variations_food ON food_variations(food_id);
                CREATE INDEX IF NOT EXISTS idx_food_nutrients_variation ON food_nutrients(variation_id);

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            // Wide schema generation: one REAL column per known nutrient.
            let columns: Vec<String> = NutrientField::ALL
                .iter()
                .map(|f| format!("{} REAL", f.column()))
                .collect();
            self.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS food_variation_nutrients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    variation_id INTEGER NOT NULL UNIQUE REFERENCES food_variations(id),
                    {}
                );

                PRAGMA user_version = 2;",
                columns.join(",\n                    ")
            ))?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<Food> {
        Ok(Food {
            id: row.get(0)?,
            code: row.get(1)?,
            class: row.get(2)?,
            name: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn variation_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodVariation> {
        Ok(FoodVariation {
            id: row.get(0)?,
            food_id: row.get(1)?,
            description: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn observation_from_row(row: &rusqlite::Row) -> rusqlite::Result<NutrientObservation> {
        Ok(NutrientObservation {
            id: row.get(0)?,
            variation_id: row.get(1)?,
            component: row.get(2)?,
            unit: row.get(3)?,
            value: row.get(4)?,
        })
    }

    // --- Foods ---

    /// Insert a food unless its code is already known. Returns the food id and
    /// whether this call created it. An existing food keeps its first name.
    pub fn upsert_food(&self, code: &str, class: &str, name: &str) -> Result<(i64, bool)> {
        let now = Local::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO foods (code, class, name, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (code) DO NOTHING",
            params![code, class, name, now],
        )?;
        if inserted > 0 {
            return Ok((self.conn.last_insert_rowid(), true));
        }

        let id = self
            .conn
            .query_row(
                "SELECT id FROM foods WHERE code = ?1",
                params![code],
                |row| row.get(0),
            )
            .with_context(|| format!("Food {code} vanished after conflicting insert"))?;
        Ok((id, false))
    }

    pub fn food_by_code(&self, code: &str) -> Result<Option<Food>> {
        let food = self
            .conn
            .query_row(
                "SELECT id, code, class, name, created_at FROM foods WHERE code = ?1",
                params![code],
                Self::food_from_row,
            )
            .optional()?;
        Ok(food)
    }

    // --- Variations ---

    pub fn insert_variation(&self, food_id: i64, description: &str) -> Result<i64> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO food_variations (food_id, description, created_at) VALUES (?1, ?2, ?3)",
            params![food_id, description, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn variations_for_food(&self, food_id: i64) -> Result<Vec<FoodVariation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, food_id, description, created_at FROM food_variations
             WHERE food_id = ?1 ORDER BY id",
        )?;
        let variations = stmt
            .query_map(params![food_id], Self::variation_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(variations)
    }

    // --- Narrow (legacy) nutrients ---

    pub fn insert_legacy_nutrient(&self, variation_id: i64, entry: &NutrientEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO food_nutrients (variation_id, component, unit, value)
             VALUES (?1, ?2, ?3, ?4)",
            params![variation_id, entry.component, entry.unit, entry.value],
        )?;
        Ok(())
    }

    pub fn legacy_nutrients_for_variation(
        &self,
        variation_id: i64,
    ) -> Result<Vec<NutrientObservation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, variation_id, component, unit, value FROM food_nutrients
             WHERE variation_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![variation_id], Self::observation_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // --- Wide nutrients ---

    /// Insert the single wide row for a variation. Fields absent from `values`
    /// are left NULL.
    pub fn insert_wide_nutrients(&self, variation_id: i64, values: &WideNutrients) -> Result<i64> {
        let mut columns = vec!["variation_id"];
        let mut bound = vec![Value::Integer(variation_id)];
        for (field, value) in values.iter() {
            columns.push(field.column());
            bound.push(value.map_or(Value::Null, Value::Real));
        }
        let placeholders: Vec<String> = (1..=bound.len()).map(|i| format!("?{i}")).collect();

        self.conn.execute(
            &format!(
                "INSERT INTO food_variation_nutrients ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            ),
            params_from_iter(bound.iter()),
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Non-null wide values stored for a variation, or `None` if it has no wide row.
    pub fn wide_nutrients_for_variation(&self, variation_id: i64) -> Result<Option<WideNutrients>> {
        let columns: Vec<&str> = NutrientField::ALL.iter().map(|f| f.column()).collect();
        let sql = format!(
            "SELECT {} FROM food_variation_nutrients WHERE variation_id = ?1",
            columns.join(", ")
        );
        let wide = self
            .conn
            .query_row(&sql, params![variation_id], |row| {
                let mut wide = WideNutrients::default();
                for (idx, field) in NutrientField::ALL.iter().enumerate() {
                    if let Some(v) = row.get::<_, Option<f64>>(idx)? {
                        wide.set(*field, Some(v));
                    }
                }
                Ok(wide)
            })
            .optional()?;
        Ok(wide)
    }

    /// Build wide rows for variations that only have narrow observations,
    /// e.g. ones ingested before the wide table existed. Returns the number of
    /// rows created.
    pub fn backfill_wide_nutrients(&self) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;

        let pending: Vec<i64> = {
            let mut stmt = tx.prepare(
                "SELECT DISTINCT n.variation_id FROM food_nutrients n
                 LEFT JOIN food_variation_nutrients w ON w.variation_id = n.variation_id
                 WHERE w.id IS NULL
                 ORDER BY n.variation_id",
            )?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        let mut created = 0;
        for variation_id in pending {
            let entries: Vec<NutrientEntry> = self
                .legacy_nutrients_for_variation(variation_id)?
                .into_iter()
                .map(|o| NutrientEntry {
                    component: o.component,
                    unit: o.unit,
                    value: o.value,
                })
                .collect();

            let wide = map_nutrients(&entries);
            if wide.is_empty() {
                debug!(variation_id, "no mappable nutrients, skipping");
                continue;
            }
            self.insert_wide_nutrients(variation_id, &wide)?;
            created += 1;
        }

        tx.commit()?;
        info!(created, "backfilled wide nutrient rows");
        Ok(created)
    }

    // --- Nutrient reference catalog ---

    /// Insert every catalog nutrient whose `(name, unit)` is not present yet.
    /// Returns how many were inserted.
    pub fn seed_nutrient_catalog(&self) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        for nutrient in &NUTRIENT_CATALOG {
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT id FROM nutrients WHERE name = ?1 AND unit = ?2",
                    params![nutrient.name, nutrient.unit],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                tx.execute(
                    "INSERT INTO nutrients (name, unit, category) VALUES (?1, ?2, ?3)",
                    params![nutrient.name, nutrient.unit, nutrient.category],
                )?;
                inserted += 1;
            }
        }
        tx.commit().context("Failed to commit nutrient catalog")?;
        Ok(inserted)
    }

    // --- Stats ---

    pub fn counts(&self) -> Result<TableCounts> {
        let count = |table: &str| -> Result<i64> {
            let n = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n)
        };
        Ok(TableCounts {
            foods: count("foods")?,
            variations: count("food_variations")?,
            legacy_nutrients: count("food_nutrients")?,
            wide_rows: count("food_variation_nutrients")?,
            reference_nutrients: count("nutrients")?,
        })
    }
}

impl NutrientStore for Database {
    fn upsert_food(&self, code: &str, class: &str, name: &str) -> Result<(i64, bool)> {
        Database::upsert_food(self, code, class, name)
    }

    fn insert_variation(&self, food_id: i64, description: &str) -> Result<i64> {
        Database::insert_variation(self, food_id, description)
    }

    fn insert_legacy_nutrient(&self, variation_id: i64, entry: &NutrientEntry) -> Result<()> {
        Database::insert_legacy_nutrient(self, variation_id, entry)
    }

    fn insert_wide_nutrients(&self, variation_id: i64, values: &WideNutrients) -> Result<i64> {
        Database::insert_wide_nutrients(self, variation_id, values)
    }

    fn begin_record(&self) -> Result<()> {
        // Records accumulate in one outer transaction until `commit`.
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        self.conn
            .execute_batch(&format!("SAVEPOINT {RECORD_SAVEPOINT}"))?;
        Ok(())
    }

    fn release_record(&self) -> Result<()> {
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {RECORD_SAVEPOINT}"))?;
        Ok(())
    }

    fn rollback_record(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {RECORD_SAVEPOINT}; RELEASE SAVEPOINT {RECORD_SAVEPOINT};"
        ))?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT").context("Failed to commit")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_wide() -> WideNutrients {
        let mut wide = WideNutrients::default();
        wide.set(NutrientField::EnergiaKcal, Some(124.0));
        wide.set(NutrientField::ColesterolMg, None);
        wide
    }

    #[test]
    fn test_migrate_sets_version() {
        let db = Database::open_in_memory().unwrap();
        let version: i64 = db
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn test_open_file_twice_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tbca.db");
        {
            let db = Database::open(&path).unwrap();
            db.upsert_food("C1", "Frutas", "Abacate").unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert!(db.food_by_code("C1").unwrap().is_some());
    }

    #[test]
    fn test_upsert_food_first_name_wins() {
        let db = Database::open_in_memory().unwrap();
        let (id1, created1) = db.upsert_food("BRC0001A", "Cereais", "Arroz").unwrap();
        let (id2, created2) = db.upsert_food("BRC0001A", "Outros", "Arroz polido").unwrap();

        assert_eq!(id1, id2);
        assert!(created1);
        assert!(!created2);

        let food = db.food_by_code("BRC0001A").unwrap().unwrap();
        assert_eq!(food.id, id1);
        assert_eq!(food.name, "Arroz");
        assert_eq!(food.class, "Cereais");
        assert_eq!(db.counts().unwrap().foods, 1);
    }

    #[test]
    fn test_variations_are_never_deduplicated() {
        let db = Database::open_in_memory().unwrap();
        let (food_id, _) = db.upsert_food("C1", "Frutas", "Banana").unwrap();
        let v1 = db.insert_variation(food_id, "prata, crua").unwrap();
        let v2 = db.insert_variation(food_id, "prata, crua").unwrap();
        assert_ne!(v1, v2);

        let variations = db.variations_for_food(food_id).unwrap();
        assert_eq!(variations.len(), 2);
        assert!(variations.iter().all(|v| v.description == "prata, crua"));
    }

    #[test]
    fn test_variation_requires_existing_food() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_variation(999, "orfã").is_err());
    }

    #[test]
    fn test_insert_and_read_wide_nutrients() {
        let db = Database::open_in_memory().unwrap();
        let (food_id, _) = db.upsert_food("C1", "Frutas", "Banana").unwrap();
        let variation_id = db.insert_variation(food_id, "crua").unwrap();

        db.insert_wide_nutrients(variation_id, &sample_wide()).unwrap();

        let wide = db.wide_nutrients_for_variation(variation_id).unwrap().unwrap();
        assert_eq!(wide.get(NutrientField::EnergiaKcal), Some(Some(124.0)));
        // Null columns read back as absent.
        assert_eq!(wide.get(NutrientField::ColesterolMg), None);
        assert_eq!(wide.len(), 1);
    }

    #[test]
    fn test_wide_row_is_unique_per_variation() {
        let db = Database::open_in_memory().unwrap();
        let (food_id, _) = db.upsert_food("C1", "Frutas", "Banana").unwrap();
        let variation_id = db.insert_variation(food_id, "crua").unwrap();

        db.insert_wide_nutrients(variation_id, &sample_wide()).unwrap();
        assert!(db.insert_wide_nutrients(variation_id, &sample_wide()).is_err());
    }

    #[test]
    fn test_wide_row_with_no_fields() {
        let db = Database::open_in_memory().unwrap();
        let (food_id, _) = db.upsert_food("C1", "Frutas", "Banana").unwrap();
        let variation_id = db.insert_variation(food_id, "crua").unwrap();

        db.insert_wide_nutrients(variation_id, &WideNutrients::default())
            .unwrap();
        let wide = db.wide_nutrients_for_variation(variation_id).unwrap().unwrap();
        assert!(wide.is_empty());
        assert!(db.wide_nutrients_for_variation(variation_id + 1).unwrap().is_none());
    }

    #[test]
    fn test_seed_nutrient_catalog_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.seed_nutrient_catalog().unwrap(), NUTRIENT_CATALOG.len());
        assert_eq!(db.seed_nutrient_catalog().unwrap(), 0);
        assert_eq!(
            db.counts().unwrap().reference_nutrients,
            NUTRIENT_CATALOG.len() as i64
        );
    }

    #[test]
    fn test_backfill_builds_missing_wide_rows() {
        let db = Database::open_in_memory().unwrap();
        let (food_id, _) = db.upsert_food("C1", "Frutas", "Banana").unwrap();

        let old = db.insert_variation(food_id, "crua").unwrap();
        db.insert_legacy_nutrient(old, &NutrientEntry::new("Energia", "kcal", "98"))
            .unwrap();
        db.insert_legacy_nutrient(old, &NutrientEntry::new("Potássio", "mg", "376"))
            .unwrap();

        // Already has a wide row; must be left alone.
        let current = db.insert_variation(food_id, "assada").unwrap();
        db.insert_legacy_nutrient(current, &NutrientEntry::new("Energia", "kcal", "120"))
            .unwrap();
        db.insert_wide_nutrients(current, &sample_wide()).unwrap();

        // Only unmapped components: nothing to build.
        let unmapped = db.insert_variation(food_id, "seca").unwrap();
        db.insert_legacy_nutrient(unmapped, &NutrientEntry::new("Triptofano", "mg", "1"))
            .unwrap();

        assert_eq!(db.backfill_wide_nutrients().unwrap(), 1);
        let wide = db.wide_nutrients_for_variation(old).unwrap().unwrap();
        assert_eq!(wide.get(NutrientField::EnergiaKcal), Some(Some(98.0)));
        assert_eq!(wide.get(NutrientField::PotassioMg), Some(Some(376.0)));
        assert!(db.wide_nutrients_for_variation(unmapped).unwrap().is_none());

        // Second run has nothing left to do.
        assert_eq!(db.backfill_wide_nutrients().unwrap(), 0);
    }

    #[test]
    fn test_record_rollback_discards_only_that_record() {
        let db = Database::open_in_memory().unwrap();

        db.begin_record().unwrap();
        db.upsert_food("KEEP", "A", "Mantida").unwrap();
        db.release_record().unwrap();

        db.begin_record().unwrap();
        db.upsert_food("DROP", "A", "Descartada").unwrap();
        db.rollback_record().unwrap();

        db.commit().unwrap();
        assert!(db.food_by_code("KEEP").unwrap().is_some());
        assert!(db.food_by_code("DROP").unwrap().is_none());
        assert!(db.conn.is_autocommit());
    }

    #[test]
    fn test_commit_without_open_transaction_is_noop() {
        let db = Database::open_in_memory().unwrap();
        db.commit().unwrap();
    }
}
