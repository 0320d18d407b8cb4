use anyhow::Result;
use serde::Serialize;

use tbca_core::db::Database;

use super::helpers::print_json;

#[derive(Serialize)]
struct Inserted {
    inserted: usize,
}

pub(crate) fn cmd_seed(db: &Database, json: bool) -> Result<()> {
    let inserted = db.seed_nutrient_catalog()?;
    if json {
        return print_json(&Inserted { inserted });
    }
    if inserted == 0 {
        println!("Nutrient catalog already seeded");
    } else {
        println!("Inserted {inserted} reference nutrients");
    }
    Ok(())
}

pub(crate) fn cmd_backfill(db: &Database, json: bool) -> Result<()> {
    let inserted = db.backfill_wide_nutrients()?;
    if json {
        return print_json(&Inserted { inserted });
    }
    println!("Created {inserted} wide nutrient rows");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_twice() {
        let db = Database::open_in_memory().unwrap();
        cmd_seed(&db, false).unwrap();
        let seeded = db.counts().unwrap().reference_nutrients;
        assert!(seeded > 0);
        cmd_seed(&db, true).unwrap();
        assert_eq!(db.counts().unwrap().reference_nutrients, seeded);
    }

    #[test]
    fn test_backfill_on_empty_database() {
        let db = Database::open_in_memory().unwrap();
        cmd_backfill(&db, false).unwrap();
        assert_eq!(db.counts().unwrap().wide_rows, 0);
    }
}
