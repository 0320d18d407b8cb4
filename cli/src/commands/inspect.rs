use anyhow::{Result, bail};
use serde::Serialize;

use tbca_core::db::Database;
use tbca_core::models::{Food, FoodVariation};
use tbca_core::nutrients::WideNutrients;

use super::helpers::{print_food, print_json, print_key_values, print_variation_table, print_wide_table};

#[derive(Serialize)]
struct VariationView {
    #[serde(flatten)]
    variation: FoodVariation,
    nutrients: Option<WideNutrients>,
}

#[derive(Serialize)]
struct FoodView {
    #[serde(flatten)]
    food: Food,
    variations: Vec<VariationView>,
}

fn load_food(db: &Database, code: &str) -> Result<FoodView> {
    let Some(food) = db.food_by_code(code)? else {
        bail!("No food with code '{code}'");
    };
    let variations = db
        .variations_for_food(food.id)?
        .into_iter()
        .map(|variation| {
            let nutrients = db.wide_nutrients_for_variation(variation.id)?;
            Ok(VariationView {
                variation,
                nutrients,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(FoodView { food, variations })
}

pub(crate) fn cmd_show(db: &Database, code: &str, json: bool) -> Result<()> {
    let view = load_food(db, code)?;

    if json {
        return print_json(&view);
    }

    print_food(&view.food);
    let variations: Vec<FoodVariation> = view.variations.iter().map(|v| v.variation.clone()).collect();
    print_variation_table(&variations);

    for v in &view.variations {
        let id = v.variation.id;
        match &v.nutrients {
            Some(values) if !values.is_empty() => {
                println!("\nVariation {id}: {}", v.variation.description);
                print_wide_table(values);
            }
            _ => println!("\nVariation {id}: no mapped nutrients"),
        }
    }
    Ok(())
}

pub(crate) fn cmd_stats(db: &Database, json: bool) -> Result<()> {
    let counts = db.counts()?;
    if json {
        return print_json(&counts);
    }
    print_key_values(&[
        ("Foods", counts.foods.to_string()),
        ("Variations", counts.variations.to_string()),
        ("Nutrient rows", counts.legacy_nutrients.to_string()),
        ("Wide rows", counts.wide_rows.to_string()),
        ("Reference nutrients", counts.reference_nutrients.to_string()),
    ]);
    Ok(())
}
