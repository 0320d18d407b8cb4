use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use tbca_core::models::{Food, FoodVariation};
use tbca_core::nutrients::WideNutrients;
use tbca_core::writer::WriteSummary;

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Two-column label/value table used by every summary.
pub(crate) fn print_key_values(rows: &[(&str, String)]) {
    #[derive(Tabled)]
    struct KeyValueRow {
        #[tabled(rename = "")]
        key: String,
        #[tabled(rename = "")]
        value: String,
    }

    let rows: Vec<KeyValueRow> = rows
        .iter()
        .map(|(key, value)| KeyValueRow {
            key: (*key).to_string(),
            value: value.clone(),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn write_summary_rows(summary: &WriteSummary) -> Vec<(&'static str, String)> {
    vec![
        ("Saved", summary.saved.to_string()),
        ("Failed", summary.failed.to_string()),
        ("New foods", summary.foods_created.to_string()),
        ("Nutrient rows", summary.nutrients_written.to_string()),
        ("Failed commits", summary.commit_failures.to_string()),
    ]
}

pub(crate) fn print_failures(summary: &WriteSummary) {
    for failure in &summary.failures {
        eprintln!("  {}: {}", failure.code, failure.reason);
    }
}

pub(crate) fn print_food(food: &Food) {
    print_key_values(&[
        ("Code", food.code.clone()),
        ("Name", food.name.clone()),
        ("Class", food.class.clone()),
        ("ID", food.id.to_string()),
    ]);
}

pub(crate) fn print_variation_table(variations: &[FoodVariation]) {
    #[derive(Tabled)]
    struct VariationRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Description")]
        description: String,
    }

    let rows: Vec<VariationRow> = variations
        .iter()
        .map(|v| VariationRow {
            id: v.id,
            description: truncate(&v.description, 70),
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
}

pub(crate) fn print_wide_table(values: &WideNutrients) {
    #[derive(Tabled)]
    struct FieldRow {
        #[tabled(rename = "Field")]
        field: &'static str,
        #[tabled(rename = "Value/100g")]
        value: String,
    }

    let rows: Vec<FieldRow> = values
        .iter()
        .map(|(field, value)| FieldRow {
            field: field.column(),
            value: format_value(value),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
