use serde::{Deserialize, Serialize};

/// One row of a food's nutrient table, exactly as it appeared on the page.
///
/// Field names follow the column headers of the source table so that capture
/// files written by earlier scrapes keep replaying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutrientEntry {
    #[serde(rename = "Componente", default)]
    pub component: String,
    #[serde(rename = "Unidades", default)]
    pub unit: String,
    #[serde(rename = "Valor por 100g", default)]
    pub value: String,
}

impl NutrientEntry {
    #[must_use]
    pub fn new(component: &str, unit: &str, value: &str) -> Self {
        Self {
            component: component.to_string(),
            unit: unit.to_string(),
            value: value.to_string(),
        }
    }
}

/// A scraped food detail page, the unit that flows from the crawler (or a
/// capture file) into the writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodRecord {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "classe")]
    pub class: String,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "nutrientes", default)]
    pub nutrients: Vec<NutrientEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Food {
    pub id: i64,
    pub code: String,
    pub class: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FoodVariation {
    pub id: i64,
    pub food_id: i64,
    pub description: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NutrientObservation {
    pub id: i64,
    pub variation_id: i64,
    pub component: String,
    pub unit: String,
    pub value: String,
}

/// Static catalog entry for the `nutrients` reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NutrientReference {
    pub name: &'static str,
    pub unit: &'static str,
    pub category: &'static str,
}

/// Row counts across every table, used by `stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub foods: i64,
    pub variations: i64,
    pub legacy_nutrients: i64,
    pub wide_rows: i64,
    pub reference_nutrients: i64,
}
