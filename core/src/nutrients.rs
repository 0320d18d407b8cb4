use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{NutrientEntry, NutrientReference};

pub const MAX_COMPONENT_CHARS: usize = 500;
pub const MAX_UNIT_CHARS: usize = 100;
pub const MAX_VALUE_CHARS: usize = 100;

/// One column of the wide `food_variation_nutrients` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum NutrientField {
    EnergiaKj,
    EnergiaKcal,
    UmidadeG,
    CarboidratoTotalG,
    CarboidratoDisponivelG,
    ProteinaG,
    LipidiosG,
    FibraAlimentarG,
    AlcoolG,
    CinzasG,
    ColesterolMg,
    AcidosGraxosSaturadosG,
    AcidosGraxosMonoinsaturadosG,
    AcidosGraxosPoliinsaturadosG,
    AcidosGraxosTransG,
    CalcioMg,
    FerroMg,
    SodioMg,
    MagnesioMg,
    FosforoMg,
    PotassioMg,
    ManganesMg,
    ZincoMg,
    CobreMg,
    SelenioMcg,
    VitaminaAReMcg,
    VitaminaARaeMcg,
    VitaminaDMcg,
    AlfaTocoferolMg,
    TiaminaMg,
    RiboflavinaMg,
    NiacinaMg,
    VitaminaB6Mg,
    VitaminaB12Mcg,
    VitaminaCMg,
    EquivalenteFolatoMcg,
    SalDeAdicaoG,
    AcucarDeAdicaoG,
}

impl NutrientField {
    pub const ALL: [NutrientField; 38] = [
        Self::EnergiaKj,
        Self::EnergiaKcal,
        Self::UmidadeG,
        Self::CarboidratoTotalG,
        Self::CarboidratoDisponivelG,
        Self::ProteinaG,
        Self::LipidiosG,
        Self::FibraAlimentarG,
        Self::AlcoolG,
        Self::CinzasG,
        Self::ColesterolMg,
        Self::AcidosGraxosSaturadosG,
        Self::AcidosGraxosMonoinsaturadosG,
        Self::AcidosGraxosPoliinsaturadosG,
        Self::AcidosGraxosTransG,
        Self::CalcioMg,
        Self::FerroMg,
        Self::SodioMg,
        Self::MagnesioMg,
        Self::FosforoMg,
        Self::PotassioMg,
        Self::ManganesMg,
        Self::ZincoMg,
        Self::CobreMg,
        Self::SelenioMcg,
        Self::VitaminaAReMcg,
        Self::VitaminaARaeMcg,
        Self::VitaminaDMcg,
        Self::AlfaTocoferolMg,
        Self::TiaminaMg,
        Self::RiboflavinaMg,
        Self::NiacinaMg,
        Self::VitaminaB6Mg,
        Self::VitaminaB12Mcg,
        Self::VitaminaCMg,
        Self::EquivalenteFolatoMcg,
        Self::SalDeAdicaoG,
        Self::AcucarDeAdicaoG,
    ];

    /// Column name in `food_variation_nutrients`.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::EnergiaKj => "energia_kj",
            Self::EnergiaKcal => "energia_kcal",
            Self::UmidadeG => "umidade_g",
            Self::CarboidratoTotalG => "carboidrato_total_g",
            Self::CarboidratoDisponivelG => "carboidrato_disponivel_g",
            Self::ProteinaG => "proteina_g",
            Self::LipidiosG => "lipidios_g",
            Self::FibraAlimentarG => "fibra_alimentar_g",
            Self::AlcoolG => "alcool_g",
            Self::CinzasG => "cinzas_g",
            Self::ColesterolMg => "colesterol_mg",
            Self::AcidosGraxosSaturadosG => "acidos_graxos_saturados_g",
            Self::AcidosGraxosMonoinsaturadosG => "acidos_graxos_monoinsaturados_g",
            Self::AcidosGraxosPoliinsaturadosG => "acidos_graxos_poliinsaturados_g",
            Self::AcidosGraxosTransG => "acidos_graxos_trans_g",
            Self::CalcioMg => "calcio_mg",
            Self::FerroMg => "ferro_mg",
            Self::SodioMg => "sodio_mg",
            Self::MagnesioMg => "magnesio_mg",
            Self::FosforoMg => "fosforo_mg",
            Self::PotassioMg => "potassio_mg",
            Self::ManganesMg => "manganes_mg",
            Self::ZincoMg => "zinco_mg",
            Self::CobreMg => "cobre_mg",
            Self::SelenioMcg => "selenio_mcg",
            Self::VitaminaAReMcg => "vitamina_a_re_mcg",
            Self::VitaminaARaeMcg => "vitamina_a_rae_mcg",
            Self::VitaminaDMcg => "vitamina_d_mcg",
            Self::AlfaTocoferolMg => "alfa_tocoferol_mg",
            Self::TiaminaMg => "tiamina_mg",
            Self::RiboflavinaMg => "riboflavina_mg",
            Self::NiacinaMg => "niacina_mg",
            Self::VitaminaB6Mg => "vitamina_b6_mg",
            Self::VitaminaB12Mcg => "vitamina_b12_mcg",
            Self::VitaminaCMg => "vitamina_c_mg",
            Self::EquivalenteFolatoMcg => "equivalente_folato_mcg",
            Self::SalDeAdicaoG => "sal_de_adicao_g",
            Self::AcucarDeAdicaoG => "acucar_de_adicao_g",
        }
    }

    /// Resolve a component name to its field.
    ///
    /// Energy is the only component published in two units, so it is resolved
    /// in this order:
    /// 1. the row's own unit when it is `kJ` or `kcal`;
    /// 2. a unit-qualified name, `Energia (kJ)` / `Energia (kcal)`;
    /// 3. `payload_has_kj`: whether `kJ` occurs anywhere in the record.
    #[must_use]
    pub fn resolve(component: &str, unit: &str, payload_has_kj: bool) -> Option<Self> {
        let component = component.trim();
        if component == "Energia" {
            return Some(match energy_unit(unit) {
                Some(field) => field,
                None if payload_has_kj => Self::EnergiaKj,
                None => Self::EnergiaKcal,
            });
        }
        COMPONENT_FIELDS
            .iter()
            .find(|(name, _)| *name == component)
            .map(|(_, field)| *field)
    }
}

impl From<NutrientField> for &'static str {
    fn from(field: NutrientField) -> Self {
        field.column()
    }
}

fn energy_unit(unit: &str) -> Option<NutrientField> {
    let unit = unit.trim();
    if unit.eq_ignore_ascii_case("kj") {
        Some(NutrientField::EnergiaKj)
    } else if unit.eq_ignore_ascii_case("kcal") {
        Some(NutrientField::EnergiaKcal)
    } else {
        None
    }
}

const COMPONENT_FIELDS: &[(&str, NutrientField)] = &[
    ("Energia (kJ)", NutrientField::EnergiaKj),
    ("Energia (kcal)", NutrientField::EnergiaKcal),
    ("Umidade", NutrientField::UmidadeG),
    ("Carboidrato total", NutrientField::CarboidratoTotalG),
    ("Carboidrato disponível", NutrientField::CarboidratoDisponivelG),
    ("Proteína", NutrientField::ProteinaG),
    ("Lipídios", NutrientField::LipidiosG),
    ("Fibra alimentar", NutrientField::FibraAlimentarG),
    ("Álcool", NutrientField::AlcoolG),
    ("Cinzas", NutrientField::CinzasG),
    ("Colesterol", NutrientField::ColesterolMg),
    ("Ácidos graxos saturados", NutrientField::AcidosGraxosSaturadosG),
    ("Ácidos graxos monoinsaturados", NutrientField::AcidosGraxosMonoinsaturadosG),
    ("Ácidos graxos poliinsaturados", NutrientField::AcidosGraxosPoliinsaturadosG),
    ("Ácidos graxos trans", NutrientField::AcidosGraxosTransG),
    ("Cálcio", NutrientField::CalcioMg),
    ("Ferro", NutrientField::FerroMg),
    ("Sódio", NutrientField::SodioMg),
    ("Magnésio", NutrientField::MagnesioMg),
    ("Fósforo", NutrientField::FosforoMg),
    ("Potássio", NutrientField::PotassioMg),
    ("Manganês", NutrientField::ManganesMg),
    ("Zinco", NutrientField::ZincoMg),
    ("Cobre", NutrientField::CobreMg),
    ("Selênio", NutrientField::SelenioMcg),
    ("Vitamina A (RE)", NutrientField::VitaminaAReMcg),
    ("Vitamina A (RAE)", NutrientField::VitaminaARaeMcg),
    ("Vitamina D", NutrientField::VitaminaDMcg),
    ("Alfa-tocoferol (Vitamina E)", NutrientField::AlfaTocoferolMg),
    ("Tiamina", NutrientField::TiaminaMg),
    ("Riboflavina", NutrientField::RiboflavinaMg),
    ("Niacina", NutrientField::NiacinaMg),
    ("Vitamina B6", NutrientField::VitaminaB6Mg),
    ("Vitamina B12", NutrientField::VitaminaB12Mcg),
    ("Vitamina C", NutrientField::VitaminaCMg),
    ("Equivalente de folato", NutrientField::EquivalenteFolatoMcg),
    ("Sal de adição", NutrientField::SalDeAdicaoG),
    ("Açúcar de adição", NutrientField::AcucarDeAdicaoG),
];

/// Reference catalog seeded into the `nutrients` table.
pub const NUTRIENT_CATALOG: [NutrientReference; 38] = [
    reference("Energia", "kJ", "Energy"),
    reference("Energia", "kcal", "Energy"),
    reference("Umidade", "g", "Basic"),
    reference("Carboidrato total", "g", "Macronutrient"),
    reference("Carboidrato disponível", "g", "Macronutrient"),
    reference("Proteína", "g", "Macronutrient"),
    reference("Lipídios", "g", "Macronutrient"),
    reference("Fibra alimentar", "g", "Macronutrient"),
    reference("Álcool", "g", "Other"),
    reference("Cinzas", "g", "Other"),
    reference("Colesterol", "mg", "Lipid"),
    reference("Ácidos graxos saturados", "g", "Lipid"),
    reference("Ácidos graxos monoinsaturados", "g", "Lipid"),
    reference("Ácidos graxos poliinsaturados", "g", "Lipid"),
    reference("Ácidos graxos trans", "g", "Lipid"),
    reference("Cálcio", "mg", "Mineral"),
    reference("Ferro", "mg", "Mineral"),
    reference("Sódio", "mg", "Mineral"),
    reference("Magnésio", "mg", "Mineral"),
    reference("Fósforo", "mg", "Mineral"),
    reference("Potássio", "mg", "Mineral"),
    reference("Manganês", "mg", "Mineral"),
    reference("Zinco", "mg", "Mineral"),
    reference("Cobre", "mg", "Mineral"),
    reference("Selênio", "mcg", "Mineral"),
    reference("Vitamina A (RE)", "mcg", "Vitamin"),
    reference("Vitamina A (RAE)", "mcg", "Vitamin"),
    reference("Vitamina D", "mcg", "Vitamin"),
    reference("Alfa-tocoferol (Vitamina E)", "mg", "Vitamin"),
    reference("Tiamina", "mg", "Vitamin"),
    reference("Riboflavina", "mg", "Vitamin"),
    reference("Niacina", "mg", "Vitamin"),
    reference("Vitamina B6", "mg", "Vitamin"),
    reference("Vitamina B12", "mcg", "Vitamin"),
    reference("Vitamina C", "mg", "Vitamin"),
    reference("Equivalente de folato", "mcg", "Vitamin"),
    reference("Sal de adição", "g", "Other"),
    reference("Açúcar de adição", "g", "Other"),
];

const fn reference(
    name: &'static str,
    unit: &'static str,
    category: &'static str,
) -> NutrientReference {
    NutrientReference {
        name,
        unit,
        category,
    }
}

/// Wide-table values for one variation. Only mapped fields are present; a
/// present field may still be `None` when its value was `NA` or unparsable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WideNutrients {
    values: BTreeMap<NutrientField, Option<f64>>,
}

impl WideNutrients {
    pub fn set(&mut self, field: NutrientField, value: Option<f64>) {
        self.values.insert(field, value);
    }

    /// `None` if the field was never mapped, `Some(None)` if it was mapped to null.
    #[must_use]
    pub fn get(&self, field: NutrientField) -> Option<Option<f64>> {
        self.values.get(&field).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NutrientField, Option<f64>)> + '_ {
        self.values.iter().map(|(f, v)| (*f, *v))
    }
}

/// Builds the wide row for a record, one triple at a time.
pub struct NutrientMapper {
    payload_has_kj: bool,
    values: WideNutrients,
}

impl NutrientMapper {
    #[must_use]
    pub fn for_payload(entries: &[NutrientEntry]) -> Self {
        Self {
            payload_has_kj: payload_mentions_kj(entries),
            values: WideNutrients::default(),
        }
    }

    /// Record one (already truncated) triple. Returns the field it landed in,
    /// or `None` if the component is not part of the wide schema.
    pub fn add(&mut self, entry: &NutrientEntry) -> Option<NutrientField> {
        let field = NutrientField::resolve(&entry.component, &entry.unit, self.payload_has_kj)?;
        self.values.set(field, parse_nutrient_value(&entry.value));
        Some(field)
    }

    #[must_use]
    pub fn finish(self) -> WideNutrients {
        self.values
    }
}

/// Map a whole nutrient payload in one go.
#[must_use]
pub fn map_nutrients(entries: &[NutrientEntry]) -> WideNutrients {
    let mut mapper = NutrientMapper::for_payload(entries);
    for entry in entries {
        mapper.add(&truncate_entry(entry));
    }
    mapper.finish()
}

fn payload_mentions_kj(entries: &[NutrientEntry]) -> bool {
    entries
        .iter()
        .any(|e| e.component.contains("kJ") || e.unit.contains("kJ") || e.value.contains("kJ"))
}

/// Parse a table value such as `"12,5"`. Empty strings, `NA` and anything that
/// is not a finite number become `None`.
#[must_use]
pub fn parse_nutrient_value(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "NA" {
        return None;
    }
    raw.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Clamp a triple to the column widths of the narrow table.
#[must_use]
pub fn truncate_entry(entry: &NutrientEntry) -> NutrientEntry {
    NutrientEntry {
        component: truncate_chars(&entry.component, MAX_COMPONENT_CHARS).to_string(),
        unit: truncate_chars(&entry.unit, MAX_UNIT_CHARS).to_string(),
        value: truncate_chars(&entry.value, MAX_VALUE_CHARS).to_string(),
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
