//! Turns a clicked feature's raw property bag into display-ready rows.

use serde_json::{Map, Value};

/// What kind of record a property bag describes. Decided once at ingestion,
/// not re-inferred per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Road-network record from the vial tileset.
    Road,
    /// Demographic / inequality-index record per city block.
    Inequality,
}

impl RecordKind {
    pub fn classify(properties: &Map<String, Value>) -> RecordKind {
        if properties.contains_key("TIPO_VIAL") {
            RecordKind::Road
        } else {
            RecordKind::Inequality
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailRow {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailSection {
    pub title: &'static str,
    pub rows: Vec<DetailRow>,
}

/// Display-ready detail sheet for one clicked feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDetails {
    pub kind: RecordKind,
    pub title: String,
    pub sections: Vec<DetailSection>,
}

const PRIORITY_FIELDS: [&str; 5] = ["sun", "iisu_sun", "iisu_cd", "gmu", "Pob_2010"];
const ACCESS_FIELDS: [&str; 10] = [
    "Empleo",
    "E_basica",
    "E_media",
    "E_superior",
    "Salud_cama",
    "Salud_cons",
    "Abasto",
    "Espacio_ab",
    "Cultura",
    "Est_Tpte",
];
const VIAL_MAIN_FIELDS: [&str; 5] = ["NOMBRE", "TIPO_VIAL", "ADMINISTRA", "CONDICION", "COND_PAV"];
const VIAL_DETAIL_FIELDS: [&str; 7] = [
    "ANCHO",
    "CARRILES",
    "VELOCIDAD",
    "LONG_KM",
    "RECUBRI",
    "CIRCULA",
    "PEAJE",
];

/// Keys rendered with thousands separators.
const GROUPED_KEYS: [&str; 3] = ["Empleo", "Espacio_ab", "Pob_2010"];
/// Index keys rendered as a percentage with one decimal.
const PERCENT_KEYS: [&str; 2] = ["iisu_sun", "iisu_cd"];
/// Measurement keys rendered with two fixed decimals.
const FIXED_KEYS: [&str; 2] = ["LONG_KM", "ANCHO"];

pub fn field_label(key: &str) -> &str {
    match key {
        "sun" => "Ciudad",
        "cvegeo" => "Clave Manzana",
        "gmu" => "Grado de Marginación",
        "iisu_sun" => "IISU Nacional",
        "iisu_cd" => "IISU Ciudad",
        "Pob_2010" => "Población 2010",
        "Empleo" => "Empleos (30 min)",
        "E_basica" => "Escuelas Básicas (15 min)",
        "E_media" => "Escuelas Media Superior (30 min)",
        "E_superior" => "Escuelas Superior (30 min)",
        "Salud_cama" => "Camas Salud Pública (30 min)",
        "Salud_cons" => "Consultorios Públicos (30 min)",
        "Abasto" => "Unidades de Abasto (20 min)",
        "Espacio_ab" => "m² Espacio Abierto (20 min)",
        "Cultura" => "Instalaciones Culturales (20 min)",
        "Est_Tpte" => "Estaciones Transporte (15 min)",
        "NOMBRE" => "Nombre de la vía",
        "TIPO_VIAL" => "Tipo de vía",
        "ADMINISTRA" => "Administración",
        "JURISDI" => "Jurisdicción",
        "CONDICION" => "Condición",
        "COND_PAV" => "Condición del pavimento",
        "RECUBRI" => "Recubrimiento",
        "CALIREPR" => "Calidad representativa",
        "ANCHO" => "Ancho (m)",
        "CARRILES" => "Carriles",
        "VELOCIDAD" => "Velocidad",
        "LONG_KM" => "Longitud (km)",
        "PEAJE" => "Peaje",
        "CIRCULA" => "Circulación",
        "NOMGEO" => "Nombre geográfico",
        other => other,
    }
}

/// Format one property for display. Null, missing and empty values become
/// `N/A`; numeric formatting depends on the key; anything unparseable is
/// shown as-is (index fields carry grade strings like "Muy alto" in some
/// vintages of the data).
pub fn format_value(key: &str, value: Option<&Value>) -> String {
    let raw = match value.and_then(value_text) {
        Some(raw) => raw,
        None => return "N/A".to_string(),
    };
    if GROUPED_KEYS.contains(&key) {
        if let Ok(v) = raw.parse::<f64>() {
            return group_thousands(v);
        }
    }
    if PERCENT_KEYS.contains(&key) {
        if let Ok(v) = raw.parse::<f64>() {
            return format!("{:.1}%", v * 100.0);
        }
    }
    if FIXED_KEYS.contains(&key) {
        if let Ok(v) = raw.parse::<f64>() {
            return format!("{:.2}", v);
        }
    }
    raw
}

/// Build the full detail sheet for a clicked feature.
pub fn feature_details(properties: &Map<String, Value>) -> FeatureDetails {
    let kind = RecordKind::classify(properties);
    match kind {
        RecordKind::Road => FeatureDetails {
            kind,
            title: text_or(properties, "NOMBRE", "Información Vial"),
            sections: build_sections(
                properties,
                &[
                    ("Información Principal", &VIAL_MAIN_FIELDS, false),
                    ("Características", &VIAL_DETAIL_FIELDS, false),
                ],
            ),
        },
        RecordKind::Inequality => FeatureDetails {
            kind,
            title: text_or(properties, "sun", "Información del Área"),
            sections: build_sections(
                properties,
                &[
                    ("Información General", &PRIORITY_FIELDS, false),
                    // zero counts carry no information in the access section
                    ("Accesibilidad a Servicios", &ACCESS_FIELDS, true),
                ],
            ),
        },
    }
}

fn build_sections(
    properties: &Map<String, Value>,
    layout: &[(&'static str, &[&str], bool)],
) -> Vec<DetailSection> {
    let mut sections = Vec::new();
    for (title, fields, skip_zero) in layout {
        let rows: Vec<DetailRow> = fields
            .iter()
            .filter_map(|key| {
                let value = present(properties, key)?;
                if *skip_zero && is_zero(value) {
                    return None;
                }
                Some(DetailRow {
                    label: field_label(key).to_string(),
                    value: format_value(key, Some(value)),
                })
            })
            .collect();
        if !rows.is_empty() {
            sections.push(DetailSection { title, rows });
        }
    }
    sections
}

/// The property if it exists and is neither null nor an empty string.
fn present<'a>(properties: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    match properties.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(v) => Some(v),
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::String(s) => s == "0",
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn text_or(properties: &Map<String, Value>, key: &str, fallback: &str) -> String {
    present(properties, key)
        .and_then(value_text)
        .unwrap_or_else(|| fallback.to_string())
}

fn group_thousands(v: f64) -> String {
    let negative = v.is_sign_negative();
    let abs = v.abs();
    let int_part = abs.trunc() as u64;

    let digits = int_part.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let frac = abs - int_part as f64;
    if frac > 1e-9 {
        let frac_str = format!("{:.3}", frac);
        let trimmed = frac_str[1..].trim_end_matches('0');
        if trimmed.len() > 1 {
            grouped.push_str(trimmed);
        }
    }

    if negative {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
