use crate::models::overlay::PaintStyle;
use geojson::Feature;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed enumeration of layer categories a capa can be stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapaKind {
    Pob,
    Vivienda,
    Transport,
    Green,
    Expansion,
}

impl CapaKind {
    pub const ALL: [CapaKind; 5] = [
        CapaKind::Pob,
        CapaKind::Vivienda,
        CapaKind::Transport,
        CapaKind::Green,
        CapaKind::Expansion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapaKind::Pob => "pob",
            CapaKind::Vivienda => "vivienda",
            CapaKind::Transport => "transport",
            CapaKind::Green => "green",
            CapaKind::Expansion => "expansion",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CapaKind::Pob => "Población",
            CapaKind::Vivienda => "Vivienda",
            CapaKind::Transport => "Transporte",
            CapaKind::Green => "Áreas Verdes",
            CapaKind::Expansion => "Expansión Urbana",
        }
    }

    pub fn colour(&self) -> &'static str {
        match self {
            CapaKind::Pob => "#8b5cf6",
            CapaKind::Vivienda => "#10b981",
            CapaKind::Transport => "#3b82f6",
            CapaKind::Green => "#22c55e",
            CapaKind::Expansion => "#f59e0b",
        }
    }

    pub fn opacity(&self) -> f64 {
        0.4
    }

    /// Palette entry for overlays of this kind. Line colour follows the fill.
    pub fn paint(&self) -> PaintStyle {
        PaintStyle {
            fill_colour: Some(self.colour().to_string()),
            fill_opacity: Some(self.opacity()),
            line_colour: Some(self.colour().to_string()),
            line_width: None,
        }
    }
}

impl fmt::Display for CapaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pob" => Ok(CapaKind::Pob),
            "vivienda" => Ok(CapaKind::Vivienda),
            "transport" => Ok(CapaKind::Transport),
            "green" => Ok(CapaKind::Green),
            "expansion" => Ok(CapaKind::Expansion),
            other => Err(format!("unknown capa kind: {}", other)),
        }
    }
}

/// Capa record as the persistence service returns it. The `json` field is a
/// JSON-encoded array of GeoJSON features, kept as an opaque string until
/// [`CapaParsed::from_dto`] runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapaDto {
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub json: String,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveCapaRequest {
    #[serde(rename = "type")]
    pub kind: String,
    /// JSON-encoded array of features, matching the stored `json` column.
    pub features: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveCapaResponse {
    pub id: i64,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Capa with its geometry decoded and its kind resolved, ready to render.
#[derive(Debug, Clone)]
pub struct CapaParsed {
    pub id: i64,
    pub kind: CapaKind,
    pub features: Vec<Feature>,
    pub created_at: Option<String>,
}

/// Why a single persisted record could not be decoded.
#[derive(Debug)]
pub enum ParseCapaError {
    MissingId,
    UnknownKind { id: i64, kind: String },
    Geometry { id: i64, source: serde_json::Error },
}

impl fmt::Display for ParseCapaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCapaError::MissingId => write!(f, "capa record has no id"),
            ParseCapaError::UnknownKind { id, kind } => {
                write!(f, "capa {} has unknown kind '{}'", id, kind)
            }
            ParseCapaError::Geometry { id, source } => {
                write!(f, "capa {} has malformed geometry: {}", id, source)
            }
        }
    }
}

impl std::error::Error for ParseCapaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseCapaError::Geometry { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl CapaParsed {
    pub fn from_dto(dto: &CapaDto) -> Result<CapaParsed, ParseCapaError> {
        let id = dto.id.ok_or(ParseCapaError::MissingId)?;
        let kind = dto.kind.parse().map_err(|_| ParseCapaError::UnknownKind {
            id,
            kind: dto.kind.clone(),
        })?;
        let features: Vec<Feature> = serde_json::from_str(&dto.json)
            .map_err(|source| ParseCapaError::Geometry { id, source })?;
        Ok(CapaParsed {
            id,
            kind,
            features,
            created_at: dto.created_at.clone(),
        })
    }
}

/// Decode a batch of records independently. One malformed record does not
/// poison the rest: successes and per-record failures come back side by side.
pub fn parse_batch(dtos: &[CapaDto]) -> (Vec<CapaParsed>, Vec<ParseCapaError>) {
    let mut parsed = Vec::with_capacity(dtos.len());
    let mut failures = Vec::new();
    for dto in dtos {
        match CapaParsed::from_dto(dto) {
            Ok(capa) => parsed.push(capa),
            Err(e) => failures.push(e),
        }
    }
    (parsed, failures)
}
