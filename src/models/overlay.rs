use geojson::{Feature, FeatureCollection};
use std::sync::Arc;

pub const DEFAULT_FILL_COLOUR: &str = "#8b5cf6";
pub const DEFAULT_FILL_OPACITY: f64 = 0.4;
pub const DEFAULT_LINE_COLOUR: &str = "#8b5cf6";
pub const DEFAULT_LINE_WIDTH: f64 = 2.0;

/// Paint overrides for a polygon overlay. Unset fields fall back to the
/// default palette entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaintStyle {
    pub fill_colour: Option<String>,
    pub fill_opacity: Option<f64>,
    pub line_colour: Option<String>,
    pub line_width: Option<f64>,
}

impl PaintStyle {
    pub fn fill_colour(&self) -> &str {
        self.fill_colour.as_deref().unwrap_or(DEFAULT_FILL_COLOUR)
    }

    pub fn fill_opacity(&self) -> f64 {
        self.fill_opacity.unwrap_or(DEFAULT_FILL_OPACITY)
    }

    pub fn line_colour(&self) -> &str {
        self.line_colour.as_deref().unwrap_or(DEFAULT_LINE_COLOUR)
    }

    pub fn line_width(&self) -> f64 {
        self.line_width.unwrap_or(DEFAULT_LINE_WIDTH)
    }
}

/// A named, independently toggleable polygon layer to render on the map.
///
/// The `id` is the identity the reconciler works with: every widget resource
/// name is derived from it, and geometry changes under the same id are
/// applied as in-place data updates rather than resource churn. The feature
/// list is shared behind an `Arc` so an unchanged geometry is recognisable
/// by pointer identity across reconciliation passes.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub id: String,
    pub features: Arc<Vec<Feature>>,
    pub style: PaintStyle,
}

impl Overlay {
    pub fn new(id: impl Into<String>, features: Vec<Feature>) -> Self {
        Overlay {
            id: id.into(),
            features: Arc::new(features),
            style: PaintStyle::default(),
        }
    }

    pub fn with_style(mut self, style: PaintStyle) -> Self {
        self.style = style;
        self
    }

    pub fn source_id(&self) -> String {
        format!("{}-source", self.id)
    }

    pub fn fill_layer_id(&self) -> String {
        format!("{}-fill", self.id)
    }

    pub fn line_layer_id(&self) -> String {
        format!("{}-line", self.id)
    }

    pub fn feature_collection(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.features.as_ref().clone(),
            foreign_members: None,
        }
    }
}
