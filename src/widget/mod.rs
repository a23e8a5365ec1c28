use geojson::{Feature, FeatureCollection};
use serde_json::{Map, Value};

pub mod headless;

pub use headless::HeadlessWidget;

/// Interaction mode of the widget's drawing control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    SimpleSelect,
    DrawPolygon,
}

/// A paint property value: either a constant, a data-driven match over a
/// feature property, or the raw property value itself.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintValue {
    Constant(Value),
    Match {
        property: String,
        arms: Vec<(String, Value)>,
        fallback: Value,
    },
    Get(String),
}

impl From<&str> for PaintValue {
    fn from(s: &str) -> Self {
        PaintValue::Constant(Value::String(s.to_string()))
    }
}

impl From<f64> for PaintValue {
    fn from(v: f64) -> Self {
        PaintValue::Constant(serde_json::json!(v))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerPaint {
    Fill {
        colour: PaintValue,
        opacity: PaintValue,
    },
    Line {
        colour: PaintValue,
        width: PaintValue,
        opacity: PaintValue,
    },
    FillExtrusion {
        colour: PaintValue,
        height: PaintValue,
        base: PaintValue,
        opacity: PaintValue,
    },
}

/// Everything the widget needs to create one paint layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    /// Sub-layer inside a vector-tile source. `None` for geojson sources.
    pub source_layer: Option<String>,
    /// Insert beneath this existing layer instead of on top of the stack.
    pub before_id: Option<String>,
    pub paint: LayerPaint,
}

/// Events flowing back out of the widget. Components consume these by value;
/// there are no listener registrations to leak or to unregister with the
/// wrong closure instance.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    StyleLoaded,
    SourceData {
        source_id: String,
        is_loaded: bool,
    },
    Click {
        layer_id: String,
        properties: Map<String, Value>,
    },
    MouseEnter {
        layer_id: String,
    },
    MouseLeave {
        layer_id: String,
    },
    DrawCreate {
        features: Vec<Feature>,
    },
    DrawUpdate {
        features: Vec<Feature>,
    },
    DrawDelete {
        features: Vec<Feature>,
    },
}

/// Capability interface of the embedded interactive map. The real rendering
/// engine lives outside this crate; everything here is the narrow surface
/// the overlay reconciler, the thematic manager and the drawing session
/// actually touch. Every mutating call is fast and synchronous.
pub trait MapWidget {
    fn is_style_loaded(&self) -> bool;

    fn add_geojson_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), String>;
    fn add_vector_source(&mut self, id: &str, url: &str) -> Result<(), String>;
    /// Replace a geojson source's data in place, preserving the layers that
    /// reference it and their z-order.
    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), String>;
    fn remove_source(&mut self, id: &str) -> Result<(), String>;
    fn has_source(&self, id: &str) -> bool;
    fn is_source_loaded(&self, id: &str) -> bool;

    fn add_layer(&mut self, spec: LayerSpec) -> Result<(), String>;
    fn remove_layer(&mut self, id: &str) -> Result<(), String>;
    fn has_layer(&self, id: &str) -> bool;

    fn install_draw_control(&mut self) -> Result<(), String>;
    fn remove_draw_control(&mut self) -> Result<(), String>;
    fn has_draw_control(&self) -> bool;
    fn set_draw_mode(&mut self, mode: DrawMode) -> Result<(), String>;
    /// The widget's authoritative set of drawn features.
    fn drawn_features(&self) -> Vec<Feature>;
    fn delete_all_drawn(&mut self) -> Result<(), String>;

    fn set_cursor(&mut self, cursor: Option<&str>);
    fn jump_to(&mut self, center: (f64, f64), zoom: f64);
}
