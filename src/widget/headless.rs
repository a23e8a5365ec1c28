use super::{DrawMode, LayerSpec, MapWidget, WidgetEvent};
use geojson::feature::Id;
use geojson::{Feature, FeatureCollection};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};

/// One imperative call recorded by the headless widget, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetOp {
    AddSource(String),
    RemoveSource(String),
    SetSourceData(String),
    AddLayer(String),
    RemoveLayer(String),
    InstallDrawControl,
    RemoveDrawControl,
    SetDrawMode(DrawMode),
    DeleteAllDrawn,
}

#[derive(Debug, Clone)]
enum SourceKind {
    GeoJson(FeatureCollection),
    Vector { url: String },
}

#[derive(Debug, Clone)]
struct SourceState {
    kind: SourceKind,
    loaded: bool,
}

/// In-memory [`MapWidget`] implementation.
///
/// Models exactly the stateful behaviour the components depend on: named
/// sources, ordered paint layers, a drawing control with its own feature
/// store, and lifecycle events. Every mutating call lands in an op log so
/// callers can assert how many imperative operations a pass produced.
pub struct HeadlessWidget {
    style_loaded: bool,
    sources: HashMap<String, SourceState>,
    layers: Vec<LayerSpec>,
    draw_installed: bool,
    draw_mode: DrawMode,
    drawn: Vec<Feature>,
    next_draw_id: u64,
    cursor: Option<String>,
    camera: ((f64, f64), f64),
    events: VecDeque<WidgetEvent>,
    ops: Vec<WidgetOp>,
    fail_layers: HashSet<String>,
}

impl HeadlessWidget {
    pub fn new() -> Self {
        HeadlessWidget {
            style_loaded: false,
            sources: HashMap::new(),
            layers: Vec::new(),
            draw_installed: false,
            draw_mode: DrawMode::SimpleSelect,
            drawn: Vec::new(),
            next_draw_id: 1,
            cursor: None,
            camera: ((0.0, 0.0), 0.0),
            events: VecDeque::new(),
            ops: Vec::new(),
            fail_layers: HashSet::new(),
        }
    }

    /// Widget with its style already loaded, the common case in tests.
    pub fn loaded() -> Self {
        let mut w = Self::new();
        w.style_loaded = true;
        w
    }

    /// Finish the style load and queue the corresponding event.
    pub fn finish_style_load(&mut self) {
        self.style_loaded = true;
        self.events.push_back(WidgetEvent::StyleLoaded);
    }

    /// Mark a source as loaded and queue its `sourcedata` event.
    pub fn finish_source_load(&mut self, id: &str) {
        if let Some(state) = self.sources.get_mut(id) {
            state.loaded = true;
            self.events.push_back(WidgetEvent::SourceData {
                source_id: id.to_string(),
                is_loaded: true,
            });
        }
    }

    pub fn poll_event(&mut self) -> Option<WidgetEvent> {
        self.events.pop_front()
    }

    pub fn ops(&self) -> &[WidgetOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn source_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sources.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Layer ids in z-order, bottom first.
    pub fn layer_ids(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.id.clone()).collect()
    }

    pub fn layer_spec(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn source_data(&self, id: &str) -> Option<&FeatureCollection> {
        match self.sources.get(id) {
            Some(SourceState {
                kind: SourceKind::GeoJson(fc),
                ..
            }) => Some(fc),
            _ => None,
        }
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn camera(&self) -> ((f64, f64), f64) {
        self.camera
    }

    pub fn draw_mode(&self) -> DrawMode {
        self.draw_mode
    }

    /// Make the next `add_layer` for this id fail, to exercise the
    /// per-operation failure policy.
    pub fn fail_layer(&mut self, id: &str) {
        self.fail_layers.insert(id.to_string());
    }

    /// Simulate the user finishing a polygon in draw mode. Assigns the
    /// widget-internal feature id, leaves draw mode and queues `draw.create`.
    pub fn simulate_draw_create(&mut self, mut feature: Feature) -> Feature {
        feature.id = Some(Id::String(format!("draw-{}", self.next_draw_id)));
        self.next_draw_id += 1;
        self.drawn.push(feature.clone());
        self.draw_mode = DrawMode::SimpleSelect;
        self.events.push_back(WidgetEvent::DrawCreate {
            features: vec![feature.clone()],
        });
        feature
    }

    /// Simulate the user editing an existing drawn feature.
    pub fn simulate_draw_update(&mut self, feature: Feature) {
        if let Some(slot) = self.drawn.iter_mut().find(|f| f.id == feature.id) {
            *slot = feature.clone();
            self.events.push_back(WidgetEvent::DrawUpdate {
                features: vec![feature],
            });
        }
    }

    /// Simulate the user deleting a drawn feature via the trash control.
    pub fn simulate_draw_delete(&mut self, id: &Id) {
        if let Some(pos) = self.drawn.iter().position(|f| f.id.as_ref() == Some(id)) {
            let removed = self.drawn.remove(pos);
            self.events.push_back(WidgetEvent::DrawDelete {
                features: vec![removed],
            });
        }
    }

    /// Simulate a click that hit a feature of the given layer.
    pub fn simulate_click(&mut self, layer_id: &str, properties: Map<String, Value>) {
        if self.has_layer(layer_id) {
            self.events.push_back(WidgetEvent::Click {
                layer_id: layer_id.to_string(),
                properties,
            });
        }
    }

    pub fn simulate_mouse_enter(&mut self, layer_id: &str) {
        if self.has_layer(layer_id) {
            self.events.push_back(WidgetEvent::MouseEnter {
                layer_id: layer_id.to_string(),
            });
        }
    }

    pub fn simulate_mouse_leave(&mut self, layer_id: &str) {
        self.events.push_back(WidgetEvent::MouseLeave {
            layer_id: layer_id.to_string(),
        });
    }
}

impl Default for HeadlessWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl MapWidget for HeadlessWidget {
    fn is_style_loaded(&self) -> bool {
        self.style_loaded
    }

    fn add_geojson_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), String> {
        if self.sources.contains_key(id) {
            return Err(format!("source '{}' already exists", id));
        }
        self.ops.push(WidgetOp::AddSource(id.to_string()));
        self.sources.insert(
            id.to_string(),
            SourceState {
                kind: SourceKind::GeoJson(data),
                // geojson data is available synchronously
                loaded: true,
            },
        );
        Ok(())
    }

    fn add_vector_source(&mut self, id: &str, url: &str) -> Result<(), String> {
        if self.sources.contains_key(id) {
            return Err(format!("source '{}' already exists", id));
        }
        self.ops.push(WidgetOp::AddSource(id.to_string()));
        self.sources.insert(
            id.to_string(),
            SourceState {
                kind: SourceKind::Vector {
                    url: url.to_string(),
                },
                // tiles arrive asynchronously; see finish_source_load
                loaded: false,
            },
        );
        Ok(())
    }

    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), String> {
        match self.sources.get_mut(id) {
            Some(state) => match &mut state.kind {
                SourceKind::GeoJson(fc) => {
                    self.ops.push(WidgetOp::SetSourceData(id.to_string()));
                    *fc = data;
                    Ok(())
                }
                SourceKind::Vector { .. } => {
                    Err(format!("source '{}' is not a geojson source", id))
                }
            },
            None => Err(format!("no source '{}'", id)),
        }
    }

    fn remove_source(&mut self, id: &str) -> Result<(), String> {
        if let Some(layer) = self.layers.iter().find(|l| l.source == id) {
            return Err(format!(
                "source '{}' is still used by layer '{}'",
                id, layer.id
            ));
        }
        if self.sources.remove(id).is_none() {
            return Err(format!("no source '{}'", id));
        }
        self.ops.push(WidgetOp::RemoveSource(id.to_string()));
        Ok(())
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn is_source_loaded(&self, id: &str) -> bool {
        self.sources.get(id).is_some_and(|s| s.loaded)
    }

    fn add_layer(&mut self, spec: LayerSpec) -> Result<(), String> {
        if self.fail_layers.remove(&spec.id) {
            return Err(format!("injected failure adding layer '{}'", spec.id));
        }
        if self.has_layer(&spec.id) {
            return Err(format!("layer '{}' already exists", spec.id));
        }
        if !self.sources.contains_key(&spec.source) {
            return Err(format!("layer '{}' references no source", spec.id));
        }
        let pos = match &spec.before_id {
            Some(before) => Some(
                self.layers
                    .iter()
                    .position(|l| &l.id == before)
                    .ok_or_else(|| format!("no layer '{}' to insert before", before))?,
            ),
            None => None,
        };
        self.ops.push(WidgetOp::AddLayer(spec.id.clone()));
        match pos {
            Some(pos) => self.layers.insert(pos, spec),
            None => self.layers.push(spec),
        }
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), String> {
        match self.layers.iter().position(|l| l.id == id) {
            Some(pos) => {
                self.layers.remove(pos);
                self.ops.push(WidgetOp::RemoveLayer(id.to_string()));
                Ok(())
            }
            None => Err(format!("no layer '{}'", id)),
        }
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    fn install_draw_control(&mut self) -> Result<(), String> {
        if !self.style_loaded {
            return Err("style not loaded".to_string());
        }
        if self.draw_installed {
            return Err("draw control already installed".to_string());
        }
        self.draw_installed = true;
        self.ops.push(WidgetOp::InstallDrawControl);
        Ok(())
    }

    fn remove_draw_control(&mut self) -> Result<(), String> {
        if !self.draw_installed {
            return Err("draw control not installed".to_string());
        }
        self.draw_installed = false;
        self.draw_mode = DrawMode::SimpleSelect;
        self.drawn.clear();
        self.ops.push(WidgetOp::RemoveDrawControl);
        Ok(())
    }

    fn has_draw_control(&self) -> bool {
        self.draw_installed
    }

    fn set_draw_mode(&mut self, mode: DrawMode) -> Result<(), String> {
        if !self.draw_installed {
            return Err("draw control not installed".to_string());
        }
        self.draw_mode = mode;
        self.ops.push(WidgetOp::SetDrawMode(mode));
        Ok(())
    }

    fn drawn_features(&self) -> Vec<Feature> {
        self.drawn.clone()
    }

    fn delete_all_drawn(&mut self) -> Result<(), String> {
        if !self.draw_installed {
            return Err("draw control not installed".to_string());
        }
        self.drawn.clear();
        self.ops.push(WidgetOp::DeleteAllDrawn);
        Ok(())
    }

    fn set_cursor(&mut self, cursor: Option<&str>) {
        self.cursor = cursor.map(|c| c.to_string());
    }

    fn jump_to(&mut self, center: (f64, f64), zoom: f64) {
        self.camera = (center, zoom);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::{LayerPaint, PaintValue};
    use geojson::{Geometry, Value as GeomValue};

    fn empty_fc() -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: vec![],
            foreign_members: None,
        }
    }

    fn triangle() -> Feature {
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(GeomValue::Polygon(vec![vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
                vec![0.0, 0.0],
            ]]))),
            id: None,
            properties: None,
            foreign_members: None,
        }
    }

    fn line_layer(id: &str, source: &str, before: Option<&str>) -> LayerSpec {
        LayerSpec {
            id: id.to_string(),
            source: source.to_string(),
            source_layer: None,
            before_id: before.map(|b| b.to_string()),
            paint: LayerPaint::Line {
                colour: "#ffffff".into(),
                width: 1.0.into(),
                opacity: 1.0.into(),
            },
        }
    }

    #[test]
    fn records_ops_in_call_order() {
        let mut w = HeadlessWidget::loaded();
        w.add_geojson_source("a-source", empty_fc()).unwrap();
        w.add_layer(line_layer("a-line", "a-source", None)).unwrap();
        w.remove_layer("a-line").unwrap();
        w.remove_source("a-source").unwrap();
        assert_eq!(
            w.ops(),
            &[
                WidgetOp::AddSource("a-source".to_string()),
                WidgetOp::AddLayer("a-line".to_string()),
                WidgetOp::RemoveLayer("a-line".to_string()),
                WidgetOp::RemoveSource("a-source".to_string()),
            ]
        );
    }

    #[test]
    fn refuses_to_remove_source_still_in_use() {
        let mut w = HeadlessWidget::loaded();
        w.add_geojson_source("s", empty_fc()).unwrap();
        w.add_layer(line_layer("l", "s", None)).unwrap();
        assert!(w.remove_source("s").is_err());
        w.remove_layer("l").unwrap();
        assert!(w.remove_source("s").is_ok());
    }

    #[test]
    fn before_id_inserts_beneath() {
        let mut w = HeadlessWidget::loaded();
        w.add_geojson_source("s", empty_fc()).unwrap();
        w.add_layer(line_layer("top", "s", None)).unwrap();
        w.add_layer(line_layer("under", "s", Some("top"))).unwrap();
        assert_eq!(w.layer_ids(), vec!["under", "top"]);
    }

    #[test]
    fn draw_simulation_assigns_ids_and_queues_events() {
        let mut w = HeadlessWidget::loaded();
        w.install_draw_control().unwrap();
        w.set_draw_mode(DrawMode::DrawPolygon).unwrap();
        let created = w.simulate_draw_create(triangle());
        assert!(created.id.is_some());
        assert_eq!(w.draw_mode(), DrawMode::SimpleSelect);
        assert_eq!(w.drawn_features().len(), 1);
        assert!(matches!(
            w.poll_event(),
            Some(WidgetEvent::DrawCreate { features }) if features.len() == 1
        ));
    }

    #[test]
    fn vector_source_loads_asynchronously() {
        let mut w = HeadlessWidget::loaded();
        w.add_vector_source("v", "mapbox://some.tileset").unwrap();
        assert!(!w.is_source_loaded("v"));
        w.finish_source_load("v");
        assert!(w.is_source_loaded("v"));
        assert!(matches!(
            w.poll_event(),
            Some(WidgetEvent::SourceData { is_loaded: true, .. })
        ));
    }
}
