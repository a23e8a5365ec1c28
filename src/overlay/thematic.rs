use crate::config::ThematicConfig;
use crate::utils::format::{feature_details, FeatureDetails};
use crate::widget::{LayerPaint, LayerSpec, MapWidget, PaintValue, WidgetEvent};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// The fixed, vendor-hosted thematic overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThematicKind {
    /// Urban-inequality index per city block (fill + outline).
    Desigualdad,
    /// National road network (line).
    Vial,
    /// Building footprints extruded by height.
    Edificios,
}

impl ThematicKind {
    pub const ALL: [ThematicKind; 3] = [
        ThematicKind::Desigualdad,
        ThematicKind::Vial,
        ThematicKind::Edificios,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ThematicKind::Desigualdad => "Índice de desigualdad",
            ThematicKind::Vial => "Información vial",
            ThematicKind::Edificios => "Edificios 3D",
        }
    }

    pub fn tileset_url(&self) -> &'static str {
        match self {
            ThematicKind::Desigualdad => "mapbox://daffi.7mlmdiqo",
            ThematicKind::Vial => "mapbox://daffi.ah2lqp8o",
            ThematicKind::Edificios => "mapbox://mapbox.mapbox-streets-v8",
        }
    }

    pub fn source_id(&self) -> &'static str {
        match self {
            ThematicKind::Desigualdad => "desigualdad-source",
            ThematicKind::Vial => "vial-source",
            ThematicKind::Edificios => "edificios-source",
        }
    }

    /// The primary (interactive) layer id.
    pub fn layer_id(&self) -> &'static str {
        match self {
            ThematicKind::Desigualdad => "desigualdad-layer",
            ThematicKind::Vial => "vial-layer",
            ThematicKind::Edificios => "edificios-layer",
        }
    }

    /// Every layer id this overlay creates, outline first.
    pub fn layer_ids(&self) -> Vec<String> {
        match self {
            ThematicKind::Desigualdad => vec![
                "desigualdad-layer-outline".to_string(),
                "desigualdad-layer".to_string(),
            ],
            other => vec![other.layer_id().to_string()],
        }
    }

    /// Whether clicks and hover feedback apply to this overlay.
    fn interactive(&self) -> bool {
        !matches!(self, ThematicKind::Edificios)
    }
}

/// Toggles the fixed thematic overlays on and off.
///
/// Vector-tile sources cannot report their sub-layers synchronously, so when
/// a source was just added the layer creation is parked until the source's
/// `sourcedata` event fires, once. Hover and click react only to layers this
/// manager owns while they are active.
pub struct ThematicManager {
    config: ThematicConfig,
    active: HashSet<ThematicKind>,
    /// Source ids whose layer creation waits for the source to load.
    waiting: HashMap<String, ThematicKind>,
}

impl ThematicManager {
    pub fn new(config: ThematicConfig) -> Self {
        ThematicManager {
            config,
            active: HashSet::new(),
            waiting: HashMap::new(),
        }
    }

    pub fn is_active(&self, kind: ThematicKind) -> bool {
        self.active.contains(&kind)
    }

    pub fn toggle(&mut self, widget: &mut dyn MapWidget, kind: ThematicKind, show: bool) {
        if show == self.active.contains(&kind) {
            return;
        }
        if show {
            self.enable(widget, kind);
        } else {
            self.disable(widget, kind);
        }
    }

    /// Feed a widget event through. `sourcedata` completes deferred layer
    /// creation; hover toggles the pointer cursor; a click on an owned layer
    /// yields display-ready feature details.
    pub fn handle_event(
        &mut self,
        widget: &mut dyn MapWidget,
        event: &WidgetEvent,
    ) -> Option<FeatureDetails> {
        match event {
            WidgetEvent::SourceData {
                source_id,
                is_loaded: true,
            } => {
                if let Some(kind) = self.waiting.remove(source_id) {
                    if self.active.contains(&kind) {
                        self.add_layers(widget, kind);
                    }
                }
                None
            }
            WidgetEvent::MouseEnter { layer_id } => {
                if self.owns_interactive(layer_id) {
                    widget.set_cursor(Some("pointer"));
                }
                None
            }
            WidgetEvent::MouseLeave { layer_id } => {
                if self.owns_interactive(layer_id) {
                    widget.set_cursor(None);
                }
                None
            }
            WidgetEvent::Click {
                layer_id,
                properties,
            } => {
                if self.owns_interactive(layer_id) {
                    Some(feature_details(properties))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Remove everything this manager put on the widget.
    pub fn dispose(&mut self, widget: &mut dyn MapWidget) {
        let active: Vec<ThematicKind> = self.active.iter().copied().collect();
        for kind in active {
            self.disable(widget, kind);
        }
        self.waiting.clear();
    }

    fn owns_interactive(&self, layer_id: &str) -> bool {
        self.active
            .iter()
            .any(|k| k.interactive() && k.layer_id() == layer_id)
    }

    fn enable(&mut self, widget: &mut dyn MapWidget, kind: ThematicKind) {
        let source_id = kind.source_id();
        if !widget.has_source(source_id) {
            if let Err(e) = widget.add_vector_source(source_id, kind.tileset_url()) {
                warn!(source = source_id, error = %e, "failed to add thematic source");
                return;
            }
        }
        self.active.insert(kind);
        if widget.is_source_loaded(source_id) {
            self.add_layers(widget, kind);
        } else {
            self.waiting.insert(source_id.to_string(), kind);
        }
    }

    fn disable(&mut self, widget: &mut dyn MapWidget, kind: ThematicKind) {
        self.active.remove(&kind);
        self.waiting.remove(kind.source_id());
        for layer_id in kind.layer_ids() {
            if widget.has_layer(&layer_id) {
                if let Err(e) = widget.remove_layer(&layer_id) {
                    warn!(layer = %layer_id, error = %e, "failed to remove thematic layer");
                }
            }
        }
        if widget.has_source(kind.source_id()) {
            if let Err(e) = widget.remove_source(kind.source_id()) {
                warn!(source = kind.source_id(), error = %e, "failed to remove thematic source");
            }
        }
    }

    fn add_layers(&self, widget: &mut dyn MapWidget, kind: ThematicKind) {
        if widget.has_layer(kind.layer_id()) {
            return;
        }
        for spec in self.layer_specs(widget, kind) {
            let id = spec.id.clone();
            if let Err(e) = widget.add_layer(spec) {
                warn!(layer = %id, error = %e, "failed to add thematic layer");
            }
        }
    }

    fn layer_specs(&self, widget: &dyn MapWidget, kind: ThematicKind) -> Vec<LayerSpec> {
        match kind {
            ThematicKind::Desigualdad => {
                let source_layer = Some(self.config.desigualdad_source_layer.clone());
                let grades = ["Muy alto", "Alto", "Medio", "Bajo", "Muy bajo"];
                let mut colour_arms: Vec<(String, serde_json::Value)> = grades
                    .iter()
                    .map(|g| (g.to_string(), json!("#dc2626")))
                    .collect();
                colour_arms.push(("S/P".to_string(), json!("#cccccc")));
                // opacity tracks the severity of the index
                let opacities = [0.8, 0.6, 0.4, 0.3, 0.2];
                let mut opacity_arms: Vec<(String, serde_json::Value)> = grades
                    .iter()
                    .zip(opacities)
                    .map(|(g, o)| (g.to_string(), json!(o)))
                    .collect();
                opacity_arms.push(("S/P".to_string(), json!(0.1)));
                vec![
                    LayerSpec {
                        id: kind.layer_id().to_string(),
                        source: kind.source_id().to_string(),
                        source_layer: source_layer.clone(),
                        before_id: None,
                        paint: LayerPaint::Fill {
                            colour: PaintValue::Match {
                                property: "iisu_sun".to_string(),
                                arms: colour_arms,
                                fallback: json!("#999999"),
                            },
                            opacity: PaintValue::Match {
                                property: "iisu_sun".to_string(),
                                arms: opacity_arms,
                                fallback: json!(0.2),
                            },
                        },
                    },
                    LayerSpec {
                        id: "desigualdad-layer-outline".to_string(),
                        source: kind.source_id().to_string(),
                        source_layer,
                        before_id: None,
                        paint: LayerPaint::Line {
                            colour: "#ffffff".into(),
                            width: 1.0.into(),
                            opacity: 0.5.into(),
                        },
                    },
                ]
            }
            ThematicKind::Vial => {
                // Slot the road network beneath the inequality fill when
                // that overlay is already up.
                let before_id = if widget.has_layer(ThematicKind::Desigualdad.layer_id()) {
                    Some(ThematicKind::Desigualdad.layer_id().to_string())
                } else {
                    None
                };
                vec![LayerSpec {
                    id: kind.layer_id().to_string(),
                    source: kind.source_id().to_string(),
                    source_layer: Some(self.config.vial_source_layer.clone()),
                    before_id,
                    paint: LayerPaint::Line {
                        colour: "#fbbf24".into(),
                        width: 2.5.into(),
                        opacity: 0.9.into(),
                    },
                }]
            }
            ThematicKind::Edificios => vec![LayerSpec {
                id: kind.layer_id().to_string(),
                source: kind.source_id().to_string(),
                source_layer: Some(self.config.edificios_source_layer.clone()),
                before_id: None,
                paint: LayerPaint::FillExtrusion {
                    colour: "#94a3b8".into(),
                    height: PaintValue::Get("height".to_string()),
                    base: PaintValue::Get("min_height".to_string()),
                    opacity: 0.6.into(),
                },
            }],
        }
    }
}
