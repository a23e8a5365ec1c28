use crate::models::overlay::Overlay;
use crate::widget::{LayerPaint, LayerSpec, MapWidget, WidgetEvent};
use geojson::Feature;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Converges the widget's live overlay resources to a desired overlay list.
///
/// The reconciler privately tracks which overlay ids it has created on the
/// widget (and the feature list each one currently carries, so an unchanged
/// list is recognised by pointer identity and produces no widget calls at
/// all). Per-operation widget failures are logged and never abort a pass;
/// an overlay either ends up fully present (source, fill and line) or
/// absent.
pub struct OverlayReconciler {
    /// Managed ids → the feature list last applied for that id.
    managed: HashMap<String, Arc<Vec<Feature>>>,
    /// Desired list parked while the widget style is still loading.
    pending: Option<Vec<Overlay>>,
}

impl OverlayReconciler {
    pub fn new() -> Self {
        OverlayReconciler {
            managed: HashMap::new(),
            pending: None,
        }
    }

    /// Converge the widget to `desired`. If the widget style is not loaded
    /// yet, the list is parked and replayed when `StyleLoaded` arrives.
    pub fn reconcile(&mut self, widget: &mut dyn MapWidget, desired: &[Overlay]) {
        if !widget.is_style_loaded() {
            debug!("style not loaded, deferring reconciliation");
            self.pending = Some(desired.to_vec());
            return;
        }
        self.pending = None;
        self.converge(widget, desired);
    }

    /// Feed a widget event through. Only `StyleLoaded` matters here: it
    /// flushes a parked desired list, once.
    pub fn handle_event(&mut self, widget: &mut dyn MapWidget, event: &WidgetEvent) {
        if let WidgetEvent::StyleLoaded = event {
            if let Some(desired) = self.pending.take() {
                self.converge(widget, &desired);
            }
        }
    }

    /// Remove every managed resource triple. After this the widget carries
    /// nothing the reconciler created.
    pub fn dispose(&mut self, widget: &mut dyn MapWidget) {
        let ids: Vec<String> = self.managed.keys().cloned().collect();
        for id in ids {
            Self::remove_overlay(widget, &id);
        }
        self.managed.clear();
        self.pending = None;
    }

    pub fn is_managed(&self, id: &str) -> bool {
        self.managed.contains_key(id)
    }

    pub fn managed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.managed.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn converge(&mut self, widget: &mut dyn MapWidget, desired: &[Overlay]) {
        let desired_ids: HashSet<&str> = desired.iter().map(|o| o.id.as_str()).collect();

        // Removals first, so an id that is leaving and re-entering in the
        // same pass never collides on resource names.
        let stale: Vec<String> = self
            .managed
            .keys()
            .filter(|id| !desired_ids.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            Self::remove_overlay(widget, &id);
            self.managed.remove(&id);
        }

        for overlay in desired {
            let source_id = overlay.source_id();
            if widget.has_source(&source_id) {
                let unchanged = self
                    .managed
                    .get(&overlay.id)
                    .is_some_and(|prev| Arc::ptr_eq(prev, &overlay.features));
                if unchanged {
                    continue;
                }
                // Same id, new geometry: replace the data in place. The
                // source and both layers survive, keeping paint state and
                // z-order intact.
                match widget.set_source_data(&source_id, overlay.feature_collection()) {
                    Ok(()) => {
                        if let Some(prev) = self.managed.get_mut(&overlay.id) {
                            *prev = Arc::clone(&overlay.features);
                        }
                    }
                    Err(e) => warn!(overlay = %overlay.id, error = %e, "failed to update overlay data"),
                }
            } else {
                match Self::add_overlay(widget, overlay) {
                    Ok(()) => {
                        self.managed
                            .insert(overlay.id.clone(), Arc::clone(&overlay.features));
                    }
                    Err(e) => {
                        warn!(overlay = %overlay.id, error = %e, "failed to add overlay");
                        // Never leave a half-drawn overlay behind.
                        Self::remove_overlay(widget, &overlay.id);
                    }
                }
            }
        }
    }

    fn add_overlay(widget: &mut dyn MapWidget, overlay: &Overlay) -> Result<(), String> {
        widget.add_geojson_source(&overlay.source_id(), overlay.feature_collection())?;
        widget.add_layer(LayerSpec {
            id: overlay.fill_layer_id(),
            source: overlay.source_id(),
            source_layer: None,
            before_id: None,
            paint: LayerPaint::Fill {
                colour: overlay.style.fill_colour().into(),
                opacity: overlay.style.fill_opacity().into(),
            },
        })?;
        widget.add_layer(LayerSpec {
            id: overlay.line_layer_id(),
            source: overlay.source_id(),
            source_layer: None,
            before_id: None,
            paint: LayerPaint::Line {
                colour: overlay.style.line_colour().into(),
                width: overlay.style.line_width().into(),
                opacity: 1.0.into(),
            },
        })?;
        Ok(())
    }

    /// Remove an overlay's resource triple. Idempotent: missing layers or
    /// sources are skipped, and individual failures are only logged.
    fn remove_overlay(widget: &mut dyn MapWidget, id: &str) {
        let fill_id = format!("{}-fill", id);
        let line_id = format!("{}-line", id);
        let source_id = format!("{}-source", id);
        if widget.has_layer(&fill_id) {
            if let Err(e) = widget.remove_layer(&fill_id) {
                warn!(layer = %fill_id, error = %e, "failed to remove layer");
            }
        }
        if widget.has_layer(&line_id) {
            if let Err(e) = widget.remove_layer(&line_id) {
                warn!(layer = %line_id, error = %e, "failed to remove layer");
            }
        }
        if widget.has_source(&source_id) {
            if let Err(e) = widget.remove_source(&source_id) {
                warn!(source = %source_id, error = %e, "failed to remove source");
            }
        }
    }
}

impl Default for OverlayReconciler {
    fn default() -> Self {
        Self::new()
    }
}
