use crate::widget::{DrawMode, MapWidget, WidgetEvent};
use geojson::Feature;
use tracing::warn;

/// Wraps the widget's freehand polygon-drawing mode behind a small
/// start / observe / stop contract.
///
/// The session keeps its own copy of the drawn features, refreshed by full
/// replacement from the widget's authoritative set on every draw event, as
/// partial patches could drift from the widget's internal state. The copy is
/// what a save action reads; it survives a save so the user can retry after
/// a failure without redrawing.
pub struct DrawingSession {
    installed: bool,
    pending_install: bool,
    drawing: bool,
    features: Vec<Feature>,
}

impl DrawingSession {
    pub fn new() -> Self {
        DrawingSession {
            installed: false,
            pending_install: false,
            drawing: false,
            features: Vec::new(),
        }
    }

    /// Install the drawing control on the widget. Installs at most once per
    /// widget; when the widget style is still loading the installation is
    /// parked until `StyleLoaded` arrives.
    pub fn attach(&mut self, widget: &mut dyn MapWidget) {
        if self.installed {
            return;
        }
        if !widget.is_style_loaded() {
            self.pending_install = true;
            return;
        }
        match widget.install_draw_control() {
            Ok(()) => {
                self.installed = true;
                self.pending_install = false;
            }
            Err(e) => warn!(error = %e, "failed to install draw control"),
        }
    }

    /// Switch the widget into polygon-draw mode. Racing ahead of the control
    /// installation is expected (the widget style may still be loading), so
    /// this only warns and stays a no-op in that case.
    pub fn start_polygon(&mut self, widget: &mut dyn MapWidget) {
        if !self.installed {
            warn!("draw control not installed yet, ignoring start_polygon");
            return;
        }
        match widget.set_draw_mode(DrawMode::DrawPolygon) {
            Ok(()) => self.drawing = true,
            Err(e) => warn!(error = %e, "failed to enter polygon draw mode"),
        }
    }

    pub fn handle_event(&mut self, widget: &mut dyn MapWidget, event: &WidgetEvent) {
        match event {
            WidgetEvent::StyleLoaded => {
                if self.pending_install && !self.installed {
                    self.pending_install = false;
                    self.attach(widget);
                }
            }
            WidgetEvent::DrawCreate { .. } => {
                self.drawing = false;
                self.sync(widget);
            }
            WidgetEvent::DrawUpdate { .. } | WidgetEvent::DrawDelete { .. } => {
                self.sync(widget);
            }
            _ => {}
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn get_all(&self) -> &[Feature] {
        &self.features
    }

    /// Drop every drawn feature, on the widget and in the session's copy.
    pub fn clear_all(&mut self, widget: &mut dyn MapWidget) {
        if self.installed {
            if let Err(e) = widget.delete_all_drawn() {
                warn!(error = %e, "failed to clear drawn features");
            }
        }
        self.features.clear();
    }

    /// Remove the control and all listeners' state; a later [`attach`] can
    /// reinstall on a fresh widget.
    ///
    /// [`attach`]: DrawingSession::attach
    pub fn detach(&mut self, widget: &mut dyn MapWidget) {
        if self.installed {
            if let Err(e) = widget.remove_draw_control() {
                warn!(error = %e, "failed to remove draw control");
            }
        }
        self.installed = false;
        self.pending_install = false;
        self.drawing = false;
        self.features.clear();
    }

    fn sync(&mut self, widget: &dyn MapWidget) {
        self.features = widget.drawn_features();
    }
}

impl Default for DrawingSession {
    fn default() -> Self {
        Self::new()
    }
}
