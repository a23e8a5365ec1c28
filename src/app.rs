use crate::config::Config;
use crate::draw::DrawingSession;
use crate::models::capa::{parse_batch, CapaKind, SaveCapaResponse};
use crate::overlay::reconciler::OverlayReconciler;
use crate::overlay::registry::OverlayRegistry;
use crate::overlay::thematic::{ThematicKind, ThematicManager};
use crate::services::{CapaStore, ServiceError};
use crate::utils::format::FeatureDetails;
use crate::widget::{MapWidget, WidgetEvent};
use geojson::Feature;
use std::sync::Arc;
use tracing::warn;

/// Ties the pieces together: application state in the registry, convergence
/// in the reconciler, the drawing session, the thematic overlays and the
/// persistence client.
///
/// The widget handle is always passed in explicitly; the caller that created
/// the widget owns its teardown, and `App` never stashes a reference to it.
pub struct App {
    config: Config,
    registry: OverlayRegistry,
    reconciler: OverlayReconciler,
    drawing: DrawingSession,
    thematic: ThematicManager,
    store: Arc<dyn CapaStore>,
    loading: bool,
    last_error: Option<String>,
}

impl App {
    pub fn new(config: Config, store: Arc<dyn CapaStore>) -> Self {
        let thematic = ThematicManager::new(config.thematic.clone());
        App {
            config,
            registry: OverlayRegistry::new(),
            reconciler: OverlayReconciler::new(),
            drawing: DrawingSession::new(),
            thematic,
            store,
            loading: false,
            last_error: None,
        }
    }

    /// Point the camera at the configured home view and install the drawing
    /// control.
    pub fn attach(&mut self, widget: &mut dyn MapWidget) {
        widget.jump_to(self.config.map.center, self.config.map.zoom);
        self.drawing.attach(widget);
    }

    /// Route one widget event to every component. A click on a thematic
    /// layer comes back as display-ready feature details.
    pub fn handle_event(
        &mut self,
        widget: &mut dyn MapWidget,
        event: &WidgetEvent,
    ) -> Option<FeatureDetails> {
        self.reconciler.handle_event(widget, event);
        self.drawing.handle_event(widget, event);
        self.thematic.handle_event(widget, event)
    }

    /// Reload all capas from the store and reconcile the map.
    pub async fn refresh_capas(&mut self, widget: &mut dyn MapWidget) -> Result<(), ServiceError> {
        self.loading = true;
        self.last_error = None;
        let dtos = match self.store.list_all().await {
            Ok(dtos) => dtos,
            Err(e) => {
                self.last_error = Some(e.to_string());
                self.loading = false;
                return Err(e);
            }
        };
        let (parsed, failures) = parse_batch(&dtos);
        for failure in &failures {
            warn!(error = %failure, "skipping malformed capa record");
        }
        self.registry.set_capas(parsed);
        self.reconciler.reconcile(widget, self.registry.desired());
        self.loading = false;
        Ok(())
    }

    pub fn set_show_saved(&mut self, widget: &mut dyn MapWidget, show: bool) {
        self.registry.set_show_saved(show);
        self.reconciler.reconcile(widget, self.registry.desired());
    }

    pub fn toggle_thematic(&mut self, widget: &mut dyn MapWidget, kind: ThematicKind, show: bool) {
        self.thematic.toggle(widget, kind, show);
    }

    pub fn start_polygon(&mut self, widget: &mut dyn MapWidget) {
        self.drawing.start_polygon(widget);
    }

    /// Persist the drawn polygons as a capa of the given kind. The drawn
    /// collection is left untouched either way, so a failed save can simply
    /// be retried; clearing is a separate, explicit action.
    pub async fn save_drawn(
        &mut self,
        widget: &mut dyn MapWidget,
        kind: CapaKind,
    ) -> Result<SaveCapaResponse, ServiceError> {
        let result = self.store.save(self.drawing.get_all(), kind).await;
        match result {
            Ok(response) => {
                self.last_error = None;
                if self.registry.show_saved() {
                    self.refresh_capas(widget).await?;
                }
                Ok(response)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn delete_capa(
        &mut self,
        widget: &mut dyn MapWidget,
        id: i64,
    ) -> Result<(), ServiceError> {
        match self.store.delete(id).await {
            Ok(()) => {
                self.registry.remove_capa(id);
                self.reconciler.reconcile(widget, self.registry.desired());
                Ok(())
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn clear_drawn(&mut self, widget: &mut dyn MapWidget) {
        self.drawing.clear_all(widget);
    }

    /// Remove everything this app put on the widget: managed overlays,
    /// thematic layers and the drawing control.
    pub fn teardown(&mut self, widget: &mut dyn MapWidget) {
        self.reconciler.dispose(widget);
        self.thematic.dispose(widget);
        self.drawing.detach(widget);
    }

    pub fn drawn(&self) -> &[Feature] {
        self.drawing.get_all()
    }

    pub fn registry(&self) -> &OverlayRegistry {
        &self.registry
    }

    pub fn managed_overlays(&self) -> Vec<String> {
        self.reconciler.managed_ids()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capa::CapaDto;
    use crate::widget::HeadlessWidget;
    use async_trait::async_trait;
    use geojson::{Geometry, Value as GeomValue};
    use std::sync::Mutex;

    /// In-memory store with a switchable failure mode.
    #[derive(Default)]
    struct MemStore {
        capas: Mutex<Vec<CapaDto>>,
        next_id: Mutex<i64>,
        fail: Mutex<bool>,
    }

    impl MemStore {
        fn fail_next(&self) {
            *self.fail.lock().unwrap() = true;
        }

        fn check_fail(&self) -> Result<(), ServiceError> {
            if std::mem::take(&mut *self.fail.lock().unwrap()) {
                return Err(ServiceError::Api {
                    status: 500,
                    message: "Error interno al guardar capa".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CapaStore for MemStore {
        async fn save(
            &self,
            features: &[Feature],
            kind: CapaKind,
        ) -> Result<SaveCapaResponse, ServiceError> {
            self.check_fail()?;
            if features.is_empty() {
                return Err(ServiceError::EmptySave);
            }
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            let id = *next_id;
            self.capas.lock().unwrap().push(CapaDto {
                id: Some(id),
                kind: kind.to_string(),
                json: serde_json::to_string(features).unwrap(),
                created_at: None,
            });
            Ok(SaveCapaResponse {
                id,
                message: "Capa guardada exitosamente".to_string(),
                kind: kind.to_string(),
            })
        }

        async fn list_all(&self) -> Result<Vec<CapaDto>, ServiceError> {
            self.check_fail()?;
            Ok(self.capas.lock().unwrap().clone())
        }

        async fn list_by_kind(&self, kind: CapaKind) -> Result<Vec<CapaDto>, ServiceError> {
            self.check_fail()?;
            Ok(self
                .capas
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.kind == kind.to_string())
                .cloned()
                .collect())
        }

        async fn delete(&self, id: i64) -> Result<(), ServiceError> {
            self.check_fail()?;
            self.capas.lock().unwrap().retain(|c| c.id != Some(id));
            Ok(())
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

    fn app_with_store() -> (App, Arc<MemStore>) {
        let store = Arc::new(MemStore::default());
        (App::new(Config::default(), store.clone()), store)
    }

    fn drain(widget: &mut HeadlessWidget, app: &mut App) {
        while let Some(event) = widget.poll_event() {
            app.handle_event(widget, &event);
        }
    }

    #[tokio::test]
    async fn draw_save_and_show_round_trip() {
        let mut widget = HeadlessWidget::loaded();
        let (mut app, _store) = app_with_store();
        app.attach(&mut widget);

        app.start_polygon(&mut widget);
        widget.simulate_draw_create(triangle());
        drain(&mut widget, &mut app);
        assert_eq!(app.drawn().len(), 1);

        app.save_drawn(&mut widget, CapaKind::Pob).await.unwrap();
        // drawn collection survives the save
        assert_eq!(app.drawn().len(), 1);

        app.set_show_saved(&mut widget, true);
        app.refresh_capas(&mut widget).await.unwrap();
        assert!(widget.has_source("pob-source"));
        let data = widget.source_data("pob-source").unwrap();
        assert_eq!(data.features.len(), 1);
    }

    #[tokio::test]
    async fn failed_save_keeps_drawn_features_and_reports() {
        let mut widget = HeadlessWidget::loaded();
        let (mut app, store) = app_with_store();
        app.attach(&mut widget);

        app.start_polygon(&mut widget);
        widget.simulate_draw_create(triangle());
        drain(&mut widget, &mut app);

        store.fail_next();
        let err = app.save_drawn(&mut widget, CapaKind::Pob).await;
        assert!(err.is_err());
        assert_eq!(app.drawn().len(), 1);
        assert!(app.last_error().unwrap().contains("Error interno"));
    }

    #[tokio::test]
    async fn failed_refresh_resets_loading_and_surfaces_a_message() {
        let mut widget = HeadlessWidget::loaded();
        let (mut app, store) = app_with_store();

        store.fail_next();
        assert!(app.refresh_capas(&mut widget).await.is_err());
        assert!(!app.is_loading());
        assert!(app.last_error().is_some());
    }

    #[tokio::test]
    async fn delete_capa_reconciles_the_map() {
        let mut widget = HeadlessWidget::loaded();
        let (mut app, store) = app_with_store();
        let saved = store.save(&[triangle()], CapaKind::Green).await.unwrap();

        app.set_show_saved(&mut widget, true);
        app.refresh_capas(&mut widget).await.unwrap();
        assert_eq!(
            widget.source_data("green-source").unwrap().features.len(),
            1
        );

        app.delete_capa(&mut widget, saved.id).await.unwrap();
        assert!(
            widget
                .source_data("green-source")
                .unwrap()
                .features
                .is_empty()
        );
    }

    #[tokio::test]
    async fn teardown_leaves_a_clean_widget() {
        let mut widget = HeadlessWidget::loaded();
        let (mut app, store) = app_with_store();
        store.save(&[triangle()], CapaKind::Pob).await.unwrap();

        app.attach(&mut widget);
        app.set_show_saved(&mut widget, true);
        app.refresh_capas(&mut widget).await.unwrap();
        app.toggle_thematic(&mut widget, ThematicKind::Vial, true);
        widget.finish_source_load("vial-source");
        drain(&mut widget, &mut app);

        app.teardown(&mut widget);
        assert!(widget.source_ids().is_empty());
        assert!(widget.layer_ids().is_empty());
        assert!(!widget.has_draw_control());
        assert!(app.managed_overlays().is_empty());
    }

    #[tokio::test]
    async fn hidden_layers_mean_no_widget_resources() {
        let mut widget = HeadlessWidget::loaded();
        let (mut app, store) = app_with_store();
        store.save(&[triangle()], CapaKind::Pob).await.unwrap();

        app.refresh_capas(&mut widget).await.unwrap();
        assert!(widget.source_ids().is_empty());

        app.set_show_saved(&mut widget, true);
        assert!(widget.has_source("pob-source"));

        app.set_show_saved(&mut widget, false);
        assert!(widget.source_ids().is_empty());
    }
}
