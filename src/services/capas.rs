use super::{api_error, ServiceError};
use crate::models::capa::{CapaDto, CapaKind, SaveCapaRequest, SaveCapaResponse};
use async_trait::async_trait;
use geojson::Feature;

/// The capa persistence service, seen from the client side.
#[async_trait]
pub trait CapaStore: Send + Sync {
    async fn save(
        &self,
        features: &[Feature],
        kind: CapaKind,
    ) -> Result<SaveCapaResponse, ServiceError>;
    async fn list_all(&self) -> Result<Vec<CapaDto>, ServiceError>;
    async fn list_by_kind(&self, kind: CapaKind) -> Result<Vec<CapaDto>, ServiceError>;
    async fn delete(&self, id: i64) -> Result<(), ServiceError>;
}

/// [`CapaStore`] over the service's REST interface.
pub struct HttpCapaStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCapaStore {
    /// `base_url` is the capa resource root, e.g.
    /// `http://localhost:8081/api/capas`.
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpCapaStore {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CapaStore for HttpCapaStore {
    async fn save(
        &self,
        features: &[Feature],
        kind: CapaKind,
    ) -> Result<SaveCapaResponse, ServiceError> {
        if features.is_empty() {
            return Err(ServiceError::EmptySave);
        }
        let request = SaveCapaRequest {
            kind: kind.to_string(),
            features: serde_json::to_string(features).map_err(ServiceError::Encode)?,
        };
        let response = self
            .client
            .post(format!("{}/save", self.base_url))
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response, "error al guardar capa").await);
        }
        Ok(response.json().await?)
    }

    async fn list_all(&self) -> Result<Vec<CapaDto>, ServiceError> {
        let response = self.client.get(&self.base_url).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response, "error al obtener capas").await);
        }
        Ok(response.json().await?)
    }

    async fn list_by_kind(&self, kind: CapaKind) -> Result<Vec<CapaDto>, ServiceError> {
        let response = self
            .client
            .get(format!("{}/type/{}", self.base_url, kind))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response, "error al obtener capas").await);
        }
        Ok(response.json().await?)
    }

    async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let response = self
            .client
            .delete(format!("{}/{}", self.base_url, id))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response, "error al eliminar capa").await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capa::parse_batch;
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use geojson::{Geometry, Value as GeomValue};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// In-memory stand-in for the persistence service, speaking its exact
    /// wire format.
    #[derive(Default)]
    struct StubService {
        capas: Mutex<Vec<CapaDto>>,
        next_id: Mutex<i64>,
    }

    async fn save_handler(
        State(stub): State<Arc<StubService>>,
        Json(request): Json<SaveCapaRequest>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        if serde_json::from_str::<Vec<Feature>>(&request.features).is_err() {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "features inválidos"})),
            );
        }
        let mut next_id = stub.next_id.lock().unwrap();
        *next_id += 1;
        let id = *next_id;
        stub.capas.lock().unwrap().push(CapaDto {
            id: Some(id),
            kind: request.kind.clone(),
            json: request.features,
            created_at: Some("2025-01-15T10:00:00".to_string()),
        });
        (
            StatusCode::OK,
            Json(json!({
                "id": id,
                "message": "Capa guardada exitosamente",
                "type": request.kind,
            })),
        )
    }

    async fn list_handler(State(stub): State<Arc<StubService>>) -> Json<Vec<CapaDto>> {
        Json(stub.capas.lock().unwrap().clone())
    }

    async fn list_kind_handler(
        State(stub): State<Arc<StubService>>,
        Path(kind): Path<String>,
    ) -> Json<Vec<CapaDto>> {
        Json(
            stub.capas
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.kind == kind)
                .cloned()
                .collect(),
        )
    }

    async fn delete_handler(
        State(stub): State<Arc<StubService>>,
        Path(id): Path<i64>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        let mut capas = stub.capas.lock().unwrap();
        let before = capas.len();
        capas.retain(|c| c.id != Some(id));
        if capas.len() == before {
            (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Capa no encontrada"})),
            )
        } else {
            (
                StatusCode::OK,
                Json(json!({"message": "Capa eliminada exitosamente"})),
            )
        }
    }

    async fn spawn_stub() -> String {
        let stub = Arc::new(StubService::default());
        let app = Router::new()
            .route("/api/capas/save", post(save_handler))
            .route("/api/capas", get(list_handler))
            .route("/api/capas/type/{kind}", get(list_kind_handler))
            .route("/api/capas/{id}", delete(delete_handler))
            .with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/capas", addr)
    }

    fn square(offset: f64) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(GeomValue::Polygon(vec![vec![
                vec![offset, offset],
                vec![offset + 1.0, offset],
                vec![offset + 1.0, offset + 1.0],
                vec![offset, offset + 1.0],
                vec![offset, offset],
            ]]))),
            id: None,
            properties: None,
            foreign_members: None,
        }
    }

    #[tokio::test]
    async fn save_then_list_round_trips_the_features() {
        let store = HttpCapaStore::new(spawn_stub().await);
        let features = vec![square(0.0), square(2.0)];

        let saved = store.save(&features, CapaKind::Pob).await.unwrap();
        assert_eq!(saved.kind, "pob");

        let dtos = store.list_all().await.unwrap();
        let (parsed, failures) = parse_batch(&dtos);
        assert!(failures.is_empty());
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, saved.id);
        assert_eq!(parsed[0].kind, CapaKind::Pob);
        assert_eq!(parsed[0].features, features);
    }

    #[tokio::test]
    async fn list_by_kind_filters_server_side() {
        let store = HttpCapaStore::new(spawn_stub().await);
        store.save(&[square(0.0)], CapaKind::Pob).await.unwrap();
        store.save(&[square(2.0)], CapaKind::Green).await.unwrap();

        let dtos = store.list_by_kind(CapaKind::Green).await.unwrap();
        assert_eq!(dtos.len(), 1);
        assert_eq!(dtos[0].kind, "green");
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let store = HttpCapaStore::new(spawn_stub().await);
        let saved = store.save(&[square(0.0)], CapaKind::Pob).await.unwrap();

        store.delete(saved.id).await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_missing_surfaces_the_error_body() {
        let store = HttpCapaStore::new(spawn_stub().await);
        let err = store.delete(404).await.unwrap_err();
        match err {
            ServiceError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Capa no encontrada");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn saving_nothing_is_rejected_locally() {
        // no server needed; the guard fires before any request
        let store = HttpCapaStore::new("http://127.0.0.1:9/api/capas");
        assert!(matches!(
            store.save(&[], CapaKind::Pob).await,
            Err(ServiceError::EmptySave)
        ));
    }
}
