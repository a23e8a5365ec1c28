use super::{api_error, ServiceError};
use reqwest::StatusCode;

/// Client for the population-graphics service.
pub struct GraphicsClient {
    client: reqwest::Client,
    base_url: String,
}

impl GraphicsClient {
    /// `base_url` is the graphics resource root, e.g.
    /// `http://localhost:8081/api/graphics`.
    pub fn new(base_url: impl Into<String>) -> Self {
        GraphicsClient {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Image URLs for the given year. The service answers 204 when it has
    /// nothing for that year; that is "no data", not an error.
    pub async fn urls_for_year(&self, year: i32) -> Result<Vec<String>, ServiceError> {
        let response = self
            .client
            .get(format!("{}/urls", self.base_url))
            .query(&[("year", year)])
            .send()
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(api_error(response, "error al obtener gráficas").await);
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct YearQuery {
        year: i32,
    }

    async fn urls_handler(Query(query): Query<YearQuery>) -> axum::response::Response {
        if query.year == 2020 {
            Json(vec![
                "https://example.com/pop-2020-a.png".to_string(),
                "https://example.com/pop-2020-b.png".to_string(),
            ])
            .into_response()
        } else {
            StatusCode::NO_CONTENT.into_response()
        }
    }

    async fn spawn_stub() -> String {
        let app = Router::new().route("/api/graphics/urls", get(urls_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/graphics", addr)
    }

    #[tokio::test]
    async fn returns_urls_for_a_known_year() {
        let client = GraphicsClient::new(spawn_stub().await);
        let urls = client.urls_for_year(2020).await.unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].contains("pop-2020"));
    }

    #[tokio::test]
    async fn no_content_means_no_data_not_an_error() {
        let client = GraphicsClient::new(spawn_stub().await);
        let urls = client.urls_for_year(1990).await.unwrap();
        assert!(urls.is_empty());
    }
}
