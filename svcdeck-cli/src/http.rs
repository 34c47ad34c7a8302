//! JSON-over-HTTP transport for the engine's backend boundary.

use crate::client::{build_client, handle_error};
use crate::config::ClientConfig;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;
use svcdeck_core::{Backend, InstallFile, Metrics, ResourceConfig};

#[derive(Serialize)]
struct InstallBody<'a> {
    files: Vec<InstallPart<'a>>,
}

#[derive(Serialize)]
struct InstallPart<'a> {
    name: &'a str,
    /// Base64 编码的文件内容
    data: String,
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let client = build_client(config.token.as_deref(), config.timeout)?;
        Ok(Self { client, config })
    }

    async fn post_empty(&self, path: &str) -> anyhow::Result<()> {
        let resp = self.client.post(self.config.url(path)).send().await?;
        handle_error(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_services(&self) -> anyhow::Result<Vec<ResourceConfig>> {
        let resp = self.client.get(self.config.url("services")).send().await?;
        Ok(handle_error(resp).await?.json().await?)
    }

    async fn fetch_directories(&self) -> anyhow::Result<Vec<ResourceConfig>> {
        let resp = self
            .client
            .get(self.config.url("directories"))
            .send()
            .await?;
        Ok(handle_error(resp).await?.json().await?)
    }

    async fn start_service(&self, id: &str) -> anyhow::Result<()> {
        self.post_empty(&format!("resources/{}/start", id)).await
    }

    async fn stop_service(&self, id: &str) -> anyhow::Result<()> {
        self.post_empty(&format!("resources/{}/stop", id)).await
    }

    async fn install(&self, id: &str, files: &[InstallFile]) -> anyhow::Result<()> {
        let body = InstallBody {
            files: files
                .iter()
                .map(|f| InstallPart {
                    name: &f.name,
                    data: BASE64.encode(&f.data),
                })
                .collect(),
        };
        let resp = self
            .client
            .post(self.config.url(&format!("resources/{}/install", id)))
            .json(&body)
            .send()
            .await?;
        handle_error(resp).await?;
        Ok(())
    }

    async fn save_resource(&self, config: &ResourceConfig) -> anyhow::Result<ResourceConfig> {
        let resp = self
            .client
            .put(self.config.url("resources"))
            .json(config)
            .send()
            .await?;
        Ok(handle_error(resp).await?.json().await?)
    }

    async fn delete_resource(&self, id: &str) -> anyhow::Result<()> {
        let resp = self
            .client
            .delete(self.config.url(&format!("resources/{}", id)))
            .send()
            .await?;
        handle_error(resp).await?;
        Ok(())
    }

    async fn fetch_metrics(&self, id: &str) -> anyhow::Result<Metrics> {
        let resp = self
            .client
            .get(self.config.url(&format!("resources/{}/metrics", id)))
            .send()
            .await?;
        Ok(handle_error(resp).await?.json().await?)
    }

    async fn open_explorer(&self, id: &str) -> anyhow::Result<()> {
        self.post_empty(&format!("resources/{}/explorer", id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use svcdeck_core::{Command, CommandFacade};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn stub() -> Router {
        Router::new()
            .route(
                "/services",
                get(|| async {
                    Json(json!([
                        {"id": "svc1", "name": "Gateway", "description": "", "type": "service",
                         "path": "C:/svc/gw", "installable": true, "serviceName": "GatewaySvc"}
                    ]))
                }),
            )
            .route("/directories", get(|| async { Json(json!([])) }))
            .route(
                "/resources/:id/start",
                post(|Path(id): Path<String>| async move {
                    if id == "busy" {
                        (StatusCode::CONFLICT, Json(json!({"message": "port in use"})))
                    } else {
                        (StatusCode::OK, Json(json!({})))
                    }
                }),
            )
            .route(
                "/resources/:id/install",
                post(|Json(body): Json<Value>| async move {
                    let data = body["files"][0]["data"].as_str().unwrap_or_default();
                    if data == BASE64.encode(b"payload") {
                        StatusCode::NO_CONTENT
                    } else {
                        StatusCode::BAD_REQUEST
                    }
                }),
            )
            .route(
                "/resources",
                put(|Json(mut body): Json<Value>| async move {
                    if body["id"].as_str() == Some("") {
                        body["id"] = json!("generated-1");
                    }
                    Json(body)
                }),
            )
            .route(
                "/resources/:id/metrics",
                get(|| async {
                    Json(json!({"pid": 4242, "createTime": 1700000000000_i64, "cpu": 1.5, "mem": 2048}))
                }),
            )
            .route(
                "/resources/:id/explorer",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "explorer unavailable") }),
            )
    }

    async fn backend() -> HttpBackend {
        let base = serve(stub()).await;
        HttpBackend::new(ClientConfig::new(&base, Some("t0ken".into()), 5)).unwrap()
    }

    #[tokio::test]
    async fn fetches_decode_configs() {
        let backend = backend().await;
        let services = backend.fetch_services().await.unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].service_name.as_deref(), Some("GatewaySvc"));
        assert!(services[0].installable);
        assert!(backend.fetch_directories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_message_reaches_command_error() {
        let facade = CommandFacade::new(Arc::new(backend().await));
        facade.start("svc1").await.unwrap();
        let err = facade.start("busy").await.unwrap_err();
        assert_eq!(err.command(), Command::Start);
        assert_eq!(err.message(), "port in use");

        let err = facade.open_explorer("svc1").await.unwrap_err();
        assert_eq!(err.message(), "explorer unavailable");
    }

    #[tokio::test]
    async fn install_sends_base64_payload() {
        let backend = backend().await;
        backend
            .install("svc1", &[InstallFile::new("app.zip", b"payload".to_vec())])
            .await
            .unwrap();
        assert!(backend
            .install("svc1", &[InstallFile::new("app.zip", b"other".to_vec())])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn save_and_metrics_round_trip() {
        let backend = backend().await;
        let saved = backend
            .save_resource(&ResourceConfig::directory("", "Logs", "/var/log"))
            .await
            .unwrap();
        assert_eq!(saved.id, "generated-1");
        assert_eq!(saved.path, "/var/log");

        let metrics = backend.fetch_metrics("svc1").await.unwrap();
        assert_eq!(metrics.pid, 4242);
        assert_eq!(metrics.mem, 2048);
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_error() {
        let backend =
            HttpBackend::new(ClientConfig::new("http://127.0.0.1:1", None, 1)).unwrap();
        assert!(backend.fetch_services().await.is_err());
    }
}
