use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, Path, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use log::{error, info, warn};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::Config;
use crate::relay::cloudflare::CloudflareRelay;
use crate::relay::{ErrorEnvelope, RelayError, INTERNAL_ERROR_MESSAGE};

pub struct AppState {
    pub relay: CloudflareRelay,
}

pub fn create_router(config: Config) -> Result<Router> {
    let relay = CloudflareRelay::new(&config.cloudflare)?;
    let state = Arc::new(AppState { relay });
    let cors = cors_layer(&config.cors.allowed_origins)?;

    let router = Router::new()
        .route("/api/zones", get(list_zones))
        .route(
            "/api/zones/{zone_id}/dns_records",
            get(list_records).post(create_record),
        )
        .route(
            "/api/zones/{zone_id}/dns_records/{record_id}",
            put(update_record).delete(delete_record),
        )
        .route("/health", get(health_check))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .layer(middleware::from_fn(access_log))
        .with_state(state);

    Ok(router)
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let origins = allowed_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {}", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true))
}

async fn access_log(request: Request, next: Next) -> Response {
    let start = Instant::now();

    // Extract request info
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or("-").trim().to_string())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "-".to_string());

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let length = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    let duration = start.elapsed();

    // Access log format: method path "user-agent" ip status length duration
    info!(
        target: "access",
        "{} {} \"{}\" {} {} {} {:.3}ms",
        method, path, user_agent, ip, status, length, duration.as_secs_f64() * 1000.0
    );

    response
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorEnvelope::message("Not found")))
}

async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorEnvelope::message("Method not allowed")),
    )
}

/// Path segments that fail to decode are reported like any other bad identifier.
fn path_params<T>(path: Result<Path<T>, PathRejection>) -> Result<T, RelayError> {
    path.map(|Path(params)| params)
        .map_err(|rejection| RelayError::InvalidIdentifier(rejection.body_text()))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorEnvelope::message(INTERNAL_ERROR_MESSAGE)),
    )
        .into_response()
}

/// Upstream success bodies are returned as-is.
fn passthrough(body: Bytes) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

async fn list_zones(State(state): State<Arc<AppState>>) -> Result<Response, RelayError> {
    let body = state
        .relay
        .list_zones()
        .await
        .inspect_err(|e| warn!("Error fetching zones: {}", e))?;
    Ok(passthrough(body))
}

async fn list_records(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, RelayError> {
    let zone_id = path_params(path)?;
    let body = state
        .relay
        .list_records(&zone_id)
        .await
        .inspect_err(|e| warn!("Error fetching DNS records for zone {}: {}", zone_id, e))?;
    Ok(passthrough(body))
}

async fn create_record(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    body: Bytes,
) -> Result<Response, RelayError> {
    let zone_id = path_params(path)?;
    let body = state
        .relay
        .create_record(&zone_id, body)
        .await
        .inspect_err(|e| warn!("Error creating DNS record in zone {}: {}", zone_id, e))?;
    info!("Created DNS record in zone {}", zone_id);
    Ok(passthrough(body))
}

async fn update_record(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Bytes,
) -> Result<Response, RelayError> {
    let (zone_id, record_id) = path_params(path)?;
    let body = state
        .relay
        .update_record(&zone_id, &record_id, body)
        .await
        .inspect_err(|e| warn!("Error updating DNS record {}: {}", record_id, e))?;
    info!("Updated DNS record {} in zone {}", record_id, zone_id);
    Ok(passthrough(body))
}

async fn delete_record(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<Response, RelayError> {
    let (zone_id, record_id) = path_params(path)?;
    let body = state
        .relay
        .delete_record(&zone_id, &record_id)
        .await
        .inspect_err(|e| warn!("Error deleting DNS record {}: {}", record_id, e))?;
    info!("Deleted DNS record {} from zone {}", record_id, zone_id);
    Ok(passthrough(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{body_json, header as header_is, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "test-token";
    const ZONE: &str = "023e105f4ecef8ad9ca31a8372d0c353";
    const RECORD: &str = "372e67954025e0ba6aaa6d586b9e0b59";

    fn test_config(api_base: String) -> Config {
        let mut config = Config::default();
        config.cloudflare.api_base = api_base;
        config.cloudflare.api_token = TOKEN.to_string();
        config.cloudflare.timeout_secs = 5;
        config
    }

    async fn spawn_relay(config: Config) -> String {
        let app = create_router(config).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_list_zones_passes_body_through() {
        let upstream = MockServer::start().await;
        let upstream_body = json!({
            "success": true,
            "errors": [],
            "messages": [],
            "result": [{ "id": ZONE, "name": "example.com", "status": "active" }],
            "result_info": { "page": 1, "count": 1 }
        });
        Mock::given(method("GET"))
            .and(path("/zones"))
            .and(header_is("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&upstream_body))
            .expect(1)
            .mount(&upstream)
            .await;

        let relay = spawn_relay(test_config(upstream.uri())).await;
        let response = reqwest::get(format!("{}/api/zones", relay)).await.unwrap();

        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, upstream_body);
    }

    #[tokio::test]
    async fn test_create_record_forwards_payload_verbatim() {
        let upstream = MockServer::start().await;
        let payload = json!({
            "type": "A",
            "name": "www",
            "content": "1.2.3.4",
            "ttl": 3600,
            "proxied": true
        });
        Mock::given(method("POST"))
            .and(path(format!("/zones/{}/dns_records", ZONE)))
            .and(header_is("authorization", "Bearer test-token"))
            .and(body_json(&payload))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": { "id": RECORD, "type": "A", "name": "www.example.com",
                            "content": "1.2.3.4", "ttl": 3600, "proxied": true }
            })))
            .expect(1)
            .mount(&upstream)
            .await;

        let relay = spawn_relay(test_config(upstream.uri())).await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/zones/{}/dns_records", relay, ZONE))
            .json(&payload)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["result"]["id"], RECORD);
    }

    #[tokio::test]
    async fn test_update_and_delete_routes() {
        let upstream = MockServer::start().await;
        let record_path = format!("/zones/{}/dns_records/{}", ZONE, RECORD);
        Mock::given(method("PUT"))
            .and(path(record_path.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": { "id": RECORD }
            })))
            .expect(1)
            .mount(&upstream)
            .await;
        Mock::given(method("DELETE"))
            .and(path(record_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": { "id": RECORD }
            })))
            .expect(1)
            .mount(&upstream)
            .await;

        let relay = spawn_relay(test_config(upstream.uri())).await;
        let client = reqwest::Client::new();
        let url = format!("{}/api/zones/{}/dns_records/{}", relay, ZONE, RECORD);

        let response = client
            .put(&url)
            .json(&json!({ "type": "TXT", "name": "txt", "content": "hello", "ttl": 60 }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let response = client.delete(&url).send().await.unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["result"]["id"], RECORD);
    }

    #[tokio::test]
    async fn test_upstream_failure_keeps_status_and_wraps_envelope() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/zones/{}/dns_records", ZONE)))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "success": false,
                "errors": [{ "code": 10000, "message": "Authentication error" }],
                "messages": [],
                "result": null
            })))
            .mount(&upstream)
            .await;

        let relay = spawn_relay(test_config(upstream.uri())).await;
        let response = reqwest::get(format!("{}/api/zones/{}/dns_records", relay, ZONE))
            .await
            .unwrap();

        assert_eq!(response.status(), 403);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["message"], "Authentication error");
        assert_eq!(body["error"]["errors"][0]["code"], 10000);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_internal_error() {
        // Nothing listens on port 1.
        let relay = spawn_relay(test_config("http://127.0.0.1:1".to_string())).await;
        let response = reqwest::get(format!("{}/api/zones", relay)).await.unwrap();

        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body,
            json!({ "success": false, "error": { "message": "Internal server error" } })
        );
    }

    #[tokio::test]
    async fn test_invalid_identifier_never_reaches_upstream() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&upstream)
            .await;

        let relay = spawn_relay(test_config(upstream.uri())).await;
        let response = reqwest::get(format!("{}/api/zones/bad%2Fzone/dns_records", relay))
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"]["message"], "Invalid identifier");
    }

    #[tokio::test]
    async fn test_unknown_route_uses_envelope() {
        let relay = spawn_relay(test_config("http://127.0.0.1:1".to_string())).await;
        let response = reqwest::get(format!("{}/api/accounts", relay)).await.unwrap();

        assert_eq!(response.status(), 404);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["message"], "Not found");
    }

    #[tokio::test]
    async fn test_health_check() {
        let relay = spawn_relay(test_config("http://127.0.0.1:1".to_string())).await;
        let body: Value = reqwest::get(format!("{}/health", relay))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin_only() {
        let relay = spawn_relay(test_config("http://127.0.0.1:1".to_string())).await;
        let client = reqwest::Client::new();

        let response = client
            .request(reqwest::Method::OPTIONS, format!("{}/api/zones", relay))
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "GET")
            .send()
            .await
            .unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:5173"
        );
        assert_eq!(
            response.headers().get("access-control-allow-credentials").unwrap(),
            "true"
        );

        let response = client
            .request(reqwest::Method::OPTIONS, format!("{}/api/zones", relay))
            .header("origin", "http://evil.example")
            .header("access-control-request-method", "GET")
            .send()
            .await
            .unwrap();
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[test]
    fn test_invalid_cors_origin_is_rejected() {
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_panic_handler_hides_details() {
        let response = handle_panic(Box::new("secret detail".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(!String::from_utf8_lossy(&bytes).contains("secret detail"));
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            json!({ "success": false, "error": { "message": "Internal server error" } })
        );
    }

    #[tokio::test]
    async fn test_unsupported_method_uses_envelope() {
        let relay = spawn_relay(test_config("http://127.0.0.1:1".to_string())).await;
        let response = reqwest::Client::new()
            .patch(format!("{}/api/zones", relay))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 405);
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body,
            json!({ "success": false, "error": { "message": "Method not allowed" } })
        );
    }

    #[tokio::test]
    async fn test_undecodable_path_segment_is_invalid_identifier() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&upstream)
            .await;

        let relay = spawn_relay(test_config(upstream.uri())).await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("{}/api/zones/%FF/dns_records", relay))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body,
            json!({ "success": false, "error": { "message": "Invalid identifier" } })
        );

        let response = client
            .delete(format!("{}/api/zones/{}/dns_records/%FF", relay, ZONE))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"]["message"], "Invalid identifier");
    }
}
