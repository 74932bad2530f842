mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
pub use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::cables::CableCatalog;
use crate::config::{Config, DEFAULT_HOPS};
use crate::location::{FacilityProvider, GeoProvider, IpApiProvider, PeeringDbProvider};
use crate::pipeline::Pipeline;

pub fn build_router<G, F>(state: Arc<AppState<G, F>>) -> Router
where
    G: GeoProvider + 'static,
    F: FacilityProvider + 'static,
{
    Router::new()
        .route("/health", get(handlers::health::<G, F>))
        .route("/api/traceroute", post(handlers::trace::<G, F>))
        .route("/api/getLocations", post(handlers::locations::<G, F>))
        .route("/api/cables", get(handlers::cables::<G, F>))
        .route("/debug/getCables", post(handlers::nearest_cable::<G, F>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Application state backed by the live ip-api.com and PeeringDB providers.
pub fn live_state(config: &Config, catalog: Arc<CableCatalog>) -> AppState<IpApiProvider, PeeringDbProvider> {
    AppState {
        pipeline: Pipeline::live(config, catalog),
        default_hops: DEFAULT_HOPS,
        trace_use_sudo: config.trace_use_sudo,
    }
}

/// Serve until Ctrl+C.
pub async fn start(config: &Config, catalog: Arc<CableCatalog>) -> std::io::Result<()> {
    let app = build_router(Arc::new(live_state(config, catalog)));
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("Undersea trace server listening on http://{}", addr);
    log::info!("Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Cannot listen for Ctrl+C: {}", e);
            }
            log::info!("Shutting down");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cables::Cable;
    use crate::geo::GeoPoint;
    use crate::location::{Facility, FacilityFilter, GeoLookup, GeoRecord, ProviderError};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    /// Addresses under 10.x are private; everything else sits on a point
    /// derived from its last octet.
    struct FakeGeo;

    impl GeoProvider for FakeGeo {
        async fn lookup(&self, ip: &str) -> Result<GeoLookup, ProviderError> {
            if ip.starts_with("10.") {
                return Ok(GeoLookup::Private);
            }
            let last: f64 = ip
                .rsplit('.')
                .next()
                .and_then(|o| o.parse().ok())
                .ok_or_else(|| ProviderError::InvalidResponse("invalid query".into()))?;
            Ok(GeoLookup::Found(GeoRecord {
                country_code: Some("PT".into()),
                city: Some("Lisbon".into()),
                lat: Some(last),
                lon: Some(last),
                as_text: Some("AS64500 Example".into()),
                ..GeoRecord::default()
            }))
        }
    }

    struct NoFacilities;

    impl FacilityProvider for NoFacilities {
        async fn candidate_ids(&self, _asn: u32, _filter: &FacilityFilter) -> Result<Vec<u64>, ProviderError> {
            Ok(Vec::new())
        }

        async fn facility(&self, _id: u64) -> Result<Option<Facility>, ProviderError> {
            Ok(None)
        }
    }

    fn app() -> Router {
        let catalog = CableCatalog::from_cables([Cable {
            id: "west-africa".into(),
            endpoints: vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(10.0, 10.0)],
        }]);
        let config = Config { max_concurrency: 2, ..Config::default() };
        let state = AppState {
            pipeline: Pipeline::new(Arc::new(catalog), FakeGeo, NoFacilities, &config),
            default_hops: DEFAULT_HOPS,
            trace_use_sudo: false,
        };
        build_router(Arc::new(state))
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["cables"], 1);
    }

    #[tokio::test]
    async fn test_cables_listing() {
        let (status, body) = send(Request::get("/api/cables").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], "west-africa");
        assert_eq!(body[0]["endpoints"][1]["lat"], 10.0);
    }

    #[tokio::test]
    async fn test_get_locations() {
        let (status, body) = send(post_json(
            "/api/getLocations",
            r#"["10.0.0.1", "1.1.1.0", "2.2.2.0", "3.3.3.10"]"#,
        ))
        .await;
        assert_eq!(status, StatusCode::OK);

        let sites = body.as_array().unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0]["ips"], serde_json::json!(["1.1.1.0", "2.2.2.0"]));
        assert_eq!(sites[0]["source_cable"]["id"], "west-africa");
        assert_eq!(sites[1]["dest_cable"]["id"], "west-africa");
        assert!(sites[0]["distance_from"].as_f64().unwrap() > 1000.0);
    }

    #[tokio::test]
    async fn test_get_locations_empty() {
        let (status, body) = send(post_json("/api/getLocations", "[]")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
    }

    #[tokio::test]
    async fn test_get_locations_malformed_body() {
        let (status, body) = send(post_json("/api/getLocations", r#"{"ip": "1.1.1.1"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_debug_get_cables() {
        let uri = "/debug/getCables?latA=0.05&lonA=0.05&latB=9.95&lonB=9.95&tol=30";
        let (status, body) = send(Request::post(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "west-africa");
        assert_eq!(body["endpoint_A"]["lat"], 0.0);
        assert_eq!(body["endpoint_B"]["lat"], 10.0);

        let far = "/debug/getCables?latA=40&lonA=40&latB=50&lonB=50";
        let (status, body) = send(Request::post(far).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn test_debug_get_cables_negative_tolerance() {
        let uri = "/debug/getCables?latA=0&lonA=0&latB=1&lonB=1&tol=-5";
        let (status, _) = send(Request::post(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_traceroute_invalid_host_is_forbidden() {
        let uri = "/api/traceroute?host=not_a_host&hops=5";
        let (status, body) = send(Request::post(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], 403);
    }

    #[tokio::test]
    async fn test_traceroute_bad_hops() {
        let uri = "/api/traceroute?host=example.com&hops=0";
        let (status, _) = send(Request::post(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_debug_get_cables_missing_params() {
        let (status, body) = send(Request::post("/debug/getCables?latA=1").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
        assert!(body["error"].is_string());

        let uri = "/debug/getCables?latA=north&lonA=0&latB=1&lonB=1";
        let (status, body) = send(Request::post(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
    }

    #[tokio::test]
    async fn test_traceroute_missing_host() {
        let (status, body) = send(Request::post("/api/traceroute?hops=5").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
        assert!(body["error"].is_string());
    }
}
