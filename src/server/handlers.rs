use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::cables::{Cable, CableMatch, CableMatcher};
use crate::config::validate_hops;
use crate::geo::GeoPoint;
use crate::location::{FacilityProvider, GeoProvider, MergedLocation};
use crate::traceroute::{self, TraceError, TraceResult};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

fn bad_query(e: QueryRejection) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, e.body_text())
}

impl From<TraceError> for ApiError {
    fn from(e: TraceError) -> Self {
        let status = match e {
            TraceError::InvalidHost(_) => StatusCode::FORBIDDEN,
            TraceError::Failed { .. } => StatusCode::BAD_GATEWAY,
            TraceError::Spawn { .. } | TraceError::Pattern(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        api_error(status, e.to_string())
    }
}

// ─── GET /health ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    cables: usize,
}

pub async fn health<G, F>(State(state): State<Arc<AppState<G, F>>>) -> Json<Health>
where
    G: GeoProvider,
    F: FacilityProvider,
{
    Json(Health {
        status: "ok",
        cables: state.pipeline.catalog().len(),
    })
}

// ─── POST /api/traceroute ────────────────────────────────────────

#[derive(Deserialize)]
pub struct TraceQuery {
    pub host: String,
    pub hops: Option<u32>,
}

pub async fn trace<G, F>(
    State(state): State<Arc<AppState<G, F>>>,
    params: Result<Query<TraceQuery>, QueryRejection>,
) -> Result<Json<TraceResult>, ApiError>
where
    G: GeoProvider,
    F: FacilityProvider,
{
    let start = Instant::now();
    let Query(params) = params.map_err(bad_query)?;
    let hops = validate_hops(params.hops.unwrap_or(state.default_hops))
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let result = traceroute::run(&params.host, hops, state.trace_use_sudo).await?;

    log::info!(
        "POST /api/traceroute?host={} -> {} addresses ({:.1}ms)",
        params.host,
        result.ip_addresses.len(),
        start.elapsed().as_secs_f64() * 1000.0,
    );
    Ok(Json(result))
}

// ─── POST /api/getLocations ──────────────────────────────────────

pub async fn locations<G, F>(
    State(state): State<Arc<AppState<G, F>>>,
    payload: Result<Json<Vec<String>>, JsonRejection>,
) -> Result<Json<Vec<MergedLocation>>, ApiError>
where
    G: GeoProvider,
    F: FacilityProvider,
{
    let Json(ips) = payload.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;
    if ips.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Expected a non-empty JSON array of IP addresses"));
    }

    let start = Instant::now();
    let merged = state.pipeline.run(&ips).await;

    log::info!(
        "POST /api/getLocations [{} ips] -> {} sites ({:.1}ms)",
        ips.len(),
        merged.len(),
        start.elapsed().as_secs_f64() * 1000.0,
    );
    Ok(Json(merged))
}

// ─── GET /api/cables ─────────────────────────────────────────────

pub async fn cables<G, F>(State(state): State<Arc<AppState<G, F>>>) -> Json<Vec<Cable>>
where
    G: GeoProvider,
    F: FacilityProvider,
{
    Json(state.pipeline.catalog().cables().to_vec())
}

// ─── POST /debug/getCables ───────────────────────────────────────

#[derive(Deserialize)]
pub struct CableQuery {
    #[serde(rename = "latA")]
    pub lat_a: f64,
    #[serde(rename = "lonA")]
    pub lon_a: f64,
    #[serde(rename = "latB")]
    pub lat_b: f64,
    #[serde(rename = "lonB")]
    pub lon_b: f64,
    pub tol: Option<f64>,
}

pub async fn nearest_cable<G, F>(
    State(state): State<Arc<AppState<G, F>>>,
    q: Result<Query<CableQuery>, QueryRejection>,
) -> Result<Json<Option<CableMatch>>, ApiError>
where
    G: GeoProvider,
    F: FacilityProvider,
{
    let Query(q) = q.map_err(bad_query)?;
    let tolerance = q.tol.unwrap_or_else(|| state.pipeline.tolerance_km());
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(api_error(StatusCode::BAD_REQUEST, format!("Invalid tolerance {}", tolerance)));
    }

    let a = GeoPoint::new(q.lat_a, q.lon_a);
    let b = GeoPoint::new(q.lat_b, q.lon_b);
    let found = CableMatcher::new(state.pipeline.catalog()).find_nearest_cable(a, b, tolerance);

    log::debug!(
        "POST /debug/getCables ({}) -> ({}) tol={} -> {:?}",
        a,
        b,
        tolerance,
        found.as_ref().map(|m| m.id.as_str())
    );
    Ok(Json(found))
}
