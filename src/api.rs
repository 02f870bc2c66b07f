//! REST API for the CBM planner.
//!
//! Thin Axum handlers around the calculator, the catalogs and the packer.
//! Every error leaves the service as a JSON `{error, details}` body with
//! status 422.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use std::sync::OnceLock;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::catalog::{CAPACITY_TABLE, CONTAINER_PROFILES, find_profile};
use crate::config::{ApiConfig, CalculatorConfig};
use crate::model::{
    BoxInstance, BoxSpec, ContainerCapacity, ContainerProfile, Placement, expand_instances,
    instance_count,
};
use crate::packer::{MAX_PACK_INSTANCES, PackingResult, pack_with_config, pack_with_progress};
use crate::transfer::{CalculatorSession, ExportDocument, ImportError, export_csv, import_items};
use crate::volumetric::{FillSummary, VolumetricResult, container_fill, item_cbm, row_cbm};

#[derive(Clone)]
struct ApiState {
    calculator_config: CalculatorConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>cbm-planner API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request body for the calculator endpoints (`/cbm`, `/export`, `/export/csv`).
///
/// `precision` and `actual_weight` are optional; the configured billing
/// precision and the summed row weights are used when they are missing.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(
    example = json!({
        "items": [
            { "length": 50, "width": 40, "height": 30, "unit": "cm", "quantity": 10 }
        ],
        "precision": 0.01,
        "actual_weight": 120.0
    })
)]
pub struct CbmRequest {
    pub items: Vec<BoxSpec>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub precision: Option<f64>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub actual_weight: Option<f64>,
}

impl CbmRequest {
    fn into_session(self, config: &CalculatorConfig) -> CalculatorSession {
        let precision = self.precision.unwrap_or(config.default_precision());
        CalculatorSession::new(self.items, precision).with_actual_weight(self.actual_weight)
    }
}

/// Request body for `/pack` and `/pack_stream`.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(
    example = json!({
        "items": [
            { "length": 1.2, "width": 1.0, "height": 1.0, "unit": "m", "quantity": 5 }
        ],
        "container": "20ft Standard"
    })
)]
pub struct PackRequest {
    pub items: Vec<BoxSpec>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub container: Option<String>,
}

impl PackRequest {
    fn resolve_container(
        &self,
        config: &CalculatorConfig,
    ) -> Result<&'static ContainerProfile, RequestError> {
        match &self.container {
            Some(name) => {
                find_profile(name).ok_or_else(|| RequestError::UnknownContainer(name.clone()))
            }
            None => Ok(config.default_container()),
        }
    }

    /// Expands the rows into boxes, refusing runs above `MAX_PACK_INSTANCES`.
    fn checked_instances(&self) -> Result<Vec<BoxInstance>, RequestError> {
        let count = instance_count(&self.items);
        if count > MAX_PACK_INSTANCES as u64 {
            return Err(RequestError::TooManyBoxes {
                count,
                max: MAX_PACK_INSTANCES,
            });
        }
        Ok(expand_instances(&self.items))
    }
}

/// Volume of one row.
#[derive(Serialize, ToSchema)]
pub struct RowCbm {
    pub index: usize,
    pub item_cbm: f64,
    pub row_cbm: f64,
}

/// Response of `/cbm`.
#[derive(Serialize, ToSchema)]
pub struct CbmResponse {
    pub rows: Vec<RowCbm>,
    pub results: VolumetricResult,
}

/// Response of `/containers`.
#[derive(Serialize, ToSchema)]
pub struct ContainersResponse {
    pub default_container: String,
    pub profiles: Vec<ContainerProfile>,
    pub capacities: Vec<ContainerCapacity>,
}

/// Response of `/import`.
#[derive(Serialize, ToSchema)]
pub struct ImportResponse {
    pub items: Vec<BoxSpec>,
}

/// Response of `/pack`.
///
/// # Fields
/// * `placements` - Boxes in placement order, largest first
/// * `skipped` - Row indices of boxes with a zero dimension
/// * `fill` - Total row volume compared with the container volume
#[derive(Serialize, ToSchema)]
pub struct PackResponse {
    pub container: ContainerProfile,
    pub placements: Vec<Placement>,
    pub skipped: Vec<usize>,
    pub placed_count: usize,
    pub fallback_count: usize,
    pub layer_count: usize,
    pub grid_step: f64,
    pub is_complete: bool,
    pub packed_cbm: f64,
    pub fill: FillSummary,
}

impl PackResponse {
    fn from_packing_result(
        result: PackingResult,
        container: &ContainerProfile,
        fill: FillSummary,
    ) -> Self {
        let placed_count = result.placed_count();
        let fallback_count = result.fallback_count();
        let is_complete = result.is_complete();
        let packed_cbm = result.packed_volume();

        Self {
            container: *container,
            placements: result.placements,
            skipped: result.skipped,
            placed_count,
            fallback_count,
            layer_count: result.layer_count,
            grid_step: result.grid_step,
            is_complete,
            packed_cbm,
            fill,
        }
    }
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

/// Reasons a request is rejected.
#[derive(Debug, Error)]
enum RequestError {
    #[error("Invalid JSON data: {0}")]
    Json(#[from] JsonRejection),
    #[error("Unknown container '{0}'")]
    UnknownContainer(String),
    #[error("{count} boxes requested, at most {max} can be packed at once")]
    TooManyBoxes { count: u64, max: usize },
    #[error(transparent)]
    Import(#[from] ImportError),
}

impl RequestError {
    fn code(&self) -> &'static str {
        match self {
            RequestError::Json(_) => "invalid_json",
            RequestError::UnknownContainer(_) => "unknown_container",
            RequestError::TooManyBoxes { .. } => "too_many_boxes",
            RequestError::Import(err) => err.code(),
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        error_response(StatusCode::UNPROCESSABLE_ENTITY, self.code(), self.to_string())
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_containers,
        handle_cbm,
        handle_pack,
        handle_pack_stream,
        handle_import,
        handle_export,
        handle_export_csv
    ),
    components(
        schemas(
            BoxSpec,
            CbmRequest,
            CbmResponse,
            RowCbm,
            VolumetricResult,
            PackRequest,
            PackResponse,
            Placement,
            FillSummary,
            ContainerProfile,
            ContainerCapacity,
            ContainersResponse,
            ImportResponse,
            ExportDocument,
            ErrorResponse
        )
    ),
    tags(
        (name = "calculator", description = "CBM and chargeable weight calculation"),
        (name = "packing", description = "Container layout for visualization"),
        (name = "transfer", description = "Import and export of box lists")
    )
)]
struct ApiDoc;

fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/containers", get(handle_containers))
        .route("/cbm", post(handle_cbm))
        .route("/pack", post(handle_pack))
        .route("/pack_stream", post(handle_pack_stream))
        .route("/import", post(handle_import))
        .route("/export", post(handle_export))
        .route("/export/csv", post(handle_export_csv))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server.
///
/// Configures CORS for cross-origin requests from the calculator pages.
/// Blocks until the server is terminated.
pub async fn start_api_server(config: ApiConfig, calculator_config: CalculatorConfig) {
    let app = router(ApiState { calculator_config });

    let addr = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("❌ Could not bind API server to {}: {}", addr, err);
            return;
        }
    };

    tracing::info!(
        "🚀 Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        tracing::info!("💡 Local access: http://localhost:{}", config.port());
    }
    tracing::info!("📦 API Endpoints: GET /containers, POST /cbm, /pack, /pack_stream, /import, /export, /export/csv");
    tracing::info!("📑 Documentation: GET /docs, GET /docs/openapi.json");

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("❌ API server terminated with an error: {err}");
    }
}

/// Handler for GET /containers.
///
/// Lists the visualizer profiles and the recommendation capacity table.
#[utoipa::path(
    get,
    path = "/containers",
    responses((status = 200, description = "Container catalogs", body = ContainersResponse)),
    tag = "packing"
)]
async fn handle_containers(State(state): State<ApiState>) -> Response {
    let response = ContainersResponse {
        default_container: state.calculator_config.default_container().name.to_string(),
        profiles: CONTAINER_PROFILES.to_vec(),
        capacities: CAPACITY_TABLE.to_vec(),
    };
    Json(response).into_response()
}

/// Handler for POST /cbm.
///
/// Computes the per-row volume and the billing summary.
#[utoipa::path(
    post,
    path = "/cbm",
    request_body = CbmRequest,
    responses(
        (status = 200, description = "Calculated volume and weights", body = CbmResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "calculator"
)]
async fn handle_cbm(
    State(state): State<ApiState>,
    payload: Result<Json<CbmRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return RequestError::from(err).into_response(),
    };

    let session = request.into_session(&state.calculator_config);
    let rows = session
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| RowCbm {
            index,
            item_cbm: item_cbm(item),
            row_cbm: row_cbm(item),
        })
        .collect();
    let results = session.results();

    tracing::info!(
        "🧮 CBM request: {} rows, billed {} m³ ({})",
        session.items.len(),
        results.billed_cbm,
        results.recommended_container
    );

    Json(CbmResponse { rows, results }).into_response()
}

/// Handler for POST /pack.
///
/// Lays out every box of the rows in the chosen container.
///
/// # Parameters
/// * `payload` - Rows and an optional container name
///
/// # Returns
/// JSON response with placements, skipped rows and the fill summary
#[utoipa::path(
    post,
    path = "/pack",
    request_body = PackRequest,
    responses(
        (status = 200, description = "Container layout", body = PackResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request, unknown container or too many boxes",
            body = ErrorResponse
        ),
        (status = INTERNAL_SERVER_ERROR, description = "Packing task failed", body = ErrorResponse)
    ),
    tag = "packing"
)]
async fn handle_pack(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return RequestError::from(err).into_response(),
    };
    let container = match request.resolve_container(&state.calculator_config) {
        Ok(container) => container,
        Err(err) => return err.into_response(),
    };

    let instances = match request.checked_instances() {
        Ok(instances) => instances,
        Err(err) => return err.into_response(),
    };
    tracing::info!(
        "📥 New pack request: {} boxes from {} rows into {}",
        instances.len(),
        request.items.len(),
        container.name
    );

    let total_cbm: f64 = request.items.iter().map(row_cbm).sum();
    let packing_config = state.calculator_config.packing_config();
    let result = match tokio::task::spawn_blocking(move || {
        pack_with_config(&instances, container, packing_config)
    })
    .await
    {
        Ok(result) => result,
        Err(err) => {
            tracing::error!("❌ Packing task failed: {err}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "packing_failed",
                err.to_string(),
            );
        }
    };
    tracing::info!(
        "📦 Result: {} placed, {} fallback, {} skipped, {} layers",
        result.placed_count(),
        result.fallback_count(),
        result.skipped_count(),
        result.layer_count
    );

    let fill = container_fill(total_cbm, container);
    Json(PackResponse::from_packing_result(result, container, fill)).into_response()
}

/// Handler for POST /pack_stream (SSE).
///
/// Streams pack events in real-time as Server-Sent Events (text/event-stream),
/// so the visualizer can add boxes while the layout is computed.
#[utoipa::path(
    post,
    path = "/pack_stream",
    request_body = PackRequest,
    responses(
        (
            status = 200,
            description = "Streams pack events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request, unknown container or too many boxes",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_pack_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return RequestError::from(err).into_response(),
    };
    let container = match request.resolve_container(&state.calculator_config) {
        Ok(container) => container,
        Err(err) => return err.into_response(),
    };

    let instances = match request.checked_instances() {
        Ok(instances) => instances,
        Err(err) => return err.into_response(),
    };
    let packing_config = state.calculator_config.packing_config();
    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        let _ = pack_with_progress(&instances, container, packing_config, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver only means the client went away.
                let _ = tx.blocking_send(json);
            }
        });
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /import.
///
/// Accepts the raw text of an import file: an array of rows or `{items: [...]}`.
#[utoipa::path(
    post,
    path = "/import",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Imported rows", body = ImportResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "parse_error or format_not_recognized",
            body = ErrorResponse
        )
    ),
    tag = "transfer"
)]
async fn handle_import(body: String) -> Response {
    match import_items(&body) {
        Ok(items) => {
            tracing::info!("📂 Imported {} rows", items.len());
            Json(ImportResponse { items }).into_response()
        }
        Err(err) => {
            tracing::warn!("⚠️ Import rejected: {}", err);
            RequestError::from(err).into_response()
        }
    }
}

/// Handler for POST /export.
///
/// Returns the export document, which `/import` accepts unchanged.
#[utoipa::path(
    post,
    path = "/export",
    request_body = CbmRequest,
    responses(
        (status = 200, description = "Export document", body = ExportDocument),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "transfer"
)]
async fn handle_export(
    State(state): State<ApiState>,
    payload: Result<Json<CbmRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return RequestError::from(err).into_response(),
    };

    let session = request.into_session(&state.calculator_config);
    Json(session.export_document()).into_response()
}

/// Handler for POST /export/csv.
#[utoipa::path(
    post,
    path = "/export/csv",
    request_body = CbmRequest,
    responses(
        (status = 200, description = "Rows as CSV", content_type = "text/csv", body = String),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "transfer"
)]
async fn handle_export_csv(payload: Result<Json<CbmRequest>, JsonRejection>) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return RequestError::from(err).into_response(),
    };

    (
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        export_csv(&request.items),
    )
        .into_response()
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::LengthUnit;

    fn state() -> State<ApiState> {
        State(ApiState {
            calculator_config: CalculatorConfig::default(),
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body is readable");
        serde_json::from_slice(&bytes).expect("body is JSON")
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body is readable");
        String::from_utf8(bytes.to_vec()).expect("body is UTF-8")
    }

    fn pallets() -> Vec<BoxSpec> {
        vec![BoxSpec::new(1.2, 1.0, 1.0, LengthUnit::Meters, 5)]
    }

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        let paths = &doc.paths.paths;
        for path in [
            "/containers",
            "/cbm",
            "/pack",
            "/pack_stream",
            "/import",
            "/export",
            "/export/csv",
        ] {
            assert!(
                paths.contains_key(path),
                "OpenAPI documentation is missing the {} path",
                path
            );
        }
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let doc = openapi_doc();
        let components = doc
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        let schemas = &components.schemas;
        for name in [
            "CbmRequest",
            "PackRequest",
            "PackResponse",
            "ExportDocument",
            "ErrorResponse",
        ] {
            assert!(
                schemas.contains_key(name),
                "Expected schema '{}' is missing from the OpenAPI document",
                name
            );
        }
    }

    #[test]
    fn cbm_request_parses_optional_fields_when_absent() {
        let json = r#"{ "items": [{"length": 1, "width": 1, "height": 1}] }"#;
        let request: CbmRequest = serde_json::from_str(json).expect("Should parse valid JSON");
        assert_eq!(request.precision, None);
        assert_eq!(request.actual_weight, None);

        let session = request.into_session(&CalculatorConfig::default());
        assert_eq!(session.precision, CalculatorConfig::DEFAULT_PRECISION);
    }

    #[test]
    fn pack_request_without_container_uses_default() {
        let json = r#"{ "items": [] }"#;
        let request: PackRequest = serde_json::from_str(json).expect("Should parse valid JSON");
        let container = request
            .resolve_container(&CalculatorConfig::default())
            .expect("default container resolves");
        assert_eq!(container.name, "20ft Standard");
    }

    #[test]
    fn pack_request_with_unknown_container_is_rejected() {
        let request = PackRequest {
            items: Vec::new(),
            container: Some("53ft Reefer".to_string()),
        };
        let err = request
            .resolve_container(&CalculatorConfig::default())
            .unwrap_err();
        assert_eq!(err.code(), "unknown_container");
    }

    #[tokio::test]
    async fn containers_endpoint_lists_both_catalogs() {
        let response = handle_containers(state()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["default_container"], "20ft Standard");
        assert_eq!(body["profiles"].as_array().map(Vec::len), Some(4));
        assert_eq!(body["capacities"][0]["code"], "20GP");
    }

    #[tokio::test]
    async fn cbm_endpoint_returns_rows_and_summary() {
        let request = CbmRequest {
            items: vec![
                BoxSpec::new(1.2, 1.0, 1.0, LengthUnit::Meters, 5),
                BoxSpec::new(0.8, 0.6, 0.4, LengthUnit::Meters, 10),
            ],
            precision: Some(0.01),
            actual_weight: Some(800.0),
        };
        let response = handle_cbm(state(), Ok(Json(request))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let billed = body["results"]["billed_cbm"].as_f64().unwrap();
        assert!((billed - 7.92).abs() < 1e-9);
        assert_eq!(body["results"]["recommended_container"], "20GP");
        assert!((body["rows"][0]["row_cbm"].as_f64().unwrap() - 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn pack_endpoint_places_every_box() {
        let request = PackRequest {
            items: pallets(),
            container: Some("40ft Standard".to_string()),
        };
        let response = handle_pack(state(), Ok(Json(request))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["placed_count"], 5);
        assert_eq!(body["fallback_count"], 0);
        assert_eq!(body["is_complete"], true);
        assert_eq!(body["container"]["name"], "40ft Standard");
        assert_eq!(body["fill"]["containers_needed"], 1);
    }

    #[tokio::test]
    async fn pack_endpoint_rejects_unknown_container() {
        let request = PackRequest {
            items: pallets(),
            container: Some("Shoebox".to_string()),
        };
        let response = handle_pack(state(), Ok(Json(request))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["error"], "unknown_container");
    }

    #[tokio::test]
    async fn pack_endpoints_refuse_oversized_runs() {
        let json = r#"{ "items": [{"length": 0.1, "width": 0.1, "height": 0.1, "quantity": 1e12}] }"#;
        let request: PackRequest = serde_json::from_str(json).expect("Should parse valid JSON");

        let response = handle_pack(state(), Ok(Json(request.clone()))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"], "too_many_boxes");

        let response = handle_pack_stream(state(), Ok(Json(request))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"], "too_many_boxes");
    }

    #[test]
    fn box_limit_counts_across_rows() {
        let at_limit = PackRequest {
            items: vec![
                BoxSpec::new(0.1, 0.1, 0.1, LengthUnit::Meters, MAX_PACK_INSTANCES as u32 - 1),
                BoxSpec::new(0.1, 0.1, 0.1, LengthUnit::Meters, 1),
            ],
            container: None,
        };
        assert_eq!(
            at_limit.checked_instances().map(|boxes| boxes.len()).ok(),
            Some(MAX_PACK_INSTANCES)
        );

        let over_limit = PackRequest {
            items: vec![BoxSpec::new(0.1, 0.1, 0.1, LengthUnit::Meters, 1); MAX_PACK_INSTANCES + 1],
            container: None,
        };
        let err = over_limit.checked_instances().unwrap_err();
        assert_eq!(err.code(), "too_many_boxes");
    }

    #[tokio::test]
    async fn pack_stream_emits_events_until_finished() {
        let request = PackRequest {
            items: pallets(),
            container: None,
        };
        let response = handle_pack_stream(state(), Ok(Json(request))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("text/event-stream")
        );

        let body = body_text(response).await;
        assert_eq!(body.matches(r#""type":"ItemPlaced""#).count(), 5);
        assert!(body.contains(r#""type":"Finished""#));
    }

    #[tokio::test]
    async fn import_endpoint_reports_error_codes() {
        let response = handle_import("not json".to_string()).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"], "parse_error");

        let response = handle_import(r#"{"rows": []}"#.to_string()).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"], "format_not_recognized");

        let response = handle_import(r#"[{"length": 1, "width": 2, "height": 3}]"#.to_string()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["items"][0]["quantity"], 1);
    }

    #[tokio::test]
    async fn exported_document_imports_back() {
        let request = CbmRequest {
            items: pallets(),
            precision: None,
            actual_weight: None,
        };
        let response = handle_export(state(), Ok(Json(request))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let exported = body_text(response).await;

        let response = handle_import(exported).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["items"][0]["quantity"], 5);
    }

    #[tokio::test]
    async fn csv_export_has_header_and_rows() {
        let request = CbmRequest {
            items: pallets(),
            precision: None,
            actual_weight: None,
        };
        let response = handle_export_csv(Ok(Json(request))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let csv = body_text(response).await;
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("length,width,height,unit,qty,cbm"));
        assert_eq!(lines.next(), Some("1.2,1,1,m,5,6.000000"));
    }
}
