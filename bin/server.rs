// Financial Reconciliation - Web Server
// REST API with Axum: resolve companies and reconcile extracted data

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use financial_reconciliation::{
    init_tracing, AppConfig, EntityStore, FieldMap, MatchKind, ReconcileError,
    ReconciliationEngine, Resolution, StoreError,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<EntityStore>,
    engine: Arc<ReconciliationEngine>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body: ApiResponse<()> = ApiResponse {
        success: false,
        data: None,
        error: Some(message.into()),
    };
    (status, Json(body)).into_response()
}

/// Company list entry
#[derive(Serialize)]
struct CompanySummary {
    name: String,
    href: String,
}

/// Single company response
#[derive(Serialize)]
struct CompanyResponse {
    match_kind: MatchKind,
    record: FieldMap,
}

fn status_for(err: &ReconcileError) -> StatusCode {
    match err {
        ReconcileError::EmptyExtraction
        | ReconcileError::MissingIdentity(_)
        | ReconcileError::InvalidIdentity { .. } => StatusCode::BAD_REQUEST,
        ReconcileError::NotFound(_) => StatusCode::NOT_FOUND,
        ReconcileError::Store(StoreError::Unloaded) => StatusCode::SERVICE_UNAVAILABLE,
        ReconcileError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Store status
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.store.status()))
}

/// GET /api/companies - Every canonical company name
async fn list_companies(State(state): State<AppState>) -> Response {
    match state.store.names() {
        Ok(names) => {
            let companies: Vec<CompanySummary> = names
                .into_iter()
                .map(|name| CompanySummary {
                    href: format!("/api/companies/{}", urlencoding::encode(&name)),
                    name,
                })
                .collect();
            (StatusCode::OK, Json(ApiResponse::ok(companies))).into_response()
        }
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

/// GET /api/companies/:name - Resolve one company (exact, then whitespace-insensitive)
async fn get_company(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.store.resolve(&name) {
        Resolution::Found { record, kind } => {
            let response = CompanyResponse {
                match_kind: kind,
                record: record.to_fields(),
            };
            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Resolution::NotFound => error_response(
            StatusCode::NOT_FOUND,
            format!("No data found for company {}", name),
        ),
        Resolution::Unloaded => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, StoreError::Unloaded.to_string())
        }
    }
}

/// POST /api/reconcile - Compare extracted fields with the stored record
async fn reconcile(
    State(state): State<AppState>,
    payload: Result<Json<FieldMap>, JsonRejection>,
) -> Response {
    // Bodies that are not a flat map of numbers and strings still get the envelope
    let extracted = match payload {
        Ok(Json(fields)) => fields,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    match state.engine.reconcile(&state.store, extracted) {
        Ok(report) => (StatusCode::OK, Json(ApiResponse::ok(report))).into_response(),
        Err(e) => error_response(status_for(&e), e.to_string()),
    }
}

/// POST /api/reload - Re-read the dataset (all-or-nothing)
async fn reload(State(state): State<AppState>) -> Response {
    let store = Arc::clone(&state.store);

    match tokio::task::spawn_blocking(move || store.reload()).await {
        Ok(Ok(summary)) => (StatusCode::OK, Json(ApiResponse::ok(summary))).into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "Dataset reload failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/companies", get(list_companies))
        .route("/companies/:name", get(get_company))
        .route("/reconcile", post(reconcile))
        .route("/reload", post(reload))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    info!(dataset = %config.database_file.display(), "Starting reconciliation server");

    let store = Arc::new(EntityStore::with_source(&config.database_file));
    if let Err(e) = store.load() {
        error!(error = %e, "Failed to load the dataset");
        anyhow::bail!("Failed to load dataset {}: {}", config.database_file.display(), e);
    }

    let state = AppState {
        store,
        engine: Arc::new(ReconciliationEngine::new()),
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Server running");
    println!("\n🚀 Server running on http://{}", config.bind_addr);
    println!("   API: POST http://{}/api/reconcile", config.bind_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::io::Write;
    use tower::ServiceExt;

    const DATASET: &str = "Company Name,Industry,Location,Market Capitalization,\
Revenue (in millions),EBITDA (in millions),Net Income (in millions),Debt (in millions),\
Equity (in millions),Enterprise Value (in millions),P/E Ratio,Revenue Growth Rate (%),\
EBITDA Margin (%),Net Income Margin (%),ROE (Return on Equity) (%),ROA (Return on Assets) (%),\
Current Ratio,Debt to Equity Ratio
ExampleCo,Tech,\"San Francisco, CA\",5000,1500,500,200,300,2000,5200,25,10,33.33,13.33,10,5,2.0,0.15
HealthInc,Healthcare,\"New York, NY\",3000,1000,250,80,150,666,3150,15,12,40,8,13.33,10,1.5,0.25
";

    fn state_with(store: EntityStore) -> AppState {
        AppState {
            store: Arc::new(store),
            engine: Arc::new(ReconciliationEngine::new()),
        }
    }

    fn loaded_state() -> AppState {
        let store = EntityStore::new();
        store.load_reader(DATASET.as_bytes(), "test.csv").unwrap();
        state_with(store)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(build_router(loaded_state()), get_request("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["loaded"], json!(true));
        assert_eq!(body["data"]["summary"]["records"], json!(2));
    }

    #[tokio::test]
    async fn test_reconcile_all_match() {
        let extracted = json!({
            "Company Name": "ExampleCo",
            "Industry": "Tech",
            "Market Capitalization": 5000,
            "Revenue (in millions)": 1500.0,
            "Location": "San Francisco, CA"
        });

        let (status, body) =
            send(build_router(loaded_state()), post_json("/api/reconcile", extracted.clone())).await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["company_name"], json!("ExampleCo"));
        assert_eq!(data["extracted_data"], extracted);
        assert_eq!(data["stored_data"]["Industry"], json!("Tech"));
        for key in extracted.as_object().unwrap().keys() {
            assert_eq!(data["discrepancies"][key]["match"], json!(true), "{}", key);
        }
    }

    #[tokio::test]
    async fn test_reconcile_reports_mismatch() {
        let (status, body) = send(
            build_router(loaded_state()),
            post_json(
                "/api/reconcile",
                json!({"Company Name": "Example Co", "Revenue (in millions)": 1400.0}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let revenue = &body["data"]["discrepancies"]["Revenue (in millions)"];
        assert_eq!(revenue["extracted"], json!(1400.0));
        assert_eq!(revenue["stored"], json!(1500.0));
        assert_eq!(revenue["match"], json!(false));
        assert_eq!(body["data"]["match_kind"], json!("normalized"));
    }

    #[tokio::test]
    async fn test_reconcile_company_not_found() {
        let (status, body) = send(
            build_router(loaded_state()),
            post_json("/api/reconcile", json!({"Company Name": "NonExistentCo"})),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"], json!("No data found for company NonExistentCo"));
    }

    fn post_raw(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_reconcile_rejects_non_scalar_fields_with_envelope() {
        for body in [
            json!({"Company Name": "ExampleCo", "Audited": true}),
            json!({"Company Name": "ExampleCo", "Current Ratio": null}),
        ] {
            let (status, reply) =
                send(build_router(loaded_state()), post_json("/api/reconcile", body)).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(reply["success"], json!(false));
            assert!(reply["error"].as_str().unwrap().contains("deserialize"), "{}", reply);
        }
    }

    #[tokio::test]
    async fn test_reconcile_rejects_malformed_json_with_envelope() {
        let (status, reply) =
            send(build_router(loaded_state()), post_raw("/api/reconcile", "not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply["success"], json!(false));
        assert!(reply["error"].is_string());
    }

    #[tokio::test]
    async fn test_reconcile_no_company_name() {
        let (status, body) = send(
            build_router(loaded_state()),
            post_json("/api/reconcile", json!({"Market Capitalization": 5000})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Company Name not found in extracted data."));
    }

    #[tokio::test]
    async fn test_reconcile_empty_extraction() {
        let (status, _) =
            send(build_router(loaded_state()), post_json("/api/reconcile", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reconcile_unloaded_store() {
        let (status, _) = send(
            build_router(state_with(EntityStore::new())),
            post_json("/api/reconcile", json!({"Company Name": "ExampleCo"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_get_company_normalized() {
        let (status, body) =
            send(build_router(loaded_state()), get_request("/api/companies/Health%20Inc")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["match_kind"], json!("normalized"));
        assert_eq!(body["data"]["record"]["Company Name"], json!("HealthInc"));
        assert_eq!(body["data"]["record"]["Market Capitalization"], json!(3000));
    }

    #[tokio::test]
    async fn test_get_company_not_found() {
        let (status, _) = send(build_router(loaded_state()), get_request("/api/companies/Nobody")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_companies() {
        let (status, body) = send(build_router(loaded_state()), get_request("/api/companies")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["name"], json!("ExampleCo"));
        assert_eq!(body["data"][1]["href"], json!("/api/companies/HealthInc"));
    }

    #[tokio::test]
    async fn test_reload_failure_unloads_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DATASET.as_bytes()).unwrap();

        let store = EntityStore::with_source(file.path());
        store.load().unwrap();
        let state = state_with(store);

        let (status, body) = send(build_router(state.clone()), post_json("/api/reload", json!(null))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["records"], json!(2));

        // Source disappears: reload fails and nothing stale is served
        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());

        let (status, _) = send(build_router(state.clone()), post_json("/api/reload", json!(null))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = send(
            build_router(state),
            post_json("/api/reconcile", json!({"Company Name": "ExampleCo"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
