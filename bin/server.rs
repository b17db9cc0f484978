// Kempo Registry - REST API server
// Thin HTTP shell over the resolution library; no auth layer here

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use kempo_registry::{
    delete_participant, get_all_participants, get_matches_for_participant, get_participant,
    insert_participant, setup_database, statistics_for, NewParticipant, Registrant,
    ResolutionEngine, SqliteLookup, ValidationError,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    engine: Arc<ResolutionEngine>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: impl ToString) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ValidationFailure {
    errors: Vec<ValidationError>,
}

#[derive(Deserialize)]
struct EmailCheckRequest {
    email: String,
}

#[derive(Serialize)]
struct EmailCheckResponse {
    email: String,
    taken: bool,
}

#[derive(Serialize)]
struct CreatedResponse {
    id: i64,
}

/// Create request (snake_case JSON; roster CSV uses its own headers)
#[derive(Deserialize)]
struct CreateParticipantRequest {
    first_name: String,
    last_name: String,
    birth_date: String,
    email: String,
    club: String,
    weight: f64,
    grade: String,
}

impl From<CreateParticipantRequest> for NewParticipant {
    fn from(r: CreateParticipantRequest) -> Self {
        NewParticipant {
            first_name: r.first_name,
            last_name: r.last_name,
            birth_date: r.birth_date,
            email: r.email,
            club: r.club,
            weight: r.weight,
            grade: r.grade,
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/participants/check - Resolve a registrant against the store
async fn check_participant(
    State(state): State<AppState>,
    Json(registrant): Json<Registrant>,
) -> impl IntoResponse {
    if let Err(errors) = registrant.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::ok(ValidationFailure { errors })),
        )
            .into_response();
    }

    let conn = state.db.lock().unwrap();
    let lookup = SqliteLookup::new(&conn);

    match state.engine.resolve(&lookup, &registrant) {
        Ok(resolution) => (StatusCode::OK, Json(ApiResponse::ok(resolution))).into_response(),
        Err(e) => {
            eprintln!("Error resolving registrant: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(e)),
            )
                .into_response()
        }
    }
}

/// POST /api/participants/check-email - Email availability pre-check
async fn check_email(
    State(state): State<AppState>,
    Json(request): Json<EmailCheckRequest>,
) -> impl IntoResponse {
    if request.email.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::err("email is required")),
        )
            .into_response();
    }

    let conn = state.db.lock().unwrap();
    let lookup = SqliteLookup::new(&conn);

    match state.engine.is_email_taken(&lookup, &request.email) {
        Ok(taken) => {
            // 409 mirrors the registration flow's reaction to a taken email
            let status = if taken {
                StatusCode::CONFLICT
            } else {
                StatusCode::OK
            };

            (
                status,
                Json(ApiResponse::ok(EmailCheckResponse {
                    email: request.email,
                    taken,
                })),
            )
                .into_response()
        }
        Err(e) => {
            eprintln!("Error checking email: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(e)),
            )
                .into_response()
        }
    }
}

/// GET /api/participants - All participants
async fn list_participants(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match get_all_participants(&conn) {
        Ok(participants) => (StatusCode::OK, Json(ApiResponse::ok(participants))).into_response(),
        Err(e) => {
            eprintln!("Error listing participants: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(e)),
            )
                .into_response()
        }
    }
}

/// GET /api/participants/:id - One participant
async fn get_participant_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match get_participant(&conn, id) {
        Ok(Some(participant)) => {
            (StatusCode::OK, Json(ApiResponse::ok(participant))).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err(format!("participant {} not found", id))),
        )
            .into_response(),
        Err(e) => {
            eprintln!("Error getting participant {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(e)),
            )
                .into_response()
        }
    }
}

/// POST /api/participants - Create after validation + email availability
async fn create_participant(
    State(state): State<AppState>,
    Json(request): Json<CreateParticipantRequest>,
) -> impl IntoResponse {
    let participant = NewParticipant::from(request);
    let registrant = participant.to_registrant();
    if let Err(errors) = registrant.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::ok(ValidationFailure { errors })),
        )
            .into_response();
    }

    let conn = state.db.lock().unwrap();
    let lookup = SqliteLookup::new(&conn);

    match state.engine.is_email_taken(&lookup, &registrant.email) {
        Ok(true) => (
            StatusCode::CONFLICT,
            Json(ApiResponse::err("email already in use")),
        )
            .into_response(),
        Ok(false) => match insert_participant(&conn, &participant) {
            Ok(id) => (
                StatusCode::CREATED,
                Json(ApiResponse::ok(CreatedResponse { id })),
            )
                .into_response(),
            Err(e) => {
                eprintln!("Error creating participant: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::err(e)),
                )
                    .into_response()
            }
        },
        Err(e) => {
            eprintln!("Error checking email before create: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(e)),
            )
                .into_response()
        }
    }
}

/// DELETE /api/participants/:id
async fn remove_participant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match delete_participant(&conn, id) {
        Ok(true) => (StatusCode::OK, Json(ApiResponse::ok("deleted"))).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err(format!("participant {} not found", id))),
        )
            .into_response(),
        Err(e) => {
            eprintln!("Error deleting participant {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(e)),
            )
                .into_response()
        }
    }
}

/// GET /api/participants/:id/statistics - Match history + aggregate totals
async fn participant_statistics(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match get_participant(&conn, id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::err(format!("participant {} not found", id))),
            )
                .into_response();
        }
        Err(e) => {
            eprintln!("Error getting participant {}: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(e)),
            )
                .into_response();
        }
    }

    match get_matches_for_participant(&conn, id) {
        Ok(records) => {
            let statistics = statistics_for(id, &records);
            (StatusCode::OK, Json(ApiResponse::ok(statistics))).into_response()
        }
        Err(e) => {
            eprintln!("Error getting matches for participant {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(e)),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    println!("🌐 Kempo Registry - API Server");

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "registry.db".to_string());

    let conn = Connection::open(&db_path).expect("Failed to open registry database");
    setup_database(&conn).expect("Failed to initialize registry schema");
    println!("✓ Registry opened: {}", db_path);

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        engine: Arc::new(ResolutionEngine::new()),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/participants/check", post(check_participant))
        .route("/participants/check-email", post(check_email))
        .route(
            "/participants",
            get(list_participants).post(create_participant),
        )
        .route(
            "/participants/:id",
            get(get_participant_by_id).delete(remove_participant),
        )
        .route("/participants/:id/statistics", get(participant_statistics))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    println!("\n🚀 Server running on http://localhost:3000");
    println!("   Check: POST http://localhost:3000/api/participants/check");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
