pub mod audit;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod policy;
pub mod registry;
pub mod services;
pub mod state;
pub mod types;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{get, patch, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::middleware::jwt_auth_middleware;
use crate::registry::catalog::GENERIC;
use crate::state::AppState;

/// Full application router: public tier, JWT-protected tier, static uploads.
pub fn app(state: AppState) -> Router {
    let protected = protected_routes()
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        // Protected API
        .merge(protected)
        // Stored files
        .nest_service("/uploads", ServeDir::new(state.uploads.root()))
        // Global middleware
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
        .layer(cors_layer(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    if state.config.is_development() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = state
        .config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

fn public_routes() -> Router<AppState> {
    use handlers::public::{auth_login, portal};

    Router::new()
        .route("/api/auth/login", post(auth_login))
        .route("/api/public/officials", get(portal::officials))
        .route("/api/public/projects", get(portal::projects))
        .route("/api/public/residents/verify", post(portal::verify_resident))
        .route("/api/public/requests", post(portal::submit_request))
}

fn protected_routes() -> Router<AppState> {
    let mut router = Router::new()
        .merge(account_routes())
        .merge(resident_routes())
        .merge(household_routes())
        .merge(civil_routes())
        .merge(request_routes())
        .merge(insight_routes())
        .route("/api/uploads/:category", post(handlers::protected::uploads::upload));

    for def in GENERIC.iter().copied() {
        router = router.merge(handlers::protected::records::routes(def));
    }
    router
}

fn account_routes() -> Router<AppState> {
    use handlers::protected::{auth_me, users};

    Router::new()
        .route("/api/auth/me", get(auth_me))
        .route("/api/users", get(users::list).post(users::create))
        .route(
            "/api/users/:id",
            get(users::get).put(users::update).delete(users::delete),
        )
}

fn resident_routes() -> Router<AppState> {
    use handlers::protected::residents;

    Router::new()
        .route("/api/residents", get(residents::list).post(residents::create))
        .route("/api/residents/restore", post(residents::restore_bulk))
        .route(
            "/api/residents/:id",
            get(residents::get).put(residents::update).delete(residents::delete),
        )
        .route("/api/residents/:id/restore", post(residents::restore))
}

fn household_routes() -> Router<AppState> {
    use handlers::protected::households;

    Router::new()
        .route("/api/households", get(households::list).post(households::create))
        .route(
            "/api/households/:id",
            get(households::get).put(households::update).delete(households::delete),
        )
        .route("/api/households/:id/head", put(households::set_head))
}

fn civil_routes() -> Router<AppState> {
    use handlers::protected::{deaths, officials};

    Router::new()
        .route("/api/deaths", get(deaths::list).post(deaths::create))
        .route(
            "/api/deaths/:id",
            get(deaths::get).put(deaths::update).delete(deaths::delete),
        )
        .route("/api/officials", get(officials::list).post(officials::create))
        .route(
            "/api/officials/:id",
            get(officials::get).put(officials::update).delete(officials::delete),
        )
        .route("/api/official-positions", get(officials::positions))
}

fn request_routes() -> Router<AppState> {
    use handlers::protected::requests;

    Router::new()
        .route("/api/requests", get(requests::list).post(requests::create))
        .route("/api/requests/:id", get(requests::get).delete(requests::delete))
        .route("/api/requests/:id/status", patch(requests::set_status))
        .route("/api/certificate-types", get(requests::certificate_types))
}

fn insight_routes() -> Router<AppState> {
    use handlers::protected::{activity, dashboard, notifications, reports};

    Router::new()
        .route("/api/activity-logs", get(activity::list))
        .route("/api/activity-logs/stats", get(activity::stats))
        .route("/api/dashboard/stats", get(dashboard::stats))
        .route("/api/dashboard/secretary", get(dashboard::secretary))
        .route("/api/notifications/counts", get(notifications::counts))
        .route("/api/notifications/viewed", post(notifications::viewed))
        .route("/api/notifications/viewed-all", post(notifications::viewed_all))
        .route("/api/reports/age-distribution", get(reports::age_distribution))
        .route("/api/reports/residents", get(reports::residents))
        .route("/api/reports/households", get(reports::households))
        .route("/api/reports/complaints", get(reports::complaints))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Barangay Records API",
            "version": version,
            "description": "Records management backend for barangay offices",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "login": "/api/auth/login (public - token acquisition)",
                "portal": "/api/public/{officials,projects,residents/verify,requests} (public)",
                "records": "/api/{residents,households,deaths,officials,requests,...} (protected)",
                "insights": "/api/{dashboard,reports,activity-logs,notifications}/* (protected)",
                "uploads": "/api/uploads/:category (protected), /uploads/* (static)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "message": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database_error": e.to_string()
                    }
                })),
            )
        }
    }
}
