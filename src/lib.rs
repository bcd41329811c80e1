// Define data modules
pub mod models;     // Data structures (Task, User, Db, etc.)
pub mod store;      // Persistent storage (load/save db.json)
pub mod levels;     // Effort levels and criteria
pub mod heuristics; // Keyword-based level and tag inference
pub mod scoring;    // Workload scoring and tag classification
pub mod logic;      // Task list filtering and ordering
pub mod auth;       // Password hashing, JWT, Google token verification
pub mod config;     // Environment configuration
pub mod error;      // HTTP error mapping
pub mod routes_auth;  // HTTP handlers for account APIs
pub mod routes_tasks; // HTTP handlers for task APIs

use std::sync::Arc;

// Import axum routing utilities and Router
use axum::{
    http::{Method, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{GoogleTokenVerifier, JwtKeys};
use crate::store::Store;

/// Collaborators shared by every handler, built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub jwt: Arc<JwtKeys>,
    pub google: Arc<dyn GoogleTokenVerifier>,
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // auth
        .route("/auth/signup", post(routes_auth::signup))
        .route("/auth/signin", post(routes_auth::signin))
        .route("/auth/google", post(routes_auth::google_signin))
        .route("/auth/profile", get(routes_auth::get_profile))
        // tasks
        .route("/tasks", get(routes_tasks::list_tasks).post(routes_tasks::create_task))
        .route("/tasks/ai/preview", post(routes_tasks::preview_score))
        .route("/tasks/subtasks/templates", get(routes_tasks::list_subtask_templates))
        .route(
            "/tasks/:id",
            get(routes_tasks::get_task)
                .put(routes_tasks::update_task)
                .delete(routes_tasks::delete_task),
        );

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .nest("/api", api)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "Sync Backend API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": endpoint_index(),
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "OK", "message": "API is running" }))
}

async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    (
        axum::http::StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Route not found",
            "message": format!("Cannot {} {}", method, uri.path()),
            "availableEndpoints": endpoint_index(),
        })),
    )
}

fn endpoint_index() -> serde_json::Value {
    json!({
        "health": "GET /health",
        "auth": {
            "signup": "POST /api/auth/signup",
            "signin": "POST /api/auth/signin",
            "google": "POST /api/auth/google",
            "profile": "GET /api/auth/profile (Protected)"
        },
        "tasks": {
            "create": "POST /api/tasks",
            "list": "GET /api/tasks",
            "detail": "GET /api/tasks/:id",
            "update": "PUT /api/tasks/:id",
            "remove": "DELETE /api/tasks/:id",
            "aiPreview": "POST /api/tasks/ai/preview",
            "subtaskTemplates": "GET /api/tasks/subtasks/templates"
        }
    })
}
