use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod extract;
mod news;
mod users;

pub use extract::{AdminUser, CurrentUser};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let news = Router::new()
        .route("/", get(news::list_news).post(news::create_news))
        .route("/recommendations", get(news::recommended_news))
        .route(
            "/:id",
            get(news::get_news)
                .put(news::update_news)
                .delete(news::delete_news),
        )
        .route("/:id/rate", post(news::rate_news));

    let users = Router::new()
        .route("/register", post(users::register))
        .route("/admin/register", post(users::register_admin))
        .route("/login", post(users::login))
        .route("/logout", post(users::logout))
        .route("/me", get(users::me))
        .route("/verify/:token", get(users::verify_email));

    Router::new()
        .route("/api/health", get(health))
        .nest("/api/news", news)
        .nest("/api/users", users)
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn route_not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "Route not found" })),
    )
}
