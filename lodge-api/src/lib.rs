use axum::{http::Method, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod availability;
pub mod demand;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
pub mod error;
pub mod notifications;
pub mod presence;
pub mod reservations;
pub mod sse;
pub mod state;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let router = Router::new()
        .route("/health", get(health))
        .merge(availability::routes())
        .merge(presence::routes())
        .merge(demand::routes())
        .merge(reservations::routes())
        .merge(notifications::routes());

    #[cfg(feature = "diagnostics")]
    let router = router.merge(diagnostics::routes());

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
