//! C9 — thin HTTP read surface over the ingested store.

pub mod models;
pub mod routes;

use axum::routing::get;
use axum::Router;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/race/:id", get(routes::get_race))
        .route("/race/:id/money-flow-timeline", get(routes::get_money_flow_timeline))
        .with_state(state)
}
