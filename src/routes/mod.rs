pub mod cities;
pub mod public;
pub mod trips;

use axum::{Json, Router};
use axum_extra::extract::WithRejection;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{error::AppError, state::AppState};

/// JSON request body whose rejections render as [`AppError`].
pub type JsonBody<T> = WithRejection<Json<T>, AppError>;

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(public::router())
        .merge(trips::router())
        .merge(cities::router());

    Router::new()
        .nest("/api", api)
        .fallback_service(ServeDir::new(&state.config.static_root))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
