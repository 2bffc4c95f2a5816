use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::{json, Value};
use serde_with::{serde_as, NoneAsEmptyString};

use crate::{
    error::AppError,
    models::city::{City, CityWithActivities},
    routes::JsonBody,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cities", get(list_cities))
        .route("/cities/ensure", post(ensure_city))
        .route("/proxy/cities", get(search_cities))
}

async fn list_cities(
    State(state): State<AppState>,
) -> Result<Json<Vec<CityWithActivities>>, AppError> {
    Ok(Json(state.catalog.list_cities().await?))
}

#[serde_as]
#[derive(Deserialize)]
struct EnsureCityRequest {
    name: String,
    #[serde(default)]
    country: String,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    description: Option<String>,
}

async fn ensure_city(
    State(state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<EnsureCityRequest>,
) -> Result<Json<City>, AppError> {
    let city = state
        .catalog
        .ensure_city(&body.name, &body.country, body.description.as_deref())
        .await?;
    Ok(Json(city))
}

#[derive(Deserialize)]
struct SearchQuery {
    search: Option<String>,
}

async fn search_cities(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, AppError> {
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|search| !search.is_empty())
        .ok_or_else(|| AppError::BadRequest("search query required".into()))?;
    let results = state.discovery.search(search).await?;
    Ok(Json(json!({ "results": results })))
}
