use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use crate::{
    auth::CurrentUser,
    error::AppError,
    itinerary::{self, TripSummary},
    models::{
        dates::FlexibleDate,
        trip::{NewTrip, ScheduledActivity, Stop, StopActivity, Trip},
    },
    routes::JsonBody,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips", get(list_trips).post(create_trip))
        .route("/trips/:id", get(trip_detail))
        .route("/trips/:id/stops", post(add_stop))
        .route("/trips/:id/stops/order", put(reorder_stops))
        .route("/stops/:id", put(update_stop).delete(remove_stop))
        .route("/stops/:id/activities", post(attach_activity))
        .route("/stops/:id/custom-activity", post(attach_custom_activity))
        .route(
            "/stop-activities/:id",
            put(update_stop_activity).delete(detach_activity),
        )
}

async fn list_trips(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<TripSummary>>, AppError> {
    let user = current.require_user()?;
    let trips = state.trips.list_trips(user.id).await?;
    let summaries = trips
        .into_iter()
        .map(itinerary::summarize)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(summaries))
}

#[serde_as]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTripRequest {
    name: String,
    #[serde_as(as = "FlexibleDate")]
    start_date: DateTime<Utc>,
    #[serde_as(as = "FlexibleDate")]
    end_date: DateTime<Utc>,
    #[serde(default)]
    description: Option<String>,
}

async fn create_trip(
    State(state): State<AppState>,
    current: CurrentUser,
    WithRejection(Json(body), _): JsonBody<CreateTripRequest>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let user = current.require_user()?;
    let trip = state
        .trips
        .create_trip(
            user.id,
            NewTrip {
                name: body.name,
                start_date: body.start_date,
                end_date: body.end_date,
                description: body.description,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

async fn trip_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
) -> Result<Json<TripSummary>, AppError> {
    let user = current.require_user()?;
    let trip = state.trips.load_trip(user.id, trip_id).await?;
    Ok(Json(itinerary::summarize(trip)?))
}

#[serde_as]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddStopRequest {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    city_id: i64,
    #[serde_as(as = "FlexibleDate")]
    start_date: DateTime<Utc>,
    #[serde_as(as = "FlexibleDate")]
    end_date: DateTime<Utc>,
}

async fn add_stop(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
    WithRejection(Json(body), _): JsonBody<AddStopRequest>,
) -> Result<(StatusCode, Json<Stop>), AppError> {
    let user = current.require_user()?;
    let stop = state
        .itinerary
        .add_stop(user.id, trip_id, body.city_id, body.start_date, body.end_date)
        .await?;
    Ok((StatusCode::CREATED, Json(stop)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReorderRequest {
    stop_ids: Vec<i64>,
}

async fn reorder_stops(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
    WithRejection(Json(body), _): JsonBody<ReorderRequest>,
) -> Result<Json<Vec<Stop>>, AppError> {
    let user = current.require_user()?;
    let stops = state
        .itinerary
        .reorder_stops(user.id, trip_id, &body.stop_ids)
        .await?;
    Ok(Json(stops))
}

#[serde_as]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateStopRequest {
    #[serde_as(as = "FlexibleDate")]
    start_date: DateTime<Utc>,
    #[serde_as(as = "FlexibleDate")]
    end_date: DateTime<Utc>,
}

async fn update_stop(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(stop_id): Path<i64>,
    WithRejection(Json(body), _): JsonBody<UpdateStopRequest>,
) -> Result<Json<Stop>, AppError> {
    let user = current.require_user()?;
    let stop = state
        .itinerary
        .update_stop_dates(user.id, stop_id, body.start_date, body.end_date)
        .await?;
    Ok(Json(stop))
}

async fn remove_stop(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(stop_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let user = current.require_user()?;
    state.itinerary.remove_stop(user.id, stop_id).await?;
    Ok(Json(json!({ "success": true })))
}

#[serde_as]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachActivityRequest {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    activity_id: i64,
}

async fn attach_activity(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(stop_id): Path<i64>,
    WithRejection(Json(body), _): JsonBody<AttachActivityRequest>,
) -> Result<(StatusCode, Json<StopActivity>), AppError> {
    let user = current.require_user()?;
    let link = state
        .itinerary
        .attach_activity(user.id, stop_id, body.activity_id)
        .await?;
    Ok((StatusCode::CREATED, Json(link)))
}

#[derive(Deserialize)]
struct CustomActivityRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    cost: Option<Value>,
    #[serde(default)]
    category: Option<String>,
}

async fn attach_custom_activity(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(stop_id): Path<i64>,
    WithRejection(Json(body), _): JsonBody<CustomActivityRequest>,
) -> Result<(StatusCode, Json<ScheduledActivity>), AppError> {
    let user = current.require_user()?;
    let scheduled = state
        .itinerary
        .attach_custom_activity(
            user.id,
            stop_id,
            &body.name,
            body.cost.as_ref(),
            body.category.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(scheduled)))
}

#[derive(Deserialize)]
struct UpdateActivityRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    cost: Option<Value>,
    #[serde(default)]
    category: String,
}

async fn update_stop_activity(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(link_id): Path<i64>,
    WithRejection(Json(body), _): JsonBody<UpdateActivityRequest>,
) -> Result<Json<ScheduledActivity>, AppError> {
    let user = current.require_user()?;
    let scheduled = state
        .itinerary
        .update_scheduled_activity(
            user.id,
            link_id,
            &body.name,
            body.cost.as_ref(),
            &body.category,
        )
        .await?;
    Ok(Json(scheduled))
}

async fn detach_activity(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(link_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let user = current.require_user()?;
    state.itinerary.detach_activity(user.id, link_id).await?;
    Ok(Json(json!({ "success": true })))
}
