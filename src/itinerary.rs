//! Itinerary cost engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{
    city::Activity,
    trip::{Stop, StopDetail, Trip, TripDetail},
};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const DEFAULT_CATEGORY: &str = "Personal";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ItineraryError {
    #[error("end date {end} is before start date {start}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("activity {activity_id} belongs to city {activity_city_id}, but the stop is in city {stop_city_id}")]
    CityMismatch {
        activity_id: i64,
        activity_city_id: i64,
        stop_city_id: i64,
    },
    #[error("activity {activity_id} is already scheduled on stop {stop_id}")]
    Duplicate { stop_id: i64, activity_id: i64 },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{0}")]
    Validation(String),
}

impl ItineraryError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ItineraryError::InvalidRange { .. } => "invalid_range",
            ItineraryError::CityMismatch { .. } => "city_mismatch",
            ItineraryError::Duplicate { .. } => "duplicate",
            ItineraryError::NotFound { .. } => "not_found",
            ItineraryError::Validation(_) => "validation",
        }
    }
}

pub type Result<T> = std::result::Result<T, ItineraryError>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopCost {
    pub stay_cost: f64,
    pub activities_cost: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopSummary {
    #[serde(flatten)]
    pub detail: StopDetail,
    pub days: i64,
    pub cost: StopCost,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    #[serde(flatten)]
    pub trip: Trip,
    pub stops: Vec<StopSummary>,
    pub total_cost: f64,
}

pub fn validate_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if end < start {
        return Err(ItineraryError::InvalidRange { start, end });
    }
    Ok(())
}

/// Whole days covered by `[start, end]`, rounding partial days up.
///
/// A same-day range is zero days: no lodging is charged for it.
pub fn duration_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64> {
    validate_range(start, end)?;
    let millis = (end - start).num_milliseconds();
    Ok((millis + DAY_MS - 1) / DAY_MS)
}

pub fn duration_days(stop: &Stop) -> Result<i64> {
    duration_between(stop.start_date, stop.end_date)
}

pub fn compute_stop_cost(detail: &StopDetail) -> Result<StopCost> {
    let days = duration_days(&detail.stop)?;
    let stay_cost = days as f64 * detail.city.nightly_cost;
    let activities_cost = detail
        .activities
        .iter()
        .map(|scheduled| scheduled.activity.cost)
        .sum::<f64>();
    Ok(StopCost {
        stay_cost,
        activities_cost,
        total: stay_cost + activities_cost,
    })
}

pub fn compute_trip_total(trip: &TripDetail) -> Result<f64> {
    trip.stops
        .iter()
        .map(|detail| compute_stop_cost(detail).map(|cost| cost.total))
        .sum()
}

pub fn summarize(trip: TripDetail) -> Result<TripSummary> {
    let mut stops = Vec::with_capacity(trip.stops.len());
    let mut total_cost = 0.0;
    for detail in trip.stops {
        let days = duration_days(&detail.stop)?;
        let cost = compute_stop_cost(&detail)?;
        total_cost += cost.total;
        stops.push(StopSummary { detail, days, cost });
    }
    stops.sort_by_key(|summary| (summary.detail.stop.order_index, summary.detail.stop.id));
    Ok(TripSummary {
        trip: trip.trip,
        stops,
        total_cost,
    })
}

/// Where the next stop goes: the current stop count, so the new stop lands
/// at the end. Earlier deletions are not compacted.
pub fn next_order_index(stops: &[Stop]) -> i64 {
    stops.len() as i64
}

/// The index a new stop actually receives. Starts at [`next_order_index`]
/// and moves past indices still held by surviving stops, so order indices
/// stay unique within the trip.
pub fn assign_order_index(stops: &[Stop]) -> i64 {
    let mut candidate = next_order_index(stops);
    while stops.iter().any(|stop| stop.order_index == candidate) {
        candidate += 1;
    }
    candidate
}

pub fn validate_activity_city_match(stop: &Stop, activity: &Activity) -> Result<()> {
    if stop.city_id != activity.city_id {
        return Err(ItineraryError::CityMismatch {
            activity_id: activity.id,
            activity_city_id: activity.city_id,
            stop_city_id: stop.city_id,
        });
    }
    Ok(())
}

pub fn validate_attachment(detail: &StopDetail, activity: &Activity) -> Result<()> {
    validate_activity_city_match(&detail.stop, activity)?;
    let already = detail
        .activities
        .iter()
        .any(|scheduled| scheduled.activity.id == activity.id);
    if already {
        return Err(ItineraryError::Duplicate {
            stop_id: detail.stop.id,
            activity_id: activity.id,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityDraft {
    pub name: String,
    pub cost: f64,
    pub category: String,
}

impl ActivityDraft {
    pub fn custom(name: &str, cost: Option<&Value>, category: Option<&str>) -> Result<Self> {
        let name = required_name(name)?;
        let cost = parse_cost(cost).unwrap_or(0.0);
        if cost < 0.0 {
            return Err(ItineraryError::Validation(
                "cost must not be negative".into(),
            ));
        }
        let category = category
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string();
        Ok(Self {
            name,
            cost,
            category,
        })
    }

    pub fn edit(name: &str, cost: Option<&Value>, category: &str) -> Result<Self> {
        let name = required_name(name)?;
        let cost = parse_cost(cost)
            .ok_or_else(|| ItineraryError::Validation("cost must be a number".into()))?;
        if cost < 0.0 {
            return Err(ItineraryError::Validation(
                "cost must not be negative".into(),
            ));
        }
        let category = category.trim();
        if category.is_empty() {
            return Err(ItineraryError::Validation(
                "category must not be empty".into(),
            ));
        }
        Ok(Self {
            name,
            cost,
            category: category.to_string(),
        })
    }
}

fn required_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ItineraryError::Validation(
            "activity name must not be empty".into(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Reads a cost from JSON. Numbers and numeric strings count, anything else
/// (including NaN and infinities) is `None`.
pub fn parse_cost(raw: Option<&Value>) -> Option<f64> {
    let value = match raw? {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

pub fn validate_reorder(stops: &[Stop], requested: &[i64]) -> Result<()> {
    if requested.len() != stops.len() {
        return Err(ItineraryError::Validation(format!(
            "expected {} stop ids, got {}",
            stops.len(),
            requested.len()
        )));
    }
    let mut seen = Vec::with_capacity(requested.len());
    for id in requested {
        if !stops.iter().any(|stop| stop.id == *id) {
            return Err(ItineraryError::Validation(format!(
                "stop {id} is not on this trip"
            )));
        }
        if seen.contains(id) {
            return Err(ItineraryError::Validation(format!(
                "stop {id} listed more than once"
            )));
        }
        seen.push(*id);
    }
    Ok(())
}
