use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::city::{Activity, City};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: i64,
    pub trip_id: i64,
    pub city_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Sort key among the trip's stops. Not dense: deletions leave gaps.
    pub order_index: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StopActivity {
    pub id: i64,
    pub stop_id: i64,
    pub activity_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledActivity {
    pub id: i64,
    pub stop_id: i64,
    pub activity: Activity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopDetail {
    #[serde(flatten)]
    pub stop: Stop,
    pub city: City,
    pub activities: Vec<ScheduledActivity>,
    /// The city's catalog, only loaded for the single-trip view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<Vec<Activity>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDetail {
    #[serde(flatten)]
    pub trip: Trip,
    pub stops: Vec<StopDetail>,
}

impl TripDetail {
    pub fn stop(&self, stop_id: i64) -> Option<&StopDetail> {
        self.stops.iter().find(|detail| detail.stop.id == stop_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewTrip {
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub description: Option<String>,
}
