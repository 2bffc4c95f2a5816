use std::collections::HashMap;

use chrono::Utc;
use sqlx::{FromRow, SqliteConnection};
use tracing::info;

use crate::{
    db::DbPool,
    error::AppError,
    itinerary::{self, ItineraryError},
    models::{
        city::{Activity, City},
        trip::{NewTrip, ScheduledActivity, Stop, StopDetail, Trip, TripDetail},
    },
};

#[derive(Clone)]
pub struct TripService {
    db: DbPool,
}

impl TripService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn create_trip(&self, user_id: i64, new_trip: NewTrip) -> Result<Trip, AppError> {
        let name = new_trip.name.trim();
        if name.is_empty() {
            return Err(ItineraryError::Validation("trip name must not be empty".into()).into());
        }
        itinerary::validate_range(new_trip.start_date, new_trip.end_date)?;
        let description = new_trip
            .description
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        let trip = sqlx::query_as::<_, Trip>(
            "INSERT INTO trips (user_id, name, start_date, end_date, description, created_at)
             VALUES (?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(user_id)
        .bind(name)
        .bind(new_trip.start_date)
        .bind(new_trip.end_date)
        .bind(description)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        info!(trip_id = trip.id, user_id, "created trip");
        Ok(trip)
    }

    pub async fn list_trips(&self, user_id: i64) -> Result<Vec<TripDetail>, AppError> {
        let mut conn = self.db.acquire().await?;
        let trips = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

        let mut details = Vec::with_capacity(trips.len());
        for trip in trips {
            details.push(assemble(&mut conn, trip, false).await?);
        }
        details.sort_by(|a, b| {
            b.trip
                .start_date
                .cmp(&a.trip.start_date)
                .then(b.trip.id.cmp(&a.trip.id))
        });
        Ok(details)
    }

    pub async fn load_trip(&self, user_id: i64, trip_id: i64) -> Result<TripDetail, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(load_owned_trip(&mut conn, user_id, trip_id, true).await?)
    }
}

#[derive(FromRow)]
struct ScheduledRow {
    link_id: i64,
    stop_id: i64,
    #[sqlx(flatten)]
    activity: Activity,
}

/// Loads a trip that belongs to `user_id`. Someone else's trip is reported
/// exactly like a missing one.
pub(crate) async fn load_owned_trip(
    conn: &mut SqliteConnection,
    user_id: i64,
    trip_id: i64,
    with_catalog: bool,
) -> Result<TripDetail, AppError> {
    let trip = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = ?")
        .bind(trip_id)
        .fetch_optional(&mut *conn)
        .await?
        .filter(|trip| trip.user_id == user_id)
        .ok_or_else(|| ItineraryError::not_found("trip", trip_id))?;
    assemble(conn, trip, with_catalog).await
}

async fn assemble(
    conn: &mut SqliteConnection,
    trip: Trip,
    with_catalog: bool,
) -> Result<TripDetail, AppError> {
    let stops = sqlx::query_as::<_, Stop>(
        "SELECT * FROM stops WHERE trip_id = ? ORDER BY order_index, id",
    )
    .bind(trip.id)
    .fetch_all(&mut *conn)
    .await?;

    let cities: HashMap<i64, City> = sqlx::query_as::<_, City>(
        "SELECT * FROM cities WHERE id IN (SELECT city_id FROM stops WHERE trip_id = ?)",
    )
    .bind(trip.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|city| (city.id, city))
    .collect();

    let scheduled = sqlx::query_as::<_, ScheduledRow>(
        "SELECT sa.id AS link_id, sa.stop_id AS stop_id, a.*
         FROM stop_activities sa
         JOIN activities a ON a.id = sa.activity_id
         JOIN stops s ON s.id = sa.stop_id
         WHERE s.trip_id = ?
         ORDER BY sa.id",
    )
    .bind(trip.id)
    .fetch_all(&mut *conn)
    .await?;

    let mut catalogs: HashMap<i64, Vec<Activity>> = HashMap::new();
    if with_catalog {
        let rows = sqlx::query_as::<_, Activity>(
            "SELECT * FROM activities
             WHERE city_id IN (SELECT city_id FROM stops WHERE trip_id = ?)
             ORDER BY id",
        )
        .bind(trip.id)
        .fetch_all(&mut *conn)
        .await?;
        for activity in rows {
            catalogs.entry(activity.city_id).or_default().push(activity);
        }
    }

    let mut by_stop: HashMap<i64, Vec<ScheduledActivity>> = HashMap::new();
    for row in scheduled {
        by_stop
            .entry(row.stop_id)
            .or_default()
            .push(ScheduledActivity {
                id: row.link_id,
                stop_id: row.stop_id,
                activity: row.activity,
            });
    }

    let mut details = Vec::with_capacity(stops.len());
    for stop in stops {
        let city = cities
            .get(&stop.city_id)
            .cloned()
            .ok_or_else(|| ItineraryError::not_found("city", stop.city_id))?;
        let catalog = with_catalog.then(|| catalogs.get(&stop.city_id).cloned().unwrap_or_default());
        details.push(StopDetail {
            activities: by_stop.remove(&stop.id).unwrap_or_default(),
            city,
            catalog,
            stop,
        });
    }

    Ok(TripDetail {
        trip,
        stops: details,
    })
}
