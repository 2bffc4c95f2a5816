use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::{
    db::DbPool,
    error::AppError,
    itinerary::{self, ActivityDraft, ItineraryError},
    models::{
        city::{Activity, City},
        trip::{ScheduledActivity, Stop, StopActivity, TripDetail},
    },
    services::trips::load_owned_trip,
};

#[derive(Clone)]
pub struct ItineraryService {
    db: DbPool,
}

impl ItineraryService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn add_stop(
        &self,
        user_id: i64,
        trip_id: i64,
        city_id: i64,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<Stop, AppError> {
        itinerary::validate_range(start_date, end_date)?;

        let mut tx = self.db.begin().await?;
        let trip = load_owned_trip(&mut tx, user_id, trip_id, false).await?;
        sqlx::query_as::<_, City>("SELECT * FROM cities WHERE id = ?")
            .bind(city_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ItineraryError::not_found("city", city_id))?;

        let existing = stops_of(&trip);
        let order_index = itinerary::assign_order_index(&existing);
        let stop = sqlx::query_as::<_, Stop>(
            "INSERT INTO stops (trip_id, city_id, start_date, end_date, order_index)
             VALUES (?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(trip_id)
        .bind(city_id)
        .bind(start_date)
        .bind(end_date)
        .bind(order_index)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(trip_id, stop_id = stop.id, order_index, "added stop");
        Ok(stop)
    }

    pub async fn remove_stop(&self, user_id: i64, stop_id: i64) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;
        trip_for_stop(&mut tx, user_id, stop_id).await?;

        let unlinked = sqlx::query("DELETE FROM stop_activities WHERE stop_id = ?")
            .bind(stop_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM stops WHERE id = ?")
            .bind(stop_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(stop_id, unlinked, "removed stop");
        Ok(())
    }

    pub async fn update_stop_dates(
        &self,
        user_id: i64,
        stop_id: i64,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<Stop, AppError> {
        itinerary::validate_range(start_date, end_date)?;

        let mut tx = self.db.begin().await?;
        trip_for_stop(&mut tx, user_id, stop_id).await?;
        let stop = sqlx::query_as::<_, Stop>(
            "UPDATE stops SET start_date = ?, end_date = ? WHERE id = ? RETURNING *",
        )
        .bind(start_date)
        .bind(end_date)
        .bind(stop_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(stop_id, "updated stop dates");
        Ok(stop)
    }

    pub async fn reorder_stops(
        &self,
        user_id: i64,
        trip_id: i64,
        stop_ids: &[i64],
    ) -> Result<Vec<Stop>, AppError> {
        let mut tx = self.db.begin().await?;
        let trip = load_owned_trip(&mut tx, user_id, trip_id, false).await?;
        itinerary::validate_reorder(&stops_of(&trip), stop_ids)?;

        let mut reordered = Vec::with_capacity(stop_ids.len());
        for (position, stop_id) in stop_ids.iter().enumerate() {
            let stop = sqlx::query_as::<_, Stop>(
                "UPDATE stops SET order_index = ? WHERE id = ? RETURNING *",
            )
            .bind(position as i64)
            .bind(*stop_id)
            .fetch_one(&mut *tx)
            .await?;
            reordered.push(stop);
        }
        tx.commit().await?;

        info!(trip_id, stops = reordered.len(), "reordered stops");
        Ok(reordered)
    }

    pub async fn attach_activity(
        &self,
        user_id: i64,
        stop_id: i64,
        activity_id: i64,
    ) -> Result<StopActivity, AppError> {
        let mut tx = self.db.begin().await?;
        let trip = trip_for_stop(&mut tx, user_id, stop_id).await?;
        let detail = trip
            .stop(stop_id)
            .ok_or_else(|| ItineraryError::not_found("stop", stop_id))?;
        let activity = sqlx::query_as::<_, Activity>("SELECT * FROM activities WHERE id = ?")
            .bind(activity_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ItineraryError::not_found("activity", activity_id))?;
        itinerary::validate_attachment(detail, &activity)?;

        let link = insert_link(&mut tx, stop_id, activity_id).await?;
        tx.commit().await?;

        info!(stop_id, activity_id, link_id = link.id, "attached activity");
        Ok(link)
    }

    pub async fn attach_custom_activity(
        &self,
        user_id: i64,
        stop_id: i64,
        name: &str,
        cost: Option<&Value>,
        category: Option<&str>,
    ) -> Result<ScheduledActivity, AppError> {
        let draft = ActivityDraft::custom(name, cost, category)?;

        let mut tx = self.db.begin().await?;
        let trip = trip_for_stop(&mut tx, user_id, stop_id).await?;
        let city_id = trip
            .stop(stop_id)
            .map(|detail| detail.stop.city_id)
            .ok_or_else(|| ItineraryError::not_found("stop", stop_id))?;

        let activity = sqlx::query_as::<_, Activity>(
            "INSERT INTO activities (city_id, name, category, cost) VALUES (?, ?, ?, ?) RETURNING *",
        )
        .bind(city_id)
        .bind(&draft.name)
        .bind(&draft.category)
        .bind(draft.cost)
        .fetch_one(&mut *tx)
        .await?;
        let link = insert_link(&mut tx, stop_id, activity.id).await?;
        tx.commit().await?;

        info!(stop_id, activity_id = activity.id, "created custom activity");
        Ok(ScheduledActivity {
            id: link.id,
            stop_id,
            activity,
        })
    }

    pub async fn detach_activity(&self, user_id: i64, link_id: i64) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;
        trip_for_link(&mut tx, user_id, link_id).await?;
        sqlx::query("DELETE FROM stop_activities WHERE id = ?")
            .bind(link_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(link_id, "detached activity");
        Ok(())
    }

    /// Edits the catalog activity behind a link. Every stop that schedules
    /// the same activity sees the change.
    pub async fn update_scheduled_activity(
        &self,
        user_id: i64,
        link_id: i64,
        name: &str,
        cost: Option<&Value>,
        category: &str,
    ) -> Result<ScheduledActivity, AppError> {
        let draft = ActivityDraft::edit(name, cost, category)?;

        let mut tx = self.db.begin().await?;
        let link = trip_for_link(&mut tx, user_id, link_id).await?;
        let activity = sqlx::query_as::<_, Activity>(
            "UPDATE activities SET name = ?, category = ?, cost = ? WHERE id = ? RETURNING *",
        )
        .bind(&draft.name)
        .bind(&draft.category)
        .bind(draft.cost)
        .bind(link.activity_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(link_id, activity_id = activity.id, "updated activity");
        Ok(ScheduledActivity {
            id: link.id,
            stop_id: link.stop_id,
            activity,
        })
    }
}

fn stops_of(trip: &TripDetail) -> Vec<Stop> {
    trip.stops.iter().map(|detail| detail.stop.clone()).collect()
}

async fn trip_for_stop(
    conn: &mut SqliteConnection,
    user_id: i64,
    stop_id: i64,
) -> Result<TripDetail, AppError> {
    let trip_id: i64 = sqlx::query_scalar("SELECT trip_id FROM stops WHERE id = ?")
        .bind(stop_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ItineraryError::not_found("stop", stop_id))?;
    // A stop on someone else's trip is as invisible as a missing one.
    load_owned_trip(conn, user_id, trip_id, false)
        .await
        .map_err(|err| match err {
            AppError::Itinerary(ItineraryError::NotFound { .. }) => {
                ItineraryError::not_found("stop", stop_id).into()
            }
            other => other,
        })
}

async fn trip_for_link(
    conn: &mut SqliteConnection,
    user_id: i64,
    link_id: i64,
) -> Result<StopActivity, AppError> {
    let link = sqlx::query_as::<_, StopActivity>("SELECT * FROM stop_activities WHERE id = ?")
        .bind(link_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ItineraryError::not_found("stop activity", link_id))?;
    trip_for_stop(conn, user_id, link.stop_id)
        .await
        .map_err(|err| match err {
            AppError::Itinerary(ItineraryError::NotFound { .. }) => {
                ItineraryError::not_found("stop activity", link_id).into()
            }
            other => other,
        })?;
    Ok(link)
}

async fn insert_link(
    conn: &mut SqliteConnection,
    stop_id: i64,
    activity_id: i64,
) -> Result<StopActivity, AppError> {
    let inserted = sqlx::query_as::<_, StopActivity>(
        "INSERT INTO stop_activities (stop_id, activity_id) VALUES (?, ?) RETURNING *",
    )
    .bind(stop_id)
    .bind(activity_id)
    .fetch_one(&mut *conn)
    .await;

    match inserted {
        Ok(link) => Ok(link),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Err(
            ItineraryError::Duplicate {
                stop_id,
                activity_id,
            }
            .into(),
        ),
        Err(err) => Err(err.into()),
    }
}
