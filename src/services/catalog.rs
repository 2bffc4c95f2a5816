use std::collections::HashMap;

use rand::Rng;
use sqlx::SqliteConnection;
use tracing::info;

use crate::{
    db::DbPool,
    error::AppError,
    itinerary::ItineraryError,
    models::city::{Activity, City, CityWithActivities},
};

const UNKNOWN_COUNTRY: &str = "Unknown";
const DISCOVERED_DESCRIPTION: &str = "Discovered destination";

/// Activities every newly discovered city starts with.
const DISCOVERED_ACTIVITIES: &[(&str, &str, f64)] = &[
    ("City Center Tour", "Sightseeing", 0.0),
    ("Local Cuisine", "Food", 40.0),
    ("Museum Visit", "Culture", 25.0),
];

const SEED_ACTIVITIES: &[(&str, &str, f64)] = &[
    ("City Tour", "Sightseeing", 0.0),
    ("Museum Visit", "Culture", 25.0),
    ("Local Food Tasting", "Food", 50.0),
];

const SEED_CITIES: &[(&str, &str, f64, &str)] = &[
    ("Paris", "France", 200.0, "City of Lights"),
    ("Tokyo", "Japan", 250.0, "Futuristic and Traditional"),
    ("New York", "USA", 300.0, "The Big Apple"),
    ("London", "UK", 220.0, "History and Culture"),
    ("Rome", "Italy", 180.0, "Eternal City"),
];

#[derive(Clone)]
pub struct CatalogService {
    db: DbPool,
}

impl CatalogService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn list_cities(&self) -> Result<Vec<CityWithActivities>, AppError> {
        let cities = sqlx::query_as::<_, City>("SELECT * FROM cities ORDER BY name, country")
            .fetch_all(&self.db)
            .await?;
        let mut activities: HashMap<i64, Vec<Activity>> = HashMap::new();
        for activity in sqlx::query_as::<_, Activity>("SELECT * FROM activities ORDER BY id")
            .fetch_all(&self.db)
            .await?
        {
            activities.entry(activity.city_id).or_default().push(activity);
        }

        Ok(cities
            .into_iter()
            .map(|city| CityWithActivities {
                activities: activities.remove(&city.id).unwrap_or_default(),
                city,
            })
            .collect())
    }

    pub async fn ensure_city(
        &self,
        name: &str,
        country: &str,
        description: Option<&str>,
    ) -> Result<City, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ItineraryError::Validation("city name must not be empty".into()).into());
        }
        let country = match country.trim() {
            "" => UNKNOWN_COUNTRY,
            other => other,
        };
        let description = description
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(DISCOVERED_DESCRIPTION);

        if let Some(city) = find_city(&self.db, name, country).await? {
            return Ok(city);
        }

        let nightly_cost = f64::from(rand::rng().random_range(100..300_u32));
        let mut tx = self.db.begin().await?;
        let inserted =
            insert_city(&mut tx, name, country, description, nightly_cost, DISCOVERED_ACTIVITIES)
                .await;
        match inserted {
            Ok(city) => {
                tx.commit().await?;
                info!(city_id = city.id, name, country, "added city to catalog");
                Ok(city)
            }
            // Someone else created it between our lookup and insert.
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                drop(tx);
                find_city(&self.db, name, country)
                    .await?
                    .ok_or(AppError::NotFound)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn seed_defaults(&self) -> Result<usize, AppError> {
        let mut tx = self.db.begin().await?;
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cities")
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Ok(0);
        }
        for (name, country, nightly_cost, description) in SEED_CITIES {
            insert_city(&mut tx, name, country, description, *nightly_cost, SEED_ACTIVITIES)
                .await?;
        }
        tx.commit().await?;
        info!(cities = SEED_CITIES.len(), "seeded city catalog");
        Ok(SEED_CITIES.len())
    }
}

async fn find_city(db: &DbPool, name: &str, country: &str) -> Result<Option<City>, AppError> {
    let city = sqlx::query_as::<_, City>("SELECT * FROM cities WHERE name = ? AND country = ?")
        .bind(name)
        .bind(country)
        .fetch_optional(db)
        .await?;
    Ok(city)
}

async fn insert_city(
    conn: &mut SqliteConnection,
    name: &str,
    country: &str,
    description: &str,
    nightly_cost: f64,
    activities: &[(&str, &str, f64)],
) -> Result<City, sqlx::Error> {
    let city = sqlx::query_as::<_, City>(
        "INSERT INTO cities (name, country, description, nightly_cost) VALUES (?, ?, ?, ?) RETURNING *",
    )
    .bind(name)
    .bind(country)
    .bind(description)
    .bind(nightly_cost)
    .fetch_one(&mut *conn)
    .await?;

    for (activity, category, cost) in activities {
        sqlx::query("INSERT INTO activities (city_id, name, category, cost) VALUES (?, ?, ?, ?)")
            .bind(city.id)
            .bind(*activity)
            .bind(*category)
            .bind(*cost)
            .execute(&mut *conn)
            .await?;
    }
    Ok(city)
}
