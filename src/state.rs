use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::{
    config::AppConfig,
    db::DbPool,
    services::{
        catalog::CatalogService, geocoding::CityDiscovery, itinerary::ItineraryService,
        trips::TripService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub trips: TripService,
    pub itinerary: ItineraryService,
    pub catalog: CatalogService,
    pub discovery: Arc<dyn CityDiscovery>,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool, discovery: Arc<dyn CityDiscovery>) -> Self {
        let digest = Sha512::digest(config.cookie_secret.as_bytes());
        let cookie_key = Key::from(&digest[..]);
        Self {
            trips: TripService::new(db.clone()),
            itinerary: ItineraryService::new(db.clone()),
            catalog: CatalogService::new(db.clone()),
            config,
            db,
            discovery,
            cookie_key,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
