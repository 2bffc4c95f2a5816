use std::{env, net::SocketAddr, path::PathBuf};

use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub static_root: PathBuf,
    pub cookie_secret: String,
    pub session_ttl_hours: i64,
    pub geocoding_base_url: Url,
    pub public_base_url: String,
    pub seed_catalog: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://trips.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let static_root = env::var("STATIC_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("public"));

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-trip-planner-cookie-secret".to_string());

        let session_ttl_hours = match env::var("SESSION_TTL_HOURS") {
            Ok(raw) => raw
                .parse()
                .map_err(|err| AppError::Config(format!("invalid SESSION_TTL_HOURS: {err}")))?,
            Err(_) => 24 * 7,
        };

        let geocoding_base_url = env::var("GEOCODING_BASE_URL")
            .unwrap_or_else(|_| "https://geocoding-api.open-meteo.com".to_string());
        let geocoding_base_url = Url::parse(&geocoding_base_url)
            .map_err(|err| AppError::Config(format!("invalid GEOCODING_BASE_URL: {err}")))?;

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let seed_catalog = env::var("SEED_CATALOG")
            .map(|raw| !matches!(raw.trim(), "0" | "false" | "no"))
            .unwrap_or(true);

        Ok(Self {
            database_url,
            listen_addr,
            static_root,
            cookie_secret,
            session_ttl_hours,
            geocoding_base_url,
            public_base_url,
            seed_catalog,
        })
    }
}
