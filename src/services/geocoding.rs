use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::AppError;

const RESULT_COUNT: &str = "5";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityCandidate {
    pub name: String,
    pub country: String,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[async_trait]
pub trait CityDiscovery: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<CityCandidate>, AppError>;
}

#[derive(Clone)]
pub struct OpenMeteoGeocoder {
    http: reqwest::Client,
    base_url: Url,
}

impl OpenMeteoGeocoder {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn search_url(&self, query: &str) -> Result<Url, AppError> {
        let mut url = self
            .base_url
            .join("v1/search")
            .map_err(|err| AppError::Config(format!("invalid geocoding url: {err}")))?;
        url.query_pairs_mut()
            .append_pair("name", query)
            .append_pair("count", RESULT_COUNT)
            .append_pair("language", "en")
            .append_pair("format", "json");
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    name: String,
    country: Option<String>,
    admin1: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl From<SearchResult> for CityCandidate {
    fn from(result: SearchResult) -> Self {
        Self {
            name: result.name,
            country: result
                .country
                .filter(|country| !country.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            region: result.admin1.filter(|region| !region.is_empty()),
            latitude: result.latitude,
            longitude: result.longitude,
        }
    }
}

#[async_trait]
impl CityDiscovery for OpenMeteoGeocoder {
    async fn search(&self, query: &str) -> Result<Vec<CityCandidate>, AppError> {
        let url = self.search_url(query)?;
        debug!(%url, "geocoding search");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| AppError::Upstream(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            warn!(%status, "geocoding search failed");
            return Err(AppError::Upstream(format!("geocoding returned {status}")));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|err| AppError::Upstream(format!("unreadable geocoding response: {err}")))?;
        Ok(body.results.into_iter().map(CityCandidate::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_carries_query() {
        let geocoder =
            OpenMeteoGeocoder::new(Url::parse("https://geocoding.example.com/").unwrap());
        let url = geocoder.search_url("São Paulo").unwrap();
        assert_eq!(url.path(), "/v1/search");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("name".into(), "São Paulo".into())));
        assert!(pairs.contains(&("count".into(), "5".into())));
    }

    #[test]
    fn missing_results_parse_as_empty() {
        let body: SearchResponse = serde_json::from_str(r#"{"generationtime_ms": 0.5}"#).unwrap();
        assert!(body.results.is_empty());
    }

    #[test]
    fn candidates_fill_in_unknown_country() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"results": [
                {"name": "Lyon", "country": "France", "admin1": "Auvergne-Rhône-Alpes", "latitude": 45.75, "longitude": 4.85},
                {"name": "Atlantis", "admin1": ""}
            ]}"#,
        )
        .unwrap();
        let candidates: Vec<CityCandidate> =
            body.results.into_iter().map(CityCandidate::from).collect();
        assert_eq!(candidates[0].region.as_deref(), Some("Auvergne-Rhône-Alpes"));
        assert_eq!(candidates[1].country, "Unknown");
        assert_eq!(candidates[1].region, None);
    }
}
