//! Macroeconomic indicator backends
//!
//! Chain: FRED series observations → economic calendar scrape → fallback.
//! FRED only covers the US and needs an API key; without one the backend
//! reports itself unavailable and the chain moves on.

use super::{send_json, Backend, FetchError, HttpSession, SourceAdapter, USER_AGENT};
use crate::records::MacroRecord;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;

const FRED_OBSERVATIONS_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

const FRED_TIMEOUT: Duration = Duration::from_secs(10);
const CALENDAR_TIMEOUT: Duration = Duration::from_secs(10);

const SERIES_GDP_GROWTH: &str = "A191RL1Q225SBEA";
const SERIES_INFLATION: &str = "CPALTT01USM659N";
const SERIES_UNEMPLOYMENT: &str = "UNRATE";
const SERIES_POLICY_RATE: &str = "FEDFUNDS";

pub fn adapter(fred_api_key: Option<String>) -> SourceAdapter<MacroRecord> {
    let session = HttpSession::with_user_agent("macro", USER_AGENT);

    SourceAdapter::new(vec![
        Box::new(FredBackend::new(session.clone(), fred_api_key)),
        Box::new(EconomicCalendarBackend),
    ])
    .with_session(session)
}

#[derive(Debug, Deserialize)]
pub(crate) struct FredObservations {
    #[serde(default)]
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    value: String,
}

/// Latest observation value; FRED reports missing values as "."
pub(crate) fn latest_observation(response: &FredObservations) -> Option<f64> {
    response
        .observations
        .first()
        .and_then(|obs| obs.value.trim().parse::<f64>().ok())
}

pub struct FredBackend {
    session: HttpSession,
    api_key: Option<String>,
}

impl FredBackend {
    pub fn new(session: HttpSession, api_key: Option<String>) -> Self {
        Self { session, api_key }
    }

    async fn series(&self, api_key: &str, series_id: &str) -> Option<f64> {
        let client = match self.session.client() {
            Ok(client) => client,
            Err(e) => {
                log::debug!("FRED series {} skipped: {}", series_id, e);
                return None;
            }
        };

        let request = client.get(FRED_OBSERVATIONS_URL).query(&[
            ("series_id", series_id),
            ("api_key", api_key),
            ("file_type", "json"),
            ("limit", "1"),
            ("sort_order", "desc"),
        ]);

        match send_json::<FredObservations>(request).await {
            Ok(response) => latest_observation(&response),
            Err(e) => {
                log::debug!("FRED series {} failed: {}", series_id, e);
                None
            }
        }
    }
}

#[async_trait]
impl Backend<MacroRecord> for FredBackend {
    fn name(&self) -> &str {
        "fred"
    }

    fn timeout(&self) -> Duration {
        FRED_TIMEOUT
    }

    async fn fetch(&self, region: &str) -> Result<MacroRecord, FetchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| FetchError::Unavailable("FRED_API_KEY not set".to_string()))?;

        if !region.eq_ignore_ascii_case("US") {
            return Err(FetchError::Unavailable(format!("FRED has no data for region {}", region)));
        }

        let (gdp_growth, inflation_rate, unemployment_rate, interest_rate) = tokio::join!(
            self.series(api_key, SERIES_GDP_GROWTH),
            self.series(api_key, SERIES_INFLATION),
            self.series(api_key, SERIES_UNEMPLOYMENT),
            self.series(api_key, SERIES_POLICY_RATE),
        );

        let record = MacroRecord {
            gdp_growth,
            inflation_rate,
            unemployment_rate,
            interest_rate,
            region: region.to_string(),
            timestamp: Utc::now(),
        };

        if record.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(record)
    }
}

/// Scraped economic calendar. Indicator extraction from the calendar page is
/// not supported, so this tier always misses without touching the network.
pub struct EconomicCalendarBackend;

#[async_trait]
impl Backend<MacroRecord> for EconomicCalendarBackend {
    fn name(&self) -> &str {
        "economic_calendar"
    }

    fn timeout(&self) -> Duration {
        CALENDAR_TIMEOUT
    }

    async fn fetch(&self, _region: &str) -> Result<MacroRecord, FetchError> {
        Err(FetchError::Unavailable(
            "calendar indicator extraction not supported".to_string(),
        ))
    }
}
