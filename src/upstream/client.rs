//! C1 — upstream API client.
//!
//! Issues HTTPS GETs against the racing affiliate API and classifies
//! transport/4xx/5xx outcomes as retryable or fatal, per spec.md §4.1.
//! Modeled on the teacher's `fetch_events`/`fetch_event_h1_odds` (rate
//! limiter wait, timeout'd `reqwest::Client`, status/body inspection).

use std::time::Duration;

use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use tracing::{info, warn};

use super::types::{MeetingsResponse, RawMeeting, RawRaceData};
use crate::error::UpstreamError;

type DirectRateLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// Required request headers (spec.md §4.1/§6): `Accept`, `User-Agent`,
/// `From`, `X-Partner`, `X-Partner-ID`.
const USER_AGENT: &str = "raceday-ingest/1.0 (+https://raceday.example)";
const FROM_HEADER: &str = "ingest-ops@raceday.example";
const PARTNER: &str = "raceday-ingest";
const PARTNER_ID: &str = "raceday-ingest-core";

pub struct UpstreamClient {
    base_url: String,
    http: reqwest::Client,
    rate_limiter: DirectRateLimiter,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>, fetch_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(8)
            .build()?;

        // 60 req/min is a conservative default for an affiliate racing API;
        // overridable by callers that know their quota.
        let rate_limiter = RateLimiter::direct(Quota::per_minute(NonZeroU32::new(60).unwrap()));

        Ok(Self {
            base_url: base_url.into(),
            http,
            rate_limiter,
        })
    }

    /// `fetchMeetingsForDate` — meetings (with embedded races) for the
    /// racing-calendar day `date`.
    pub async fn fetch_meetings_for_date(
        &self,
        date: chrono::NaiveDate,
    ) -> Result<Vec<RawMeeting>, UpstreamError> {
        self.rate_limiter.until_ready().await;

        let date_str = date.format("%Y-%m-%d").to_string();
        let url = format!("{}/affiliates/v1/racing/meetings", self.base_url);

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header("From", FROM_HEADER)
            .header("X-Partner", PARTNER)
            .header("X-Partner-ID", PARTNER_ID)
            .query(&[("date_from", &date_str), ("date_to", &date_str)])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "meetings fetch returned non-2xx");
            return Err(UpstreamError::from_status(status.as_u16(), body));
        }

        let parsed: MeetingsResponse = serde_json::from_str(&body)
            .map_err(|e| UpstreamError::non_retryable(format!("failed to parse meetings response: {e}")))?;

        info!(count = parsed.meetings.len(), "fetched meetings for {date_str}");
        Ok(parsed.meetings)
    }

    /// `fetchRaceData` — a single race, or `Ok(None)` on upstream 404.
    pub async fn fetch_race_data(&self, race_id: &str) -> Result<Option<RawRaceData>, UpstreamError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/affiliates/v1/racing/events/{race_id}", self.base_url);

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header("From", FROM_HEADER)
            .header("X-Partner", PARTNER)
            .header("X-Partner-ID", PARTNER_ID)
            .query(&[
                ("with_tote_trends_data", "true"),
                ("with_biggest_bet", "true"),
                ("with_money_tracker", "true"),
                ("will_pays", "true"),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();

        if status.as_u16() == 404 {
            return Ok(None);
        }

        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            warn!(race_id, status = status.as_u16(), "race fetch returned non-2xx");
            return Err(UpstreamError::from_status(status.as_u16(), body));
        }

        let parsed: RawRaceData = serde_json::from_str(&body)
            .map_err(|e| UpstreamError::non_retryable(format!("failed to parse race response: {e}")))?;

        Ok(Some(parsed))
    }
}

fn transport_error(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() || err.is_connect() {
        UpstreamError::transport(format!("transport error: {err}"))
    } else {
        UpstreamError::transport(format!("request error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_classifies_retryable_codes() {
        for code in [408, 429, 500, 502, 503] {
            assert!(UpstreamError::from_status(code, "").retryable, "{code} should be retryable");
        }
        for code in [400, 401, 403, 404, 422] {
            assert!(!UpstreamError::from_status(code, "").retryable, "{code} should not be retryable");
        }
    }
}
