//! Traf-Sys REST client
//!
//! Protocol:
//! - `POST {base}/token` (form: grant_type=password, username, password)
//!   -> `{"access_token": "..."}`
//! - `GET {base}/api/traffic?SiteCode=&DateFrom=&DateTo=&IncludeInternalLocations=false&DataSummedByDay=false`
//!   with `Authorization: Bearer <token>` -> JSON array of counts
//!
//! Requests are strictly sequential. Traf-Sys rate limits aggressively, so
//! every window request after the first waits out a fixed throttle.

use crate::domain::types::NormalizedCount;
use crate::domain::window::{plan_windows, QUERY_DATE_FORMAT};
use crate::domain::RawCount;
use crate::infra::config::{Config, Credentials, FetchWindow};
use crate::infra::metrics::RunMetrics;
use crate::services::normalizer::{normalize, GateLookup, NormalizeError, SiteGateTable};
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, Instrument, Span};

#[derive(Debug, Error)]
pub enum TrafSysError {
    #[error("unable to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("reading response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("response code was {0}")]
    Status(u16),

    #[error("couldn't parse JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("token response had an empty access_token")]
    EmptyToken,

    #[error("invalid count (#{index} of {total}): {source}")]
    InvalidCount {
        index: usize,
        total: usize,
        #[source]
        source: NormalizeError,
    },
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct TrafSysClient {
    base_url: String,
    http: reqwest::Client,
    throttle: Duration,
    lookup: Arc<dyn GateLookup + Send + Sync>,
    metrics: Arc<RunMetrics>,
    span: Span,
}

impl TrafSysClient {
    pub fn new(config: &Config, metrics: Arc<RunMetrics>) -> Result<Self, TrafSysError> {
        // One client for the whole run (connection reuse across windows)
        let http = reqwest::Client::builder()
            .timeout(config.trafsys_timeout())
            .build()
            .map_err(TrafSysError::Client)?;

        Ok(Self {
            base_url: config.trafsys_base_url().to_string(),
            http,
            throttle: config.trafsys_throttle(),
            lookup: Arc::new(SiteGateTable),
            metrics,
            span: tracing::info_span!("trafsys"),
        })
    }

    /// Log inside `span` instead of the default `trafsys` span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Swap the site table, mostly for tests
    pub fn with_lookup(mut self, lookup: Arc<dyn GateLookup + Send + Sync>) -> Self {
        self.lookup = lookup;
        self
    }

    /// Exchange credentials for a bearer token. No retry; callers should abort.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<String, TrafSysError> {
        self.request_token(credentials).instrument(self.span.clone()).await
    }

    async fn request_token(&self, credentials: &Credentials) -> Result<String, TrafSysError> {
        let form = [
            ("grant_type", "password"),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];

        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .form(&form)
            .send()
            .await
            .map_err(TrafSysError::Request)?;

        let body = read_ok_body(response).await?;
        let token: TokenResponse = serde_json::from_str(&body).map_err(TrafSysError::Json)?;
        if token.access_token.is_empty() {
            return Err(TrafSysError::EmptyToken);
        }

        debug!("trafsys_token_received");
        Ok(token.access_token)
    }

    /// Pull and normalize every count in `window`, relative to `today`.
    ///
    /// Any failure aborts the whole fetch; partial results are discarded.
    pub async fn fetch_window(
        &self,
        token: &str,
        window: FetchWindow,
        today: NaiveDate,
    ) -> Result<Vec<NormalizedCount>, TrafSysError> {
        self.fetch_all(token, window, today).instrument(self.span.clone()).await
    }

    async fn fetch_all(
        &self,
        token: &str,
        window: FetchWindow,
        today: NaiveDate,
    ) -> Result<Vec<NormalizedCount>, TrafSysError> {
        let windows = plan_windows(window.start_days_ago(), window.end_days_ago());
        let mut all_counts = Vec::new();

        for (i, day_window) in windows.iter().enumerate() {
            let batch_num = i + 1;
            if batch_num > 1 {
                info!(delay_ms = %self.throttle.as_millis(), "trafsys_throttle");
                tokio::time::sleep(self.throttle).await;
            }

            let (from, to) = day_window.dates(today);
            info!(
                batch = %batch_num,
                batches = %windows.len(),
                from = %from.format(QUERY_DATE_FORMAT),
                to = %to.format(QUERY_DATE_FORMAT),
                "trafsys_batch_fetch"
            );

            let counts = self.request_window(token, from, to).await?;
            self.metrics.record_window(counts.len());
            all_counts.extend(counts);
        }

        Ok(all_counts)
    }

    async fn request_window(
        &self,
        token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NormalizedCount>, TrafSysError> {
        let date_from = from.format(QUERY_DATE_FORMAT).to_string();
        let date_to = to.format(QUERY_DATE_FORMAT).to_string();
        let query = [
            ("SiteCode", ""),
            ("DateFrom", date_from.as_str()),
            ("DateTo", date_to.as_str()),
            ("IncludeInternalLocations", "false"),
            ("DataSummedByDay", "false"),
        ];

        let response = self
            .http
            .get(format!("{}/api/traffic", self.base_url))
            .query(&query)
            .bearer_auth(token)
            .send()
            .await
            .map_err(TrafSysError::Request)?;

        let body = read_ok_body(response).await?;
        let raw_counts: Vec<RawCount> = serde_json::from_str(&body).map_err(TrafSysError::Json)?;
        debug!(records = %raw_counts.len(), "trafsys_counts_read");

        let total = raw_counts.len();
        let mut counts = Vec::with_capacity(total);
        for (i, raw) in raw_counts.into_iter().enumerate() {
            debug!(index = %(i + 1), total = %total, count = %raw, "trafsys_count_processing");
            let count = normalize(raw, self.lookup.as_ref())
                .map_err(|source| TrafSysError::InvalidCount { index: i + 1, total, source })?;
            let site = self.lookup.site_name(&count.site_code).unwrap_or("unnamed");
            debug!(count = %count, site = %site, "trafsys_count_normalized");
            counts.push(count);
        }

        Ok(counts)
    }
}

/// Read the body, failing on anything but 200. Error bodies go to debug logs.
async fn read_ok_body(response: reqwest::Response) -> Result<String, TrafSysError> {
    let status = response.status();
    let body = response.text().await.map_err(TrafSysError::Body)?;

    if status != StatusCode::OK {
        debug!(status = %status.as_u16(), body = ?body, "trafsys_error_response");
        return Err(TrafSysError::Status(status.as_u16()));
    }

    Ok(body)
}
