//! Run orchestration: authenticate, fetch, aggregate, deliver
//!
//! Every stage runs to completion before the next starts. The first fatal
//! error ends the run.

use crate::domain::aggregate::Aggregates;
use crate::domain::window::QUERY_DATE_FORMAT;
use crate::infra::config::{Config, Credentials, FetchWindow};
use crate::infra::metrics::{RunMetrics, RunSummary};
use crate::io::libinsight::{BatchSink, LibInsightClient};
use crate::io::trafsys::{TrafSysClient, TrafSysError};
use crate::services::delivery::{Deliverer, DeliveryError, RetryPolicy};
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, Instrument, Span};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unable to set up Traf-Sys client: {0}")]
    SourceSetup(#[source] TrafSysError),

    #[error("unable to set up LibInsight client: {0}")]
    SinkSetup(#[source] reqwest::Error),

    #[error("could not get bearer token from Traf-Sys: {0}")]
    Auth(#[source] TrafSysError),

    #[error("could not read traffic data for {from} - {to} from Traf-Sys: {source}")]
    Fetch {
        from: String,
        to: String,
        #[source]
        source: TrafSysError,
    },

    #[error("could not deliver counts to LibInsight: {0}")]
    Delivery(#[source] DeliveryError),
}

pub struct Pipeline<S: BatchSink> {
    source: TrafSysClient,
    deliverer: Deliverer<S>,
    metrics: Arc<RunMetrics>,
    span: Span,
}

impl Pipeline<LibInsightClient> {
    /// Wire the real Traf-Sys and LibInsight clients. Component logs nest under `span`.
    pub fn from_config(
        config: &Config,
        libinsight_url: &str,
        span: Span,
    ) -> Result<Self, PipelineError> {
        let metrics = Arc::new(RunMetrics::new());

        let source = TrafSysClient::new(config, metrics.clone())
            .map_err(PipelineError::SourceSetup)?
            .with_span(tracing::info_span!(parent: &span, "trafsys"));

        let sink = LibInsightClient::new(libinsight_url, config.libinsight_timeout())
            .map_err(PipelineError::SinkSetup)?;
        let deliverer = Deliverer::new(sink, RetryPolicy::from_config(config), metrics.clone())
            .with_span(tracing::info_span!(parent: &span, "libinsight"));

        Ok(Self::new(source, deliverer, metrics).with_span(span))
    }
}

impl<S: BatchSink> Pipeline<S> {
    pub fn new(source: TrafSysClient, deliverer: Deliverer<S>, metrics: Arc<RunMetrics>) -> Self {
        Self { source, deliverer, metrics, span: tracing::info_span!("pipeline") }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Sync `window` (relative to `today`) from Traf-Sys into LibInsight
    pub async fn run(
        &self,
        credentials: &Credentials,
        window: FetchWindow,
        today: NaiveDate,
    ) -> Result<RunSummary, PipelineError> {
        self.run_stages(credentials, window, today).instrument(self.span.clone()).await
    }

    async fn run_stages(
        &self,
        credentials: &Credentials,
        window: FetchWindow,
        today: NaiveDate,
    ) -> Result<RunSummary, PipelineError> {
        let (from, to) = window.days().dates(today);
        let from = from.format(QUERY_DATE_FORMAT).to_string();
        let to = to.format(QUERY_DATE_FORMAT).to_string();
        info!(from = %from, to = %to, "pipeline_pulling_counts");

        let token = self.source.authenticate(credentials).await.map_err(PipelineError::Auth)?;

        let counts = self
            .source
            .fetch_window(&token, window, today)
            .await
            .map_err(|source| PipelineError::Fetch { from, to, source })?;

        let aggregates = Aggregates::from_counts(&counts);
        self.metrics.set_aggregate_keys(aggregates.len());
        info!(records = %counts.len(), aggregate_keys = %aggregates.len(), "pipeline_aggregated");

        self.deliverer.deliver(&aggregates).await.map_err(PipelineError::Delivery)?;

        Ok(self.metrics.report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_message_names_window() {
        let err = PipelineError::Fetch {
            from: "2024-02-23".to_string(),
            to: "2024-02-29".to_string(),
            source: TrafSysError::Status(502),
        };
        assert_eq!(
            err.to_string(),
            "could not read traffic data for 2024-02-23 - 2024-02-29 from Traf-Sys: response code was 502"
        );
    }
}
