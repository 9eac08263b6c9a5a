//! LibInsight gate count ingestion
//!
//! `POST {url}` with a JSON array of
//! `{date: "YYYY-MM-DD HH:00", gate_id, gate_start: 0, gate_end: <ins>}`.
//! LibInsight answers `200 {"response": 1}` when it accepts the batch.

use crate::domain::aggregate::AggregateTotal;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Date format LibInsight expects, hour precision
pub const SINK_DATE_FORMAT: &str = "%Y-%m-%d %H:00";

/// Value of `response` that means the batch was accepted
const ACCEPTED: i64 = 1;

/// Why one batch wasn't accepted. Recoverable: the keys get retried.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("reading response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("response code was {0}")]
    Status(u16),

    #[error("couldn't parse JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("expected a JSON response of 1, but got {response} (full body: {body:?})")]
    Rejected { response: i64, body: String },
}

/// One row of the ingestion payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkRecord {
    pub date: String,
    pub gate_id: u32,
    pub gate_start: u64,
    pub gate_end: u64,
}

impl SinkRecord {
    /// LibInsight's schema counts events in `gate_end`, so only ins are sent
    pub fn from_total(total: &AggregateTotal) -> Self {
        Self {
            date: total.hour.format(SINK_DATE_FORMAT).to_string(),
            gate_id: total.gate_id.0,
            gate_start: 0,
            gate_end: total.ins,
        }
    }
}

#[derive(Deserialize)]
struct SinkResponse {
    response: i64,
}

/// Destination for batches of aggregate records
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Deliver one batch; any error means none of it should be considered stored
    async fn post_batch(&self, batch: &[SinkRecord]) -> Result<(), BatchError>;
}

pub struct LibInsightClient {
    url: String,
    http: reqwest::Client,
}

impl LibInsightClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url: url.to_string(), http })
    }
}

#[async_trait]
impl BatchSink for LibInsightClient {
    async fn post_batch(&self, batch: &[SinkRecord]) -> Result<(), BatchError> {
        let response =
            self.http.post(&self.url).json(batch).send().await.map_err(BatchError::Request)?;

        let status = response.status();
        let body = response.text().await.map_err(BatchError::Body)?;

        if status != StatusCode::OK {
            debug!(status = %status.as_u16(), body = ?body, "libinsight_error_response");
            return Err(BatchError::Status(status.as_u16()));
        }

        let parsed: SinkResponse = serde_json::from_str(&body).map_err(BatchError::Json)?;
        if parsed.response != ACCEPTED {
            return Err(BatchError::Rejected { response: parsed.response, body });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GateId;
    use chrono::NaiveDate;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn total(h: u32, ins: u64, outs: u64) -> AggregateTotal {
        AggregateTotal {
            gate_id: GateId(3),
            hour: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(h, 0, 0).unwrap(),
            ins,
            outs,
        }
    }

    fn client(server: &Server) -> LibInsightClient {
        LibInsightClient::new(&format!("{}/gates/post", server.url()), Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn test_record_from_total() {
        let record = SinkRecord::from_total(&total(9, 10, 3));
        assert_eq!(
            record,
            SinkRecord {
                date: "2024-03-01 09:00".to_string(),
                gate_id: 3,
                gate_start: 0,
                gate_end: 10
            }
        );
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"date": "2024-03-01 09:00", "gate_id": 3, "gate_start": 0, "gate_end": 10})
        );
    }

    #[tokio::test]
    async fn test_post_batch_accepted() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/gates/post")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!([
                {"date": "2024-03-01 09:00", "gate_id": 3, "gate_start": 0, "gate_end": 10},
                {"date": "2024-03-01 10:00", "gate_id": 3, "gate_start": 0, "gate_end": 4}
            ])))
            .with_status(200)
            .with_body(r#"{"response": 1}"#)
            .create_async()
            .await;

        let batch =
            vec![SinkRecord::from_total(&total(9, 10, 3)), SinkRecord::from_total(&total(10, 4, 0))];
        client(&server).post_batch(&batch).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_post_batch_server_error() {
        let mut server = Server::new_async().await;
        let _mock =
            server.mock("POST", "/gates/post").with_status(500).with_body("oops").create_async().await;

        let err = client(&server).post_batch(&[SinkRecord::from_total(&total(9, 1, 1))]).await;
        assert!(matches!(err, Err(BatchError::Status(500))));
    }

    #[tokio::test]
    async fn test_post_batch_wrong_sentinel() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/gates/post")
            .with_status(200)
            .with_body(r#"{"response": 0}"#)
            .create_async()
            .await;

        let err = client(&server).post_batch(&[SinkRecord::from_total(&total(9, 1, 1))]).await;
        match err {
            Err(BatchError::Rejected { response, body }) => {
                assert_eq!(response, 0);
                assert!(body.contains("response"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_post_batch_unparseable_body() {
        let mut server = Server::new_async().await;
        let _mock =
            server.mock("POST", "/gates/post").with_status(200).with_body("ok").create_async().await;

        let err = client(&server).post_batch(&[SinkRecord::from_total(&total(9, 1, 1))]).await;
        assert!(matches!(err, Err(BatchError::Json(_))));
    }
}
