//! Normalization of Traf-Sys records into LibInsight terms
//!
//! Parses `PeriodEnding` and translates the Traf-Sys `SiteCode` into a
//! LibInsight `gate_id`.

use crate::domain::types::{GateId, NormalizedCount, RawCount, PERIOD_ENDING_FORMAT};
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("invalid PeriodEnding {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("no mapping for SiteCode {0:?}")]
    NoMapping(String),
}

/// Resolves a source site code to a sink gate
pub trait GateLookup {
    /// Fails with `NormalizeError::NoMapping` when the code is unknown
    fn gate_id(&self, site_code: &str) -> Result<GateId, NormalizeError>;

    /// Human-readable site name, for logs
    fn site_name(&self, _site_code: &str) -> Option<&'static str> {
        None
    }
}

/// Traf-Sys SiteCode -> LibInsight gate_id.
///
/// Keep this a literal table so changes show up plainly in review.
const SITE_GATES: [(&str, GateId, &str); 7] = [
    ("02", GateId(3), "Knight"),
    ("03", GateId(4), "PSC"),
    ("04", GateId(5), "Design Library"),
    ("05", GateId(6), "Law Library"),
    ("06", GateId(7), "Math Library"),
    ("07", GateId(8), "PDX White Stag Library"),
    ("08", GateId(9), "Oregon Marine Biology"),
];

/// The fixed site table
#[derive(Debug, Clone, Copy, Default)]
pub struct SiteGateTable;

impl GateLookup for SiteGateTable {
    fn gate_id(&self, site_code: &str) -> Result<GateId, NormalizeError> {
        SITE_GATES
            .iter()
            .find(|(code, _, _)| *code == site_code)
            .map(|(_, gate, _)| *gate)
            .ok_or_else(|| NormalizeError::NoMapping(site_code.to_string()))
    }

    fn site_name(&self, site_code: &str) -> Option<&'static str> {
        SITE_GATES.iter().find(|(code, _, _)| *code == site_code).map(|(_, _, name)| *name)
    }
}

/// Convert a raw record, consuming it
pub fn normalize<L: GateLookup + ?Sized>(
    raw: RawCount,
    lookup: &L,
) -> Result<NormalizedCount, NormalizeError> {
    let when = NaiveDateTime::parse_from_str(&raw.period_ending, PERIOD_ENDING_FORMAT).map_err(
        |source| NormalizeError::Timestamp { value: raw.period_ending.clone(), source },
    )?;
    let gate_id = lookup.gate_id(&raw.site_code)?;

    Ok(NormalizedCount {
        site_code: raw.site_code,
        location: raw.location,
        period_ending: raw.period_ending,
        when,
        gate_id,
        ins: raw.ins,
        outs: raw.outs,
    })
}
