//! Shared types for gate count syncing

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format Traf-Sys uses for `PeriodEnding`
pub const PERIOD_ENDING_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Hour precision used for aggregate keys and diagnostics
pub const HOUR_FORMAT: &str = "%Y-%m-%dT%H";

/// Newtype wrapper for LibInsight gate IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct GateId(pub u32);

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One traffic record as returned by the Traf-Sys API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawCount {
    pub site_code: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub is_internal: bool,
    pub period_ending: String,
    pub ins: u64,
    pub outs: u64,
}

impl fmt::Display for RawCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "count{{site/gate: {}, location: {:?}, when: {}, in/out: {}/{}}}",
            self.site_code, self.location, self.period_ending, self.ins, self.outs
        )
    }
}

/// A raw count with its timestamp parsed and its site resolved to a gate.
///
/// Only built by the normalizer, so `gate_id` always comes from the site table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCount {
    pub site_code: String,
    pub location: String,
    pub period_ending: String,
    pub when: NaiveDateTime,
    pub gate_id: GateId,
    pub ins: u64,
    pub outs: u64,
}

impl NormalizedCount {
    /// Timestamp truncated to the start of its hour
    pub fn hour(&self) -> NaiveDateTime {
        truncate_to_hour(self.when)
    }
}

impl fmt::Display for NormalizedCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "count{{site/gate: {}, location: {:?}, when: {}, in/out: {}/{}}}",
            self.gate_id,
            self.location,
            self.when.format(HOUR_FORMAT),
            self.ins,
            self.outs
        )
    }
}

/// Drop minutes, seconds and sub-seconds from a timestamp
pub fn truncate_to_hour(when: NaiveDateTime) -> NaiveDateTime {
    // hour() is always < 24, so this never falls back
    when.date().and_hms_opt(when.hour(), 0, 0).unwrap_or(when)
}

/// Make a string safe for identifiers and filenames: anything that isn't a
/// letter, decimal digit, or underscore becomes an underscore.
pub fn canonicalize(s: &str) -> String {
    s.chars().map(|c| if is_letter_or_digit(c) || c == '_' { c } else { '_' }).collect()
}

/// Letter-numbers (`Ⅻ`) count as alphabetic in Rust, so numerics are excluded
/// from the letter test. Superscripts and fractions are neither.
fn is_letter_or_digit(c: char) -> bool {
    c.is_ascii_digit() || (c.is_alphabetic() && !c.is_numeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_canonicalize_replaces_each_char() {
        assert_eq!(canonicalize("02"), "02");
        assert_eq!(canonicalize("a-b c"), "a_b_c");
        assert_eq!(canonicalize("x--y"), "x__y");
        assert_eq!(canonicalize("site/07.main"), "site_07_main");
        assert_eq!(canonicalize(""), "");
    }

    #[test]
    fn test_canonicalize_keeps_only_letters_and_decimal_digits() {
        assert_eq!(canonicalize("A²½Ⅻ"), "A___");
        assert_eq!(canonicalize("Bibliothèque_9"), "Bibliothèque_9");
    }

    #[test]
    fn test_canonicalize_idempotent() {
        for input in ["02", "a b/c", "Law Library #2", "ümlaut-ok", "__x__"] {
            let once = canonicalize(input);
            assert_eq!(canonicalize(&once), once);
        }
    }

    #[test]
    fn test_truncate_to_hour() {
        assert_eq!(truncate_to_hour(at(9, 59, 59)), at(9, 0, 0));
        assert_eq!(truncate_to_hour(at(0, 0, 0)), at(0, 0, 0));
    }

    #[test]
    fn test_raw_count_deserialize() {
        let json = r#"{"SiteCode":"02","Location":"Main","IsInternal":false,
            "PeriodEnding":"2024-03-01T09:15:00","Ins":3,"Outs":1}"#;
        let raw: RawCount = serde_json::from_str(json).unwrap();
        assert_eq!(raw.site_code, "02");
        assert_eq!(raw.location, "Main");
        assert!(!raw.is_internal);
        assert_eq!(raw.period_ending, "2024-03-01T09:15:00");
        assert_eq!((raw.ins, raw.outs), (3, 1));
    }

    #[test]
    fn test_raw_count_rejects_negative_counts() {
        let json = r#"{"SiteCode":"02","PeriodEnding":"2024-03-01T09:15:00","Ins":-1,"Outs":1}"#;
        assert!(serde_json::from_str::<RawCount>(json).is_err());
    }

    #[test]
    fn test_display_prefers_resolved_values() {
        let count = NormalizedCount {
            site_code: "02".to_string(),
            location: "Main".to_string(),
            period_ending: "2024-03-01T09:15:00".to_string(),
            when: at(9, 15, 0),
            gate_id: GateId(3),
            ins: 3,
            outs: 1,
        };
        assert_eq!(
            count.to_string(),
            r#"count{site/gate: 3, location: "Main", when: 2024-03-01T09, in/out: 3/1}"#
        );
    }
}
