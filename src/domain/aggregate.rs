//! Per-site, per-hour aggregation of normalized counts
//!
//! Location is ignored: every location at a site collapses into one total
//! per hour.

use crate::domain::types::{canonicalize, GateId, NormalizedCount, HOUR_FORMAT};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;

/// `<canonical site code>/<YYYY-MM-DDTHH>`.
///
/// Canonical site codes only contain characters that sort after `/`, so
/// ordering keys as strings orders by site, then chronologically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateKey(String);

impl AggregateKey {
    pub fn new(site_code: &str, hour: NaiveDateTime) -> Self {
        Self(format!("{}/{}", canonicalize(site_code), hour.format(HOUR_FORMAT)))
    }

    pub fn for_count(count: &NormalizedCount) -> Self {
        Self::new(&count.site_code, count.when)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Running totals for one aggregate key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateTotal {
    pub gate_id: GateId,
    pub hour: NaiveDateTime,
    pub ins: u64,
    pub outs: u64,
}

/// Accumulates normalized counts into per-key totals
#[derive(Debug, Default)]
pub struct Aggregator {
    totals: HashMap<AggregateKey, AggregateTotal>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one count into its key's total
    pub fn add(&mut self, count: &NormalizedCount) {
        let total = self.totals.entry(AggregateKey::for_count(count)).or_insert_with(|| {
            AggregateTotal { gate_id: count.gate_id, hour: count.hour(), ins: 0, outs: 0 }
        });
        total.ins += count.ins;
        total.outs += count.outs;
    }

    pub fn extend<'a, I>(&mut self, counts: I)
    where
        I: IntoIterator<Item = &'a NormalizedCount>,
    {
        for count in counts {
            self.add(count);
        }
    }

    /// Hand the accumulated totals off for delivery
    pub fn finish(self) -> Aggregates {
        Aggregates { totals: self.totals }
    }
}

/// Final, read-only aggregation result
#[derive(Debug, Default, Clone)]
pub struct Aggregates {
    totals: HashMap<AggregateKey, AggregateTotal>,
}

impl Aggregates {
    /// Aggregate a full set of counts in one go
    pub fn from_counts(counts: &[NormalizedCount]) -> Self {
        let mut aggregator = Aggregator::new();
        aggregator.extend(counts);
        aggregator.finish()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn get(&self, key: &AggregateKey) -> Option<&AggregateTotal> {
        self.totals.get(key)
    }

    /// All keys in ascending order
    pub fn sorted_keys(&self) -> Vec<AggregateKey> {
        let mut keys: Vec<AggregateKey> = self.totals.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn count(site: &str, location: &str, h: u32, m: u32, ins: u64, outs: u64) -> NormalizedCount {
        let when = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(h, m, 0).unwrap();
        NormalizedCount {
            site_code: site.to_string(),
            location: location.to_string(),
            period_ending: when.format("%Y-%m-%dT%H:%M:%S").to_string(),
            when,
            gate_id: GateId(3),
            ins,
            outs,
        }
    }

    #[test]
    fn test_key_format() {
        let c = count("02", "Main", 9, 15, 0, 0);
        assert_eq!(AggregateKey::for_count(&c).as_str(), "02/2024-03-01T09");
        let odd = count("0 2", "Main", 9, 15, 0, 0);
        assert_eq!(AggregateKey::for_count(&odd).as_str(), "0_2/2024-03-01T09");
    }

    #[test]
    fn test_same_site_hour_sums_across_locations() {
        let counts = vec![count("02", "Main", 9, 15, 3, 1), count("02", "Side", 9, 45, 7, 2)];
        let aggregates = Aggregates::from_counts(&counts);
        assert_eq!(aggregates.len(), 1);

        let total = aggregates.get(&AggregateKey::for_count(&counts[0])).unwrap();
        assert_eq!((total.ins, total.outs), (10, 3));
        assert_eq!(total.gate_id, GateId(3));
        assert_eq!(total.hour, counts[0].hour());
    }

    #[test]
    fn test_different_hours_stay_separate() {
        let counts = vec![count("02", "Main", 9, 15, 3, 1), count("02", "Main", 10, 15, 7, 2)];
        let aggregates = Aggregates::from_counts(&counts);
        assert_eq!(aggregates.len(), 2);
    }

    #[test]
    fn test_order_does_not_change_totals() {
        let counts = vec![
            count("02", "Main", 9, 0, 1, 9),
            count("03", "Main", 9, 0, 4, 4),
            count("02", "Side", 9, 30, 2, 8),
            count("02", "Main", 9, 59, 5, 0),
        ];
        let mut reversed = counts.clone();
        reversed.reverse();

        let forward = Aggregates::from_counts(&counts);
        let backward = Aggregates::from_counts(&reversed);
        assert_eq!(forward.sorted_keys(), backward.sorted_keys());
        for key in forward.sorted_keys() {
            assert_eq!(forward.get(&key), backward.get(&key));
        }

        let site_02 = forward.get(&AggregateKey::for_count(&counts[0])).unwrap();
        assert_eq!((site_02.ins, site_02.outs), (8, 17));
    }

    #[test]
    fn test_sorted_keys_by_site_then_hour() {
        let counts = vec![
            count("03", "Main", 8, 0, 1, 1),
            count("02", "Main", 11, 0, 1, 1),
            count("02", "Main", 9, 0, 1, 1),
        ];
        let keys: Vec<String> = Aggregates::from_counts(&counts)
            .sorted_keys()
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["02/2024-03-01T09", "02/2024-03-01T11", "03/2024-03-01T08"]);
    }
}
