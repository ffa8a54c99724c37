//! Aggregate statistics over parallel part/count arrays.
//!
//! A record whose arrays disagree in length is malformed: it is logged and
//! skipped, and the rest of the pass continues.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::KeySyncResult;

/// One reported statistic: `count[i]` occurrences of `part[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRecord {
    pub name: String,
    #[serde(default)]
    pub part: Vec<String>,
    #[serde(default)]
    pub count: Vec<u64>,
}

impl StatRecord {
    pub fn is_consistent(&self) -> bool {
        self.part.len() == self.count.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatSummary {
    /// Statistic name, then part, to summed count.
    pub totals: BTreeMap<String, BTreeMap<String, u64>>,
    pub processed: usize,
    pub skipped: usize,
}

impl StatSummary {
    pub fn total(&self, name: &str, part: &str) -> u64 {
        self.totals
            .get(name)
            .and_then(|parts| parts.get(part))
            .copied()
            .unwrap_or(0)
    }
}

pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a StatRecord>) -> StatSummary {
    let mut summary = StatSummary::default();

    for record in records {
        if !record.is_consistent() {
            tracing::warn!(
                name = %record.name,
                parts = record.part.len(),
                counts = record.count.len(),
                "skipping statistic with mismatched part/count lengths"
            );
            summary.skipped += 1;
            continue;
        }

        let parts = summary.totals.entry(record.name.clone()).or_default();
        for (part, count) in record.part.iter().zip(&record.count) {
            let total = parts.entry(part.clone()).or_insert(0);
            *total = total.saturating_add(*count);
        }
        summary.processed += 1;
    }

    summary
}

/// Parse a JSON array of [`StatRecord`]s and aggregate it.
pub fn aggregate_json(json: &str) -> KeySyncResult<StatSummary> {
    let records: Vec<StatRecord> = serde_json::from_str(json)?;
    Ok(aggregate(&records))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, part: &[&str], count: &[u64]) -> StatRecord {
        StatRecord {
            name: name.to_string(),
            part: part.iter().map(|p| p.to_string()).collect(),
            count: count.to_vec(),
        }
    }

    #[test]
    fn test_mismatched_record_is_skipped() {
        let records = vec![
            record("bad", &["x", "x", "y"], &[2, 1]),
            record("good", &["x", "y", "x"], &[2, 1, 3]),
        ];
        let summary = aggregate(&records);

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.processed, 1);
        assert!(!summary.totals.contains_key("bad"));
        assert_eq!(summary.total("good", "x"), 5);
        assert_eq!(summary.total("good", "y"), 1);
    }

    #[test]
    fn test_same_name_accumulates() {
        let records = vec![record("logins", &["ok"], &[3]), record("logins", &["ok"], &[4])];
        assert_eq!(aggregate(&records).total("logins", "ok"), 7);
    }

    #[test]
    fn test_aggregate_json() {
        let json = r#"[
            {"name": "sync", "part": ["new", "existing"], "count": [1]},
            {"name": "sync", "part": ["new"], "count": [4]}
        ]"#;
        let summary = aggregate_json(json).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total("sync", "new"), 4);
    }

    #[test]
    fn test_invalid_json_is_decode_error() {
        let err = aggregate_json("{not json").unwrap_err();
        assert_eq!(err.error_code(), "E_DECODE");
    }
}
