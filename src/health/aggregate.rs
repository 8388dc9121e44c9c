use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{ExtractError, Result};

use super::record::StepRecord;

/// Earliest timestamp collected by default: 2017-01-01 00:00:00, local.
pub fn default_since() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2017, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Sum of steps for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotal {
    /// Serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub steps: u64,
}

/// Folds step records into per-day totals as they stream in.
///
/// Records earlier than `since` are dropped, not zero-filled. Memory grows
/// with the number of distinct days, not the number of records.
#[derive(Debug)]
pub struct DailyAggregator {
    since: NaiveDateTime,
    totals: BTreeMap<NaiveDate, u64>,
    accepted: u64,
}

impl DailyAggregator {
    pub fn new(since: NaiveDateTime) -> Self {
        Self {
            since,
            totals: BTreeMap::new(),
            accepted: 0,
        }
    }

    pub fn push(&mut self, record: StepRecord) {
        if record.timestamp < self.since {
            return;
        }
        let total = self.totals.entry(record.timestamp.date()).or_default();
        *total = total.saturating_add(record.steps);
        self.accepted += 1;
    }

    /// Number of records that passed the date filter.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Daily totals in ascending date order.
    ///
    /// Fails with [`ExtractError::EmptyResult`] when no record passed the filter.
    pub fn finish(self) -> Result<Vec<DailyTotal>> {
        if self.accepted == 0 {
            return Err(ExtractError::EmptyResult);
        }
        Ok(self
            .totals
            .into_iter()
            .map(|(date, steps)| DailyTotal { date, steps })
            .collect())
    }
}

impl Default for DailyAggregator {
    fn default() -> Self {
        Self::new(default_since())
    }
}

/// Aggregate an already-collected sequence of records.
pub fn aggregate(
    records: impl IntoIterator<Item = StepRecord>,
    since: NaiveDateTime,
) -> Result<Vec<DailyTotal>> {
    let mut aggregator = DailyAggregator::new(since);
    for record in records {
        aggregator.push(record);
    }
    aggregator.finish()
}
