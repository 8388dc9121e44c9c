use chrono::{DateTime, NaiveDateTime};

use crate::error::{ExtractError, Result};

/// `type` attribute value identifying pedometer step records.
pub const STEP_COUNT_TYPE: &str = "HKQuantityTypeIdentifierStepCount";

/// Layout of `startDate`, e.g. `2024-01-01 08:15:00 +0100`.
const START_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// One step-count observation as written in the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRecord {
    /// Wall-clock time as written, with the UTC offset discarded.
    pub timestamp: NaiveDateTime,
    pub steps: u64,
}

impl StepRecord {
    /// Build a record from raw `value` and `startDate` attribute text.
    pub fn from_attributes(value: &str, start_date: &str) -> Result<Self> {
        let steps = value.trim().parse::<u64>().map_err(|_| {
            ExtractError::InvalidDocument(format!("step record has invalid value '{value}'"))
        })?;
        Ok(Self {
            timestamp: parse_start_date(start_date)?,
            steps,
        })
    }
}

/// Parse `startDate` and keep the local time it names.
///
/// `2024-01-01 23:30:00 -0500` stays on 2024-01-01; no conversion to UTC.
fn parse_start_date(raw: &str) -> Result<NaiveDateTime> {
    DateTime::parse_from_str(raw.trim(), START_DATE_FORMAT)
        .map(|dt| dt.naive_local())
        .map_err(|e| {
            ExtractError::InvalidDocument(format!("step record has invalid startDate '{raw}': {e}"))
        })
}
