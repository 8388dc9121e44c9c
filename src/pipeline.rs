//! The single extraction entry point: archive path in, daily totals out.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ExtractError, Result};
use crate::health::{self, DailyAggregator, DailyTotal};
use crate::io::{CancelToken, CancellableReader, LocalFileReader, ReadAt};
use crate::zip::{DEFAULT_ENTRY, open_entry_in};

/// Identifier the donation layer files step totals under.
pub const RESULT_ID: &str = "ihealth_step_counts";

const SCAN_BUFFER_SIZE: usize = 64 * 1024;

/// Knobs for one extraction. `Default` matches the Apple Health export layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Archive member holding the activity log.
    pub entry_name: String,
    /// Records strictly before this local time are dropped.
    pub since: NaiveDateTime,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            entry_name: DEFAULT_ENTRY.to_string(),
            since: health::default_since(),
        }
    }
}

/// Label shown to participants in English and Dutch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Translatable {
    pub en: String,
    pub nl: String,
}

impl Translatable {
    pub fn new(en: impl Into<String>, nl: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            nl: nl.into(),
        }
    }
}

/// Aggregated step data handed to the consent layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub id: String,
    pub title: Translatable,
    pub rows: Vec<DailyTotal>,
}

impl ExtractionResult {
    fn daily_steps(rows: Vec<DailyTotal>) -> Self {
        Self {
            id: RESULT_ID.to_string(),
            title: Translatable::new("Steps", "Stappen"),
            rows,
        }
    }

    pub fn total_steps(&self) -> u64 {
        self.rows.iter().map(|row| row.steps).sum()
    }

    /// Donation payload for this result.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Opens the export member, streams its records and aggregates them by day.
///
/// Each call owns its archive handle and releases it before returning, so
/// one pipeline may serve calls on several threads.
#[derive(Debug, Clone, Default)]
pub struct ExtractionPipeline {
    options: ExtractOptions,
    cancel: Option<CancelToken>,
}

impl ExtractionPipeline {
    pub fn new(options: ExtractOptions) -> Self {
        Self {
            options,
            cancel: None,
        }
    }

    /// Abort reads once `token` is cancelled; the call then fails with
    /// [`ExtractError::Cancelled`].
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Extract daily totals from the archive at `archive_path`.
    pub fn extract(&self, archive_path: &Path) -> Result<ExtractionResult> {
        let reader = LocalFileReader::new(archive_path)
            .map_err(|e| ExtractError::archive(archive_path, e))?;
        self.extract_from(Arc::new(reader), archive_path)
    }

    /// Extract from an archive held by any [`ReadAt`] source.
    ///
    /// `label` names the source in errors and logs.
    pub fn extract_from<R: ReadAt>(
        &self,
        reader: Arc<R>,
        label: &Path,
    ) -> Result<ExtractionResult> {
        match &self.cancel {
            Some(token) => {
                let reader = CancellableReader::new(reader, token.clone());
                self.run(Arc::new(reader), label)
            }
            None => self.run(reader, label),
        }
    }

    fn run<R: ReadAt>(&self, reader: Arc<R>, label: &Path) -> Result<ExtractionResult> {
        let stream = open_entry_in(reader, label, &self.options.entry_name)?;

        let mut aggregator = DailyAggregator::new(self.options.since);
        let scanned = health::parse(BufReader::with_capacity(SCAN_BUFFER_SIZE, stream), |record| {
            aggregator.push(record)
        })?;

        let accepted = aggregator.accepted();
        let rows = aggregator.finish()?;

        tracing::info!(
            archive = %label.display(),
            scanned,
            accepted,
            days = rows.len(),
            "extracted daily step counts"
        );

        Ok(ExtractionResult::daily_steps(rows))
    }
}

/// Extract daily step totals from an Apple Health export archive.
pub fn extract_daily_steps(archive_path: impl AsRef<Path>) -> Result<ExtractionResult> {
    ExtractionPipeline::default().extract(archive_path.as_ref())
}

/// [`extract_daily_steps`] with explicit options.
pub fn extract_daily_steps_with(
    archive_path: impl AsRef<Path>,
    options: ExtractOptions,
) -> Result<ExtractionResult> {
    ExtractionPipeline::new(options).extract(archive_path.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn default_options_target_apple_export() {
        let options = ExtractOptions::default();
        assert_eq!(options.entry_name, "apple_health_export/export.xml");
        assert_eq!(
            options.since,
            NaiveDate::from_ymd_opt(2017, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn result_serializes_with_bilingual_title() {
        let result = ExtractionResult::daily_steps(vec![DailyTotal {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            steps: 350,
        }]);
        assert_eq!(
            result.to_json().unwrap(),
            r#"{"id":"ihealth_step_counts","title":{"en":"Steps","nl":"Stappen"},"rows":[{"date":"2024-01-01","steps":350}]}"#
        );
        assert_eq!(result.total_steps(), 350);
    }
}
