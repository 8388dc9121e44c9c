//! # healthsteps
//!
//! Daily step-count totals from an Apple Health export archive.
//!
//! An export is a ZIP file whose `apple_health_export/export.xml` member can
//! run to gigabytes. This crate locates that member through the archive's
//! central directory, inflates it as a stream, scans the XML one event at a
//! time for `HKQuantityTypeIdentifierStepCount` records, and folds them into
//! one total per calendar day. Nothing is buffered beyond the current event
//! and the running per-day table.
//!
//! ## Example
//!
//! ```no_run
//! use healthsteps::{ErrorKind, extract_daily_steps};
//!
//! match extract_daily_steps("export.zip") {
//!     Ok(result) => {
//!         for row in &result.rows {
//!             println!("{} {}", row.date, row.steps);
//!         }
//!     }
//!     Err(e) if e.kind() == ErrorKind::EntryNotFound => eprintln!("not a Health export: {e}"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

pub mod cli;
pub mod error;
pub mod flow;
pub mod health;
pub mod io;
pub mod pipeline;
pub mod zip;

pub use cli::Cli;
pub use error::{ErrorKind, ExtractError};
pub use flow::{Command, DonationFlow, HostEvent, LogMessage, StepSource};
pub use health::{DailyTotal, StepRecord};
pub use io::{CancelToken, LocalFileReader, ReadAt};
pub use pipeline::{
    ExtractOptions, ExtractionPipeline, ExtractionResult, Translatable, extract_daily_steps,
    extract_daily_steps_with,
};
pub use zip::open_entry;
