//! Apple Health step-count records: streaming scan and daily aggregation.

mod aggregate;
mod record;
mod scan;

pub use aggregate::{DailyAggregator, DailyTotal, aggregate, default_since};
pub use record::{STEP_COUNT_TYPE, StepRecord};
pub use scan::parse;
