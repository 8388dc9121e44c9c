use chrono::{NaiveDate, NaiveDateTime};
use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::ExtractOptions;
use crate::zip::DEFAULT_ENTRY;

#[derive(Parser, Debug)]
#[command(name = "healthsteps")]
#[command(version)]
#[command(about = "Extract daily step counts from an Apple Health export", long_about = None)]
#[command(after_help = "Examples:\n  \
  healthsteps export.zip                  print daily totals as JSON\n  \
  healthsteps --pretty export.zip         same, indented\n  \
  healthsteps --since 2020-01-01 export.zip   only days from 2020 on")]
pub struct Cli {
    /// Apple Health export archive
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Archive member holding the activity log
    #[arg(short = 'e', long = "entry", value_name = "PATH", default_value = DEFAULT_ENTRY)]
    pub entry: String,

    /// Drop records before this date (YYYY-MM-DD)
    #[arg(long = "since", value_name = "DATE", default_value = "2017-01-01")]
    pub since: NaiveDate,

    /// Indent the JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Verbose logging (-vv => trace)
    #[arg(short = 'v', action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short = 'q')]
    pub quiet: bool,
}

impl Cli {
    pub fn options(&self) -> ExtractOptions {
        ExtractOptions {
            entry_name: self.entry.clone(),
            since: self.since_datetime(),
        }
    }

    fn since_datetime(&self) -> NaiveDateTime {
        self.since
            .and_hms_opt(0, 0, 0)
            .unwrap_or(NaiveDateTime::MIN)
    }

    /// Default tracing directive when `RUST_LOG` is unset.
    pub fn log_directive(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "healthsteps=warn",
            (false, 0) => "healthsteps=info",
            (false, 1) => "healthsteps=debug",
            (false, _) => "healthsteps=trace",
        }
    }
}
