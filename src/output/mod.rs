//! Output module for result files, progress and run summaries
//!
//! This module handles:
//! - Writing company URLs to `links.json` and emails to `emails.csv`
//! - Reading a previous `links.json` back for email-only runs
//! - Per-stage progress bars
//! - The end-of-run summary

mod files;
mod progress;
pub mod stats;
mod traits;

pub use files::{
    read_links_json, write_emails_csv, write_emails_to, write_links_json, FileSink,
    EMAILS_HEADER,
};
pub use progress::{render_bar, Progress, BAR_WIDTH};
pub use stats::{print_summary, RunSummary};
pub use traits::{OutputError, OutputResult, ResultSink, SinkFailures};
