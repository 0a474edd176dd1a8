//! Result sink traits and error types
//!
//! A run produces two result sets: the company URLs gathered by the profile
//! stage and the emails harvested from them. Sinks persist each set
//! independently so one failing never prevents the other from being written.

use std::fmt;
use thiserror::Error;

/// Errors that can occur while writing or reading a result file
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for the two result sets of a run
///
/// Implementations must be thread-safe; the coordinator holds them behind an
/// `Arc` and calls each method at most once per run.
pub trait ResultSink: Send + Sync {
    /// Persists the company URLs in collection order
    fn write_links(&self, links: &[String]) -> OutputResult<()>;

    /// Persists the harvested emails in extraction order
    fn write_emails(&self, emails: &[String]) -> OutputResult<()>;
}

/// Which sinks failed at the end of a run
#[derive(Debug, Default)]
pub struct SinkFailures {
    pub links: Option<OutputError>,
    pub emails: Option<OutputError>,
}

impl SinkFailures {
    pub fn is_empty(&self) -> bool {
        self.links.is_none() && self.emails.is_none()
    }
}

impl fmt::Display for SinkFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.links, &self.emails) {
            (Some(links), Some(emails)) => {
                write!(f, "links sink: {}; emails sink: {}", links, emails)
            }
            (Some(links), None) => write!(f, "links sink: {}", links),
            (None, Some(emails)) => write!(f, "emails sink: {}", emails),
            (None, None) => write!(f, "no sink failures"),
        }
    }
}
