//! File-backed result sinks
//!
//! Company URLs go to a compact JSON array of strings (no trailing newline).
//! Emails go to a one-column CSV whose header row is `Emails`.

use crate::output::traits::{OutputResult, ResultSink};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Header row of the emails file
pub const EMAILS_HEADER: &str = "Emails";

/// Writes `links` as a JSON array, replacing any existing file
pub fn write_links_json(links: &[String], path: &Path) -> OutputResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, links)?;
    writer.flush()?;
    Ok(())
}

/// Reads a links file written by [`write_links_json`]
///
/// A `null` document (an empty result from older tooling) reads as no links.
pub fn read_links_json(path: &Path) -> OutputResult<Vec<String>> {
    let data = std::fs::read(path)?;
    let links: Option<Vec<String>> = serde_json::from_slice(&data)?;
    Ok(links.unwrap_or_default())
}

/// Writes `emails` under an `Emails` header, replacing any existing file
pub fn write_emails_csv(emails: &[String], path: &Path) -> OutputResult<()> {
    let file = File::create(path)?;
    write_emails_to(emails, file)
}

/// Writes the emails CSV into any writer
pub fn write_emails_to<W: Write>(emails: &[String], out: W) -> OutputResult<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([EMAILS_HEADER])?;
    for email in emails {
        writer.write_record([email])?;
    }
    writer.flush()?;
    Ok(())
}

/// Sink writing both result files to the configured paths
#[derive(Debug, Clone)]
pub struct FileSink {
    links_path: PathBuf,
    emails_path: PathBuf,
}

impl FileSink {
    pub fn new(links_path: impl Into<PathBuf>, emails_path: impl Into<PathBuf>) -> Self {
        Self {
            links_path: links_path.into(),
            emails_path: emails_path.into(),
        }
    }

    pub fn links_path(&self) -> &Path {
        &self.links_path
    }

    pub fn emails_path(&self) -> &Path {
        &self.emails_path
    }
}

impl ResultSink for FileSink {
    fn write_links(&self, links: &[String]) -> OutputResult<()> {
        write_links_json(links, &self.links_path)?;
        tracing::info!(
            "{} URLs saved to {}",
            links.len(),
            self.links_path.display()
        );
        Ok(())
    }

    fn write_emails(&self, emails: &[String]) -> OutputResult<()> {
        write_emails_csv(emails, &self.emails_path)?;
        tracing::info!(
            "{} emails saved to {}",
            emails.len(),
            self.emails_path.display()
        );
        Ok(())
    }
}
