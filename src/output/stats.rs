//! Run summary
//!
//! Collects the per-stage counters of a finished run and prints them in the
//! same plain layout the CLI uses for its other reports.

use crate::crawler::{ExtractionReport, ListingReport, ProfileReport};
use chrono::{DateTime, Utc};

/// Outcome counters for one complete run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    pub listing: ListingReport,
    pub profile: ProfileReport,
    pub extraction: ExtractionReport,

    /// Company URLs written to the links sink
    pub links_written: u64,

    /// Emails written to the emails sink
    pub emails_written: u64,

    /// Whether the run stopped early
    pub cancelled: bool,
}

impl RunSummary {
    /// Starts a summary stamped with the current time
    pub fn start() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration, once both timestamps are set
    pub fn duration_seconds(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some((finished - started).num_seconds()),
            _ => None,
        }
    }

    /// Fetches attempted across all stages
    pub fn total_fetches(&self) -> u64 {
        self.listing.pages_fetched
            + self.listing.pages_failed
            + self.profile.profiles_fetched
            + self.profile.profiles_failed
            + self.extraction.urls_fetched
            + self.extraction.urls_failed
    }

    /// Failed fetches across all stages
    pub fn total_failures(&self) -> u64 {
        self.listing.pages_failed + self.profile.profiles_failed + self.extraction.urls_failed
    }

    /// Share of attempted fetches that succeeded, as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.total_fetches();
        if total == 0 {
            return 0.0;
        }
        (total - self.total_failures()) as f64 / total as f64 * 100.0
    }
}

/// Prints a run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    println!("=== Harvest Summary ===\n");

    if let Some(started) = summary.started_at {
        println!("Started:  {}", started.to_rfc3339());
    }
    if let Some(finished) = summary.finished_at {
        println!("Finished: {}", finished.to_rfc3339());
    }
    if let Some(duration) = summary.duration_seconds() {
        println!(
            "Duration: {} seconds ({:.2} minutes)",
            duration,
            duration as f64 / 60.0
        );
    }
    if summary.cancelled {
        println!("Status:   cancelled before completion");
    }
    println!();

    println!("Listing pages:");
    println!("  Fetched: {}", summary.listing.pages_fetched);
    println!("  Failed: {}", summary.listing.pages_failed);
    println!("  Without rows: {}", summary.listing.pages_without_rows);
    println!("  Profile links found: {}", summary.listing.links_found);
    println!();

    println!("Profile pages:");
    println!("  Fetched: {}", summary.profile.profiles_fetched);
    println!("  Failed: {}", summary.profile.profiles_failed);
    println!("  Skipped links: {}", summary.profile.links_skipped);
    println!("  Without company link: {}", summary.profile.profiles_without_url);
    println!("  Company URLs found: {}", summary.profile.urls_found);
    println!();

    println!("Company sites:");
    println!("  Fetched: {}", summary.extraction.urls_fetched);
    println!("  Failed: {}", summary.extraction.urls_failed);
    if summary.extraction.urls_cancelled > 0 {
        println!("  Not visited: {}", summary.extraction.urls_cancelled);
    }
    println!("  Emails found: {}", summary.extraction.emails_found);
    println!();

    println!("Written: {} URLs, {} emails", summary.links_written, summary.emails_written);
    println!(
        "Success Rate: {:.1}% ({} / {} fetches)",
        summary.success_rate(),
        summary.total_fetches() - summary.total_failures(),
        summary.total_fetches()
    );
}
