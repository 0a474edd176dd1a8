//! Stage progress reporting
//!
//! Progress is observational only: workers call [`Progress::tick`] after each
//! item and a bar is logged whenever another tenth of the work completes.
//! Ticking never blocks and never influences the crawl.

use std::sync::atomic::{AtomicU64, Ordering};

/// Width of the rendered bar, in characters
pub const BAR_WIDTH: usize = 50;

/// Items between log lines when the total is unknown
const UNBOUNDED_LOG_EVERY: u64 = 50;

/// Completed/total counter for one stage
#[derive(Debug)]
pub struct Progress {
    stage: &'static str,
    total: Option<u64>,
    completed: AtomicU64,
    last_step: AtomicU64,
}

impl Progress {
    /// Progress over a known number of items
    pub fn new(stage: &'static str, total: u64) -> Self {
        Self {
            stage,
            total: Some(total),
            completed: AtomicU64::new(0),
            last_step: AtomicU64::new(0),
        }
    }

    /// Progress over a stream whose length is not known up front
    pub fn unbounded(stage: &'static str) -> Self {
        Self {
            stage,
            total: None,
            completed: AtomicU64::new(0),
            last_step: AtomicU64::new(0),
        }
    }

    /// Records one finished item and returns the completed count
    pub fn tick(&self) -> u64 {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;

        match self.total {
            Some(total) if total > 0 => {
                let step = (done.min(total) * 10) / total;
                if self.last_step.fetch_max(step, Ordering::Relaxed) < step {
                    tracing::info!(
                        "{} {} ({}/{})",
                        self.stage,
                        render_bar(done, total, BAR_WIDTH),
                        done.min(total),
                        total
                    );
                }
            }
            _ => {
                if done % UNBOUNDED_LOG_EVERY == 0 {
                    tracing::info!("{}: {} processed", self.stage, done);
                }
            }
        }

        done
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Percentage complete, when the total is known
    pub fn percent(&self) -> Option<f64> {
        self.total.map(|total| percent(self.completed(), total))
    }
}

fn percent(completed: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        completed.min(total) as f64 / total as f64 * 100.0
    }
}

/// Renders `[=====     ] 50.00%` for `completed` out of `total`
pub fn render_bar(completed: u64, total: u64, width: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        (completed.min(total) as u128 * width as u128 / total as u128) as usize
    };

    format!(
        "[{:<width$}] {:.2}%",
        "=".repeat(filled),
        percent(completed, total),
        width = width
    )
}
