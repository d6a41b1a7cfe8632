//! Harvest controller state machine
//!
//! The run is a small state machine over a [`QueryWindow`]:
//!
//! - `RESUME_CHECK`: a configured start offset past the API cap only makes
//!   sense when resuming; the checkpoint decides whether it is a resume or
//!   a misconfiguration.
//! - `INIT`: on a fresh start the remote is asked for its single oldest
//!   record to seed the window's lower bound.
//! - `PAGING`: fetch, extract, persist, checkpoint, advance. An empty page
//!   is the exhaustion signal.
//! - `ROLLOVER`: when the next fetch would pass the offset cap, the lower
//!   bound advances to the last persisted date and paging restarts at 1.
//! - `EXHAUSTED`: the checkpoint is deleted so it cannot leak into the
//!   next independent run.
//!
//! Everything here runs on a single logical thread of control: no page is
//! fetched before the previous page is fully persisted and checkpointed,
//! which is what makes the rollover bound trustworthy.

use crate::api::PageFetcher;
use crate::checkpoint::CheckpointStore;
use crate::config::HarvestConfig;
use crate::error::{Error, Result};
use crate::extract;
use crate::sink::RecordSink;
use crate::types::{Observation, QueryWindow};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

/// Outcome of a completed harvest run
#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestReport {
    /// Records extracted across all pages
    pub records_extracted: u64,
    /// Records actually inserted (duplicates excluded)
    pub records_inserted: u64,
    /// Pages fetched, including the final empty one
    pub pages_fetched: u32,
    /// Window rollovers performed
    pub cycles_completed: u32,
    /// Whether this run resumed from a checkpoint
    pub resumed: bool,
}

/// Drives one harvest run from start to exhaustion
pub struct Harvester<F, S> {
    fetcher: F,
    sink: S,
    checkpoint: CheckpointStore,
    config: HarvestConfig,
}

impl<F: PageFetcher, S: RecordSink> Harvester<F, S> {
    /// Create a controller over its three collaborators
    pub fn new(config: HarvestConfig, fetcher: F, sink: S, checkpoint: CheckpointStore) -> Self {
        Self {
            fetcher,
            sink,
            checkpoint,
            config,
        }
    }

    /// Run the harvest to exhaustion.
    ///
    /// On any error the checkpoint is left untouched, so the next
    /// invocation resumes at the last safely persisted date. Only
    /// confirmed exhaustion removes it.
    pub async fn run(mut self) -> Result<HarvestReport> {
        let today = Local::now().date_naive();
        let (mut window, resumed) = self.starting_window(today).await?;

        info!(
            lower = %window.lower,
            upper = %window.upper,
            page = window.page,
            per_page = window.per_page,
            resumed,
            "harvest started"
        );

        let mut report = HarvestReport {
            resumed,
            ..HarvestReport::default()
        };

        // Date of the last record persisted in the current window; seeds
        // the next window's lower bound at rollover.
        let mut last_persisted: Option<NaiveDate> = None;

        loop {
            if window.exceeds_cap() {
                // ROLLOVER: narrow the date filter past everything already
                // seen and restart paging from offset zero.
                let Some(date) = last_persisted else {
                    // Cap exceeded before any page was persisted in this
                    // window; the start offset was validated, so the only
                    // way here is a window that cannot advance.
                    return Err(Error::WindowStalled {
                        date: window.lower.to_string(),
                    });
                };
                if date <= window.lower {
                    return Err(Error::WindowStalled {
                        date: date.to_string(),
                    });
                }
                window.roll_over(date);
                last_persisted = None;
                report.cycles_completed += 1;
                info!(
                    lower = %window.lower,
                    cycle = report.cycles_completed,
                    records = report.records_extracted,
                    "offset cap reached, window rolled forward"
                );
                continue;
            }

            let page_json = self.fetch_with_retry(&window).await?;
            report.pages_fetched += 1;

            let records = extract::extract_page(&page_json);
            if records.is_empty() {
                // EXHAUSTED: a zero-record page is the sole exhaustion
                // signal; the checkpoint must not survive a completed run.
                self.checkpoint.clear().await?;
                info!(
                    records = report.records_extracted,
                    inserted = report.records_inserted,
                    cycles = report.cycles_completed,
                    pages = report.pages_fetched,
                    "all records harvested"
                );
                return Ok(report);
            }

            let inserted = self.sink.upsert_batch(&records)?;
            report.records_extracted += records.len() as u64;
            report.records_inserted += inserted as u64;

            // Checkpoint the last record's date only after the sink call
            // returned; a crash in between just reprocesses this page.
            match last_dated(&records) {
                Some(date) => {
                    self.checkpoint.write(date).await?;
                    last_persisted = Some(date);
                }
                None => warn!(
                    page = window.page,
                    "no dated records on page; checkpoint not advanced"
                ),
            }

            info!(
                page = window.page,
                extracted = records.len(),
                inserted,
                "page persisted"
            );
            window.advance_page();
        }
    }

    /// Determine the starting window (`RESUME_CHECK` then `INIT`).
    ///
    /// Returns the window plus whether this run resumed from a checkpoint.
    async fn starting_window(&self, today: NaiveDate) -> Result<(QueryWindow, bool)> {
        if self.config.start_offset_over_cap() {
            // A start offset past the cap is not addressable, so this must
            // be a resume after interruption.
            match self.checkpoint.read().await? {
                Some(date) => {
                    info!(
                        lower = %date,
                        "resuming interrupted harvest from checkpoint"
                    );
                    return Ok((
                        QueryWindow::new(date, today, 1, self.config.per_page),
                        true,
                    ));
                }
                None => {
                    return Err(Error::InvalidStartPage {
                        start_page: self.config.start_page,
                        per_page: self.config.per_page,
                    })
                }
            }
        }

        // Fresh start: the window opens at the remote's oldest record. A
        // failure here is fatal with no retry, since it indicates a broken
        // query configuration rather than a transient fault.
        let oldest = self.fetcher.oldest_observation_date().await?;
        Ok((
            QueryWindow::new(oldest, today, self.config.start_page, self.config.per_page),
            false,
        ))
    }

    /// Fetch a page, retrying a transient transport fault exactly once.
    ///
    /// A second failure aborts the run; the checkpoint stays on disk so
    /// the next invocation resumes instead of restarting.
    async fn fetch_with_retry(&self, window: &QueryWindow) -> Result<serde_json::Value> {
        match self.fetcher.fetch_page(window).await {
            Ok(page) => Ok(page),
            Err(e) if e.is_retryable() => {
                warn!(page = window.page, error = %e, "page fetch failed, retrying once");
                self.fetcher.fetch_page(window).await
            }
            Err(e) => Err(e),
        }
    }
}

/// Observed date of the last dated record on a page.
///
/// The fetch query sorts ascending by date, so the page's last dated
/// record carries the window's furthest progress.
fn last_dated(records: &[Observation]) -> Option<NaiveDate> {
    records.iter().rev().find_map(|r| r.observed_on)
}
