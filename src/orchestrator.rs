//! Sequential page loop with live-save and resume.
//!
//! Pages are visited in ascending order, one fetch in flight at a time. Each page
//! that yields cards is handed to the [`Store`] and the write completes before the
//! next page is requested, so an interrupted run loses at most the page that was
//! being fetched.

use std::{future::Future, pin::pin, time::Duration};

use futures::FutureExt;
use tokio::time::Instant;

use crate::{
    config::Plan,
    fetcher::{FetchError, PageFetcher, PageOutcome},
    store::Store,
    Error,
};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunStats {
    pub pages_scraped: u32,
    pub pages_skipped: u32,
    pub cards_extracted: usize,
    pub errors: u32,
    pub elapsed: Duration,
}

impl RunStats {
    /// Percentage of attempted pages that succeeded. 100 when nothing was attempted.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.pages_scraped + self.errors;
        if attempted == 0 {
            return 100.0;
        }
        f64::from(self.pages_scraped) / f64::from(attempted) * 100.0
    }

    pub fn cards_per_second(&self) -> f64 {
        let secs = (self.elapsed.as_secs_f64() * 100.0).round() / 100.0;
        if secs == 0.0 {
            return 0.0;
        }
        self.cards_extracted as f64 / secs
    }
}

#[derive(Debug)]
pub enum RunState {
    Completed,
    Cancelled,
    Failed(Error),
}

#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub stats: RunStats,
}

/// Drives a single run of `plan` until it completes, `cancel` resolves, or a
/// fatal error occurs. Statistics are returned for every outcome.
pub async fn run<S, F, C>(plan: &Plan, store: &mut S, fetcher: &mut F, cancel: C) -> RunReport
where
    S: Store + Send + Sync,
    F: PageFetcher + ?Sized,
    C: Future<Output = ()>,
{
    let started = Instant::now();
    let mut stats = RunStats::default();
    tracing::info!(
        start = plan.start,
        end = ?plan.end,
        resume = plan.resume,
        "starting run"
    );

    let state = match drive(plan, store, fetcher, cancel, &mut stats).await {
        Ok(state) => state,
        Err(e) => RunState::Failed(e),
    };
    stats.elapsed = started.elapsed();

    match &state {
        RunState::Completed => tracing::info!(?stats, "run completed"),
        RunState::Cancelled => tracing::info!(?stats, "run cancelled"),
        RunState::Failed(e) => tracing::error!(?stats, "run failed: {e}"),
    }
    RunReport { state, stats }
}

async fn drive<S, F, C>(
    plan: &Plan,
    store: &mut S,
    fetcher: &mut F,
    cancel: C,
    stats: &mut RunStats,
) -> Result<RunState, Error>
where
    S: Store + Send + Sync,
    F: PageFetcher + ?Sized,
    C: Future<Output = ()>,
{
    let mut cancel = pin!(cancel.fuse());
    let mut page = plan.start;
    let mut failed_in_a_row = 0u32;

    loop {
        if plan.end.is_some_and(|end| page > end) {
            return Ok(RunState::Completed);
        }

        if plan.resume && store.has_page(page) {
            tracing::debug!(page, "already scraped, skipping");
            stats.pages_skipped += 1;
        } else {
            let fetched = tokio::select! {
                biased;
                () = &mut cancel => None,
                result = fetcher.fetch(page) => Some(result),
            };
            let Some(result) = fetched else {
                return Ok(RunState::Cancelled);
            };

            match result {
                Ok(PageOutcome::EndOfData) => {
                    tracing::info!(page, "no more data");
                    return Ok(RunState::Completed);
                }
                Ok(PageOutcome::Cards(cards)) if cards.is_empty() && plan.end.is_none() => {
                    tracing::info!(page, "empty page, treating as end of data");
                    return Ok(RunState::Completed);
                }
                Ok(PageOutcome::Cards(cards)) => {
                    store.append_page(page, &cards).await?;
                    failed_in_a_row = 0;
                    stats.pages_scraped += 1;
                    stats.cards_extracted += cards.len();
                    tracing::info!(page, cards = cards.len(), "page saved");
                }
                Err(e @ FetchError::Fatal { .. }) => return Err(e.into()),
                Err(e) => {
                    stats.errors += 1;
                    failed_in_a_row += 1;
                    tracing::warn!(failed_in_a_row, "skipping page after error: {e}");
                }
            }

            let more = plan.end.map_or(true, |end| page < end);
            if more && !plan.page_delay.is_zero() {
                tokio::select! {
                    biased;
                    () = &mut cancel => return Ok(RunState::Cancelled),
                    () = tokio::time::sleep(plan.page_delay) => {}
                }
            }
        }

        page = match page.checked_add(1) {
            Some(next) => next,
            None => return Ok(RunState::Completed),
        };
    }
}
