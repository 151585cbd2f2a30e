use super::{Batch, BoundaryDecision, BoundaryOracle};
use crate::error::{Result, SplitError};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Default retries per batch after the first attempt.
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff (milliseconds).
const BASE_DELAY_MS: u64 = 1000;

/// Final state of one batch after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Decided(BoundaryDecision),
    /// The oracle never produced a usable decision; the batch is split on the
    /// word cap alone.
    Fallback {
        batch_index: usize,
        attempts: u32,
        reason: String,
    },
}

impl BatchOutcome {
    pub fn batch_index(&self) -> usize {
        match self {
            BatchOutcome::Decided(d) => d.batch_index,
            BatchOutcome::Fallback { batch_index, .. } => *batch_index,
        }
    }

    pub fn decision(&self) -> Option<&BoundaryDecision> {
        match self {
            BatchOutcome::Decided(d) => Some(d),
            BatchOutcome::Fallback { .. } => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, BatchOutcome::Fallback { .. })
    }
}

/// Statistics from a dispatch run.
#[derive(Debug, Clone)]
pub struct DispatchStats {
    pub total_batches: usize,
    pub decided_batches: usize,
    pub fallback_batches: usize,
    pub total_time: Duration,
    pub avg_batch_time: Duration,
}

/// Outcomes in batch order plus run statistics.
#[derive(Debug)]
pub struct DispatchReport {
    pub outcomes: Vec<BatchOutcome>,
    pub stats: DispatchStats,
}

/// Result of processing a single batch.
struct BatchResult {
    index: usize,
    outcome: Option<BatchOutcome>,
    duration_ms: u64,
}

/// Runs oracle calls for all batches with bounded concurrency.
pub struct BatchDispatcher {
    oracle: Arc<dyn BoundaryOracle>,
    concurrency: usize,
    max_retries: u32,
    base_delay: Duration,
    show_progress: bool,
    cancelled: Arc<AtomicBool>,
}

impl BatchDispatcher {
    pub fn new(oracle: Arc<dyn BoundaryOracle>, concurrency: usize) -> Self {
        Self {
            oracle,
            concurrency: concurrency.max(1),
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            show_progress: true,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set retries after the first attempt and the backoff base delay.
    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    /// Enable or disable progress bar display.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Share a cancellation flag; batches not yet started are skipped once set.
    pub fn with_cancel(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Classify every batch and return one outcome per batch, in batch order.
    ///
    /// A failing batch never affects the others. If cancellation is requested,
    /// in-flight calls finish and the run returns `Cancelled` without outcomes.
    pub async fn dispatch(&self, batches: Vec<Batch>) -> Result<DispatchReport> {
        let total_batches = batches.len();
        let start_time = Instant::now();

        if total_batches == 0 {
            return Ok(DispatchReport {
                outcomes: Vec::new(),
                stats: DispatchStats {
                    total_batches: 0,
                    decided_batches: 0,
                    fallback_batches: 0,
                    total_time: Duration::ZERO,
                    avg_batch_time: Duration::ZERO,
                },
            });
        }

        info!(
            "Dispatching {} batches with {} concurrent requests to {}",
            total_batches,
            self.concurrency,
            self.oracle.name()
        );

        let progress_bar = if self.show_progress {
            let pb = ProgressBar::new(total_batches as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        // Use semaphore to limit concurrency
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut futures = FuturesUnordered::new();

        for batch in batches {
            let sem = semaphore.clone();
            let oracle = self.oracle.clone();
            let cancelled = self.cancelled.clone();
            let pb = progress_bar.clone();
            let max_retries = self.max_retries;
            let base_delay = self.base_delay;

            futures.push(async move {
                let index = batch.index;
                let Ok(_permit) = sem.acquire().await else {
                    return BatchResult {
                        index,
                        outcome: None,
                        duration_ms: 0,
                    };
                };

                if cancelled.load(Ordering::Relaxed) {
                    debug!("Skipping batch {} after cancellation", index);
                    return BatchResult {
                        index,
                        outcome: None,
                        duration_ms: 0,
                    };
                }

                let batch_start = Instant::now();
                let outcome =
                    classify_with_retry(oracle.as_ref(), &batch, max_retries, base_delay).await;
                let duration_ms = batch_start.elapsed().as_millis() as u64;

                if let Some(ref pb) = pb {
                    pb.inc(1);
                }

                BatchResult {
                    index,
                    outcome: Some(outcome),
                    duration_ms,
                }
            });
        }

        // Results land in their batch's slot regardless of completion order
        let mut slots: Vec<Option<BatchOutcome>> = vec![None; total_batches];
        let mut total_batch_time_ms: u64 = 0;
        while let Some(result) = futures.next().await {
            total_batch_time_ms += result.duration_ms;
            if let Some(slot) = slots.get_mut(result.index) {
                *slot = result.outcome;
            }
        }

        if let Some(pb) = progress_bar {
            pb.finish_with_message("Boundary detection complete");
        }

        if self.cancelled.load(Ordering::Relaxed) {
            warn!("Dispatch cancelled; discarding {} batch results", total_batches);
            return Err(SplitError::Cancelled);
        }

        let outcomes: Vec<BatchOutcome> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| BatchOutcome::Fallback {
                    batch_index: index,
                    attempts: 0,
                    reason: "batch was not processed".to_string(),
                })
            })
            .collect();

        let fallback_batches = outcomes.iter().filter(|o| o.is_fallback()).count();
        let total_time = start_time.elapsed();
        let stats = DispatchStats {
            total_batches,
            decided_batches: total_batches - fallback_batches,
            fallback_batches,
            total_time,
            avg_batch_time: Duration::from_millis(total_batch_time_ms / total_batches as u64),
        };

        info!(
            "Boundary detection complete: {}/{} batches decided, {} fell back, in {:.2}s",
            stats.decided_batches,
            total_batches,
            fallback_batches,
            total_time.as_secs_f64()
        );

        Ok(DispatchReport { outcomes, stats })
    }
}

/// Call the oracle for one batch, retrying oracle failures with exponential backoff.
async fn classify_with_retry(
    oracle: &dyn BoundaryOracle,
    batch: &Batch,
    max_retries: u32,
    base_delay: Duration,
) -> BatchOutcome {
    let mut attempts = 0u32;
    let mut last_error: Option<SplitError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = base_delay * 2u32.pow(attempt - 1);
            debug!(
                "Retry {} for batch {} after {}ms",
                attempt,
                batch.index,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        attempts += 1;
        match oracle.classify_boundaries(batch).await {
            Ok(decision) => {
                debug!(
                    "Batch {} decided with {} cuts",
                    batch.index,
                    decision.cuts.len()
                );
                return BatchOutcome::Decided(decision);
            }
            Err(e) => {
                warn!("Batch {} attempt {} failed: {}", batch.index, attempts, e);
                let retryable = e.is_retryable();
                last_error = Some(e);
                if !retryable {
                    break;
                }
            }
        }
    }

    let reason = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown error".to_string());
    warn!(
        "Batch {} falls back to cap-only splitting after {} attempts",
        batch.index, attempts
    );

    BatchOutcome::Fallback {
        batch_index: batch.index,
        attempts,
        reason,
    }
}
