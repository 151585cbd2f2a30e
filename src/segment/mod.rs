pub mod assembler;
pub mod dispatcher;
pub mod oracle;
pub mod planner;

pub use assembler::{assemble, collect_cuts, verify, WordLimits};
pub use dispatcher::{BatchDispatcher, BatchOutcome, DispatchReport, DispatchStats};
pub use oracle::OpenAiOracle;
pub use planner::plan_batches;

use crate::error::Result;
use crate::language::join_tokens;
use crate::transcript::Token;
use async_trait::async_trait;

/// A contiguous window of tokens submitted to the oracle as one request.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Position of this batch in the plan.
    pub index: usize,
    /// First global token index (inclusive).
    pub start: usize,
    /// Last global token index (exclusive).
    pub end: usize,
    pub tokens: Vec<Token>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn text(&self) -> String {
        join_tokens(self.tokens.iter().map(|t| t.text.as_str()))
    }
}

/// Oracle verdict for one batch: global token indices where a new segment begins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryDecision {
    pub batch_index: usize,
    pub cuts: Vec<usize>,
}

impl BoundaryDecision {
    /// Keep cuts in `(batch.start, batch.end]`, sorted and de-duplicated.
    ///
    /// A cut at the batch's first token would leave an empty segment. A cut at
    /// `batch.end` is a sentence end on the batch's last token and starts the
    /// next batch with a new cue.
    pub fn normalized(batch: &Batch, cuts: impl IntoIterator<Item = usize>) -> Self {
        let mut cuts: Vec<usize> = cuts
            .into_iter()
            .filter(|&c| c > batch.start && c <= batch.end)
            .collect();
        cuts.sort_unstable();
        cuts.dedup();

        Self {
            batch_index: batch.index,
            cuts,
        }
    }
}

/// External service judging where sentence and phrase boundaries fall.
#[async_trait]
pub trait BoundaryOracle: Send + Sync {
    async fn classify_boundaries(&self, batch: &Batch) -> Result<BoundaryDecision>;
    /// Cheap connectivity check made before any processing.
    async fn ping(&self) -> bool;
    fn name(&self) -> &str;
}
