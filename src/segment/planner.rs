use super::Batch;
use crate::transcript::Token;
use tracing::debug;

/// Partition tokens into contiguous, disjoint batches of at most `batch_size`.
///
/// Batch `i` covers `[i * batch_size, min((i + 1) * batch_size, n))`; only the
/// last batch may be shorter. An empty token list yields no batches.
pub fn plan_batches(tokens: &[Token], batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.max(1);

    let batches: Vec<Batch> = tokens
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| {
            let start = index * batch_size;
            Batch {
                index,
                start,
                end: start + chunk.len(),
                tokens: chunk.to_vec(),
            }
        })
        .collect();

    debug!(
        "Planned {} batches of up to {} tokens for {} tokens",
        batches.len(),
        batch_size,
        tokens.len()
    );

    batches
}
