use crate::config::Config;
use crate::error::{Result, SplitError};
use crate::segment::{
    assemble, collect_cuts, plan_batches, BatchDispatcher, BoundaryOracle, WordLimits,
};
use crate::subtitle::{load_transcript, save_cues, SubtitleFormat};
use crate::transcript::Cue;
use console::style;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Marker prefixed to the input stem when no output path is given.
pub const OUTPUT_PREFIX: &str = "【智能断句】";

/// Run-level options that are not part of the persisted configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Show progress bars.
    pub show_progress: bool,
    /// Base delay for the per-batch exponential backoff.
    pub retry_base_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            show_progress: true,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

/// Statistics from a segmentation run.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Total time taken for the entire pipeline.
    pub total_time: Duration,
    /// Time spent waiting on the oracle.
    pub dispatch_time: Duration,
    /// Units in the input file.
    pub input_units: usize,
    /// Word tokens after expansion.
    pub tokens: usize,
    pub batches: usize,
    /// Batches split on the word cap alone.
    pub fallback_batches: usize,
    pub cues: usize,
    /// Whether the input had to be expanded to word granularity.
    pub expanded: bool,
}

/// Result of a segmentation run.
#[derive(Debug)]
pub struct PipelineResult {
    pub output_path: PathBuf,
    pub cues: Vec<Cue>,
    pub stats: PipelineStats,
}

/// `<input dir>/<prefix><input stem>.srt`
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default();
    input.with_file_name(format!(
        "{}{}.{}",
        OUTPUT_PREFIX,
        stem.to_string_lossy(),
        SubtitleFormat::Srt.extension()
    ))
}

/// Re-segment a subtitle file into sentence-aware cues.
///
/// 1. Loads the transcript and expands it to word tokens
/// 2. Plans fixed-size batches
/// 3. Asks the oracle for boundaries, concurrently
/// 4. Assembles cues under the word caps
/// 5. Writes the output file
pub async fn split_subtitles(
    input: &Path,
    output: Option<&Path>,
    config: &Config,
    oracle: Arc<dyn BoundaryOracle>,
    pipeline_config: PipelineConfig,
) -> Result<PipelineResult> {
    let cancelled = Arc::new(AtomicBool::new(false));
    split_subtitles_with_cancel(input, output, config, oracle, pipeline_config, cancelled).await
}

/// Re-segment a subtitle file with cancellation support.
///
/// Nothing is written unless every batch has an outcome.
pub async fn split_subtitles_with_cancel(
    input: &Path,
    output: Option<&Path>,
    config: &Config,
    oracle: Arc<dyn BoundaryOracle>,
    pipeline_config: PipelineConfig,
    cancelled: Arc<AtomicBool>,
) -> Result<PipelineResult> {
    let start_time = Instant::now();

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(input));
    // Reject an unusable output extension before any oracle call
    SubtitleFormat::from_path(&output)?;

    let limits = WordLimits {
        cjk: config.max_word_count_cjk,
        other: config.max_word_count_other,
    };

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 1: Load and expand
    // ═══════════════════════════════════════════════════════════════════════
    info!("Stage 1/4: Loading subtitles from {:?}", input);
    let mut transcript = load_transcript(input)?;
    let input_units = transcript.len();

    let expanded = !transcript.is_word_granular();
    if expanded {
        info!("Converting {} cues to word-level tokens", input_units);
        transcript.expand_to_word_granularity();
    }
    let tokens = transcript.tokens();

    if cancelled.load(Ordering::Relaxed) {
        return Err(SplitError::Cancelled);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 2: Batch planning
    // ═══════════════════════════════════════════════════════════════════════
    let batches = plan_batches(tokens, config.batch_size);
    let batch_count = batches.len();
    info!(
        "Stage 2/4: Planned {} batches for {} tokens",
        batch_count,
        tokens.len()
    );

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 3: Boundary detection
    // ═══════════════════════════════════════════════════════════════════════
    info!(
        "Stage 3/4: Detecting boundaries with {} (threads: {})",
        oracle.name(),
        config.thread_count
    );
    let dispatcher = BatchDispatcher::new(oracle, config.thread_count)
        .with_retry(config.max_retries, pipeline_config.retry_base_delay)
        .with_progress(pipeline_config.show_progress)
        .with_cancel(cancelled.clone());
    let report = dispatcher.dispatch(batches).await?;

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 4: Assembly and output
    // ═══════════════════════════════════════════════════════════════════════
    info!("Stage 4/4: Assembling cues");
    let cuts = collect_cuts(&report.outcomes);
    let cues = assemble(tokens, &cuts, &limits)?;

    if cancelled.load(Ordering::Relaxed) {
        return Err(SplitError::Cancelled);
    }

    save_cues(&cues, &output)?;
    info!("Wrote {} cues to {:?}", cues.len(), output);

    let stats = PipelineStats {
        total_time: start_time.elapsed(),
        dispatch_time: report.stats.total_time,
        input_units,
        tokens: tokens.len(),
        batches: batch_count,
        fallback_batches: report.stats.fallback_batches,
        cues: cues.len(),
        expanded,
    };

    Ok(PipelineResult {
        output_path: output,
        cues,
        stats,
    })
}

/// Print a summary of the pipeline results.
pub fn print_summary(result: &PipelineResult) {
    let stats = &result.stats;

    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                  {}", style("Subtitle Segmentation Complete").bold().green());
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Output:     {}", style(result.output_path.display()).cyan());
    println!("  Input cues: {}", stats.input_units);
    println!(
        "  Tokens:     {}{}",
        stats.tokens,
        if stats.expanded { " (expanded to words)" } else { "" }
    );
    println!("  Cues:       {}", stats.cues);
    println!();
    println!("  Batches:    {}", stats.batches);
    if stats.fallback_batches > 0 {
        println!(
            "  {}",
            style(format!(
                "{} batch(es) fell back to length-only splitting",
                stats.fallback_batches
            ))
            .yellow()
        );
    }
    println!();
    println!("  Timing:");
    println!(
        "    Oracle:      {:.2}s",
        stats.dispatch_time.as_secs_f64()
    );
    println!(
        "    Total:       {:.2}s",
        stats.total_time.as_secs_f64()
    );
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
