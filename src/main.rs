use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use subsplit::segment::{BoundaryOracle, OpenAiOracle};
use subsplit::{print_summary, split_subtitles_with_cancel, Config, PipelineConfig};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "subsplit")]
#[command(version, about = "Sentence-aware subtitle re-segmentation using an LLM")]
#[command(long_about = "Re-split an SRT, WebVTT or ASS subtitle file into readable cues that break at sentence and phrase boundaries.")]
struct Cli {
    /// Input subtitle file (.srt, .vtt, .ass)
    input: PathBuf,

    /// Output subtitle file (defaults to a prefixed .srt next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of concurrent oracle requests (overrides THREAD_NUM)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Tokens per oracle request (overrides BATCH_SIZE)
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Disable progress bars
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    // Load and validate configuration
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(threads) = cli.threads {
        config.thread_count = threads;
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    config.validate().context("Configuration validation failed")?;

    let oracle = OpenAiOracle::from_config(&config).context("Failed to create oracle client")?;

    info!("Input:      {}", cli.input.display());
    info!("Model:      {}", oracle.name());
    info!(
        "Batch size: {} | Threads: {} | Caps: {} CJK / {} other",
        config.batch_size, config.thread_count, config.max_word_count_cjk, config.max_word_count_other
    );

    info!("Checking oracle connectivity...");
    if !oracle.ping().await {
        anyhow::bail!("Oracle connectivity check failed; verify OPENAI_BASE_URL, OPENAI_API_KEY and LLM_MODEL");
    }

    let cancelled = Arc::new(AtomicBool::new(false));
    let handler_flag = cancelled.clone();
    ctrlc::set_handler(move || {
        if !handler_flag.swap(true, Ordering::SeqCst) {
            warn!("Interrupt received, finishing in-flight requests...");
        }
    })
    .context("Failed to install Ctrl+C handler")?;

    let pipeline_config = PipelineConfig {
        show_progress: !cli.no_progress,
        ..Default::default()
    };

    let result = split_subtitles_with_cancel(
        &cli.input,
        cli.output.as_deref(),
        &config,
        Arc::new(oracle),
        pipeline_config,
        cancelled,
    )
    .await
    .context("Subtitle segmentation failed")?;

    print_summary(&result);

    Ok(())
}
