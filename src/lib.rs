pub mod config;
pub mod error;
pub mod language;
pub mod pipeline;
pub mod segment;
pub mod subtitle;
pub mod transcript;

pub use config::Config;
pub use error::{Result, SplitError};
pub use pipeline::{
    default_output_path, print_summary, split_subtitles, split_subtitles_with_cancel,
    PipelineConfig, PipelineResult, PipelineStats,
};
