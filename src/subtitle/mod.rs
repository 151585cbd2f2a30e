pub mod ass;
pub mod json;
pub mod srt;
pub mod vtt;

use crate::error::{Result, SplitError};
use crate::transcript::{Cue, Transcript};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

pub trait SubtitleFormatter {
    fn format(&self, entries: &[SubtitleEntry]) -> String;
    fn extension(&self) -> &'static str;
}

/// Subtitle container formats known to the reader and writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubtitleFormat {
    #[default]
    Srt,
    Vtt,
    Ass,
    /// Output only.
    Json,
}

impl std::fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl SubtitleFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "vtt",
            SubtitleFormat::Ass => "ass",
            SubtitleFormat::Json => "json",
        }
    }

    /// Detect the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "srt" => Ok(SubtitleFormat::Srt),
            "vtt" => Ok(SubtitleFormat::Vtt),
            "ass" | "ssa" => Ok(SubtitleFormat::Ass),
            "json" => Ok(SubtitleFormat::Json),
            "" => Err(SplitError::UnsupportedFormat(format!(
                "{} has no file extension",
                path.display()
            ))),
            other => Err(SplitError::UnsupportedFormat(format!(
                ".{} (expected .srt, .vtt or .ass)",
                other
            ))),
        }
    }

    pub fn is_readable(&self) -> bool {
        !matches!(self, SubtitleFormat::Json)
    }
}

/// Entry-based writer for a container format. JSON is written as a cue
/// report by `json::format_cues` instead.
pub fn create_formatter(format: SubtitleFormat) -> Option<Box<dyn SubtitleFormatter>> {
    match format {
        SubtitleFormat::Srt => Some(Box::new(srt::SrtFormatter)),
        SubtitleFormat::Vtt => Some(Box::new(vtt::VttFormatter)),
        SubtitleFormat::Ass => Some(Box::new(ass::AssFormatter)),
        SubtitleFormat::Json => None,
    }
}

/// Parse subtitle text in the given container format.
pub fn parse_entries(content: &str, format: SubtitleFormat) -> Result<Vec<SubtitleEntry>> {
    match format {
        SubtitleFormat::Srt => srt::parse_srt(content),
        SubtitleFormat::Vtt => vtt::parse_vtt(content),
        SubtitleFormat::Ass => ass::parse_ass(content),
        SubtitleFormat::Json => Err(SplitError::UnsupportedFormat(
            ".json is only supported as an output format".to_string(),
        )),
    }
}

/// Load a subtitle file into a transcript.
pub fn load_transcript(path: &Path) -> Result<Transcript> {
    if !path.exists() {
        return Err(SplitError::FileNotFound(path.display().to_string()));
    }

    let format = SubtitleFormat::from_path(path)?;
    if !format.is_readable() {
        return Err(SplitError::UnsupportedFormat(format!(
            ".{} is only supported as an output format",
            format.extension()
        )));
    }

    let raw = std::fs::read(path)?;
    let content = String::from_utf8_lossy(&raw);
    let content = content.trim_start_matches('\u{feff}');

    let entries = parse_entries(content, format)?;
    info!("Loaded {} {} entries from {:?}", entries.len(), format, path);

    Ok(Transcript::from_entries(entries))
}

/// Number cues from 1 for writing.
pub fn cues_to_entries(cues: &[Cue]) -> Vec<SubtitleEntry> {
    cues.iter()
        .enumerate()
        .map(|(i, cue)| SubtitleEntry {
            index: i + 1,
            start: cue.start,
            end: cue.end,
            text: cue.text.clone(),
        })
        .collect()
}

/// Write cues to `path`, picking the format from its extension.
///
/// The content goes to a temporary file next to the target which is renamed
/// into place, so a failed write never leaves a partial file behind.
pub fn save_cues(cues: &[Cue], path: &Path) -> Result<()> {
    let format = SubtitleFormat::from_path(path)?;
    let content = match create_formatter(format) {
        Some(formatter) => formatter.format(&cues_to_entries(cues)),
        None => {
            let name = path.file_name().map(|n| n.to_string_lossy());
            json::format_cues(cues, name.as_deref())?
        }
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    file.persist(path)?;

    debug!("Wrote {} bytes of {} to {:?}", content.len(), format, path);
    Ok(())
}

/// Parse `HH:MM:SS,mmm`, `HH:MM:SS.mmm`, `MM:SS.mmm` or ASS `H:MM:SS.cc`.
pub(crate) fn parse_timestamp(value: &str) -> Result<Duration> {
    let invalid = || SplitError::Parse(format!("invalid timestamp '{}'", value));

    let cleaned = value.trim().replace(',', ".");
    let (time_part, fractional_part) = match cleaned.split_once('.') {
        Some((t, f)) => (t, f),
        None => (cleaned.as_str(), "0"),
    };

    let fields: Vec<u64> = time_part
        .split(':')
        .map(|p| p.trim().parse::<u64>().map_err(|_| invalid()))
        .collect::<Result<_>>()?;

    let total_seconds = match fields.as_slice() {
        [h, m, s] => h * 3600 + m * 60 + s,
        [m, s] => m * 60 + s,
        _ => return Err(invalid()),
    };

    if fractional_part.is_empty() || !fractional_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let mut millis_str: String = fractional_part.chars().take(3).collect();
    while millis_str.len() < 3 {
        millis_str.push('0');
    }
    let millis = millis_str.parse::<u64>().map_err(|_| invalid())?;

    Ok(Duration::from_secs(total_seconds) + Duration::from_millis(millis))
}
