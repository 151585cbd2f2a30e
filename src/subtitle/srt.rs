// SRT subtitle format
use super::{parse_timestamp, SubtitleEntry, SubtitleFormatter};
use crate::error::{Result, SplitError};

pub struct SrtFormatter;

impl SubtitleFormatter for SrtFormatter {
    fn format(&self, entries: &[SubtitleEntry]) -> String {
        entries
            .iter()
            .map(|entry| {
                format!(
                    "{}\n{} --> {}\n{}\n",
                    entry.index,
                    format_timestamp(entry.start),
                    format_timestamp(entry.end),
                    entry.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn extension(&self) -> &'static str {
        "srt"
    }
}

fn format_timestamp(d: std::time::Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = d.subsec_millis();
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

/// Parse SRT content. Multi-line cue text is joined with spaces.
pub fn parse_srt(input: &str) -> Result<Vec<SubtitleEntry>> {
    let mut entries = Vec::new();
    let mut lines = input.lines().peekable();

    while let Some(line) = lines.next() {
        let first = line.trim();
        if first.is_empty() {
            continue;
        }

        // The index line is optional in the wild
        let times = if first.contains("-->") {
            first
        } else {
            lines
                .next()
                .map(str::trim)
                .ok_or_else(|| SplitError::Parse(format!("cue '{}' has no timestamp line", first)))?
        };

        let (start_raw, end_raw) = times.split_once("-->").ok_or_else(|| {
            SplitError::Parse(format!("timestamp line '{}' must contain '-->'", times))
        })?;
        let start = parse_timestamp(start_raw)?;
        let end = parse_timestamp(end_raw)?;

        if end < start {
            return Err(SplitError::Parse(format!(
                "cue ends before it starts: {}",
                times
            )));
        }

        let mut text_lines = Vec::new();
        while let Some(next) = lines.peek() {
            if next.trim().is_empty() {
                break;
            }
            text_lines.push(next.trim().to_string());
            lines.next();
        }

        entries.push(SubtitleEntry {
            index: entries.len() + 1,
            start,
            end,
            text: text_lines.join(" "),
        });
    }

    Ok(entries)
}
