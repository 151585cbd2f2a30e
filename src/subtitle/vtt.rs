// WebVTT subtitle format
use super::{parse_timestamp, SubtitleEntry, SubtitleFormatter};
use crate::error::{Result, SplitError};
use regex::Regex;
use std::sync::OnceLock;

pub struct VttFormatter;

impl SubtitleFormatter for VttFormatter {
    fn format(&self, entries: &[SubtitleEntry]) -> String {
        let mut output = String::from("WEBVTT\n\n");

        for entry in entries {
            output.push_str(&format!(
                "{} --> {}\n{}\n\n",
                format_timestamp(entry.start),
                format_timestamp(entry.end),
                entry.text
            ));
        }

        output
    }

    fn extension(&self) -> &'static str {
        "vtt"
    }
}

fn format_timestamp(d: std::time::Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = d.subsec_millis();
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

fn tag_regex() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"))
}

/// Parse WebVTT content, skipping header, NOTE/STYLE/REGION blocks and cue
/// settings, and stripping inline tags.
pub fn parse_vtt(input: &str) -> Result<Vec<SubtitleEntry>> {
    let mut blocks = split_blocks(input).into_iter();

    match blocks.next() {
        Some(header) if header.first().is_some_and(|l| l.starts_with("WEBVTT")) => {}
        _ => {
            return Err(SplitError::Parse(
                "WebVTT file must start with 'WEBVTT'".to_string(),
            ))
        }
    }

    let mut entries = Vec::new();

    for block in blocks {
        let Some(timing_pos) = block.iter().position(|l| l.contains("-->")) else {
            // NOTE, STYLE and REGION blocks carry no timing line
            continue;
        };

        let timing = block[timing_pos];
        let (start_raw, rest) = timing.split_once("-->").ok_or_else(|| {
            SplitError::Parse(format!("invalid timing line '{}'", timing))
        })?;
        let end_raw = rest.split_whitespace().next().unwrap_or_default();

        let start = parse_timestamp(start_raw)?;
        let end = parse_timestamp(end_raw)?;
        if end < start {
            return Err(SplitError::Parse(format!(
                "cue ends before it starts: {}",
                timing
            )));
        }

        let text = block[timing_pos + 1..]
            .iter()
            .map(|l| tag_regex().replace_all(l, "").trim().to_string())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        entries.push(SubtitleEntry {
            index: entries.len() + 1,
            start,
            end,
            text: decode_entities(&text),
        });
    }

    Ok(entries)
}

fn split_blocks(input: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in input.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
