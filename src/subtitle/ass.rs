// Advanced SubStation Alpha (ASS/SSA) subtitle format
use super::{parse_timestamp, SubtitleEntry, SubtitleFormatter};
use crate::error::{Result, SplitError};
use regex::Regex;
use std::fmt::Write;
use std::sync::OnceLock;
use std::time::Duration;

pub struct AssFormatter;

impl SubtitleFormatter for AssFormatter {
    fn format(&self, entries: &[SubtitleEntry]) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "[Script Info]");
        let _ = writeln!(output, "; Generated by subsplit");
        let _ = writeln!(output, "ScriptType: v4.00+");
        let _ = writeln!(output, "PlayResX: 1920");
        let _ = writeln!(output, "PlayResY: 1080");
        let _ = writeln!(output, "WrapStyle: 0");
        let _ = writeln!(output);

        let _ = writeln!(output, "[V4+ Styles]");
        let _ = writeln!(
            output,
            "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding"
        );
        let _ = writeln!(
            output,
            "Style: Default,Arial,60,&H00FFFFFF,&H000000FF,&H00000000,&H80000000,0,0,0,0,100,100,0,0,1,2,1,2,20,20,40,1"
        );
        let _ = writeln!(output);

        let _ = writeln!(output, "[Events]");
        let _ = writeln!(
            output,
            "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text"
        );
        for entry in entries {
            let _ = writeln!(
                output,
                "Dialogue: 0,{},{},Default,,0,0,0,,{}",
                format_timestamp(entry.start),
                format_timestamp(entry.end),
                escape_text(&entry.text)
            );
        }

        output
    }

    fn extension(&self) -> &'static str {
        "ass"
    }
}

/// Format as `H:MM:SS.cc`.
fn format_timestamp(d: Duration) -> String {
    let centis = d.as_millis() / 10;
    let hours = centis / 360_000;
    let minutes = (centis % 360_000) / 6000;
    let seconds = (centis % 6000) / 100;
    format!("{}:{:02}:{:02}.{:02}", hours, minutes, seconds, centis % 100)
}

fn escape_text(text: &str) -> String {
    text.replace('{', "(").replace('}', ")").replace('\n', "\\N")
}

fn override_regex() -> &'static Regex {
    static OVERRIDES: OnceLock<Regex> = OnceLock::new();
    OVERRIDES.get_or_init(|| Regex::new(r"\{[^}]*\}").expect("valid override regex"))
}

/// Parse the `[Events]` section of an ASS/SSA script.
///
/// Column positions come from the section's `Format:` line; override tags such
/// as `{\i1}` are stripped and `\N` line breaks become spaces.
pub fn parse_ass(input: &str) -> Result<Vec<SubtitleEntry>> {
    let override_re = override_regex();

    let mut in_events = false;
    let mut columns: Option<(usize, usize, usize, usize)> = None;
    let mut entries = Vec::new();

    for line in input.lines() {
        let line = line.trim();

        if line.starts_with('[') {
            in_events = line.eq_ignore_ascii_case("[events]");
            continue;
        }
        if !in_events {
            continue;
        }

        if let Some(format) = line.strip_prefix("Format:") {
            let names: Vec<String> = format
                .split(',')
                .map(|n| n.trim().to_lowercase())
                .collect();
            let find = |name: &str| {
                names.iter().position(|n| n == name).ok_or_else(|| {
                    SplitError::Parse(format!("[Events] Format line lacks '{}'", name))
                })
            };
            columns = Some((find("start")?, find("end")?, find("text")?, names.len()));
            continue;
        }

        let Some(body) = line.strip_prefix("Dialogue:") else {
            continue;
        };
        let (start_col, end_col, text_col, count) = columns.ok_or_else(|| {
            SplitError::Parse("Dialogue line before [Events] Format line".to_string())
        })?;

        // Text is the last column and may itself contain commas
        let fields: Vec<&str> = body.trim_start().splitn(count, ',').collect();
        if fields.len() < count {
            return Err(SplitError::Parse(format!(
                "Dialogue line has {} of {} fields",
                fields.len(),
                count
            )));
        }

        let start = parse_timestamp(fields[start_col])?;
        let end = parse_timestamp(fields[end_col])?;
        let text = override_re
            .replace_all(fields[text_col], "")
            .replace("\\N", " ")
            .replace("\\n", " ")
            .replace("\\h", " ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

        entries.push(SubtitleEntry {
            index: entries.len() + 1,
            start,
            end: end.max(start),
            text,
        });
    }

    if columns.is_none() {
        return Err(SplitError::Parse(
            "no [Events] section with a Format line".to_string(),
        ));
    }

    entries.sort_by_key(|e| e.start);
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.index = i + 1;
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "[Script Info]\nTitle: test\n\n[V4+ Styles]\nFormat: Name, Fontname\nStyle: Default,Arial\n\n[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\nComment: 0,0:00:00.00,0:00:01.00,Default,,0,0,0,,ignored\nDialogue: 0,0:00:03.00,0:00:04.50,Default,,0,0,0,,Later line\nDialogue: 0,0:00:01.00,0:00:02.25,Default,,0,0,0,,{\\i1}Hello{\\i0}, world\\Nagain\n";

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(Duration::from_millis(2500)), "0:00:02.50");
        assert_eq!(
            format_timestamp(Duration::from_millis(3_723_456)),
            "1:02:03.45"
        );
    }

    #[test]
    fn test_parse_ass() {
        let entries = parse_ass(SAMPLE).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "Hello, world again");
        assert_eq!(entries[0].start, Duration::from_millis(1000));
        assert_eq!(entries[0].end, Duration::from_millis(2250));
        assert_eq!(entries[1].index, 2);
        assert_eq!(entries[1].text, "Later line");
    }

    #[test]
    fn test_parse_ass_without_events() {
        assert!(parse_ass("[Script Info]\nTitle: x\n").is_err());
    }

    #[test]
    fn test_ass_format() {
        let entries = vec![SubtitleEntry {
            index: 1,
            start: Duration::from_millis(1000),
            end: Duration::from_millis(2500),
            text: "Hi {there}".to_string(),
        }];

        let output = AssFormatter.format(&entries);

        assert!(output.contains("[Events]"));
        assert!(output.contains("Dialogue: 0,0:00:01.00,0:00:02.50,Default,,0,0,0,,Hi (there)"));
        // The formatter's output parses back
        assert_eq!(parse_ass(&output).unwrap()[0].text, "Hi (there)");
    }
}
