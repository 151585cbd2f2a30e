//! JSON segmentation report: one record per cue with its token span and word count.

use crate::error::Result;
use crate::language::LanguageClass;
use crate::transcript::Cue;
use serde::Serialize;

#[derive(Serialize)]
struct Report<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    source_file: Option<&'a str>,
    token_count: usize,
    cue_count: usize,
    cues: Vec<CueRecord<'a>>,
}

#[derive(Serialize)]
struct CueRecord<'a> {
    index: usize,
    start_ms: u64,
    end_ms: u64,
    /// Half-open range of token indices.
    tokens: [usize; 2],
    word_count: usize,
    language: LanguageClass,
    text: &'a str,
}

/// Render cues as a pretty-printed JSON report.
pub fn format_cues(cues: &[Cue], source_file: Option<&str>) -> Result<String> {
    let report = Report {
        source_file,
        token_count: cues.last().map_or(0, |c| c.tokens.end),
        cue_count: cues.len(),
        cues: cues
            .iter()
            .enumerate()
            .map(|(i, cue)| CueRecord {
                index: i + 1,
                start_ms: cue.start.as_millis() as u64,
                end_ms: cue.end.as_millis() as u64,
                tokens: [cue.tokens.start, cue.tokens.end],
                word_count: cue.word_count,
                language: cue.language,
                text: &cue.text,
            })
            .collect(),
    };

    Ok(serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?)
}
