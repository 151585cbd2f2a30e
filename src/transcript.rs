//! In-memory transcript: timed units, word-level expansion and the final cues.

use crate::language::{is_cjk_char, LanguageClass};
use crate::subtitle::SubtitleEntry;
use std::ops::Range;
use std::time::Duration;
use tracing::debug;

/// One timed unit. After expansion every token is a single word or CJK character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub index: usize,
    pub text: String,
    pub start: Duration,
    pub end: Duration,
}

impl Token {
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// A finished subtitle cue covering a contiguous range of tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub tokens: Range<usize>,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
    pub word_count: usize,
    pub language: LanguageClass,
}

/// Ordered sequence of timed units loaded from a subtitle file.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    units: Vec<Token>,
}

impl Transcript {
    pub fn new(units: Vec<Token>) -> Self {
        let mut transcript = Self { units };
        transcript.normalize();
        transcript
    }

    /// Build a transcript from parsed subtitle entries.
    ///
    /// Entries without text are dropped; the rest are ordered by start time.
    pub fn from_entries(entries: Vec<SubtitleEntry>) -> Self {
        let units = entries
            .into_iter()
            .filter(|e| !e.text.trim().is_empty())
            .map(|e| Token {
                index: 0,
                text: e.text.trim().to_string(),
                start: e.start,
                end: e.end.max(e.start),
            })
            .collect();
        Self::new(units)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Time from the first unit's start to the last unit's end.
    /// From the first start to the latest end, which overlapping units may
    /// push past the last unit's end.
    pub fn duration(&self) -> Duration {
        match (self.units.first(), self.units.iter().map(|u| u.end).max()) {
            (Some(first), Some(end)) => end.saturating_sub(first.start),
            _ => Duration::ZERO,
        }
    }

    /// True when every unit already holds exactly one word or CJK character.
    pub fn is_word_granular(&self) -> bool {
        self.units.iter().all(|u| split_words(&u.text).len() == 1)
    }

    /// Replace every coarse unit by per-word tokens.
    ///
    /// Word times are proportional to cumulative character count inside the
    /// unit's span and the last word ends exactly at the unit's end. Words stay
    /// in unit order; a word of an overlapping unit never starts before the
    /// word it follows.
    pub fn expand_to_word_granularity(&mut self) {
        if self.is_word_granular() {
            return;
        }

        let before = self.units.len();
        let mut expanded = Vec::with_capacity(before * 4);
        let mut floor = Duration::ZERO;

        for unit in &self.units {
            let words = split_words(&unit.text);
            let total_chars: usize = words.iter().map(|w| w.chars().count()).sum();
            let span = unit.duration().as_nanos();
            let mut consumed = 0usize;

            for (i, word) in words.iter().enumerate() {
                let start = (unit.start + scale(span, consumed, total_chars)).max(floor);
                consumed += word.chars().count();
                let end = if i + 1 == words.len() {
                    unit.end
                } else {
                    unit.start + scale(span, consumed, total_chars)
                };
                let end = end.max(start);
                floor = start;

                expanded.push(Token {
                    index: 0,
                    text: word.clone(),
                    start,
                    end,
                });
            }
        }

        debug!("Expanded {} units into {} word tokens", before, expanded.len());
        self.units = expanded;
        self.reindex();
    }

    fn normalize(&mut self) {
        self.units.sort_by_key(|u| u.start);
        self.reindex();
    }

    fn reindex(&mut self) {
        for (i, unit) in self.units.iter_mut().enumerate() {
            unit.index = i;
        }
    }
}

fn scale(span_nanos: u128, part: usize, total: usize) -> Duration {
    if total == 0 {
        return Duration::ZERO;
    }
    let nanos = span_nanos * part as u128 / total as u128;
    Duration::from_nanos(nanos as u64)
}

/// Split text into word units.
///
/// Whitespace separates words, every CJK character is its own word, and
/// punctuation following a CJK character stays attached to it.
pub fn split_words(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    for word in text.split_whitespace() {
        let word_start = out.len();
        let mut current = String::new();

        for c in word.chars() {
            if is_cjk_char(c) {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                out.push(c.to_string());
            } else if !c.is_alphanumeric() && current.is_empty() && out.len() > word_start {
                if let Some(last) = out.last_mut() {
                    last.push(c);
                }
            } else {
                current.push(c);
            }
        }

        if !current.is_empty() {
            out.push(current);
        }
    }

    out
}
