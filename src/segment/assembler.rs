use super::BatchOutcome;
use crate::error::{Result, SplitError};
use crate::language::{classify, count_words, join_tokens, LanguageClass};
use crate::transcript::{Cue, Token};
use std::collections::BTreeSet;
use std::ops::Range;
use tracing::debug;

/// Per-language maximum word count for a single cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordLimits {
    pub cjk: usize,
    pub other: usize,
}

impl Default for WordLimits {
    fn default() -> Self {
        Self { cjk: 20, other: 12 }
    }
}

impl WordLimits {
    pub fn cap_for(&self, class: LanguageClass) -> usize {
        match class {
            LanguageClass::Cjk => self.cjk,
            LanguageClass::Other => self.other,
        }
    }
}

/// Union of the cuts proposed by every batch that reached a decision.
///
/// Fallback batches contribute nothing, so their span is split on the cap
/// alone. A seam is a cut when the batch on its left ends a segment on its last
/// token; the batch on the right never proposes its own first token.
pub fn collect_cuts(outcomes: &[BatchOutcome]) -> BTreeSet<usize> {
    outcomes
        .iter()
        .filter_map(BatchOutcome::decision)
        .flat_map(|d| d.cuts.iter().copied())
        .collect()
}

/// Sweep tokens left to right into cues.
///
/// A cue grows one token at a time while its word count stays within the cap
/// of its dominant language and the next token is not an approved cut. The cap
/// is a hard ceiling; cuts are taken whenever they come first.
pub fn assemble(tokens: &[Token], cuts: &BTreeSet<usize>, limits: &WordLimits) -> Result<Vec<Cue>> {
    let mut cues = Vec::new();
    let mut forced = 0usize;
    let mut start = 0usize;

    while start < tokens.len() {
        let mut end = start + 1;
        let mut text = join_tokens([tokens[start].text.as_str()]);

        while end < tokens.len() && !cuts.contains(&end) {
            let candidate = join_tokens([text.as_str(), tokens[end].text.as_str()]);
            if count_words(&candidate) > limits.cap_for(classify(&candidate)) {
                forced += 1;
                break;
            }
            text = candidate;
            end += 1;
        }

        cues.push(build_cue(tokens, start..end, text));
        start = end;
    }

    debug!(
        "Assembled {} cues from {} tokens ({} cuts, {} forced at cap)",
        cues.len(),
        tokens.len(),
        cuts.len(),
        forced
    );

    verify(tokens, &cues, limits)?;
    Ok(cues)
}

fn build_cue(tokens: &[Token], range: Range<usize>, text: String) -> Cue {
    let first = &tokens[range.start];
    let last = &tokens[range.end - 1];

    Cue {
        start: first.start,
        end: last.end.max(first.start),
        word_count: count_words(&text),
        language: classify(&text),
        text,
        tokens: range,
    }
}

/// Check coverage, contiguity, timing and caps of an assembled cue sequence.
pub fn verify(tokens: &[Token], cues: &[Cue], limits: &WordLimits) -> Result<()> {
    let violation = |msg: String| Err(SplitError::AssemblyInvariantViolation(msg));

    let mut expected_start = 0usize;
    for (i, cue) in cues.iter().enumerate() {
        if cue.tokens.start != expected_start {
            return violation(format!(
                "cue {} starts at token {} but token {} is uncovered",
                i, cue.tokens.start, expected_start
            ));
        }
        if cue.tokens.is_empty() || cue.tokens.end > tokens.len() {
            return violation(format!("cue {} has invalid token range {:?}", i, cue.tokens));
        }

        let cap = limits.cap_for(cue.language);
        if cue.word_count > cap {
            return violation(format!(
                "cue {} has {} words, cap for {} is {}",
                i, cue.word_count, cue.language, cap
            ));
        }

        if cue.start != tokens[cue.tokens.start].start || cue.end < cue.start {
            return violation(format!("cue {} timing does not match its tokens", i));
        }
        if let Some(prev) = i.checked_sub(1).map(|p| &cues[p]) {
            if cue.start < prev.start {
                return violation(format!("cue {} starts before cue {}", i, i - 1));
            }
        }

        expected_start = cue.tokens.end;
    }

    if expected_start != tokens.len() {
        return violation(format!(
            "tokens {}..{} are not covered by any cue",
            expected_start,
            tokens.len()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::BoundaryDecision;
    use std::time::Duration;

    fn tokens_from(words: &[&str]) -> Vec<Token> {
        words
            .iter()
            .enumerate()
            .map(|(i, w)| Token {
                index: i,
                text: w.to_string(),
                start: Duration::from_millis(i as u64 * 250),
                end: Duration::from_millis(i as u64 * 250 + 200),
            })
            .collect()
    }

    fn english(n: usize) -> Vec<Token> {
        let words: Vec<String> = (0..n).map(|i| format!("word{}", i)).collect();
        let refs: Vec<&str> = words.iter().map(String::as_str).collect();
        tokens_from(&refs)
    }

    fn sizes(cues: &[Cue]) -> Vec<usize> {
        cues.iter().map(|c| c.tokens.len()).collect()
    }

    #[test]
    fn test_cap_only_split() {
        let tokens = english(40);
        let cues = assemble(&tokens, &BTreeSet::new(), &WordLimits::default()).unwrap();

        assert_eq!(sizes(&cues), vec![12, 12, 12, 4]);
        assert_eq!(cues[0].word_count, 12);
        assert_eq!(cues[3].tokens, 36..40);
        assert_eq!(cues[1].start, tokens[12].start);
        assert_eq!(cues[1].end, tokens[23].end);
    }

    #[test]
    fn test_cuts_are_honored_under_cap() {
        let tokens = english(20);
        let cuts: BTreeSet<usize> = [5, 9].into_iter().collect();
        let cues = assemble(&tokens, &cuts, &WordLimits::default()).unwrap();

        assert_eq!(sizes(&cues), vec![5, 4, 11]);
    }

    #[test]
    fn test_cap_wins_over_distant_cut() {
        let tokens = english(20);
        let cuts: BTreeSet<usize> = [15].into_iter().collect();
        let limits = WordLimits { cjk: 20, other: 6 };
        let cues = assemble(&tokens, &cuts, &limits).unwrap();

        // Forced breaks at 6 and 12, then the cut at 15
        assert_eq!(sizes(&cues), vec![6, 6, 3, 5]);
    }

    #[test]
    fn test_cjk_uses_cjk_cap() {
        let text = "今天天气很好我们一起去公园散步吧";
        let chars: Vec<String> = text.chars().map(|c| c.to_string()).collect();
        let refs: Vec<&str> = chars.iter().map(String::as_str).collect();
        let tokens = tokens_from(&refs);
        let limits = WordLimits { cjk: 5, other: 100 };

        let cues = assemble(&tokens, &BTreeSet::new(), &limits).unwrap();

        assert_eq!(sizes(&cues), vec![5, 5, 5, 1]);
        assert_eq!(cues[0].text, "今天天气很");
        assert_eq!(cues[0].language, LanguageClass::Cjk);
    }

    #[test]
    fn test_punctuation_tokens_do_not_count() {
        let tokens = tokens_from(&["one", "two", "-", "three"]);
        let limits = WordLimits { cjk: 20, other: 3 };
        let cues = assemble(&tokens, &BTreeSet::new(), &limits).unwrap();

        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "one two - three");
        assert_eq!(cues[0].word_count, 3);
    }

    #[test]
    fn test_empty_tokens() {
        let cues = assemble(&[], &BTreeSet::new(), &WordLimits::default()).unwrap();
        assert!(cues.is_empty());
    }

    #[test]
    fn test_collect_cuts_skips_fallbacks() {
        let outcomes = vec![
            BatchOutcome::Decided(BoundaryDecision {
                batch_index: 0,
                cuts: vec![3, 7],
            }),
            BatchOutcome::Fallback {
                batch_index: 1,
                attempts: 3,
                reason: "timeout".to_string(),
            },
            BatchOutcome::Decided(BoundaryDecision {
                batch_index: 2,
                cuts: vec![25],
            }),
        ];

        let cuts = collect_cuts(&outcomes);
        assert_eq!(cuts.into_iter().collect::<Vec<_>>(), vec![3, 7, 25]);
    }

    #[test]
    fn test_sentence_end_on_batch_seam_is_kept() {
        let tokens = english(13);
        let batches = crate::segment::plan_batches(&tokens, 10);
        let outcomes = vec![
            BatchOutcome::Decided(BoundaryDecision::normalized(&batches[0], vec![10])),
            BatchOutcome::Decided(BoundaryDecision::normalized(&batches[1], vec![10, 12])),
        ];

        let cuts = collect_cuts(&outcomes);
        let cues = assemble(&tokens, &cuts, &WordLimits::default()).unwrap();

        assert_eq!(sizes(&cues), vec![10, 2, 1]);
        assert_eq!(cues[1].tokens, 10..12);
    }

    #[test]
    fn test_coverage_and_cap_hold_for_many_cut_patterns() {
        let tokens = english(53);
        let limits = WordLimits { cjk: 20, other: 7 };

        for step in 1..15 {
            let cuts: BTreeSet<usize> = (1..53).filter(|i| i % step == 0).collect();
            let cues = assemble(&tokens, &cuts, &limits).unwrap();

            let covered: usize = cues.iter().map(|c| c.tokens.len()).sum();
            assert_eq!(covered, tokens.len());
            assert!(cues.iter().all(|c| c.word_count <= 7));
            for pair in cues.windows(2) {
                assert_eq!(pair[0].tokens.end, pair[1].tokens.start);
                assert!(pair[0].start <= pair[1].start);
            }
        }
    }

    #[test]
    fn test_verify_detects_gap() {
        let tokens = english(4);
        let mut cues = assemble(&tokens, &[2].into_iter().collect(), &WordLimits::default()).unwrap();
        cues.remove(0);

        let result = verify(&tokens, &cues, &WordLimits::default());
        assert!(matches!(
            result,
            Err(SplitError::AssemblyInvariantViolation(_))
        ));
    }

    #[test]
    fn test_verify_detects_cap_overflow() {
        let tokens = english(4);
        let cues = assemble(&tokens, &BTreeSet::new(), &WordLimits::default()).unwrap();
        let tight = WordLimits { cjk: 20, other: 2 };

        assert!(verify(&tokens, &cues, &tight).is_err());
    }
}
