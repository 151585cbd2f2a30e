//! Script detection and word counting for cue length limits.

use serde::Serialize;

/// Dominant script class of a span of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageClass {
    /// Majority Han, Kana or Hangul characters.
    Cjk,
    Other,
}

impl std::fmt::Display for LanguageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LanguageClass::Cjk => write!(f, "cjk"),
            LanguageClass::Other => write!(f, "other"),
        }
    }
}

/// Han ideographs, hiragana, katakana and Hangul syllables.
pub fn is_cjk_char(c: char) -> bool {
    matches!(c,
        '\u{4e00}'..='\u{9fff}'
        | '\u{3040}'..='\u{309f}'
        | '\u{30a0}'..='\u{30ff}'
        | '\u{ac00}'..='\u{d7af}'
    )
}

/// Classify text by the share of CJK characters among non-whitespace characters.
pub fn classify(text: &str) -> LanguageClass {
    let mut total = 0usize;
    let mut cjk = 0usize;

    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if is_cjk_char(c) {
            cjk += 1;
        }
    }

    if total > 0 && cjk * 2 > total {
        LanguageClass::Cjk
    } else {
        LanguageClass::Other
    }
}

pub fn is_mainly_cjk(text: &str) -> bool {
    classify(text) == LanguageClass::Cjk
}

/// Count words: one per CJK character plus whitespace-separated words elsewhere.
///
/// Fragments without any alphanumeric character (stray punctuation) count as zero.
pub fn count_words(text: &str) -> usize {
    let cjk = text.chars().filter(|c| is_cjk_char(*c)).count();

    let rest: String = text
        .chars()
        .map(|c| if is_cjk_char(c) { ' ' } else { c })
        .collect();
    let words = rest
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count();

    cjk + words
}

/// Join token texts, separating with a space except around CJK characters.
pub fn join_tokens<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = String::new();

    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let needs_space = match (out.chars().last(), part.chars().next()) {
            (Some(prev), Some(next)) => !is_cjk_char(prev) && !is_cjk_char(next),
            _ => false,
        };
        if needs_space {
            out.push(' ');
        }
        out.push_str(part);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_empty_and_whitespace() {
        assert_eq!(classify(""), LanguageClass::Other);
        assert_eq!(classify("   \n\t "), LanguageClass::Other);
    }

    #[test]
    fn test_classify_han_with_latin() {
        let text = "a一二三四五六七八九十b";
        assert_eq!(classify(text), LanguageClass::Cjk);
    }

    #[test]
    fn test_classify_latin() {
        assert_eq!(classify("Hello world"), LanguageClass::Other);
        assert!(!is_mainly_cjk("Hello 世界"));
    }

    #[test]
    fn test_classify_exact_half_is_not_cjk() {
        // 2 of 4 characters: ratio must exceed one half
        assert_eq!(classify("ab世界"), LanguageClass::Other);
    }

    #[test]
    fn test_classify_kana_and_hangul() {
        assert!(is_mainly_cjk("こんにちは"));
        assert!(is_mainly_cjk("カタカナ"));
        assert!(is_mainly_cjk("안녕하세요"));
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words("Hello, world!"), 2);
        assert_eq!(count_words("你好世界"), 4);
        assert_eq!(count_words("我爱 Rust 语言"), 5);
        assert_eq!(count_words(" , . "), 0);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn test_join_tokens() {
        assert_eq!(join_tokens(["Hello", "world"]), "Hello world");
        assert_eq!(join_tokens(["你", "好"]), "你好");
        assert_eq!(join_tokens(["我", "用", "Rust"]), "我用Rust");
        assert_eq!(join_tokens(["", " a ", "b"]), "a b");
    }
}
