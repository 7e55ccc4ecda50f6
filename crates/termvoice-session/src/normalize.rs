//! Spoken-symbol normalization for recognized text.
//!
//! Recognizers emit sentence punctuation the console does not want and spell
//! out symbols ("plus", "slash") the user meant literally. `normalize` strips
//! the former and substitutes the latter before text is shown or inserted.

use std::sync::LazyLock;

use regex::{NoExpand, Regex};

/// Spoken word to glyph, scanned in order.
///
/// Multi-word keys precede their single-word suffixes so "double quote" is
/// not consumed by the "quote" entry first.
const SYMBOL_TABLE: &[(&str, &str)] = &[
    ("Ampersand", "&"),
    ("ampersand", "&"),
    ("Dollar", "$"),
    ("dollar", "$"),
    ("Percent", "%"),
    ("percent", "%"),
    ("Asterisk", "*"),
    ("asterisk", "*"),
    ("Plus", "+"),
    ("plus", "+"),
    ("Equals", "="),
    ("equals", "="),
    ("Exclamation", "!"),
    ("exclamation", "!"),
    ("Slash", "/"),
    ("slash", "/"),
    ("Backslash", "\\"),
    ("backslash", "\\"),
    ("Dot", "."),
    ("dot", "."),
    ("Period", "."),
    ("period", "."),
    ("Double quote", "\""),
    ("double quote", "\""),
    ("Quote", "'"),
    ("quote", "'"),
];

static PUNCTUATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.,?;!]").unwrap());

static SYMBOL_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    SYMBOL_TABLE
        .iter()
        .map(|(word, glyph)| {
            let words: Vec<String> = word.split(' ').map(regex::escape).collect();
            let pattern = format!(r"\b{}\b", words.join(r"\s+"));
            (Regex::new(&pattern).expect("Invalid symbol regex"), *glyph)
        })
        .collect()
});

/// Map raw recognized text to display/insert text.
///
/// 1. Remove `. , ? ; !`.
/// 2. For each symbol table entry in order, replace the first whole-word,
///    case-sensitive occurrence with its glyph.
/// 3. Prefix a single space.
pub fn normalize(raw: &str) -> String {
    let mut text = PUNCTUATION_RE.replace_all(raw, "").into_owned();
    for (pattern, glyph) in SYMBOL_PATTERNS.iter() {
        text = pattern.replacen(&text, 1, NoExpand(*glyph)).into_owned();
    }
    format!(" {}", text)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_substitution() {
        assert_eq!(normalize("three plus four"), " three + four");
        assert_eq!(normalize("a equals b"), " a = b");
        assert_eq!(normalize("Dollar HOME"), " $ HOME");
    }

    #[test]
    fn test_punctuation_stripped() {
        assert_eq!(normalize("hello, world!"), " hello world");
        assert_eq!(normalize("what? yes; no."), " what yes no");
    }

    #[test]
    fn test_first_occurrence_only_per_key() {
        assert_eq!(normalize("dot dot"), " . dot");
        assert_eq!(normalize("plus plus"), " + plus");
    }

    #[test]
    fn test_capitalized_and_lowercase_keys_both_apply() {
        assert_eq!(normalize("Dot dot"), " . .");
        assert_eq!(normalize("Slash slash slash"), " / / slash");
    }

    #[test]
    fn test_whole_word_only() {
        assert_eq!(normalize("surplus"), " surplus");
        assert_eq!(normalize("dotted line"), " dotted line");
        assert_eq!(normalize("backslash"), " \\");
    }

    #[test]
    fn test_case_sensitive() {
        assert_eq!(normalize("PLUS"), " PLUS");
    }

    #[test]
    fn test_glyph_not_stripped_by_punctuation_pass() {
        assert_eq!(normalize("period exclamation"), " . !");
    }

    #[test]
    fn test_dollar_glyph_is_literal() {
        // "$" must not be read as a capture-group reference.
        assert_eq!(normalize("echo dollar"), " echo $");
    }

    #[test]
    fn test_double_quote() {
        assert_eq!(normalize("double quote hi quote"), " \" hi '");
        assert_eq!(normalize("double  quote"), " \"");
    }

    #[test]
    fn test_empty_and_input_untouched() {
        assert_eq!(normalize(""), " ");
        let raw = String::from("a plus b.");
        let _ = normalize(&raw);
        assert_eq!(raw, "a plus b.");
    }
}
