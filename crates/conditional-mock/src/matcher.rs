//! URL pattern classification and matching.
//!
//! A rule key is either a literal URL or a delimited pattern such as
//! `~httpbin\.org~i`. The delimiter is the first non-whitespace character and
//! must not be alphanumeric or a backslash; `(`, `{`, `[` and `<` close with
//! their partner. Letters after the closing delimiter are modifiers.
//!
//! Matching is an unanchored search. Anchors and case folding come only from
//! the pattern text and its modifiers.

use regex::{Regex, RegexBuilder};
use std::fmt;
use thiserror::Error;

/// Characters that keep their backslash when used as a delimiter, since the
/// escape is meaningful to the regex engine.
const REGEX_META: &[char] = &[
    '\\', '.', '+', '*', '?', '(', ')', '|', '[', ']', '{', '}', '^', '$', '#', '&', '-', '~',
];

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,
    #[error("delimiter must not be alphanumeric or backslash, found '{0}'")]
    InvalidDelimiter(char),
    #[error("no ending delimiter '{0}' found")]
    Unterminated(char),
    #[error("unknown modifier '{0}'")]
    UnknownModifier(char),
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

/// A compiled delimited pattern.
#[derive(Clone)]
pub struct UrlPattern {
    source: String,
    regex: Regex,
}

#[derive(Debug, Default, Clone, Copy)]
struct Modifiers {
    case_insensitive: bool,
    multi_line: bool,
    dot_all: bool,
    extended: bool,
    swap_greed: bool,
    anchored: bool,
}

impl Modifiers {
    fn parse(flags: &str) -> Result<Self, PatternError> {
        let mut modifiers = Modifiers::default();
        for flag in flags.chars() {
            match flag {
                'i' => modifiers.case_insensitive = true,
                'm' => modifiers.multi_line = true,
                's' => modifiers.dot_all = true,
                'x' => modifiers.extended = true,
                'U' => modifiers.swap_greed = true,
                'A' => modifiers.anchored = true,
                // Unicode is always on; the rest have no effect on a search.
                'u' | 'D' | 'S' | 'X' | 'J' | 'n' => {}
                ' ' | '\r' | '\n' => {}
                other => return Err(PatternError::UnknownModifier(other)),
            }
        }
        Ok(modifiers)
    }
}

fn closing_delimiter(open: char) -> char {
    match open {
        '(' => ')',
        '{' => '}',
        '[' => ']',
        '<' => '>',
        other => other,
    }
}

/// Split `input` (which starts right after the opening delimiter) into the
/// pattern body and the trailing modifier string.
fn split_body(input: &str, open: char, close: char) -> Option<(&str, &str)> {
    let nested = open != close;
    let mut depth = 1usize;
    let mut escaped = false;

    for (idx, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some((&input[..idx], &input[idx + c.len_utf8()..]));
            }
        } else if nested && c == open {
            depth += 1;
        }
    }
    None
}

fn unescape_delimiter(body: &str, delimiter: char) -> String {
    if REGEX_META.contains(&delimiter) {
        return body.to_string();
    }
    let escaped = format!("\\{delimiter}");
    body.replace(&escaped, &delimiter.to_string())
}

impl UrlPattern {
    /// Parse and compile a delimited pattern.
    pub fn parse(key: &str) -> Result<Self, PatternError> {
        let trimmed = key.trim_start();
        let open = trimmed.chars().next().ok_or(PatternError::Empty)?;
        if open.is_alphanumeric() || open == '\\' {
            return Err(PatternError::InvalidDelimiter(open));
        }

        let close = closing_delimiter(open);
        let (body, flags) = split_body(&trimmed[open.len_utf8()..], open, close)
            .ok_or(PatternError::Unterminated(close))?;
        let modifiers = Modifiers::parse(flags)?;

        let body = unescape_delimiter(body, close);
        let expression = if modifiers.anchored {
            // Line break keeps an `x`-mode trailing comment from eating the group.
            let terminator = if modifiers.extended { "\n" } else { "" };
            format!(r"\A(?:{body}{terminator})")
        } else {
            body
        };

        let regex = RegexBuilder::new(&expression)
            .case_insensitive(modifiers.case_insensitive)
            .multi_line(modifiers.multi_line)
            .dot_matches_new_line(modifiers.dot_all)
            .ignore_whitespace(modifiers.extended)
            .swap_greed(modifiers.swap_greed)
            .build()?;

        Ok(Self {
            source: key.to_string(),
            regex,
        })
    }

    /// Search `url` for a match anywhere in the string.
    pub fn is_match(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// The key this pattern was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UrlPattern").field(&self.source).finish()
    }
}

/// True when `key` compiles as a delimited pattern.
pub fn is_pattern(key: &str) -> bool {
    UrlPattern::parse(key).is_ok()
}

/// Test `url` against `pattern`. A key that does not compile never matches.
pub fn matches(pattern: &str, url: &str) -> bool {
    UrlPattern::parse(pattern)
        .map(|p| p.is_match(url))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_urls_are_not_patterns() {
        assert!(!is_pattern("https://example.com"));
        assert!(!is_pattern("http://httpbin.org/get?test=1"));
        assert!(!is_pattern(""));
        assert!(!is_pattern("   "));
        assert!(!is_pattern(r"\foo\"));
    }

    #[test]
    fn test_delimited_patterns() {
        assert!(is_pattern(r"~httpbin\.org~"));
        assert!(is_pattern(r"/^https:\/\/example\.com/"));
        assert!(is_pattern(r"#example#i"));
        assert!(is_pattern(r"{example}"));
        assert!(is_pattern(r"(exa(m)ple)"));
        assert!(is_pattern(r"  ~leading-space~"));
    }

    #[test]
    fn test_compile_failures_fall_back() {
        // Unterminated
        assert!(matches!(
            UrlPattern::parse("~httpbin"),
            Err(PatternError::Unterminated('~'))
        ));
        // Unknown modifier
        assert!(matches!(
            UrlPattern::parse("~foo~bar~"),
            Err(PatternError::UnknownModifier('b'))
        ));
        // Invalid regex body
        assert!(matches!(
            UrlPattern::parse("~foo(~"),
            Err(PatternError::Regex(_))
        ));
        // Look-around is not supported by the regex engine
        assert!(!is_pattern("~foo(?=bar)~"));
    }

    #[test]
    fn test_unanchored_search() {
        let pattern = UrlPattern::parse(r"~httpbin\.org~").unwrap();
        assert!(pattern.is_match("https://httpbin.org/get"));
        assert!(pattern.is_match("http://httpbin.org/get"));
        assert!(pattern.is_match("https://www.httpbin.org/get"));
        assert!(!pattern.is_match("https://www.HTTPBIN.org/get"));
    }

    #[test]
    fn test_case_insensitive_modifier() {
        let pattern = UrlPattern::parse(r"~httpbin\.org~i").unwrap();
        assert!(pattern.is_match("https://www.HTTPBIN.org/get"));
    }

    #[test]
    fn test_anchors_come_from_pattern_text() {
        assert!(matches(r"~^https://httpbin\.org/p(ost|ut)~", "https://httpbin.org/post"));
        assert!(!matches(
            r"~^https://httpbin\.org/p(ost|ut)~",
            "https://www.httpbin.org/put"
        ));
        assert!(matches(r"~httpbin\.org/get$~", "https://www.httpbin.org/get"));
        assert!(!matches(r"~httpbin\.org/get$~", "https://www.httpbin.org/get?test=1"));
    }

    #[test]
    fn test_anchored_modifier() {
        assert!(matches(r"~https~A", "https://example.com"));
        assert!(!matches(r"~example~A", "https://example.com"));
        assert!(matches(r"~ https  # scheme~Ax", "https://example.com"));
    }

    #[test]
    fn test_escaped_delimiter() {
        assert!(matches(r"/example\.com\/api/", "https://example.com/api/v1"));
        assert!(matches(r"~a\~b~", "a~b"));
        assert!(matches(r"%100\%%", "100%"));
    }

    #[test]
    fn test_bracket_delimiters_nest() {
        let pattern = UrlPattern::parse(r"(example\.(com|org))").unwrap();
        assert!(pattern.is_match("https://example.org"));
        assert_eq!(pattern.as_str(), r"(example\.(com|org))");
    }

    #[test]
    fn test_matches_with_invalid_pattern() {
        assert!(!matches("https://example.com", "https://example.com"));
    }
}
