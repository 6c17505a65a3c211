//! Filter patterns.
//!
//! A [`FilterPattern`] is compiled once when set and then matched against
//! the text of every candidate cell. An empty pattern matches everything.

use regex::{Regex, RegexBuilder};

use super::config::{CaseSensitivity, PatternSyntax};
use crate::error::{Error, Result};

/// A compiled filter pattern.
///
/// # Example
///
/// ```
/// use sieve::proxy::{CaseSensitivity, FilterPattern};
///
/// let pattern = FilterPattern::wildcard("re*.txt", CaseSensitivity::Insensitive).unwrap();
/// assert!(pattern.matches("README.TXT"));
/// assert!(!pattern.matches("docs/readme.md"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FilterPattern {
    pattern: String,
    syntax: PatternSyntax,
    case: CaseSensitivity,
    regex: Option<Regex>,
}

impl FilterPattern {
    /// Compiles `pattern` under `syntax`.
    ///
    /// Returns [`Error::InvalidPattern`] if the resulting expression does not
    /// compile.
    pub fn new(
        pattern: impl Into<String>,
        syntax: PatternSyntax,
        case: CaseSensitivity,
    ) -> Result<Self> {
        let pattern = pattern.into();
        let regex = if pattern.is_empty() {
            None
        } else {
            let source = match syntax {
                PatternSyntax::RegularExpression => pattern.clone(),
                PatternSyntax::Wildcard => wildcard_to_regex(&pattern),
                PatternSyntax::FixedString => regex::escape(&pattern),
            };
            let compiled = RegexBuilder::new(&source)
                .case_insensitive(case == CaseSensitivity::Insensitive)
                .build()
                .map_err(|err| Error::invalid_pattern(&pattern, err))?;
            Some(compiled)
        };
        Ok(Self {
            pattern,
            syntax,
            case,
            regex,
        })
    }

    /// A regular expression pattern.
    pub fn regular_expression(pattern: impl Into<String>, case: CaseSensitivity) -> Result<Self> {
        Self::new(pattern, PatternSyntax::RegularExpression, case)
    }

    /// A wildcard pattern.
    pub fn wildcard(pattern: impl Into<String>, case: CaseSensitivity) -> Result<Self> {
        Self::new(pattern, PatternSyntax::Wildcard, case)
    }

    /// A literal substring pattern.
    pub fn fixed_string(pattern: impl Into<String>, case: CaseSensitivity) -> Result<Self> {
        Self::new(pattern, PatternSyntax::FixedString, case)
    }

    /// Recompiles the same pattern with a different case sensitivity.
    pub fn with_case_sensitivity(&self, case: CaseSensitivity) -> Result<Self> {
        Self::new(self.pattern.clone(), self.syntax, case)
    }

    /// The pattern as given.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn syntax(&self) -> PatternSyntax {
        self.syntax
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case
    }

    /// Returns `true` if the pattern accepts everything.
    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    /// Returns `true` if `text` contains a match.
    pub fn matches(&self, text: &str) -> bool {
        self.regex.as_ref().is_none_or(|regex| regex.is_match(text))
    }
}

impl PartialEq for FilterPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.syntax == other.syntax && self.case == other.case
    }
}

impl Eq for FilterPattern {}

/// Translates a wildcard pattern to an unanchored regular expression.
///
/// `*` matches any run of characters except `/`, `?` matches one character
/// except `/`, and `[...]` is a character class (`[!...]` negates). Every
/// other character matches itself.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push('[');
                    let mut j = i + 1;
                    if chars[j] == '!' {
                        out.push('^');
                        j += 1;
                    }
                    // A `]` right after the opening bracket is literal.
                    if chars[j] == ']' {
                        out.push_str("\\]");
                        j += 1;
                    }
                    for &c in &chars[j..end] {
                        match c {
                            '\\' | '[' | ']' | '^' | '&' | '~' => {
                                out.push('\\');
                                out.push(c);
                            }
                            _ => out.push(c),
                        }
                    }
                    out.push(']');
                    i = end;
                }
                None => out.push_str("\\["),
            },
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
        i += 1;
    }
    out
}

/// Finds the `]` closing the class opened at `open`.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wildcard(pattern: &str) -> FilterPattern {
        FilterPattern::wildcard(pattern, CaseSensitivity::Sensitive).unwrap()
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        let pattern = FilterPattern::default();
        assert!(pattern.is_empty());
        assert!(pattern.matches(""));
        assert!(pattern.matches("anything"));
    }

    #[test]
    fn test_regular_expression() {
        let pattern = FilterPattern::regular_expression("^[BD]$", CaseSensitivity::Sensitive).unwrap();
        assert!(pattern.matches("B"));
        assert!(!pattern.matches("b"));
        assert!(!pattern.matches("AB"));
    }

    #[test]
    fn test_case_insensitive() {
        let pattern = FilterPattern::regular_expression("abc", CaseSensitivity::Insensitive).unwrap();
        assert!(pattern.matches("xxABCxx"));
        let sensitive = pattern.with_case_sensitivity(CaseSensitivity::Sensitive).unwrap();
        assert!(!sensitive.matches("xxABCxx"));
    }

    #[test]
    fn test_invalid_regex_is_an_error() {
        let err = FilterPattern::regular_expression("(unclosed", CaseSensitivity::Sensitive).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { ref pattern, .. } if pattern == "(unclosed"));
    }

    #[test]
    fn test_fixed_string_escapes_metacharacters() {
        let pattern = FilterPattern::fixed_string("a.b(", CaseSensitivity::Sensitive).unwrap();
        assert!(pattern.matches("xa.b(y"));
        assert!(!pattern.matches("axb("));
    }

    #[test]
    fn test_wildcard_translation() {
        assert_eq!(wildcard_to_regex("a*b"), "a[^/]*b");
        assert_eq!(wildcard_to_regex("a?c"), "a[^/]c");
        assert_eq!(wildcard_to_regex("[!ab]"), "[^ab]");
        assert_eq!(wildcard_to_regex("[]x]"), "[\\]x]");
        assert_eq!(wildcard_to_regex("a.b"), "a\\.b");
        assert_eq!(wildcard_to_regex("[abc"), "\\[abc");
    }

    #[test]
    fn test_wildcard_is_unanchored() {
        let pattern = wildcard("b?d");
        assert!(pattern.matches("abcde"));
        assert!(!pattern.matches("b/d"));
    }

    #[test]
    fn test_wildcard_star_stops_at_slash() {
        let pattern = wildcard("src*rs");
        assert!(pattern.matches("src_main.rs"));
        assert!(!pattern.matches("src/main.rs"));
    }

    #[test]
    fn test_wildcard_classes() {
        let pattern = wildcard("file[0-9]");
        assert!(pattern.matches("file7"));
        assert!(!pattern.matches("fileX"));

        let negated = wildcard("x[!0-9]");
        assert!(negated.matches("xa"));
        assert!(!negated.matches("x5"));
    }

    #[test]
    fn test_equality_ignores_compiled_form() {
        let a = FilterPattern::fixed_string("abc", CaseSensitivity::Sensitive).unwrap();
        let b = FilterPattern::fixed_string("abc", CaseSensitivity::Sensitive).unwrap();
        let c = FilterPattern::wildcard("abc", CaseSensitivity::Sensitive).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
