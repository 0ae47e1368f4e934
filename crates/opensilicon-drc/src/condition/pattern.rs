use glob::{MatchOptions, Pattern, PatternError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A string literal from a condition.
///
/// Literals containing `*` or `?` are compiled once into a glob and match
/// case-insensitively; anything else compares as case-insensitive text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPattern {
    text: String,
    glob: Option<Pattern>,
}

impl TextPattern {
    pub fn new(text: &str) -> Result<Self, PatternError> {
        let glob = if text.contains(['*', '?']) {
            Some(Pattern::new(text)?)
        } else {
            None
        };
        Ok(Self {
            text: text.to_string(),
            glob,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_glob(&self) -> bool {
        self.glob.is_some()
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match &self.glob {
            Some(glob) => glob.matches_with(candidate, MATCH_OPTIONS),
            None => self.text.eq_ignore_ascii_case(candidate),
        }
    }
}
