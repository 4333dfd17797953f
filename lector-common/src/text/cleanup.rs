//! Text cleanup rules applied to every unit before it is synthesized

use once_cell::sync::Lazy;
use regex::Regex;

/// Bracketed numeric citations (`[1]`, `[2, 3-5]`) and parenthesised
/// author/year citations (`(Smith et al. 2019)`)
static CITATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r" ?(\[[0-9, -]+\])|(\([^)(]*((et al.)|([0-9]{4}))[^)(]*\))")
        .expect("citation pattern is valid")
});

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r" ?https?://(?:www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b(?:[-a-zA-Z0-9()@:%_+.~#?&/=]*)",
    )
    .expect("url pattern is valid")
});

/// A token containing a run of at least three letters or word punctuation
static WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\S*[a-zA-Z.,:\-’`]{3,}\S*").expect("word pattern is valid")
});

/// Minimum number of word-like tokens a unit needs to be spoken
const MIN_WORDS: usize = 3;

/// Which cleanup rules are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupRules {
    /// Strip citation-like brackets and parentheses
    pub filter_citations: bool,
    /// Strip URL-like substrings
    pub filter_urls: bool,
    /// Reject units with fewer than three word-like tokens
    pub filter_words: bool,
}

impl Default for CleanupRules {
    fn default() -> Self {
        Self {
            filter_citations: true,
            filter_urls: true,
            filter_words: false,
        }
    }
}

impl CleanupRules {
    /// Apply the enabled rules to `text`.
    ///
    /// Returns `None` when the unit should not be spoken at all: it was
    /// rejected by the word filter or nothing but whitespace is left.
    pub fn clean(&self, text: &str) -> Option<String> {
        let mut text = text.to_string();
        if self.filter_citations {
            text = CITATION.replace_all(&text, "").into_owned();
        }
        if self.filter_urls {
            text = URL.replace_all(&text, "").into_owned();
        }
        if self.filter_words && WORD.find_iter(&text).count() < MIN_WORDS {
            return None;
        }
        if text.trim().is_empty() {
            return None;
        }
        Some(text)
    }
}
