//! Free-text tokenization into search terms.

use std::str::Split;

/// Shortest token kept as a search term, in characters.
pub const MIN_TERM_CHARS: usize = 2;

/// Words that carry no search meaning: articles, conjunctions, prepositions,
/// auxiliaries and the verbs people use to phrase a request.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "is", "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should", "want", "like", "buy", "need", "please", "give",
];

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ',' || c == ';'
}

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

fn is_search_term(token: &str) -> bool {
    token.chars().count() >= MIN_TERM_CHARS && !is_stop_word(token)
}

/// Normalized query text, iterable as search terms.
///
/// Iteration is lazy and can be restarted any number of times. It always
/// yields at least one term: when every token is filtered out, the whole
/// normalized text is the single term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerms {
    cleaned: String,
}

impl SearchTerms {
    pub fn parse(query_text: &str) -> Self {
        Self {
            cleaned: query_text.to_lowercase().trim().to_string(),
        }
    }

    /// The lowercased, trimmed query text.
    pub fn cleaned(&self) -> &str {
        &self.cleaned
    }

    pub fn iter(&self) -> Terms<'_> {
        if self.tokens().any(is_search_term) {
            Terms::Filtered(self.tokens())
        } else {
            Terms::Fallback(Some(&self.cleaned))
        }
    }

    /// True when no token survived filtering.
    pub fn is_fallback(&self) -> bool {
        matches!(self.iter(), Terms::Fallback(_))
    }

    fn tokens(&self) -> Split<'_, fn(char) -> bool> {
        self.cleaned.split(is_separator as fn(char) -> bool)
    }
}

impl<'a> IntoIterator for &'a SearchTerms {
    type Item = &'a str;
    type IntoIter = Terms<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the terms of a [`SearchTerms`].
#[derive(Clone)]
pub enum Terms<'a> {
    Filtered(Split<'a, fn(char) -> bool>),
    Fallback(Option<&'a str>),
}

impl<'a> Iterator for Terms<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        match self {
            Terms::Filtered(tokens) => tokens.find(|t| is_search_term(t)),
            Terms::Fallback(whole) => whole.take(),
        }
    }
}

/// Tokenize query text into owned terms.
pub fn tokenize(query_text: &str) -> Vec<String> {
    SearchTerms::parse(query_text)
        .iter()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_whitespace_and_punctuation() {
        assert_eq!(
            tokenize("laptop,stand;usb\tcable\nhub"),
            vec!["laptop", "stand", "usb", "cable", "hub"]
        );
    }

    #[test]
    fn test_lowercases_and_trims() {
        assert_eq!(tokenize("  Laptop STAND  "), vec!["laptop", "stand"]);
    }

    #[test]
    fn test_drops_short_tokens_and_stop_words() {
        assert_eq!(
            tokenize("I want to buy a laptop for my desk please"),
            vec!["laptop", "my", "desk"]
        );
    }

    #[test]
    fn test_all_stop_words_fall_back_to_whole_text() {
        assert_eq!(tokenize("the a of"), vec!["the a of"]);
        assert!(SearchTerms::parse("The A of").is_fallback());
    }

    #[test]
    fn test_empty_input_yields_single_empty_term() {
        assert_eq!(tokenize(""), vec![""]);
        assert_eq!(tokenize("   "), vec![""]);
    }

    #[test]
    fn test_single_character_tokens_fall_back() {
        assert_eq!(tokenize("x y"), vec!["x y"]);
    }

    #[test]
    fn test_length_counts_characters() {
        assert_eq!(tokenize("é ü日"), vec!["ü日"]);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let terms = SearchTerms::parse("red usb cable");
        let first: Vec<_> = terms.iter().collect();
        let second: Vec<_> = (&terms).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["red", "usb", "cable"]);
        assert!(!terms.is_fallback());
    }
}
