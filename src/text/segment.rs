use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));
static BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s").expect("valid sentence boundary pattern"));

/// Collapses every run of whitespace into a single ASCII space.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Splits `text` into sentences at every `.`, `!` or `?` followed by whitespace.
///
/// Whitespace is collapsed first, terminal punctuation stays attached to its
/// sentence and a trailing fragment without punctuation is kept.
pub fn segment(text: &str) -> Vec<String> {
    let normalized = collapse_whitespace(text);
    let mut sentences = Vec::new();
    let mut start = 0;
    for mat in BOUNDARY.find_iter(&normalized) {
        let end = mat.start() + 1;
        push_sentence(&normalized[start..end], &mut sentences);
        start = mat.end();
    }
    push_sentence(&normalized[start..], &mut sentences);
    sentences
}

fn push_sentence(slice: &str, sentences: &mut Vec<String>) {
    let trimmed = slice.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_each_terminal() {
        assert_eq!(segment("A. B! C?"), vec!["A.", "B!", "C?"]);
    }

    #[test]
    fn collapses_whitespace_before_splitting() {
        assert_eq!(segment("A.   B."), vec!["A.", "B."]);
        assert_eq!(
            segment("One\nline.\n\n\tTwo  lines!"),
            vec!["One line.", "Two lines!"]
        );
    }

    #[test]
    fn keeps_trailing_fragment() {
        assert_eq!(
            segment("Finished sentence. dangling tail"),
            vec!["Finished sentence.", "dangling tail"]
        );
    }

    #[test]
    fn punctuation_inside_words_does_not_split() {
        assert_eq!(
            segment("Version 2.5 shipped. See e.g.the notes"),
            vec!["Version 2.5 shipped.", "See e.g.the notes"]
        );
    }

    #[test]
    fn ellipsis_splits_after_last_dot() {
        assert_eq!(segment("Wait... what?"), vec!["Wait...", "what?"]);
    }

    #[test]
    fn never_returns_blank_elements() {
        for input in ["", "   ", "\n\t", ". . .", "?!  ", "Hi.  \n "] {
            assert!(segment(input).iter().all(|s| !s.trim().is_empty()), "{input:?}");
        }
    }

    #[test]
    fn collapses_unicode_whitespace() {
        assert_eq!(collapse_whitespace("  a\u{00A0}\u{2003}b \r\n c  "), "a b c");
    }

    #[test]
    fn handles_multibyte_text() {
        assert_eq!(
            segment("¿Cómo estás? Très bien! Ñandú."),
            vec!["¿Cómo estás?", "Très bien!", "Ñandú."]
        );
    }
}
