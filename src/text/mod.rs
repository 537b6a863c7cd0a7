//! Turning extracted page text into an ordered list of sentences.
//!
//! [`NoiseFilter`] drops boilerplate lines, the survivors are joined per
//! [`JoinPolicy`] and [`segment`] splits the result into sentences which are
//! collected into an immutable [`SentenceSequence`].

pub mod filter;
pub mod segment;

use std::{ops::Index, sync::Arc};

use serde::{Deserialize, Serialize, Serializer};

pub use filter::{FilterConfig, FilterProfile, NoiseFilter, NoiseRule};
pub use segment::{collapse_whitespace, segment};

/// How retained lines are glued together before segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    #[default]
    Newline,
    Space,
}

impl JoinPolicy {
    pub fn separator(self) -> &'static str {
        match self {
            JoinPolicy::Newline => "\n",
            JoinPolicy::Space => " ",
        }
    }

    pub fn join<S: AsRef<str>>(self, lines: &[S]) -> String {
        let mut joined = String::new();
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                joined.push_str(self.separator());
            }
            joined.push_str(line.as_ref());
        }
        joined
    }
}

/// Ordered sentences addressed by their zero-based index.
///
/// Cloning shares the underlying storage. Elements are never blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceSequence {
    sentences: Arc<[String]>,
}

impl Default for SentenceSequence {
    fn default() -> Self {
        Self {
            sentences: Arc::from(Vec::new()),
        }
    }
}

impl Serialize for SentenceSequence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.sentences.iter())
    }
}

impl SentenceSequence {
    /// Segments `text` into a new sequence.
    pub fn from_text(text: &str) -> Self {
        Self::from_sentences(segment(text))
    }

    /// Builds a sequence, discarding blank entries.
    pub fn from_sentences<I, S>(sentences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sentences: Vec<String> = sentences
            .into_iter()
            .map(Into::into)
            .filter(|sentence: &String| !sentence.trim().is_empty())
            .collect();
        Self {
            sentences: sentences.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.sentences.get(index).map(String::as_str)
    }

    pub fn last_index(&self) -> Option<usize> {
        self.len().checked_sub(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.sentences.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.sentences.to_vec()
    }
}

impl Index<usize> for SentenceSequence {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.sentences[index]
    }
}

/// Filters the given lines and segments what remains.
pub fn clean_lines<I, S>(filter: &NoiseFilter, join: JoinPolicy, lines: I) -> SentenceSequence
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let kept = filter.filter(lines);
    SentenceSequence::from_text(&join.join(&kept))
}
