use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PAGE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^page\s*\d+").expect("valid page prefix pattern"));
static DIGITS_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+$").expect("valid digits pattern"));

const ALL_CAPS_MIN_EXCLUSIVE: usize = 5;
const ALL_CAPS_MAX_EXCLUSIVE: usize = 120;

pub const STRICT_MIN_LINE_LENGTH: usize = 20;
pub const LAX_MIN_LINE_LENGTH: usize = 3;

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "department",
    "university",
    "college",
    "professor",
    "subject code",
    "prepared by",
    "phone",
    "email",
];

/// Why a line was classified as noise. Variants are listed in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseRule {
    Blank,
    PageNumber,
    Email,
    AllCaps,
    TooShort,
    Keyword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterProfile {
    #[default]
    Strict,
    Lax,
}

impl FilterProfile {
    pub fn min_line_length(self) -> usize {
        match self {
            FilterProfile::Strict => STRICT_MIN_LINE_LENGTH,
            FilterProfile::Lax => LAX_MIN_LINE_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub profile: FilterProfile,
    /// Overrides the profile's minimum when set.
    pub min_line_length: Option<usize>,
    pub keywords: Vec<String>,
    pub page_number_rule: bool,
    pub all_caps_rule: bool,
    pub email_rule: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::strict()
    }
}

impl FilterConfig {
    pub fn strict() -> Self {
        Self::with_profile(FilterProfile::Strict)
    }

    pub fn lax() -> Self {
        Self::with_profile(FilterProfile::Lax)
    }

    fn with_profile(profile: FilterProfile) -> Self {
        Self {
            profile,
            min_line_length: None,
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            page_number_rule: true,
            all_caps_rule: true,
            email_rule: true,
        }
    }

    pub fn effective_min_line_length(&self) -> usize {
        self.min_line_length
            .unwrap_or_else(|| self.profile.min_line_length())
    }
}

/// Line classifier that drops headers, footers, contact details and page numbers.
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    min_line_length: usize,
    keywords: Vec<String>,
    page_number_rule: bool,
    all_caps_rule: bool,
    email_rule: bool,
}

impl NoiseFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            min_line_length: config.effective_min_line_length(),
            keywords: config
                .keywords
                .iter()
                .map(|keyword| keyword.trim().to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
            page_number_rule: config.page_number_rule,
            all_caps_rule: config.all_caps_rule,
            email_rule: config.email_rule,
        }
    }

    /// Returns the first rule that marks `line` as noise, or `None` for content.
    pub fn classify(&self, line: &str) -> Option<NoiseRule> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Some(NoiseRule::Blank);
        }

        if self.page_number_rule && (PAGE_PREFIX.is_match(trimmed) || DIGITS_ONLY.is_match(trimmed))
        {
            return Some(NoiseRule::PageNumber);
        }

        if self.email_rule && trimmed.contains('@') {
            return Some(NoiseRule::Email);
        }

        let length = trimmed.chars().count();
        if self.all_caps_rule
            && length > ALL_CAPS_MIN_EXCLUSIVE
            && length < ALL_CAPS_MAX_EXCLUSIVE
            && trimmed == trimmed.to_uppercase()
        {
            return Some(NoiseRule::AllCaps);
        }

        if length < self.min_line_length {
            return Some(NoiseRule::TooShort);
        }

        let lowered = trimmed.to_lowercase();
        if self
            .keywords
            .iter()
            .any(|keyword| lowered.contains(keyword.as_str()))
        {
            return Some(NoiseRule::Keyword);
        }

        None
    }

    /// Keeps the content lines of `lines`, trimmed, in their original order.
    pub fn filter<I, S>(&self, lines: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        lines
            .into_iter()
            .filter_map(|line| {
                let line = line.as_ref();
                match self.classify(line) {
                    Some(rule) => {
                        debug!("dropping line ({rule:?}): {:?}", line.trim());
                        None
                    }
                    None => Some(line.trim().to_string()),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict() -> NoiseFilter {
        NoiseFilter::new(&FilterConfig::strict())
    }

    #[test]
    fn drops_each_kind_of_noise() {
        let filter = strict();
        assert_eq!(filter.classify("   "), Some(NoiseRule::Blank));
        assert_eq!(filter.classify("Page 12"), Some(NoiseRule::PageNumber));
        assert_eq!(filter.classify("page3 of the notes"), Some(NoiseRule::PageNumber));
        assert_eq!(filter.classify(" 42 "), Some(NoiseRule::PageNumber));
        assert_eq!(
            filter.classify("Contact me at someone@example.org for details"),
            Some(NoiseRule::Email)
        );
        assert_eq!(
            filter.classify("ALL CAPS COLLEGE NAME"),
            Some(NoiseRule::AllCaps)
        );
        assert_eq!(filter.classify("John Doe"), Some(NoiseRule::TooShort));
        assert_eq!(
            filter.classify("Prepared for the Department of Physics"),
            Some(NoiseRule::Keyword)
        );
    }

    #[test]
    fn keeps_body_sentences() {
        let filter = strict();
        assert_eq!(
            filter.classify("This is a real sentence about physics."),
            None
        );
    }

    #[test]
    fn short_upper_case_lines_fall_through_to_length_rule() {
        let filter = strict();
        assert_eq!(filter.classify("ABCDE"), Some(NoiseRule::TooShort));
        let lax = NoiseFilter::new(&FilterConfig::lax());
        assert_eq!(lax.classify("ABCDE"), None);
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let config = FilterConfig {
            min_line_length: Some(0),
            keywords: Vec::new(),
            page_number_rule: false,
            all_caps_rule: false,
            email_rule: false,
            ..FilterConfig::lax()
        };
        let filter = NoiseFilter::new(&config);
        assert_eq!(filter.classify("12"), None);
        assert_eq!(filter.classify("a@b"), None);
        assert_eq!(filter.classify("UPPER CASE HEADER"), None);
    }

    #[test]
    fn keywords_match_case_insensitively() {
        let config = FilterConfig {
            keywords: vec!["North Campus".into()],
            ..FilterConfig::strict()
        };
        let filter = NoiseFilter::new(&config);
        assert_eq!(
            filter.classify("Lectures are held on the north campus daily"),
            Some(NoiseRule::Keyword)
        );
    }

    #[test]
    fn preserves_order_of_retained_lines() {
        let filter = strict();
        let lines = [
            "First real line of the body text.",
            "12",
            "Second real line of the body text.",
            "someone@example.org",
            "Third real line of the body text.",
        ];
        assert_eq!(
            filter.filter(lines),
            vec![
                "First real line of the body text.",
                "Second real line of the body text.",
                "Third real line of the body text.",
            ]
        );
    }

    #[test]
    fn filtering_twice_changes_nothing() {
        let filter = strict();
        let lines = [
            "  Indented body line that should survive.  ",
            "UNIVERSITY OF SOMEWHERE",
            "Page 7",
            "Another body line long enough to keep.",
            "Professor Smith's office hours are posted",
        ];
        let once = filter.filter(lines);
        let twice = filter.filter(&once);
        assert_eq!(once, twice);
    }
}
