//! Voice catalog types and preferred-voice selection.

pub mod library;

use log::{info, warn};
use serde::{Deserialize, Serialize};

pub use library::{VoiceError, VoiceLibrary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceCandidate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

impl VoiceCandidate {
    pub fn new(id: impl Into<String>, name: impl Into<String>, language: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: language.map(str::to_string),
            quality: None,
        }
    }
}

/// A name fragment to look for, optionally restricted to one language.
///
/// An empty `name_contains` matches every name, which turns the entry into a
/// language-only preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoicePreference {
    #[serde(default)]
    pub name_contains: String,
    #[serde(default)]
    pub language: Option<String>,
}

impl VoicePreference {
    pub fn name(fragment: &str) -> Self {
        Self {
            name_contains: fragment.to_string(),
            language: None,
        }
    }

    pub fn language(tag: &str) -> Self {
        Self {
            name_contains: String::new(),
            language: Some(tag.to_string()),
        }
    }

    pub fn matches(&self, voice: &VoiceCandidate) -> bool {
        let fragment = self.name_contains.to_lowercase();
        if !voice.name.to_lowercase().contains(&fragment) {
            return false;
        }
        match (&self.language, &voice.language) {
            (None, _) => true,
            (Some(wanted), Some(actual)) => same_language(wanted, actual),
            (Some(_), None) => false,
        }
    }
}

/// Compares language tags ignoring case and `_`/`-` spelling (`en_US` == `en-us`).
pub fn same_language(a: &str, b: &str) -> bool {
    let normalize = |tag: &str| tag.trim().replace('_', "-").to_lowercase();
    normalize(a) == normalize(b)
}

pub fn default_preferences() -> Vec<VoicePreference> {
    vec![
        VoicePreference::name("david"),
        VoicePreference::name("male"),
        VoicePreference::language("en-US"),
    ]
}

/// Picks one voice from a catalog according to an ordered preference list.
#[derive(Debug, Clone)]
pub struct VoiceSelector {
    preferences: Vec<VoicePreference>,
    selected: Option<VoiceCandidate>,
}

impl Default for VoiceSelector {
    fn default() -> Self {
        Self::new(default_preferences())
    }
}

impl VoiceSelector {
    pub fn new(preferences: Vec<VoicePreference>) -> Self {
        Self {
            preferences,
            selected: None,
        }
    }

    /// First preference match, else the first entry, else `None`.
    pub fn select(&self, catalog: &[VoiceCandidate]) -> Option<VoiceCandidate> {
        self.preferences
            .iter()
            .find_map(|preference| catalog.iter().find(|voice| preference.matches(voice)))
            .or_else(|| catalog.first())
            .cloned()
    }

    /// Replaces the current choice with one computed from `catalog`.
    pub fn on_catalog_changed(&mut self, catalog: &[VoiceCandidate]) -> Option<&VoiceCandidate> {
        self.selected = self.select(catalog);
        match &self.selected {
            Some(voice) => info!("selected voice '{}' ({})", voice.name, voice.id),
            None => warn!("voice catalog is empty; narration will use the platform default"),
        }
        self.selected.as_ref()
    }

    pub fn selected(&self) -> Option<&VoiceCandidate> {
        self.selected.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<VoiceCandidate> {
        vec![
            VoiceCandidate::new("es_ES-carlfm", "Carl FM", Some("es_ES")),
            VoiceCandidate::new("en_GB-alan", "Alan", Some("en_GB")),
            VoiceCandidate::new("en_US-ryan", "Ryan", Some("en_US")),
            VoiceCandidate::new("david", "Microsoft David Desktop", Some("en-US")),
        ]
    }

    #[test]
    fn empty_catalog_selects_nothing() {
        assert_eq!(VoiceSelector::default().select(&[]), None);
    }

    #[test]
    fn earlier_preferences_win() {
        let selected = VoiceSelector::default().select(&catalog()).unwrap();
        assert_eq!(selected.id, "david");
    }

    #[test]
    fn language_only_preference_normalizes_tags() {
        let mut voices = catalog();
        voices.pop();
        let selected = VoiceSelector::default().select(&voices).unwrap();
        assert_eq!(selected.id, "en_US-ryan");
    }

    #[test]
    fn name_preference_can_require_language() {
        let selector = VoiceSelector::new(vec![VoicePreference {
            name_contains: "CARL".into(),
            language: Some("en-US".into()),
        }]);
        let selected = selector.select(&catalog()).unwrap();
        assert_eq!(selected.id, "es_ES-carlfm", "falls back to first entry");
    }

    #[test]
    fn recomputes_on_every_catalog_change() {
        let mut selector = VoiceSelector::default();
        assert!(selector.on_catalog_changed(&[]).is_none());

        selector.on_catalog_changed(&catalog());
        assert_eq!(selector.selected().map(|v| v.id.as_str()), Some("david"));

        let later = vec![VoiceCandidate::new("ana", "Ana", Some("pt-BR"))];
        selector.on_catalog_changed(&later);
        assert_eq!(selector.selected().map(|v| v.id.as_str()), Some("ana"));

        selector.on_catalog_changed(&[]);
        assert!(selector.selected().is_none());
    }
}
