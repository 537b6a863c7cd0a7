use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;
use walkdir::WalkDir;

use super::VoiceCandidate;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("voice '{0}' not found")]
    NotFound(String),
}

#[derive(Debug, Clone)]
struct VoiceModel {
    candidate: VoiceCandidate,
    model_path: PathBuf,
}

/// Piper voice models (`*.onnx` plus optional `*.onnx.json`) found under a directory.
#[derive(Default)]
pub struct VoiceLibrary {
    base_dir: PathBuf,
    voices: RwLock<HashMap<String, VoiceModel>>,
}

impl VoiceLibrary {
    /// Creates an empty library; call [`VoiceLibrary::refresh`] to populate it.
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            voices: RwLock::new(HashMap::new()),
        }
    }

    pub fn refresh(&self) {
        let mut discovered = HashMap::new();
        if self.base_dir.exists() {
            for entry in WalkDir::new(&self.base_dir)
                .into_iter()
                .filter_map(Result::ok)
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("onnx") {
                    continue;
                }
                if let Some(model) = build_voice_model(path) {
                    discovered.insert(model.candidate.id.clone(), model);
                }
            }
        } else {
            debug!("voice directory {} does not exist", self.base_dir.display());
        }
        *self.voices.write() = discovered;
    }

    /// Catalog entries sorted by display name.
    pub fn list(&self) -> Vec<VoiceCandidate> {
        let mut voices: Vec<_> = self
            .voices
            .read()
            .values()
            .map(|model| model.candidate.clone())
            .collect();
        voices.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        voices
    }

    pub fn model_path(&self, id: &str) -> Result<PathBuf, VoiceError> {
        self.voices
            .read()
            .get(id)
            .map(|model| model.model_path.clone())
            .ok_or_else(|| VoiceError::NotFound(id.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.voices.read().is_empty()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

fn build_voice_model(path: &Path) -> Option<VoiceModel> {
    let id = path.file_stem()?.to_string_lossy().to_string();
    let metadata = metadata_path_for(path).and_then(|meta| match fs::read_to_string(&meta) {
        Ok(contents) => serde_json::from_str::<Value>(&contents)
            .map_err(|err| warn!("Failed to parse metadata {}: {err}", meta.display()))
            .ok(),
        Err(err) => {
            warn!("Failed to read metadata {}: {err}", meta.display());
            None
        }
    });

    let language = metadata.as_ref().and_then(|value| value.get("language"));
    let label = language
        .and_then(|lang| lang.get("name_native").or_else(|| lang.get("name")))
        .and_then(Value::as_str);
    let dataset = metadata
        .as_ref()
        .and_then(|value| value.get("dataset"))
        .and_then(Value::as_str);
    let name = match (dataset, label) {
        (Some(dataset), Some(label)) => format!("{dataset} · {label}"),
        (Some(dataset), None) => dataset.to_string(),
        (None, Some(label)) => format!("{label} · {id}"),
        (None, None) => id.clone(),
    };

    Some(VoiceModel {
        candidate: VoiceCandidate {
            language: language
                .and_then(|lang| lang.get("code"))
                .and_then(Value::as_str)
                .map(str::to_string),
            quality: metadata
                .as_ref()
                .and_then(|value| value.get("audio"))
                .and_then(|audio| audio.get("quality"))
                .and_then(Value::as_str)
                .map(str::to_string),
            name,
            id,
        },
        model_path: path.to_path_buf(),
    })
}

fn metadata_path_for(path: &Path) -> Option<PathBuf> {
    let mut metadata_path = path.to_path_buf();
    metadata_path.set_extension("onnx.json");
    metadata_path.exists().then_some(metadata_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn discovers_models_recursively() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("en/en_US-ryan-high.onnx").touch().unwrap();
        temp.child("es/es_ES-carlfm-x_low.onnx").touch().unwrap();
        temp.child("notes.txt").touch().unwrap();

        let library = VoiceLibrary::new(temp.path().to_path_buf());
        assert!(library.is_empty());
        library.refresh();

        let ids: Vec<_> = library.list().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec!["en_US-ryan-high", "es_ES-carlfm-x_low"]);
        assert!(library
            .model_path("en_US-ryan-high")
            .unwrap()
            .ends_with("en/en_US-ryan-high.onnx"));
        assert!(matches!(
            library.model_path("missing"),
            Err(VoiceError::NotFound(_))
        ));
    }

    #[test]
    fn reads_language_and_quality_from_metadata() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("demo.onnx").touch().unwrap();
        temp.child("demo.onnx.json")
            .write_str(
                r#"{"dataset":"david","language":{"code":"en_US","name_native":"English"},"audio":{"quality":"high"}}"#,
            )
            .unwrap();

        let library = VoiceLibrary::new(temp.path().to_path_buf());
        library.refresh();
        let voice = library.list().pop().unwrap();
        assert_eq!(voice.name, "david · English");
        assert_eq!(voice.language.as_deref(), Some("en_US"));
        assert_eq!(voice.quality.as_deref(), Some("high"));
    }

    #[test]
    fn missing_directory_yields_empty_catalog() {
        let temp = assert_fs::TempDir::new().unwrap();
        let library = VoiceLibrary::new(temp.path().join("absent"));
        library.refresh();
        assert!(library.list().is_empty());
    }
}
