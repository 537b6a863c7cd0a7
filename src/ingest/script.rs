use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Command,
};

use log::{error, info};
use serde::Deserialize;
use serde_json::Value;

use super::{DocumentSource, IngestError};

const DEFAULT_SCRIPT: &str = "scripts/py/pdf_extract.py";
const DEFAULT_INTERPRETER: &str = "python";

/// Interpreter and script used to pull page text out of a binary document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorCommand {
    pub interpreter: OsString,
    pub script: PathBuf,
}

impl Default for ExtractorCommand {
    fn default() -> Self {
        Self {
            interpreter: OsString::from(DEFAULT_INTERPRETER),
            script: PathBuf::from(DEFAULT_SCRIPT),
        }
    }
}

impl ExtractorCommand {
    /// Reads `READER_PYTHON_BIN` and `READER_PDF_SCRIPT`, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            interpreter: std::env::var_os("READER_PYTHON_BIN")
                .unwrap_or_else(|| OsString::from(DEFAULT_INTERPRETER)),
            script: std::env::var_os("READER_PDF_SCRIPT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExtractorOutput {
    ok: bool,
    #[serde(default)]
    pages: Vec<PageOutput>,
    #[serde(default)]
    meta: Value,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageOutput {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Pages produced by an external extraction script printing JSON on stdout.
///
/// Expected shape: `{"ok": true, "pages": [{"text": "..."}], "meta": {...}}`.
/// A page may carry `{"error": "..."}` instead of text.
#[derive(Debug)]
pub struct ScriptDocumentSource {
    pages: Vec<PageOutput>,
    meta: Value,
}

impl ScriptDocumentSource {
    pub fn open(path: &Path) -> Result<Self, IngestError> {
        Self::open_with(&ExtractorCommand::from_env(), path)
    }

    pub fn open_with(command: &ExtractorCommand, path: &Path) -> Result<Self, IngestError> {
        if !path.exists() {
            return Err(IngestError::NotFound(path.to_path_buf()));
        }

        let output = Command::new(&command.interpreter)
            .arg(&command.script)
            .arg(path)
            .output()
            .map_err(|err| {
                error!("could not run extractor {}: {err}", command.script.display());
                IngestError::Spawn(err)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("extractor failed: {stderr}");
            return Err(IngestError::Extractor {
                status: output.status.code().unwrap_or_default(),
                stderr,
            });
        }

        let parsed: ExtractorOutput = serde_json::from_slice(&output.stdout)
            .map_err(|err| IngestError::Malformed(err.to_string()))?;
        if !parsed.ok {
            return Err(IngestError::Rejected {
                code: parsed.code.unwrap_or_else(|| "PDF_PARSE_FAIL".into()),
                message: parsed
                    .message
                    .unwrap_or_else(|| "extraction failed".into()),
            });
        }

        info!(
            "extracted {} pages from {}",
            parsed.pages.len(),
            path.display()
        );
        Ok(Self {
            pages: parsed.pages,
            meta: parsed.meta,
        })
    }

    /// Document metadata reported by the extractor (title, author, ...).
    pub fn meta(&self) -> &Value {
        &self.meta
    }
}

impl DocumentSource for ScriptDocumentSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&mut self, page: usize) -> Result<String, IngestError> {
        let entry = self.pages.get(page).ok_or_else(|| IngestError::Page {
            page,
            message: "page out of range".into(),
        })?;
        match (&entry.text, &entry.error) {
            (_, Some(message)) => Err(IngestError::Page {
                page,
                message: message.clone(),
            }),
            (Some(text), None) => Ok(text.clone()),
            (None, None) => Err(IngestError::Page {
                page,
                message: "extractor returned no text".into(),
            }),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs::{self, File};
    use tempfile::TempDir;

    use crate::ingest::{ingest, IngestOptions};

    struct EnvGuard {
        key: &'static str,
        previous: Option<OsString>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.previous {
                Some(value) => std::env::set_var(self.key, value),
                None => std::env::remove_var(self.key),
            }
        }
    }

    fn scoped_env(key: &'static str, value: &Path) -> EnvGuard {
        let previous = std::env::var_os(key);
        std::env::set_var(key, value);
        EnvGuard { key, previous }
    }

    /// Writes a shell script that prints `stdout`, then exits with `status`.
    fn stub(temp: &TempDir, stdout: &str, status: i32) -> ExtractorCommand {
        let script = temp.path().join("extract.sh");
        fs::write(
            &script,
            format!("cat <<'JSON'\n{stdout}\nJSON\necho 'stub stderr' >&2\nexit {status}\n"),
        )
        .unwrap();
        ExtractorCommand {
            interpreter: "sh".into(),
            script,
        }
    }

    fn document(temp: &TempDir) -> PathBuf {
        let path = temp.path().join("demo.pdf");
        File::create(&path).unwrap();
        path
    }

    #[test]
    fn missing_document_is_reported() {
        let err = ScriptDocumentSource::open_with(
            &ExtractorCommand::default(),
            Path::new("no-such.pdf"),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::NotFound(_)));
    }

    #[test]
    fn parses_pages_and_meta() {
        let temp = TempDir::new().unwrap();
        let command = stub(
            &temp,
            r#"{"ok": true, "pages": [{"text": "Cover"}, {"text": "Body"}], "meta": {"title": "Demo"}}"#,
            0,
        );
        let mut source = ScriptDocumentSource::open_with(&command, &document(&temp)).unwrap();
        assert_eq!(source.page_count(), 2);
        assert_eq!(source.page_text(1).unwrap(), "Body");
        assert_eq!(source.meta()["title"], "Demo");
    }

    #[test]
    fn script_failure_carries_stderr() {
        let temp = TempDir::new().unwrap();
        let command = stub(&temp, "{}", 3);
        let err = ScriptDocumentSource::open_with(&command, &document(&temp)).unwrap_err();
        match err {
            IngestError::Extractor { status, stderr } => {
                assert_eq!(status, 3);
                assert_eq!(stderr, "stub stderr");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejected_and_malformed_output() {
        let temp = TempDir::new().unwrap();
        let command = stub(
            &temp,
            r#"{"ok": false, "code": "PDF_ENCRYPTED", "message": "password required"}"#,
            0,
        );
        let err = ScriptDocumentSource::open_with(&command, &document(&temp)).unwrap_err();
        assert!(matches!(err, IngestError::Rejected { ref code, .. } if code == "PDF_ENCRYPTED"));

        let command = stub(&temp, "not json", 0);
        let err = ScriptDocumentSource::open_with(&command, &document(&temp)).unwrap_err();
        assert!(matches!(err, IngestError::Malformed(_)));
    }

    #[test]
    fn failed_page_aborts_ingestion() {
        let temp = TempDir::new().unwrap();
        let command = stub(
            &temp,
            r#"{"ok": true, "pages": [{"text": "Cover"}, {"text": "A sentence long enough to keep."}, {"error": "bad font"}]}"#,
            0,
        );
        let mut source = ScriptDocumentSource::open_with(&command, &document(&temp)).unwrap();
        let err = ingest(&mut source, &IngestOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::Page { page: 2, ref message } if message == "bad font"));
    }

    #[test]
    #[serial]
    fn reads_command_from_environment() {
        let temp = TempDir::new().unwrap();
        let command = stub(&temp, r#"{"ok": true, "pages": []}"#, 0);
        let _python = scoped_env("READER_PYTHON_BIN", Path::new("sh"));
        let _script = scoped_env("READER_PDF_SCRIPT", &command.script);

        assert_eq!(ExtractorCommand::from_env(), command);
        let source = ScriptDocumentSource::open(&document(&temp)).unwrap();
        assert_eq!(source.page_count(), 0);
    }
}
