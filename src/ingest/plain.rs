use std::{fs, path::Path};

use log::info;

use super::{DocumentSource, IngestError};

const PAGE_BREAK: char = '\u{000C}';

/// Plain text split into pages at form feeds, as written by `pdftotext`.
#[derive(Debug, Clone)]
pub struct PlainTextSource {
    pages: Vec<String>,
}

impl PlainTextSource {
    pub fn from_text(text: &str) -> Self {
        let text = text.replace("\r\n", "\n");
        let mut pages: Vec<String> = text.split(PAGE_BREAK).map(str::to_string).collect();
        if pages.len() > 1 && pages.last().is_some_and(|page| page.trim().is_empty()) {
            pages.pop();
        }
        Self { pages }
    }

    pub fn open(path: &Path) -> Result<Self, IngestError> {
        if !path.exists() {
            return Err(IngestError::NotFound(path.to_path_buf()));
        }
        let text =
            fs::read_to_string(path).map_err(|err| IngestError::Io(path.to_path_buf(), err))?;
        let source = Self::from_text(&text);
        info!(
            "opened {} with {} pages",
            path.display(),
            source.pages.len()
        );
        Ok(source)
    }
}

impl DocumentSource for PlainTextSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&mut self, page: usize) -> Result<String, IngestError> {
        self.pages
            .get(page)
            .cloned()
            .ok_or_else(|| IngestError::Page {
                page,
                message: "page out of range".into(),
            })
    }
}
