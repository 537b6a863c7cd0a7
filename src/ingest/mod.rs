//! Document ingestion: page extraction, noise filtering and segmentation.

pub mod plain;
pub mod script;

use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

use crate::text::{FilterConfig, JoinPolicy, NoiseFilter, SentenceSequence};

pub use plain::PlainTextSource;
pub use script::ScriptDocumentSource;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("document not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to launch extractor: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("extractor exited with status {status}: {stderr}")]
    Extractor { status: i32, stderr: String },
    #[error("extractor produced invalid output: {0}")]
    Malformed(String),
    #[error("extractor reported {code}: {message}")]
    Rejected { code: String, message: String },
    #[error("failed to extract page {page}: {message}")]
    Page { page: usize, message: String },
}

/// A paginated document whose pages can be turned into text.
pub trait DocumentSource {
    fn page_count(&self) -> usize;
    /// Text of the zero-based `page`.
    fn page_text(&mut self, page: usize) -> Result<String, IngestError>;
}

/// Opens `path` with the source matching its extension: `.pdf` goes through the
/// extractor script, anything else is read as plain text.
pub fn open_document(path: &Path) -> Result<Box<dyn DocumentSource>, IngestError> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    let source: Box<dyn DocumentSource> = if is_pdf {
        Box::new(ScriptDocumentSource::open(path)?)
    } else {
        Box::new(PlainTextSource::open(path)?)
    };
    Ok(source)
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub filter: FilterConfig,
    pub join: JoinPolicy,
    pub skip_first_page: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            join: JoinPolicy::default(),
            skip_first_page: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub sentences: SentenceSequence,
    pub pages_read: usize,
    pub lines_kept: usize,
    pub lines_dropped: usize,
}

/// Extracts every page, filters and segments the text.
///
/// The first page is skipped only when configured and the document has more
/// than one page. Any page failure aborts the whole ingestion; nothing
/// partial is returned.
pub fn ingest(
    source: &mut dyn DocumentSource,
    options: &IngestOptions,
) -> Result<IngestReport, IngestError> {
    let filter = NoiseFilter::new(&options.filter);
    let page_count = source.page_count();
    let first = usize::from(options.skip_first_page && page_count > 1);
    let mut lines_total = 0;
    let mut kept = Vec::new();
    let mut pages_read = 0;

    for page in first..page_count {
        let text = source.page_text(page)?;
        pages_read += 1;
        let lines: Vec<&str> = text.lines().collect();
        lines_total += lines.len();
        kept.extend(filter.filter(lines));
    }

    let sentences = SentenceSequence::from_text(&options.join.join(&kept));
    let report = IngestReport {
        pages_read,
        lines_kept: kept.len(),
        lines_dropped: lines_total - kept.len(),
        sentences,
    };

    info!(
        "ingested {} pages: kept {} lines, dropped {}, {} sentences",
        report.pages_read,
        report.lines_kept,
        report.lines_dropped,
        report.sentences.len()
    );
    if report.sentences.is_empty() {
        warn!("document produced no sentences; playback will be a no-op");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pages {
        pages: Vec<Result<&'static str, &'static str>>,
        requested: Vec<usize>,
    }

    impl DocumentSource for Pages {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_text(&mut self, page: usize) -> Result<String, IngestError> {
            self.requested.push(page);
            self.pages[page]
                .map(str::to_string)
                .map_err(|message| IngestError::Page {
                    page,
                    message: message.to_string(),
                })
        }
    }

    fn pages(pages: Vec<Result<&'static str, &'static str>>) -> Pages {
        Pages {
            pages,
            requested: Vec::new(),
        }
    }

    #[test]
    fn skips_title_page_and_drops_boilerplate() {
        let mut source = pages(vec![
            Ok("John Doe\njohn@x.com\n"),
            Ok("ALL CAPS COLLEGE NAME\nThis is a real sentence about physics. It continues here!"),
        ]);
        let report = ingest(&mut source, &IngestOptions::default()).unwrap();
        assert_eq!(
            report.sentences.to_vec(),
            vec!["This is a real sentence about physics.", "It continues here!"]
        );
        assert_eq!(source.requested, vec![1]);
        assert_eq!(report.pages_read, 1);
        assert_eq!(report.lines_kept, 1);
        assert_eq!(report.lines_dropped, 1);
    }

    #[test]
    fn reads_first_page_when_not_skipping() {
        let mut source = pages(vec![Ok("The opening page holds the introduction.")]);
        let options = IngestOptions {
            skip_first_page: false,
            ..IngestOptions::default()
        };
        let report = ingest(&mut source, &options).unwrap();
        assert_eq!(report.sentences.len(), 1);
    }

    #[test]
    fn page_failure_aborts_ingestion() {
        let mut source = pages(vec![
            Ok("cover"),
            Ok("A perfectly fine line of body text."),
            Err("corrupt content stream"),
            Ok("Never reached because page two failed."),
        ]);
        let err = ingest(&mut source, &IngestOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::Page { page: 2, .. }));
        assert_eq!(source.requested, vec![1, 2]);
    }

    #[test]
    fn all_noise_yields_empty_sequence() {
        let mut source = pages(vec![Ok("cover"), Ok("Page 2\n\n12\nDEPARTMENT OF MATHEMATICS")]);
        let report = ingest(&mut source, &IngestOptions::default()).unwrap();
        assert!(report.sentences.is_empty());
    }

    #[test]
    fn single_page_document_is_read_despite_skip() {
        let mut source = pages(vec![Ok("Only one page exists in this file. It is all body.")]);
        let report = ingest(&mut source, &IngestOptions::default()).unwrap();
        assert_eq!(source.requested, vec![0]);
        assert_eq!(report.pages_read, 1);
        assert_eq!(
            report.sentences.to_vec(),
            vec!["Only one page exists in this file.", "It is all body."]
        );
    }

    #[test]
    fn plain_text_without_page_breaks_keeps_its_sentences() {
        let mut source = PlainTextSource::from_text(
            "This is a whole plain text document. It has several real sentences in it.",
        );
        let report = ingest(&mut source, &IngestOptions::default()).unwrap();
        assert_eq!(report.pages_read, 1);
        assert_eq!(report.sentences.len(), 2);
    }
}
