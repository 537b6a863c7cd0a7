//! Document-to-speech reader core.
//!
//! Raw page text is cleaned by [`text::NoiseFilter`], split into sentences and
//! narrated one sentence at a time by [`playback::PlaybackController`], which
//! publishes the current position so a front end can highlight it.

pub mod command;
pub mod config;
pub mod ingest;
pub mod narration;
pub mod playback;
pub mod reader;
pub mod text;
pub mod util;
pub mod voices;

pub use config::ReaderConfig;
pub use ingest::{ingest, open_document, DocumentSource, IngestError, IngestReport};
pub use playback::{Phase, PlaybackController, PlaybackEvent, Rate};
pub use reader::Reader;
pub use text::SentenceSequence;
