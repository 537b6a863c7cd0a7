use thiserror::Error;

use crate::voices::VoiceCandidate;

use super::Rate;

/// Identifies one narration request: the session it belongs to and the
/// sentence index it speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId {
    pub session: u64,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceRequest {
    pub id: UtteranceId,
    pub text: String,
    pub voice: Option<VoiceCandidate>,
    pub rate: Rate,
    pub pitch: f32,
}

/// Lifecycle notifications a narrator delivers back to the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationNotice {
    Started(UtteranceId),
    Finished(UtteranceId),
    Failed { id: UtteranceId, message: String },
    /// The voice catalog was repopulated.
    CatalogChanged,
}

#[derive(Debug, Error)]
pub enum NarrationError {
    #[error("no voice model is available for narration")]
    NoVoice,
    #[error("voice '{0}' is not in the catalog")]
    UnknownVoice(String),
    #[error("narration request rejected: {0}")]
    Rejected(String),
}

/// Speech capability driven by the playback controller.
///
/// `speak` only enqueues; completion is reported through
/// [`NarrationNotice`]s carrying the request's [`UtteranceId`].
pub trait Narrator {
    fn speak(&mut self, request: UtteranceRequest) -> Result<(), NarrationError>;
    fn cancel_all(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn voices(&self) -> Vec<VoiceCandidate>;
}
