use std::sync::mpsc::Receiver;

use log::{debug, info};

use crate::{
    config::ReaderConfig,
    ingest::{ingest, DocumentSource, IngestError, IngestOptions, IngestReport},
    playback::{
        NarrationNotice, Narrator, PlaybackController, PlaybackError, PlaybackEvent,
        PlaybackState, Rate,
    },
    text::SentenceSequence,
    voices::{VoiceCandidate, VoiceSelector},
};

/// The caller-facing reader: the loaded sentences, the chosen voice and the
/// narration state machine.
pub struct Reader<N: Narrator> {
    controller: PlaybackController<N>,
    selector: VoiceSelector,
    options: IngestOptions,
    rate: Rate,
    sentences: SentenceSequence,
}

impl<N: Narrator> Reader<N> {
    /// Builds a reader, selecting a voice from whatever the narrator already
    /// lists. An empty catalog waits for the next `CatalogChanged` notice.
    pub fn new(narrator: N, config: &ReaderConfig) -> Self {
        let mut selector = VoiceSelector::new(config.voice_preferences.clone());
        let catalog = narrator.voices();
        if catalog.is_empty() {
            debug!("no voices listed yet; waiting for the catalog");
        } else {
            selector.on_catalog_changed(&catalog);
        }
        Self {
            controller: PlaybackController::new(narrator).with_pitch(config.pitch()),
            selector,
            options: config.ingest_options(),
            rate: config.rate,
            sentences: SentenceSequence::default(),
        }
    }

    /// Replaces the loaded sentences with those of `source`.
    ///
    /// On failure the previous sentences stay loaded and playback is untouched.
    pub fn load(&mut self, source: &mut dyn DocumentSource) -> Result<IngestReport, IngestError> {
        let report = ingest(source, &self.options)?;
        self.controller.stop();
        self.sentences = report.sentences.clone();
        Ok(report)
    }

    pub fn play(&mut self) {
        self.controller.play(
            self.sentences.clone(),
            self.selector.selected().cloned(),
            self.rate,
        );
    }

    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        self.controller.pause()
    }

    pub fn resume(&mut self) -> Result<(), PlaybackError> {
        self.controller.resume()
    }

    pub fn stop(&mut self) {
        self.controller.stop();
    }

    /// Sets the rate for the next `play`; the running session keeps its own.
    pub fn set_rate(&mut self, value: f32) -> Rate {
        self.rate = Rate::new(value);
        info!("rate set to {}", self.rate.value());
        self.rate
    }

    pub fn rate(&self) -> Rate {
        self.rate
    }

    pub fn handle_notice(&mut self, notice: NarrationNotice) {
        match notice {
            NarrationNotice::CatalogChanged => {
                let catalog = self.controller.narrator().voices();
                self.selector.on_catalog_changed(&catalog);
            }
            other => self.controller.handle_notice(&other),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<PlaybackEvent> {
        self.controller.subscribe()
    }

    pub fn sentences(&self) -> &SentenceSequence {
        &self.sentences
    }

    pub fn voice(&self) -> Option<&VoiceCandidate> {
        self.selector.selected()
    }

    pub fn state(&self) -> &PlaybackState {
        self.controller.state()
    }

    pub fn current_sentence(&self) -> Option<&str> {
        self.controller.current_sentence()
    }

    pub fn narrator(&self) -> &N {
        self.controller.narrator()
    }

    pub fn narrator_mut(&mut self) -> &mut N {
        self.controller.narrator_mut()
    }
}
