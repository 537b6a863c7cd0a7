//! Narrator backed by Piper synthesis and a local audio output.
//!
//! Each [`UtteranceRequest`] is synthesized and played on its own worker
//! thread. A generation counter, bumped by [`Narrator::cancel_all`], marks
//! every in-flight worker as stale so it neither starts audio nor reports
//! back once cancelled.

pub mod output;
pub mod piper;

use std::{
    fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::Sender,
        Arc,
    },
    thread,
};

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::{
    playback::{NarrationError, NarrationNotice, Narrator, UtteranceId, UtteranceRequest},
    voices::{VoiceCandidate, VoiceLibrary},
};

pub use output::{AudioError, AudioOutput, ClipId, CommandOutput};
pub use piper::{PiperSynthesizer, SynthesisError, SynthesisRequest, Synthesizer};

#[cfg(feature = "playback")]
pub use output::RodioOutput;

/// Picks in-process playback when built with `playback`, else an external player.
pub fn default_output() -> Result<Arc<dyn AudioOutput>, AudioError> {
    #[cfg(feature = "playback")]
    {
        match RodioOutput::new() {
            Ok(output) => return Ok(Arc::new(output)),
            Err(err) => warn!("rodio output unavailable ({err}), using external player"),
        }
    }
    Ok(Arc::new(CommandOutput::from_env()?))
}

struct Worker {
    synthesizer: Arc<dyn Synthesizer>,
    output: Arc<dyn AudioOutput>,
    notices: Sender<NarrationNotice>,
    generation: Arc<AtomicU64>,
    gate: Arc<Mutex<()>>,
    ticket: u64,
}

impl Worker {
    fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.ticket
    }

    fn notify(&self, notice: NarrationNotice) {
        if self.is_current() {
            let _ = self.notices.send(notice);
        }
    }

    fn fail(&self, id: UtteranceId, message: String) {
        warn!("utterance {id:?} failed: {message}");
        self.notify(NarrationNotice::Failed { id, message });
    }

    fn run(self, id: UtteranceId, request: SynthesisRequest) {
        if let Err(err) = self.synthesizer.synthesize(&request) {
            self.fail(id, err.to_string());
            return;
        }

        let clip = {
            let _gate = self.gate.lock();
            if !self.is_current() {
                debug!("dropping cancelled utterance {id:?}");
                let _ = fs::remove_file(&request.output_path);
                return;
            }
            match self.output.start(&request.output_path) {
                Ok(clip) => clip,
                Err(err) => {
                    self.fail(id, err.to_string());
                    return;
                }
            }
        };
        self.notify(NarrationNotice::Started(id));

        let played = self.output.wait(clip);
        let _ = fs::remove_file(&request.output_path);
        match played {
            Ok(()) => self.notify(NarrationNotice::Finished(id)),
            Err(err) => self.fail(id, err.to_string()),
        }
    }
}

pub struct PiperNarrator {
    library: VoiceLibrary,
    synthesizer: Arc<dyn Synthesizer>,
    output: Arc<dyn AudioOutput>,
    output_dir: PathBuf,
    notices: Sender<NarrationNotice>,
    generation: Arc<AtomicU64>,
    gate: Arc<Mutex<()>>,
    known_voices: Vec<VoiceCandidate>,
}

impl PiperNarrator {
    pub fn new(
        library: VoiceLibrary,
        synthesizer: Arc<dyn Synthesizer>,
        output: Arc<dyn AudioOutput>,
        output_dir: PathBuf,
        notices: Sender<NarrationNotice>,
    ) -> Self {
        Self {
            library,
            synthesizer,
            output,
            output_dir,
            notices,
            generation: Arc::new(AtomicU64::new(0)),
            gate: Arc::new(Mutex::new(())),
            known_voices: Vec::new(),
        }
    }

    /// Rescans the voice directory and announces a changed catalog.
    pub fn refresh_voices(&mut self) -> bool {
        self.library.refresh();
        let voices = self.library.list();
        if voices == self.known_voices {
            return false;
        }
        info!(
            "voice catalog now has {} voices from {}",
            voices.len(),
            self.library.base_dir().display()
        );
        self.known_voices = voices;
        let _ = self.notices.send(NarrationNotice::CatalogChanged);
        true
    }

    fn model_for(&self, voice: Option<&VoiceCandidate>) -> Result<PathBuf, NarrationError> {
        match voice {
            Some(voice) => self
                .library
                .model_path(&voice.id)
                .map_err(|_| NarrationError::UnknownVoice(voice.id.clone())),
            None => {
                let first = self
                    .library
                    .list()
                    .into_iter()
                    .next()
                    .ok_or(NarrationError::NoVoice)?;
                self.library
                    .model_path(&first.id)
                    .map_err(|_| NarrationError::NoVoice)
            }
        }
    }
}

impl Narrator for PiperNarrator {
    fn speak(&mut self, request: UtteranceRequest) -> Result<(), NarrationError> {
        let model_path = self.model_for(request.voice.as_ref())?;
        let id = request.id;
        if (request.pitch - 1.0).abs() > f32::EPSILON {
            debug!("Piper has no pitch control; ignoring pitch {}", request.pitch);
        }
        let synthesis = SynthesisRequest {
            text: request.text,
            model_path,
            output_path: self
                .output_dir
                .join(format!("utterance-{}-{}.wav", id.session, id.index)),
            speaker: None,
            length_scale: Some(piper::length_scale_for(request.rate.value())),
        };
        let worker = Worker {
            synthesizer: Arc::clone(&self.synthesizer),
            output: Arc::clone(&self.output),
            notices: self.notices.clone(),
            generation: Arc::clone(&self.generation),
            gate: Arc::clone(&self.gate),
            ticket: self.generation.load(Ordering::SeqCst),
        };
        thread::Builder::new()
            .name(format!("narration-{}-{}", id.session, id.index))
            .spawn(move || worker.run(id, synthesis))
            .map_err(|err| NarrationError::Rejected(err.to_string()))?;
        Ok(())
    }

    fn cancel_all(&mut self) {
        let _gate = self.gate.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.output.stop();
    }

    fn pause(&mut self) {
        self.output.pause();
    }

    fn resume(&mut self) {
        self.output.resume();
    }

    fn voices(&self) -> Vec<VoiceCandidate> {
        self.library.list()
    }
}
