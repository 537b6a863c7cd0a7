//! Sentence-by-sentence narration state machine.
//!
//! [`PlaybackController`] walks a [`SentenceSequence`] one sentence at a time
//! through an injected [`Narrator`]. Every phase or position change is
//! published as a [`PlaybackEvent`] to all subscribers, and narrator
//! completions are matched by [`UtteranceId`] so notices from a superseded
//! session are ignored.

pub mod narrator;

use std::{
    fmt,
    sync::mpsc::{self, Receiver, Sender},
};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{text::SentenceSequence, voices::VoiceCandidate};

pub use narrator::{NarrationError, NarrationNotice, Narrator, UtteranceId, UtteranceRequest};

/// Speaking rate multiplier, always within `[Rate::MIN, Rate::MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct Rate(f32);

impl Rate {
    pub const MIN: f32 = 0.5;
    pub const MAX: f32 = 2.0;
    pub const NORMAL: Rate = Rate(1.0);

    /// Clamps `value` into range; non-finite input falls back to [`Rate::NORMAL`].
    pub fn new(value: f32) -> Self {
        if !value.is_finite() {
            warn!("ignoring non-finite rate {value}, using {}", Self::NORMAL.0);
            return Self::NORMAL;
        }
        let clamped = value.clamp(Self::MIN, Self::MAX);
        if clamped != value {
            warn!("rate {value} clamped to {clamped}");
        }
        Self(clamped)
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl From<f32> for Rate {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl From<Rate> for f32 {
    fn from(rate: Rate) -> Self {
        rate.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Playing => "playing",
            Phase::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// `current_index` is `None` exactly when `phase` is [`Phase::Idle`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    pub phase: Phase,
    pub current_index: Option<usize>,
    pub rate: Rate,
    pub voice: Option<VoiceCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlaybackEvent {
    Position { index: Option<usize>, phase: Phase },
    Finished,
    Failed { index: Option<usize>, message: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("cannot {command} while {phase}")]
    InvalidTransition { command: &'static str, phase: Phase },
}

pub struct PlaybackController<N: Narrator> {
    narrator: N,
    state: PlaybackState,
    sequence: Option<SentenceSequence>,
    pitch: f32,
    session: u64,
    completed_while_paused: bool,
    subscribers: Vec<Sender<PlaybackEvent>>,
}

impl<N: Narrator> PlaybackController<N> {
    pub const DEFAULT_PITCH: f32 = 1.0;

    pub fn new(narrator: N) -> Self {
        Self {
            narrator,
            state: PlaybackState::default(),
            sequence: None,
            pitch: Self::DEFAULT_PITCH,
            session: 0,
            completed_while_paused: false,
            subscribers: Vec::new(),
        }
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn subscribe(&mut self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.current_index
    }

    pub fn current_sentence(&self) -> Option<&str> {
        let index = self.state.current_index?;
        self.sequence.as_ref()?.get(index)
    }

    pub fn narrator(&self) -> &N {
        &self.narrator
    }

    pub fn narrator_mut(&mut self) -> &mut N {
        &mut self.narrator
    }

    /// Starts a new session from sentence 0, superseding any current one.
    ///
    /// An empty sequence leaves the controller idle.
    pub fn play(&mut self, sequence: SentenceSequence, voice: Option<VoiceCandidate>, rate: Rate) {
        self.flush();

        if sequence.is_empty() {
            warn!("no sentences to narrate; ignoring play");
            self.enter_idle();
            return;
        }

        info!(
            "starting narration session {} over {} sentences at rate {}",
            self.session,
            sequence.len(),
            rate.value()
        );
        self.sequence = Some(sequence);
        self.state.rate = rate;
        self.state.voice = voice;
        self.move_to(Some(0), Phase::Playing);
        self.issue(0);
    }

    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        self.require(Phase::Playing, "pause")?;
        self.narrator.pause();
        self.move_to(self.state.current_index, Phase::Paused);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), PlaybackError> {
        self.require(Phase::Paused, "resume")?;
        self.move_to(self.state.current_index, Phase::Playing);
        if std::mem::take(&mut self.completed_while_paused) {
            if let Some(index) = self.state.current_index {
                self.complete(index);
            }
        } else {
            self.narrator.resume();
        }
        Ok(())
    }

    /// Cancels all narration and returns to idle. No-op when already idle.
    pub fn stop(&mut self) {
        if self.state.phase == Phase::Idle {
            return;
        }
        info!("stopping narration session {}", self.session);
        self.flush();
        self.enter_idle();
    }

    /// Feeds a narrator notification into the state machine.
    pub fn handle_notice(&mut self, notice: &NarrationNotice) {
        match notice {
            NarrationNotice::Started(id) => {
                if self.is_active(id) {
                    debug!("sentence {} started", id.index);
                }
            }
            NarrationNotice::Finished(id) => {
                if !self.is_active(id) {
                    debug!("ignoring stale completion for {id:?}");
                    return;
                }
                if self.state.phase == Phase::Paused {
                    self.completed_while_paused = true;
                    return;
                }
                self.complete(id.index);
            }
            NarrationNotice::Failed { id, message } => {
                if self.is_active(id) {
                    self.fail(message.clone());
                } else {
                    debug!("ignoring stale failure for {id:?}: {message}");
                }
            }
            NarrationNotice::CatalogChanged => {}
        }
    }

    fn require(&self, phase: Phase, command: &'static str) -> Result<(), PlaybackError> {
        if self.state.phase == phase {
            Ok(())
        } else {
            Err(PlaybackError::InvalidTransition {
                command,
                phase: self.state.phase,
            })
        }
    }

    fn is_active(&self, id: &UtteranceId) -> bool {
        self.state.phase != Phase::Idle
            && id.session == self.session
            && self.state.current_index == Some(id.index)
    }

    fn complete(&mut self, index: usize) {
        let last = self.sequence.as_ref().and_then(SentenceSequence::last_index);
        if last.map_or(true, |last| index >= last) {
            info!("narration session {} finished", self.session);
            self.enter_idle();
            self.emit(PlaybackEvent::Finished);
            return;
        }
        let next = index + 1;
        self.move_to(Some(next), Phase::Playing);
        self.issue(next);
    }

    fn issue(&mut self, index: usize) {
        let Some(text) = self
            .sequence
            .as_ref()
            .and_then(|sequence| sequence.get(index))
            .map(str::to_string)
        else {
            return;
        };
        let request = UtteranceRequest {
            id: UtteranceId {
                session: self.session,
                index,
            },
            text,
            voice: self.state.voice.clone(),
            rate: self.state.rate,
            pitch: self.pitch,
        };
        if let Err(err) = self.narrator.speak(request) {
            self.fail(err.to_string());
        }
    }

    fn fail(&mut self, message: String) {
        error!(
            "narration failed at sentence {:?}: {message}",
            self.state.current_index
        );
        let index = self.state.current_index;
        self.flush();
        self.enter_idle();
        self.emit(PlaybackEvent::Failed { index, message });
    }

    /// Cancels every outstanding request and opens a new session id so late
    /// notices from the old one no longer match.
    fn flush(&mut self) {
        self.narrator.cancel_all();
        self.session += 1;
        self.completed_while_paused = false;
    }

    fn enter_idle(&mut self) {
        self.sequence = None;
        self.move_to(None, Phase::Idle);
    }

    fn move_to(&mut self, index: Option<usize>, phase: Phase) {
        if self.state.current_index == index && self.state.phase == phase {
            return;
        }
        self.state.current_index = index;
        self.state.phase = phase;
        self.emit(PlaybackEvent::Position { index, phase });
    }

    fn emit(&mut self, event: PlaybackEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
