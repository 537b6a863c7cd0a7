use std::{
    path::Path,
    process::{Child, Command, Stdio},
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::Duration,
};

use log::warn;
use parking_lot::Mutex;
use shlex::Shlex;
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(40);

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("could not open audio file: {0}")]
    Io(String),
    #[error("audio file is corrupt: {0}")]
    Decode(String),
    #[error("no playback device found")]
    Device,
    #[error("audio player failed: {0}")]
    Player(String),
}

/// Identifies one started clip so only its own waiter observes how it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipId(pub u64);

#[derive(Debug, Default)]
struct ClipCounter(AtomicU64);

impl ClipCounter {
    fn next(&self) -> ClipId {
        ClipId(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Plays one clip at a time. All methods may be called from any thread.
pub trait AudioOutput: Send + Sync {
    /// Starts playing `path`, replacing whatever was playing.
    fn start(&self, path: &Path) -> Result<ClipId, AudioError>;
    /// Blocks until `clip` ends, is stopped or is replaced by a newer clip.
    fn wait(&self, clip: ClipId) -> Result<(), AudioError>;
    fn pause(&self);
    fn resume(&self);
    fn stop(&self);
}

/// Hands each clip to an external player process (`aplay`, `afplay`, ...).
///
/// Pausing is not supported; the clip keeps playing.
pub struct CommandOutput {
    program: String,
    args: Vec<String>,
    clips: ClipCounter,
    current: Mutex<Option<(ClipId, Child)>>,
}

impl CommandOutput {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            clips: ClipCounter::default(),
            current: Mutex::new(None),
        }
    }

    /// Reads `READER_PLAYER_COMMAND`, defaulting to the platform's stock player.
    pub fn from_env() -> Result<Self, AudioError> {
        let raw = std::env::var("READER_PLAYER_COMMAND")
            .ok()
            .or_else(|| default_player().map(str::to_string))
            .ok_or(AudioError::Device)?;
        Self::from_command_line(&raw)
    }

    pub fn from_command_line(raw: &str) -> Result<Self, AudioError> {
        let mut parts: Vec<String> = Shlex::new(raw).collect();
        if parts.is_empty() {
            return Err(AudioError::Player("player command line is empty".into()));
        }
        let program = parts.remove(0);
        Ok(Self::new(program, parts))
    }
}

fn default_player() -> Option<&'static str> {
    if cfg!(target_os = "macos") {
        Some("afplay")
    } else if cfg!(target_os = "linux") {
        Some("aplay -q")
    } else {
        None
    }
}

impl AudioOutput for CommandOutput {
    fn start(&self, path: &Path) -> Result<ClipId, AudioError> {
        self.stop();
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| AudioError::Player(format!("{}: {err}", self.program)))?;
        let clip = self.clips.next();
        *self.current.lock() = Some((clip, child));
        Ok(clip)
    }

    fn wait(&self, clip: ClipId) -> Result<(), AudioError> {
        loop {
            {
                let mut slot = self.current.lock();
                let child = match slot.as_mut() {
                    Some((current, child)) if *current == clip => child,
                    _ => return Ok(()),
                };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        *slot = None;
                        return if status.success() {
                            Ok(())
                        } else {
                            Err(AudioError::Player(format!(
                                "{} exited with {status}",
                                self.program
                            )))
                        };
                    }
                    Ok(None) => {}
                    Err(err) => {
                        *slot = None;
                        return Err(AudioError::Player(err.to_string()));
                    }
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn pause(&self) {
        warn!("{} cannot pause; the clip keeps playing", self.program);
    }

    fn resume(&self) {}

    fn stop(&self) {
        if let Some((_, mut child)) = self.current.lock().take() {
            if let Err(err) = child.kill() {
                warn!("failed to stop {}: {err}", self.program);
            }
            let _ = child.wait();
        }
    }
}

#[cfg(feature = "playback")]
pub use rodio_output::RodioOutput;

#[cfg(feature = "playback")]
mod rodio_output {
    use std::{fs::File, io::BufReader, path::Path, sync::mpsc, sync::Arc, thread};

    use parking_lot::Mutex;
    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

    use super::{AudioError, AudioOutput, ClipCounter, ClipId};

    /// In-process playback through the default output device.
    pub struct RodioOutput {
        handle: OutputStreamHandle,
        clips: ClipCounter,
        sink: Mutex<Option<(ClipId, Arc<Sink>)>>,
        // Dropping the sender lets the stream thread exit.
        _stream_guard: mpsc::Sender<()>,
    }

    impl RodioOutput {
        pub fn new() -> Result<Self, AudioError> {
            let (ready_tx, ready_rx) = mpsc::channel();
            let (guard_tx, guard_rx) = mpsc::channel::<()>();
            thread::Builder::new()
                .name("audio-stream".into())
                .spawn(move || match OutputStream::try_default() {
                    Ok((_stream, handle)) => {
                        let _ = ready_tx.send(Some(handle));
                        let _ = guard_rx.recv();
                    }
                    Err(err) => {
                        log::error!("failed to open output stream: {err}");
                        let _ = ready_tx.send(None);
                    }
                })
                .map_err(|err| AudioError::Io(err.to_string()))?;

            let handle = ready_rx
                .recv()
                .ok()
                .flatten()
                .ok_or(AudioError::Device)?;
            Ok(Self {
                handle,
                clips: ClipCounter::default(),
                sink: Mutex::new(None),
                _stream_guard: guard_tx,
            })
        }
    }

    impl AudioOutput for RodioOutput {
        fn start(&self, path: &Path) -> Result<ClipId, AudioError> {
            self.stop();
            let file = File::open(path).map_err(|err| AudioError::Io(err.to_string()))?;
            let decoder = Decoder::new(BufReader::new(file))
                .map_err(|err| AudioError::Decode(err.to_string()))?;
            let sink = Sink::try_new(&self.handle).map_err(|_| AudioError::Device)?;
            sink.append(decoder);
            sink.play();
            let clip = self.clips.next();
            *self.sink.lock() = Some((clip, Arc::new(sink)));
            Ok(clip)
        }

        fn wait(&self, clip: ClipId) -> Result<(), AudioError> {
            let sink = match self.sink.lock().as_ref() {
                Some((current, sink)) if *current == clip => Arc::clone(sink),
                _ => return Ok(()),
            };
            sink.sleep_until_end();
            Ok(())
        }

        fn pause(&self) {
            if let Some((_, sink)) = self.sink.lock().as_ref() {
                sink.pause();
            }
        }

        fn resume(&self) {
            if let Some((_, sink)) = self.sink.lock().as_ref() {
                sink.play();
            }
        }

        fn stop(&self) {
            if let Some((_, sink)) = self.sink.lock().take() {
                sink.stop();
            }
        }
    }
}
