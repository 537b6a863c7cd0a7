use std::{
    fs,
    io::Write,
    path::PathBuf,
    process::{Command, Stdio},
    time::Instant,
};

use log::{debug, error, warn};
use shlex::Shlex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("voice model not found at {0}")]
    VoiceNotFound(PathBuf),
    #[error("failed to spawn Piper process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Piper exited with status {status}: {stderr}")]
    Piper { status: i32, stderr: String },
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub model_path: PathBuf,
    pub output_path: PathBuf,
    pub speaker: Option<String>,
    /// Piper's duration multiplier; values below 1.0 speak faster.
    pub length_scale: Option<f32>,
}

#[derive(Debug, PartialEq)]
pub struct SynthesisOutput {
    pub output_path: PathBuf,
    pub duration_ms: u128,
    pub stderr: Option<String>,
}

/// Turns one sentence into a WAV file.
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisOutput, SynthesisError>;
}

/// Runs the Piper CLI, feeding the text on stdin.
#[derive(Debug, Clone, Default)]
pub struct PiperSynthesizer {
    command_line: Option<String>,
    runtime_dir: PathBuf,
}

impl PiperSynthesizer {
    /// Uses `READER_PIPER_COMMAND` when set, otherwise a bundled binary under
    /// `runtime_dir/piper` or `python -m piper`.
    pub fn from_env(runtime_dir: PathBuf) -> Self {
        Self {
            command_line: std::env::var("READER_PIPER_COMMAND").ok(),
            runtime_dir,
        }
    }

    pub fn with_command(command_line: impl Into<String>) -> Self {
        Self {
            command_line: Some(command_line.into()),
            runtime_dir: PathBuf::new(),
        }
    }

    fn base_command(&self) -> Result<Command, SynthesisError> {
        if let Some(raw_command) = &self.command_line {
            let mut parts: Vec<String> = Shlex::new(raw_command).collect();
            if parts.is_empty() {
                return Err(SynthesisError::Other("Piper command line is empty".into()));
            }
            let mut command = Command::new(parts.remove(0));
            command.args(parts);
            return Ok(command);
        }

        let bundled = self
            .runtime_dir
            .join("piper")
            .join(if cfg!(windows) { "piper.exe" } else { "piper" });
        if bundled.exists() {
            return Ok(Command::new(bundled));
        }

        let mut command = Command::new("python");
        command.args(["-m", "piper"]);
        Ok(command)
    }

    fn command_for(&self, request: &SynthesisRequest) -> Result<Command, SynthesisError> {
        if !request.model_path.exists() {
            return Err(SynthesisError::VoiceNotFound(request.model_path.clone()));
        }

        if let Some(parent) = request
            .output_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            fs::create_dir_all(parent).map_err(|err| {
                SynthesisError::Other(format!(
                    "Unable to create output directory {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let mut command = self.base_command()?;
        command.arg("--model");
        command.arg(&request.model_path);
        command.arg("--output_file");
        command.arg(&request.output_path);
        if let Some(speaker) = &request.speaker {
            command.arg("--speaker");
            command.arg(speaker);
        }
        if let Some(scale) = request.length_scale {
            command.arg("--length_scale");
            command.arg(format!("{scale:.3}"));
        }
        Ok(command)
    }
}

impl Synthesizer for PiperSynthesizer {
    fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisOutput, SynthesisError> {
        let start = Instant::now();
        let mut child = self
            .command_for(request)?
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        {
            let stdin = child
                .stdin
                .as_mut()
                .ok_or_else(|| SynthesisError::Other("Failed to access Piper stdin".into()))?;
            stdin
                .write_all(request.text.as_bytes())
                .map_err(|err| SynthesisError::Other(err.to_string()))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|err| SynthesisError::Other(err.to_string()))?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let status = output.status.code().unwrap_or_default();
            error!("Piper exited with status {status}: {stderr}");
            return Err(SynthesisError::Piper { status, stderr });
        }

        if !request.output_path.exists() {
            warn!(
                "Piper succeeded but {} was not created",
                request.output_path.display()
            );
        }

        let duration_ms = start.elapsed().as_millis();
        debug!(
            "synthesized {} chars in {duration_ms} ms",
            request.text.chars().count()
        );
        Ok(SynthesisOutput {
            output_path: request.output_path.clone(),
            duration_ms,
            stderr: (!stderr.is_empty()).then_some(stderr),
        })
    }
}

/// Converts a speaking rate into Piper's length scale.
pub fn length_scale_for(rate: f32) -> f32 {
    1.0 / rate
}
