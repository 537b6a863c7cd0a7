use std::{
    io::{self, BufRead},
    path::PathBuf,
    sync::{mpsc, Arc},
    thread,
};

use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use reader_core::{
    command::{Command, HELP},
    config::{runtime_dir, ConfigError, ReaderConfig},
    narration::{self, PiperNarrator, PiperSynthesizer},
    open_document,
    playback::{NarrationNotice, Narrator},
    util::logging,
    voices::{VoiceCandidate, VoiceLibrary},
    Phase, PlaybackEvent, Rate, Reader, SentenceSequence,
};
use serde::Serialize;

/// Reads a document aloud, one sentence at a time, driven by commands on stdin.
#[derive(Parser, Debug)]
#[command(name = "reader", version)]
struct Args {
    /// Document to read: a PDF or a plain text file (pages split on form feeds)
    #[arg(value_name = "DOCUMENT")]
    document: PathBuf,

    /// Configuration file [default: <runtime>/reader.json]
    #[arg(short, long, env = "READER_CONFIG")]
    config: Option<PathBuf>,

    /// Speech rate for narration, clamped to 0.5-2.0
    #[arg(short, long)]
    rate: Option<f32>,

    /// Print sentences, voices and playback events as JSON lines
    #[arg(long)]
    json: bool,
}

impl Args {
    fn load_config(&self) -> Result<ReaderConfig, ConfigError> {
        let mut config = ReaderConfig::load(self.config.as_deref())?;
        if let Some(rate) = self.rate {
            config.rate = Rate::new(rate);
        }
        Ok(config)
    }
}

enum Input {
    Line(String),
    Notice(NarrationNotice),
    Eof,
}

struct Printer {
    json: bool,
}

impl Printer {
    fn emit_json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string(value) {
            Ok(line) => println!("{line}"),
            Err(err) => error!("failed to encode output: {err}"),
        }
    }

    fn sentences(&self, sentences: &SentenceSequence) {
        if self.json {
            self.emit_json(&serde_json::json!({ "sentences": sentences }));
            return;
        }
        for (index, sentence) in sentences.iter().enumerate() {
            println!("[{index}] {sentence}");
        }
    }

    fn voices(&self, voices: &[VoiceCandidate], selected: Option<&VoiceCandidate>) {
        let selected = selected.map(|voice| voice.id.as_str());
        if self.json {
            self.emit_json(&serde_json::json!({ "selected": selected, "voices": voices }));
            return;
        }
        for voice in voices {
            let marker = if selected == Some(voice.id.as_str()) {
                '*'
            } else {
                ' '
            };
            println!(
                "{marker} {} ({})",
                voice.name,
                voice.language.as_deref().unwrap_or("?")
            );
        }
    }

    fn event(&self, sentences: &SentenceSequence, event: &PlaybackEvent) {
        if self.json {
            self.emit_json(event);
            return;
        }
        match event {
            PlaybackEvent::Position {
                index: Some(index),
                phase: Phase::Playing,
            } => println!(
                "> [{index}] {}",
                sentences.get(*index).unwrap_or_default()
            ),
            PlaybackEvent::Position {
                index: Some(index),
                phase,
            } => println!("  {phase} at [{index}]"),
            PlaybackEvent::Position { index: None, .. } => println!("  stopped"),
            PlaybackEvent::Finished => println!("  finished"),
            PlaybackEvent::Failed { index, message } => {
                eprintln!("narration failed at {index:?}: {message}")
            }
        }
    }
}

/// Applies one command line; returns `false` when the reader should exit.
fn dispatch<N: Narrator>(reader: &mut Reader<N>, printer: &Printer, line: &str) -> bool {
    let command = match line.parse::<Command>() {
        Ok(command) => command,
        Err(err) => {
            eprintln!("{err}");
            return true;
        }
    };
    match command {
        Command::Play => reader.play(),
        Command::Pause => {
            if let Err(err) = reader.pause() {
                eprintln!("{err}");
            }
        }
        Command::Resume => {
            if let Err(err) = reader.resume() {
                eprintln!("{err}");
            }
        }
        Command::Stop => reader.stop(),
        Command::Rate(value) => {
            let rate = reader.set_rate(value);
            if !printer.json {
                println!("rate {} (applies on next play)", rate.value());
            }
        }
        Command::Voices => printer.voices(&reader.narrator().voices(), reader.voice()),
        Command::List => printer.sentences(reader.sentences()),
        Command::Help => println!("{HELP}"),
        Command::Quit => return false,
    }
    true
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = args
        .load_config()
        .context("failed to load configuration")?;
    let printer = Printer { json: args.json };
    info!("Starting reader for {}", args.document.display());

    let (input_tx, input_rx) = mpsc::channel();
    let (notice_tx, notice_rx) = mpsc::channel();

    let output = narration::default_output().context("no audio output available")?;
    let mut narrator = PiperNarrator::new(
        VoiceLibrary::new(config.voices_dir()),
        Arc::new(PiperSynthesizer::from_env(runtime_dir())),
        output,
        config.output_dir(),
        notice_tx,
    );
    narrator.refresh_voices();
    let mut reader = Reader::new(narrator, &config);
    let events = reader.subscribe();

    let mut source = open_document(&args.document)?;
    let report = reader
        .load(source.as_mut())
        .with_context(|| format!("failed to read {}", args.document.display()))?;
    if report.sentences.is_empty() {
        warn!("nothing to read in {}", args.document.display());
    }
    if !printer.json {
        println!(
            "{} sentences from {} pages",
            report.sentences.len(),
            report.pages_read
        );
    }
    printer.sentences(&report.sentences);

    let notices = input_tx.clone();
    thread::spawn(move || {
        for notice in notice_rx {
            if notices.send(Input::Notice(notice)).is_err() {
                break;
            }
        }
    });
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if input_tx.send(Input::Line(line)).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    error!("failed to read stdin: {err}");
                    break;
                }
            }
        }
        let _ = input_tx.send(Input::Eof);
    });

    if !printer.json {
        println!("{HELP}");
    }
    for input in input_rx {
        match input {
            Input::Line(line) if line.trim().is_empty() => {}
            Input::Line(line) => {
                if !dispatch(&mut reader, &printer, &line) {
                    break;
                }
            }
            Input::Notice(notice) => reader.handle_notice(notice),
            Input::Eof => break,
        }
        for event in events.try_iter() {
            printer.event(reader.sentences(), &event);
        }
    }

    reader.stop();
    info!("Reader shut down");
    Ok(())
}

/// One-line rendering of an error and its causes.
fn failure_line(err: &anyhow::Error) -> String {
    format!("{err:#}")
}

fn main() {
    let args = Args::parse();
    if let Err(err) = logging::init() {
        eprintln!("error: failed to initialise logging: {err:#}");
        std::process::exit(1);
    }
    // The logger duplicates errors to stderr.
    if let Err(err) = run(args) {
        error!("{}", failure_line(&err));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use clap::error::ErrorKind;

    #[test]
    fn help_and_version_are_not_documents() {
        let help = Args::try_parse_from(["reader", "--help"]).unwrap_err();
        assert_eq!(help.kind(), ErrorKind::DisplayHelp);
        let version = Args::try_parse_from(["reader", "--version"]).unwrap_err();
        assert_eq!(version.kind(), ErrorKind::DisplayVersion);
        let missing = Args::try_parse_from(["reader"]).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn flags_map_onto_the_configuration() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("reader.json");
        file.write_str(r#"{"rate": 1.2, "skip_first_page": false}"#)
            .unwrap();
        let config_path = file.path().to_str().unwrap();

        let args = Args::try_parse_from([
            "reader",
            "paper.pdf",
            "--config",
            config_path,
            "--rate",
            "4",
            "--json",
        ])
        .unwrap();
        assert_eq!(args.document, PathBuf::from("paper.pdf"));
        assert!(args.json);
        let config = args.load_config().unwrap();
        assert_eq!(config.rate.value(), Rate::MAX);
        assert!(!config.skip_first_page);

        let args = Args::try_parse_from(["reader", "notes.txt", "-c", config_path]).unwrap();
        assert!(!args.json);
        assert_eq!(args.load_config().unwrap().rate.value(), 1.2);
    }

    #[test]
    fn failures_render_on_a_single_line() {
        let err = anyhow::anyhow!("document not found: notes.txt")
            .context("failed to read notes.txt");
        assert_eq!(
            failure_line(&err),
            "failed to read notes.txt: document not found: notes.txt"
        );
    }
}
