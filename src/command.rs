//! Commands accepted on the reader's standard input.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Resume,
    Stop,
    Rate(f32),
    Voices,
    List,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'rate' needs a number, got '{0}'")]
    InvalidRate(String),
}

pub const HELP: &str =
    "commands: play | pause | resume | stop | rate <0.5-2.0> | voices | list | help | quit";

impl std::str::FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(CommandError::Empty)?.to_lowercase();
        let command = match name.as_str() {
            "play" | "p" => Command::Play,
            "pause" => Command::Pause,
            "resume" | "r" => Command::Resume,
            "stop" | "s" => Command::Stop,
            "rate" => {
                let raw = words.next().unwrap_or_default();
                let value = raw
                    .parse::<f32>()
                    .map_err(|_| CommandError::InvalidRate(raw.to_string()))?;
                Command::Rate(value)
            }
            "voices" => Command::Voices,
            "list" | "ls" => Command::List,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => return Err(CommandError::Unknown(name)),
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_playback_commands() {
        assert_eq!("play".parse::<Command>(), Ok(Command::Play));
        assert_eq!("  PAUSE ".parse::<Command>(), Ok(Command::Pause));
        assert_eq!("r".parse::<Command>(), Ok(Command::Resume));
        assert_eq!("stop".parse::<Command>(), Ok(Command::Stop));
        assert_eq!("quit".parse::<Command>(), Ok(Command::Quit));
    }

    #[test]
    fn parses_rate_argument() {
        assert_eq!("rate 1.5".parse::<Command>(), Ok(Command::Rate(1.5)));
        assert_eq!(
            "rate fast".parse::<Command>(),
            Err(CommandError::InvalidRate("fast".into()))
        );
        assert_eq!(
            "rate".parse::<Command>(),
            Err(CommandError::InvalidRate(String::new()))
        );
    }

    #[test]
    fn rejects_unknown_and_empty_input() {
        assert_eq!("".parse::<Command>(), Err(CommandError::Empty));
        assert_eq!(
            "dance".parse::<Command>(),
            Err(CommandError::Unknown("dance".into()))
        );
    }
}
