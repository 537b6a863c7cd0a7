use std::path::PathBuf;

use flexi_logger::{Age, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming};
use once_cell::sync::OnceCell;

static LOGGER: OnceCell<()> = OnceCell::new();

/// Starts file logging with rotation; later calls are no-ops.
///
/// The level comes from `RUST_LOG`, defaulting to `info`.
pub fn init() -> anyhow::Result<()> {
    LOGGER.get_or_try_init(|| -> anyhow::Result<()> {
        let log_dir = log_dir();
        std::fs::create_dir_all(&log_dir)?;
        Logger::try_with_env_or_str("info")?
            .log_to_file(
                FileSpec::default()
                    .directory(&log_dir)
                    .basename("reader")
                    .suffix("log")
                    .suppress_timestamp(),
            )
            .rotate(
                Criterion::AgeOrSize(Age::Day, 5_000_000),
                Naming::Numbers,
                Cleanup::KeepLogFiles(5),
            )
            .duplicate_to_stderr(Duplicate::Warn)
            .start()?;
        Ok(())
    })?;
    Ok(())
}

pub fn log_dir() -> PathBuf {
    std::env::var_os("READER_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn creates_log_directory_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let logs = temp_dir.path().join("logs");
        std::env::set_var("READER_LOG_DIR", &logs);
        init().unwrap();
        init().unwrap();
        std::env::remove_var("READER_LOG_DIR");
        assert!(logs.exists());
    }
}
