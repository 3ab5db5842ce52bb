//! Logger bootstrap.
//!
//! # Invariants
//! - Initialization happens at most once per process; later calls are no-ops.
//! - Without a log directory output goes to stderr, otherwise to rotating
//!   files in that directory.

use anyhow::{anyhow, Context, Result};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::info;
use once_cell::sync::OnceCell;
use std::path::Path;

const LOG_FILE_BASENAME: &str = "roster";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;

static LOGGER: OnceCell<LoggerHandle> = OnceCell::new();

/// Accepted level names, lowest to highest verbosity
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

pub fn normalize_level(level: &str) -> Result<&'static str> {
    let wanted = level.trim().to_lowercase();
    LOG_LEVELS
        .iter()
        .copied()
        .find(|candidate| *candidate == wanted)
        .ok_or_else(|| anyhow!("unsupported log level `{}`", level))
}

/// Start logging at `level`, to stderr or to `log_dir`
pub fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<()> {
    let level = normalize_level(level)?;

    if LOGGER.get().is_some() {
        return Ok(());
    }

    LOGGER.get_or_try_init(|| -> Result<LoggerHandle> {
        let logger = Logger::try_with_str(level).context("invalid log specification")?;

        let handle = match log_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create log directory {}", dir.display()))?;
                logger
                    .log_to_file(
                        FileSpec::default()
                            .directory(dir)
                            .basename(LOG_FILE_BASENAME),
                    )
                    .rotate(
                        Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                        Naming::Numbers,
                        Cleanup::KeepLogFiles(MAX_LOG_FILES),
                    )
                    .write_mode(WriteMode::BufferAndFlush)
                    .start()
            }
            None => logger.log_to_stderr().start(),
        }
        .context("failed to start logger")?;

        Ok(handle)
    })?;

    info!("Logging initialized at level {}", level);
    Ok(())
}
