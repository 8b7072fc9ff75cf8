//! Logger setup, grounded on `src-tauri/src/log.rs`'s dual-sink
//! (`TermLogger` + `WriteLogger`) pattern. There is no separate frontend
//! process here, so only the single `backend.log` sink survives.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use simplelog::{ColorChoice, CombinedLogger, Config as LogConfig, LevelFilter, TermLogger, TerminalMode, WriteLogger};

pub fn setup_logger(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir).context("creating log directory")?;
    let log_file =
        File::create(log_dir.join("backend.log")).context("creating backend.log")?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            LogConfig::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Debug, LogConfig::default(), log_file),
    ])
    .ok();

    log::info!("lanshare core initialized");
    Ok(())
}
