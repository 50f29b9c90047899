//! On-disk command history: an append-only log with numbered replay.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Append-only history file. One line per submitted command, written before
/// the command runs.
#[derive(Debug)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one command line, creating the file on first use.
    pub fn append(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("can't open history file {}", self.path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("can't append to history file {}", self.path.display()))?;
        Ok(())
    }

    /// Write every stored line to `out`, numbered from 1.
    pub fn replay(&self, out: &mut dyn Write) -> Result<()> {
        let file = File::open(&self.path)
            .with_context(|| format!("can't open history file {}", self.path.display()))?;
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.context("can't read history file")?;
            writeln!(out, "{}. {}", index + 1, line)?;
        }
        Ok(())
    }
}
