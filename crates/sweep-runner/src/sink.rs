//! Destinations for per-point results.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use sweep_core::RunResult;

/// Receives each result as soon as its point finishes.
pub trait ResultSink: Send {
    fn write(&mut self, result: &RunResult) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Appends one JSON object per line.
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .with_context(|| format!("Failed to create results file: {path:?}"))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }
}

impl ResultSink for JsonlSink {
    fn write(&mut self, result: &RunResult) -> Result<()> {
        serde_json::to_writer(&mut self.writer, result)?;
        self.writer.write_all(b"\n")?;
        // Every finished point must be on disk before the next one starts.
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush results file: {:?}", self.path))
    }
}

/// Keeps results in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    results: Arc<Mutex<Vec<RunResult>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<RunResult> {
        self.results
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl ResultSink for MemorySink {
    fn write(&mut self, result: &RunResult) -> Result<()> {
        self.results
            .lock()
            .map_err(|_| anyhow::anyhow!("result buffer poisoned"))?
            .push(result.clone());
        Ok(())
    }
}
