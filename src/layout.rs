//! Per-instance directory layout.
//!
//! One directory per worker instance holds the command ring, the response
//! ring, the counter slots, and one streams file per (source, target) pair.
//! The files are created and pre-sized here; mapping and deletion of their
//! contents is managed by the embedder.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::config::TcpConfig;

const COUNTER_SLOT_LEN: u64 = 8;

#[derive(Debug, Clone)]
pub struct Layout {
    dir: PathBuf,
}

impl Layout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn command_file(&self) -> PathBuf {
        self.dir.join("command")
    }

    pub fn response_file(&self) -> PathBuf {
        self.dir.join("response")
    }

    pub fn counters_file(&self) -> PathBuf {
        self.dir.join("counters")
    }

    pub fn streams_file(&self, source: &str, target: &str) -> PathBuf {
        self.dir.join("streams").join(format!("{source}#{target}"))
    }

    /// Create the directory tree and pre-size the control and counter files.
    pub fn create(&self, config: &TcpConfig) -> io::Result<()> {
        fs::create_dir_all(self.dir.join("streams"))?;
        presize(&self.command_file(), config.command_buffer_capacity as u64)?;
        presize(&self.response_file(), config.response_buffer_capacity as u64)?;
        let slots = (config.counter_values_buffer_capacity as u64 / COUNTER_SLOT_LEN)
            * COUNTER_SLOT_LEN;
        presize(&self.counters_file(), slots)?;
        Ok(())
    }

    /// Create and pre-size the streams file for one (source, target) pair.
    pub fn create_streams_file(
        &self,
        config: &TcpConfig,
        source: &str,
        target: &str,
    ) -> io::Result<PathBuf> {
        let path = self.streams_file(source, target);
        presize(&path, config.streams_buffer_capacity as u64)?;
        Ok(path)
    }
}

fn presize(path: &Path, len: u64) -> io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    if file.metadata()?.len() < len {
        file.set_len(len)?;
    }
    Ok(())
}
