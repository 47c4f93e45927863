//! Ledger snapshot file and engine config loading.
//!
//! Every invocation loads the whole ledger, applies one operation and
//! writes it back. Writes go to a temporary file in the same directory
//! which is then renamed over the old snapshot, so a crash never leaves a
//! half-written ledger behind.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hypernode_market::{Clock, EngineConfig, LedgerSnapshot, Marketplace};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::CliError;

/// Loads the engine config from a JSON file, or defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or validated.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = fs::read_to_string(path)
        .map_err(|e| CliError::Config(format!("{}: {e}", path.display())))?;
    let config: EngineConfig = serde_json::from_str(&raw)
        .map_err(|e| CliError::Config(format!("{}: {e}", path.display())))?;
    config
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;
    Ok(config)
}

/// A ledger snapshot on disk.
#[derive(Debug, Clone)]
pub struct LedgerFile {
    path: PathBuf,
}

impl LedgerFile {
    /// Creates a handle for the snapshot at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the marketplace, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, malformed or fails the
    /// ledger's invariant checks.
    pub fn load(&self, config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Marketplace, CliError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no ledger yet, starting empty");
            return Ok(Marketplace::new(config, clock)?);
        }
        let raw = fs::read_to_string(&self.path)?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&raw)
            .map_err(|e| CliError::Ledger(format!("{}: {e}", self.path.display())))?;
        debug!(
            path = %self.path.display(),
            markets = snapshot.markets.len(),
            jobs = snapshot.job_count(),
            "loaded ledger"
        );
        Ok(Marketplace::restore(snapshot, config, clock)?)
    }

    /// Writes the marketplace state atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails.
    pub fn save(&self, place: &Marketplace) -> Result<(), CliError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let snapshot = place.snapshot();

        let tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, &snapshot)
                .map_err(|e| CliError::Ledger(format!("serialize: {e}")))?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| CliError::Ledger(format!("{}: {}", self.path.display(), e.error)))?;

        debug!(path = %self.path.display(), markets = snapshot.markets.len(), "saved ledger");
        Ok(())
    }
}
