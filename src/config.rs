//! Run configuration shared by the binary and the batch driver.
//!
//! Loaded from an optional JSON file; every field has a default, so `{}` is a
//! valid configuration. Command-line flags override file values.

use crate::analysis::Analyzer;
use crate::batch::BatchDriver;
use crate::cache::{TableCache, TableSource};
use crate::compiler::{CompilerOptions, WiringCompiler};
use crate::eval::EvalMode;
use crate::pattern::PatternLibrary;
use crate::prover::ExhaustiveProver;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Flexiarg pattern library.
    pub library: Option<PathBuf>,
    /// Keyed parameter table (TSV).
    pub param_table: Option<PathBuf>,
    /// Pattern-id bridge table (TSV).
    pub bridge_table: Option<PathBuf>,
    /// Deadline for each proof query.
    pub verify_timeout_ms: u64,
    pub eval_mode: EvalMode,
    /// Analyse diagrams during batch compilation.
    pub analyze: bool,
    pub compiler: CompilerOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: None,
            param_table: None,
            bridge_table: None,
            verify_timeout_ms: 5000,
            eval_mode: EvalMode::Lifted,
            analyze: true,
            compiler: CompilerOptions::default(),
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    /// Lazily loaded tables for the configured paths.
    pub fn table_cache(&self) -> TableCache {
        let source = |p: &Option<PathBuf>| p.clone().map_or(TableSource::Empty, TableSource::File);
        TableCache::new(source(&self.param_table), source(&self.bridge_table))
    }

    pub fn compiler(&self) -> WiringCompiler {
        WiringCompiler::new(self.compiler)
    }

    pub fn analyzer(&self) -> Analyzer {
        Analyzer::with_prover(self.eval_mode, Box::new(ExhaustiveProver::new(self.verify_timeout())))
    }

    /// Batch driver for `library`; attaches `analyzer` only when `analyze` is set.
    pub fn batch_driver<'a>(
        &self,
        library: &'a PatternLibrary,
        cache: &'a TableCache,
        analyzer: &'a Analyzer,
    ) -> BatchDriver<'a> {
        let driver = BatchDriver::new(library, cache, self.compiler());
        if self.analyze {
            driver.with_analyzer(analyzer)
        } else {
            driver
        }
    }
}
