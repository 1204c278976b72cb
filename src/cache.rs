//! Build-once caches for the parameter and bridge tables.
//!
//! A `TableCache` holds the two lookup tables the resolver consults. Each
//! table is parsed lazily from its source on first use and is read-only
//! afterwards; the `OnceLock` guarding it makes the cache safe to share across
//! threads by plain `&TableCache`. A missing or unreadable source degrades to
//! an empty table with a warning, never an error.
//!
//! Parsed tables can be snapshotted as CBOR so a batch run can skip the text
//! parse.

use crate::params::{BridgeTable, ParameterTable, TableError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

/// Where a table's text comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TableSource {
    /// No table; lookups always miss.
    #[default]
    Empty,
    /// In-memory text.
    Text(String),
    /// A file read on first use.
    File(PathBuf),
}

impl TableSource {
    fn read(&self) -> Result<Option<String>, TableError> {
        match self {
            TableSource::Empty => Ok(None),
            TableSource::Text(text) => Ok(Some(text.clone())),
            TableSource::File(path) => std::fs::read_to_string(path).map(Some).map_err(|e| TableError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Errors from CBOR table snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot encoding failed: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Parsed contents of both tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub params: ParameterTable,
    pub bridge: BridgeTable,
}

/// Lazily built, process-lifetime parameter and bridge tables.
#[derive(Debug, Default)]
pub struct TableCache {
    params_source: TableSource,
    bridge_source: TableSource,
    params: OnceLock<ParameterTable>,
    bridge: OnceLock<BridgeTable>,
}

impl TableCache {
    pub fn new(params: TableSource, bridge: TableSource) -> Self {
        Self {
            params_source: params,
            bridge_source: bridge,
            params: OnceLock::new(),
            bridge: OnceLock::new(),
        }
    }

    /// A cache whose lookups always miss.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A cache pre-filled with already parsed tables.
    pub fn from_tables(params: ParameterTable, bridge: BridgeTable) -> Self {
        let cache = Self::default();
        let _ = cache.params.set(params);
        let _ = cache.bridge.set(bridge);
        cache
    }

    /// The keyed parameter table, parsed on first call.
    pub fn params(&self) -> &ParameterTable {
        self.params.get_or_init(|| match self.params_source.read() {
            Ok(Some(text)) => {
                let table = ParameterTable::parse(&text);
                debug!(entries = table.len(), "parameter table loaded");
                table
            }
            Ok(None) => ParameterTable::new(),
            Err(err) => {
                warn!(%err, "parameter table unavailable, using defaults");
                ParameterTable::new()
            }
        })
    }

    /// The pattern-id bridge table, parsed on first call.
    pub fn bridge(&self) -> &BridgeTable {
        self.bridge.get_or_init(|| match self.bridge_source.read() {
            Ok(Some(text)) => {
                let table = BridgeTable::parse(&text);
                debug!(entries = table.len(), "bridge table loaded");
                table
            }
            Ok(None) => BridgeTable::new(),
            Err(err) => {
                warn!(%err, "bridge table unavailable, skipping bridge lookups");
                BridgeTable::new()
            }
        })
    }

    pub fn is_params_loaded(&self) -> bool {
        self.params.get().is_some()
    }

    pub fn is_bridge_loaded(&self) -> bool {
        self.bridge.get().is_some()
    }

    /// Forces both tables and copies them out.
    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            params: self.params().clone(),
            bridge: self.bridge().clone(),
        }
    }

    /// Serializes both tables to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(serde_cbor::to_vec(&self.snapshot())?)
    }

    /// Rebuilds a pre-filled cache from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: TableSnapshot = serde_cbor::from_slice(bytes)?;
        Ok(Self::from_tables(snapshot.params, snapshot.bridge))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), SnapshotError> {
        std::fs::write(path, self.to_cbor()?)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, SnapshotError> {
        let bytes = std::fs::read(path)?;
        Self::from_cbor(&bytes)
    }
}
