//! Batch compilation and analysis over a pattern library.
//!
//! Patterns are independent, so the batch fans out with rayon. Each pattern
//! gets its own `Result`: a structural failure in one pattern is reported and
//! the rest of the batch continues.

use crate::analysis::{AnalysisResult, Analyzer, StructuralClass};
use crate::cache::TableCache;
use crate::compiler::WiringCompiler;
use crate::diagram::{DocumentError, StructuralError, WiringDiagram};
use crate::eval::EvalError;
use crate::fingerprint::{Canonicalizable, HashValue, DOMAIN_PARAMS_V0};
use crate::params::Provenance;
use crate::pattern::PatternLibrary;
use crate::resolver::{ParameterResolver, Resolution};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("pattern `{0}` is not in the library")]
    UnknownPattern(String),
    #[error("pattern `{id}`: {source}")]
    Structural {
        id: String,
        #[source]
        source: StructuralError,
    },
    #[error("writing `{}`: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },
}

/// One successfully compiled pattern.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub diagram: WiringDiagram,
    pub resolution: Resolution,
    /// Present when the driver has an analyzer.
    pub analysis: Option<Result<AnalysisResult, EvalError>>,
}

/// Per-pattern outcome of a batch, in library order.
pub type BatchResults = Vec<(String, Result<Compiled, BatchError>)>;

/// File name for a compiled diagram: `/` becomes `__`.
pub fn output_file_name(id: &str) -> String {
    format!("{}.json", id.replace('/', "__"))
}

/// Compiles (and optionally analyses) patterns from one library.
pub struct BatchDriver<'a> {
    library: &'a PatternLibrary,
    cache: &'a TableCache,
    compiler: WiringCompiler,
    analyzer: Option<&'a Analyzer>,
}

impl<'a> BatchDriver<'a> {
    pub fn new(library: &'a PatternLibrary, cache: &'a TableCache, compiler: WiringCompiler) -> Self {
        Self {
            library,
            cache,
            compiler,
            analyzer: None,
        }
    }

    pub fn with_analyzer(mut self, analyzer: &'a Analyzer) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn compile_one(&self, id: &str) -> Result<Compiled, BatchError> {
        let mut pattern = self
            .library
            .get(id)
            .cloned()
            .ok_or_else(|| BatchError::UnknownPattern(id.to_string()))?;
        let resolution = ParameterResolver::new(self.cache).resolve(&mut pattern);
        let diagram = self
            .compiler
            .compile(&pattern, &resolution)
            .map_err(|source| BatchError::Structural {
                id: id.to_string(),
                source,
            })?;
        let analysis = self.analyzer.map(|a| a.analyze(&diagram));
        if let Some(Err(err)) = &analysis {
            warn!(pattern = id, %err, "analysis failed");
        }
        Ok(Compiled {
            diagram,
            resolution,
            analysis,
        })
    }

    /// Compiles every pattern in parallel.
    pub fn compile_all(&self) -> BatchResults {
        let ids: Vec<&str> = self.library.ids().collect();
        let results: BatchResults = ids
            .par_iter()
            .map(|&id| (id.to_string(), self.compile_one(id)))
            .collect();
        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        info!(total = results.len(), failed, "batch compiled");
        results
    }
}

/// Writes each compiled diagram to `<dir>/<output_file_name(id)>`.
///
/// Failed compilations are skipped; write failures are returned per pattern.
pub fn write_all(results: &BatchResults, dir: &Path) -> Vec<Result<PathBuf, BatchError>> {
    results
        .par_iter()
        .filter_map(|(id, r)| r.as_ref().ok().map(|c| (id, c)))
        .map(|(id, compiled)| {
            let path = dir.join(output_file_name(id));
            compiled
                .diagram
                .save_json(&path)
                .map(|()| path.clone())
                .map_err(|source| BatchError::Write { path, source })
        })
        .collect()
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub compiled: usize,
    pub failed: usize,
    pub by_provenance: BTreeMap<Provenance, usize>,
    pub by_mix_mode: BTreeMap<String, usize>,
    pub by_class: BTreeMap<StructuralClass, usize>,
    pub analysis_failures: usize,
    pub distinct_parameter_records: usize,
}

impl BatchStats {
    pub fn collect(results: &BatchResults) -> Self {
        let mut stats = BatchStats {
            total: results.len(),
            ..Self::default()
        };
        let mut records: BTreeSet<HashValue> = BTreeSet::new();
        for (_, result) in results {
            let Ok(c) = result else {
                stats.failed += 1;
                continue;
            };
            stats.compiled += 1;
            *stats.by_provenance.entry(c.resolution.provenance).or_default() += 1;
            *stats
                .by_mix_mode
                .entry(c.resolution.params.mix_mode.name().to_string())
                .or_default() += 1;
            records.insert(c.resolution.params.fingerprint_in(DOMAIN_PARAMS_V0));
            match &c.analysis {
                Some(Ok(a)) => *stats.by_class.entry(a.structural_class).or_default() += 1,
                Some(Err(_)) => stats.analysis_failures += 1,
                None => {}
            }
        }
        stats.distinct_parameter_records = records.len();
        stats
    }
}

impl fmt::Display for BatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "patterns: {} ({} compiled, {} failed)", self.total, self.compiled, self.failed)?;
        writeln!(f, "distinct parameter records: {}", self.distinct_parameter_records)?;
        writeln!(f, "by provenance:")?;
        for (p, n) in &self.by_provenance {
            writeln!(f, "  {:<15} {n}", p.name())?;
        }
        writeln!(f, "by mix-mode:")?;
        for (m, n) in &self.by_mix_mode {
            writeln!(f, "  {m:<15} {n}")?;
        }
        if !self.by_class.is_empty() || self.analysis_failures > 0 {
            writeln!(f, "by class:")?;
            for (c, n) in &self.by_class {
                writeln!(f, "  {:<15} {n}", c.to_string())?;
            }
            writeln!(f, "  {:<15} {}", "not analysable", self.analysis_failures)?;
        }
        Ok(())
    }
}
