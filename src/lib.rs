//! sigilwire: compile natural-language patterns into wiring diagrams and
//! classify the diagrams as elementary cellular-automaton rules.
//!
//! The crate has two halves that meet at [`WiringDiagram`]:
//!
//! - **Compilation.** A [`Pattern`] (IF / HOWEVER / THEN / BECAUSE clauses)
//!   gets its parameters from the [`ParameterResolver`] (inline values, the
//!   keyed table, the bridged table, then defaults), and the
//!   [`WiringCompiler`] turns pattern plus parameters into a typed DAG of
//!   sensors, gates and mixers.
//! - **Analysis.** The [`Analyzer`] evaluates a diagram on all eight
//!   `(L, C, R)` neighbourhoods, derives the Wolfram rule number, checks
//!   linearity over GF(2), surjectivity and sensitivity, assigns a class
//!   I-IV, and double-checks the table against a symbolic rendering of the
//!   circuit through an [`EquivalenceProver`].
//!
//! # Name Origin: "sigil"
//!
//! Each cell of the automaton carries an 8-bit sigil. A wiring diagram is the
//! local update rule for one sigil given its two neighbours, so the same
//! diagram can be read as a circuit or as a one-dimensional cellular automaton.
//!
//! # References
//! - Rule numbering: Wolfram, "Statistical mechanics of cellular automata",
//!   Rev. Mod. Phys. 55 (1983)
//! - Classes I-IV: Wolfram, "Universality and complexity in cellular automata",
//!   Physica D 10 (1984)
//!
//! # Example
//!
//! ```
//! use sigilwire::prelude::*;
//!
//! let diagram = synthesize_rule(110).unwrap();
//! let result = Analyzer::new(EvalMode::Strict).analyze(&diagram).unwrap();
//! assert_eq!(result.wolfram_rule, 110);
//! assert_eq!(result.structural_class, StructuralClass::IV);
//! assert!(!result.is_linear);
//! ```

pub mod algebra;
pub mod analysis;
pub mod arena;
pub mod batch;
pub mod cache;
pub mod compiler;
pub mod component;
pub mod config;
pub mod diagram;
pub mod eval;
pub mod fingerprint;
pub mod params;
pub mod pattern;
pub mod prover;
pub mod resolver;

pub use analysis::{AnalysisResult, Analyzer, StructuralClass, TruthTable};
pub use compiler::{CompilerOptions, WiringCompiler};
pub use component::{Component, Literal, Port};
pub use diagram::{DiagramBuilder, DiagramMeta, StructuralError, WiringDiagram};
pub use eval::{EvalError, EvalMode, Neighborhood};
pub use params::{ExoCode, MixMode, ParameterRecord, Provenance};
pub use pattern::{Pattern, PatternLibrary};
pub use prover::{EquivalenceProver, ExhaustiveProver, Verification};
pub use resolver::{ParameterResolver, Resolution};

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::algebra::{BoolAlgebra, Concrete, TermArena, TermId};
    pub use crate::analysis::{
        check_linearity, check_surjectivity, classify, compute_sensitivity, rule_number_to_truth_table,
        synthesize_rule, truth_table_to_rule_number, AnalysisResult, Analyzer, StructuralClass, TruthTable,
    };
    pub use crate::arena::NodeIdx;
    pub use crate::batch::{write_all, BatchDriver, BatchError, BatchStats, Compiled};
    pub use crate::cache::{TableCache, TableSource};
    pub use crate::compiler::{CompilerOptions, WiringCompiler};
    pub use crate::component::{Component, Literal, Port, ValueType};
    pub use crate::config::Config;
    pub use crate::diagram::{DiagramBuilder, DiagramMeta, DocumentError, StructuralError, WiringDiagram};
    pub use crate::eval::{evaluate, evaluate_concrete, EvalError, EvalMode, Neighborhood};
    pub use crate::fingerprint::{Canonicalizable, HashValue};
    pub use crate::params::{
        BridgeTable, ExoCode, MixMode, ParameterOverrides, ParameterRecord, ParameterTable, Preservation, Provenance,
    };
    pub use crate::pattern::{Clause, Pattern, PatternLibrary};
    pub use crate::prover::{EquivalenceProver, ExhaustiveProver, NullProver, SymbolicCircuit, Verification};
    pub use crate::resolver::{ParameterResolver, Resolution};
}
