//! Structural analysis of three-input Boolean circuits.
//!
//! The analyzer sweeps a diagram over all eight neighborhoods to obtain an
//! exact truth table and derives everything else from it: the Wolfram rule
//! number, GF(2) linearity, surjectivity, the sensitivity profile and a
//! four-way structural classification. A symbolic re-evaluation is checked
//! against the table by an [`EquivalenceProver`].
//!
//! Truth tables use the Wolfram ordering: index 0 is neighborhood `111`,
//! index 7 is `000`, and the rule number is `Σ tt[i] · 2^(7-i)`.
//!
//! # Citations
//! - Additive rules: Martin, Odlyzko & Wolfram, "Algebraic properties of
//!   cellular automata", Commun. Math. Phys. 93 (1984)
//! - Surjective maps: Hedlund, "Endomorphisms and automorphisms of the shift
//!   dynamical system", Math. Systems Theory 3 (1969)
//! - Rule 110: Cook, "Universality in elementary cellular automata",
//!   Complex Systems 15 (2004)

use crate::component::{Component, Port};
use crate::diagram::{DiagramBuilder, DiagramMeta, StructuralError, WiringDiagram};
use crate::eval::{check_supported, evaluate_concrete, EvalError, EvalMode, Neighborhood};
use crate::prover::{EquivalenceProver, ExhaustiveProver, SymbolicCircuit, Verification};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, warn};

/// Eight circuit outputs in Wolfram order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct TruthTable([bool; 8]);

impl TruthTable {
    pub fn new(entries: [bool; 8]) -> Self {
        Self(entries)
    }

    pub fn from_rule(rule: u8) -> Self {
        let mut entries = [false; 8];
        for (i, e) in entries.iter_mut().enumerate() {
            *e = rule >> (7 - i) & 1 == 1;
        }
        Self(entries)
    }

    pub fn rule_number(&self) -> u8 {
        self.0
            .iter()
            .fold(0u8, |acc, &bit| acc << 1 | bit as u8)
    }

    /// Builds the table by concrete evaluation at every neighborhood.
    pub fn from_diagram(diagram: &WiringDiagram, mode: EvalMode) -> Result<Self, EvalError> {
        let mut entries = [false; 8];
        for n in 0..8u8 {
            entries[7 - n as usize] = evaluate_concrete(diagram, Neighborhood::from_index(n), mode)?;
        }
        Ok(Self(entries))
    }

    pub fn entries(&self) -> [bool; 8] {
        self.0
    }

    /// Output at neighborhood `(l, c, r)`.
    pub fn f(&self, l: bool, c: bool, r: bool) -> bool {
        self.eval(Neighborhood::new(l, c, r))
    }

    pub fn eval(&self, at: Neighborhood<bool>) -> bool {
        self.0[7 - at.index() as usize]
    }

    pub fn ones(&self) -> usize {
        self.0.iter().filter(|&&b| b).count()
    }
}

impl fmt::Display for TruthTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            f.write_str(if b { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl From<TruthTable> for Vec<u8> {
    fn from(t: TruthTable) -> Vec<u8> {
        t.0.iter().map(|&b| b as u8).collect()
    }
}

impl TryFrom<Vec<u8>> for TruthTable {
    type Error = String;

    fn try_from(v: Vec<u8>) -> Result<Self, String> {
        if v.len() != 8 {
            return Err(format!("truth table needs 8 entries, found {}", v.len()));
        }
        let mut entries = [false; 8];
        for (e, &x) in entries.iter_mut().zip(&v) {
            *e = match x {
                0 => false,
                1 => true,
                other => return Err(format!("truth table entry {other} is not 0 or 1")),
            };
        }
        Ok(Self(entries))
    }
}

pub fn rule_number_to_truth_table(rule: u8) -> TruthTable {
    TruthTable::from_rule(rule)
}

pub fn truth_table_to_rule_number(table: &TruthTable) -> u8 {
    table.rule_number()
}

fn bits(n: u8) -> String {
    format!("{}{}{}", n >> 2 & 1, n >> 1 & 1, n & 1)
}

/// Outcome of the GF(2) linearity test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linearity {
    pub linear: bool,
    pub detail: String,
}

/// Checks `f(a XOR b) = f(a) XOR f(b)` over all 64 ordered pairs.
///
/// Stops at the first counterexample and describes it.
pub fn check_linearity(table: &TruthTable) -> Linearity {
    let f = |n: u8| table.eval(Neighborhood::from_index(n)) as u8;
    for a in 0..8u8 {
        for b in 0..8u8 {
            let sum = f(a ^ b);
            let (fa, fb) = (f(a), f(b));
            if sum != fa ^ fb {
                return Linearity {
                    linear: false,
                    detail: format!(
                        "f({} XOR {}) = f({}) = {}, but f({}) XOR f({}) = {} XOR {} = {} -- nonlinear",
                        bits(a),
                        bits(b),
                        bits(a ^ b),
                        sum,
                        bits(a),
                        bits(b),
                        fa,
                        fb,
                        fa ^ fb
                    ),
                };
            }
        }
    }
    Linearity {
        linear: true,
        detail: "All f(a XOR b) = f(a) XOR f(b) checks passed -- linear/affine over GF(2)".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surjectivity {
    pub surjective: bool,
    pub detail: String,
}

pub fn check_surjectivity(table: &TruthTable) -> Surjectivity {
    match table.ones() {
        0 => Surjectivity {
            surjective: false,
            detail: "Output is constant 0 -- not surjective".to_string(),
        },
        8 => Surjectivity {
            surjective: false,
            detail: "Output is constant 1 -- not surjective".to_string(),
        },
        ones => Surjectivity {
            surjective: true,
            detail: format!("Output has {} ones and {} zeros -- surjective", ones, 8 - ones),
        },
    }
}

/// Per-input fraction of single-bit flips that change the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityProfile {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Indexed by neighborhood value `L·4 + C·2 + R`.
    pub per_input: [f64; 8],
}

fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

pub fn compute_sensitivity(table: &TruthTable) -> SensitivityProfile {
    let mut per_input = [0.0; 8];
    for n in 0..8u8 {
        let base = table.eval(Neighborhood::from_index(n));
        let flips = [4u8, 2, 1]
            .iter()
            .filter(|&&mask| table.eval(Neighborhood::from_index(n ^ mask)) != base)
            .count();
        per_input[n as usize] = round6(flips as f64 / 3.0);
    }
    let mean = per_input.iter().sum::<f64>() / 8.0;
    let min = per_input.iter().copied().fold(f64::INFINITY, f64::min);
    let max = per_input.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    SensitivityProfile {
        mean: round6(mean),
        min,
        max,
        per_input,
    }
}

/// Ordinal dynamical class: constant, periodic, chaotic, complex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StructuralClass {
    I,
    II,
    III,
    IV,
}

impl StructuralClass {
    pub const ALL: [StructuralClass; 4] = [Self::I, Self::II, Self::III, Self::IV];
}

impl fmt::Display for StructuralClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StructuralClass::I => "I",
            StructuralClass::II => "II",
            StructuralClass::III => "III",
            StructuralClass::IV => "IV",
        })
    }
}

/// Class of well-studied elementary rules.
pub fn known_class(rule: u8) -> Option<StructuralClass> {
    use StructuralClass::*;
    match rule {
        0 | 1 | 2 | 4 | 8 | 32 | 128 | 136 | 160 | 254 | 255 => Some(I),
        3 | 5 | 6 | 7 | 9 | 10 | 11 | 12 | 13 | 14 | 15 | 19 | 23 | 24 | 25 | 26 | 27 | 28 | 29 | 33
        | 34 | 35 | 36 | 37 | 38 | 42 | 43 | 44 | 46 | 50 | 51 | 56 | 57 | 58 | 62 | 72 | 73 | 74
        | 76 | 77 | 78 | 94 | 104 | 108 | 130 | 132 | 134 | 138 | 140 | 142 | 152 | 154 | 156
        | 162 | 164 | 170 | 172 | 178 | 184 | 200 | 204 | 232 => Some(II),
        18 | 22 | 30 | 45 | 60 | 75 | 86 | 90 | 105 | 122 | 126 | 146 | 150 | 182 => Some(III),
        41 | 54 | 106 | 110 => Some(IV),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub class: StructuralClass,
    pub confidence: f64,
    pub reasoning: String,
}

impl Classification {
    fn new(class: StructuralClass, confidence: f64, reasoning: String) -> Self {
        Self {
            class,
            confidence,
            reasoning,
        }
    }
}

pub fn classify(rule: u8, linear: bool, surjective: bool, sensitivity: &SensitivityProfile) -> Classification {
    use StructuralClass::*;
    let mean = sensitivity.mean;
    if let Some(class) = known_class(rule) {
        return Classification::new(class, 0.95, format!("Rule {rule} is a known Wolfram Class {class} rule"));
    }
    if !surjective {
        return Classification::new(I, 0.9, "Constant output function -- Class I".to_string());
    }
    if linear {
        return if mean > 0.5 {
            Classification::new(
                III,
                0.7,
                format!("Linear/affine over GF(2) with high sensitivity ({mean:.3}) -- chaotic Class III"),
            )
        } else {
            Classification::new(
                II,
                0.6,
                format!("Linear/affine over GF(2) with moderate sensitivity ({mean:.3}) -- periodic Class II"),
            )
        };
    }
    if mean > 0.5 {
        Classification::new(
            IV,
            0.5,
            format!("Nonlinear with high mean sensitivity ({mean:.3}) -- Class IV candidate (edge-of-chaos dynamics)"),
        )
    } else if mean > 0.25 {
        Classification::new(
            II,
            0.5,
            format!("Nonlinear with moderate sensitivity ({mean:.3}) -- likely Class II"),
        )
    } else {
        Classification::new(
            I,
            0.6,
            format!("Nonlinear but low sensitivity ({mean:.3}) -- likely Class I/II"),
        )
    }
}

/// Everything the analyzer reports for one diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub wiring_id: String,
    pub wolfram_rule: u8,
    pub truth_table: TruthTable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    pub is_linear: bool,
    pub linearity_detail: String,
    pub surjective: bool,
    pub surjectivity_detail: String,
    pub sensitivity: SensitivityProfile,
    pub sensitivity_detail: String,
    pub structural_class: StructuralClass,
    pub class_confidence: f64,
    pub class_reasoning: String,
    pub verification: Verification,
    pub analysis_time_ms: f64,
}

impl AnalysisResult {
    pub fn verified(&self) -> bool {
        self.verification.is_verified()
    }
}

/// Drives evaluation, proof and classification for one diagram at a time.
pub struct Analyzer {
    mode: EvalMode,
    prover: Box<dyn EquivalenceProver>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(EvalMode::Strict)
    }
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer").field("mode", &self.mode).finish_non_exhaustive()
    }
}

impl Analyzer {
    pub fn new(mode: EvalMode) -> Self {
        Self::with_prover(mode, Box::new(ExhaustiveProver::default()))
    }

    pub fn with_prover(mode: EvalMode, prover: Box<dyn EquivalenceProver>) -> Self {
        Self { mode, prover }
    }

    pub fn mode(&self) -> EvalMode {
        self.mode
    }

    pub fn analyze(&self, diagram: &WiringDiagram) -> Result<AnalysisResult, EvalError> {
        let start = Instant::now();
        check_supported(diagram, self.mode)?;

        let table = TruthTable::from_diagram(diagram, self.mode)?;
        let rule = table.rule_number();

        let mut linearity = check_linearity(&table);
        let (verification, symbolic_formula) = match SymbolicCircuit::from_diagram(diagram, self.mode) {
            Ok(circuit) => {
                let verification = self.prover.prove_equivalent(&circuit, &table);
                let symbolic_linear = match self.prover.prove_linear(&circuit) {
                    Verification::Verified => Some(true),
                    Verification::Refuted => Some(false),
                    Verification::Unknown => None,
                };
                if let Some(sl) = symbolic_linear {
                    if sl != linearity.linear {
                        linearity
                            .detail
                            .push_str(&format!(" [WARNING: symbolic check disagrees: linear={sl}]"));
                    }
                }
                (verification, Some(circuit.formula()))
            }
            Err(e) => {
                warn!(wiring = diagram.id(), error = %e, "symbolic evaluation failed, verification unknown");
                (Verification::Unknown, None)
            }
        };
        if verification == Verification::Refuted {
            warn!(wiring = diagram.id(), rule, "symbolic circuit disagrees with truth table");
        }

        let surjectivity = check_surjectivity(&table);
        let sensitivity = compute_sensitivity(&table);
        let class = classify(rule, linearity.linear, surjectivity.surjective, &sensitivity);
        let sensitivity_detail = format!(
            "Mean sensitivity {:.3} -- each input flip changes output {:.0}% of the time",
            sensitivity.mean,
            sensitivity.mean * 100.0
        );

        let elapsed = start.elapsed().as_secs_f64() * 1000.0;
        debug!(
            wiring = diagram.id(),
            rule,
            class = %class.class,
            %verification,
            "analysis complete"
        );
        Ok(AnalysisResult {
            wiring_id: diagram.id().to_string(),
            wolfram_rule: rule,
            truth_table: table,
            formula: diagram.meta().formula.clone().or(symbolic_formula),
            is_linear: linearity.linear,
            linearity_detail: linearity.detail,
            surjective: surjectivity.surjective,
            surjectivity_detail: surjectivity.detail,
            sensitivity,
            sensitivity_detail,
            structural_class: class.class,
            class_confidence: class.confidence,
            class_reasoning: class.reasoning,
            verification,
            analysis_time_ms: (elapsed * 10.0).round() / 10.0,
        })
    }
}

/// Sum-of-products circuit realising `rule`.
///
/// Rule 0 is `C XOR C`. Every other rule ORs one three-way AND per set bit.
pub fn synthesize_rule(rule: u8) -> Result<WiringDiagram, StructuralError> {
    let table = TruthTable::from_rule(rule);
    let meta = DiagramMeta::new(format!("rule-{rule:03}")).with_formula(format!("sum of products for rule {rule}"));
    let mut b = DiagramBuilder::new(meta);
    let mut vars = [None; 3];
    let mut negs = [None; 3];
    const CONTEXT: [(&str, Component); 3] = [
        ("pred", Component::ContextPred),
        ("self", Component::ContextSelf),
        ("succ", Component::ContextSucc),
    ];

    let output = b.node("output", Component::Output);
    if rule == 0 {
        let s = b.node("self", Component::ContextSelf);
        let x = b.node("zero", Component::BitXor);
        b.wire(s, x, Port::A).wire(s, x, Port::B).wire(x, output, Port::Sigil);
        return b.finish();
    }

    let mut literal = |b: &mut DiagramBuilder, k: usize, on: bool| {
        let var = *vars[k].get_or_insert_with(|| b.node(CONTEXT[k].0, CONTEXT[k].1));
        if on {
            return var;
        }
        *negs[k].get_or_insert_with(|| {
            let not = b.node(format!("not-{}", CONTEXT[k].0), Component::BitNot);
            b.wire(var, not, Port::A);
            not
        })
    };

    let mut acc = None;
    for n in (0..8u8).rev() {
        let at = Neighborhood::from_index(n);
        if !table.eval(at) {
            continue;
        }
        let l = literal(&mut b, 0, at.left);
        let c = literal(&mut b, 1, at.center);
        let r = literal(&mut b, 2, at.right);
        let lc = b.node(format!("m{n}-lc"), Component::BitAnd);
        b.wire(l, lc, Port::A).wire(c, lc, Port::B);
        let m = b.node(format!("m{n}"), Component::BitAnd);
        b.wire(lc, m, Port::A).wire(r, m, Port::B);
        acc = Some(match acc {
            None => m,
            Some(prev) => {
                let or = b.node(format!("or-{n}"), Component::BitOr);
                b.wire(prev, or, Port::A).wire(m, or, Port::B);
                or
            }
        });
    }
    if let Some(top) = acc {
        b.wire(top, output, Port::Sigil);
    }
    b.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::NodeIdx;
    use crate::prover::NullProver;
    use proptest::prelude::*;

    const RULE_90: &str = r#"{
        "meta": { "id": "rule-090", "formula": "L XOR R" },
        "diagram": {
            "nodes": [
                { "id": "pred", "component": "context-pred" },
                { "id": "succ", "component": "context-succ" },
                { "id": "xor", "component": "bit-xor" },
                { "id": "output", "component": "output-sigil" }
            ],
            "edges": [
                { "from": "pred", "to": "xor", "to-port": "a" },
                { "from": "succ", "to": "xor", "to-port": "b" },
                { "from": "xor", "to": "output" }
            ]
        }
    }"#;

    const RULE_110: &str = r#"{
        "meta": { "id": "rule-110" },
        "diagram": {
            "nodes": [
                { "id": "pred", "component": "context-pred" },
                { "id": "self", "component": "context-self" },
                { "id": "succ", "component": "context-succ" },
                { "id": "c-or-r", "component": "bit-or" },
                { "id": "l-and-c", "component": "bit-and" },
                { "id": "all", "component": "bit-and" },
                { "id": "not-all", "component": "bit-not" },
                { "id": "rule", "component": "bit-and" },
                { "id": "output", "component": "output-sigil" }
            ],
            "edges": [
                { "from": "self", "to": "c-or-r" },
                { "from": "succ", "to": "c-or-r" },
                { "from": "pred", "to": "l-and-c" },
                { "from": "self", "to": "l-and-c" },
                { "from": "l-and-c", "to": "all" },
                { "from": "succ", "to": "all" },
                { "from": "all", "to": "not-all" },
                { "from": "c-or-r", "to": "rule" },
                { "from": "not-all", "to": "rule" },
                { "from": "rule", "to": "output" }
            ]
        }
    }"#;

    fn table(bits: [u8; 8]) -> TruthTable {
        TruthTable::try_from(bits.to_vec()).unwrap()
    }

    #[test]
    fn rule_numbers_and_tables_are_inverse() {
        for rule in 0..=255u8 {
            let t = rule_number_to_truth_table(rule);
            assert_eq!(truth_table_to_rule_number(&t), rule);
        }
        assert_eq!(TruthTable::from_rule(110), table([0, 1, 1, 0, 1, 1, 1, 0]));
        assert_eq!(TruthTable::from_rule(110).to_string(), "01101110");
    }

    #[test]
    fn table_indexing_is_descending() {
        let t = TruthTable::from_rule(1);
        assert!(t.f(false, false, false));
        assert!(!t.f(true, true, true));
        let t = TruthTable::from_rule(128);
        assert!(t.f(true, true, true));
    }

    #[test]
    fn analyzes_rule_90() {
        let d = WiringDiagram::from_json(RULE_90).unwrap();
        let r = Analyzer::default().analyze(&d).unwrap();
        assert_eq!(r.wolfram_rule, 90);
        assert_eq!(r.truth_table, table([0, 1, 0, 1, 1, 0, 1, 0]));
        assert!(r.is_linear);
        assert!(r.surjective);
        assert!(r.sensitivity.per_input.iter().all(|&s| (s - 0.666667).abs() < 1e-9));
        assert!((r.sensitivity.mean - 0.666667).abs() < 1e-9);
        assert_eq!(r.structural_class, StructuralClass::III);
        assert_eq!(r.class_confidence, 0.95);
        assert_eq!(r.verification, Verification::Verified);
        assert_eq!(r.formula.as_deref(), Some("L XOR R"));
        assert_eq!(
            r.sensitivity_detail,
            "Mean sensitivity 0.667 -- each input flip changes output 67% of the time"
        );
    }

    #[test]
    fn analyzes_rule_110() {
        let d = WiringDiagram::from_json(RULE_110).unwrap();
        let r = Analyzer::default().analyze(&d).unwrap();
        assert_eq!(r.wolfram_rule, 110);
        assert_eq!(r.truth_table, table([0, 1, 1, 0, 1, 1, 1, 0]));
        assert!(!r.is_linear);
        assert!(r.linearity_detail.ends_with("-- nonlinear"));
        assert!(!r.linearity_detail.contains("WARNING"));
        assert!(r.surjective);
        assert_eq!(r.structural_class, StructuralClass::IV);
        assert!(r.verified());
    }

    #[test]
    fn constant_rules_are_class_one() {
        for rule in [0u8, 255] {
            let d = synthesize_rule(rule).unwrap();
            let r = Analyzer::default().analyze(&d).unwrap();
            assert_eq!(r.wolfram_rule, rule);
            assert!(!r.surjective);
            assert_eq!(r.sensitivity.mean, 0.0);
            assert_eq!(r.structural_class, StructuralClass::I);
        }
        assert_eq!(
            check_surjectivity(&TruthTable::from_rule(0)).detail,
            "Output is constant 0 -- not surjective"
        );
        assert_eq!(
            check_surjectivity(&TruthTable::from_rule(255)).detail,
            "Output is constant 1 -- not surjective"
        );
    }

    #[test]
    fn linearity_counterexample_text() {
        // rule 128 is L AND C AND R; the first failing pair is (001, 110)
        let l = check_linearity(&TruthTable::from_rule(128));
        assert!(!l.linear);
        assert_eq!(
            l.detail,
            "f(001 XOR 110) = f(111) = 1, but f(001) XOR f(110) = 0 XOR 0 = 0 -- nonlinear"
        );
        // affine with constant 1 still fails the strict pairwise identity
        assert!(!check_linearity(&TruthTable::from_rule(255)).linear);
        assert!(check_linearity(&TruthTable::from_rule(150)).linear);
        assert!(check_linearity(&TruthTable::from_rule(0)).linear);
    }

    #[test]
    fn surjectivity_counts_outputs() {
        assert_eq!(
            check_surjectivity(&TruthTable::from_rule(184)).detail,
            "Output has 4 ones and 4 zeros -- surjective"
        );
    }

    #[test]
    fn classification_ladder() {
        let s = |mean: f64| SensitivityProfile {
            mean,
            min: 0.0,
            max: 1.0,
            per_input: [mean; 8],
        };
        // 184 is curated
        assert_eq!(classify(184, false, true, &s(0.5)).class, StructuralClass::II);
        // 17 is not curated
        assert_eq!(known_class(17), None);
        let c = classify(17, false, false, &s(0.0));
        assert_eq!((c.class, c.confidence), (StructuralClass::I, 0.9));
        let c = classify(17, true, true, &s(0.75));
        assert_eq!((c.class, c.confidence), (StructuralClass::III, 0.7));
        assert!(c.reasoning.contains("(0.750)"));
        let c = classify(17, true, true, &s(0.5));
        assert_eq!((c.class, c.confidence), (StructuralClass::II, 0.6));
        let c = classify(17, false, true, &s(0.6));
        assert_eq!((c.class, c.confidence), (StructuralClass::IV, 0.5));
        let c = classify(17, false, true, &s(0.4));
        assert_eq!((c.class, c.confidence), (StructuralClass::II, 0.5));
        let c = classify(17, false, true, &s(0.25));
        assert_eq!((c.class, c.confidence), (StructuralClass::I, 0.6));
    }

    #[test]
    fn synthesized_circuits_round_trip_every_rule() {
        let analyzer = Analyzer::default();
        for rule in 0..=255u8 {
            let d = synthesize_rule(rule).unwrap();
            let r = analyzer.analyze(&d).unwrap();
            assert_eq!(r.wolfram_rule, rule);
            assert_eq!(r.verification, Verification::Verified);
        }
    }

    #[test]
    fn null_prover_degrades_to_unknown() {
        let d = WiringDiagram::from_json(RULE_90).unwrap();
        let r = Analyzer::with_prover(EvalMode::Strict, Box::new(NullProver))
            .analyze(&d)
            .unwrap();
        assert_eq!(r.verification, Verification::Unknown);
        assert!(!r.verified());
        assert_eq!(r.wolfram_rule, 90);
    }

    #[test]
    fn strict_mode_rejects_majority_but_lifted_gets_232() {
        let mut b = DiagramBuilder::new(DiagramMeta::new("maj-gate"));
        let n = b.node("neighbors", Component::ContextNeighbors);
        let d = b.node("diversity", Component::Diversity);
        let m1 = b.node("maj-a", Component::MajorityVote);
        let m2 = b.node("maj-b", Component::MajorityVote);
        let g = b.node("gate", Component::ThresholdSelect);
        let o = b.node("output", Component::Output);
        b.wire(n, d, Port::Sigils)
            .wire(n, m1, Port::Sigils)
            .wire(n, m2, Port::Sigils)
            .wire(d, g, Port::Score)
            .literal(crate::component::Literal::Real(0.5), g, Some(Port::Threshold))
            .wire(m1, g, Port::Above)
            .wire(m2, g, Port::Below)
            .wire(g, o, Port::Sigil);
        let diagram = b.finish().unwrap();
        assert!(matches!(
            Analyzer::new(EvalMode::Strict).analyze(&diagram),
            Err(EvalError::UnsupportedComponent { .. })
        ));
        let r = Analyzer::new(EvalMode::Lifted).analyze(&diagram).unwrap();
        assert_eq!(r.wolfram_rule, 232);
        assert!(r.verified());
    }

    /// Branches built differently but equal as functions still verify.
    #[test]
    fn opaque_select_with_equivalent_branches_verifies() {
        use crate::component::Literal;
        let mut b = DiagramBuilder::new(DiagramMeta::new("absorbed-select"));
        let s = b.node("self", Component::ContextSelf);
        let p = b.node("pred", Component::ContextPred);
        let exo = b.node("exotype", Component::ContextExotype);
        let bit = b.node("exotype-bit0", Component::BitTest);
        let or = b.node("self-or-pred", Component::BitOr);
        let and = b.node("absorbed", Component::BitAnd);
        let sel = b.node("select", Component::ConditionalSelect);
        let o = b.node("output", Component::Output);
        b.wire(exo, bit, Port::Sigil)
            .literal(Literal::Int(0), bit, Some(Port::Bit))
            .wire(s, or, Port::A)
            .wire(p, or, Port::B)
            .wire(s, and, Port::A)
            .wire(or, and, Port::B)
            .wire(bit, sel, Port::Cond)
            .wire(s, sel, Port::Then)
            .wire(and, sel, Port::Else)
            .wire(sel, o, Port::Sigil);
        let diagram = b.finish().unwrap();
        let r = Analyzer::new(EvalMode::Lifted).analyze(&diagram).unwrap();
        assert_eq!(r.wolfram_rule, 204);
        assert_eq!(r.verification, Verification::Verified);
    }

    #[test]
    fn analysis_record_field_names() {
        let d = WiringDiagram::from_json(RULE_90).unwrap();
        let r = Analyzer::default().analyze(&d).unwrap();
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["wolfram_rule"], 90);
        assert_eq!(v["truth_table"], serde_json::json!([0, 1, 0, 1, 1, 0, 1, 0]));
        assert_eq!(v["structural_class"], "III");
        assert_eq!(v["verification"], "verified");
        let back: AnalysisResult = serde_json::from_value(v).unwrap();
        assert_eq!(back.truth_table, r.truth_table);
    }

    #[derive(Debug, Clone)]
    enum Expr {
        Var(usize),
        Not(Box<Expr>),
        And(Box<Expr>, Box<Expr>),
        Or(Box<Expr>, Box<Expr>),
        Xor(Box<Expr>, Box<Expr>),
    }

    impl Expr {
        fn eval(&self, at: [bool; 3]) -> bool {
            match self {
                Expr::Var(k) => at[*k],
                Expr::Not(a) => !a.eval(at),
                Expr::And(a, b) => a.eval(at) && b.eval(at),
                Expr::Or(a, b) => a.eval(at) || b.eval(at),
                Expr::Xor(a, b) => a.eval(at) ^ b.eval(at),
            }
        }

        fn emit(&self, b: &mut DiagramBuilder, vars: &mut [Option<NodeIdx>; 3], next: &mut usize) -> NodeIdx {
            const CONTEXT: [(&str, Component); 3] = [
                ("pred", Component::ContextPred),
                ("self", Component::ContextSelf),
                ("succ", Component::ContextSucc),
            ];
            let (component, args): (Component, Vec<&Expr>) = match self {
                Expr::Var(k) => {
                    return *vars[*k].get_or_insert_with(|| b.node(CONTEXT[*k].0, CONTEXT[*k].1));
                }
                Expr::Not(a) => (Component::BitNot, vec![a.as_ref()]),
                Expr::And(x, y) => (Component::BitAnd, vec![x.as_ref(), y.as_ref()]),
                Expr::Or(x, y) => (Component::BitOr, vec![x.as_ref(), y.as_ref()]),
                Expr::Xor(x, y) => (Component::BitXor, vec![x.as_ref(), y.as_ref()]),
            };
            let ids: Vec<_> = args.iter().map(|e| e.emit(b, vars, next)).collect();
            *next += 1;
            let node = b.node(format!("g{next}"), component);
            for (id, port) in ids.into_iter().zip([Port::A, Port::B]) {
                b.wire(id, node, port);
            }
            node
        }

        fn diagram(&self) -> WiringDiagram {
            let mut b = DiagramBuilder::new(DiagramMeta::new("random"));
            let mut vars = [None; 3];
            let mut next = 0;
            let top = self.emit(&mut b, &mut vars, &mut next);
            let o = b.node("output", Component::Output);
            b.wire(top, o, Port::Sigil);
            b.finish().unwrap()
        }
    }

    fn expr() -> impl Strategy<Value = Expr> {
        let leaf = (0usize..3).prop_map(Expr::Var);
        leaf.prop_recursive(4, 24, 2, |inner| {
            prop_oneof![
                inner.clone().prop_map(|a| Expr::Not(Box::new(a))),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::And(Box::new(a), Box::new(b))),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::Or(Box::new(a), Box::new(b))),
                (inner.clone(), inner).prop_map(|(a, b)| Expr::Xor(Box::new(a), Box::new(b))),
            ]
        })
    }

    proptest! {
        #[test]
        fn exhaustive_table_agrees_with_prover(e in expr()) {
            let d = e.diagram();
            let r = Analyzer::default().analyze(&d).unwrap();
            for n in 0..8u8 {
                let at = Neighborhood::from_index(n);
                prop_assert_eq!(r.truth_table.eval(at), e.eval([at.left, at.center, at.right]));
            }
            prop_assert_eq!(r.verification, Verification::Verified);
            prop_assert!(!r.linearity_detail.contains("WARNING"));
        }
    }
}
