//! Formal double-check of an exhaustively built truth table.
//!
//! A diagram is re-evaluated symbolically into a [`SymbolicCircuit`]; an
//! [`EquivalenceProver`] then decides whether any input disagrees with the
//! claimed table. [`ExhaustiveProver`] searches every assignment of the
//! disagreement formula's free variables under a deadline. Since a circuit
//! has three inputs (six for the linearity query), the search is complete.

use crate::algebra::{BoolAlgebra, TermArena, TermId};
use crate::analysis::TruthTable;
use crate::diagram::WiringDiagram;
use crate::eval::{evaluate_symbolic, EvalError, EvalMode, Neighborhood};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default deadline for one proof query.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Outcome of a proof query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verification {
    /// The negated claim is unsatisfiable.
    Verified,
    /// A counter-model exists.
    Refuted,
    /// Deadline exceeded, or no prover available.
    Unknown,
}

impl Verification {
    pub fn is_verified(self) -> bool {
        self == Verification::Verified
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verification::Verified => "verified",
            Verification::Refuted => "refuted",
            Verification::Unknown => "unknown",
        })
    }
}

/// A diagram evaluated once over symbolic inputs.
///
/// Variables 0..3 are `L`, `C`, `R`. Variables 3..6 are a second neighborhood
/// used by the linearity query.
#[derive(Debug, Clone)]
pub struct SymbolicCircuit {
    terms: TermArena,
    root: TermId,
    inputs: Neighborhood<TermId>,
    linearity_defect: TermId,
}

impl SymbolicCircuit {
    pub fn from_diagram(diagram: &WiringDiagram, mode: EvalMode) -> Result<Self, EvalError> {
        let mut terms = TermArena::new();
        let a = Neighborhood::new(terms.var(0), terms.var(1), terms.var(2));
        let b = Neighborhood::new(terms.var(3), terms.var(4), terms.var(5));
        let root = evaluate_symbolic(diagram, &mut terms, a, mode)?;
        let f_b = evaluate_symbolic(diagram, &mut terms, b, mode)?;
        let sum = Neighborhood::new(
            terms.mk_xor(a.left, b.left),
            terms.mk_xor(a.center, b.center),
            terms.mk_xor(a.right, b.right),
        );
        let f_sum = evaluate_symbolic(diagram, &mut terms, sum, mode)?;
        let f_a_xor_f_b = terms.mk_xor(root, f_b);
        let linearity_defect = terms.mk_xor(f_sum, f_a_xor_f_b);
        Ok(Self {
            terms,
            root,
            inputs: a,
            linearity_defect,
        })
    }

    pub fn terms(&self) -> &TermArena {
        &self.terms
    }

    pub fn root(&self) -> TermId {
        self.root
    }

    /// `f(a XOR b) XOR f(a) XOR f(b)` over six variables.
    pub fn linearity_defect(&self) -> TermId {
        self.linearity_defect
    }

    /// Infix rendering of the output over `L`, `C`, `R`.
    pub fn formula(&self) -> String {
        self.terms.render(self.root, &["L", "C", "R", "L'", "C'", "R'"])
    }
}

/// Narrow interface to an equivalence checker.
pub trait EquivalenceProver: Send + Sync {
    /// Is `circuit` equal to `table` on every input?
    fn prove_equivalent(&self, circuit: &SymbolicCircuit, table: &TruthTable) -> Verification;

    /// Is `f(a XOR b) = f(a) XOR f(b)` for every pair of inputs?
    fn prove_linear(&self, circuit: &SymbolicCircuit) -> Verification;
}

/// Prover that never concludes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProver;

impl EquivalenceProver for NullProver {
    fn prove_equivalent(&self, _: &SymbolicCircuit, _: &TruthTable) -> Verification {
        Verification::Unknown
    }

    fn prove_linear(&self, _: &SymbolicCircuit) -> Verification {
        Verification::Unknown
    }
}

/// Result of a satisfiability search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Search {
    Sat(Vec<bool>),
    Unsat,
    Timeout,
}

/// Complete model search over all assignments, bounded by a deadline.
#[derive(Debug, Clone, Copy)]
pub struct ExhaustiveProver {
    timeout: Duration,
}

impl Default for ExhaustiveProver {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ExhaustiveProver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Searches for an assignment of the first `vars` variables satisfying `formula`.
    pub fn find_model(&self, terms: &TermArena, formula: TermId, vars: u8) -> Search {
        let deadline = Instant::now() + self.timeout;
        let mut assignment = vec![false; vars as usize];
        for bits in 0u32..(1u32 << vars) {
            if Instant::now() >= deadline {
                return Search::Timeout;
            }
            for (k, slot) in assignment.iter_mut().enumerate() {
                *slot = bits >> k & 1 == 1;
            }
            if terms.eval(formula, &assignment) {
                return Search::Sat(assignment);
            }
        }
        Search::Unsat
    }
}

impl EquivalenceProver for ExhaustiveProver {
    fn prove_equivalent(&self, circuit: &SymbolicCircuit, table: &TruthTable) -> Verification {
        let mut terms = circuit.terms.clone();
        let vars = circuit.inputs;
        let mut disagreement = terms.constant(false);
        for n in 0..8u8 {
            let at = Neighborhood::from_index(n);
            let lit = |terms: &mut TermArena, v: TermId, on: bool| if on { v } else { terms.mk_not(v) };
            let l = lit(&mut terms, vars.left, at.left);
            let c = lit(&mut terms, vars.center, at.center);
            let r = lit(&mut terms, vars.right, at.right);
            let lc = terms.mk_and(l, c);
            let point = terms.mk_and(lc, r);
            let expected = terms.constant(table.eval(at));
            let differs = terms.mk_xor(circuit.root, expected);
            let here = terms.mk_and(point, differs);
            disagreement = terms.mk_or(disagreement, here);
        }
        match self.find_model(&terms, disagreement, 3) {
            Search::Unsat => Verification::Verified,
            Search::Sat(model) => {
                debug!(?model, "truth table disagrees with symbolic circuit");
                Verification::Refuted
            }
            Search::Timeout => Verification::Unknown,
        }
    }

    fn prove_linear(&self, circuit: &SymbolicCircuit) -> Verification {
        match self.find_model(&circuit.terms, circuit.linearity_defect, 6) {
            Search::Unsat => Verification::Verified,
            Search::Sat(_) => Verification::Refuted,
            Search::Timeout => Verification::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, Port};
    use crate::diagram::{DiagramBuilder, DiagramMeta};

    fn rule_90() -> WiringDiagram {
        let mut b = DiagramBuilder::new(DiagramMeta::new("rule-090"));
        let p = b.node("pred", Component::ContextPred);
        let s = b.node("succ", Component::ContextSucc);
        let x = b.node("xor", Component::BitXor);
        let o = b.node("output", Component::Output);
        b.wire(p, x, Port::A).wire(s, x, Port::B).wire(x, o, Port::Sigil);
        b.finish().unwrap()
    }

    fn and_lr() -> WiringDiagram {
        let mut b = DiagramBuilder::new(DiagramMeta::new("rule-160"));
        let p = b.node("pred", Component::ContextPred);
        let s = b.node("succ", Component::ContextSucc);
        let x = b.node("and", Component::BitAnd);
        let o = b.node("output", Component::Output);
        b.wire(p, x, Port::A).wire(s, x, Port::B).wire(x, o, Port::Sigil);
        b.finish().unwrap()
    }

    #[test]
    fn verifies_correct_table() {
        let circuit = SymbolicCircuit::from_diagram(&rule_90(), EvalMode::Strict).unwrap();
        let prover = ExhaustiveProver::default();
        assert_eq!(
            prover.prove_equivalent(&circuit, &TruthTable::from_rule(90)),
            Verification::Verified
        );
        assert_eq!(circuit.formula(), "(L XOR R)");
    }

    #[test]
    fn refutes_wrong_table() {
        let circuit = SymbolicCircuit::from_diagram(&rule_90(), EvalMode::Strict).unwrap();
        let prover = ExhaustiveProver::default();
        assert_eq!(
            prover.prove_equivalent(&circuit, &TruthTable::from_rule(91)),
            Verification::Refuted
        );
    }

    #[test]
    fn linearity_query() {
        let prover = ExhaustiveProver::default();
        let xor = SymbolicCircuit::from_diagram(&rule_90(), EvalMode::Strict).unwrap();
        assert_eq!(prover.prove_linear(&xor), Verification::Verified);
        let and = SymbolicCircuit::from_diagram(&and_lr(), EvalMode::Strict).unwrap();
        assert_eq!(prover.prove_linear(&and), Verification::Refuted);
    }

    #[test]
    fn zero_deadline_is_inconclusive() {
        let circuit = SymbolicCircuit::from_diagram(&rule_90(), EvalMode::Strict).unwrap();
        let prover = ExhaustiveProver::new(Duration::ZERO);
        assert_eq!(
            prover.prove_equivalent(&circuit, &TruthTable::from_rule(90)),
            Verification::Unknown
        );
    }

    #[test]
    fn null_prover_never_claims_verified() {
        let circuit = SymbolicCircuit::from_diagram(&rule_90(), EvalMode::Strict).unwrap();
        assert_eq!(
            NullProver.prove_equivalent(&circuit, &TruthTable::from_rule(90)),
            Verification::Unknown
        );
        assert!(!NullProver.prove_linear(&circuit).is_verified());
    }

    #[test]
    fn verification_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Verification::Unknown).unwrap(), "\"unknown\"");
    }
}
