//! Circuit evaluation of wiring diagrams over a 1-D neighborhood.
//!
//! The evaluator walks a diagram's validated topological order once, computing
//! each node from its declared ports. It is generic over [`BoolAlgebra`], so
//! the same walk produces concrete bits or symbolic terms.
//!
//! Two modes are supported:
//! - [`EvalMode::Strict`] accepts only the Boolean-logic subset
//!   (`context-pred`, `context-self`, `context-succ`, `bit-and`, `bit-or`,
//!   `bit-xor`, `bit-not`, `output-sigil`); anything else is fatal.
//! - [`EvalMode::Lifted`] also interprets compiled pattern diagrams on a
//!   single bitplane. Continuous quantities (sensor scores, numeric literals,
//!   the secondary code) are opaque; a gate steered by an opaque value only
//!   evaluates when both of its branches are provably the same value.

use crate::algebra::{BoolAlgebra, Concrete, TermArena, TermId};
use crate::component::{Component, Literal, Port};
use crate::diagram::{EdgeSource, WiringDiagram};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which component subset the evaluator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvalMode {
    /// Boolean-logic components only.
    #[default]
    Strict,
    /// Logic components plus bitplane-liftable pattern components.
    Lifted,
}

/// Fatal evaluation failure for one diagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("node `{node}`: component `{component}` is outside the Boolean-logic subset")]
    UnsupportedComponent { node: String, component: Component },
    #[error("node `{node}`: component `{component}` mixes bitplanes and cannot be lifted")]
    NotLiftable { node: String, component: Component },
    #[error("node `{node}`: gate branches differ under an opaque condition")]
    UndeterminedGate { node: String },
    #[error("node `{node}`: port `{port}` carries no Boolean value")]
    NonBooleanInput { node: String, port: Port },
    #[error("node `{node}`: input on port `{port}` was not evaluated")]
    MissingInput { node: String, port: Port },
}

/// The three inputs of a 1-D neighborhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Neighborhood<T> {
    pub left: T,
    pub center: T,
    pub right: T,
}

impl<T> Neighborhood<T> {
    pub fn new(left: T, center: T, right: T) -> Self {
        Self { left, center, right }
    }
}

impl Neighborhood<bool> {
    /// Neighborhood encoded as `L·4 + C·2 + R`.
    pub fn from_index(i: u8) -> Self {
        Self::new(i & 4 != 0, i & 2 != 0, i & 1 != 0)
    }

    /// Inverse of `from_index`.
    pub fn index(&self) -> u8 {
        (self.left as u8) << 2 | (self.center as u8) << 1 | self.right as u8
    }
}

/// A value flowing on a wire during evaluation.
#[derive(Debug, Clone)]
enum Lifted<V> {
    Bit(V),
    Triple([V; 3]),
    Opaque,
}

const STRICT_SUBSET: [Component; 8] = [
    Component::ContextPred,
    Component::ContextSelf,
    Component::ContextSucc,
    Component::BitAnd,
    Component::BitOr,
    Component::BitXor,
    Component::BitNot,
    Component::Output,
];

/// Checks that every node of `diagram` is evaluable in `mode`.
///
/// Lets callers reject a diagram before running eight evaluations.
pub fn check_supported(diagram: &WiringDiagram, mode: EvalMode) -> Result<(), EvalError> {
    for (_, node) in diagram.nodes() {
        let c = node.component;
        match mode {
            EvalMode::Strict if !STRICT_SUBSET.contains(&c) => {
                return Err(EvalError::UnsupportedComponent {
                    node: node.id.clone(),
                    component: c,
                })
            }
            EvalMode::Lifted
                if matches!(
                    c,
                    Component::ShiftLeft | Component::ShiftRight | Component::Crossover | Component::Mutate
                ) =>
            {
                return Err(EvalError::NotLiftable {
                    node: node.id.clone(),
                    component: c,
                })
            }
            _ => {}
        }
    }
    Ok(())
}

/// Evaluates `diagram` at `inputs` in algebra `alg`.
pub fn evaluate<A: BoolAlgebra>(
    diagram: &WiringDiagram,
    alg: &mut A,
    inputs: &Neighborhood<A::Value>,
    mode: EvalMode,
) -> Result<A::Value, EvalError> {
    check_supported(diagram, mode)?;
    let mut values: Vec<Option<Lifted<A::Value>>> = vec![None; diagram.node_count()];

    for &idx in diagram.topological_order() {
        let node = diagram.node(idx);
        let fetch = |port: Port, values: &[Option<Lifted<A::Value>>], alg: &mut A| -> Result<Lifted<A::Value>, EvalError> {
            match diagram.input(idx, port) {
                Some(EdgeSource::Node(from)) => values[from.as_usize()].clone().ok_or_else(|| EvalError::MissingInput {
                    node: node.id.clone(),
                    port,
                }),
                Some(EdgeSource::Literal(Literal::Bool(b))) => Ok(Lifted::Bit(alg.constant(b))),
                Some(EdgeSource::Literal(_)) => Ok(Lifted::Opaque),
                None => Err(EvalError::MissingInput {
                    node: node.id.clone(),
                    port,
                }),
            }
        };
        let bit = |port: Port, values: &[Option<Lifted<A::Value>>], alg: &mut A| -> Result<A::Value, EvalError> {
            match fetch(port, values, alg)? {
                Lifted::Bit(v) => Ok(v),
                _ => Err(EvalError::NonBooleanInput {
                    node: node.id.clone(),
                    port,
                }),
            }
        };

        let value = match node.component {
            Component::ContextSelf | Component::ContextPrev => Lifted::Bit(inputs.center.clone()),
            Component::ContextPred => Lifted::Bit(inputs.left.clone()),
            Component::ContextSucc => Lifted::Bit(inputs.right.clone()),
            Component::ContextNeighbors => Lifted::Triple([
                inputs.left.clone(),
                inputs.center.clone(),
                inputs.right.clone(),
            ]),
            Component::ContextExotype
            | Component::Diversity
            | Component::Entropy
            | Component::Similarity
            | Component::Evenness
            | Component::Dominance
            | Component::Autocorrelation
            | Component::BitTest => Lifted::Opaque,
            Component::BitNot => {
                let a = bit(Port::A, &values, alg)?;
                Lifted::Bit(alg.not(&a))
            }
            Component::BitAnd | Component::BitOr | Component::BitXor | Component::SigilAverage => {
                let a = bit(Port::A, &values, alg)?;
                let b = bit(Port::B, &values, alg)?;
                Lifted::Bit(match node.component {
                    Component::BitAnd => alg.and(&a, &b),
                    Component::BitXor => alg.xor(&a, &b),
                    // per-bit mean of two bits, rounded half up
                    _ => alg.or(&a, &b),
                })
            }
            Component::MajorityVote => match fetch(Port::Sigils, &values, alg)? {
                Lifted::Triple([l, c, r]) => Lifted::Bit(alg.majority(&l, &c, &r)),
                _ => {
                    return Err(EvalError::NonBooleanInput {
                        node: node.id.clone(),
                        port: Port::Sigils,
                    })
                }
            },
            Component::ThresholdSelect => {
                let above = bit(Port::Above, &values, alg)?;
                let below = bit(Port::Below, &values, alg)?;
                if alg.same(&above, &below) {
                    Lifted::Bit(above)
                } else {
                    return Err(EvalError::UndeterminedGate { node: node.id.clone() });
                }
            }
            Component::ConditionalSelect => {
                let then = bit(Port::Then, &values, alg)?;
                let otherwise = bit(Port::Else, &values, alg)?;
                match fetch(Port::Cond, &values, alg)? {
                    Lifted::Bit(c) => {
                        let t = alg.and(&c, &then);
                        let nc = alg.not(&c);
                        let e = alg.and(&nc, &otherwise);
                        Lifted::Bit(alg.or(&t, &e))
                    }
                    _ if alg.same(&then, &otherwise) => Lifted::Bit(then),
                    _ => return Err(EvalError::UndeterminedGate { node: node.id.clone() }),
                }
            }
            Component::Output => Lifted::Bit(bit(Port::Sigil, &values, alg)?),
            Component::ShiftLeft | Component::ShiftRight | Component::Crossover | Component::Mutate => {
                return Err(EvalError::NotLiftable {
                    node: node.id.clone(),
                    component: node.component,
                })
            }
        };
        values[idx.as_usize()] = Some(value);
    }

    let out = diagram.output();
    match values[out.as_usize()].take() {
        Some(Lifted::Bit(v)) => Ok(v),
        _ => Err(EvalError::MissingInput {
            node: diagram.node(out).id.clone(),
            port: Port::Sigil,
        }),
    }
}

/// Concrete evaluation at one neighborhood.
pub fn evaluate_concrete(
    diagram: &WiringDiagram,
    inputs: Neighborhood<bool>,
    mode: EvalMode,
) -> Result<bool, EvalError> {
    evaluate(diagram, &mut Concrete, &inputs, mode)
}

/// Symbolic evaluation with `L`, `C`, `R` bound to the given terms.
pub fn evaluate_symbolic(
    diagram: &WiringDiagram,
    arena: &mut TermArena,
    inputs: Neighborhood<TermId>,
    mode: EvalMode,
) -> Result<TermId, EvalError> {
    evaluate(diagram, arena, &inputs, mode)
}
