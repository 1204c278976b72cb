//! Closed component vocabulary for wiring diagrams.
//!
//! Every node in a diagram is one `Component`. Components declare a fixed list
//! of named, typed input ports and a single `out` port. Wire names are the
//! kebab-case strings used in serialized diagrams.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Value types carried on wires and literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueType {
    /// A single 8-bit sigil.
    Sigil,
    /// An ordered set of sigils (the neighborhood).
    Sigils,
    /// A sensor reading in `[0, 1]`.
    Score,
    /// A real number.
    Real,
    /// A non-negative integer.
    Int,
    /// A single Boolean.
    Bool,
}

impl ValueType {
    /// Returns `true` if a value of type `self` may feed a port of type `port`.
    ///
    /// Scores feed real ports and integers widen to reals; all other pairs must
    /// match exactly.
    pub fn feeds(self, port: ValueType) -> bool {
        self == port
            || matches!(
                (self, port),
                (ValueType::Score, ValueType::Real) | (ValueType::Int, ValueType::Real)
            )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Sigil => "sigil",
            ValueType::Sigils => "sigils",
            ValueType::Score => "score",
            ValueType::Real => "real",
            ValueType::Int => "int",
            ValueType::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// A constant carried by a literal edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum Literal {
    Int(u32),
    Real(f64),
    Bool(bool),
}

impl Literal {
    /// Returns the type tag of this literal.
    pub fn value_type(&self) -> ValueType {
        match self {
            Literal::Int(_) => ValueType::Int,
            Literal::Real(_) => ValueType::Real,
            Literal::Bool(_) => ValueType::Bool,
        }
    }

    /// Canonical bytes used for fingerprinting (reals by IEEE bit pattern).
    pub(crate) fn canonical_bytes(&self) -> [u8; 9] {
        let mut out = [0u8; 9];
        match self {
            Literal::Int(v) => {
                out[0] = 0;
                out[1..5].copy_from_slice(&v.to_le_bytes());
            }
            Literal::Real(v) => {
                out[0] = 1;
                out[1..9].copy_from_slice(&v.to_bits().to_le_bytes());
            }
            Literal::Bool(v) => {
                out[0] = 2;
                out[1] = *v as u8;
            }
        }
        out
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Real(v) => write!(f, "{v}"),
            Literal::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Named component ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Port {
    A,
    B,
    Sigil,
    Sigils,
    Amount,
    Rate,
    Point,
    Bit,
    Score,
    Threshold,
    Above,
    Below,
    Cond,
    Then,
    Else,
    /// The single output port every component exposes.
    Out,
}

impl Port {
    const ALL: [Port; 16] = [
        Port::A,
        Port::B,
        Port::Sigil,
        Port::Sigils,
        Port::Amount,
        Port::Rate,
        Port::Point,
        Port::Bit,
        Port::Score,
        Port::Threshold,
        Port::Above,
        Port::Below,
        Port::Cond,
        Port::Then,
        Port::Else,
        Port::Out,
    ];

    /// Wire name of the port.
    pub fn name(self) -> &'static str {
        match self {
            Port::A => "a",
            Port::B => "b",
            Port::Sigil => "sigil",
            Port::Sigils => "sigils",
            Port::Amount => "amount",
            Port::Rate => "rate",
            Port::Point => "point",
            Port::Bit => "bit",
            Port::Score => "score",
            Port::Threshold => "threshold",
            Port::Above => "above",
            Port::Below => "below",
            Port::Cond => "cond",
            Port::Then => "then",
            Port::Else => "else",
            Port::Out => "out",
        }
    }

    /// Looks a port up by wire name.
    pub fn from_name(name: &str) -> Option<Port> {
        Port::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared input port of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortSpec {
    pub port: Port,
    pub ty: ValueType,
}

const fn spec(port: Port, ty: ValueType) -> PortSpec {
    PortSpec { port, ty }
}

const NO_PORTS: &[PortSpec] = &[];
const SIGILS_IN: &[PortSpec] = &[spec(Port::Sigils, ValueType::Sigils)];
const SIGIL_IN: &[PortSpec] = &[spec(Port::Sigil, ValueType::Sigil)];
const BINARY: &[PortSpec] = &[spec(Port::A, ValueType::Sigil), spec(Port::B, ValueType::Sigil)];
const UNARY: &[PortSpec] = &[spec(Port::A, ValueType::Sigil)];
const SHIFT: &[PortSpec] = &[spec(Port::Sigil, ValueType::Sigil), spec(Port::Amount, ValueType::Int)];
const CROSSOVER: &[PortSpec] = &[
    spec(Port::A, ValueType::Sigil),
    spec(Port::B, ValueType::Sigil),
    spec(Port::Point, ValueType::Int),
];
const MUTATE: &[PortSpec] = &[spec(Port::Sigil, ValueType::Sigil), spec(Port::Rate, ValueType::Real)];
const BIT_TEST: &[PortSpec] = &[spec(Port::Sigil, ValueType::Sigil), spec(Port::Bit, ValueType::Int)];
const THRESHOLD_SELECT: &[PortSpec] = &[
    spec(Port::Score, ValueType::Score),
    spec(Port::Threshold, ValueType::Real),
    spec(Port::Above, ValueType::Sigil),
    spec(Port::Below, ValueType::Sigil),
];
const CONDITIONAL_SELECT: &[PortSpec] = &[
    spec(Port::Cond, ValueType::Bool),
    spec(Port::Then, ValueType::Sigil),
    spec(Port::Else, ValueType::Sigil),
];

/// Broad family a component belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Context,
    Sensor,
    Mixer,
    Gate,
    Terminal,
}

/// A wiring-diagram component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    // Context extractors
    ContextSelf,
    ContextPred,
    ContextSucc,
    ContextPrev,
    ContextNeighbors,
    ContextExotype,
    // Sensors
    Diversity,
    Entropy,
    Similarity,
    Evenness,
    Dominance,
    Autocorrelation,
    // Mixers
    BitXor,
    BitAnd,
    BitOr,
    BitNot,
    ShiftLeft,
    ShiftRight,
    MajorityVote,
    Crossover,
    Mutate,
    SigilAverage,
    BitTest,
    // Gates
    ThresholdSelect,
    ConditionalSelect,
    // Terminal
    Output,
}

impl Component {
    /// Every component, in declaration order.
    pub const ALL: [Component; 26] = [
        Component::ContextSelf,
        Component::ContextPred,
        Component::ContextSucc,
        Component::ContextPrev,
        Component::ContextNeighbors,
        Component::ContextExotype,
        Component::Diversity,
        Component::Entropy,
        Component::Similarity,
        Component::Evenness,
        Component::Dominance,
        Component::Autocorrelation,
        Component::BitXor,
        Component::BitAnd,
        Component::BitOr,
        Component::BitNot,
        Component::ShiftLeft,
        Component::ShiftRight,
        Component::MajorityVote,
        Component::Crossover,
        Component::Mutate,
        Component::SigilAverage,
        Component::BitTest,
        Component::ThresholdSelect,
        Component::ConditionalSelect,
        Component::Output,
    ];

    /// Wire name used in serialized diagrams.
    pub fn name(self) -> &'static str {
        match self {
            Component::ContextSelf => "context-self",
            Component::ContextPred => "context-pred",
            Component::ContextSucc => "context-succ",
            Component::ContextPrev => "context-prev",
            Component::ContextNeighbors => "context-neighbors",
            Component::ContextExotype => "context-exotype",
            Component::Diversity => "diversity",
            Component::Entropy => "entropy",
            Component::Similarity => "similarity",
            Component::Evenness => "evenness",
            Component::Dominance => "dominance",
            Component::Autocorrelation => "autocorrelation",
            Component::BitXor => "bit-xor",
            Component::BitAnd => "bit-and",
            Component::BitOr => "bit-or",
            Component::BitNot => "bit-not",
            Component::ShiftLeft => "bit-shift-left",
            Component::ShiftRight => "bit-shift-right",
            Component::MajorityVote => "majority",
            Component::Crossover => "crossover",
            Component::Mutate => "mutate",
            Component::SigilAverage => "sigil-avg",
            Component::BitTest => "bit-test",
            Component::ThresholdSelect => "threshold-select",
            Component::ConditionalSelect => "conditional-select",
            Component::Output => "output-sigil",
        }
    }

    /// Looks a component up by wire name.
    ///
    /// `output-with-state` is accepted as an alias of the output terminal.
    pub fn from_name(name: &str) -> Option<Component> {
        if name == "output-with-state" {
            return Some(Component::Output);
        }
        Component::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Component family.
    pub fn family(self) -> Family {
        use Component::*;
        match self {
            ContextSelf | ContextPred | ContextSucc | ContextPrev | ContextNeighbors
            | ContextExotype => Family::Context,
            Diversity | Entropy | Similarity | Evenness | Dominance | Autocorrelation => {
                Family::Sensor
            }
            BitXor | BitAnd | BitOr | BitNot | ShiftLeft | ShiftRight | MajorityVote
            | Crossover | Mutate | SigilAverage | BitTest => Family::Mixer,
            ThresholdSelect | ConditionalSelect => Family::Gate,
            Output => Family::Terminal,
        }
    }

    /// Returns `true` for context extractors, the diagram's sources.
    pub fn is_source(self) -> bool {
        self.family() == Family::Context
    }

    /// Declared input ports, in positional order.
    pub fn inputs(self) -> &'static [PortSpec] {
        use Component::*;
        match self {
            ContextSelf | ContextPred | ContextSucc | ContextPrev | ContextNeighbors
            | ContextExotype => NO_PORTS,
            Diversity | Entropy | Dominance | Autocorrelation | MajorityVote => SIGILS_IN,
            Similarity | BitXor | BitAnd | BitOr | SigilAverage => BINARY,
            Evenness | Output => SIGIL_IN,
            BitNot => UNARY,
            ShiftLeft | ShiftRight => SHIFT,
            Crossover => CROSSOVER,
            Mutate => MUTATE,
            BitTest => BIT_TEST,
            ThresholdSelect => THRESHOLD_SELECT,
            ConditionalSelect => CONDITIONAL_SELECT,
        }
    }

    /// Type of the `out` port.
    pub fn output_type(self) -> ValueType {
        match self.family() {
            Family::Sensor => ValueType::Score,
            _ => match self {
                Component::ContextNeighbors => ValueType::Sigils,
                Component::BitTest => ValueType::Bool,
                _ => ValueType::Sigil,
            },
        }
    }

    /// Declared spec of input `port`, if this component has one.
    pub fn input(self, port: Port) -> Option<PortSpec> {
        self.inputs().iter().copied().find(|s| s.port == port)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognised component wire name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown component kind `{0}`")]
pub struct UnknownComponent(pub String);

impl FromStr for Component {
    type Err = UnknownComponent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Component::from_name(s).ok_or_else(|| UnknownComponent(s.to_string()))
    }
}

impl Serialize for Component {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Component {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
