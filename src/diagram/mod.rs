//! Wiring diagrams: the typed DAG shared by the compiler and the analyzer.
//!
//! A `WiringDiagram` owns an arena of nodes and a list of edges. Every edge
//! feeds exactly one input port of one node, either from another node's
//! `out` port or from a typed literal. Diagrams are validated once, when
//! built, and are immutable afterwards: construction goes through
//! [`DiagramBuilder`], which rejects cycles, dangling ports, type mismatches,
//! and nodes that cannot reach the output.
//!
//! # Invariants
//! - Node ids are unique.
//! - Every declared input port of every node is fed by exactly one edge.
//! - The graph is acyclic; `topological_order()` is a valid evaluation order.
//! - Exactly one node is the `output-sigil` terminal, and every non-source
//!   node reaches it.

pub mod builder;
pub mod document;

pub use builder::DiagramBuilder;
pub use document::{DocumentError, WiringDocument};

use crate::arena::{NodeArena, NodeIdx};
use crate::component::{Component, Literal, Port, ValueType};
use crate::fingerprint::{put_str, Canonicalizable, HashValue, DOMAIN_DIAGRAM_V0};
use crate::params::{ExoCode, ParameterRecord, Provenance};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A diagram node: unique string id plus component kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    pub id: String,
    pub component: Component,
}

/// Where an edge's value comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeSource {
    /// The `out` port of another node.
    Node(NodeIdx),
    /// A typed constant.
    Literal(Literal),
}

/// A validated edge into `to`'s input `port`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub source: EdgeSource,
    pub to: NodeIdx,
    pub port: Port,
}

/// Diagram metadata carried alongside the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiagramMeta {
    /// Originating pattern id.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The pattern's 8-bit code, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits: Option<ExoCode>,
    #[serde(default = "default_provenance")]
    pub provenance: Provenance,
    #[serde(default)]
    pub params: ParameterRecord,
    /// Optional human-readable Boolean formula.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

fn default_provenance() -> Provenance {
    Provenance::Default
}

impl DiagramMeta {
    /// Metadata for a hand-written diagram: default parameters and provenance.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            bits: None,
            provenance: Provenance::Default,
            params: ParameterRecord::default(),
            formula: None,
        }
    }

    /// Sets the formula annotation.
    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }
}

/// Fatal structural problem in one diagram.
///
/// Every variant names the offending node or edge (edges by position).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructuralError {
    #[error("duplicate node id `{id}`")]
    DuplicateNode { id: String },
    #[error("edge {edge} references unknown node `{id}`")]
    UnknownNode { edge: usize, id: String },
    #[error("node `{node}` has unknown component kind `{name}`")]
    UnknownComponent { node: String, name: String },
    #[error("node `{node}` ({component}) has no port `{port}`")]
    UnknownPort {
        node: String,
        component: Component,
        port: String,
    },
    #[error("port `{port}` of node `{node}` is fed by more than one edge")]
    PortConflict { node: String, port: Port },
    #[error("edge {edge} into `{node}` has no free port left")]
    ExcessInput { node: String, edge: usize },
    #[error("required port `{port}` of node `{node}` is not wired")]
    UnfedPort { node: String, port: Port },
    #[error("port `{port}` of node `{node}` expects {expected}, got {found}")]
    TypeMismatch {
        node: String,
        port: Port,
        expected: ValueType,
        found: ValueType,
    },
    #[error("edge {edge} is malformed: {reason}")]
    MalformedEdge { edge: usize, reason: String },
    #[error("diagram has no output node")]
    MissingOutput,
    #[error("diagram has more than one output node: `{first}` and `{second}`")]
    MultipleOutputs { first: String, second: String },
    #[error("designated output {index} is not a node of this diagram")]
    UnknownOutput { index: NodeIdx },
    #[error("designated output `{node}` is not an output terminal")]
    OutputNotTerminal { node: String },
    #[error("cycle detected through nodes {nodes:?}")]
    Cycle { nodes: Vec<String> },
    #[error("node `{node}` does not reach the output")]
    Unreachable { node: String },
}

/// An immutable, validated wiring diagram.
#[derive(Debug, Clone)]
pub struct WiringDiagram {
    meta: DiagramMeta,
    nodes: NodeArena<Node>,
    edges: Vec<Edge>,
    /// Per node, its input wires in declared port order.
    wires: Vec<Vec<(Port, EdgeSource)>>,
    output: NodeIdx,
    order: Vec<NodeIdx>,
    interpretation: String,
}

impl WiringDiagram {
    /// Originating pattern id.
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn meta(&self) -> &DiagramMeta {
        &self.meta
    }

    pub fn interpretation(&self) -> &str {
        &self.interpretation
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns the node at `idx`.
    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx]
    }

    /// Iterates over nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIdx, &Node)> {
        self.nodes.iter()
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Finds a node by string id.
    pub fn find(&self, id: &str) -> Option<NodeIdx> {
        self.nodes.iter().find(|(_, n)| n.id == id).map(|(idx, _)| idx)
    }

    /// The output terminal.
    pub fn output(&self) -> NodeIdx {
        self.output
    }

    /// Input wires of `idx` in declared port order.
    pub fn inputs_of(&self, idx: NodeIdx) -> &[(Port, EdgeSource)] {
        &self.wires[idx.as_usize()]
    }

    /// Source feeding `port` of `idx`.
    pub fn input(&self, idx: NodeIdx, port: Port) -> Option<EdgeSource> {
        self.inputs_of(idx)
            .iter()
            .find(|(p, _)| *p == port)
            .map(|(_, src)| *src)
    }

    /// A valid evaluation order: every node after all of its inputs.
    pub fn topological_order(&self) -> &[NodeIdx] {
        &self.order
    }

    /// Components used by the diagram, with multiplicity, sorted by component.
    pub fn component_census(&self) -> Vec<(Component, usize)> {
        let mut counts = std::collections::BTreeMap::new();
        for (_, node) in self.nodes.iter() {
            *counts.entry(node.component).or_insert(0usize) += 1;
        }
        counts.into_iter().collect()
    }

    /// Structural fingerprint over the node and edge sets (order-independent).
    pub fn fingerprint(&self) -> HashValue {
        self.fingerprint_in(DOMAIN_DIAGRAM_V0)
    }
}

impl Canonicalizable for WiringDiagram {
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut nodes: Vec<Vec<u8>> = self
            .nodes
            .iter()
            .map(|(_, n)| {
                let mut b = Vec::new();
                put_str(&mut b, &n.id);
                put_str(&mut b, n.component.name());
                b
            })
            .collect();
        nodes.sort();

        let mut edges: Vec<Vec<u8>> = self
            .edges
            .iter()
            .map(|e| {
                let mut b = Vec::new();
                match e.source {
                    EdgeSource::Node(from) => {
                        b.push(0);
                        put_str(&mut b, &self.nodes[from].id);
                    }
                    EdgeSource::Literal(lit) => {
                        b.push(1);
                        b.extend_from_slice(&lit.canonical_bytes());
                    }
                }
                put_str(&mut b, &self.nodes[e.to].id);
                put_str(&mut b, e.port.name());
                b
            })
            .collect();
        edges.sort();

        let mut out = Vec::with_capacity(1024);
        out.extend_from_slice(&(nodes.len() as u64).to_le_bytes());
        for n in nodes {
            out.extend_from_slice(&n);
        }
        out.extend_from_slice(&(edges.len() as u64).to_le_bytes());
        for e in edges {
            out.extend_from_slice(&e);
        }
        put_str(&mut out, &self.nodes[self.output].id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_90(reverse_nodes: bool) -> WiringDiagram {
        let mut b = DiagramBuilder::new(DiagramMeta::new("rule-090").with_formula("L XOR R"));
        let names = [
            ("pred", Component::ContextPred),
            ("succ", Component::ContextSucc),
            ("xor-lr", Component::BitXor),
            ("output", Component::Output),
        ];
        let mut idx = std::collections::HashMap::new();
        let order: Vec<_> = if reverse_nodes {
            names.iter().rev().collect()
        } else {
            names.iter().collect()
        };
        for (id, c) in order {
            idx.insert(*id, b.node(*id, *c));
        }
        b.wire(idx["pred"], idx["xor-lr"], Port::A);
        b.wire(idx["succ"], idx["xor-lr"], Port::B);
        b.wire(idx["xor-lr"], idx["output"], Port::Sigil);
        b.finish().unwrap()
    }

    #[test]
    fn accessors() {
        let d = rule_90(false);
        assert_eq!(d.id(), "rule-090");
        assert_eq!(d.node_count(), 4);
        assert_eq!(d.edge_count(), 3);
        let xor = d.find("xor-lr").unwrap();
        assert_eq!(d.node(xor).component, Component::BitXor);
        assert_eq!(d.input(xor, Port::A), Some(EdgeSource::Node(d.find("pred").unwrap())));
        assert_eq!(d.node(d.output()).id, "output");
        assert_eq!(d.topological_order().len(), 4);
        assert_eq!(d.meta().formula.as_deref(), Some("L XOR R"));
    }

    #[test]
    fn fingerprint_ignores_insertion_order() {
        assert_eq!(rule_90(false).fingerprint(), rule_90(true).fingerprint());
    }

    #[test]
    fn census_counts_components() {
        let census = rule_90(false).component_census();
        assert!(census.contains(&(Component::BitXor, 1)));
        assert_eq!(census.iter().map(|(_, n)| n).sum::<usize>(), 4);
    }
}
