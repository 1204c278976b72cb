//! Diagram construction and structural validation.
//!
//! `DiagramBuilder` collects nodes and edges without checking them, then
//! `finish` validates the whole graph in one pass and freezes it into a
//! `WiringDiagram`. Validation order is fixed so the first reported error is
//! deterministic: ids, ports, types, output, cycles, reachability.
//!
//! # Citations
//! - Topological order: Kahn, "Topological sorting of large networks",
//!   Commun. ACM 5(11) (1962)

use super::{DiagramMeta, Edge, EdgeSource, Node, StructuralError, WiringDiagram};
use crate::arena::{NodeArena, NodeIdx};
use crate::component::{Component, Literal, Port};
use std::collections::{HashMap, HashSet, VecDeque};

/// An edge as written, before port resolution.
#[derive(Debug, Clone, Copy)]
struct PendingEdge {
    source: EdgeSource,
    to: NodeIdx,
    /// `None` asks for positional assignment.
    port: Option<Port>,
}

/// Incremental builder for `WiringDiagram`.
#[derive(Debug, Clone)]
pub struct DiagramBuilder {
    meta: DiagramMeta,
    nodes: NodeArena<Node>,
    edges: Vec<PendingEdge>,
    output: Option<NodeIdx>,
    interpretation: String,
}

impl DiagramBuilder {
    /// Starts an empty diagram.
    pub fn new(meta: DiagramMeta) -> Self {
        Self {
            meta,
            nodes: NodeArena::with_capacity(16),
            edges: Vec::with_capacity(24),
            output: None,
            interpretation: String::new(),
        }
    }

    /// Adds a node. Duplicate ids are reported by `finish`.
    pub fn node(&mut self, id: impl Into<String>, component: Component) -> NodeIdx {
        self.nodes.allocate(Node {
            id: id.into(),
            component,
        })
    }

    /// Adds a data edge from `from`'s output into `to`'s `port`.
    pub fn wire(&mut self, from: NodeIdx, to: NodeIdx, port: Port) -> &mut Self {
        self.edges.push(PendingEdge {
            source: EdgeSource::Node(from),
            to,
            port: Some(port),
        });
        self
    }

    /// Adds a data edge whose destination port is assigned positionally.
    pub fn wire_positional(&mut self, from: NodeIdx, to: NodeIdx) -> &mut Self {
        self.edges.push(PendingEdge {
            source: EdgeSource::Node(from),
            to,
            port: None,
        });
        self
    }

    /// Adds a literal edge into `to`'s `port`.
    pub fn literal(&mut self, value: Literal, to: NodeIdx, port: Option<Port>) -> &mut Self {
        self.edges.push(PendingEdge {
            source: EdgeSource::Literal(value),
            to,
            port,
        });
        self
    }

    /// Designates the output node. Defaults to the unique output terminal.
    pub fn set_output(&mut self, node: NodeIdx) -> &mut Self {
        self.output = Some(node);
        self
    }

    /// Sets the free-text interpretation.
    pub fn interpretation(&mut self, text: impl Into<String>) -> &mut Self {
        self.interpretation = text.into();
        self
    }

    /// Looks up a node added earlier by id.
    pub fn find(&self, id: &str) -> Option<NodeIdx> {
        self.nodes.iter().find(|(_, n)| n.id == id).map(|(idx, _)| idx)
    }

    /// Validates and freezes the diagram.
    pub fn finish(self) -> Result<WiringDiagram, StructuralError> {
        let DiagramBuilder {
            meta,
            nodes,
            edges,
            output,
            interpretation,
        } = self;

        check_unique_ids(&nodes)?;
        let resolved = resolve_ports(&nodes, &edges)?;
        let wires = collect_wires(&nodes, &resolved)?;
        let output = check_output(&nodes, output)?;
        let order = topological_order(&nodes, &resolved)?;
        check_reaches_output(&nodes, &resolved, output)?;

        tracing::trace!(
            diagram = %meta.id,
            nodes = nodes.len(),
            edges = resolved.len(),
            "diagram validated"
        );
        Ok(WiringDiagram {
            meta,
            nodes,
            edges: resolved,
            wires,
            output,
            order,
            interpretation,
        })
    }
}

fn check_unique_ids(nodes: &NodeArena<Node>) -> Result<(), StructuralError> {
    let mut seen = HashSet::with_capacity(nodes.len());
    for (_, node) in nodes.iter() {
        if !seen.insert(node.id.as_str()) {
            return Err(StructuralError::DuplicateNode { id: node.id.clone() });
        }
    }
    Ok(())
}

/// Assigns every pending edge a concrete port and checks its type.
///
/// Named edges claim their ports first; unnamed edges then fill the remaining
/// declared ports of their node in edge order.
fn resolve_ports(nodes: &NodeArena<Node>, pending: &[PendingEdge]) -> Result<Vec<Edge>, StructuralError> {
    let mut claimed: HashMap<(NodeIdx, Port), usize> = HashMap::new();
    let mut ports: Vec<Option<Port>> = vec![None; pending.len()];

    for (i, e) in pending.iter().enumerate() {
        check_in_bounds(nodes, e, i)?;
        if let Some(port) = e.port {
            let node = &nodes[e.to];
            if node.component.input(port).is_none() {
                return Err(StructuralError::UnknownPort {
                    node: node.id.clone(),
                    component: node.component,
                    port: port.name().to_string(),
                });
            }
            if claimed.insert((e.to, port), i).is_some() {
                return Err(StructuralError::PortConflict {
                    node: node.id.clone(),
                    port,
                });
            }
            ports[i] = Some(port);
        }
    }

    for (i, e) in pending.iter().enumerate() {
        if e.port.is_some() {
            continue;
        }
        let node = &nodes[e.to];
        let free = node
            .component
            .inputs()
            .iter()
            .map(|s| s.port)
            .find(|p| !claimed.contains_key(&(e.to, *p)));
        match free {
            Some(port) => {
                claimed.insert((e.to, port), i);
                ports[i] = Some(port);
            }
            None => {
                return Err(StructuralError::ExcessInput {
                    node: node.id.clone(),
                    edge: i,
                })
            }
        }
    }

    pending
        .iter()
        .zip(ports)
        .enumerate()
        .map(|(i, (e, port))| {
            let port = port.ok_or_else(|| StructuralError::MalformedEdge {
                edge: i,
                reason: "unresolved port".into(),
            })?;
            check_type(nodes, e.source, e.to, port)?;
            Ok(Edge {
                source: e.source,
                to: e.to,
                port,
            })
        })
        .collect()
}

fn check_in_bounds(nodes: &NodeArena<Node>, e: &PendingEdge, i: usize) -> Result<(), StructuralError> {
    let missing = |idx: NodeIdx| StructuralError::UnknownNode {
        edge: i,
        id: idx.to_string(),
    };
    if nodes.get(e.to).is_none() {
        return Err(missing(e.to));
    }
    if let EdgeSource::Node(from) = e.source {
        if nodes.get(from).is_none() {
            return Err(missing(from));
        }
    }
    Ok(())
}

fn check_type(
    nodes: &NodeArena<Node>,
    source: EdgeSource,
    to: NodeIdx,
    port: Port,
) -> Result<(), StructuralError> {
    let node = &nodes[to];
    let Some(spec) = node.component.input(port) else {
        return Err(StructuralError::UnknownPort {
            node: node.id.clone(),
            component: node.component,
            port: port.name().to_string(),
        });
    };
    let found = match source {
        EdgeSource::Node(from) => nodes[from].component.output_type(),
        EdgeSource::Literal(lit) => lit.value_type(),
    };
    if found.feeds(spec.ty) {
        Ok(())
    } else {
        Err(StructuralError::TypeMismatch {
            node: node.id.clone(),
            port,
            expected: spec.ty,
            found,
        })
    }
}

/// Groups resolved edges per node in declared port order; every port must be fed.
fn collect_wires(
    nodes: &NodeArena<Node>,
    edges: &[Edge],
) -> Result<Vec<Vec<(Port, EdgeSource)>>, StructuralError> {
    let mut by_port: HashMap<(NodeIdx, Port), EdgeSource> = HashMap::with_capacity(edges.len());
    for e in edges {
        by_port.insert((e.to, e.port), e.source);
    }
    nodes
        .iter()
        .map(|(idx, node)| {
            node.component
                .inputs()
                .iter()
                .map(|spec| {
                    by_port
                        .get(&(idx, spec.port))
                        .map(|src| (spec.port, *src))
                        .ok_or_else(|| StructuralError::UnfedPort {
                            node: node.id.clone(),
                            port: spec.port,
                        })
                })
                .collect()
        })
        .collect()
}

fn check_output(nodes: &NodeArena<Node>, designated: Option<NodeIdx>) -> Result<NodeIdx, StructuralError> {
    let mut terminals = nodes.iter().filter(|(_, n)| n.component == Component::Output);
    let first = terminals.next();
    if let (Some((_, a)), Some((_, b))) = (first, terminals.next()) {
        return Err(StructuralError::MultipleOutputs {
            first: a.id.clone(),
            second: b.id.clone(),
        });
    }
    match (designated, first) {
        (Some(idx), _) => match nodes.get(idx) {
            None => Err(StructuralError::UnknownOutput { index: idx }),
            Some(node) if node.component != Component::Output => Err(StructuralError::OutputNotTerminal {
                node: node.id.clone(),
            }),
            Some(_) => Ok(idx),
        },
        (None, Some((idx, _))) => Ok(idx),
        (None, None) => Err(StructuralError::MissingOutput),
    }
}

/// Kahn's algorithm over data edges; ties broken by node index.
fn topological_order(nodes: &NodeArena<Node>, edges: &[Edge]) -> Result<Vec<NodeIdx>, StructuralError> {
    let n = nodes.len();
    let mut indegree = vec![0usize; n];
    let mut successors: Vec<Vec<NodeIdx>> = vec![Vec::new(); n];
    for e in edges {
        if let EdgeSource::Node(from) = e.source {
            successors[from.as_usize()].push(e.to);
            indegree[e.to.as_usize()] += 1;
        }
    }
    for succs in successors.iter_mut() {
        succs.sort();
    }

    let mut queue: VecDeque<NodeIdx> = nodes.indices().filter(|i| indegree[i.as_usize()] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(v) = queue.pop_front() {
        order.push(v);
        for &u in &successors[v.as_usize()] {
            let deg = &mut indegree[u.as_usize()];
            *deg -= 1;
            if *deg == 0 {
                queue.push_back(u);
            }
        }
    }

    if order.len() != n {
        let stuck = nodes
            .iter()
            .filter(|(i, _)| indegree[i.as_usize()] > 0)
            .map(|(_, node)| node.id.clone())
            .collect();
        return Err(StructuralError::Cycle { nodes: stuck });
    }
    Ok(order)
}

/// Every non-source node must feed the output, directly or transitively.
fn check_reaches_output(nodes: &NodeArena<Node>, edges: &[Edge], output: NodeIdx) -> Result<(), StructuralError> {
    let mut feeders: Vec<Vec<NodeIdx>> = vec![Vec::new(); nodes.len()];
    for e in edges {
        if let EdgeSource::Node(from) = e.source {
            feeders[e.to.as_usize()].push(from);
        }
    }
    let mut reached = vec![false; nodes.len()];
    let mut stack = vec![output];
    reached[output.as_usize()] = true;
    while let Some(v) = stack.pop() {
        for &f in &feeders[v.as_usize()] {
            if !reached[f.as_usize()] {
                reached[f.as_usize()] = true;
                stack.push(f);
            }
        }
    }
    match nodes
        .iter()
        .find(|(idx, node)| !reached[idx.as_usize()] && !node.component.is_source())
    {
        Some((_, node)) => Err(StructuralError::Unreachable { node: node.id.clone() }),
        None => Ok(()),
    }
}
