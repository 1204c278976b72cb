//! Serialized form of a wiring diagram.
//!
//! A `WiringDocument` has three sections: `meta`, `diagram` (ordered nodes,
//! ordered edges, output id), and `interpretation`. Documents are read and
//! written as pretty JSON, and can be snapshotted as CBOR. Edges may omit
//! `to-port`; such edges are assigned ports positionally when the document is
//! turned back into a diagram.

use super::{DiagramBuilder, DiagramMeta, EdgeSource, StructuralError, WiringDiagram};
use crate::component::{Component, Literal, Port};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors reading or writing diagram documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CBOR error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// Top-level document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WiringDocument {
    pub meta: DiagramMeta,
    pub diagram: DiagramSection,
    #[serde(default)]
    pub interpretation: String,
}

/// The `diagram` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramSection {
    pub nodes: Vec<NodeEntry>,
    pub edges: Vec<EdgeEntry>,
    #[serde(default = "default_output")]
    pub output: String,
}

fn default_output() -> String {
    "output".to_string()
}

/// A node entry. The component is kept as text so an unknown kind can be
/// reported against its node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: String,
    pub component: String,
}

/// An edge entry: exactly one of `from` or `literal` is set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EdgeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<Literal>,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_port: Option<String>,
}

impl WiringDiagram {
    /// Renders the diagram as a document, nodes and edges in insertion order.
    pub fn to_document(&self) -> WiringDocument {
        let nodes = self
            .nodes()
            .map(|(_, n)| NodeEntry {
                id: n.id.clone(),
                component: n.component.name().to_string(),
            })
            .collect();
        let edges = self
            .edges()
            .iter()
            .map(|e| {
                let (from, literal) = match e.source {
                    EdgeSource::Node(idx) => (Some(self.node(idx).id.clone()), None),
                    EdgeSource::Literal(lit) => (None, Some(lit)),
                };
                EdgeEntry {
                    from,
                    from_port: None,
                    literal,
                    to: self.node(e.to).id.clone(),
                    to_port: Some(e.port.name().to_string()),
                }
            })
            .collect();
        WiringDocument {
            meta: self.meta().clone(),
            diagram: DiagramSection {
                nodes,
                edges,
                output: self.node(self.output()).id.clone(),
            },
            interpretation: self.interpretation().to_string(),
        }
    }

    /// Builds and validates a diagram from a document.
    pub fn from_document(doc: &WiringDocument) -> Result<Self, StructuralError> {
        let mut builder = DiagramBuilder::new(doc.meta.clone());
        let mut index = HashMap::with_capacity(doc.diagram.nodes.len());
        for entry in &doc.diagram.nodes {
            let component = Component::from_name(&entry.component).ok_or_else(|| StructuralError::UnknownComponent {
                node: entry.id.clone(),
                name: entry.component.clone(),
            })?;
            let idx = builder.node(entry.id.clone(), component);
            // duplicates are reported by `finish`; keep the first for lookups
            index.entry(entry.id.as_str()).or_insert((idx, component));
        }

        for (i, edge) in doc.diagram.edges.iter().enumerate() {
            let &(to, to_component) = index.get(edge.to.as_str()).ok_or_else(|| StructuralError::UnknownNode {
                edge: i,
                id: edge.to.clone(),
            })?;
            let port = match &edge.to_port {
                Some(name) => Some(Port::from_name(name.trim_start_matches(':')).ok_or_else(|| {
                    StructuralError::UnknownPort {
                        node: edge.to.clone(),
                        component: to_component,
                        port: name.clone(),
                    }
                })?),
                None => None,
            };
            match (&edge.from, edge.literal) {
                (Some(from), None) => {
                    let &(from_idx, from_component) =
                        index.get(from.as_str()).ok_or_else(|| StructuralError::UnknownNode {
                            edge: i,
                            id: from.clone(),
                        })?;
                    if let Some(fp) = edge.from_port.as_deref() {
                        if fp.trim_start_matches(':') != Port::Out.name() {
                            return Err(StructuralError::UnknownPort {
                                node: from.clone(),
                                component: from_component,
                                port: fp.to_string(),
                            });
                        }
                    }
                    match port {
                        Some(p) => builder.wire(from_idx, to, p),
                        None => builder.wire_positional(from_idx, to),
                    };
                }
                (None, Some(lit)) => {
                    builder.literal(lit, to, port);
                }
                (Some(_), Some(_)) => {
                    return Err(StructuralError::MalformedEdge {
                        edge: i,
                        reason: "both `from` and `literal` are set".into(),
                    })
                }
                (None, None) => {
                    return Err(StructuralError::MalformedEdge {
                        edge: i,
                        reason: "neither `from` nor `literal` is set".into(),
                    })
                }
            }
        }

        let output = index
            .get(doc.diagram.output.as_str())
            .map(|(idx, _)| *idx)
            .ok_or_else(|| StructuralError::UnknownNode {
                edge: doc.diagram.edges.len(),
                id: doc.diagram.output.clone(),
            })?;
        builder.set_output(output).interpretation(doc.interpretation.clone());
        builder.finish()
    }

    /// Pretty JSON rendering.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Parses and validates a JSON document.
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        let doc: WiringDocument = serde_json::from_str(text)?;
        Ok(Self::from_document(&doc)?)
    }

    /// Compact CBOR snapshot of the document.
    pub fn to_cbor(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(serde_cbor::to_vec(&self.to_document())?)
    }

    /// Restores a diagram from a CBOR snapshot.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, DocumentError> {
        let doc: WiringDocument = serde_cbor::from_slice(bytes)?;
        Ok(Self::from_document(&doc)?)
    }

    /// Writes the JSON document to `path`.
    pub fn save_json(&self, path: &Path) -> Result<(), DocumentError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Reads a JSON document from `path`.
    pub fn load_json(path: &Path) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
