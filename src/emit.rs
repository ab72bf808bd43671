//! The emitted document model and serializer glue.
//!
//! A compile produces a [`Document`]: plain serde data describing the
//! microcontroller surface, every resolved component with its properties and
//! wiring, and the builder identifier the vehicle merge keys on. Artifacts
//! are pretty-printed JSON and parse back losslessly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::graph::{Circuit, ProducerId};
use crate::layout;
use crate::wire::SignalType;

/// Stamp identifying documents produced by this builder. The vehicle merge
/// only ever replaces microcontrollers carrying it.
pub const BUILDER_IDENTIFIER: &str = "built with wireloom v1";

/// Whether a surface node feeds the microcontroller or reads from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeMode {
    Input,
    Output,
}

/// One bound input port: which component output it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBinding {
    pub component_id: i32,
    pub node_index: u8,
}

/// A surface node (input or output) with its grid position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub component_id: i32,
    pub name: String,
    pub description: String,
    pub mode: NodeMode,
    pub signal_type: SignalType,
    pub position: (i32, i32),
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputBinding>,
}

/// One resolved component: stable kind id, properties, and bound inputs.
/// Unconnected ports are simply absent from `inputs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDef {
    pub component_id: i32,
    pub kind: String,
    pub kind_id: u32,
    pub position: (i32, i32),
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<PortBinding>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force_property: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub port: String,
    pub component_id: i32,
    pub node_index: u8,
}

/// The emitted microcontroller document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub description: String,
    pub width: i32,
    pub length: i32,
    pub builder: String,
    pub nodes: Vec<NodeDef>,
    pub components: Vec<ComponentDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Vec<Vec<bool>>>,
}

impl Document {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a document back from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// All wiring edges of the document: `(consumer id, port, producer id,
    /// node index)` tuples, including output-node bindings.
    pub fn wiring_edges(&self) -> Vec<(i32, String, i32, u8)> {
        let mut edges = Vec::new();
        for component in &self.components {
            for binding in &component.inputs {
                edges.push((
                    component.component_id,
                    binding.port.clone(),
                    binding.component_id,
                    binding.node_index,
                ));
            }
        }
        for node in &self.nodes {
            if let Some(input) = node.input {
                edges.push((
                    node.component_id,
                    "input".to_string(),
                    input.component_id,
                    input.node_index,
                ));
            }
        }
        edges
    }
}

pub(crate) struct DocumentMeta {
    pub name: String,
    pub description: String,
    pub width: i32,
    pub length: i32,
    pub icon: Option<Vec<Vec<bool>>>,
}

/// Assemble the document from the resolved graph: run layout, bind every
/// connected port, and decorate with the builder identifier and the
/// force-property marks of flagged property components.
pub(crate) fn emit_document(
    circuit: &Circuit,
    meta: DocumentMeta,
    nodes: Vec<NodeDef>,
    components: &[ProducerId],
) -> Document {
    let positions = layout::layout(circuit, components);
    let component_defs = components
        .iter()
        .map(|&id| {
            let block = circuit.block(id).expect("resolved component");
            let inputs = block
                .inputs
                .iter()
                .filter_map(|(port, wire)| {
                    circuit.component_id(wire).map(|component_id| PortBinding {
                        port: port.to_string(),
                        component_id,
                        node_index: wire.node_index(),
                    })
                })
                .collect();
            ComponentDef {
                component_id: block.component_id,
                kind: block.kind.name().to_string(),
                kind_id: block.kind.kind_id(),
                position: positions.get(&id).copied().unwrap_or((0, 0)),
                properties: block.kind.properties(),
                inputs,
                force_property: block.force_property && block.kind.is_property(),
            }
        })
        .collect();
    Document {
        name: meta.name,
        description: meta.description,
        width: meta.width,
        length: meta.length,
        builder: BUILDER_IDENTIFIER.to_string(),
        nodes,
        components: component_defs,
        icon: meta.icon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document {
            name: "sample".to_string(),
            description: "d".to_string(),
            width: 2,
            length: 2,
            builder: BUILDER_IDENTIFIER.to_string(),
            nodes: vec![NodeDef {
                component_id: 1,
                name: "Out".to_string(),
                description: String::new(),
                mode: NodeMode::Output,
                signal_type: SignalType::Number,
                position: (0, 0),
                input: Some(InputBinding {
                    component_id: 2,
                    node_index: 0,
                }),
            }],
            components: vec![ComponentDef {
                component_id: 2,
                kind: "number_function".to_string(),
                kind_id: 9,
                position: (0, 0),
                properties: Map::new(),
                inputs: vec![PortBinding {
                    port: "x_input".to_string(),
                    component_id: 3,
                    node_index: 0,
                }],
                force_property: false,
            }],
            icon: None,
        }
    }

    #[test]
    fn json_round_trip_preserves_wiring() {
        let doc = sample();
        let json = doc.to_json().unwrap();
        let parsed = Document::from_json(&json).unwrap();
        assert_eq!(parsed.wiring_edges(), doc.wiring_edges());
        assert_eq!(parsed.builder, BUILDER_IDENTIFIER);
    }

    #[test]
    fn wiring_edges_include_output_bindings() {
        let doc = sample();
        let edges = doc.wiring_edges();
        assert!(edges.contains(&(1, "input".to_string(), 2, 0)));
        assert!(edges.contains(&(2, "x_input".to_string(), 3, 0)));
    }
}
