//! The microcontroller root container and the compile pipeline.
//!
//! A [`Microcontroller`] owns the circuit it compiles: surface placement of
//! input markers and outputs on the 6x6 grid, side-effectful extras
//! (tooltips and declared properties, kept in declaration order), and the
//! `compile` entry point that runs the optimizer, the resolver, the
//! composite-write merger, layout and emit in sequence.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::blocks::{BlockKind, TooltipMode};
use crate::emit::{self, Document, DocumentMeta, InputBinding, NodeDef, NodeMode};
use crate::error::{Error, Result};
use crate::graph::{Block, Circuit, Inputs, Producer, ProducerId};
use crate::inline::optimize_arithmetic;
use crate::merge::merge_composite_writes;
use crate::wire::{BoolInput, NumInput, Wire};

/// Side length of the placement grid.
const GRID: i32 = 6;

/// The root container: a named circuit plus its surface placement.
pub struct Microcontroller {
    circuit: Circuit,
    name: String,
    description: String,
    save_name: String,
    width: i32,
    length: i32,
    /// Global switch; `stop_optimization` pins the whole compile.
    optimize: bool,
    nodes: Vec<NodeDef>,
    placed_inputs: HashSet<ProducerId>,
    placed_outputs: Vec<(Wire, usize)>,
    extras: Vec<ProducerId>,
    icon: Option<Vec<Vec<bool>>>,
    warned_placement: bool,
    next_node_id: i32,
}

impl Microcontroller {
    /// Takes ownership of the finished (or still growing) circuit. Defaults:
    /// 2x2 footprint, placeholder description, save name equal to the name.
    pub fn new(name: impl Into<String>, circuit: Circuit) -> Self {
        let name = name.into();
        Self {
            circuit,
            save_name: name.clone(),
            name,
            description: "No description set.".to_string(),
            width: 2,
            length: 2,
            optimize: true,
            nodes: Vec::new(),
            placed_inputs: HashSet::new(),
            placed_outputs: Vec::new(),
            extras: Vec::new(),
            icon: None,
            warned_placement: false,
            next_node_id: 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name used for the artifact file; defaults to the display name.
    pub fn save_name(&self) -> &str {
        &self.save_name
    }

    pub fn set_save_name(&mut self, save_name: impl Into<String>) {
        self.save_name = save_name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_size(&mut self, width: i32, length: i32) {
        self.width = width;
        self.length = length;
    }

    /// Disable every optimization pass for this compile.
    pub fn stop_optimization(&mut self) {
        self.optimize = false;
    }

    /// The owned circuit, for building more graph after construction.
    pub fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// A 16x16 monochrome icon stored alongside the document.
    pub fn set_icon(&mut self, pixels: Vec<Vec<bool>>) {
        self.icon = Some(pixels);
    }

    fn validate_placement(&mut self, x: i32, z: i32) -> Result<()> {
        if self.nodes.iter().any(|node| node.position == (x, z)) {
            return Err(Error::DuplicatePlacement { x, z });
        }
        if !(0..GRID).contains(&x) || !(0..GRID).contains(&z) {
            return Err(Error::OutOfBounds { x, z });
        }
        if x >= self.width || z >= self.length {
            if !self.warned_placement {
                warn!(
                    x,
                    z,
                    width = self.width,
                    length = self.length,
                    "node placed outside the declared footprint; expanding"
                );
                self.warned_placement = true;
            }
            self.width = self.width.max(x + 1);
            self.length = self.length.max(z + 1);
        }
        Ok(())
    }

    /// Place an input marker on the surface at `(x, z)`.
    pub fn place_input(&mut self, input: Wire, x: i32, z: i32) -> Result<()> {
        let producer = input.producer();
        let (name, description) = match self.circuit.producer(producer) {
            Producer::InputMarker(marker) => (marker.name.clone(), marker.description.clone()),
            other => {
                let found = match other {
                    Producer::Block(_) => "a primitive block",
                    Producer::Unconnected => "an unconnected wire",
                    Producer::Placeholder => "a placeholder",
                    Producer::InputMarker(_) => unreachable!(),
                };
                return Err(Error::TypeMismatch {
                    expected: "an input marker".to_string(),
                    found: found.to_string(),
                });
            }
        };
        if self.placed_inputs.contains(&producer) {
            return Err(Error::DuplicateName { name });
        }
        self.validate_placement(x, z)?;
        self.placed_inputs.insert(producer);
        let id = self.next_node_id;
        self.next_node_id += 1;
        if let Producer::InputMarker(marker) = self.circuit.producer_mut(producer) {
            marker.component_id = id;
        }
        self.nodes.push(NodeDef {
            component_id: id,
            name,
            description,
            mode: NodeMode::Input,
            signal_type: input.signal_type(),
            position: (x, z),
            input: None,
        });
        Ok(())
    }

    /// Place an output node fed by `source` at `(x, z)`.
    pub fn place_output(
        &mut self,
        source: Wire,
        name: impl Into<String>,
        description: impl Into<String>,
        x: i32,
        z: i32,
    ) -> Result<()> {
        self.validate_placement(x, z)?;
        let id = self.next_node_id;
        self.next_node_id += 1;
        self.nodes.push(NodeDef {
            component_id: id,
            name: name.into(),
            description: description.into(),
            mode: NodeMode::Output,
            signal_type: source.signal_type(),
            position: (x, z),
            input: None,
        });
        self.placed_outputs.push((source, self.nodes.len() - 1));
        Ok(())
    }

    /// A tooltip showing a number in the host UI. Extras keep declaration
    /// order so tooltips display in the order they were added.
    pub fn add_number_tooltip(
        &mut self,
        label: impl Into<String>,
        value: impl Into<NumInput>,
        is_error: impl Into<BoolInput>,
        mode: TooltipMode,
    ) {
        let value = self.circuit.number_input(value);
        let is_error = self.circuit.boolean_input(is_error);
        let mut inputs = Inputs::new();
        inputs.set("display_number_input", value);
        inputs.set("is_error_input", is_error);
        let id = self.circuit.insert_block(Block::new(
            BlockKind::TooltipNumber {
                label: label.into(),
                mode,
            },
            inputs,
        ));
        self.extras.push(id);
    }

    /// A tooltip showing an on/off state in the host UI.
    pub fn add_boolean_tooltip(
        &mut self,
        label: impl Into<String>,
        value: impl Into<BoolInput>,
        on_label: impl Into<String>,
        off_label: impl Into<String>,
        mode: TooltipMode,
    ) {
        let value = self.circuit.boolean_input(value);
        let mut inputs = Inputs::new();
        inputs.set("display_number_input", value);
        let id = self.circuit.insert_block(Block::new(
            BlockKind::TooltipBoolean {
                label: label.into(),
                on_label: on_label.into(),
                off_label: off_label.into(),
                mode,
            },
            inputs,
        ));
        self.extras.push(id);
    }

    /// Declare a property wire on the surface even when nothing reads it.
    pub fn add_property(&mut self, property: Wire) -> Result<()> {
        match self.circuit.block(property.producer()) {
            Some(block) if block.kind.is_property() => {
                self.extras.push(property.producer());
                Ok(())
            }
            _ => Err(Error::TypeMismatch {
                expected: "a property block".to_string(),
                found: "a non-property producer".to_string(),
            }),
        }
    }

    /// A text property, never wired; `force` makes its content override the
    /// value already stored in a vehicle on merge.
    pub fn add_text_property(
        &mut self,
        name: impl Into<String>,
        content: impl Into<String>,
        force: bool,
    ) {
        let mut block = Block::new(
            BlockKind::PropertyText {
                name: name.into(),
                value: content.into(),
            },
            Inputs::new(),
        );
        block.force_property = force;
        let id = self.circuit.insert_block(block);
        self.extras.push(id);
    }

    /// Reverse-reachability walk from the placed outputs and the extras:
    /// assigns component ids (extras first, in declaration order), validates
    /// that every reachable input marker was placed, and rejects surviving
    /// placeholders. Returns the component list in id order.
    fn resolve(&mut self) -> Result<Vec<ProducerId>> {
        let mut to_visit: Vec<ProducerId> = Vec::new();
        let mut visited: HashSet<ProducerId> = HashSet::new();
        let mut components: Vec<ProducerId> = Vec::new();
        let mut next_id = self.next_node_id;

        for (wire, _) in &self.placed_outputs {
            to_visit.push(wire.producer());
        }

        for &extra in &self.extras {
            if let Some(block) = self.circuit.block(extra) {
                for (_, wire) in block.inputs.iter() {
                    to_visit.push(wire.producer());
                }
            }
            visited.insert(extra);
            components.push(extra);
            if let Some(block) = self.circuit.block_mut(extra) {
                block.component_id = next_id;
                next_id += 1;
            }
        }

        enum Visit {
            Block(Vec<ProducerId>),
            Marker(String),
            Open,
            Pending,
        }

        while let Some(current) = to_visit.pop() {
            if !visited.insert(current) {
                continue;
            }
            let visit = match self.circuit.producer(current) {
                Producer::Block(block) => {
                    Visit::Block(block.inputs.iter().map(|(_, wire)| wire.producer()).collect())
                }
                Producer::InputMarker(marker) => Visit::Marker(marker.name.clone()),
                Producer::Unconnected => Visit::Open,
                Producer::Placeholder => Visit::Pending,
            };
            match visit {
                Visit::Block(inputs) => {
                    to_visit.extend(inputs);
                    components.push(current);
                    if let Some(block) = self.circuit.block_mut(current) {
                        block.component_id = next_id;
                        next_id += 1;
                    }
                }
                Visit::Marker(name) => {
                    if !self.placed_inputs.contains(&current) {
                        return Err(Error::UnplacedInput { name });
                    }
                }
                Visit::Open => {}
                Visit::Pending => return Err(Error::UnresolvedPlaceholder),
            }
        }

        // Bind each output node to its producer.
        for (wire, node_index) in &self.placed_outputs {
            let binding = self
                .circuit
                .component_id(*wire)
                .map(|component_id| InputBinding {
                    component_id,
                    node_index: wire.node_index(),
                });
            self.nodes[*node_index].input = binding;
        }

        debug!(
            components = components.len(),
            nodes = self.nodes.len(),
            "resolved microcontroller"
        );
        Ok(components)
    }

    /// Run the whole pipeline and emit the document.
    pub fn compile(&mut self) -> Result<Document> {
        if self.optimize {
            let extras = self.extras.clone();
            let mut outputs: Vec<Wire> =
                self.placed_outputs.iter().map(|(wire, _)| *wire).collect();
            optimize_arithmetic(&mut self.circuit, &extras, &mut outputs);
            for ((slot, _), wire) in self.placed_outputs.iter_mut().zip(outputs) {
                *slot = wire;
            }
        }
        let components = self.resolve()?;
        let output_wires: Vec<Wire> = self.placed_outputs.iter().map(|(wire, _)| *wire).collect();
        let components = merge_composite_writes(&mut self.circuit, components, &output_wires);
        let document = emit::emit_document(
            &self.circuit,
            DocumentMeta {
                name: self.name.clone(),
                description: self.description.clone(),
                width: self.width,
                length: self.length,
                icon: self.icon.clone(),
            },
            self.nodes.clone(),
            &components,
        );
        info!(
            name = %self.name,
            components = document.components.len(),
            "compiled microcontroller"
        );
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::BUILDER_IDENTIFIER;
    use crate::wire::SignalType;

    fn number_input(c: &mut Circuit, name: &str) -> Wire {
        c.input(SignalType::Number, name, "test input")
    }

    #[test]
    fn two_input_add_emits_three_components() {
        let mut c = Circuit::new();
        let a = number_input(&mut c, "A");
        let b = number_input(&mut c, "B");
        let sum = c.add(a, b);
        let mut mc = Microcontroller::new("adder", c);
        mc.place_input(a, 0, 0).unwrap();
        mc.place_input(b, 0, 1).unwrap();
        mc.place_output(sum, "Out", "sum of A and B", 1, 0).unwrap();
        let doc = mc.compile().unwrap();

        assert_eq!(doc.nodes.len(), 3);
        assert_eq!(doc.components.len(), 1);
        let fused = &doc.components[0];
        assert_eq!(
            fused.properties.get("function").and_then(|v| v.as_str()),
            Some("x+y")
        );
        // The output node reads the fused component.
        let out = doc
            .nodes
            .iter()
            .find(|n| n.mode == NodeMode::Output)
            .unwrap();
        assert_eq!(out.input.unwrap().component_id, fused.component_id);
        // Both markers feed it.
        let marker_ids: Vec<i32> = doc
            .nodes
            .iter()
            .filter(|n| n.mode == NodeMode::Input)
            .map(|n| n.component_id)
            .collect();
        let bound: Vec<i32> = fused.inputs.iter().map(|b| b.component_id).collect();
        assert_eq!(bound, marker_ids);
        assert_eq!(doc.builder, BUILDER_IDENTIFIER);
    }

    #[test]
    fn unplaced_input_fails_resolution() {
        let mut c = Circuit::new();
        let a = number_input(&mut c, "A");
        let sum = c.add(a, 1.0);
        let mut mc = Microcontroller::new("broken", c);
        mc.place_output(sum, "Out", "", 0, 0).unwrap();
        match mc.compile() {
            Err(Error::UnplacedInput { name }) => assert_eq!(name, "A"),
            other => panic!("expected UnplacedInput, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn unresolved_placeholder_fails_resolution() {
        let mut c = Circuit::new();
        let ph = c.placeholder(SignalType::Number);
        let sum = c.add(ph, 1.0);
        let mut mc = Microcontroller::new("broken", c);
        mc.stop_optimization();
        mc.place_output(sum, "Out", "", 0, 0).unwrap();
        assert!(matches!(mc.compile(), Err(Error::UnresolvedPlaceholder)));
    }

    #[test]
    fn duplicate_and_out_of_bounds_placement_are_rejected() {
        let mut c = Circuit::new();
        let a = number_input(&mut c, "A");
        let b = number_input(&mut c, "B");
        let mut mc = Microcontroller::new("grid", c);
        mc.place_input(a, 0, 0).unwrap();
        assert!(matches!(
            mc.place_input(b, 0, 0),
            Err(Error::DuplicatePlacement { x: 0, z: 0 })
        ));
        assert!(matches!(
            mc.place_input(b, 6, 0),
            Err(Error::OutOfBounds { x: 6, z: 0 })
        ));
        assert!(matches!(
            mc.place_input(a, 1, 0),
            Err(Error::DuplicateName { .. })
        ));
    }

    #[test]
    fn placement_outside_footprint_expands_it() {
        let mut c = Circuit::new();
        let a = number_input(&mut c, "A");
        let mut mc = Microcontroller::new("grow", c);
        mc.place_input(a, 4, 1).unwrap();
        let sum = {
            let c = mc.circuit_mut();
            c.add(a, 1.0)
        };
        mc.place_output(sum, "Out", "", 0, 0).unwrap();
        let doc = mc.compile().unwrap();
        assert_eq!(doc.width, 5);
        assert_eq!(doc.length, 2);
    }

    #[test]
    fn extras_get_ids_before_reachable_components_in_declaration_order() {
        let mut c = Circuit::new();
        let a = number_input(&mut c, "A");
        let sum = c.add(a, 1.0);
        let doubled = c.mul(sum, 2.0);
        let mut mc = Microcontroller::new("tooltips", c);
        mc.place_input(a, 0, 0).unwrap();
        mc.place_output(doubled, "Out", "", 1, 0).unwrap();
        mc.add_number_tooltip("first", sum, (), TooltipMode::Always);
        mc.add_number_tooltip("second", doubled, (), TooltipMode::Always);
        let doc = mc.compile().unwrap();
        // Nodes take ids 1..=2; tooltips get 3 and 4 in declaration order.
        let labels: Vec<(i32, String)> = doc
            .components
            .iter()
            .filter_map(|comp| {
                comp.properties
                    .get("label")
                    .and_then(|v| v.as_str())
                    .map(|label| (comp.component_id, label.to_string()))
            })
            .collect();
        assert_eq!(
            labels,
            vec![(3, "first".to_string()), (4, "second".to_string())]
        );
    }

    #[test]
    fn forced_text_property_is_marked_in_the_document() {
        let mut c = Circuit::new();
        let a = number_input(&mut c, "A");
        let sum = c.add(a, 0.0);
        let mut mc = Microcontroller::new("props", c);
        mc.place_input(a, 0, 0).unwrap();
        mc.place_output(sum, "Out", "", 1, 0).unwrap();
        mc.add_text_property("callsign", "WL-1", true);
        mc.add_text_property("notes", "unforced", false);
        let doc = mc.compile().unwrap();
        let forced: Vec<bool> = doc
            .components
            .iter()
            .filter(|comp| comp.kind == "property_text")
            .map(|comp| comp.force_property)
            .collect();
        assert_eq!(forced, vec![true, false]);
    }

    #[test]
    fn document_round_trip_preserves_wiring_edges() {
        let mut c = Circuit::new();
        let a = number_input(&mut c, "A");
        let b = number_input(&mut c, "B");
        let sum = c.add(a, b);
        let shifted = c.sub(sum, 5.0);
        let product = c.mul(shifted, sum);
        let mut mc = Microcontroller::new("roundtrip", c);
        mc.place_input(a, 0, 0).unwrap();
        mc.place_input(b, 0, 1).unwrap();
        mc.place_output(product, "Out", "", 1, 0).unwrap();
        let doc = mc.compile().unwrap();
        let json = doc.to_json().unwrap();
        let parsed = Document::from_json(&json).unwrap();
        assert_eq!(parsed.wiring_edges(), doc.wiring_edges());
    }

    #[test]
    fn optimization_can_be_disabled_globally() {
        let mut c = Circuit::new();
        let a = number_input(&mut c, "A");
        let b = number_input(&mut c, "B");
        let sum = c.add(a, b);
        let mut mc = Microcontroller::new("plain", c);
        mc.stop_optimization();
        mc.place_input(a, 0, 0).unwrap();
        mc.place_input(b, 0, 1).unwrap();
        mc.place_output(sum, "Out", "", 1, 0).unwrap();
        let doc = mc.compile().unwrap();
        assert_eq!(doc.components.len(), 1);
        assert_eq!(doc.components[0].kind, "add");
    }

    #[test]
    fn composite_write_chain_merges_through_the_pipeline() {
        let mut c = Circuit::new();
        let base = c.input(SignalType::Composite, "base", "");
        let a = number_input(&mut c, "A");
        let b = number_input(&mut c, "B");
        let first = c.composite_write_number(base, &[(1, a.into())]);
        let second = c.composite_write_number(first, &[(2, b.into())]);
        let mut mc = Microcontroller::new("composites", c);
        mc.place_input(base, 0, 0).unwrap();
        mc.place_input(a, 0, 1).unwrap();
        mc.place_input(b, 0, 2).unwrap();
        mc.place_output(second, "Out", "", 1, 0).unwrap();
        let doc = mc.compile().unwrap();
        let writes: Vec<&crate::emit::ComponentDef> = doc
            .components
            .iter()
            .filter(|comp| comp.kind == "composite_write_number")
            .collect();
        assert_eq!(writes.len(), 1);
        let ports: Vec<&str> = writes[0].inputs.iter().map(|b| b.port.as_str()).collect();
        assert!(ports.contains(&"channel_1_input"));
        assert!(ports.contains(&"channel_2_input"));
        assert!(ports.contains(&"composite_signal_input"));
    }

    #[test]
    fn integrator_cycle_compiles_to_a_self_referencing_component() {
        let mut c = Circuit::new();
        let x = number_input(&mut c, "x");
        let acc = c.placeholder(SignalType::Number);
        let next = c.add(acc, x);
        c.replace_producer(acc, next);
        let mut mc = Microcontroller::new("integrator", c);
        mc.place_input(x, 0, 0).unwrap();
        mc.place_output(acc, "Sum", "", 1, 0).unwrap();
        let doc = mc.compile().unwrap();
        let fused = doc
            .components
            .iter()
            .find(|comp| comp.properties.get("function").is_some())
            .expect("fused function emitted");
        assert!(
            fused
                .inputs
                .iter()
                .any(|b| b.component_id == fused.component_id),
            "at least one input references the component itself"
        );
    }
}
