//! The producer arena and circuit-building core.
//!
//! A [`Circuit`] owns every producer created while composing a graph. The
//! arena is a [`SlotMap`] so producers have stable ids that survive
//! rewriting; a placeholder is just a slot whose record is patched in place
//! once the cycle it forward-declares can be closed. Wires are handed out as
//! copyable values (see [`crate::wire`]), so nothing outside the circuit
//! ever holds a reference into the arena.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use slotmap::{new_key_type, SlotMap};
use tracing::warn;

use crate::blocks::BlockKind;
use crate::wire::{BoolInput, LinkInput, NumInput, SignalType, Wire, WireId};

new_key_type! {
    /// Stable id of a producer record within its circuit's arena.
    pub struct ProducerId;
}

/// An external-input node. Ids are assigned when the marker is placed on the
/// microcontroller surface.
#[derive(Debug, Clone)]
pub struct InputMarker {
    pub name: String,
    pub description: String,
    pub component_id: i32,
}

/// One primitive signal-processing block plus its wiring.
#[derive(Debug, Clone)]
pub struct Block {
    pub kind: BlockKind,
    pub inputs: Inputs,
    /// Assigned by the resolver; -1 until then.
    pub component_id: i32,
    /// When false the optimizer must neither rewrite this block nor fold it
    /// into a consumer.
    pub optimize: bool,
    /// Marks a property whose value overrides an already-defined vehicle
    /// property on merge.
    pub force_property: bool,
}

impl Block {
    pub fn new(kind: BlockKind, inputs: Inputs) -> Self {
        Self {
            kind,
            inputs,
            component_id: -1,
            optimize: true,
            force_property: false,
        }
    }
}

/// A node that emits wires.
#[derive(Debug, Clone)]
pub enum Producer {
    Block(Block),
    /// Sentinel for "no input"; serializes as an absent input.
    Unconnected,
    /// Forward declaration for cycle construction. Must be replaced before
    /// the resolver runs.
    Placeholder,
    InputMarker(InputMarker),
}

/// Insertion-ordered mapping from input-port name to wire.
///
/// Port names are unique; order is irrelevant for semantics but preserved
/// bit-exactly, which matters for composite channel ports and for every
/// deterministic iteration the optimizer performs.
#[derive(Debug, Clone, Default)]
pub struct Inputs(Vec<(String, Wire)>);

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Wire> {
        self.0
            .iter()
            .find(|(port, _)| port == name)
            .map(|&(_, wire)| wire)
    }

    /// Insert or replace, keeping the original position on replace.
    pub fn set(&mut self, name: impl Into<String>, wire: Wire) {
        let name = name.into();
        if let Some(entry) = self.0.iter_mut().find(|(port, _)| *port == name) {
            entry.1 = wire;
        } else {
            self.0.push((name, wire));
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Wire> {
        let index = self.0.iter().position(|(port, _)| port == name)?;
        Some(self.0.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Wire)> {
        self.0.iter().map(|(port, wire)| (port.as_str(), *wire))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Wire)> {
        self.0.iter_mut().map(|(port, wire)| (port.as_str(), wire))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Wire)> for Inputs {
    fn from_iter<I: IntoIterator<Item = (String, Wire)>>(iter: I) -> Self {
        let mut inputs = Inputs::new();
        for (name, wire) in iter {
            inputs.set(name, wire);
        }
        inputs
    }
}

/// The arena of producers plus the wire factory.
///
/// All graph construction goes through a circuit: primitive constructors
/// (see the methods defined in [`crate::blocks`]), coercion of literals,
/// and placeholder patching.
pub struct Circuit {
    producers: SlotMap<ProducerId, Producer>,
    unconnected: ProducerId,
    next_wire: u64,
    /// Producers whose composite channels were assigned through the
    /// value-returning write API; mixing that with in-place channel
    /// assignment on the same producer earns a warning.
    set_via_write: HashSet<ProducerId>,
}

impl Circuit {
    pub fn new() -> Self {
        let mut producers = SlotMap::with_key();
        let unconnected = producers.insert(Producer::Unconnected);
        Self {
            producers,
            unconnected,
            next_wire: 0,
            set_via_write: HashSet::new(),
        }
    }

    pub(crate) fn fresh_wire(
        &mut self,
        ty: SignalType,
        producer: ProducerId,
        node_index: u8,
    ) -> Wire {
        let id = WireId(self.next_wire);
        self.next_wire += 1;
        Wire {
            id,
            ty,
            producer,
            node_index,
        }
    }

    pub(crate) fn insert_block(&mut self, block: Block) -> ProducerId {
        self.producers.insert(Producer::Block(block))
    }

    pub(crate) fn block_wire(&mut self, ty: SignalType, block: Block) -> Wire {
        let id = self.insert_block(block);
        self.fresh_wire(ty, id, 0)
    }

    /// An external-input node for the microcontroller.
    pub fn input(
        &mut self,
        ty: SignalType,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Wire {
        let marker = self.producers.insert(Producer::InputMarker(InputMarker {
            name: name.into(),
            description: description.into(),
            component_id: -1,
        }));
        self.fresh_wire(ty, marker, 0)
    }

    /// A wire with no producer. Valid anywhere an input may be left open.
    pub fn unconnected(&mut self, ty: SignalType) -> Wire {
        let producer = self.unconnected;
        self.fresh_wire(ty, producer, 0)
    }

    /// A forward-declared producer for building cycles. Must be patched with
    /// [`Circuit::replace_producer`] before the circuit resolves.
    pub fn placeholder(&mut self, ty: SignalType) -> Wire {
        let producer = self.producers.insert(Producer::Placeholder);
        self.fresh_wire(ty, producer, 0)
    }

    /// Patch a placeholder's slot with the producer of `source`, closing a
    /// cycle. Every wire observing the placeholder sees the new record.
    ///
    /// # Panics
    ///
    /// Panics if the wire types differ or if `target` is not backed by a
    /// placeholder.
    pub fn replace_producer(&mut self, target: Wire, source: Wire) {
        assert_eq!(
            target.signal_type(),
            source.signal_type(),
            "wire type mismatch: expected {}, got {}",
            target.signal_type(),
            source.signal_type()
        );
        assert!(
            matches!(self.producers[target.producer()], Producer::Placeholder),
            "replace_producer target must be a placeholder"
        );
        let record = self.producers[source.producer()].clone();
        self.producers[target.producer()] = record;
    }

    /// Pin a block so the optimizer neither rewrites it nor folds it into a
    /// consumer. Returns the wire for chaining.
    pub fn stop_optimization(&mut self, wire: Wire) -> Wire {
        if let Producer::Block(block) = &mut self.producers[wire.producer()] {
            block.optimize = false;
        }
        wire
    }

    /// Mark a property block so its value overrides an already-defined
    /// vehicle property on merge. Returns the wire for chaining.
    pub fn force_property(&mut self, wire: Wire) -> Wire {
        if let Producer::Block(block) = &mut self.producers[wire.producer()] {
            block.force_property = true;
        }
        wire
    }

    // ---------------------------------------------------------------------
    // Arena access
    // ---------------------------------------------------------------------

    pub(crate) fn producer(&self, id: ProducerId) -> &Producer {
        &self.producers[id]
    }

    pub(crate) fn producer_mut(&mut self, id: ProducerId) -> &mut Producer {
        &mut self.producers[id]
    }

    pub(crate) fn block(&self, id: ProducerId) -> Option<&Block> {
        match &self.producers[id] {
            Producer::Block(block) => Some(block),
            _ => None,
        }
    }

    pub(crate) fn block_mut(&mut self, id: ProducerId) -> Option<&mut Block> {
        match &mut self.producers[id] {
            Producer::Block(block) => Some(block),
            _ => None,
        }
    }

    pub(crate) fn is_unconnected(&self, id: ProducerId) -> bool {
        matches!(self.producers[id], Producer::Unconnected)
    }

    /// Number of connected inputs of a block.
    pub(crate) fn live_input_count(&self, id: ProducerId) -> usize {
        match self.block(id) {
            Some(block) => block
                .inputs
                .iter()
                .filter(|&(_, wire)| !self.is_unconnected(wire.producer()))
                .count(),
            None => 0,
        }
    }

    /// The component id a wire's producer resolved to, or `None` for an
    /// unconnected wire (which serializes as an absent input).
    ///
    /// # Panics
    ///
    /// Panics if the producer is still a placeholder; placeholders must be
    /// replaced before compiling.
    pub fn component_id(&self, wire: Wire) -> Option<i32> {
        match &self.producers[wire.producer()] {
            Producer::Block(block) => Some(block.component_id),
            Producer::InputMarker(marker) => Some(marker.component_id),
            Producer::Unconnected => None,
            Producer::Placeholder => {
                panic!("placeholder must be replaced before compiling")
            }
        }
    }

    // ---------------------------------------------------------------------
    // Coercion
    // ---------------------------------------------------------------------

    fn checked(&self, wire: Wire, expected: SignalType) -> Wire {
        assert_eq!(
            wire.signal_type(),
            expected,
            "wire type mismatch: expected {}, got {}",
            expected,
            wire.signal_type()
        );
        wire
    }

    /// Coerce a number-port argument: wires pass through after a type check,
    /// literals become constant blocks, absence becomes unconnected.
    pub fn number_input(&mut self, input: impl Into<NumInput>) -> Wire {
        match input.into() {
            NumInput::Wire(wire) => self.checked(wire, SignalType::Number),
            NumInput::Value(value) => self.block_wire(
                SignalType::Number,
                Block::new(BlockKind::ConstantNumber { value }, Inputs::new()),
            ),
            NumInput::None => self.unconnected(SignalType::Number),
        }
    }

    /// Coerce a boolean-port argument. `true` becomes a constant-on block;
    /// `false` and absence both become unconnected.
    pub fn boolean_input(&mut self, input: impl Into<BoolInput>) -> Wire {
        match input.into() {
            BoolInput::Wire(wire) => self.checked(wire, SignalType::Boolean),
            BoolInput::Value(true) => self.block_wire(
                SignalType::Boolean,
                Block::new(BlockKind::ConstantOn, Inputs::new()),
            ),
            BoolInput::Value(false) | BoolInput::None => self.unconnected(SignalType::Boolean),
        }
    }

    pub fn link_input(&mut self, ty: SignalType, input: impl Into<LinkInput>) -> Wire {
        match input.into() {
            LinkInput::Wire(wire) => self.checked(wire, ty),
            LinkInput::None => self.unconnected(ty),
        }
    }

    // ---------------------------------------------------------------------
    // Composite index/slice sugar
    // ---------------------------------------------------------------------

    /// Reads a 1-indexed inclusive range of number channels, one read block
    /// per channel.
    pub fn composite_slice_read(
        &mut self,
        composite: Wire,
        channels: RangeInclusive<u8>,
    ) -> Vec<Wire> {
        channels
            .map(|channel| self.composite_read_number(composite, channel))
            .collect()
    }

    /// Reads a 1-indexed inclusive range of on/off channels.
    pub fn composite_slice_read_boolean(
        &mut self,
        composite: Wire,
        channels: RangeInclusive<u8>,
    ) -> Vec<Wire> {
        channels
            .map(|channel| self.composite_read_boolean(composite, channel))
            .collect()
    }

    /// Slice assignment: rebinds `composite` to a single write block carrying
    /// `values` on the given channel range.
    ///
    /// # Panics
    ///
    /// Panics if the value count does not match the range length, or if a
    /// channel falls outside 1..=32.
    pub fn composite_slice_write(
        &mut self,
        composite: &mut Wire,
        channels: RangeInclusive<u8>,
        values: &[Wire],
    ) {
        assert_eq!(
            values.len(),
            channels.clone().count(),
            "value count must match the channel range"
        );
        self.warn_if_mixed_write_apis(composite.producer());
        let bound: Vec<(u8, NumInput)> = channels
            .zip(values.iter().copied())
            .map(|(channel, wire)| (channel, NumInput::from(wire)))
            .collect();
        *composite = self.composite_write_number(*composite, &bound);
    }

    /// Slice assignment for on/off channels.
    ///
    /// # Panics
    ///
    /// Panics if the value count does not match the range length, or if a
    /// channel falls outside 1..=32.
    pub fn composite_slice_write_boolean(
        &mut self,
        composite: &mut Wire,
        channels: RangeInclusive<u8>,
        values: &[Wire],
    ) {
        assert_eq!(
            values.len(),
            channels.clone().count(),
            "value count must match the channel range"
        );
        self.warn_if_mixed_write_apis(composite.producer());
        let bound: Vec<(u8, BoolInput)> = channels
            .zip(values.iter().copied())
            .map(|(channel, wire)| (channel, BoolInput::from(wire)))
            .collect();
        *composite = self.composite_write_boolean(*composite, &bound);
    }

    pub(crate) fn note_written_via_value_api(&mut self, id: ProducerId) {
        self.set_via_write.insert(id);
    }

    pub(crate) fn warn_if_mixed_write_apis(&mut self, id: ProducerId) {
        if self.set_via_write.contains(&id) {
            warn!(
                "mixing in-place channel assignment and the value-returning \
                 write API on the same composite wire may behave surprisingly"
            );
        }
    }
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_preserve_insertion_order() {
        let mut c = Circuit::new();
        let a = c.unconnected(SignalType::Number);
        let b = c.unconnected(SignalType::Number);
        let mut inputs = Inputs::new();
        inputs.set("b_input", b);
        inputs.set("a_input", a);
        let order: Vec<&str> = inputs.iter().map(|(name, _)| name).collect();
        assert_eq!(order, ["b_input", "a_input"]);

        // Replacing keeps the slot where it was.
        inputs.set("b_input", a);
        let order: Vec<&str> = inputs.iter().map(|(name, _)| name).collect();
        assert_eq!(order, ["b_input", "a_input"]);
    }

    #[test]
    fn literal_coercion_wraps_constants() {
        let mut c = Circuit::new();
        let wire = c.number_input(4.5);
        let block = c.block(wire.producer()).unwrap();
        assert!(matches!(block.kind, BlockKind::ConstantNumber { value } if value == 4.5));

        let on = c.boolean_input(true);
        assert!(matches!(
            c.block(on.producer()).unwrap().kind,
            BlockKind::ConstantOn
        ));

        let off = c.boolean_input(false);
        assert!(c.is_unconnected(off.producer()));
    }

    #[test]
    #[should_panic(expected = "wire type mismatch")]
    fn coercion_rejects_wrong_wire_type() {
        let mut c = Circuit::new();
        let flag = c.constant_on();
        c.number_input(flag);
    }

    #[test]
    fn placeholder_patching_closes_cycles() {
        let mut c = Circuit::new();
        let acc = c.placeholder(SignalType::Number);
        let x = c.input(SignalType::Number, "x", "");
        let sum = c.add(acc, x);
        c.replace_producer(acc, sum);

        // The placeholder slot now holds the add block, whose first input
        // points straight back at the placeholder slot.
        let block = c.block(acc.producer()).unwrap();
        assert!(matches!(block.kind, BlockKind::Add));
        let self_input = block.inputs.get("a_input").unwrap();
        assert_eq!(self_input.producer(), acc.producer());
    }

    #[test]
    #[should_panic(expected = "must be a placeholder")]
    fn replace_producer_rejects_concrete_targets() {
        let mut c = Circuit::new();
        let a = c.constant_number(1.0);
        let b = c.constant_number(2.0);
        c.replace_producer(a, b);
    }

    #[test]
    fn stop_optimization_pins_blocks() {
        let mut c = Circuit::new();
        let a = c.constant_number(1.0);
        c.stop_optimization(a);
        assert!(!c.block(a.producer()).unwrap().optimize);
    }

    #[test]
    fn slice_read_builds_one_read_per_channel() {
        let mut c = Circuit::new();
        let bundle = c.input(SignalType::Composite, "bundle", "");
        let reads = c.composite_slice_read(bundle, 2..=4);
        assert_eq!(reads.len(), 3);
        for (wire, channel) in reads.iter().zip(2u8..=4) {
            let block = c.block(wire.producer()).unwrap();
            assert!(matches!(
                block.kind,
                BlockKind::CompositeReadNumber { channel: ch } if ch == channel
            ));
        }
    }

    #[test]
    fn slice_write_rebinds_the_wire_to_a_chained_write() {
        let mut c = Circuit::new();
        let first = c.input(SignalType::Composite, "first", "");
        let second = c.input(SignalType::Composite, "second", "");
        let low = c.composite_slice_read(first, 1..=4);
        let high = c.composite_slice_read(second, 1..=4);
        let mut result = c.unconnected(SignalType::Composite);
        c.composite_slice_write(&mut result, 1..=4, &low);
        c.composite_slice_write(&mut result, 5..=8, &high);

        let block = c.block(result.producer()).unwrap();
        assert!(matches!(
            block.kind,
            BlockKind::CompositeWriteNumber { start_channel: 1 }
        ));
        // Channels 5..=8 live on this write; 1..=4 on the chained upstream.
        assert_eq!(block.inputs.get("channel_5_input").unwrap(), high[0]);
        let upstream = block.inputs.get("composite_signal_input").unwrap();
        let up_block = c.block(upstream.producer()).unwrap();
        assert_eq!(up_block.inputs.get("channel_1_input").unwrap(), low[0]);
    }

    #[test]
    fn boolean_slice_sugar_uses_boolean_writes() {
        let mut c = Circuit::new();
        let bundle = c.input(SignalType::Composite, "bundle", "");
        let flags = c.composite_slice_read_boolean(bundle, 1..=2);
        let mut out = c.unconnected(SignalType::Composite);
        c.composite_slice_write_boolean(&mut out, 1..=2, &flags);
        let block = c.block(out.producer()).unwrap();
        assert!(matches!(
            block.kind,
            BlockKind::CompositeWriteBoolean { start_channel: 1 }
        ));
        assert_eq!(block.inputs.get("channel_2_input").unwrap(), flags[1]);
    }

    #[test]
    #[should_panic(expected = "value count must match")]
    fn slice_write_length_mismatch_is_rejected() {
        let mut c = Circuit::new();
        let a = c.input(SignalType::Number, "a", "");
        let mut bundle = c.unconnected(SignalType::Composite);
        c.composite_slice_write(&mut bundle, 1..=3, &[a]);
    }
}
