//! Typed wires and the input-coercion surface.
//!
//! A [`Wire`] is the edge of the dataflow graph: it names one output port of
//! one producer and carries a [`SignalType`] tag. Wires are small copyable
//! values with *reference identity* — every wire created by a
//! [`Circuit`](crate::graph::Circuit) gets a fresh [`WireId`], and equality
//! and hashing go through that id, never through the producer. Two wires
//! observing the same producer port are still two different wires, which is
//! exactly what the optimizer's bookkeeping relies on.

use serde::{Deserialize, Serialize};

use crate::graph::ProducerId;

/// The closed set of signal types a wire can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// A real-valued signal.
    Number,
    /// An on/off signal.
    Boolean,
    /// A bundle of 32 channels, each independently number or on/off.
    Composite,
    Audio,
    Video,
}

impl core::fmt::Display for SignalType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            SignalType::Number => "number",
            SignalType::Boolean => "boolean",
            SignalType::Composite => "composite",
            SignalType::Audio => "audio",
            SignalType::Video => "video",
        };
        write!(f, "{}", name)
    }
}

/// Unique identity of a wire within its circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireId(pub(crate) u64);

/// A typed edge referencing one output port of one producer.
///
/// The `node_index` selects which output port of a multi-output producer
/// this wire exposes (0 for single-output blocks).
#[derive(Debug, Clone, Copy)]
pub struct Wire {
    pub(crate) id: WireId,
    pub(crate) ty: SignalType,
    pub(crate) producer: ProducerId,
    pub(crate) node_index: u8,
}

impl Wire {
    /// The signal type this wire carries.
    pub fn signal_type(&self) -> SignalType {
        self.ty
    }

    /// Which output port of the producer this wire exposes.
    pub fn node_index(&self) -> u8 {
        self.node_index
    }

    /// The producer this wire observes.
    pub fn producer(&self) -> ProducerId {
        self.producer
    }

    /// The wire's identity within its circuit.
    pub fn id(&self) -> WireId {
        self.id
    }
}

impl PartialEq for Wire {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Wire {}

impl core::hash::Hash for Wire {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A number-typed port argument: a wire, a literal, or nothing.
///
/// Literals are wrapped into constant blocks and absence becomes an
/// unconnected producer when the argument reaches a constructor.
#[derive(Debug, Clone, Copy, Default)]
pub enum NumInput {
    Wire(Wire),
    Value(f64),
    #[default]
    None,
}

impl From<Wire> for NumInput {
    fn from(wire: Wire) -> Self {
        NumInput::Wire(wire)
    }
}

impl From<f64> for NumInput {
    fn from(value: f64) -> Self {
        NumInput::Value(value)
    }
}

impl From<i32> for NumInput {
    fn from(value: i32) -> Self {
        NumInput::Value(value as f64)
    }
}

impl From<()> for NumInput {
    fn from(_: ()) -> Self {
        NumInput::None
    }
}

/// A boolean-typed port argument: a wire, a literal, or nothing.
///
/// `true` becomes a constant-on block; `false` and absence both become an
/// unconnected producer, matching the target's semantics where an
/// unconnected on/off port reads as off.
#[derive(Debug, Clone, Copy, Default)]
pub enum BoolInput {
    Wire(Wire),
    Value(bool),
    #[default]
    None,
}

impl From<Wire> for BoolInput {
    fn from(wire: Wire) -> Self {
        BoolInput::Wire(wire)
    }
}

impl From<bool> for BoolInput {
    fn from(value: bool) -> Self {
        BoolInput::Value(value)
    }
}

impl From<()> for BoolInput {
    fn from(_: ()) -> Self {
        BoolInput::None
    }
}

/// A wire-or-nothing port argument for composite, audio and video ports,
/// which have no literal form.
#[derive(Debug, Clone, Copy, Default)]
pub enum LinkInput {
    Wire(Wire),
    #[default]
    None,
}

impl From<Wire> for LinkInput {
    fn from(wire: Wire) -> Self {
        LinkInput::Wire(wire)
    }
}

impl From<()> for LinkInput {
    fn from(_: ()) -> Self {
        LinkInput::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Circuit;

    #[test]
    fn wire_equality_is_identity_not_structure() {
        let mut c = Circuit::new();
        let a = c.constant_number(1.0);
        let b = c.constant_number(1.0);
        assert_ne!(a, b);
        let copy = a;
        assert_eq!(a, copy);
    }

    #[test]
    fn two_wires_onto_one_producer_are_distinct() {
        let mut c = Circuit::new();
        let (q, not_q) = c.sr_latch((), ());
        assert_eq!(q.producer(), not_q.producer());
        assert_ne!(q, not_q);
        assert_eq!(q.node_index(), 0);
        assert_eq!(not_q.node_index(), 1);
    }

    #[test]
    fn signal_type_display_is_lowercase() {
        assert_eq!(SignalType::Composite.to_string(), "composite");
    }

    #[test]
    fn num_input_conversions() {
        assert!(matches!(NumInput::from(3), NumInput::Value(v) if v == 3.0));
        assert!(matches!(NumInput::from(()), NumInput::None));
        assert!(matches!(BoolInput::from(true), BoolInput::Value(true)));
    }
}
