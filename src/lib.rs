//! # Wireloom: a dataflow compiler for signal-block graphs
//!
//! > *"Wires are warp, blocks are weft; the compiler weaves them into one
//! > tight artifact."*
//!
//! `wireloom` turns a declaratively described graph of primitive
//! signal-processing blocks — arithmetic, logic, latches, timers, composite
//! channel plumbing, embedded scripts — into a serialized microcontroller
//! document for a target host simulator. You compose typed wires through a
//! [`Circuit`], place inputs and outputs on a [`Microcontroller`] surface,
//! and compile; the optimizer folds redundant arithmetic and logic into
//! fused function blocks along the way.
//!
//! ## Pipeline
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │  Graph model     wires, producers, blocks  │  graph / blocks
//! ├────────────────────────────────────────────┤
//! │  Inliner         fuse producers into       │  inline / lower
//! │                  8-input function blocks   │
//! ├────────────────────────────────────────────┤
//! │  Resolver        reachability + ids        │  controller
//! ├────────────────────────────────────────────┤
//! │  Write merger    coalesce composite writes │  merge
//! ├────────────────────────────────────────────┤
//! │  Layout + emit   positions, JSON document  │  layout / emit
//! └────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use wireloom::prelude::*;
//!
//! fn main() -> wireloom::Result<()> {
//!     let mut circuit = Circuit::new();
//!     let a = circuit.input(SignalType::Number, "A", "First operand.");
//!     let b = circuit.input(SignalType::Number, "B", "Second operand.");
//!     let sum = circuit.add(a, b);
//!
//!     let mut mc = Microcontroller::new("Adder", circuit);
//!     mc.place_input(a, 0, 0)?;
//!     mc.place_input(b, 0, 1)?;
//!     mc.place_output(sum, "Sum", "The sum of A and B.", 1, 0)?;
//!
//!     let document = mc.compile()?;
//!     println!("{}", document.to_json().expect("serializable"));
//!     Ok(())
//! }
//! ```
//!
//! ## Key pieces
//!
//! - [`graph::Circuit`] — the producer arena and wire factory; placeholders
//!   let you close cycles (integrators, counters with self-reference).
//! - [`blocks`] — the primitive catalog: one constructor per block kind,
//!   literal coercion on every port, operator-style shorthands.
//! - The optimizer — rewrites comparator/logic subtrees into closed-form
//!   arithmetic and inlines producers into consumers under the hard
//!   8-input budget. It never fails; it declines.
//! - [`controller::Microcontroller`] — surface placement, tooltips,
//!   properties, and the `compile` pipeline.
//! - [`emit::Document`] — the emitted artifact; plain serde data with a
//!   lossless JSON round-trip.
//! - [`handling`] — batch export and vehicle merging for project binaries.

pub mod blocks;
pub mod controller;
pub mod emit;
pub mod error;
mod expr;
pub mod graph;
pub mod handling;
mod inline;
mod layout;
mod lower;
mod merge;
pub mod script;
pub mod wire;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::blocks::{BlockKind, DropdownOption, PulseMode, TimerUnit, TooltipMode};
    pub use crate::controller::Microcontroller;
    pub use crate::emit::{Document, NodeMode, BUILDER_IDENTIFIER};
    pub use crate::error::{Error, Result};
    pub use crate::graph::Circuit;
    pub use crate::handling::{handle, HandleArgs};
    pub use crate::script::verify_script;
    pub use crate::wire::{BoolInput, LinkInput, NumInput, SignalType, Wire};

    // Projects parse their export flags with `HandleArgs::parse()`.
    pub use clap::Parser;
}

pub use prelude::*;
