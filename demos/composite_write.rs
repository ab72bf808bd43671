//! Splicing two composite inputs into one output bundle.
//!
//! Channels 1-4 come from the first composite, channels 5-8 from the
//! second. The write merger collapses the chain into a single write.

use wireloom::prelude::*;

fn main() -> wireloom::Result<()> {
    let mut circuit = Circuit::new();
    let first = circuit.input(SignalType::Composite, "First Composite", "Lower four channels.");
    let second = circuit.input(SignalType::Composite, "Second Composite", "Upper four channels.");

    let low = circuit.composite_slice_read(first, 1..=4);
    let high = circuit.composite_slice_read(second, 1..=4);
    let mut result = circuit.unconnected(SignalType::Composite);
    circuit.composite_slice_write(&mut result, 1..=4, &low);
    circuit.composite_slice_write(&mut result, 5..=8, &high);

    let mut mc = Microcontroller::new("Composite Write Example", circuit);
    mc.place_input(first, 0, 0)?;
    mc.place_input(second, 0, 1)?;
    mc.place_output(result, "Result", "All eight channels.", 1, 0)?;

    handle(vec![mc], &HandleArgs::parse())
}
