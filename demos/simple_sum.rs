//! Smallest useful project: two inputs, a little arithmetic, one output.
//!
//! The optimizer folds the whole expression into a single fused function
//! over the two input markers.

use wireloom::prelude::*;

fn main() -> wireloom::Result<()> {
    let mut circuit = Circuit::new();
    let a = circuit.input(SignalType::Number, "Input A", "First operand.");
    let b = circuit.input(SignalType::Number, "Input B", "Second operand.");

    let added = circuit.add(a, b);
    let shifted = circuit.sub(added, 5.0);
    let multiplied = circuit.mul(shifted, added);

    let mut mc = Microcontroller::new("simple example", circuit);
    mc.place_input(a, 0, 0)?;
    mc.place_input(b, 1, 0)?;
    mc.add_number_tooltip("Result", multiplied, (), TooltipMode::Always);
    mc.place_output(multiplied, "Output", "The processed output signal.", 0, 1)?;

    let document = mc.compile()?;
    println!("{}", document.to_json().expect("document serializes"));
    Ok(())
}
