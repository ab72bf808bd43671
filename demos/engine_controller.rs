//! A constant-RPS engine controller: PI control with a clutch, a fuel
//! mixture trim loop, and a handful of tooltips. Exercises placeholders
//! (three feedback loops), the switchbox collapse, and pinned unit delays.

use wireloom::prelude::*;

fn main() -> wireloom::Result<()> {
    let mut c = Circuit::new();
    let starter = c.input(SignalType::Boolean, "Starter", "Engine starter toggle.");
    let engine_data = c.input(
        SignalType::Composite,
        "Engine Data",
        "Air, fuel and temperature on channels 1-3.",
    );
    let engine_rps = c.input(SignalType::Number, "Engine RPS", "Measured engine speed.");
    let throttle = c.input(SignalType::Number, "Throttle", "Throttle lever position.");

    let target_rps = c.property_slider("Target RPS", 5.0, 20.0, 1.0, 10.0);

    let idling = c.equal(throttle, 0.0);
    let actual_rps_target = c.numerical_switchbox(4.0, target_rps, idling);

    let engine_air = c.composite_read_number(engine_data, 1);
    let engine_fuel = c.composite_read_number(engine_data, 2);
    let engine_temp = c.composite_read_number(engine_data, 3);
    let afr = c.div(engine_air, engine_fuel).0;
    let cool_enough = c.less_than(engine_temp, 100.0);
    let actual_starter = c.and(starter, cool_enough);
    let engine_slow = c.less_than(engine_rps, 3.0);

    let not_slow = c.not(engine_slow);
    let clutch_enable = c.and(not_slow, actual_starter);
    let delayed = c.number_function("x", [engine_rps.into()]);
    let engine_rps_delayed = c.stop_optimization(delayed);

    let rps_sum = c.add(engine_rps, engine_rps_delayed);
    let rps_avg = c.div(rps_sum, 2.0).0;

    // Integral term, accumulated through a placeholder cycle.
    let engine_integral = c.placeholder(SignalType::Number);
    let rps_error = c.sub(actual_rps_target, rps_avg);
    let integral_step = c.mul(rps_error, 0.005);
    let integrated = c.add(engine_integral, integral_step);
    let integral_next = c.clamp_wires(integrated, 0.01, 1.0);
    c.replace_producer(engine_integral, integral_next);

    // Clutch engagement chases 85% of the target and is capped by the
    // square root of the throttle.
    let clutch = c.placeholder(SignalType::Number);
    let scaled_target = c.mul(actual_rps_target, 0.85);
    let clutch_error = c.sub(scaled_target, rps_avg);
    let clutch_step = c.mul(clutch_error, -0.004);
    let clutch_next = c.add(clutch, clutch_step);
    let throttle_sqrt = c.pow(throttle, 0.5);
    let clutch_limited = c.clamp_wires(clutch_next, 0.0, throttle_sqrt);
    let clutch_gate = c.bool_to_number(clutch_enable);
    let clutch_value = c.mul(clutch_limited, clutch_gate);
    c.replace_producer(clutch, clutch_value);

    let proportional_error = c.sub(actual_rps_target, rps_avg);
    let engine_procedural = c.mul(proportional_error, 0.05);
    let rps_delta = c.sub(engine_rps_delayed, engine_rps);
    let engine_derivative = c.mul(rps_delta, 0.0);
    let pid_partial = c.add(engine_integral, engine_derivative);
    let pid_sum = c.add(pid_partial, engine_procedural);
    let engine_pid = c.clamp_wires(pid_sum, 0.0, 1.0);

    let starter_gate = c.bool_to_number(actual_starter);
    let engine_throttle = c.mul(engine_pid, starter_gate);

    // Fuel mixture trim: nudge the multiplier while the engine is running.
    let fuel_multi = c.placeholder(SignalType::Number);
    let temp_term = c.div(engine_temp, 100.0).0;
    let afr_shift = c.sub(afr, 13.3);
    let target_afr = c.sub(afr_shift, temp_term);
    let throttle_scaled = c.mul(engine_throttle, 1000.0);
    let binary_throttle = c.clamp_wires(throttle_scaled, 0.0, 0.001);
    let fuel_step = c.mul(target_afr, binary_throttle);
    let fuel_next = c.add(fuel_multi, fuel_step);
    let fuel_trimmed = c.clamp_wires(fuel_next, 0.4, 0.95);
    c.replace_producer(fuel_multi, fuel_trimmed);

    let engine_fuel_out = c.mul(engine_throttle, fuel_multi);

    let cooling = c.greater_than(engine_temp, 35.0);
    let starter_motor = c.and(actual_starter, engine_slow);

    let mut mc = Microcontroller::new("Engine Controller", c);
    mc.set_size(3, 3);
    mc.set_description("Constant RPS engine controller");
    mc.place_input(starter, 0, 2)?;
    mc.place_input(engine_data, 2, 1)?;
    mc.place_input(engine_rps, 1, 1)?;
    mc.place_input(throttle, 2, 2)?;
    mc.place_output(cooling, "Cooling Fans", "On above 35 degrees.", 0, 0)?;
    mc.place_output(starter_motor, "Starter Motor", "Cranks while slow.", 0, 1)?;
    mc.place_output(clutch, "Clutch", "Clutch engagement.", 1, 0)?;
    mc.place_output(engine_throttle, "Engine air", "Air throttle.", 2, 0)?;
    mc.place_output(engine_fuel_out, "Engine fuel", "Fuel throttle.", 1, 2)?;
    mc.add_number_tooltip("RPS", engine_rps, (), TooltipMode::Always);
    mc.add_number_tooltip("Target RPS", actual_rps_target, (), TooltipMode::Always);
    mc.add_number_tooltip("Clutch", clutch, (), TooltipMode::Always);
    mc.add_number_tooltip("Engine Throttle", engine_throttle, (), TooltipMode::Always);
    mc.add_number_tooltip("Engine Fuel multi", fuel_multi, (), TooltipMode::Always);
    mc.add_number_tooltip("AFR", afr, (), TooltipMode::Always);
    mc.add_number_tooltip("Engine Integral", engine_integral, (), TooltipMode::Always);

    handle(vec![mc], &HandleArgs::parse())
}
