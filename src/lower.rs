//! Numerical-boolean lowering.
//!
//! Collapses a tree of comparators and logic blocks into one closed-form
//! arithmetic expression whose value is 0 or 1, so the inliner can splice it
//! into a fused-function body. The lowering is best-effort: a pinned block
//! or an unrecognized producer aborts the branch, and the caller falls back
//! to a switchbox. Boolean wires that cannot lower themselves (external
//! inputs, latches) are wrapped in a fresh `switchbox(1, 0, wire)` and
//! referenced as an external dependency.

use crate::blocks::{fmt_number, BlockKind, FUNCTION_VARS};
use crate::expr::wire_token;
use crate::graph::{Circuit, Inputs};
use crate::wire::Wire;

/// Outcome of the top-level lowering driver: the 0/1-valued body with its
/// dependencies bound to alphabet names, plus the free names the caller
/// reserved for its own operands.
pub(crate) struct LoweredFunction {
    pub body: String,
    pub bindings: Vec<(&'static str, Wire)>,
    pub extra_names: Vec<&'static str>,
}

fn push_unique(deps: &mut Vec<Wire>, wire: Wire) {
    if !deps.contains(&wire) {
        deps.push(wire);
    }
}

fn merge(mut a: Vec<Wire>, b: Vec<Wire>) -> Vec<Wire> {
    for wire in b {
        push_unique(&mut a, wire);
    }
    a
}

/// Render one comparator operand: constants inline as literals, unconnected
/// reads as 0, anything else becomes an external dependency token.
fn operand(circuit: &Circuit, inputs: &Inputs, name: &str, deps: &mut Vec<Wire>) -> String {
    let wire = inputs.get(name).expect("comparator port");
    if let Some(block) = circuit.block(wire.producer()) {
        if let BlockKind::ConstantNumber { value } = block.kind {
            return fmt_number(value);
        }
    }
    if circuit.is_unconnected(wire.producer()) {
        return "0".to_string();
    }
    push_unique(deps, wire);
    wire_token(wire)
}

fn lower_pair(circuit: &mut Circuit, inputs: &Inputs) -> Option<(String, String, Vec<Wire>)> {
    let a = inputs.get("a_input").expect("gate port");
    let b = inputs.get("b_input").expect("gate port");
    let (expr_a, deps_a) = lower_subtree(circuit, a)?;
    let (expr_b, deps_b) = lower_subtree(circuit, b)?;
    Some((expr_a, expr_b, merge(deps_a, deps_b)))
}

/// Lower one boolean wire into a {0,1}-valued expression and its external
/// dependencies. `None` means this branch refuses (pinned or unrecognized at
/// the root position).
pub(crate) fn lower_subtree(circuit: &mut Circuit, wire: Wire) -> Option<(String, Vec<Wire>)> {
    lower_inner(circuit, wire, false)
}

fn lower_inner(circuit: &mut Circuit, wire: Wire, root: bool) -> Option<(String, Vec<Wire>)> {
    if circuit.is_unconnected(wire.producer()) {
        return Some(("0".to_string(), Vec::new()));
    }
    let Some(block) = circuit.block(wire.producer()) else {
        // Input markers and the like: not lowerable themselves, but usable
        // as a 0/1 source through a switchbox. Refused at the root, where
        // the caller synthesizes its own coercion.
        if root {
            return None;
        }
        let switch = circuit.numerical_switchbox(1.0, 0.0, wire);
        return Some((wire_token(switch), vec![switch]));
    };
    if !block.optimize {
        return None;
    }
    let kind = block.kind.clone();
    let inputs = block.inputs.clone();
    let mut deps: Vec<Wire> = Vec::new();
    match kind {
        BlockKind::Equal { epsilon } => {
            let a = operand(circuit, &inputs, "a_input", &mut deps);
            let b = operand(circuit, &inputs, "b_input", &mut deps);
            let body = if epsilon == 0.0 {
                format!("((sgn({a}-{b})+sgn({b}-{a}))/2)")
            } else {
                format!("((1-sgn(abs({a}-{b})-{}))/2)", fmt_number(epsilon))
            };
            Some((body, deps))
        }
        BlockKind::GreaterThan => {
            let a = operand(circuit, &inputs, "a_input", &mut deps);
            let b = operand(circuit, &inputs, "b_input", &mut deps);
            Some((format!("((1-sgn({b}-{a}))/2)"), deps))
        }
        BlockKind::LessThan => {
            let a = operand(circuit, &inputs, "a_input", &mut deps);
            let b = operand(circuit, &inputs, "b_input", &mut deps);
            Some((format!("((1-sgn({a}-{b}))/2)"), deps))
        }
        BlockKind::Threshold { min, max } => {
            let a = operand(circuit, &inputs, "number_input", &mut deps);
            let min = fmt_number(min);
            let max = fmt_number(max);
            Some((
                format!("(((sgn({a}-{min})+1)/2)*((sgn({max}-{a})+1)/2))"),
                deps,
            ))
        }
        BlockKind::Not => {
            let a = inputs.get("a_input").expect("gate port");
            let (inner, deps) = lower_subtree(circuit, a)?;
            Some((format!("(1-{inner})"), deps))
        }
        BlockKind::And => {
            let (a, b, deps) = lower_pair(circuit, &inputs)?;
            Some((format!("({a}*{b})"), deps))
        }
        BlockKind::Nand => {
            let (a, b, deps) = lower_pair(circuit, &inputs)?;
            Some((format!("(1-({a}*{b}))"), deps))
        }
        BlockKind::Or => {
            let (a, b, deps) = lower_pair(circuit, &inputs)?;
            Some((format!("max({a},{b})"), deps))
        }
        BlockKind::Nor => {
            let (a, b, deps) = lower_pair(circuit, &inputs)?;
            Some((format!("(1-max({a},{b}))"), deps))
        }
        BlockKind::Xor => {
            let (a, b, deps) = lower_pair(circuit, &inputs)?;
            Some((format!("abs({a}-{b})"), deps))
        }
        BlockKind::ConstantOn => Some(("1".to_string(), deps)),
        _ => {
            if root {
                return None;
            }
            let switch = circuit.numerical_switchbox(1.0, 0.0, wire);
            Some((wire_token(switch), vec![switch]))
        }
    }
}

/// Top-level driver: lower `wire` and bind its dependencies to the function
/// alphabet, reserving `extra` trailing names for the caller. Fails when the
/// root is not a recognized boolean block or the name budget would overflow.
pub(crate) fn lower_boolean(
    circuit: &mut Circuit,
    wire: Wire,
    extra: usize,
) -> Option<LoweredFunction> {
    let (mut body, deps) = lower_inner(circuit, wire, true)?;
    if deps.len() + extra > FUNCTION_VARS.len() {
        return None;
    }
    let mut names = FUNCTION_VARS.iter().copied();
    let mut bindings = Vec::with_capacity(deps.len());
    for dep in deps {
        let name = names.next().expect("name budget checked above");
        body = body.replace(&wire_token(dep), name);
        bindings.push((name, dep));
    }
    let extra_names = (0..extra)
        .map(|_| names.next().expect("name budget checked above"))
        .collect();
    Some(LoweredFunction {
        body,
        bindings,
        extra_names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::SignalType;

    #[test]
    fn equal_with_zero_epsilon_uses_the_two_sided_sign_form() {
        let mut c = Circuit::new();
        let a = c.input(SignalType::Number, "a", "");
        let b = c.input(SignalType::Number, "b", "");
        let eq = c.equal(a, b);
        let lowered = lower_boolean(&mut c, eq, 0).unwrap();
        assert_eq!(lowered.body, "((sgn(x-y)+sgn(y-x))/2)");
        assert_eq!(lowered.bindings.len(), 2);
        assert_eq!(lowered.bindings[0].1, a);
        assert_eq!(lowered.bindings[1].1, b);
    }

    #[test]
    fn equal_with_epsilon_uses_the_band_form() {
        let mut c = Circuit::new();
        let a = c.input(SignalType::Number, "a", "");
        let b = c.input(SignalType::Number, "b", "");
        let eq = c.equal_within(a, b, 0.1);
        let lowered = lower_boolean(&mut c, eq, 0).unwrap();
        assert_eq!(lowered.body, "((1-sgn(abs(x-y)-0.1))/2)");
    }

    #[test]
    fn comparators_inline_constants_and_unconnected() {
        let mut c = Circuit::new();
        let a = c.input(SignalType::Number, "a", "");
        let gt = c.greater_than(a, 5.0);
        let lowered = lower_boolean(&mut c, gt, 0).unwrap();
        assert_eq!(lowered.body, "((1-sgn(5-x))/2)");
        assert_eq!(lowered.bindings.len(), 1);

        let lt = c.less_than(a, ());
        let lowered = lower_boolean(&mut c, lt, 0).unwrap();
        assert_eq!(lowered.body, "((1-sgn(x-0))/2)");
    }

    #[test]
    fn logic_tree_composes_and_dedups_shared_wires() {
        let mut c = Circuit::new();
        let a = c.input(SignalType::Number, "a", "");
        let b = c.input(SignalType::Number, "b", "");
        let gt = c.greater_than(a, b);
        let lt = c.less_than(a, b);
        let both = c.and(gt, lt);
        let lowered = lower_boolean(&mut c, both, 0).unwrap();
        // a and b appear in both branches but are bound once each.
        assert_eq!(lowered.bindings.len(), 2);
        assert_eq!(lowered.body, "(((1-sgn(y-x))/2)*((1-sgn(x-y))/2))");
    }

    #[test]
    fn not_and_constant_on_lower() {
        let mut c = Circuit::new();
        let on = c.constant_on();
        let inverted = c.not(on);
        let lowered = lower_boolean(&mut c, inverted, 0).unwrap();
        assert_eq!(lowered.body, "(1-1)");
        assert!(lowered.bindings.is_empty());
    }

    #[test]
    fn threshold_lowers_with_its_band() {
        let mut c = Circuit::new();
        let a = c.input(SignalType::Number, "a", "");
        let t = c.threshold(a, 2.0, 6.0);
        let lowered = lower_boolean(&mut c, t, 0).unwrap();
        assert_eq!(lowered.body, "(((sgn(x-2)+1)/2)*((sgn(6-x)+1)/2))");
    }

    #[test]
    fn unrecognized_inner_producer_falls_back_to_a_switchbox() {
        let mut c = Circuit::new();
        let flag = c.input(SignalType::Boolean, "flag", "");
        let on = c.constant_on();
        let gated = c.and(flag, on);
        let lowered = lower_boolean(&mut c, gated, 0).unwrap();
        assert_eq!(lowered.body, "(x*1)");
        // The dependency is a fresh 1/0 switchbox over the raw flag.
        let dep = lowered.bindings[0].1;
        let block = c.block(dep.producer()).unwrap();
        assert!(matches!(block.kind, BlockKind::NumericalSwitchbox));
    }

    #[test]
    fn root_must_be_a_recognized_boolean_block() {
        let mut c = Circuit::new();
        let flag = c.input(SignalType::Boolean, "flag", "");
        assert!(lower_boolean(&mut c, flag, 0).is_none());

        let (q, _) = c.sr_latch(flag, ());
        assert!(lower_boolean(&mut c, q, 0).is_none());
    }

    #[test]
    fn pinned_blocks_refuse_to_lower() {
        let mut c = Circuit::new();
        let a = c.input(SignalType::Number, "a", "");
        let gt = c.greater_than(a, 0.0);
        c.stop_optimization(gt);
        assert!(lower_boolean(&mut c, gt, 0).is_none());
    }

    #[test]
    fn budget_counts_extras() {
        let mut c = Circuit::new();
        // Chain of ORs over 7 external comparator inputs.
        let mut acc = None;
        for i in 0..7 {
            let x = c.input(SignalType::Number, format!("x{i}"), "");
            let gt = c.greater_than(x, 0.0);
            acc = Some(match acc {
                None => gt,
                Some(prev) => c.or(prev, gt),
            });
        }
        let tree = acc.unwrap();
        assert!(lower_boolean(&mut c, tree, 1).is_some());
        assert!(lower_boolean(&mut c, tree, 2).is_none());
    }

    #[test]
    fn extra_names_follow_the_bound_names() {
        let mut c = Circuit::new();
        let a = c.input(SignalType::Number, "a", "");
        let gt = c.greater_than(a, 1.0);
        let lowered = lower_boolean(&mut c, gt, 2).unwrap();
        assert_eq!(lowered.bindings[0].0, "x");
        assert_eq!(lowered.extra_names, ["y", "z"]);
    }
}
