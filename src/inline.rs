//! The arithmetic inliner.
//!
//! Rewrites every reachable arithmetic or logic block into a fused-function
//! equivalent and folds producers into consumers while the result stays
//! within the 8-input budget. Self-references survive as ports pointing at
//! the merged node, which is how cycles built through placeholders come out
//! the other side. The pass never fails; whenever a rewrite is not
//! applicable or would blow the budget it leaves the component alone.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::blocks::{fmt_number, var_port, BlockKind, FUNCTION_VARS};
use crate::expr::{subst_var, wire_token};
use crate::graph::{Block, Circuit, Inputs, ProducerId};
use crate::lower::{lower_boolean, lower_subtree};
use crate::wire::{SignalType, Wire};

fn strip_port(name: &str) -> &str {
    name.strip_suffix("_input").unwrap_or(name)
}

/// Build the full eight-port map of a fused function, padding unused
/// variables with unconnected wires of the given type.
fn fused_ports(circuit: &mut Circuit, args: &[Wire], pad: SignalType) -> Inputs {
    let mut inputs = Inputs::new();
    for (i, var) in FUNCTION_VARS.iter().enumerate() {
        let wire = match args.get(i) {
            Some(&wire) => wire,
            None => circuit.unconnected(pad),
        };
        inputs.set(var_port(var), wire);
    }
    inputs
}

fn fused_number(circuit: &mut Circuit, body: impl Into<String>, args: &[Wire]) -> ProducerId {
    let inputs = fused_ports(circuit, args, SignalType::Number);
    circuit.insert_block(Block::new(
        BlockKind::NumberFunction { body: body.into() },
        inputs,
    ))
}

fn fused_bool(circuit: &mut Circuit, body: impl Into<String>, args: &[Wire]) -> ProducerId {
    let inputs = fused_ports(circuit, args, SignalType::Boolean);
    circuit.insert_block(Block::new(
        BlockKind::BoolFunction { body: body.into() },
        inputs,
    ))
}

/// The fused-function rewrite of a single block, or `None` when the kind has
/// no arithmetic equivalent. Always returns a fresh producer; the original
/// is left untouched.
pub(crate) fn optimize_component(circuit: &mut Circuit, id: ProducerId) -> Option<ProducerId> {
    let block = circuit.block(id)?;
    let kind = block.kind.clone();
    let inputs = block.inputs.clone();
    let port = |name: &str| inputs.get(name).expect("catalog port");
    match kind {
        BlockKind::NumberFunction { body } => Some(
            circuit.insert_block(Block::new(BlockKind::NumberFunction { body }, inputs.clone())),
        ),
        BlockKind::Add => Some(fused_number(circuit, "x+y", &[port("a_input"), port("b_input")])),
        BlockKind::Subtract => {
            Some(fused_number(circuit, "x-y", &[port("a_input"), port("b_input")]))
        }
        BlockKind::Multiply => {
            Some(fused_number(circuit, "x*y", &[port("a_input"), port("b_input")]))
        }
        BlockKind::Divide => {
            Some(fused_number(circuit, "x/y", &[port("a_input"), port("b_input")]))
        }
        BlockKind::Modulo => {
            Some(fused_number(circuit, "x%y", &[port("a_input"), port("b_input")]))
        }
        BlockKind::Abs => Some(fused_number(circuit, "abs(x)", &[port("number_input")])),
        BlockKind::Clamp { min, max } => Some(fused_number(
            circuit,
            format!("clamp(x,{},{})", fmt_number(min), fmt_number(max)),
            &[port("number_input")],
        )),
        BlockKind::ConstantNumber { value } => {
            Some(fused_number(circuit, fmt_number(value), &[]))
        }
        BlockKind::BoolFunction { body } => Some(
            circuit.insert_block(Block::new(BlockKind::BoolFunction { body }, inputs.clone())),
        ),
        BlockKind::ConstantOn => Some(fused_bool(circuit, "true", &[])),
        BlockKind::And => Some(fused_bool(circuit, "x&y", &[port("a_input"), port("b_input")])),
        BlockKind::Nand => {
            Some(fused_bool(circuit, "!(x&y)", &[port("a_input"), port("b_input")]))
        }
        BlockKind::Or => Some(fused_bool(circuit, "x|y", &[port("a_input"), port("b_input")])),
        BlockKind::Nor => {
            Some(fused_bool(circuit, "!(x|y)", &[port("a_input"), port("b_input")]))
        }
        BlockKind::Xor => Some(fused_bool(circuit, "x^y", &[port("a_input"), port("b_input")])),
        BlockKind::Not => Some(fused_bool(circuit, "!x", &[port("a_input")])),
        _ => None,
    }
}

pub(crate) struct Optimizer<'c> {
    circuit: &'c mut Circuit,
    optimized: HashMap<ProducerId, ProducerId>,
    in_progress: HashSet<ProducerId>,
}

impl<'c> Optimizer<'c> {
    pub(crate) fn new(circuit: &'c mut Circuit) -> Self {
        Self {
            circuit,
            optimized: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Finalize one component: rewrite it into its fused form and fold as
    /// many producers into it as the budget allows. Memoized; components on
    /// the current recursion stack are treated as opaque, which is what cuts
    /// cycles.
    pub(crate) fn find_optimizations(&mut self, id: ProducerId) -> ProducerId {
        if let Some(&done) = self.optimized.get(&id) {
            return done;
        }
        self.in_progress.insert(id);

        let Some(block) = self.circuit.block(id) else {
            self.optimized.insert(id, id);
            self.in_progress.remove(&id);
            return id;
        };
        if !block.optimize {
            self.optimized.insert(id, id);
            self.in_progress.remove(&id);
            return id;
        }
        let original_is_fused = block.kind.function_body().is_some();
        let mut input_count = self.circuit.live_input_count(id) as i64;

        let Some(fused_id) = optimize_component(self.circuit, id) else {
            // No arithmetic form: try the switchbox, counter and
            // composite-write chains before giving up.
            let special = self.try_special_rewrites(id);
            let memoized = match special {
                Some(new_id) => self.find_optimizations(new_id),
                None => id,
            };
            self.optimized.insert(id, memoized);
            self.in_progress.remove(&id);
            return special.unwrap_or(id);
        };

        let snapshot: Vec<(String, Wire)> = self
            .circuit
            .block(fused_id)
            .expect("fused rewrite is a block")
            .inputs
            .iter()
            .map(|(name, wire)| (name.to_string(), wire))
            .collect();

        // Inputs whose producer is the component itself are preserved
        // unrewritten and repointed at the merged node at the end.
        let self_refs: Vec<String> = snapshot
            .iter()
            .filter(|(_, wire)| wire.producer() == id)
            .map(|(name, _)| name.clone())
            .collect();

        let mut available: Vec<&'static str> = FUNCTION_VARS.to_vec();
        let mut present_inputs: Vec<(Wire, String)> = Vec::new();
        let mut candidates: Vec<(i64, String, ProducerId, Wire)> = Vec::new();

        for (name, input_wire) in &snapshot {
            let producer = input_wire.producer();
            let is_block = self.circuit.block(producer).is_some();
            let in_progress = self.in_progress.contains(&producer);
            let raw_optimized = if is_block && !in_progress {
                Some(self.find_optimizations(producer))
            } else {
                None
            };
            if let Some(raw) = raw_optimized {
                let producer_eligible = self
                    .circuit
                    .block(producer)
                    .map(|b| b.optimize)
                    .unwrap_or(false);
                let raw_self_references = self
                    .circuit
                    .block(raw)
                    .map(|b| b.inputs.iter().any(|(_, w)| w.producer() == raw))
                    .unwrap_or(false);
                if producer_eligible && !raw_self_references {
                    if let Some(inlined) = optimize_component(self.circuit, raw) {
                        let cost = self.circuit.live_input_count(inlined) as i64 - 1;
                        candidates.push((cost, name.clone(), inlined, *input_wire));
                        continue;
                    }
                }
            }
            if !self.circuit.is_unconnected(producer) {
                // Keeps its port: reserve the variable name.
                let short = strip_port(name);
                available.retain(|v| *v != short);
                present_inputs.push((*input_wire, short.to_string()));
            } else {
                // Free the name by folding the open input into the body.
                let short = strip_port(name).to_string();
                let filler = if input_wire.signal_type() == SignalType::Number {
                    "0"
                } else {
                    "false"
                };
                let block = self.circuit.block_mut(fused_id).expect("fused block");
                if let Some(body) = block.kind.function_body_mut() {
                    *body = subst_var(body, &short, filler);
                }
            }
        }

        candidates.sort_by_key(|&(cost, _, _, _)| cost);

        // Budget: drop the most expensive folds until the merged node fits.
        while candidates.iter().map(|c| c.0).sum::<i64>() + input_count > 8 {
            let (_, name, _, _) = candidates.pop().expect("over budget implies candidates");
            let short = strip_port(&name).to_string();
            available.retain(|v| *v != short);
        }

        if candidates.is_empty() {
            // Nothing to fold. Arithmetic primitives still adopt their fused
            // form; an already-fused node is returned unchanged.
            let result = if original_is_fused { id } else { fused_id };
            if result == fused_id {
                self.repoint_self_references(fused_id, &self_refs);
            }
            self.optimized.insert(id, result);
            self.in_progress.remove(&id);
            return result;
        }

        debug!(folds = candidates.len(), "inlining producers into fused node");

        let mut replacements: Vec<(String, String)> = Vec::new();
        let mut input_replacements: Vec<(String, Wire)> = Vec::new();

        for (_, name, inlined, input_wire) in &candidates {
            let inner = self.circuit.block(*inlined).expect("candidate block");
            let mut function = inner
                .kind
                .function_body()
                .expect("candidates are fused")
                .to_string();
            let inner_ports: Vec<(String, Wire)> = inner
                .inputs
                .iter()
                .map(|(n, w)| (n.to_string(), w))
                .collect();
            for (inner_name, inner_wire) in inner_ports {
                let var = strip_port(&inner_name).to_string();
                if !self.circuit.is_unconnected(inner_wire.producer()) {
                    if present_inputs.iter().any(|(w, _)| *w == inner_wire) {
                        input_count -= 1;
                    }
                    // Per-candidate placeholder name, resolved to a final
                    // alphabet name below.
                    let placeholder = format!("{}_{}", name, var);
                    input_replacements.push((placeholder.clone(), inner_wire));
                    function = subst_var(&function, &var, &placeholder);
                }
            }
            replacements.push((strip_port(name).to_string(), format!("({})", function)));
            let open = self.circuit.unconnected(input_wire.signal_type());
            self.circuit
                .block_mut(fused_id)
                .expect("fused block")
                .inputs
                .set(name.clone(), open);
        }

        let mut new_function = self
            .circuit
            .block(fused_id)
            .expect("fused block")
            .kind
            .function_body()
            .expect("fused body")
            .to_string();
        for (old, new) in &replacements {
            new_function = subst_var(&new_function, old, new);
        }

        for (placeholder, new_wire) in &input_replacements {
            let existing = present_inputs
                .iter()
                .find(|(w, _)| w == new_wire)
                .map(|(_, n)| n.clone());
            let new_name = match existing {
                Some(name) => name,
                None => available.remove(0).to_string(),
            };
            new_function = new_function.replace(placeholder, &new_name);
            let bound = if new_wire.producer() == id {
                // Self-references of the inlined producer follow the merge.
                Wire {
                    producer: fused_id,
                    ..*new_wire
                }
            } else {
                *new_wire
            };
            self.circuit
                .block_mut(fused_id)
                .expect("fused block")
                .inputs
                .set(var_port(&new_name), bound);
            present_inputs.retain(|(w, _)| w != new_wire);
            present_inputs.push((*new_wire, new_name));
        }

        self.repoint_self_references(fused_id, &self_refs);

        if let Some(body) = self
            .circuit
            .block_mut(fused_id)
            .expect("fused block")
            .kind
            .function_body_mut()
        {
            *body = new_function;
        }

        self.optimized.insert(id, fused_id);
        self.in_progress.remove(&id);
        fused_id
    }

    fn repoint_self_references(&mut self, fused_id: ProducerId, self_refs: &[String]) {
        for name in self_refs {
            let block = self.circuit.block_mut(fused_id).expect("fused block");
            if let Some(wire) = block.inputs.get(name) {
                block.inputs.set(
                    name.clone(),
                    Wire {
                        producer: fused_id,
                        ..wire
                    },
                );
            }
        }
    }

    /// Rewrites for blocks without a plain arithmetic form: the switchbox
    /// collapse, the up/down-counter fold, and the composite-write precursor
    /// absorption (which mutates in place and reports no new producer).
    fn try_special_rewrites(&mut self, id: ProducerId) -> Option<ProducerId> {
        let block = self.circuit.block(id)?;
        let kind = block.kind.clone();
        let inputs = block.inputs.clone();
        match kind {
            BlockKind::NumericalSwitchbox => {
                let on = inputs.get("on_value_input").expect("switchbox port");
                let off = inputs.get("off_value_input").expect("switchbox port");
                let switch = inputs.get("switch_signal_input").expect("switchbox port");
                let lowered = lower_boolean(self.circuit, switch, 2)?;
                let on_name = lowered.extra_names[0];
                let off_name = lowered.extra_names[1];
                let true_func = lowered.body;
                let false_func = format!("(1-{})", true_func);
                let body =
                    format!("({})*{}+({})*{}", true_func, on_name, false_func, off_name);
                let mut ports = Inputs::new();
                for var in FUNCTION_VARS {
                    let bound = if var == on_name {
                        on
                    } else if var == off_name {
                        off
                    } else if let Some(&(_, dep)) =
                        lowered.bindings.iter().find(|(name, _)| *name == var)
                    {
                        dep
                    } else {
                        self.circuit.unconnected(SignalType::Number)
                    };
                    ports.set(var_port(var), bound);
                }
                debug!("collapsed numerical switchbox into fused function");
                Some(
                    self.circuit
                        .insert_block(Block::new(BlockKind::NumberFunction { body }, ports)),
                )
            }
            BlockKind::UpDownCounter {
                increment,
                reset_value: _,
                min,
                max,
                clamp,
            } => {
                let up = inputs.get("up_input").expect("counter port");
                let down = inputs.get("down_input").expect("counter port");
                let reset = inputs.get("reset_input").expect("counter port");
                let (mut up_func, up_deps) = lower_subtree(self.circuit, up)?;
                let (mut down_func, down_deps) = lower_subtree(self.circuit, down)?;
                let (mut reset_func, reset_deps) = lower_subtree(self.circuit, reset)?;
                let mut all_deps = up_deps;
                for dep in down_deps.into_iter().chain(reset_deps) {
                    if !all_deps.contains(&dep) {
                        all_deps.push(dep);
                    }
                }
                // One slot stays reserved for the self-reference.
                if all_deps.len() > 7 {
                    return None;
                }
                let mut names = FUNCTION_VARS.iter().copied();
                let mut bindings: Vec<(&str, Wire)> = Vec::new();
                for dep in all_deps {
                    let name = names.next().expect("budget checked");
                    let token = wire_token(dep);
                    up_func = up_func.replace(&token, name);
                    down_func = down_func.replace(&token, name);
                    reset_func = reset_func.replace(&token, name);
                    bindings.push((name, dep));
                }
                let cycle = self.circuit.placeholder(SignalType::Number);
                let self_name = names.next().expect("budget checked");
                bindings.push((self_name, cycle));
                let inc = fmt_number(increment);
                let mut value = format!(
                    "({}+{}*{}-{}*{})",
                    self_name, inc, up_func, inc, down_func
                );
                if clamp {
                    value = format!("clamp({},{},{})", value, fmt_number(min), fmt_number(max));
                }
                let body = format!(
                    "(1-{})*{}+{}*{}",
                    reset_func,
                    value,
                    reset_func,
                    fmt_number(min)
                );
                let mut ports = Inputs::new();
                for var in FUNCTION_VARS {
                    let bound = match bindings.iter().find(|(name, _)| *name == var) {
                        Some(&(_, dep)) => dep,
                        None => self.circuit.unconnected(SignalType::Number),
                    };
                    ports.set(var_port(var), bound);
                }
                let fused = self
                    .circuit
                    .insert_block(Block::new(BlockKind::NumberFunction { body }, ports));
                let fused_wire = self.circuit.fresh_wire(SignalType::Number, fused, 0);
                self.circuit.replace_producer(cycle, fused_wire);
                debug!("folded up/down counter into cyclic fused function");
                Some(cycle.producer())
            }
            BlockKind::CompositeWriteNumber { start_channel: 1 }
            | BlockKind::CompositeWriteBoolean { start_channel: 1 } => {
                let upstream = inputs
                    .get("composite_signal_input")
                    .expect("composite port");
                let absorb = self.circuit.block(upstream.producer()).is_some_and(|other| {
                    other.optimize
                        && match (&kind, &other.kind) {
                            (
                                BlockKind::CompositeWriteNumber { .. },
                                BlockKind::CompositeWriteNumber { start_channel: 1 },
                            ) => true,
                            (
                                BlockKind::CompositeWriteBoolean { .. },
                                BlockKind::CompositeWriteBoolean { start_channel: 1 },
                            ) => true,
                            _ => false,
                        }
                });
                if absorb {
                    let other_inputs = self
                        .circuit
                        .block(upstream.producer())
                        .expect("upstream block")
                        .inputs
                        .clone();
                    let mut patches: Vec<(String, Wire)> = Vec::new();
                    for channel in 1..=32u8 {
                        let name = format!("channel_{}_input", channel);
                        let ours = inputs.get(&name).expect("channel port");
                        if self.circuit.is_unconnected(ours.producer()) {
                            patches.push((
                                name.clone(),
                                other_inputs.get(&name).expect("channel port"),
                            ));
                        }
                    }
                    patches.push((
                        "composite_signal_input".to_string(),
                        other_inputs
                            .get("composite_signal_input")
                            .expect("composite port"),
                    ));
                    let block = self.circuit.block_mut(id).expect("composite write block");
                    for (name, wire) in patches {
                        block.inputs.set(name, wire);
                    }
                    debug!("absorbed upstream composite write");
                }
                None
            }
            _ => None,
        }
    }

    /// Sweep the graph from the given seeds, rewiring every input to its
    /// optimized producer.
    pub(crate) fn apply(&mut self, seeds: Vec<ProducerId>) {
        let mut to_visit = seeds;
        let mut visited: HashSet<ProducerId> = HashSet::new();
        while let Some(current) = to_visit.pop() {
            if !visited.insert(current) {
                continue;
            }
            let ports: Vec<(String, Wire)> = match self.circuit.block(current) {
                Some(block) => block
                    .inputs
                    .iter()
                    .map(|(name, wire)| (name.to_string(), wire))
                    .collect(),
                None => continue,
            };
            for (port, wire) in ports {
                if self.circuit.block(wire.producer()).is_some() {
                    let optimized = self.find_optimizations(wire.producer());
                    if let Some(block) = self.circuit.block_mut(current) {
                        block.inputs.set(
                            port,
                            Wire {
                                producer: optimized,
                                ..wire
                            },
                        );
                    }
                    to_visit.push(optimized);
                }
            }
        }
    }
}

/// Optimize the graph rooted at the given extras and output wires: rewire
/// each root to its optimized producer, then sweep the rest of the graph.
pub(crate) fn optimize_arithmetic(
    circuit: &mut Circuit,
    extras: &[ProducerId],
    outputs: &mut [Wire],
) {
    let mut optimizer = Optimizer::new(circuit);
    let mut seeds: Vec<ProducerId> = Vec::new();

    for &extra in extras {
        let ports: Vec<(String, Wire)> = match optimizer.circuit.block(extra) {
            Some(block) => block
                .inputs
                .iter()
                .map(|(name, wire)| (name.to_string(), wire))
                .collect(),
            None => continue,
        };
        for (port, wire) in ports {
            if optimizer.circuit.block(wire.producer()).is_some() {
                seeds.push(wire.producer());
                let optimized = optimizer.find_optimizations(wire.producer());
                seeds.push(optimized);
                if let Some(block) = optimizer.circuit.block_mut(extra) {
                    block.inputs.set(
                        port,
                        Wire {
                            producer: optimized,
                            ..wire
                        },
                    );
                }
            }
        }
    }
    for wire in outputs.iter_mut() {
        if optimizer.circuit.block(wire.producer()).is_some() {
            seeds.push(wire.producer());
            let optimized = optimizer.find_optimizations(wire.producer());
            seeds.push(optimized);
            wire.producer = optimized;
        }
    }
    optimizer.apply(seeds);
}
