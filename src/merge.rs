//! Post-resolution composite-write merging.
//!
//! A second, structural sweep over the resolved component list: adjacent
//! composite writes of the same kind at start channel 1 are fused when their
//! channel sets do not collide, and an upstream writer that loses its last
//! reference is dropped from the emitted list. The inliner's precursor pass
//! already absorbs most chains; this pass catches the ones assembled after
//! optimization or with optimization disabled on the circuit.

use std::collections::HashSet;

use tracing::debug;

use crate::blocks::BlockKind;
use crate::graph::{Circuit, ProducerId};
use crate::wire::Wire;

fn mergeable_write(circuit: &Circuit, id: ProducerId) -> Option<&'static str> {
    let block = circuit.block(id)?;
    if !block.optimize {
        return None;
    }
    match block.kind {
        BlockKind::CompositeWriteNumber { start_channel: 1 } => Some("number"),
        BlockKind::CompositeWriteBoolean { start_channel: 1 } => Some("boolean"),
        _ => None,
    }
}

/// Channels are compatible when the downstream is open everywhere the
/// upstream carries a value.
fn channels_compatible(circuit: &Circuit, downstream: ProducerId, upstream: ProducerId) -> bool {
    let down = circuit.block(downstream).expect("resolved block");
    let up = circuit.block(upstream).expect("resolved block");
    for channel in 1..=32u8 {
        let name = format!("channel_{}_input", channel);
        let ours = down.inputs.get(&name).expect("channel port");
        let theirs = up.inputs.get(&name).expect("channel port");
        if !circuit.is_unconnected(theirs.producer())
            && !circuit.is_unconnected(ours.producer())
        {
            return false;
        }
    }
    true
}

/// Fuse composite-write chains in the resolved component list. `outputs` are
/// the wires bound to placed output nodes, which keep upstream writers
/// referenced. Returns the surviving component list.
pub(crate) fn merge_composite_writes(
    circuit: &mut Circuit,
    mut components: Vec<ProducerId>,
    outputs: &[Wire],
) -> Vec<ProducerId> {
    loop {
        let mut merged_any = false;
        for index in 0..components.len() {
            let downstream = components[index];
            let Some(down_kind) = mergeable_write(circuit, downstream) else {
                continue;
            };
            let upstream_wire = match circuit.block(downstream) {
                Some(block) => match block.inputs.get("composite_signal_input") {
                    Some(wire) => wire,
                    None => continue,
                },
                None => continue,
            };
            let upstream = upstream_wire.producer();
            if mergeable_write(circuit, upstream) != Some(down_kind) || upstream == downstream {
                continue;
            }
            if !channels_compatible(circuit, downstream, upstream) {
                continue;
            }

            // Vacant downstream slots take the upstream values; the
            // upstream's own source becomes the downstream's source.
            let mut lifted: Vec<(String, Wire)> = Vec::new();
            {
                let down_block = circuit.block(downstream).expect("resolved block");
                let up_block = circuit.block(upstream).expect("resolved block");
                for channel in 1..=32u8 {
                    let name = format!("channel_{}_input", channel);
                    let ours = down_block.inputs.get(&name).expect("channel port");
                    if circuit.is_unconnected(ours.producer()) {
                        lifted.push((name.clone(), up_block.inputs.get(&name).expect("channel port")));
                    }
                }
                lifted.push((
                    "composite_signal_input".to_string(),
                    up_block
                        .inputs
                        .get("composite_signal_input")
                        .expect("composite port"),
                ));
            }
            let down_block = circuit.block_mut(downstream).expect("resolved block");
            for (name, wire) in lifted {
                down_block.inputs.set(name, wire);
            }
            merged_any = true;
            debug!("merged composite write chain");
        }

        if !merged_any {
            break;
        }

        // Drop writers that lost their last reference.
        let mut referenced: HashSet<ProducerId> = HashSet::new();
        for &id in &components {
            if let Some(block) = circuit.block(id) {
                for (_, wire) in block.inputs.iter() {
                    referenced.insert(wire.producer());
                }
            }
        }
        for wire in outputs {
            referenced.insert(wire.producer());
        }
        components.retain(|&id| {
            mergeable_write(circuit, id).is_none() || referenced.contains(&id)
        });
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::SignalType;

    #[test]
    fn chained_writes_fuse_into_one() {
        let mut c = Circuit::new();
        let base = c.input(SignalType::Composite, "base", "");
        let a = c.input(SignalType::Number, "A", "");
        let b = c.input(SignalType::Number, "B", "");
        let first = c.composite_write_number(base, &[(1, a.into())]);
        let second = c.composite_write_number(first, &[(2, b.into())]);
        let components = vec![first.producer(), second.producer()];
        let merged = merge_composite_writes(&mut c, components, &[second]);
        assert_eq!(merged, vec![second.producer()]);
        let block = c.block(second.producer()).unwrap();
        assert_eq!(block.inputs.get("channel_1_input").unwrap(), a);
        assert_eq!(block.inputs.get("channel_2_input").unwrap(), b);
        assert_eq!(block.inputs.get("composite_signal_input").unwrap(), base);
    }

    #[test]
    fn colliding_channels_do_not_fuse() {
        let mut c = Circuit::new();
        let base = c.input(SignalType::Composite, "base", "");
        let a = c.input(SignalType::Number, "A", "");
        let b = c.input(SignalType::Number, "B", "");
        let first = c.composite_write_number(base, &[(1, a.into())]);
        let second = c.composite_write_number(first, &[(1, b.into())]);
        let components = vec![first.producer(), second.producer()];
        let merged = merge_composite_writes(&mut c, components.clone(), &[second]);
        assert_eq!(merged, components);
        // Last write to channel 1 still wins at the downstream node.
        let block = c.block(second.producer()).unwrap();
        assert_eq!(block.inputs.get("channel_1_input").unwrap(), b);
    }

    #[test]
    fn mixed_kinds_do_not_fuse() {
        let mut c = Circuit::new();
        let base = c.input(SignalType::Composite, "base", "");
        let a = c.input(SignalType::Number, "A", "");
        let flag = c.input(SignalType::Boolean, "F", "");
        let first = c.composite_write_number(base, &[(1, a.into())]);
        let second = c.composite_write_boolean(first, &[(2, flag.into())]);
        let components = vec![first.producer(), second.producer()];
        let merged = merge_composite_writes(&mut c, components.clone(), &[second]);
        assert_eq!(merged, components);
    }

    #[test]
    fn referenced_upstream_writer_survives() {
        let mut c = Circuit::new();
        let base = c.input(SignalType::Composite, "base", "");
        let a = c.input(SignalType::Number, "A", "");
        let b = c.input(SignalType::Number, "B", "");
        let first = c.composite_write_number(base, &[(1, a.into())]);
        let second = c.composite_write_number(first, &[(2, b.into())]);
        let components = vec![first.producer(), second.producer()];
        // `first` is also placed as an output, so it must not be dropped.
        let merged = merge_composite_writes(&mut c, components, &[second, first]);
        assert_eq!(merged, vec![first.producer(), second.producer()]);
    }

    #[test]
    fn pinned_writers_are_left_alone() {
        let mut c = Circuit::new();
        let base = c.input(SignalType::Composite, "base", "");
        let a = c.input(SignalType::Number, "A", "");
        let b = c.input(SignalType::Number, "B", "");
        let first = c.composite_write_number(base, &[(1, a.into())]);
        c.stop_optimization(first);
        let second = c.composite_write_number(first, &[(2, b.into())]);
        let components = vec![first.producer(), second.producer()];
        let merged = merge_composite_writes(&mut c, components.clone(), &[second]);
        assert_eq!(merged, components);
    }
}
