//! Batch compilation, artifact writing, and vehicle merging.
//!
//! `handle` is the entry point a microcontroller project calls from its
//! `main`: it compiles the given controllers (optionally filtered by
//! `--select`), writes their documents to the data directory
//! (`--microcontroller`), and splices them into vehicle files (`--vehicle`),
//! carrying user-tuned property values over unless a property is marked
//! force-property.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::Value;
use tracing::info;

use crate::controller::Microcontroller;
use crate::emit::{ComponentDef, Document, BUILDER_IDENTIFIER};
use crate::error::{Error, Result};

/// Environment variable overriding the artifact root.
pub const DATA_DIR_ENV: &str = "WIRELOOM_DATA_DIR";

/// Command surface of a microcontroller project binary.
#[derive(Parser, Debug, Default)]
#[command(about = "Compile and export the microcontrollers defined by this project")]
pub struct HandleArgs {
    /// Export compiled microcontrollers to the data directory.
    #[arg(long, short = 'm')]
    pub microcontroller: bool,

    /// Vehicle files to update, separated by commas.
    #[arg(long, short = 'v')]
    pub vehicle: Option<String>,

    /// Only export microcontrollers whose name contains one of these
    /// comma-separated fragments.
    #[arg(long, short = 's')]
    pub select: Option<String>,
}

fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("wireloom-out"))
}

fn artifact_path(name: &str, kind: &str) -> PathBuf {
    if name.ends_with(".json") {
        PathBuf::from(name)
    } else {
        data_dir().join(kind).join(format!("{}.json", name))
    }
}

/// Compile the given microcontrollers and export per `args`.
///
/// # Panics
///
/// Panics if `controllers` is empty; a project must define at least one
/// microcontroller.
pub fn handle(mut controllers: Vec<Microcontroller>, args: &HandleArgs) -> Result<()> {
    assert!(
        !controllers.is_empty(),
        "at least one microcontroller must be provided"
    );
    let selected: HashSet<String> = args
        .select
        .as_deref()
        .map(|s| s.split(',').map(|n| n.trim().to_string()).collect())
        .unwrap_or_default();

    let mut compiled: Vec<(String, Document)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for controller in &mut controllers {
        let name = controller.name().to_string();
        if !selected.is_empty() && !selected.iter().any(|fragment| name.contains(fragment)) {
            continue;
        }
        if !seen.insert(name.clone()) {
            return Err(Error::DuplicateName { name });
        }
        let document = controller.compile()?;
        compiled.push((controller.save_name().to_string(), document));
    }

    if args.microcontroller {
        for (save_name, document) in &compiled {
            let path = artifact_path(save_name, "microprocessors");
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let json = document
                .to_json()
                .map_err(|err| Error::MalformedDocument(err.to_string()))?;
            std::fs::write(&path, json)?;
            info!(name = %document.name, path = %path.display(), "wrote microcontroller");
        }
    }

    if let Some(vehicles) = &args.vehicle {
        for vehicle in vehicles.split(',') {
            replace_in_vehicle(vehicle.trim(), &compiled)?;
        }
    }
    Ok(())
}

/// Replace every matching microcontroller inside a vehicle file, keeping the
/// vehicle's other content untouched. Only microcontrollers stamped with the
/// builder identifier are replaced.
fn replace_in_vehicle(vehicle: &str, compiled: &[(String, Document)]) -> Result<()> {
    let path = artifact_path(vehicle, "vehicles");
    let raw = std::fs::read_to_string(&path)?;
    let mut tree: Value = serde_json::from_str(&raw)
        .map_err(|err| Error::MalformedDocument(err.to_string()))?;
    let slots = tree
        .get_mut("microcontrollers")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| {
            Error::MalformedDocument("vehicle has no microcontrollers array".to_string())
        })?;

    let mut replaced = 0usize;
    for slot in slots.iter_mut() {
        let Ok(existing) = serde_json::from_value::<Document>(slot.clone()) else {
            continue;
        };
        if existing.builder != BUILDER_IDENTIFIER {
            continue;
        }
        let Some((_, fresh)) = compiled
            .iter()
            .find(|(_, document)| document.name == existing.name)
        else {
            continue;
        };
        let mut merged = fresh.clone();
        merge_properties(&mut merged, &existing);
        *slot = serde_json::to_value(&merged)
            .map_err(|err| Error::MalformedDocument(err.to_string()))?;
        replaced += 1;
    }

    if replaced == 0 {
        info!(vehicle, "no microcontrollers to update");
        return Ok(());
    }
    let out = serde_json::to_string_pretty(&tree)
        .map_err(|err| Error::MalformedDocument(err.to_string()))?;
    std::fs::write(&path, out)?;
    info!(vehicle, replaced, "updated vehicle");
    Ok(())
}

fn property_name(component: &ComponentDef) -> Option<&str> {
    component.properties.get("name").and_then(Value::as_str)
}

fn matching_property<'d>(
    document: &'d Document,
    kind: &str,
    name: &str,
) -> Option<&'d ComponentDef> {
    document
        .components
        .iter()
        .find(|c| c.kind == kind && property_name(c) == Some(name))
}

/// Carry user-tuned property values from the old document into the fresh
/// one. Properties marked force-property keep their freshly compiled value.
fn merge_properties(fresh: &mut Document, existing: &Document) {
    for component in &mut fresh.components {
        if !component.kind.starts_with("property_") || component.force_property {
            continue;
        }
        let Some(name) = property_name(component).map(str::to_string) else {
            continue;
        };
        let Some(old) = matching_property(existing, &component.kind, &name) else {
            continue;
        };
        if component.kind == "property_dropdown" {
            // Dropdowns carry over by label, not by index, so re-ordered
            // options keep the user's selection.
            let old_label = old
                .properties
                .get("selected")
                .and_then(Value::as_u64)
                .and_then(|index| {
                    old.properties
                        .get("options")
                        .and_then(Value::as_array)
                        .and_then(|options| options.get(index as usize))
                })
                .and_then(|option| option.get("label"))
                .and_then(Value::as_str);
            if let Some(label) = old_label {
                let new_index = component
                    .properties
                    .get("options")
                    .and_then(Value::as_array)
                    .and_then(|options| {
                        options.iter().position(|option| {
                            option.get("label").and_then(Value::as_str) == Some(label)
                        })
                    });
                if let Some(index) = new_index {
                    component
                        .properties
                        .insert("selected".to_string(), Value::from(index));
                }
            }
        } else if let Some(value) = old.properties.get("value") {
            component
                .properties
                .insert("value".to_string(), value.clone());
        }
    }
}

/// Write a runnable skeleton project at `root`.
pub fn init_project(root: &Path) -> Result<()> {
    if root.exists() {
        return Err(Error::DuplicateName {
            name: root.display().to_string(),
        });
    }
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "microcontroller".to_string());
    std::fs::create_dir_all(root.join("src"))?;
    std::fs::write(
        root.join("Cargo.toml"),
        format!(
            "[package]\nname = \"{}\"\nversion = \"0.1.0\"\nedition = \"2021\"\n\n\
             [dependencies]\nwireloom = \"0.1\"\n",
            name
        ),
    )?;
    std::fs::write(root.join("src/main.rs"), SKELETON)?;
    info!(path = %root.display(), "initialized microcontroller project");
    Ok(())
}

const SKELETON: &str = r#"use wireloom::prelude::*;

fn main() -> wireloom::Result<()> {
    let mut circuit = Circuit::new();
    let input1 = circuit.input(SignalType::Number, "Input 1", "First operand.");
    let input2 = circuit.input(SignalType::Number, "Input 2", "Second operand.");
    let added = circuit.add(input1, input2);

    let mut mc = Microcontroller::new("Example MC", circuit);
    mc.place_input(input1, 0, 0)?;
    mc.place_input(input2, 0, 1)?;
    mc.place_output(added, "Added", "The sum of both inputs.", 1, 0)?;

    handle(vec![mc], &HandleArgs::parse())
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn property(kind: &str, name: &str, value: Value, force: bool) -> ComponentDef {
        let mut properties = Map::new();
        properties.insert("name".to_string(), Value::from(name));
        properties.insert("value".to_string(), value);
        ComponentDef {
            component_id: 1,
            kind: kind.to_string(),
            kind_id: 0,
            position: (0, 0),
            properties,
            inputs: vec![],
            force_property: force,
        }
    }

    fn doc(components: Vec<ComponentDef>) -> Document {
        Document {
            name: "mc".to_string(),
            description: String::new(),
            width: 2,
            length: 2,
            builder: BUILDER_IDENTIFIER.to_string(),
            nodes: vec![],
            components,
            icon: None,
        }
    }

    #[test]
    fn merge_keeps_user_tuned_values() {
        let mut fresh = doc(vec![property(
            "property_number",
            "gain",
            Value::from(1.0),
            false,
        )]);
        let existing = doc(vec![property(
            "property_number",
            "gain",
            Value::from(3.5),
            false,
        )]);
        merge_properties(&mut fresh, &existing);
        assert_eq!(
            fresh.components[0].properties.get("value"),
            Some(&Value::from(3.5))
        );
    }

    #[test]
    fn merge_respects_force_property() {
        let mut fresh = doc(vec![property(
            "property_text",
            "callsign",
            Value::from("NEW"),
            true,
        )]);
        let existing = doc(vec![property(
            "property_text",
            "callsign",
            Value::from("OLD"),
            false,
        )]);
        merge_properties(&mut fresh, &existing);
        assert_eq!(
            fresh.components[0].properties.get("value"),
            Some(&Value::from("NEW"))
        );
    }

    #[test]
    fn merge_matches_dropdowns_by_label() {
        let mut fresh_props = Map::new();
        fresh_props.insert("name".to_string(), Value::from("mode"));
        fresh_props.insert(
            "options".to_string(),
            json!([{"label": "slow", "value": 1.0}, {"label": "fast", "value": 2.0}]),
        );
        fresh_props.insert("selected".to_string(), Value::from(0));
        let mut fresh = doc(vec![ComponentDef {
            component_id: 1,
            kind: "property_dropdown".to_string(),
            kind_id: 0,
            position: (0, 0),
            properties: fresh_props,
            inputs: vec![],
            force_property: false,
        }]);

        // The old document had the options in a different order, with
        // "fast" selected.
        let mut old_props = Map::new();
        old_props.insert("name".to_string(), Value::from("mode"));
        old_props.insert(
            "options".to_string(),
            json!([{"label": "fast", "value": 2.0}, {"label": "slow", "value": 1.0}]),
        );
        old_props.insert("selected".to_string(), Value::from(0));
        let existing = doc(vec![ComponentDef {
            component_id: 1,
            kind: "property_dropdown".to_string(),
            kind_id: 0,
            position: (0, 0),
            properties: old_props,
            inputs: vec![],
            force_property: false,
        }]);

        merge_properties(&mut fresh, &existing);
        assert_eq!(
            fresh.components[0].properties.get("selected"),
            Some(&Value::from(1))
        );
    }

    #[test]
    fn unmatched_properties_keep_fresh_values() {
        let mut fresh = doc(vec![property(
            "property_number",
            "gain",
            Value::from(1.0),
            false,
        )]);
        let existing = doc(vec![property(
            "property_number",
            "other",
            Value::from(9.0),
            false,
        )]);
        merge_properties(&mut fresh, &existing);
        assert_eq!(
            fresh.components[0].properties.get("value"),
            Some(&Value::from(1.0))
        );
    }
}
