use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use std::sync::Arc;

use material_system::{
    logging, Config, HeadlessShaderService, LoadOptions, MaterialConfig, MaterialManager,
    MaterialRef, MaterialSerializer, RonDocumentStore, Services, TextureSlot,
};

const DEFAULT_ROOT: &str = ".";

fn main() -> Result<()> {
    let matches = Command::new("mtl_inspect")
        .about("Loads material descriptors and prints the resolved material tree")
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .value_name("DIR")
                .help("Asset root the material names are relative to")
                .default_value(DEFAULT_ROOT),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Material manager settings (.toml or .ron)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Write each loaded material back out below this directory"),
        )
        .arg(
            Arg::new("decals")
                .long("decals")
                .help("Preload the decal folder before inspecting")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("materials")
                .value_name("MATERIAL")
                .help("Material names to load")
                .num_args(1..)
                .required(true),
        )
        .get_matches();

    logging::init();

    let config = match matches.get_one::<String>("config") {
        Some(path) => MaterialConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path))?,
        None => MaterialConfig::default(),
    };

    let root = matches
        .get_one::<String>("root")
        .map_or(DEFAULT_ROOT, String::as_str);
    logging::info!("Inspecting materials under {}", root);
    let store = Arc::new(RonDocumentStore::new(root));
    let services = Services::from_store(store, Arc::new(HeadlessShaderService::new()));
    let manager = MaterialManager::new(services, config);

    if matches.get_flag("decals") {
        let count = manager.preload_decal_materials();
        println!("Preloaded {} decal materials", count);
    }

    let output = matches
        .get_one::<String>("output")
        .map(RonDocumentStore::new);

    for name in matches.get_many::<String>("materials").into_iter().flatten() {
        let Some(material) = manager.load_or_create(name, LoadOptions::default()) else {
            println!("{}: not found", name);
            continue;
        };
        print_material(&material, 0);

        if let Some(output) = &output {
            let file = format!("{}.mtl", material.name());
            output
                .write(&file, &MaterialSerializer::save(&material))
                .with_context(|| format!("Failed to write {}", file))?;
            println!("  saved to {}", output.root().join(&file).display());
        }
    }

    manager.shutdown();
    Ok(())
}

fn print_material(material: &MaterialRef, depth: usize) {
    let indent = "  ".repeat(depth);
    let shader = material.shader_name();
    let status = if material.has_render_capability() {
        "bound"
    } else {
        "unbound"
    };

    println!(
        "{}{} [{}] shader={} ({}) flags={:?}",
        indent,
        material.name(),
        if material.is_pure_child() { "inline" } else { "registered" },
        if shader.is_empty() { "-" } else { shader.as_str() },
        status,
        material.flags()
    );

    let resources = material.resources();
    if let Some(diffuse) = resources.texture(TextureSlot::Diffuse) {
        println!("{}  diffuse: {}", indent, diffuse);
    }
    for param in &resources.params {
        println!(
            "{}  param {} = ({}, {}, {}, {})",
            indent, param.name, param.value.x, param.value.y, param.value.z, param.value.w
        );
    }

    for slot in 0..material_system::MAX_LAYER_SLOTS {
        if let Some(layer) = material.layer(slot) {
            println!(
                "{}  layer {}: {} {:?}",
                indent,
                slot,
                layer.shader_name(),
                layer.flags()
            );
        }
    }

    for (index, sub) in material.sub_materials().iter().enumerate() {
        match sub {
            Some(sub) => print_material(sub, depth + 1),
            None => println!("{}  [{}] empty", indent, index),
        }
    }
}
