//! Print a decoded instance table as JSON.
//!
//! Positions, rotations and scales are in editor (Y-up) axes.
//!
//! Run: `cargo run -p levelbake --features tools --bin dump_instances -- <level_dir> <key> <tie|shrub|cuboid|moby> [--strict]`

use std::env;

use levelbake::codec::{InstanceData, InstanceKind, InstanceRecord};
use levelbake::{BakeConfig, Baker, DirStore};
use serde_json::{Value, json};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let (Some(level_dir), Some(key), Some(kind)) = (args.get(1), args.get(2), args.get(3)) else {
        eprintln!("usage: dump_instances <level_dir> <key> <tie|shrub|cuboid|moby> [--strict]");
        std::process::exit(2);
    };
    let Some(kind) = InstanceKind::ALL.into_iter().find(|k| k.name() == kind.as_str()) else {
        return Err(format!("unknown instance kind {kind:?}").into());
    };

    let config = BakeConfig {
        strict_decomposition: args.iter().any(|a| a == "--strict"),
        ..BakeConfig::default()
    };
    tracing_subscriber::fmt()
        .with_max_level(config.level()?)
        .with_writer(std::io::stderr)
        .init();

    let baker = Baker::new(DirStore::new(level_dir), config);
    let records = baker.decode_instances(key, kind)?;
    let dump: Vec<Value> = records.iter().map(record_json).collect();
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}

fn record_json(record: &InstanceRecord) -> Value {
    let t = &record.transform;
    let mut value = json!({
        "class_id": record.class_id,
        "mirrored": record.is_mirrored(),
        "position": t.position.to_array(),
        "rotation": t.rotation.to_array(),
        "scale": t.scale.to_array(),
    });
    if t.has_reflection() {
        value["reflection"] = json!(t.reflection.to_cols_array());
    }
    value["data"] = match record.data {
        InstanceData::Tie {
            occlusion_id,
            group_id,
            tint,
            render_distance,
        } => json!({
            "occlusion_id": occlusion_id,
            "group_id": group_id,
            "tint": tint.to_array(),
            "render_distance": render_distance,
        }),
        InstanceData::Shrub {
            occlusion_id,
            group_id,
            tint,
            render_distance,
        } => json!({
            "occlusion_id": occlusion_id,
            "group_id": group_id,
            "tint": tint.to_array(),
            "render_distance": render_distance,
        }),
        InstanceData::Cuboid { group_id } => json!({ "group_id": group_id }),
        InstanceData::Moby {
            occlusion_id,
            group_id,
            unique_id,
            render_distance,
        } => json!({
            "occlusion_id": occlusion_id,
            "group_id": group_id,
            "unique_id": unique_id,
            "render_distance": render_distance,
        }),
    };
    value
}
