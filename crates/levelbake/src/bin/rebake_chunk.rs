//! Apply a JSON manifest of chunk jobs to an unpacked level directory.
//!
//! Each job moves one chunk's def/data pair and optionally remaps its
//! textures. Jobs run concurrently on blocking worker threads.
//!
//! Run: `cargo run -p levelbake --features tools --bin rebake_chunk -- <level_dir> <jobs.json> [config.json]`

use std::env;
use std::path::Path;
use std::sync::Arc;

use levelbake::{BakeConfig, BakeReport, Baker, ChunkJob, DirStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let (Some(level_dir), Some(manifest)) = (args.get(1), args.get(2)) else {
        eprintln!("usage: rebake_chunk <level_dir> <jobs.json> [config.json]");
        std::process::exit(2);
    };
    let config = match args.get(3) {
        Some(path) => BakeConfig::from_json_file(path)?,
        None => BakeConfig::default(),
    };
    tracing_subscriber::fmt()
        .with_max_level(config.level()?)
        .init();

    let jobs: Vec<ChunkJob> = serde_json::from_str(&std::fs::read_to_string(manifest)?)?;
    tracing::info!(jobs = jobs.len(), level_dir = %level_dir, "Loaded job manifest");

    let baker = Arc::new(Baker::new(DirStore::new(Path::new(level_dir)), config));
    let tasks: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            let baker = Arc::clone(&baker);
            tokio::task::spawn_blocking(move || {
                let result = baker.bake_chunk(&job);
                (job.chunk, result)
            })
        })
        .collect();

    let mut report = BakeReport::default();
    for task in tasks {
        let (chunk, result) = task.await?;
        report.record(&chunk, result);
    }

    println!(
        "baked {} chunks ({} vertices, {} anchors), skipped {}, failed {}",
        report.baked,
        report.vertices,
        report.anchors,
        report.skipped,
        report.failed.len()
    );
    for (chunk, error) in &report.failed {
        eprintln!("  {chunk}: {error}");
    }
    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
