//! Build step that moves level chunks and rewrites instance tables.
//!
//! This crate drives [`levelbake_codec`] over assets held in an
//! [`AssetStore`]. A [`Baker`] loads chunk def/data pairs, re-bakes them under
//! a job's transform, remaps their textures and writes them back. It also
//! reads and writes instance tables and occlusion octant streams.
//!
//! # Example
//!
//! ```
//! use glam::DMat4;
//! use levelbake::{BakeConfig, Baker, ChunkJob, ChunkKey, MemoryStore};
//!
//! let baker = Baker::new(MemoryStore::new(), BakeConfig::default());
//! let job = ChunkJob::new(ChunkKey::new("chunk_00"), DMat4::IDENTITY);
//! let report = baker.bake_chunks(&[job]);
//! assert_eq!(report.skipped, 1);
//! ```

mod bake;
mod config;
mod error;
mod store;

pub use bake::{BakeReport, Baker, ChunkJob, ChunkOutcome};
pub use config::BakeConfig;
pub use error::{Error, Result};
pub use store::{AssetStore, ChunkKey, DirStore, MemoryStore};

// Re-export the codec so tools only need one dependency.
pub use levelbake_codec as codec;
