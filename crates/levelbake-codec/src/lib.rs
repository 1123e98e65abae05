//! Encode and decode level geometry for the engine's binary asset formats.
//!
//! This crate converts placed-object records, terrain chunks and occlusion
//! lists between the engine's byte layouts and editor-friendly values. All
//! functions are pure and synchronous; callers decide how to parallelize and
//! where the bytes come from.
//!
//! # Design principles
//!
//! - **Synchronous**: No async, no threading primitives, no logging
//! - **All-or-nothing writes**: Mutating operations leave their buffers
//!   untouched when they fail
//! - **Exact integers**: Fixed-point fields round half to even and report
//!   overflow instead of wrapping
//!
//! # Key functions
//!
//! - [`Transform::decompose`]: Split a world matrix into position, rotation,
//!   signed scale and a residual reflection
//! - [`swizzle_mat4`]: Convert between engine (Z-up) and editor (Y-up) axes
//! - [`transform_chunk`]: Re-bake a terrain chunk under an affine transform
//! - [`remap_textures`]: Point a chunk at a new global texture table
//! - [`InstanceRecord::decode`]: Read a tie, shrub, cuboid or moby record
//! - [`decode_sets`]: Read per-instance occlusion octant lists

mod bytes;
mod error;

pub mod chunk;
pub mod fixed;
pub mod instance;
pub mod octants;
pub mod packed;
pub mod swizzle;
pub mod textures;
pub mod transform;

pub use chunk::{ChunkDef, ChunkStats, DEF_SIZE, chunk_vertices, transform_chunk};
pub use error::{DecodeError, DecodeResult};
pub use instance::{InstanceData, InstanceKind, InstanceRecord, decode_table, encode_table};
pub use octants::{GridCell, OcclusionSet, decode_sets, encode_sets};
pub use packed::PackedStream;
pub use swizzle::{Swizzle, swizzle_mat4, swizzle_vec3};
pub use textures::remap_textures;
pub use transform::{Transform, compose, look_rotation};
