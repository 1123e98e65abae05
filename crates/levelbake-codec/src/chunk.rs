//! Terrain chunk re-baking.
//!
//! A chunk's geometry is quantized in world space with no runtime transform,
//! so moving a chunk means rewriting every embedded coordinate: the bounding
//! sphere, the vertex table, the anchor point, the bounding cube, the LOD
//! anchors carried by row-register writes, and the packed displacement
//! streams relative to those anchors.
//!
//! # Def layout (64 bytes, little-endian)
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0x00 | sphere center, 3 × i32 @ 1024 |
//! | 0x0C | sphere radius, i32 @ 1024 |
//! | 0x10 | data size, u32 |
//! | 0x14 | vertex table offset, i16 |
//! | 0x16 | anchor offset, i16 |
//! | 0x18 | cube offset, i16 |
//! | 0x1A | color table offset, i16 |
//! | 0x1C | texture table offset, i16 |
//! | 0x1E | LOD-sphere table offset, i16 |
//! | 0x20 | vertex count, u8 |
//! | 0x21 | texture count, u8 |
//! | 0x22 | LOD-sphere count, u8 |
//! | 0x23 | flags, u8 |
//! | 0x24 | engine fields, preserved |

use glam::{DMat4, DVec3, IVec3};

use crate::bytes;
use crate::error::{DecodeError, DecodeResult};
use crate::fixed::{self, CUBE_SCALE, FixedInt, POSITION_SCALE};
use crate::packed::{PackedStream, STROW_MARKER};

/// Size of a chunk def.
pub const DEF_SIZE: usize = 0x40;

/// Bytes per vertex table entry: 3 × i32 plus 4 engine bytes.
pub const VERTEX_STRIDE: usize = 16;

/// Number of bounding-cube corners.
pub const CUBE_CORNERS: usize = 8;

/// Bytes per bounding-cube corner: 3 × i16.
pub const CUBE_CORNER_SIZE: usize = 6;

/// Bytes per texture slot; the texture index is the leading u32.
pub const TEXTURE_SLOT_STRIDE: usize = 0x10;

/// Bytes per LOD-sphere entry; the material index is the leading byte.
pub const LOD_SPHERE_STRIDE: usize = 8;

/// Parsed chunk def.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDef {
    /// Raw sphere center at [`POSITION_SCALE`].
    pub center: IVec3,
    /// Raw sphere radius at [`POSITION_SCALE`].
    pub radius: i32,
    pub data_size: u32,
    pub vertex_offset: usize,
    pub anchor_offset: usize,
    pub cube_offset: usize,
    pub color_offset: usize,
    pub texture_offset: usize,
    pub lod_sphere_offset: usize,
    pub vertex_count: usize,
    pub texture_count: usize,
    pub lod_sphere_count: usize,
    pub flags: u8,
}

impl ChunkDef {
    /// Parse a def buffer. Negative offsets are rejected.
    pub fn parse(def: &[u8; DEF_SIZE]) -> DecodeResult<Self> {
        let i32_at = |offset| i32::read_le(def, offset, "chunk def");
        let offset_at = |offset| -> DecodeResult<usize> {
            let raw = i16::read_le(def, offset, "chunk def")?;
            usize::try_from(raw).map_err(|_| {
                DecodeError::malformed("chunk def", format!("negative offset {raw} at {offset:#x}"))
            })
        };

        Ok(Self {
            center: IVec3::new(i32_at(0x00)?, i32_at(0x04)?, i32_at(0x08)?),
            radius: i32_at(0x0c)?,
            data_size: bytes::read_u32(def, 0x10, "chunk def")?,
            vertex_offset: offset_at(0x14)?,
            anchor_offset: offset_at(0x16)?,
            cube_offset: offset_at(0x18)?,
            color_offset: offset_at(0x1a)?,
            texture_offset: offset_at(0x1c)?,
            lod_sphere_offset: offset_at(0x1e)?,
            vertex_count: usize::from(def[0x20]),
            texture_count: usize::from(def[0x21]),
            lod_sphere_count: usize::from(def[0x22]),
            flags: def[0x23],
        })
    }

    /// Serialize into a def buffer with zeroed engine fields.
    pub fn to_bytes(&self) -> DecodeResult<[u8; DEF_SIZE]> {
        let mut def = [0u8; DEF_SIZE];
        self.write_into(&mut def)?;
        Ok(def)
    }

    /// Overwrite the fields this type knows about, preserving the rest.
    pub fn write_into(&self, def: &mut [u8; DEF_SIZE]) -> DecodeResult<()> {
        let mut staged = *def;
        for (i, component) in self.center.to_array().into_iter().enumerate() {
            component.write_le(&mut staged, i * 4, "chunk def")?;
        }
        self.radius.write_le(&mut staged, 0x0c, "chunk def")?;
        self.data_size.write_le(&mut staged, 0x10, "chunk def")?;
        let offsets = [
            self.vertex_offset,
            self.anchor_offset,
            self.cube_offset,
            self.color_offset,
            self.texture_offset,
            self.lod_sphere_offset,
        ];
        for (i, offset) in offsets.into_iter().enumerate() {
            let raw = i16::try_from(offset).map_err(|_| {
                DecodeError::malformed("chunk def", format!("offset {offset} exceeds i16"))
            })?;
            raw.write_le(&mut staged, 0x14 + i * 2, "chunk def")?;
        }
        let counts = [self.vertex_count, self.texture_count, self.lod_sphere_count];
        for (i, count) in counts.into_iter().enumerate() {
            staged[0x20 + i] = u8::try_from(count).map_err(|_| {
                DecodeError::malformed("chunk def", format!("count {count} exceeds u8"))
            })?;
        }
        staged[0x23] = self.flags;
        *def = staged;
        Ok(())
    }

    /// Decoded sphere center.
    #[must_use]
    pub fn sphere_center(&self) -> DVec3 {
        self.center.as_dvec3() / POSITION_SCALE
    }

    /// Decoded sphere radius.
    #[must_use]
    pub fn sphere_radius(&self) -> f64 {
        fixed::decode(self.radius, POSITION_SCALE)
    }

    /// Check that every table lies inside a data buffer of `data_len` bytes.
    pub fn validate(&self, data_len: usize) -> DecodeResult<()> {
        let declared = usize::try_from(self.data_size).unwrap_or(usize::MAX);
        if data_len < declared {
            return Err(DecodeError::truncated("chunk data", declared, data_len));
        }
        let tables = [
            ("vertex table", self.vertex_offset, self.vertex_count * VERTEX_STRIDE),
            ("anchor", self.anchor_offset, 12),
            ("bounding cube", self.cube_offset, CUBE_CORNERS * CUBE_CORNER_SIZE),
            ("color table", self.color_offset, 0),
            ("texture table", self.texture_offset, self.texture_count * TEXTURE_SLOT_STRIDE),
            ("LOD-sphere table", self.lod_sphere_offset, self.lod_sphere_count * LOD_SPHERE_STRIDE),
        ];
        for (name, offset, len) in tables {
            if offset + len > data_len {
                return Err(DecodeError::malformed(
                    "chunk def",
                    format!("{name} at {offset:#x}+{len} exceeds {data_len} data bytes"),
                ));
            }
        }
        Ok(())
    }
}

/// Counts of the fields rewritten by [`transform_chunk`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkStats {
    pub vertices: usize,
    pub anchors: usize,
    pub displacement_streams: usize,
}

/// A LOD anchor before and after the transform.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    original: DVec3,
    moved: DVec3,
}

/// Re-bake a chunk into a new world transform.
///
/// Both buffers keep their size and offsets; only coordinates change. On
/// error neither buffer is modified.
pub fn transform_chunk(
    def: &mut [u8; DEF_SIZE],
    data: &mut [u8],
    transform: &DMat4,
) -> DecodeResult<ChunkStats> {
    let header = ChunkDef::parse(def)?;
    header.validate(data.len())?;

    let mut staged_def = *def;
    let mut staged = data.to_vec();
    let stats = rebake(&header, &mut staged_def, &mut staged, transform)?;

    *def = staged_def;
    data.copy_from_slice(&staged);
    Ok(stats)
}

/// Decoded vertex positions of a chunk.
pub fn chunk_vertices(def: &[u8; DEF_SIZE], data: &[u8]) -> DecodeResult<Vec<DVec3>> {
    let header = ChunkDef::parse(def)?;
    header.validate(data.len())?;
    (0..header.vertex_count)
        .map(|i| {
            let offset = header.vertex_offset + i * VERTEX_STRIDE;
            fixed::read_vec3::<i32>(data, offset, POSITION_SCALE, "chunk vertex")
        })
        .collect()
}

fn rebake(
    header: &ChunkDef,
    def: &mut [u8; DEF_SIZE],
    data: &mut [u8],
    transform: &DMat4,
) -> DecodeResult<ChunkStats> {
    let center = header.sphere_center();
    let radius = header.sphere_radius();
    fixed::write_vec3::<i32>(
        def,
        0,
        transform.transform_point3(center),
        POSITION_SCALE,
        "chunk def",
    )?;

    for i in 0..header.vertex_count {
        let offset = header.vertex_offset + i * VERTEX_STRIDE;
        move_point::<i32>(data, offset, POSITION_SCALE, transform, "chunk vertex")?;
    }
    move_point::<i32>(data, header.anchor_offset, POSITION_SCALE, transform, "chunk anchor")?;
    for i in 0..CUBE_CORNERS {
        let offset = header.cube_offset + i * CUBE_CORNER_SIZE;
        move_point::<i16>(data, offset, CUBE_SCALE, transform, "bounding cube")?;
    }

    let anchors = move_anchors(data, header.color_offset, center, radius, transform)?;
    let displacement_streams = move_displacements(data, header.color_offset, &anchors, transform)?;

    Ok(ChunkStats {
        vertices: header.vertex_count,
        anchors: anchors.len(),
        displacement_streams,
    })
}

fn move_point<T: FixedInt>(
    data: &mut [u8],
    offset: usize,
    scale: f64,
    transform: &DMat4,
    context: &'static str,
) -> DecodeResult<()> {
    let point = fixed::read_vec3::<T>(data, offset, scale, context)?;
    fixed::write_vec3::<T>(data, offset, transform.transform_point3(point), scale, context)
}

/// Rewrite row-register anchors lying inside the chunk's bounding sphere.
///
/// The sphere test separates LOD anchors from other row writes; the format
/// has no explicit marker for them.
fn move_anchors(
    data: &mut [u8],
    end: usize,
    center: DVec3,
    radius: f64,
    transform: &DMat4,
) -> DecodeResult<Vec<Anchor>> {
    let mut anchors = Vec::new();
    let mut offset = 0;
    while offset + 4 <= end {
        if bytes::read_u32(data, offset, "chunk stream")? == STROW_MARKER {
            let row = offset + 4;
            let original = fixed::read_vec3::<i32>(data, row, POSITION_SCALE, "row anchor")?;
            if original.distance(center) < radius {
                let moved = transform.transform_point3(original);
                fixed::write_vec3::<i32>(data, row, moved, POSITION_SCALE, "row anchor")?;
                anchors.push(Anchor { original, moved });
            }
        }
        offset += 4;
    }
    Ok(anchors)
}

/// Rewrite displacement streams relative to their anchors.
///
/// Streams are paired with anchors in discovery order. Streams left over once
/// every anchor is consumed are skipped unchanged.
fn move_displacements(
    data: &mut [u8],
    end: usize,
    anchors: &[Anchor],
    transform: &DMat4,
) -> DecodeResult<usize> {
    let mut pending = anchors.iter();
    let mut rewritten = 0;
    let mut offset = 0;
    while offset + 4 <= end {
        let tag = bytes::read_u32(data, offset, "chunk stream")?;
        let Some(stream) = PackedStream::from_tag(tag) else {
            offset += 4;
            continue;
        };
        let payload = offset + 4;
        if stream.is_displacement()
            && let Some(anchor) = pending.next()
        {
            bytes::ensure_len(data, payload + stream.count * 6, "displacement stream")?;
            for i in 0..stream.count {
                let at = payload + i * 6;
                let delta = fixed::read_vec3::<i16>(data, at, POSITION_SCALE, "displacement")?;
                let moved = transform.transform_point3(anchor.original + delta);
                fixed::write_vec3::<i16>(
                    data,
                    at,
                    moved - anchor.moved,
                    POSITION_SCALE,
                    "displacement",
                )?;
            }
            rewritten += 1;
        }
        offset += stream.block_len();
    }
    Ok(rewritten)
}
