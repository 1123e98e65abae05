//! Per-instance occlusion octant lists.
//!
//! Each record is `instance_index: i32`, `occlusion_id: i32`, `count: i32`,
//! then `count` cells of three i16 stored as `(x, z, y)` in grid units, then
//! zero padding up to the next 16-byte boundary of the stream.

use glam::Vec3;

use crate::bytes;
use crate::error::{DecodeError, DecodeResult};
use crate::fixed::FixedInt;

/// World units per grid cell.
pub const CELL_SIZE: i16 = 4;

/// Stream alignment after each record.
pub const RECORD_ALIGN: usize = 16;

const HEADER_SIZE: usize = 12;
const CELL_BYTES: usize = 6;

/// A grid cell, in world units on the [`CELL_SIZE`] grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl GridCell {
    #[must_use]
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    /// The cell containing a world position, or `None` outside the i16 range.
    #[must_use]
    pub fn containing(point: Vec3) -> Option<Self> {
        let snap = |v: f32| {
            let cell = (v / f32::from(CELL_SIZE)).floor() * f32::from(CELL_SIZE);
            i16::from_rounded(f64::from(cell))
        };
        Some(Self::new(snap(point.x)?, snap(point.y)?, snap(point.z)?))
    }
}

/// The cells visible from one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OcclusionSet {
    pub instance_index: i32,
    pub occlusion_id: i32,
    pub cells: Vec<GridCell>,
}

impl OcclusionSet {
    /// Append this record, padded, to `out`.
    ///
    /// Off-grid cells are floored onto the grid, like [`GridCell::containing`].
    #[allow(clippy::cast_precision_loss)]
    pub fn encode_into(&self, out: &mut Vec<u8>) -> DecodeResult<()> {
        let count = i32::try_from(self.cells.len()).map_err(|_| DecodeError::EncodeOverflow {
            value: self.cells.len() as f64,
            scale: 1.0,
            bits: i32::BITS,
        })?;
        out.reserve(HEADER_SIZE + self.cells.len() * CELL_BYTES + RECORD_ALIGN);
        out.extend_from_slice(&self.instance_index.to_le_bytes());
        out.extend_from_slice(&self.occlusion_id.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        for cell in &self.cells {
            for component in [cell.x, cell.z, cell.y] {
                out.extend_from_slice(&component.div_euclid(CELL_SIZE).to_le_bytes());
            }
        }
        out.resize(out.len().next_multiple_of(RECORD_ALIGN), 0);
        Ok(())
    }

    /// Decode the record starting at `offset` in `stream`.
    ///
    /// Returns the set and the offset of the next record.
    pub fn decode_at(stream: &[u8], offset: usize) -> DecodeResult<(Self, usize)> {
        let instance_index = i32::read_le(stream, offset, "occlusion record")?;
        let occlusion_id = i32::read_le(stream, offset + 4, "occlusion record")?;
        let count = i32::read_le(stream, offset + 8, "occlusion record")?;
        let count = usize::try_from(count).map_err(|_| {
            DecodeError::malformed("occlusion record", format!("negative cell count {count}"))
        })?;

        let cells_start = offset + HEADER_SIZE;
        let cells_end = count
            .checked_mul(CELL_BYTES)
            .and_then(|len| cells_start.checked_add(len))
            .ok_or_else(|| DecodeError::malformed("occlusion record", "cell count overflows"))?;
        bytes::ensure_len(stream, cells_end, "occlusion record")?;

        let cells = (0..count)
            .map(|i| {
                let at = cells_start + i * CELL_BYTES;
                let x = grid_to_world(i16::read_le(stream, at, "occlusion cell")?)?;
                let z = grid_to_world(i16::read_le(stream, at + 2, "occlusion cell")?)?;
                let y = grid_to_world(i16::read_le(stream, at + 4, "occlusion cell")?)?;
                Ok(GridCell::new(x, y, z))
            })
            .collect::<DecodeResult<Vec<_>>>()?;

        let next = cells_end.next_multiple_of(RECORD_ALIGN).min(stream.len());
        let set = Self {
            instance_index,
            occlusion_id,
            cells,
        };
        Ok((set, next))
    }
}

fn grid_to_world(stored: i16) -> DecodeResult<i16> {
    stored.checked_mul(CELL_SIZE).ok_or_else(|| {
        DecodeError::malformed("occlusion cell", format!("grid index {stored} exceeds i16 range"))
    })
}

/// Encode sets as consecutive padded records.
pub fn encode_sets(sets: &[OcclusionSet]) -> DecodeResult<Vec<u8>> {
    let mut out = Vec::new();
    for set in sets {
        set.encode_into(&mut out)?;
    }
    Ok(out)
}

/// Decode every record in a stream.
pub fn decode_sets(stream: &[u8]) -> DecodeResult<Vec<OcclusionSet>> {
    let mut sets = Vec::new();
    let mut offset = 0;
    while offset < stream.len() {
        let (set, next) = OcclusionSet::decode_at(stream, offset)?;
        sets.push(set);
        offset = next;
    }
    Ok(sets)
}
