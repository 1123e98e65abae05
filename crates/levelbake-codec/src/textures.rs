//! Texture index remapping for terrain chunks.

use crate::chunk::{ChunkDef, DEF_SIZE, LOD_SPHERE_STRIDE, TEXTURE_SLOT_STRIDE};
use crate::error::{DecodeError, DecodeResult};
use crate::fixed::FixedInt;

/// Rewrite a chunk's texture references into a new global texture table.
///
/// `pairs` holds one `(old, new)` entry per texture slot, in slot order. Slot
/// `i` receives `pairs[i].1`; every LOD-sphere material byte equal to some
/// `old` is replaced with the matching `new`. Unmatched bytes are kept.
///
/// On error `data` is left untouched.
pub fn remap_textures(
    def: &[u8; DEF_SIZE],
    data: &mut [u8],
    pairs: &[(u32, u32)],
) -> DecodeResult<()> {
    let header = ChunkDef::parse(def)?;
    header.validate(data.len())?;
    if pairs.len() != header.texture_count {
        return Err(DecodeError::RemapCountMismatch {
            expected: header.texture_count,
            actual: pairs.len(),
        });
    }

    let mut staged = data.to_vec();
    for (slot, &(_, new)) in pairs.iter().enumerate() {
        let offset = header.texture_offset + slot * TEXTURE_SLOT_STRIDE;
        new.write_le(&mut staged, offset, "texture slot")?;
    }

    for sphere in 0..header.lod_sphere_count {
        let offset = header.lod_sphere_offset + sphere * LOD_SPHERE_STRIDE;
        let current = u32::from(staged[offset]);
        if let Some(&(_, new)) = pairs.iter().find(|(old, _)| *old == current) {
            staged[offset] = u8::try_from(new).map_err(|_| DecodeError::EncodeOverflow {
                value: f64::from(new),
                scale: 1.0,
                bits: u8::BITS,
            })?;
        }
    }

    data.copy_from_slice(&staged);
    Ok(())
}
