//! Placed-object instance records.
//!
//! Every kind shares a 16-byte header and the swizzled world matrix:
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0x00 | class id, u32 |
//! | 0x04 | flags, u32 (bit 0: mirrored) |
//! | 0x08 | two kind-specific words |
//! | 0x10 | world matrix, 16 × f32, column-major, engine axes |
//!
//! Ties and cuboids follow the matrix with its inverse at 0x50 as 12 floats
//! (the xyz of each column). The inverse is written from the decomposed
//! transform and ignored on read.

use glam::{Mat4, Vec3, Vec4};

use crate::bytes;
use crate::error::{DecodeError, DecodeResult};
use crate::fixed::{self, FixedInt, TINT_SCALE};
use crate::swizzle::Swizzle;
use crate::transform::Transform;

/// Offset of the world matrix.
pub const MATRIX_OFFSET: usize = 0x10;

/// Offset of the affine inverse, for kinds that carry one.
pub const INVERSE_OFFSET: usize = 0x50;

/// Flag bit set on mirrored placements.
pub const FLAG_MIRRORED: u32 = 1;

/// Record layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceKind {
    Tie,
    Shrub,
    Cuboid,
    Moby,
}

impl InstanceKind {
    pub const ALL: [Self; 4] = [Self::Tie, Self::Shrub, Self::Cuboid, Self::Moby];

    /// Fixed size of one record.
    #[must_use]
    pub const fn record_size(self) -> usize {
        match self {
            Self::Tie => 0x90,
            Self::Shrub => 0x70,
            Self::Cuboid => 0x80,
            Self::Moby => 0x60,
        }
    }

    /// Whether the layout stores the inverse matrix after the world matrix.
    #[must_use]
    pub const fn has_inverse(self) -> bool {
        matches!(self, Self::Tie | Self::Cuboid)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tie => "tie",
            Self::Shrub => "shrub",
            Self::Cuboid => "cuboid",
            Self::Moby => "moby",
        }
    }

    const fn context(self) -> &'static str {
        match self {
            Self::Tie => "tie record",
            Self::Shrub => "shrub record",
            Self::Cuboid => "cuboid record",
            Self::Moby => "moby record",
        }
    }
}

/// Kind-specific fields.
///
/// Tints are in `0.0..=1.0` per channel, stored scaled by 128.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InstanceData {
    Tie {
        occlusion_id: i32,
        group_id: i32,
        tint: Vec3,
        render_distance: f32,
    },
    Shrub {
        occlusion_id: i32,
        group_id: i32,
        tint: Vec4,
        render_distance: f32,
    },
    Cuboid {
        group_id: i32,
    },
    Moby {
        occlusion_id: i32,
        group_id: i32,
        unique_id: i32,
        render_distance: f32,
    },
}

impl InstanceData {
    #[must_use]
    pub const fn kind(&self) -> InstanceKind {
        match self {
            Self::Tie { .. } => InstanceKind::Tie,
            Self::Shrub { .. } => InstanceKind::Shrub,
            Self::Cuboid { .. } => InstanceKind::Cuboid,
            Self::Moby { .. } => InstanceKind::Moby,
        }
    }
}

/// A placed object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceRecord {
    pub class_id: u32,
    pub flags: u32,
    pub transform: Transform,
    pub data: InstanceData,
}

impl InstanceRecord {
    /// A record whose mirrored flag follows the transform.
    #[must_use]
    pub fn new(class_id: u32, transform: Transform, data: InstanceData) -> Self {
        let flags = if transform.is_mirrored() {
            FLAG_MIRRORED
        } else {
            0
        };
        Self {
            class_id,
            flags,
            transform,
            data,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> InstanceKind {
        self.data.kind()
    }

    #[must_use]
    pub const fn is_mirrored(&self) -> bool {
        self.flags & FLAG_MIRRORED != 0
    }

    /// Decode one record, resolving decomposition ambiguities silently.
    pub fn decode(kind: InstanceKind, buf: &[u8]) -> DecodeResult<Self> {
        let world = read_world(kind, buf)?;
        read_record(kind, buf, Transform::decompose(world))
    }

    /// Decode one record, failing on an ambiguous decomposition.
    pub fn decode_strict(kind: InstanceKind, buf: &[u8]) -> DecodeResult<Self> {
        let world = read_world(kind, buf)?;
        read_record(kind, buf, Transform::decompose_strict(world)?)
    }

    /// Encode into a freshly allocated record.
    pub fn encode(&self) -> DecodeResult<Vec<u8>> {
        let kind = self.kind();
        let context = kind.context();
        let mut out = vec![0u8; kind.record_size()];

        self.class_id.write_le(&mut out, 0x00, context)?;
        self.flags.write_le(&mut out, 0x04, context)?;

        let world = self.transform.to_matrix().swizzled();
        write_f32s(&mut out, MATRIX_OFFSET, &world.to_cols_array(), context)?;
        if kind.has_inverse() {
            let inverse = self.transform.inverse_matrix().swizzled();
            let affine: Vec<f32> = [inverse.x_axis, inverse.y_axis, inverse.z_axis, inverse.w_axis]
                .iter()
                .flat_map(|column| column.truncate().to_array())
                .collect();
            write_f32s(&mut out, INVERSE_OFFSET, &affine, context)?;
        }

        match self.data {
            InstanceData::Tie {
                occlusion_id,
                group_id,
                tint,
                render_distance,
            } => {
                occlusion_id.write_le(&mut out, 0x08, context)?;
                group_id.write_le(&mut out, 0x0c, context)?;
                for (i, channel) in tint.to_array().into_iter().enumerate() {
                    write_tint::<u16>(&mut out, 0x80 + i * 2, channel, context)?;
                }
                write_f32s(&mut out, 0x88, &[render_distance], context)?;
            }
            InstanceData::Shrub {
                occlusion_id,
                group_id,
                tint,
                render_distance,
            } => {
                write_f32s(&mut out, 0x08, &[render_distance], context)?;
                group_id.write_le(&mut out, 0x0c, context)?;
                for (i, channel) in tint.to_array().into_iter().enumerate() {
                    write_tint::<u32>(&mut out, 0x50 + i * 4, channel, context)?;
                }
                occlusion_id.write_le(&mut out, 0x60, context)?;
            }
            InstanceData::Cuboid { group_id } => {
                group_id.write_le(&mut out, 0x08, context)?;
            }
            InstanceData::Moby {
                occlusion_id,
                group_id,
                unique_id,
                render_distance,
            } => {
                group_id.write_le(&mut out, 0x08, context)?;
                write_f32s(&mut out, 0x0c, &[render_distance], context)?;
                occlusion_id.write_le(&mut out, 0x50, context)?;
                unique_id.write_le(&mut out, 0x54, context)?;
            }
        }
        Ok(out)
    }

    /// Encode into the start of `out`, which must hold a whole record.
    pub fn encode_into(&self, out: &mut [u8]) -> DecodeResult<()> {
        let size = self.kind().record_size();
        bytes::ensure_len(out, size, self.kind().context())?;
        let record = self.encode()?;
        out[..size].copy_from_slice(&record);
        Ok(())
    }
}

/// Decode a contiguous table of records of one kind.
pub fn decode_table(kind: InstanceKind, table: &[u8]) -> DecodeResult<Vec<InstanceRecord>> {
    let size = kind.record_size();
    if table.len() % size != 0 {
        return Err(DecodeError::malformed(
            kind.context(),
            format!("table of {} bytes is not a multiple of {size}", table.len()),
        ));
    }
    table
        .chunks_exact(size)
        .map(|record| InstanceRecord::decode(kind, record))
        .collect()
}

/// Encode records of one kind into a contiguous table.
pub fn encode_table(records: &[InstanceRecord]) -> DecodeResult<Vec<u8>> {
    let Some(first) = records.first() else {
        return Ok(Vec::new());
    };
    let kind = first.kind();
    let mut table = Vec::with_capacity(records.len() * kind.record_size());
    for record in records {
        if record.kind() != kind {
            return Err(DecodeError::malformed(
                kind.context(),
                format!("table mixes {} and {} records", kind.name(), record.kind().name()),
            ));
        }
        table.extend_from_slice(&record.encode()?);
    }
    Ok(table)
}

fn read_world(kind: InstanceKind, buf: &[u8]) -> DecodeResult<Mat4> {
    let context = kind.context();
    bytes::ensure_len(buf, kind.record_size(), context)?;
    let mut columns = [0f32; 16];
    for (i, value) in columns.iter_mut().enumerate() {
        *value = bytes::read_f32(buf, MATRIX_OFFSET + i * 4, context)?;
    }
    Ok(Mat4::from_cols_array(&columns).swizzled())
}

fn read_record(kind: InstanceKind, buf: &[u8], transform: Transform) -> DecodeResult<InstanceRecord> {
    let context = kind.context();
    let class_id = u32::read_le(buf, 0x00, context)?;
    let flags = u32::read_le(buf, 0x04, context)?;

    let data = match kind {
        InstanceKind::Tie => InstanceData::Tie {
            occlusion_id: i32::read_le(buf, 0x08, context)?,
            group_id: i32::read_le(buf, 0x0c, context)?,
            tint: Vec3::new(
                read_tint::<u16>(buf, 0x80, context)?,
                read_tint::<u16>(buf, 0x82, context)?,
                read_tint::<u16>(buf, 0x84, context)?,
            ),
            render_distance: bytes::read_f32(buf, 0x88, context)?,
        },
        InstanceKind::Shrub => InstanceData::Shrub {
            occlusion_id: i32::read_le(buf, 0x60, context)?,
            group_id: i32::read_le(buf, 0x0c, context)?,
            tint: Vec4::new(
                read_tint::<u32>(buf, 0x50, context)?,
                read_tint::<u32>(buf, 0x54, context)?,
                read_tint::<u32>(buf, 0x58, context)?,
                read_tint::<u32>(buf, 0x5c, context)?,
            ),
            render_distance: bytes::read_f32(buf, 0x08, context)?,
        },
        InstanceKind::Cuboid => InstanceData::Cuboid {
            group_id: i32::read_le(buf, 0x08, context)?,
        },
        InstanceKind::Moby => InstanceData::Moby {
            occlusion_id: i32::read_le(buf, 0x50, context)?,
            group_id: i32::read_le(buf, 0x08, context)?,
            unique_id: i32::read_le(buf, 0x54, context)?,
            render_distance: bytes::read_f32(buf, 0x0c, context)?,
        },
    };

    Ok(InstanceRecord {
        class_id,
        flags,
        transform,
        data,
    })
}

#[allow(clippy::cast_possible_truncation)]
fn read_tint<T: FixedInt>(buf: &[u8], offset: usize, context: &'static str) -> DecodeResult<f32> {
    T::read_le(buf, offset, context).map(|raw| fixed::decode(raw, TINT_SCALE) as f32)
}

fn write_tint<T: FixedInt>(
    out: &mut [u8],
    offset: usize,
    channel: f32,
    context: &'static str,
) -> DecodeResult<()> {
    fixed::encode::<T>(f64::from(channel), TINT_SCALE)?.write_le(out, offset, context)
}

fn write_f32s(
    out: &mut [u8],
    offset: usize,
    values: &[f32],
    context: &'static str,
) -> DecodeResult<()> {
    for (i, value) in values.iter().enumerate() {
        bytes::write(out, offset + i * 4, &value.to_le_bytes(), context)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn f32_at(buf: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
    }

    fn tie(transform: Transform) -> InstanceRecord {
        InstanceRecord::new(
            42,
            transform,
            InstanceData::Tie {
                occlusion_id: 5,
                group_id: -1,
                tint: Vec3::new(1.0, 0.5, 0.25),
                render_distance: 120.0,
            },
        )
    }

    #[test]
    fn test_translation_example() {
        let transform = Transform::from_trs(Vec3::new(10.0, 0.0, -5.0), Quat::IDENTITY, Vec3::ONE);
        let record = tie(transform);
        let bytes = record.encode().unwrap();
        assert_eq!(bytes.len(), 0x90);

        // Translation column of the swizzled matrix.
        assert_eq!(f32_at(&bytes, 0x40), 10.0);
        assert_eq!(f32_at(&bytes, 0x44), -5.0);
        assert_eq!(f32_at(&bytes, 0x48), 0.0);
        assert_eq!(f32_at(&bytes, 0x4c), 1.0);
        // Translation column of the inverse.
        assert_eq!(f32_at(&bytes, 0x74), -10.0);
        assert_eq!(f32_at(&bytes, 0x78), 5.0);
        assert_eq!(f32_at(&bytes, 0x7c), 0.0);

        let decoded = InstanceRecord::decode(InstanceKind::Tie, &bytes).unwrap();
        assert_eq!(decoded.transform, transform);
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_tint_is_scaled_by_128() {
        let bytes = tie(Transform::IDENTITY).encode().unwrap();
        assert_eq!(&bytes[0x80..0x86], &[128, 0, 64, 0, 32, 0]);
    }

    #[test]
    fn test_mirrored_tie_sets_flag_and_roundtrips() {
        let transform = Transform::from_trs(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_z(0.5),
            Vec3::new(-2.0, 1.0, 1.0),
        );
        let record = tie(transform);
        assert!(record.is_mirrored());
        let bytes = record.encode().unwrap();
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), FLAG_MIRRORED);

        let decoded = InstanceRecord::decode(InstanceKind::Tie, &bytes).unwrap();
        assert!(decoded.is_mirrored());
        assert_eq!(decoded.transform.reflection, Mat4::IDENTITY);
        assert!(decoded.transform.to_matrix().abs_diff_eq(transform.to_matrix(), 1e-5));
    }

    #[test]
    fn test_stored_inverse_matches_world() {
        let transform = Transform::from_trs(
            Vec3::new(-3.0, 7.0, 0.5),
            Quat::from_rotation_y(1.2),
            Vec3::new(1.5, 0.5, 2.0),
        );
        let bytes = InstanceRecord::new(1, transform, InstanceData::Cuboid { group_id: 2 })
            .encode()
            .unwrap();
        let world = read_world(InstanceKind::Cuboid, &bytes).unwrap();
        let mut columns = [0f32; 16];
        for column in 0..4 {
            for row in 0..3 {
                columns[column * 4 + row] = f32_at(&bytes, INVERSE_OFFSET + (column * 3 + row) * 4);
            }
        }
        columns[15] = 1.0;
        let inverse = Mat4::from_cols_array(&columns).swizzled();
        assert!((inverse * world).abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn test_every_kind_roundtrips_trailing_fields() {
        let transform = Transform::from_trs(Vec3::new(4.0, 5.0, 6.0), Quat::IDENTITY, Vec3::ONE);
        let records = [
            tie(transform),
            InstanceRecord::new(
                7,
                transform,
                InstanceData::Shrub {
                    occlusion_id: 9,
                    group_id: 3,
                    tint: Vec4::new(0.0, 0.125, 1.0, 1.5),
                    render_distance: 64.0,
                },
            ),
            InstanceRecord::new(8, transform, InstanceData::Cuboid { group_id: 11 }),
            InstanceRecord::new(
                9,
                transform,
                InstanceData::Moby {
                    occlusion_id: -1,
                    group_id: 4,
                    unique_id: 1001,
                    render_distance: 250.0,
                },
            ),
        ];
        for record in records {
            let bytes = record.encode().unwrap();
            assert_eq!(bytes.len(), record.kind().record_size());
            let decoded = InstanceRecord::decode(record.kind(), &bytes).unwrap();
            assert_eq!(decoded, record, "{}", record.kind().name());
        }
    }

    #[test]
    fn test_short_buffer_is_malformed() {
        for kind in InstanceKind::ALL {
            let buf = vec![0u8; kind.record_size() - 1];
            assert!(matches!(
                InstanceRecord::decode(kind, &buf),
                Err(DecodeError::MalformedRecord { .. })
            ));
        }
    }

    #[test]
    fn test_encode_into_checks_size_first() {
        let record = tie(Transform::IDENTITY);
        let mut small = vec![0xee; 0x40];
        assert!(record.encode_into(&mut small).is_err());
        assert!(small.iter().all(|&b| b == 0xee));

        let mut exact = vec![0xee; 0x90];
        record.encode_into(&mut exact).unwrap();
        assert_eq!(exact, record.encode().unwrap());
    }

    #[test]
    fn test_tables() {
        let a = tie(Transform::IDENTITY);
        let b = tie(Transform::from_trs(Vec3::X, Quat::IDENTITY, Vec3::splat(2.0)));
        let table = encode_table(&[a, b]).unwrap();
        assert_eq!(table.len(), 2 * 0x90);
        assert_eq!(decode_table(InstanceKind::Tie, &table).unwrap(), vec![a, b]);
        assert!(decode_table(InstanceKind::Tie, &table[..0x91]).is_err());

        let cuboid = InstanceRecord::new(1, Transform::IDENTITY, InstanceData::Cuboid { group_id: 0 });
        assert!(encode_table(&[a, cuboid]).is_err());
    }

    #[test]
    fn test_tint_overflow_is_reported() {
        let record = InstanceRecord::new(
            1,
            Transform::IDENTITY,
            InstanceData::Tie {
                occlusion_id: 0,
                group_id: 0,
                tint: Vec3::new(1000.0, 0.0, 0.0),
                render_distance: 0.0,
            },
        );
        assert!(matches!(
            record.encode(),
            Err(DecodeError::EncodeOverflow { bits: 16, .. })
        ));
    }
}
