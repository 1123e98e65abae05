//! Fixed-point quantization.
//!
//! Chunk geometry stores real-valued coordinates as integers multiplied by a
//! per-field scale factor. Decoding divides by the scale; encoding multiplies,
//! rounds half to even and checks the result against the field width.

use glam::DVec3;

use crate::bytes;
use crate::error::{DecodeError, DecodeResult};

/// Scale of positions, anchors and displacement streams.
pub const POSITION_SCALE: f64 = 1024.0;

/// Scale of bounding-cube corners.
pub const CUBE_SCALE: f64 = 16.0;

/// Scale of instance tint channels (128 = full intensity).
pub const TINT_SCALE: f64 = 128.0;

/// An integer type usable as a fixed-point field.
pub trait FixedInt: Copy {
    /// Width of the field in bits.
    const BITS: u32;
    /// Width of the field in bytes.
    const SIZE: usize;

    fn to_f64(self) -> f64;

    /// Convert an already-rounded value, or `None` if it is out of range.
    fn from_rounded(value: f64) -> Option<Self>;

    fn read_le(buf: &[u8], offset: usize, context: &'static str) -> DecodeResult<Self>;

    fn write_le(self, buf: &mut [u8], offset: usize, context: &'static str) -> DecodeResult<()>;
}

macro_rules! impl_fixed_int {
    ($($ty:ty),*) => {$(
        impl FixedInt for $ty {
            const BITS: u32 = <$ty>::BITS;
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn to_f64(self) -> f64 {
                f64::from(self)
            }

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            fn from_rounded(value: f64) -> Option<Self> {
                if value >= f64::from(<$ty>::MIN) && value <= f64::from(<$ty>::MAX) {
                    Some(value as $ty)
                } else {
                    None
                }
            }

            fn read_le(buf: &[u8], offset: usize, context: &'static str) -> DecodeResult<Self> {
                bytes::array(buf, offset, context).map(<$ty>::from_le_bytes)
            }

            fn write_le(
                self,
                buf: &mut [u8],
                offset: usize,
                context: &'static str,
            ) -> DecodeResult<()> {
                bytes::write(buf, offset, &self.to_le_bytes(), context)
            }
        }
    )*};
}

impl_fixed_int!(u8, i16, u16, i32, u32);

/// Convert a raw fixed-point value to a real number.
#[must_use]
pub fn decode<T: FixedInt>(raw: T, scale: f64) -> f64 {
    raw.to_f64() / scale
}

/// Quantize `value` at `scale` into `T`.
///
/// Fails with [`DecodeError::EncodeOverflow`] rather than wrapping when the
/// rounded value is outside the range of `T` (or not finite).
pub fn encode<T: FixedInt>(value: f64, scale: f64) -> DecodeResult<T> {
    let scaled = (value * scale).round_ties_even();
    T::from_rounded(scaled).ok_or(DecodeError::EncodeOverflow {
        value,
        scale,
        bits: T::BITS,
    })
}

/// Read three consecutive fixed-point components as a vector.
pub fn read_vec3<T: FixedInt>(
    buf: &[u8],
    offset: usize,
    scale: f64,
    context: &'static str,
) -> DecodeResult<DVec3> {
    let x = T::read_le(buf, offset, context)?;
    let y = T::read_le(buf, offset + T::SIZE, context)?;
    let z = T::read_le(buf, offset + 2 * T::SIZE, context)?;
    Ok(DVec3::new(
        decode(x, scale),
        decode(y, scale),
        decode(z, scale),
    ))
}

/// Quantize and write a vector as three consecutive fixed-point components.
///
/// All three components are encoded before any byte is written.
pub fn write_vec3<T: FixedInt>(
    buf: &mut [u8],
    offset: usize,
    value: DVec3,
    scale: f64,
    context: &'static str,
) -> DecodeResult<()> {
    let x: T = encode(value.x, scale)?;
    let y: T = encode(value.y, scale)?;
    let z: T = encode(value.z, scale)?;
    bytes::ensure_len(buf, offset + 3 * T::SIZE, context)?;
    x.write_le(buf, offset, context)?;
    y.write_le(buf, offset + T::SIZE, context)?;
    z.write_le(buf, offset + 2 * T::SIZE, context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_scales() {
        assert!((decode(1024_i32, POSITION_SCALE) - 1.0).abs() < f64::EPSILON);
        assert!((decode(-8_i16, CUBE_SCALE) + 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_encode_rounds_half_to_even() {
        assert_eq!(encode::<i32>(2.5 / 1024.0, POSITION_SCALE).unwrap(), 2);
        assert_eq!(encode::<i32>(3.5 / 1024.0, POSITION_SCALE).unwrap(), 4);
        assert_eq!(encode::<i16>(-1.25, CUBE_SCALE).unwrap(), -20);
    }

    #[test]
    fn test_encode_overflow_is_reported() {
        let err = encode::<i16>(40.0, POSITION_SCALE).unwrap_err();
        assert_eq!(
            err,
            DecodeError::EncodeOverflow {
                value: 40.0,
                scale: POSITION_SCALE,
                bits: 16,
            }
        );
        assert!(encode::<i32>(f64::NAN, POSITION_SCALE).is_err());
        assert!(encode::<u16>(-1.0, TINT_SCALE).is_err());
    }

    #[test]
    fn test_vec3_write_then_read() {
        let mut buf = [0u8; 12];
        write_vec3::<i32>(&mut buf, 0, DVec3::new(1.0, -2.5, 0.0), POSITION_SCALE, "t").unwrap();
        assert_eq!(&buf[0..4], &1024_i32.to_le_bytes());
        assert_eq!(&buf[4..8], &(-2560_i32).to_le_bytes());
        let v = read_vec3::<i32>(&buf, 0, POSITION_SCALE, "t").unwrap();
        assert_eq!(v, DVec3::new(1.0, -2.5, 0.0));
    }

    #[test]
    fn test_vec3_overflow_writes_nothing() {
        let mut buf = [0u8; 6];
        let result = write_vec3::<i16>(&mut buf, 0, DVec3::new(1.0, 1.0, 1e6), CUBE_SCALE, "t");
        assert!(result.is_err());
        assert_eq!(buf, [0u8; 6]);
    }
}
