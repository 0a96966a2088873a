//! Conversion between raw hardware sample bytes and normalised `f32`.
//!
//! Everything here works on caller-provided slices and never allocates, so it
//! is safe to call from a render callback.

use crate::models::config::SampleFormat;

const I16_SCALE: f32 = 32768.0;
const I24_SCALE: f32 = 8_388_608.0;
const I32_SCALE: f64 = 2_147_483_648.0;

/// Decode packed little-endian samples from `src` into `dst`.
///
/// Returns the number of samples decoded: the smaller of what `src` holds and
/// what `dst` can take. A trailing partial sample in `src` is ignored.
pub fn decode_into(format: SampleFormat, src: &[u8], dst: &mut [f32]) -> usize {
    let width = format.bytes_per_sample();
    let count = (src.len() / width).min(dst.len());
    let chunks = src.chunks_exact(width).take(count);

    match format {
        SampleFormat::I16 => {
            for (out, bytes) in dst.iter_mut().zip(chunks) {
                *out = f32::from(i16::from_le_bytes([bytes[0], bytes[1]])) / I16_SCALE;
            }
        }
        SampleFormat::I24 => {
            for (out, bytes) in dst.iter_mut().zip(chunks) {
                // Place the 24 bits high and shift back down to sign-extend.
                let value = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
                *out = value as f32 / I24_SCALE;
            }
        }
        SampleFormat::I32 => {
            for (out, bytes) in dst.iter_mut().zip(chunks) {
                let value = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                *out = (f64::from(value) / I32_SCALE) as f32;
            }
        }
        SampleFormat::F32 => {
            for (out, bytes) in dst.iter_mut().zip(chunks) {
                *out = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
        }
    }
    count
}

/// Encode normalised samples from `src` into packed little-endian `dst`.
///
/// Integer formats clamp to `[-1.0, 1.0]` and scale by the positive maximum,
/// so -1.0 maps to `-MAX` rather than `MIN`. Returns the number of samples
/// encoded.
pub fn encode_into(format: SampleFormat, src: &[f32], dst: &mut [u8]) -> usize {
    let width = format.bytes_per_sample();
    let count = src.len().min(dst.len() / width);
    let chunks = dst.chunks_exact_mut(width).take(count);

    match format {
        SampleFormat::I16 => {
            for (bytes, &sample) in chunks.zip(src) {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                bytes.copy_from_slice(&value.to_le_bytes());
            }
        }
        SampleFormat::I24 => {
            for (bytes, &sample) in chunks.zip(src) {
                let value = (sample.clamp(-1.0, 1.0) * (I24_SCALE - 1.0)) as i32;
                bytes.copy_from_slice(&value.to_le_bytes()[..3]);
            }
        }
        SampleFormat::I32 => {
            for (bytes, &sample) in chunks.zip(src) {
                let value = (f64::from(sample.clamp(-1.0, 1.0)) * f64::from(i32::MAX)) as i32;
                bytes.copy_from_slice(&value.to_le_bytes());
            }
        }
        SampleFormat::F32 => {
            for (bytes, &sample) in chunks.zip(src) {
                bytes.copy_from_slice(&sample.to_le_bytes());
            }
        }
    }
    count
}

/// Sum of squared sample values over the whole period.
#[inline]
pub fn sum_of_squares(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s * s).sum()
}
