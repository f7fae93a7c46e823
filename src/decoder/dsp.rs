// src/decoder/dsp.rs

/// Bytes per signed 16-bit PCM sample.
pub const SAMPLE_BYTES: usize = std::mem::size_of::<i16>();

#[inline]
pub fn f32_to_i16(s: f32) -> i16 {
    let scaled = (s.clamp(-1.0, 1.0) * 32767.0).round();
    scaled as i16
}

pub fn i16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * SAMPLE_BYTES);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Decodes whole little-endian samples; a dangling odd byte is ignored.
pub fn le_bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(SAMPLE_BYTES)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
