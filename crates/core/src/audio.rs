use bytes::{BufMut, Bytes, BytesMut};

/// Sample rate of the PCM the synthesizers emit.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Ramp applied to both ends of a generated tone so adjacent chunks don't click.
const FADE_SAMPLES: usize = 120;

/// Encodes f32 samples as little-endian float32 bytes, the wire format of every
/// outbound audio chunk.
pub fn encode_f32(samples: &[f32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(samples.len() * 4);
    for &sample in samples {
        buf.put_f32_le(sample);
    }
    buf.freeze()
}

/// Decodes little-endian float32 bytes. Trailing bytes that don't form a full
/// sample are dropped.
pub fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Renders a sine tone at `frequency_hz` lasting `duration_ms`, faded in and out.
pub fn tone(frequency_hz: f32, duration_ms: u32, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    let len = (sample_rate as u64 * duration_ms as u64 / 1000) as usize;
    let fade = FADE_SAMPLES.min(len / 2);
    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let envelope = if i < fade {
                i as f32 / fade as f32
            } else if i >= len - fade {
                (len - 1 - i) as f32 / fade as f32
            } else {
                1.0
            };
            (2.0 * std::f32::consts::PI * frequency_hz * t).sin() * amplitude * envelope
        })
        .collect()
}
