//! Minimal native AIFF/AIFC reader.
//!
//! The platform-native engine emits FORM/AIFF files, which ffmpeg normally
//! converts. When no external transcoder is installed this reader is the
//! zero-dependency fallback: it decodes PCM out of the legacy chunked
//! container so the WAV writer can re-encode it losslessly.
//!
//! Supported: uncompressed PCM (`AIFF`, or `AIFC` with compression `NONE`)
//! and the little-endian `sowt` AIFC variant, 8/16/24/32-bit samples.

use std::path::Path;

use crate::audio::pcm::PcmAudio;
use crate::error::TtsError;

/// Decode an AIFF/AIFC file into interleaved 16-bit PCM.
pub fn decode_aiff(path: &Path) -> Result<PcmAudio, TtsError> {
    let data = std::fs::read(path)?;
    decode_aiff_bytes(&data)
}

pub(crate) fn decode_aiff_bytes(data: &[u8]) -> Result<PcmAudio, TtsError> {
    if data.len() < 12 || &data[0..4] != b"FORM" {
        return Err(TtsError::AiffParse("missing FORM header".into()));
    }
    let form_type = &data[8..12];
    let is_aifc = match form_type {
        b"AIFF" => false,
        b"AIFC" => true,
        other => {
            return Err(TtsError::AiffParse(format!(
                "unexpected form type {:?}",
                String::from_utf8_lossy(other)
            )))
        }
    };

    let mut comm: Option<CommChunk> = None;
    let mut sound: Option<&[u8]> = None;

    let mut idx = 12usize;
    while idx + 8 <= data.len() {
        let id = &data[idx..idx + 4];
        let size = u32::from_be_bytes([data[idx + 4], data[idx + 5], data[idx + 6], data[idx + 7]])
            as usize;
        let body_start = idx + 8;
        let body_end = body_start.checked_add(size).filter(|&e| e <= data.len()).ok_or_else(
            || TtsError::AiffParse(format!("chunk {:?} overruns file", String::from_utf8_lossy(id))),
        )?;
        let body = &data[body_start..body_end];

        match id {
            b"COMM" => comm = Some(parse_comm(body, is_aifc)?),
            b"SSND" => {
                if body.len() < 8 {
                    return Err(TtsError::AiffParse("SSND chunk too short".into()));
                }
                let offset =
                    u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as usize;
                if 8 + offset > body.len() {
                    return Err(TtsError::AiffParse("SSND offset overruns chunk".into()));
                }
                sound = Some(&body[8 + offset..]);
            }
            _ => {}
        }

        // Chunk bodies are padded to even length.
        idx = body_end + (size & 1);
    }

    let comm = comm.ok_or_else(|| TtsError::AiffParse("missing COMM chunk".into()))?;
    let sound = sound.ok_or_else(|| TtsError::AiffParse("missing SSND chunk".into()))?;

    if comm.sample_rate == 0 {
        return Err(TtsError::AiffParse("sample rate is zero".into()));
    }
    if comm.channels == 0 {
        return Err(TtsError::AiffParse("channel count is zero".into()));
    }

    let bytes_per_sample = match comm.sample_size {
        8 => 1,
        16 => 2,
        24 => 3,
        32 => 4,
        other => {
            return Err(TtsError::AiffParse(format!(
                "unsupported sample size {other} bits"
            )))
        }
    };

    let frame_bytes = bytes_per_sample * comm.channels as usize;
    let expected = comm.num_frames as usize * frame_bytes;
    let available = sound.len().min(expected);
    let usable = available - (available % frame_bytes.max(1));

    let mut samples = Vec::with_capacity(usable / bytes_per_sample);
    for raw in sound[..usable].chunks_exact(bytes_per_sample) {
        samples.push(decode_sample(raw, comm.sample_size, comm.little_endian));
    }

    Ok(PcmAudio {
        samples,
        channels: comm.channels,
        sample_rate: comm.sample_rate,
    })
}

struct CommChunk {
    channels: u16,
    num_frames: u32,
    sample_size: u16,
    sample_rate: u32,
    little_endian: bool,
}

fn parse_comm(body: &[u8], is_aifc: bool) -> Result<CommChunk, TtsError> {
    if body.len() < 18 {
        return Err(TtsError::AiffParse("COMM chunk too short".into()));
    }
    let channels = u16::from_be_bytes([body[0], body[1]]);
    let num_frames = u32::from_be_bytes([body[2], body[3], body[4], body[5]]);
    let sample_size = u16::from_be_bytes([body[6], body[7]]);
    let mut extended = [0u8; 10];
    extended.copy_from_slice(&body[8..18]);
    let sample_rate = parse_extended_f64(&extended).round() as u32;

    let little_endian = if is_aifc {
        if body.len() < 22 {
            return Err(TtsError::AiffParse("AIFC COMM missing compression type".into()));
        }
        match &body[18..22] {
            b"NONE" => false,
            b"sowt" => true,
            other => {
                return Err(TtsError::AiffParse(format!(
                    "unsupported AIFC compression {:?}",
                    String::from_utf8_lossy(other)
                )))
            }
        }
    } else {
        false
    };

    Ok(CommChunk {
        channels,
        num_frames,
        sample_size,
        sample_rate,
        little_endian,
    })
}

/// Parse an 80-bit IEEE 754 extended-precision float (the AIFF sample-rate
/// encoding).
fn parse_extended_f64(bytes: &[u8; 10]) -> f64 {
    let sign = if bytes[0] & 0x80 != 0 { -1.0 } else { 1.0 };
    let exponent = ((((bytes[0] & 0x7F) as i32) << 8) | bytes[1] as i32) - 16383;
    let mantissa = u64::from_be_bytes([
        bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7], bytes[8], bytes[9],
    ]);
    if mantissa == 0 {
        return 0.0;
    }
    sign * mantissa as f64 * ((exponent - 63) as f64).exp2()
}

fn decode_sample(raw: &[u8], bits: u16, little_endian: bool) -> i16 {
    match bits {
        8 => (raw[0] as i8 as i16) << 8,
        16 => {
            if little_endian {
                i16::from_le_bytes([raw[0], raw[1]])
            } else {
                i16::from_be_bytes([raw[0], raw[1]])
            }
        }
        24 => {
            let v = if little_endian {
                i32::from_le_bytes([0, raw[0], raw[1], raw[2]])
            } else {
                i32::from_be_bytes([raw[0], raw[1], raw[2], 0])
            };
            (v >> 16) as i16
        }
        32 => {
            let v = if little_endian {
                i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
            } else {
                i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]])
            };
            (v >> 16) as i16
        }
        _ => 0,
    }
}

/// Test fixture: build minimal AIFF/AIFC byte streams without an engine.
#[cfg(test)]
pub(crate) mod testutil {
    /// Build a minimal AIFF (or AIFC/sowt) byte stream around 16-bit samples.
    pub(crate) fn build_aiff(samples: &[i16], channels: u16, rate: u32, sowt: bool) -> Vec<u8> {
        let mut sound = Vec::new();
        for &s in samples {
            if sowt {
                sound.extend_from_slice(&s.to_le_bytes());
            } else {
                sound.extend_from_slice(&s.to_be_bytes());
            }
        }

        let mut comm = Vec::new();
        comm.extend_from_slice(&channels.to_be_bytes());
        let frames = (samples.len() / channels as usize) as u32;
        comm.extend_from_slice(&frames.to_be_bytes());
        comm.extend_from_slice(&16u16.to_be_bytes());
        comm.extend_from_slice(&encode_extended(rate as f64));
        if sowt {
            comm.extend_from_slice(b"sowt");
            comm.extend_from_slice(&[4, b's', b'o', b'w', b't', 0]);
        }

        let mut ssnd = Vec::new();
        ssnd.extend_from_slice(&0u32.to_be_bytes());
        ssnd.extend_from_slice(&0u32.to_be_bytes());
        ssnd.extend_from_slice(&sound);

        let mut body = Vec::new();
        body.extend_from_slice(if sowt { b"AIFC" } else { b"AIFF" });
        for (id, chunk) in [(&b"COMM"[..], &comm), (&b"SSND"[..], &ssnd)] {
            body.extend_from_slice(id);
            body.extend_from_slice(&(chunk.len() as u32).to_be_bytes());
            body.extend_from_slice(chunk);
            if chunk.len() % 2 == 1 {
                body.push(0);
            }
        }

        let mut file = Vec::new();
        file.extend_from_slice(b"FORM");
        file.extend_from_slice(&(body.len() as u32).to_be_bytes());
        file.extend_from_slice(&body);
        file
    }

    /// Encode a positive sample rate as an 80-bit extended float.
    pub(crate) fn encode_extended(value: f64) -> [u8; 10] {
        let mut out = [0u8; 10];
        if value <= 0.0 {
            return out;
        }
        let exponent = value.log2().floor() as i32;
        let mantissa = (value / (exponent as f64).exp2() * (63f64).exp2()) as u64;
        let biased = (exponent + 16383) as u16;
        out[0..2].copy_from_slice(&biased.to_be_bytes());
        out[2..10].copy_from_slice(&mantissa.to_be_bytes());
        out
    }
}
