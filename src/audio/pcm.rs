//! In-process PCM sample buffers.
//!
//! The uncompressed half of the pipeline: WAV decode/encode via hound, plus
//! the small amount of sample math (mono mixdown, linear resampling, silence)
//! that the external-tool-free fallback paths need.

use std::path::Path;

use crate::audio::aiff;
use crate::audio::format::{AudioArtifact, AudioFormat};
use crate::error::TtsError;

/// Interleaved 16-bit PCM with its channel count and sample rate.
#[derive(Debug, Clone)]
pub struct PcmAudio {
    pub samples: Vec<i16>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl PcmAudio {
    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        let frames = self.samples.len() / self.channels as usize;
        frames as f64 / self.sample_rate as f64
    }

    /// Mix all channels down to mono by averaging each frame.
    pub fn to_mono(&self) -> Vec<i16> {
        if self.channels <= 1 {
            return self.samples.clone();
        }
        let ch = self.channels as usize;
        self.samples
            .chunks_exact(ch)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / ch as i32) as i16
            })
            .collect()
    }

    /// Write the buffer as a 16-bit RIFF/WAVE file.
    pub fn write_wav(&self, path: &Path) -> Result<(), TtsError> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .map_err(|e| TtsError::WavParse(e.to_string()))?;
        for &sample in &self.samples {
            writer
                .write_sample(sample)
                .map_err(|e| TtsError::WavParse(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| TtsError::WavParse(e.to_string()))?;
        Ok(())
    }

    /// Generate `duration_secs` of mono silence at `sample_rate`.
    pub fn silence(duration_secs: f64, sample_rate: u32) -> Self {
        let frames = (duration_secs.max(0.0) * sample_rate as f64).round() as usize;
        Self {
            samples: vec![0i16; frames],
            channels: 1,
            sample_rate,
        }
    }
}

/// Mix to mono and linearly resample to `target_rate`.
///
/// Nearest-sample interpolation is plenty for stitching speech segments from
/// engines that disagree about sample rate; fidelity-critical paths go
/// through the external transcoder instead.
pub fn resample_mono(audio: &PcmAudio, target_rate: u32) -> Vec<i16> {
    let mono = audio.to_mono();
    if audio.sample_rate == target_rate || mono.is_empty() || audio.sample_rate == 0 {
        return mono;
    }

    let ratio = audio.sample_rate as f64 / target_rate as f64;
    let out_len = ((mono.len() as f64) / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src = i as f64 * ratio;
        let idx = src.floor() as usize;
        let frac = src - idx as f64;
        let a = mono[idx.min(mono.len() - 1)] as f64;
        let b = mono[(idx + 1).min(mono.len() - 1)] as f64;
        out.push((a + (b - a) * frac).round() as i16);
    }
    out
}

/// Decode an uncompressed artifact into a PCM buffer.
///
/// Compressed containers need the external transcoder; asking for them here
/// is an error the caller is expected to catch and route around.
pub fn decode_artifact(artifact: &AudioArtifact) -> Result<PcmAudio, TtsError> {
    match artifact.format {
        AudioFormat::Wav => decode_wav(&artifact.path),
        AudioFormat::Aiff => aiff::decode_aiff(&artifact.path),
        other => Err(TtsError::WavParse(format!(
            "cannot decode {other} in-process ({})",
            artifact.path.display()
        ))),
    }
}

/// Decode a RIFF/WAVE file into interleaved 16-bit PCM.
pub fn decode_wav(path: &Path) -> Result<PcmAudio, TtsError> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| TtsError::WavParse(e.to_string()))?;
    let spec = reader.spec();

    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<Result<_, _>>()
            .map_err(|e| TtsError::WavParse(e.to_string()))?,
        (hound::SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| (v as i16) << 8))
            .collect::<Result<_, _>>()
            .map_err(|e| TtsError::WavParse(e.to_string()))?,
        (hound::SampleFormat::Int, bits @ (24 | 32)) => {
            let shift = bits - 16;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v >> shift) as i16))
                .collect::<Result<_, _>>()
                .map_err(|e| TtsError::WavParse(e.to_string()))?
        }
        (hound::SampleFormat::Float, _) => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<Result<_, _>>()
            .map_err(|e| TtsError::WavParse(e.to_string()))?,
        (_, bits) => {
            return Err(TtsError::WavParse(format!(
                "unsupported WAV sample width {bits} bits"
            )))
        }
    };

    Ok(PcmAudio {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}
