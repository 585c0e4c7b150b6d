//! WAV file I/O
//!
//! Imports WAV files into [`StereoBuffer`]s at the engine sample rate and
//! exports loop content back out. Used by the CLI for offline runs and by
//! tests; never called from the audio thread.
//!
//! Mono files are duplicated to both channels. Sample rate conversion is
//! linear interpolation.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;

use super::buffer::StereoBuffer;
use crate::error::{LooperError, Result};

/// Export bit depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    Int16,
    #[default]
    Int24,
    Float32,
}

impl BitDepth {
    /// Parse a bit count (16, 24 or 32)
    pub fn from_bits(bits: u16) -> Result<Self> {
        match bits {
            16 => Ok(BitDepth::Int16),
            24 => Ok(BitDepth::Int24),
            32 => Ok(BitDepth::Float32),
            other => Err(LooperError::UnsupportedFormat {
                format: format!("{}-bit audio (only 16, 24, 32 supported)", other),
            }),
        }
    }

    fn spec(self, sample_rate: u32) -> WavSpec {
        let (bits_per_sample, sample_format) = match self {
            BitDepth::Int16 => (16, SampleFormat::Int),
            BitDepth::Int24 => (24, SampleFormat::Int),
            BitDepth::Float32 => (32, SampleFormat::Float),
        };
        WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

/// Read a mono or stereo WAV file, resampled to `sample_rate`
pub fn read_wav(path: &Path, sample_rate: u32) -> Result<StereoBuffer> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 || channels > 2 {
        return Err(LooperError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono/stereo supported)", channels),
        });
    }
    debug!(
        "Reading {} ({} ch, {} Hz, {}-bit)",
        path.display(),
        channels,
        spec.sample_rate,
        spec.bits_per_sample
    );

    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    if samples.is_empty() {
        return Err(LooperError::InvalidAudio {
            reason: "file contains no samples".to_string(),
        });
    }

    let (left, right) = split_channels(&samples, channels);
    let (left, right) = if spec.sample_rate != sample_rate {
        (
            resample(&left, spec.sample_rate, sample_rate),
            resample(&right, spec.sample_rate, sample_rate),
        )
    } else {
        (left, right)
    };
    Ok(StereoBuffer::from_channels(left, right))
}

/// Write the first `len` frames of `buffer` as a stereo WAV file
pub fn write_wav(
    path: &Path,
    buffer: &StereoBuffer,
    len: usize,
    sample_rate: u32,
    depth: BitDepth,
) -> Result<()> {
    let (left, right) = buffer.slices(len);
    let mut writer = WavWriter::create(path, depth.spec(sample_rate))?;

    for (&l, &r) in left.iter().zip(right) {
        for sample in [l, r] {
            match depth {
                BitDepth::Int16 => {
                    writer.write_sample((sample * 32767.0).clamp(-32768.0, 32767.0) as i16)?
                }
                BitDepth::Int24 => writer
                    .write_sample((sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32)?,
                BitDepth::Float32 => writer.write_sample(sample)?,
            }
        }
    }

    writer.finalize()?;
    debug!("Wrote {} frames to {}", left.len(), path.display());
    Ok(())
}

/// Stereo sine tone, different frequency per channel
pub fn generate_test_tone(
    freq_left: f32,
    freq_right: f32,
    amplitude: f32,
    frames: usize,
    sample_rate: u32,
) -> StereoBuffer {
    let mut buffer = StereoBuffer::new(frames);
    let w_l = 2.0 * std::f32::consts::PI * freq_left / sample_rate as f32;
    let w_r = 2.0 * std::f32::consts::PI * freq_right / sample_rate as f32;
    let (left, right) = buffer.channels_mut();
    for (i, sample) in left.iter_mut().enumerate() {
        *sample = amplitude * (w_l * i as f32).sin();
    }
    for (i, sample) in right.iter_mut().enumerate() {
        *sample = amplitude * (w_r * i as f32).sin();
    }
    buffer
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let samples: Vec<f32> = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, bits) => {
            return Err(LooperError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits),
            })
        }
    };
    Ok(samples)
}

/// Split interleaved samples into left/right; mono is duplicated
fn split_channels(samples: &[f32], channels: usize) -> (Vec<f32>, Vec<f32>) {
    if channels == 1 {
        return (samples.to_vec(), samples.to_vec());
    }
    let frames = samples.len() / channels;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for frame in samples.chunks_exact(channels) {
        left.push(frame[0]);
        right.push(frame[1]);
    }
    (left, right)
}

/// Linear-interpolation resampler
fn resample(input: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if input.is_empty() || source_rate == target_rate {
        return input.to_vec();
    }
    let ratio = source_rate as f64 / target_rate as f64;
    let output_len = ((input.len() as f64) / ratio).round().max(1.0) as usize;
    (0..output_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            let a = input[idx.min(input.len() - 1)];
            let b = input[(idx + 1).min(input.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}
