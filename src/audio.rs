/*
 * Meeting Pipeline Core - Audio Loading
 * Copyright (c) 2024 Meeting Pipeline Contributors
 *
 * WAV decoding into the mono f32 waveform the feature extractor consumes.
 */

use std::path::Path;

use crate::types::{PipelineError, Result};

/// Reads a WAV file as mono f32 samples plus its sample rate.
///
/// Interleaved channels are averaged; integer formats are normalized to
/// [-1, 1] using their declared bit depth.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| PipelineError::Audio(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| PipelineError::Audio(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|sample| sample as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| PipelineError::Audio(e.to_string()))?
        }
    };

    let mono = if spec.channels > 1 {
        let channels = spec.channels as usize;
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    } else {
        samples
    };

    tracing::debug!(
        samples = mono.len(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        "loaded waveform"
    );

    Ok((mono, spec.sample_rate))
}

/// Linear interpolation resampling.
pub fn resample(input: &[f32], input_rate: u32, output_rate: u32) -> Vec<f32> {
    if input_rate == output_rate || input.is_empty() {
        return input.to_vec();
    }

    let ratio = input_rate as f64 / output_rate as f64;
    let output_len = (input.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;

        if idx + 1 < input.len() {
            let frac = (pos - idx as f64) as f32;
            output.push(input[idx] * (1.0 - frac) + input[idx + 1] * frac);
        } else if idx < input.len() {
            output.push(input[idx]);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::path::PathBuf;

    fn temp_wav(name: &str, spec: hound::WavSpec, frames: &[(i16, i16)]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("meeting-pipeline-{}", name));
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for &(left, right) in frames {
            writer.write_sample(left).unwrap();
            if spec.channels == 2 {
                writer.write_sample(right).unwrap();
            }
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn downmixes_stereo_and_normalizes() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let path = temp_wav("stereo.wav", spec, &[(16_384, -16_384), (8_192, 8_192)]);
        let (samples, rate) = read_wav(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(rate, 16_000);
        assert_eq!(samples.len(), 2);
        assert_relative_eq!(samples[0], 0.0, epsilon = 1e-4);
        assert_relative_eq!(samples[1], 0.25, epsilon = 1e-4);
    }

    #[test]
    fn missing_file_is_an_audio_error() {
        let err = read_wav(Path::new("/nonexistent/recording.wav")).unwrap_err();
        assert!(matches!(err, PipelineError::Audio(_)));
    }

    #[test]
    fn resample_halves_length() {
        let input: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let output = resample(&input, 32_000, 16_000);
        assert_eq!(output.len(), 50);
        assert_relative_eq!(output[1], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn resample_is_identity_at_same_rate() {
        let input = vec![0.1f32, 0.2, 0.3];
        assert_eq!(resample(&input, 16_000, 16_000), input);
    }
}
