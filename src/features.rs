/*
 * Meeting Pipeline Core - Acoustic Feature Extraction
 * Copyright (c) 2024 Meeting Pipeline Contributors
 *
 * Mel-cepstral features over fixed-length frames, the clustering input for
 * speaker diarization.
 */

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::config::FeatureConfig;
use crate::types::{FeatureSequence, FrameFeatures, Result};

/// Converts a mono waveform into a sequence of cepstral feature vectors.
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Produces one feature vector per frame at the configured frame/hop
    /// geometry. Silent frames are flagged, never dropped, so frame indices
    /// stay aligned with the rest of the pipeline. The whole waveform must
    /// be resident; the output is recomputable from the same input.
    pub fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<FeatureSequence> {
        self.config.validate()?;
        if sample_rate == 0 {
            return Err(crate::types::PipelineError::InvalidConfiguration(
                "sample_rate must be positive".to_string(),
            ));
        }
        let cfg = &self.config;

        let frame_len = cfg.frame_size as f64 / sample_rate as f64;
        let hop = cfg.hop_size as f64 / sample_rate as f64;

        if samples.len() < cfg.frame_size {
            tracing::warn!(
                samples = samples.len(),
                frame_size = cfg.frame_size,
                "waveform shorter than one analysis frame"
            );
            return Ok(FeatureSequence {
                frames: Vec::new(),
                frame_len,
                hop,
            });
        }

        // Pre-emphasis over the whole waveform
        let mut emphasized = Vec::with_capacity(samples.len());
        emphasized.push(f64::from(samples[0]));
        for i in 1..samples.len() {
            emphasized.push(f64::from(samples[i]) - cfg.pre_emphasis * f64::from(samples[i - 1]));
        }

        let window = hamming(cfg.frame_size);
        let filterbank = mel_filterbank(cfg.num_filters, cfg.fft_size, sample_rate);
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(cfg.fft_size);

        let bins = cfg.fft_size / 2 + 1;
        let mut frames = Vec::new();
        let mut start = 0usize;
        let mut buffer: Vec<Complex<f64>> = vec![Complex::new(0.0, 0.0); cfg.fft_size];

        while start + cfg.frame_size <= samples.len() {
            // The silence flag comes from the raw signal, before emphasis
            let energy = rms(&samples[start..start + cfg.frame_size]);
            let silent = energy < cfg.silence_floor;

            buffer.fill(Complex::new(0.0, 0.0));
            for (i, (&sample, &weight)) in emphasized[start..start + cfg.frame_size]
                .iter()
                .zip(window.iter())
                .enumerate()
            {
                buffer[i] = Complex::new(sample * weight, 0.0);
            }
            fft.process(&mut buffer);

            let power: Vec<f64> = buffer[..bins]
                .iter()
                .map(|c| c.norm_sqr() / cfg.fft_size as f64)
                .collect();

            let log_energies: Vec<f64> = filterbank
                .iter()
                .map(|filter| {
                    let e: f64 = filter.iter().zip(power.iter()).map(|(w, p)| w * p).sum();
                    e.max(1e-10).ln()
                })
                .collect();

            frames.push(FrameFeatures {
                coefficients: dct2(&log_energies, cfg.num_coefficients),
                energy,
                silent,
            });
            start += cfg.hop_size;
        }

        if cfg.include_deltas {
            append_deltas(&mut frames);
        }

        tracing::debug!(
            frames = frames.len(),
            silent = frames.iter().filter(|f| f.silent).count(),
            "extracted feature frames"
        );

        Ok(FeatureSequence {
            frames,
            frame_len,
            hop,
        })
    }
}

fn rms(frame: &[f32]) -> f64 {
    let sum: f64 = frame.iter().map(|&x| f64::from(x) * f64::from(x)).sum();
    (sum / frame.len() as f64).sqrt()
}

fn hamming(size: usize) -> Vec<f64> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| {
            0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64).cos()
        })
        .collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular filters spaced evenly on the mel scale from 0 Hz to Nyquist.
fn mel_filterbank(num_filters: usize, fft_size: usize, sample_rate: u32) -> Vec<Vec<f64>> {
    let bins = fft_size / 2 + 1;
    let high_mel = hz_to_mel(f64::from(sample_rate) / 2.0);

    let bin_of = |mel: f64| -> usize {
        let hz = mel_to_hz(mel);
        let bin = ((fft_size as f64 + 1.0) * hz / f64::from(sample_rate)).floor() as usize;
        bin.min(bins - 1)
    };

    let points: Vec<usize> = (0..num_filters + 2)
        .map(|i| bin_of(high_mel * i as f64 / (num_filters + 1) as f64))
        .collect();

    let mut filterbank = vec![vec![0.0; bins]; num_filters];
    for (f, filter) in filterbank.iter_mut().enumerate() {
        let (left, center, right) = (points[f], points[f + 1], points[f + 2]);
        for k in left..center {
            filter[k] = (k - left) as f64 / (center - left) as f64;
        }
        filter[center] = 1.0;
        for k in center + 1..=right {
            filter[k] = (right - k) as f64 / (right - center) as f64;
        }
    }
    filterbank
}

/// DCT-II truncated to the leading coefficients.
fn dct2(input: &[f64], num_coefficients: usize) -> Vec<f64> {
    let m = input.len() as f64;
    (0..num_coefficients)
        .map(|n| {
            input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (std::f64::consts::PI * n as f64 * (i as f64 + 0.5) / m).cos())
                .sum()
        })
        .collect()
}

/// Appends first-order deltas to every frame's coefficients.
fn append_deltas(frames: &mut [FrameFeatures]) {
    if frames.is_empty() {
        return;
    }
    let base: Vec<Vec<f64>> = frames.iter().map(|f| f.coefficients.clone()).collect();
    let last = base.len() - 1;
    for (i, frame) in frames.iter_mut().enumerate() {
        let prev = &base[i.saturating_sub(1)];
        let next = &base[(i + 1).min(last)];
        let deltas: Vec<f64> = prev
            .iter()
            .zip(next.iter())
            .map(|(&p, &n)| (n - p) / 2.0)
            .collect();
        frame.coefficients.extend(deltas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PipelineError;
    use approx::assert_relative_eq;

    fn sine(freq: f64, seconds: f64, sample_rate: u32) -> Vec<f32> {
        let n = (seconds * f64::from(sample_rate)) as usize;
        (0..n)
            .map(|i| {
                (0.5 * (2.0 * std::f64::consts::PI * freq * i as f64 / f64::from(sample_rate))
                    .sin()) as f32
            })
            .collect()
    }

    #[test]
    fn frame_count_follows_geometry() {
        let extractor = FeatureExtractor::new(FeatureConfig::default());
        let samples = sine(440.0, 1.0, 16_000);
        let sequence = extractor.extract(&samples, 16_000).unwrap();

        // (16000 - 400) / 160 + 1 full frames
        assert_eq!(sequence.len(), 98);
        assert_relative_eq!(sequence.hop, 0.01, epsilon = 1e-9);
        assert_relative_eq!(sequence.frame_len, 0.025, epsilon = 1e-9);
        for frame in &sequence.frames {
            assert_eq!(frame.coefficients.len(), 13);
            assert!(!frame.silent);
        }
    }

    #[test]
    fn extraction_is_recomputable() {
        let extractor = FeatureExtractor::new(FeatureConfig::default());
        let samples = sine(330.0, 0.5, 16_000);
        let first = extractor.extract(&samples, 16_000).unwrap();
        let second = extractor.extract(&samples, 16_000).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn silence_is_flagged_but_emitted() {
        let extractor = FeatureExtractor::new(FeatureConfig::default());
        let mut samples = vec![0.0f32; 8_000];
        samples.extend(sine(440.0, 0.5, 16_000));
        let sequence = extractor.extract(&samples, 16_000).unwrap();

        assert_eq!(sequence.len(), 98);
        assert!(sequence.frames[0].silent);
        assert!(!sequence.frames[sequence.len() - 1].silent);
        assert!(sequence.voiced_count() < sequence.len());
        assert!(sequence.voiced_count() > 0);
    }

    #[test]
    fn deltas_double_the_dimension() {
        let config = FeatureConfig {
            include_deltas: true,
            ..FeatureConfig::default()
        };
        let extractor = FeatureExtractor::new(config);
        let samples = sine(440.0, 0.2, 16_000);
        let sequence = extractor.extract(&samples, 16_000).unwrap();
        for frame in &sequence.frames {
            assert_eq!(frame.coefficients.len(), 26);
        }
    }

    #[test]
    fn different_tones_produce_different_features() {
        let extractor = FeatureExtractor::new(FeatureConfig::default());
        let low = extractor.extract(&sine(220.0, 0.3, 16_000), 16_000).unwrap();
        let high = extractor.extract(&sine(2_000.0, 0.3, 16_000), 16_000).unwrap();

        let distance: f64 = low.frames[10]
            .coefficients
            .iter()
            .zip(high.frames[10].coefficients.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt();
        assert!(distance > 1.0, "distance {} too small", distance);
    }

    #[test]
    fn short_waveform_yields_empty_sequence() {
        let extractor = FeatureExtractor::new(FeatureConfig::default());
        let sequence = extractor.extract(&[0.1f32; 100], 16_000).unwrap();
        assert!(sequence.is_empty());
        assert!(sequence.hop > 0.0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let extractor = FeatureExtractor::new(FeatureConfig {
            fft_size: 128,
            ..FeatureConfig::default()
        });
        let err = extractor.extract(&[0.0f32; 1_000], 16_000).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
    }
}
