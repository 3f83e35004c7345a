/*
 * Meeting Pipeline Core - Component Configuration
 * Copyright (c) 2024 Meeting Pipeline Contributors
 *
 * This work is licensed under the Creative Commons Attribution-NonCommercial 4.0 International License.
 * To view a copy of this license, visit http://creativecommons.org/licenses/by-nc/4.0/
 *
 * You are free to share and adapt this work for non-commercial purposes with attribution.
 * Commercial use is prohibited without explicit written permission.
 *
 * For commercial licensing inquiries, please contact the project maintainers.
 */

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::types::{PipelineError, Result};

/// Configuration for acoustic feature extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Samples per analysis frame (400 = 25ms at 16kHz)
    pub frame_size: usize,
    /// Samples between frame starts (160 = 10ms at 16kHz)
    pub hop_size: usize,
    /// FFT length; must be at least `frame_size`
    pub fft_size: usize,
    /// Number of triangular mel filters
    pub num_filters: usize,
    /// Number of cepstral coefficients to keep per frame
    pub num_coefficients: usize,
    /// Append first-order deltas to each vector
    pub include_deltas: bool,
    /// Pre-emphasis filter coefficient
    pub pre_emphasis: f64,
    /// RMS energy below which a frame is flagged silent
    pub silence_floor: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            frame_size: 400,
            hop_size: 160,
            fft_size: 512,
            num_filters: 26,
            num_coefficients: 13,
            include_deltas: false,
            pre_emphasis: 0.97,
            silence_floor: 1e-3,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_size == 0 || self.hop_size == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "frame_size and hop_size must be positive".to_string(),
            ));
        }
        if self.fft_size < self.frame_size {
            return Err(PipelineError::InvalidConfiguration(format!(
                "fft_size {} is shorter than frame_size {}",
                self.fft_size, self.frame_size
            )));
        }
        if self.num_filters == 0 || self.num_coefficients == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "num_filters and num_coefficients must be positive".to_string(),
            ));
        }
        if self.num_coefficients > self.num_filters {
            return Err(PipelineError::InvalidConfiguration(format!(
                "cannot keep {} coefficients from {} filters",
                self.num_coefficients, self.num_filters
            )));
        }
        Ok(())
    }
}

/// Configuration for speaker clustering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Largest candidate speaker count when auto-detecting
    pub max_speakers: usize,
    /// Iteration cap for centroid relocation
    pub max_iterations: usize,
    /// Independent seeded initializations per trial; lowest within-cluster
    /// dispersion wins
    pub restarts: usize,
    /// Seed for centroid initialization. Fixed so reruns of the same
    /// recording label identically.
    pub seed: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_speakers: 6,
            max_iterations: 100,
            restarts: 8,
            seed: 42,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_speakers == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "max_speakers must be positive".to_string(),
            ));
        }
        if self.max_iterations == 0 || self.restarts == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "max_iterations and restarts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for calendar event matching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Symmetric window around each event start within which a recording
    /// still matches, in minutes
    pub tolerance_minutes: i64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            tolerance_minutes: 15,
        }
    }
}

impl MatchConfig {
    pub fn tolerance(&self) -> Duration {
        Duration::minutes(self.tolerance_minutes)
    }
}

/// Combined configuration for the full diarization chain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiarizerConfig {
    pub features: FeatureConfig,
    pub clustering: ClusterConfig,
}
