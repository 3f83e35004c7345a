/*
 * Meeting Pipeline Core - Speaker Clustering
 * Copyright (c) 2024 Meeting Pipeline Contributors
 *
 * Unsupervised grouping of feature frames into speakers via seeded centroid
 * relocation. Repeated runs on the same input label identically; transcript
 * labeling must be stable across reruns of a recording.
 */

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ClusterConfig;
use crate::types::{ClusterAssignment, FeatureSequence, PipelineError, Result};

/// Groups feature frames into speaker clusters.
pub struct SpeakerClusterer {
    config: ClusterConfig,
}

impl SpeakerClusterer {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Labels every frame with a speaker cluster id.
    ///
    /// `expected_speakers` of zero means auto-detect: candidate counts from
    /// one through `max_speakers` are each tried in isolation and scored by
    /// the ratio of between-cluster to within-cluster dispersion, ties going
    /// to the smaller count. Silent frames never influence the centroids but
    /// still receive the label of their nearest cluster.
    pub fn cluster(
        &self,
        features: &FeatureSequence,
        expected_speakers: usize,
    ) -> Result<ClusterAssignment> {
        self.config.validate()?;

        if features.is_empty() {
            return Err(PipelineError::InsufficientData(
                "no feature frames to cluster".to_string(),
            ));
        }

        // Centroids are fitted on voiced frames only
        let voiced: Vec<usize> = features
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.silent)
            .map(|(i, _)| i)
            .collect();

        let smallest_k = expected_speakers.max(1);
        if voiced.len() < smallest_k {
            return Err(PipelineError::InsufficientData(format!(
                "{} voiced frames cannot support {} speakers",
                voiced.len(),
                smallest_k
            )));
        }

        let dim = features.frames[voiced[0]].coefficients.len();
        let mut data = Array2::<f64>::zeros((voiced.len(), dim));
        for (row, &frame) in voiced.iter().enumerate() {
            data.row_mut(row)
                .assign(&ArrayView1::from(&features.frames[frame].coefficients[..]));
        }

        let model = if expected_speakers > 0 {
            self.fit(&data, expected_speakers)
        } else {
            self.fit_auto(&data)
        };

        // Every frame gets a label, silent ones included
        let labels: Vec<usize> = features
            .frames
            .iter()
            .map(|frame| {
                nearest_centroid(
                    ArrayView1::from(&frame.coefficients[..]),
                    &model.centroids,
                )
                .0
            })
            .collect();

        Ok(rank_by_frequency(labels, model.centroids.nrows()))
    }

    /// Auto-detection: every candidate count is an isolated trial; the best
    /// validity score wins and ties break toward fewer speakers.
    fn fit_auto(&self, data: &Array2<f64>) -> KMeansModel {
        let k_max = self.config.max_speakers.min(data.nrows());

        let mut best_model = self.fit(data, 1);
        let mut best_score = validity_score(data, &best_model);
        for k in 2..=k_max {
            let model = self.fit(data, k);
            let score = validity_score(data, &model);
            tracing::debug!(k, score, "speaker count trial");
            if score > best_score {
                best_score = score;
                best_model = model;
            }
        }
        tracing::debug!(
            speakers = best_model.centroids.nrows(),
            score = best_score,
            "selected speaker count"
        );
        best_model
    }

    /// Best of `restarts` seeded runs, judged by within-cluster dispersion.
    fn fit(&self, data: &Array2<f64>, k: usize) -> KMeansModel {
        let mut best = lloyd(data, k, self.config.seed, self.config.max_iterations);
        let mut best_dispersion = within_dispersion(data, &best);
        for restart in 1..self.config.restarts {
            let seed = self.config.seed.wrapping_add(restart as u64);
            let model = lloyd(data, k, seed, self.config.max_iterations);
            let dispersion = within_dispersion(data, &model);
            if dispersion < best_dispersion {
                best_dispersion = dispersion;
                best = model;
            }
        }
        best
    }
}

struct KMeansModel {
    centroids: Array2<f64>,
    labels: Vec<usize>,
}

/// Iterative centroid relocation until assignments stabilize.
fn lloyd(data: &Array2<f64>, k: usize, seed: u64, max_iterations: usize) -> KMeansModel {
    let n = data.nrows();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = init_centroids(data, k, &mut rng);
    let mut labels = vec![usize::MAX; n];

    for _ in 0..max_iterations {
        let mut changed = false;
        for i in 0..n {
            let (nearest, _) = nearest_centroid(data.row(i), &centroids);
            if labels[i] != nearest {
                labels[i] = nearest;
                changed = true;
            }
        }

        // Empty clusters keep their previous centroid
        for j in 0..k {
            let members: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, &l)| l == j)
                .map(|(i, _)| i)
                .collect();
            if members.is_empty() {
                continue;
            }
            let mut mean = Array1::<f64>::zeros(data.ncols());
            for &i in &members {
                mean += &data.row(i);
            }
            mean /= members.len() as f64;
            centroids.row_mut(j).assign(&mean);
        }

        if !changed {
            break;
        }
    }

    KMeansModel { centroids, labels }
}

/// k-means++ style seeding: later centers are drawn weighted by squared
/// distance to the chosen set.
fn init_centroids(data: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = data.nrows();
    let mut centroids = Array2::<f64>::zeros((k, data.ncols()));

    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&data.row(first));

    let mut distances: Vec<f64> = (0..n)
        .map(|i| squared_distance(data.row(i), centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = distances.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut pick = n - 1;
            for (i, &d) in distances.iter().enumerate() {
                if target < d {
                    pick = i;
                    break;
                }
                target -= d;
            }
            pick
        } else {
            // All points coincide with an existing center
            rng.gen_range(0..n)
        };
        centroids.row_mut(c).assign(&data.row(chosen));
        for i in 0..n {
            let d = squared_distance(data.row(i), centroids.row(c));
            if d < distances[i] {
                distances[i] = d;
            }
        }
    }

    centroids
}

fn nearest_centroid(point: ArrayView1<'_, f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = (0usize, f64::INFINITY);
    for (j, centroid) in centroids.rows().into_iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best.1 {
            best = (j, d);
        }
    }
    best
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

fn within_dispersion(data: &Array2<f64>, model: &KMeansModel) -> f64 {
    model
        .labels
        .iter()
        .enumerate()
        .map(|(i, &label)| squared_distance(data.row(i), model.centroids.row(label)))
        .sum()
}

/// Ratio of between-cluster to within-cluster dispersion, normalized by the
/// respective degrees of freedom. A single cluster has no separation to
/// measure and scores a neutral zero.
fn validity_score(data: &Array2<f64>, model: &KMeansModel) -> f64 {
    let k = model.centroids.nrows();
    let n = data.nrows();
    if k < 2 || n <= k {
        return 0.0;
    }
    let overall = match data.mean_axis(Axis(0)) {
        Some(mean) => mean,
        None => return 0.0,
    };

    let mut counts = vec![0usize; k];
    for &label in &model.labels {
        counts[label] += 1;
    }

    let within = within_dispersion(data, model);
    let between: f64 = counts
        .iter()
        .enumerate()
        .map(|(j, &count)| {
            count as f64 * squared_distance(model.centroids.row(j), overall.view())
        })
        .sum();

    if within <= f64::EPSILON {
        return if between > 0.0 { f64::INFINITY } else { 0.0 };
    }
    (between / (k - 1) as f64) / (within / (n - k) as f64)
}

/// Remaps labels so the most frequent cluster is 0, the next 1, and so on.
/// Unused cluster ids disappear, keeping the label space dense.
fn rank_by_frequency(labels: Vec<usize>, k: usize) -> ClusterAssignment {
    let mut counts = vec![0usize; k];
    for &label in &labels {
        counts[label] += 1;
    }

    let mut order: Vec<usize> = (0..k).filter(|&j| counts[j] > 0).collect();
    order.sort_by(|&a, &b| counts[b].cmp(&counts[a]).then(a.cmp(&b)));

    let mut remap = vec![usize::MAX; k];
    for (rank, &old) in order.iter().enumerate() {
        remap[old] = rank;
    }

    let num_speakers = order.len();
    let remapped = labels.into_iter().map(|l| remap[l]).collect();
    ClusterAssignment::new(remapped, num_speakers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FrameFeatures;

    // Deterministic jitter so clusters have nonzero spread
    fn jitter(i: usize) -> f64 {
        ((i * 37) % 19) as f64 * 0.02 - 0.19
    }

    fn frame(center: &[f64], i: usize, silent: bool) -> FrameFeatures {
        let coefficients = center
            .iter()
            .enumerate()
            .map(|(d, &c)| c + jitter(i + d * 5))
            .collect();
        FrameFeatures {
            coefficients,
            energy: if silent { 0.0 } else { 0.5 },
            silent,
        }
    }

    fn sequence(frames: Vec<FrameFeatures>) -> FeatureSequence {
        FeatureSequence {
            frames,
            frame_len: 0.025,
            hop: 0.01,
        }
    }

    fn three_speaker_frames(per_cluster: usize) -> Vec<FrameFeatures> {
        let centers = [[0.0, 0.0], [50.0, 0.0], [0.0, 50.0]];
        let mut frames = Vec::new();
        for i in 0..per_cluster * 3 {
            frames.push(frame(&centers[i % 3], i, false));
        }
        frames
    }

    #[test]
    fn fixed_k_labels_every_frame_with_at_most_k_ids() {
        let clusterer = SpeakerClusterer::new(ClusterConfig::default());
        let features = sequence(three_speaker_frames(40));
        let assignment = clusterer.cluster(&features, 3).unwrap();

        assert_eq!(assignment.len(), features.len());
        assert!(assignment.num_speakers() <= 3);
        assert!(assignment.labels().iter().all(|&l| l < assignment.num_speakers()));
    }

    #[test]
    fn clustering_is_deterministic() {
        let clusterer = SpeakerClusterer::new(ClusterConfig::default());
        let features = sequence(three_speaker_frames(40));
        let first = clusterer.cluster(&features, 0).unwrap();
        let second = clusterer.cluster(&features, 0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn auto_detection_finds_three_speakers() {
        let clusterer = SpeakerClusterer::new(ClusterConfig::default());
        let features = sequence(three_speaker_frames(100));
        let assignment = clusterer.cluster(&features, 0).unwrap();

        assert_eq!(assignment.num_speakers(), 3);
        assert_eq!(assignment.len(), 300);

        // Frames built from the same center must share a label
        for i in 0..assignment.len() {
            assert_eq!(assignment.labels()[i], assignment.labels()[i % 3]);
        }
    }

    #[test]
    fn well_separated_two_speakers_split_cleanly() {
        let clusterer = SpeakerClusterer::new(ClusterConfig::default());
        let mut frames = Vec::new();
        for i in 0..30 {
            frames.push(frame(&[0.0, 0.0], i, false));
        }
        for i in 0..30 {
            frames.push(frame(&[40.0, 40.0], i, false));
        }
        let assignment = clusterer.cluster(&sequence(frames), 2).unwrap();

        assert_eq!(assignment.num_speakers(), 2);
        let first_half = assignment.labels()[0];
        assert!(assignment.labels()[..30].iter().all(|&l| l == first_half));
        assert!(assignment.labels()[30..].iter().all(|&l| l != first_half));
    }

    #[test]
    fn silent_frames_are_labeled_but_not_fitted() {
        let clusterer = SpeakerClusterer::new(ClusterConfig::default());
        let mut frames = three_speaker_frames(30);
        // A silent outlier far from every speaker
        frames.push(frame(&[1000.0, 1000.0], 7, true));
        let features = sequence(frames);
        let assignment = clusterer.cluster(&features, 3).unwrap();

        assert_eq!(assignment.len(), 91);
        assert!(assignment.label(90).is_some());
        // The outlier did not spawn its own cluster
        assert_eq!(assignment.num_speakers(), 3);
    }

    #[test]
    fn too_few_voiced_frames_is_insufficient_data() {
        let clusterer = SpeakerClusterer::new(ClusterConfig::default());
        let frames = vec![
            frame(&[0.0, 0.0], 0, false),
            frame(&[1.0, 1.0], 1, true),
            frame(&[2.0, 2.0], 2, true),
        ];
        let err = clusterer.cluster(&sequence(frames), 2).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData(_)));
    }

    #[test]
    fn empty_sequence_is_insufficient_data() {
        let clusterer = SpeakerClusterer::new(ClusterConfig::default());
        let err = clusterer.cluster(&sequence(Vec::new()), 0).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData(_)));
    }

    #[test]
    fn single_speaker_collapses_to_one_label() {
        let clusterer = SpeakerClusterer::new(ClusterConfig::default());
        let frames: Vec<FrameFeatures> =
            (0..50).map(|i| frame(&[5.0, 5.0], i, false)).collect();
        let assignment = clusterer.cluster(&sequence(frames), 1).unwrap();
        assert_eq!(assignment.num_speakers(), 1);
        assert!(assignment.labels().iter().all(|&l| l == 0));
    }

    #[test]
    fn most_frequent_cluster_gets_label_zero() {
        let clusterer = SpeakerClusterer::new(ClusterConfig::default());
        let mut frames = Vec::new();
        for i in 0..60 {
            frames.push(frame(&[0.0, 0.0], i, false));
        }
        for i in 0..20 {
            frames.push(frame(&[40.0, 40.0], i, false));
        }
        let assignment = clusterer.cluster(&sequence(frames), 2).unwrap();
        assert_eq!(assignment.labels()[0], 0);
        assert_eq!(assignment.labels()[70], 1);
    }
}
