//! Pattern clustering over signature groups.
//!
//! A batch is first grouped exactly by signature (cheap dedupe), then one
//! representative message per signature is vectorized with a bounded
//! TF-IDF vocabulary and clustered with DBSCAN over cosine distance.
//! Signatures whose wording is close enough merge into one cluster;
//! DBSCAN noise points are retained as singleton outlier clusters.
//!
//! Degenerate inputs (empty batch, a single distinct signature, a
//! vocabulary emptied by stop-word removal) fall back to the trivial
//! single-cluster result instead of failing.

use crate::core::{AnalysisConfig, LogRecord, Severity, Signature};
use crate::signature::compute_signature;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// One clustered pattern with aggregate statistics.
#[derive(Debug, Clone, Serialize)]
pub struct PatternCluster {
    /// Dense rank of the cluster after sorting by total_count.
    pub id: usize,
    /// Number of member signatures.
    pub size: usize,
    /// Signature of the most frequent member.
    pub signature: Signature,
    /// All member signatures.
    pub members: Vec<Signature>,
    /// Sample message of the most frequent member.
    pub representative_message: String,
    /// Total log events across all members.
    pub total_count: usize,
    /// Event counts per severity. Sums to total_count.
    pub severity_distribution: HashMap<Severity, usize>,
    /// Earliest member timestamp.
    pub first_seen: DateTime<Utc>,
    /// Latest member timestamp.
    pub last_seen: DateTime<Utc>,
    /// True if DBSCAN classified this signature as noise.
    pub outlier: bool,
}

/// Result of clustering one batch.
#[derive(Debug, Clone, Serialize)]
pub struct PatternAnalysis {
    /// Clusters sorted by descending total_count.
    pub clusters: Vec<PatternCluster>,
    /// Number of singleton outlier clusters.
    pub noise_count: usize,
    /// Distinct signatures in the batch.
    pub total_unique_patterns: usize,
    /// Events in the batch.
    pub total_logs: usize,
}

impl PatternAnalysis {
    fn empty(total_logs: usize) -> Self {
        PatternAnalysis {
            clusters: Vec::new(),
            noise_count: 0,
            total_unique_patterns: 0,
            total_logs,
        }
    }
}

/// Per-signature aggregate built during the exact grouping pass.
#[derive(Debug, Clone)]
struct SignatureGroup {
    signature: Signature,
    sample_message: String,
    count: usize,
    severity_distribution: HashMap<Severity, usize>,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

/// Groups signatures into clusters by textual similarity.
pub struct PatternClusterer {
    eps: f64,
    min_samples: usize,
    max_features: usize,
}

impl PatternClusterer {
    /// Create a clusterer from analysis configuration.
    pub fn new(config: &AnalysisConfig) -> Self {
        PatternClusterer {
            eps: config.cluster_eps,
            min_samples: config.cluster_min_samples,
            max_features: config.max_features,
        }
    }

    /// Cluster a batch of log records.
    pub fn analyze(&self, logs: &[LogRecord]) -> PatternAnalysis {
        if logs.is_empty() {
            return PatternAnalysis::empty(0);
        }

        let groups = group_by_signature(logs);
        let unique = groups.len();

        let mut clusters = if unique < 2 {
            trivial_cluster(&groups)
        } else {
            match self.cluster_groups(&groups) {
                Some(clusters) => clusters,
                None => {
                    tracing::warn!(
                        unique_patterns = unique,
                        "vectorization degenerate, falling back to single cluster"
                    );
                    trivial_cluster(&groups)
                },
            }
        };

        clusters.sort_by(|a, b| b.total_count.cmp(&a.total_count));
        for (id, cluster) in clusters.iter_mut().enumerate() {
            cluster.id = id;
        }
        let noise_count = clusters.iter().filter(|c| c.outlier).count();

        PatternAnalysis {
            clusters,
            noise_count,
            total_unique_patterns: unique,
            total_logs: logs.len(),
        }
    }

    /// TF-IDF + DBSCAN path. None signals a degenerate vectorization.
    fn cluster_groups(&self, groups: &[SignatureGroup]) -> Option<Vec<PatternCluster>> {
        let documents: Vec<Vec<String>> = groups
            .iter()
            .map(|g| tokenize(&g.sample_message))
            .collect();

        let vectors = tfidf_vectors(&documents, self.max_features)?;
        let labels = dbscan(&vectors, self.eps, self.min_samples);

        let mut by_label: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut noise: Vec<usize> = Vec::new();
        for (idx, label) in labels.iter().enumerate() {
            match label {
                Some(label) => by_label.entry(*label).or_default().push(idx),
                None => noise.push(idx),
            }
        }

        let mut clusters = Vec::with_capacity(by_label.len() + noise.len());
        let mut ordered: Vec<_> = by_label.into_iter().collect();
        ordered.sort_by_key(|(label, _)| *label);
        for (_, member_idx) in ordered {
            clusters.push(build_cluster(groups, &member_idx, false));
        }
        for idx in noise {
            clusters.push(build_cluster(groups, &[idx], true));
        }

        Some(clusters)
    }
}

/// Exact grouping pass. Groups keep first-appearance order so the whole
/// pipeline stays deterministic for identical input.
fn group_by_signature(logs: &[LogRecord]) -> Vec<SignatureGroup> {
    let mut index: HashMap<Signature, usize> = HashMap::new();
    let mut groups: Vec<SignatureGroup> = Vec::new();

    for log in logs {
        let signature = compute_signature(&log.message);
        match index.get(&signature) {
            Some(&i) => {
                let group = &mut groups[i];
                group.count += 1;
                *group.severity_distribution.entry(log.severity).or_insert(0) += 1;
                if log.timestamp < group.first_seen {
                    group.first_seen = log.timestamp;
                }
                if log.timestamp > group.last_seen {
                    group.last_seen = log.timestamp;
                }
            },
            None => {
                index.insert(signature.clone(), groups.len());
                let mut severity_distribution = HashMap::new();
                severity_distribution.insert(log.severity, 1);
                groups.push(SignatureGroup {
                    signature,
                    sample_message: log.message.clone(),
                    count: 1,
                    severity_distribution,
                    first_seen: log.timestamp,
                    last_seen: log.timestamp,
                });
            },
        }
    }

    groups
}

fn trivial_cluster(groups: &[SignatureGroup]) -> Vec<PatternCluster> {
    if groups.is_empty() {
        return Vec::new();
    }
    let all: Vec<usize> = (0..groups.len()).collect();
    vec![build_cluster(groups, &all, false)]
}

fn build_cluster(groups: &[SignatureGroup], member_idx: &[usize], outlier: bool) -> PatternCluster {
    debug_assert!(!member_idx.is_empty());

    let representative = member_idx
        .iter()
        .copied()
        .max_by_key(|&i| groups[i].count)
        .unwrap_or(member_idx[0]);

    let mut severity_distribution: HashMap<Severity, usize> = HashMap::new();
    let mut total_count = 0;
    let mut first_seen = groups[member_idx[0]].first_seen;
    let mut last_seen = groups[member_idx[0]].last_seen;

    for &i in member_idx {
        let group = &groups[i];
        total_count += group.count;
        for (severity, count) in &group.severity_distribution {
            *severity_distribution.entry(*severity).or_insert(0) += count;
        }
        if group.first_seen < first_seen {
            first_seen = group.first_seen;
        }
        if group.last_seen > last_seen {
            last_seen = group.last_seen;
        }
    }

    PatternCluster {
        id: 0, // assigned after sorting
        size: member_idx.len(),
        signature: groups[representative].signature.clone(),
        members: member_idx.iter().map(|&i| groups[i].signature.clone()).collect(),
        representative_message: groups[representative].sample_message.clone(),
        total_count,
        severity_distribution,
        first_seen,
        last_seen,
        outlier,
    }
}

/// English stop words pruned from messages before vectorization.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in", "is",
    "it", "its", "of", "on", "or", "that", "the", "to", "was", "were", "will", "with",
];

fn tokenize(message: &str) -> Vec<String> {
    message
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Build l2-normalized TF-IDF vectors with a bounded vocabulary.
///
/// Returns None when no terms survive tokenization, which callers treat as
/// "clustering not possible".
fn tfidf_vectors(documents: &[Vec<String>], max_features: usize) -> Option<Vec<Vec<f64>>> {
    // Document frequency per term.
    let mut df: HashMap<&str, usize> = HashMap::new();
    for doc in documents {
        let mut seen: Vec<&str> = Vec::new();
        for term in doc {
            if !seen.contains(&term.as_str()) {
                seen.push(term);
                *df.entry(term).or_insert(0) += 1;
            }
        }
    }

    if df.is_empty() {
        return None;
    }

    // Cap the vocabulary: most frequent terms first, term text breaking ties
    // so the selection is deterministic.
    let mut terms: Vec<(&str, usize)> = df.iter().map(|(t, c)| (*t, *c)).collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    terms.truncate(max_features);

    let vocab: HashMap<&str, usize> = terms
        .iter()
        .enumerate()
        .map(|(i, (t, _))| (*t, i))
        .collect();

    let n_docs = documents.len() as f64;
    let idf: Vec<f64> = terms
        .iter()
        .map(|(_, df)| ((n_docs + 1.0) / (*df as f64 + 1.0)).ln() + 1.0)
        .collect();

    let mut vectors = Vec::with_capacity(documents.len());
    for doc in documents {
        let mut vector = vec![0.0; vocab.len()];
        for term in doc {
            if let Some(&i) = vocab.get(term.as_str()) {
                vector[i] += 1.0;
            }
        }
        for (i, value) in vector.iter_mut().enumerate() {
            *value *= idf[i];
        }
        let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vectors.push(vector);
    }

    Some(vectors)
}

/// Cosine distance between two l2-normalized vectors.
fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    (1.0 - dot).clamp(0.0, 2.0)
}

/// DBSCAN over a dense distance metric. `None` labels mark noise points.
///
/// min_samples counts the point itself, matching the usual convention.
fn dbscan(vectors: &[Vec<f64>], eps: f64, min_samples: usize) -> Vec<Option<usize>> {
    let n = vectors.len();
    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut next_label = 0;

    let neighbors = |i: usize| -> Vec<usize> {
        (0..n)
            .filter(|&j| cosine_distance(&vectors[i], &vectors[j]) <= eps)
            .collect()
    };

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let seed = neighbors(i);
        if seed.len() < min_samples {
            continue; // noise unless adopted by a later cluster
        }

        let label = next_label;
        next_label += 1;
        labels[i] = Some(label);

        let mut queue = seed;
        let mut cursor = 0;
        while cursor < queue.len() {
            let j = queue[cursor];
            cursor += 1;

            if !visited[j] {
                visited[j] = true;
                let reachable = neighbors(j);
                if reachable.len() >= min_samples {
                    for k in reachable {
                        if !queue.contains(&k) {
                            queue.push(k);
                        }
                    }
                }
            }
            if labels[j].is_none() {
                labels[j] = Some(label);
            }
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;
    use pretty_assertions::assert_eq;

    fn record(message: &str, severity: Severity) -> LogRecord {
        LogRecord::new(message, severity, "test")
    }

    #[test]
    fn test_empty_batch() {
        let clusterer = PatternClusterer::new(&AnalysisConfig::default());
        let analysis = clusterer.analyze(&[]);
        assert_eq!(analysis.total_logs, 0);
        assert_eq!(analysis.total_unique_patterns, 0);
        assert!(analysis.clusters.is_empty());
    }

    #[test]
    fn test_single_pattern_trivial_cluster() {
        let clusterer = PatternClusterer::new(&AnalysisConfig::default());
        let logs: Vec<LogRecord> = (0..10)
            .map(|i| record(&format!("User {} logged in", i), Severity::Info))
            .collect();

        let analysis = clusterer.analyze(&logs);
        assert_eq!(analysis.total_unique_patterns, 1);
        assert_eq!(analysis.clusters.len(), 1);
        assert_eq!(analysis.clusters[0].total_count, 10);
        assert!(!analysis.clusters[0].outlier);
    }

    #[test]
    fn test_similar_messages_merge() {
        let clusterer = PatternClusterer::new(&AnalysisConfig::default());
        let mut logs = Vec::new();
        for _ in 0..5 {
            logs.push(record("database connection timeout on primary", Severity::Warning));
            logs.push(record("database connection timeout on replica", Severity::Warning));
        }

        let analysis = clusterer.analyze(&logs);
        assert_eq!(analysis.total_unique_patterns, 2);
        // The two wordings share most terms and should land in one cluster.
        let merged = analysis
            .clusters
            .iter()
            .find(|c| c.size == 2)
            .expect("expected a merged cluster");
        assert_eq!(merged.total_count, 10);
    }

    #[test]
    fn test_outliers_are_singletons() {
        let clusterer = PatternClusterer::new(&AnalysisConfig::default());
        let mut logs = Vec::new();
        for _ in 0..5 {
            logs.push(record("cache refill started for shard alpha", Severity::Info));
            logs.push(record("cache refill finished for shard alpha", Severity::Info));
        }
        logs.push(record("kernel oops: unexpected page fault", Severity::Critical));

        let analysis = clusterer.analyze(&logs);
        assert_eq!(analysis.total_unique_patterns, 3);
        assert!(analysis.noise_count >= 1);
        let outliers: Vec<_> = analysis.clusters.iter().filter(|c| c.outlier).collect();
        for outlier in outliers {
            assert_eq!(outlier.size, 1);
        }
    }

    #[test]
    fn test_clusters_sorted_by_count() {
        let clusterer = PatternClusterer::new(&AnalysisConfig::default());
        let mut logs = Vec::new();
        for _ in 0..20 {
            logs.push(record("request served quickly today", Severity::Info));
        }
        for _ in 0..3 {
            logs.push(record("payment gateway unreachable entirely", Severity::Error));
        }

        let analysis = clusterer.analyze(&logs);
        let counts: Vec<usize> = analysis.clusters.iter().map(|c| c.total_count).collect();
        let mut sorted = counts.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(counts, sorted);
        assert_eq!(analysis.clusters[0].id, 0);
    }

    #[test]
    fn test_total_count_matches_severity_distribution() {
        let clusterer = PatternClusterer::new(&AnalysisConfig::default());
        let mut logs = Vec::new();
        for i in 0..7 {
            logs.push(record(&format!("worker {} heartbeat ok", i), Severity::Debug));
        }
        logs.push(record("worker 3 heartbeat ok", Severity::Warning));

        let analysis = clusterer.analyze(&logs);
        for cluster in &analysis.clusters {
            let sum: usize = cluster.severity_distribution.values().sum();
            assert_eq!(cluster.total_count, sum);
        }
    }

    #[test]
    fn test_stop_word_only_messages_fall_back() {
        let clusterer = PatternClusterer::new(&AnalysisConfig::default());
        let logs = vec![
            record("of the and", Severity::Info),
            record("to be or", Severity::Info),
        ];

        let analysis = clusterer.analyze(&logs);
        // Vectorization degenerates; everything lands in one trivial cluster.
        assert_eq!(analysis.clusters.len(), 1);
        assert_eq!(analysis.clusters[0].total_count, 2);
    }

    #[test]
    fn test_representative_is_most_frequent() {
        let clusterer = PatternClusterer::new(&AnalysisConfig::default());
        let mut logs = Vec::new();
        for _ in 0..8 {
            logs.push(record("index rebuild running on node east", Severity::Info));
        }
        logs.push(record("index rebuild queued on node east", Severity::Info));

        let analysis = clusterer.analyze(&logs);
        let top = &analysis.clusters[0];
        assert_eq!(top.representative_message, "index rebuild running on node east");
    }
}
