//! Parallel scoring of submission files using rayon
//!
//! Scoring needs no store, so every file in a directory can be scored on the
//! rayon pool. Failures are collected per file rather than aborting the batch.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::import::WorkoutSubmission;
use crate::models::{AthleteProfile, ScoredWorkout};
use crate::pipeline::score_submission;

/// Result of scoring a single file
#[derive(Debug, Clone)]
pub struct FileScoreResult {
    /// Path to the file that was processed
    pub file_path: PathBuf,
    /// Scored workout, if the file was accepted
    pub workout: Option<ScoredWorkout>,
    /// Error message if scoring failed
    pub error: Option<String>,
}

impl FileScoreResult {
    pub fn success(&self) -> bool {
        self.workout.is_some()
    }
}

/// Summary of a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    pub total_duration_ms: u128,
    /// Per-file results, in path order
    pub results: Vec<FileScoreResult>,
}

impl BatchSummary {
    /// Get throughput (files per second)
    pub fn throughput_files_per_sec(&self) -> f64 {
        if self.total_duration_ms == 0 {
            return 0.0;
        }
        (self.successful_files as f64 / self.total_duration_ms as f64) * 1000.0
    }

    pub fn is_fully_successful(&self) -> bool {
        self.failed_files == 0
    }
}

/// Score every `.json` submission in a directory
pub fn score_directory(dir_path: &Path, profile: &AthleteProfile) -> Result<BatchSummary> {
    if !dir_path.is_dir() {
        anyhow::bail!("Path is not a directory: {}", dir_path.display());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir_path)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        warn!("No submission files found in directory: {}", dir_path.display());
    }

    Ok(score_files(&files, profile))
}

/// Score the given files in parallel
pub fn score_files(file_paths: &[PathBuf], profile: &AthleteProfile) -> BatchSummary {
    let start_time = Instant::now();
    info!("Scoring {} submission files in parallel", file_paths.len());

    let results: Vec<FileScoreResult> = file_paths
        .par_iter()
        .map(|path| match score_file(path, profile) {
            Ok(workout) => FileScoreResult {
                file_path: path.clone(),
                workout: Some(workout),
                error: None,
            },
            Err(e) => {
                warn!(file = %path.display(), error = %format!("{:#}", e), "Failed to score file");
                FileScoreResult {
                    file_path: path.clone(),
                    workout: None,
                    error: Some(format!("{:#}", e)),
                }
            }
        })
        .collect();

    let successful_files = results.iter().filter(|r| r.success()).count();
    let summary = BatchSummary {
        total_files: file_paths.len(),
        successful_files,
        failed_files: results.len() - successful_files,
        total_duration_ms: start_time.elapsed().as_millis(),
        results,
    };

    info!(
        total = summary.total_files,
        successful = summary.successful_files,
        failed = summary.failed_files,
        duration_ms = summary.total_duration_ms as u64,
        "Batch scoring complete"
    );
    summary
}

fn score_file(path: &Path, profile: &AthleteProfile) -> Result<ScoredWorkout> {
    debug!("Scoring {}", path.display());
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let submission: WorkoutSubmission = serde_json::from_str(&content)
        .with_context(|| format!("Invalid submission JSON in {}", path.display()))?;
    Ok(score_submission(&submission, profile)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_score_directory_collects_failures() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"{"userId":"u1","source":"manual","measurement":{"totalTimeSeconds":420,"totalDistanceMetres":2000}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("b.json"),
            r#"{"userId":"u1","source":"manual","measurement":{"totalTimeSeconds":420}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("c.json"), "not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let summary = score_directory(dir.path(), &AthleteProfile::default()).unwrap();

        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.successful_files, 1);
        assert_eq!(summary.failed_files, 2);
        assert!(!summary.is_fully_successful());
        assert!(summary.results[0].success());
        assert!(summary.results[1].error.as_deref().unwrap().contains("totalDistanceMetres"));
    }

    #[test]
    fn test_score_directory_requires_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.json");
        fs::write(&file, "{}").unwrap();
        assert!(score_directory(&file, &AthleteProfile::default()).is_err());
    }
}
