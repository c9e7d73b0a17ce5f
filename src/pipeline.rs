//! Workout processing pipeline
//!
//! Composes intake, effort scoring and personal-best detection around an
//! explicitly constructed store. This is the caller of the pure core, so this
//! is where validator warnings get logged and where downstream consumers
//! (coaching text, third-party sync) are notified.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::effort::EffortCalculator;
use crate::error::Result;
use crate::import::{self, WorkoutSubmission};
use crate::models::{AthleteProfile, ScoredWorkout, ValidatedMeasurement};
use crate::personal_best::{PbCategory, PbOutcome, PersonalBestDetector, PersonalBestStore};

/// Confidence below which a repaired measurement is logged as suspect
pub const LOW_CONFIDENCE_THRESHOLD: u8 = 60;

/// A consumer of scored workouts outside the core, such as coaching text
/// generation or third-party sync.
///
/// Notifications are fire-and-forget: failures are logged and never retried
/// here.
pub trait DownstreamSink: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn notify(&self, workout: &ScoredWorkout, personal_best: &PbOutcome) -> anyhow::Result<()>;
}

/// Result of processing one submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedWorkout {
    pub workout: ScoredWorkout,
    pub personal_best: PbOutcome,
}

/// Validate, score and check a submission for a personal best
pub struct WorkoutPipeline<S: PersonalBestStore> {
    store: Arc<S>,
    sinks: Vec<Arc<dyn DownstreamSink>>,
}

impl<S: PersonalBestStore> WorkoutPipeline<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            sinks: Vec::new(),
        }
    }

    /// Register a downstream consumer
    pub fn with_sink(mut self, sink: Arc<dyn DownstreamSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Score a submission without touching the store
    pub fn score(
        &self,
        submission: &WorkoutSubmission,
        profile: &AthleteProfile,
    ) -> Result<ScoredWorkout> {
        score_submission(submission, profile)
    }

    /// Full pipeline: intake, scoring, personal-best detection and downstream
    /// notification. The returned workout is ready for persistence.
    pub fn process(
        &self,
        submission: &WorkoutSubmission,
        profile: &AthleteProfile,
    ) -> Result<ProcessedWorkout> {
        let workout = self.score(submission, profile)?;
        let processed = self.detect_personal_best(workout)?;
        self.notify_sinks(&processed.workout, &processed.personal_best);
        Ok(processed)
    }

    fn detect_personal_best(&self, mut workout: ScoredWorkout) -> Result<ProcessedWorkout> {
        let personal_best = PersonalBestDetector::apply(self.store.as_ref(), &workout)?;
        if let PbOutcome::NewRecord { record, previous } = &personal_best {
            workout.is_personal_best = true;
            info!(
                user_id = %record.user_id,
                category = %record.category,
                time_seconds = record.time_seconds,
                previous_seconds = previous.as_ref().map(|p| p.time_seconds),
                "New personal best"
            );
        }

        Ok(ProcessedWorkout {
            workout,
            personal_best,
        })
    }

    /// Hand the result to every sink on a detached thread
    fn notify_sinks(&self, workout: &ScoredWorkout, personal_best: &PbOutcome) {
        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let workout = workout.clone();
            let personal_best = personal_best.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("sink-{}", sink.name()))
                .spawn(move || {
                    if let Err(e) = sink.notify(&workout, &personal_best) {
                        warn!(
                            sink = sink.name(),
                            workout_id = %workout.id,
                            error = %e,
                            "Downstream notification failed"
                        );
                    }
                });
            if let Err(e) = spawned {
                warn!(error = %e, "Could not start downstream notification");
            }
        }
    }
}

/// Intake and scoring for one submission. Needs no store, so batch callers
/// may run it from any thread.
pub fn score_submission(
    submission: &WorkoutSubmission,
    profile: &AthleteProfile,
) -> Result<ScoredWorkout> {
    let accepted = import::accept(submission)?;
    log_measurement_concerns(submission, &accepted.measurement);

    let effort = EffortCalculator::calculate(profile, &accepted.intervals)?;
    let distance = accepted
        .measurement
        .total_distance_metres
        .unwrap_or_else(|| accepted.intervals.iter().map(|i| i.distance_metres).sum());
    let category = PbCategory::for_workout(distance, effort.workout_kind);

    let workout = ScoredWorkout {
        id: Uuid::new_v4().to_string(),
        user_id: submission.user_id.clone(),
        source: submission.source,
        measurement: accepted.measurement,
        intervals: accepted.intervals,
        effort,
        category,
        is_personal_best: false,
        achieved_at: submission.achieved_at.unwrap_or_else(Utc::now),
    };

    debug!(
        workout_id = %workout.id,
        effort_points = workout.effort.effort_points,
        zone = %workout.effort.zone,
        legacy_score = workout.effort.legacy_score,
        "Scored workout"
    );
    Ok(workout)
}

impl WorkoutPipeline<Database> {
    /// Process a submission and persist the workout.
    ///
    /// The workout row is written before the personal-best record so the
    /// record never points at a missing workout.
    pub fn process_and_save(
        &self,
        submission: &WorkoutSubmission,
        profile: &AthleteProfile,
    ) -> Result<ProcessedWorkout> {
        let workout = self.score(submission, profile)?;
        self.store.save_workout(&workout)?;

        let processed = self.detect_personal_best(workout)?;
        if processed.workout.is_personal_best {
            self.store.mark_personal_best(&processed.workout.id)?;
        }

        self.notify_sinks(&processed.workout, &processed.personal_best);
        Ok(processed)
    }
}

fn log_measurement_concerns(
    submission: &WorkoutSubmission,
    measurement: &ValidatedMeasurement,
) {
    for warning in &measurement.warnings {
        info!(user_id = %submission.user_id, warning = %warning, "Measurement repaired");
    }
    if measurement.confidence < LOW_CONFIDENCE_THRESHOLD {
        warn!(
            user_id = %submission.user_id,
            source = submission.source.as_str(),
            confidence = measurement.confidence,
            was_swapped = measurement.was_swapped,
            distance_estimated = measurement.distance_estimated,
            warnings = measurement.warnings.len(),
            "Low-confidence measurement"
        );
    }
}
