//! Personal-best detection
//!
//! Each `(user, category)` pair keeps exactly one record: the fastest time.
//! A record is created on the first workout in a category and replaced only
//! by a strictly faster time; equal times keep the older record.
//!
//! Only continuous pieces count. An interval session's summed work time
//! leaves out the rest between pieces, so it is not a time over the distance.
//!
//! The decision itself is pure. Persisting it goes through
//! `PersonalBestStore::replace_if_faster`, which every store must implement as
//! a single atomic compare-and-write so concurrent submissions for the same
//! key cannot leave a slower time stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use crate::effort::WorkoutKind;
use crate::error::StoreError;
use crate::models::ScoredWorkout;

/// Relative distance tolerance for category matching
pub const CATEGORY_TOLERANCE: f64 = 0.01;

/// Canonical race distances that carry a personal best
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PbCategory {
    #[serde(rename = "500m")]
    M500,
    #[serde(rename = "1000m")]
    M1000,
    #[serde(rename = "2000m")]
    M2000,
    #[serde(rename = "5000m")]
    M5000,
    #[serde(rename = "6000m")]
    M6000,
    #[serde(rename = "10000m")]
    M10000,
    #[serde(rename = "half_marathon")]
    HalfMarathon,
    #[serde(rename = "marathon")]
    Marathon,
}

impl PbCategory {
    pub const ALL: [PbCategory; 8] = [
        PbCategory::M500,
        PbCategory::M1000,
        PbCategory::M2000,
        PbCategory::M5000,
        PbCategory::M6000,
        PbCategory::M10000,
        PbCategory::HalfMarathon,
        PbCategory::Marathon,
    ];

    /// Exact distance of the category in metres
    pub fn metres(&self) -> f64 {
        match self {
            PbCategory::M500 => 500.0,
            PbCategory::M1000 => 1000.0,
            PbCategory::M2000 => 2000.0,
            PbCategory::M5000 => 5000.0,
            PbCategory::M6000 => 6000.0,
            PbCategory::M10000 => 10000.0,
            PbCategory::HalfMarathon => 21097.0,
            PbCategory::Marathon => 42195.0,
        }
    }

    /// Category whose distance is within 1% of `distance_metres`, if any
    pub fn resolve(distance_metres: f64) -> Option<PbCategory> {
        if !distance_metres.is_finite() || distance_metres <= 0.0 {
            return None;
        }
        Self::ALL.into_iter().find(|category| {
            let target = category.metres();
            (distance_metres - target).abs() / target <= CATEGORY_TOLERANCE
        })
    }

    /// Category a workout of this shape and total distance counts towards
    pub fn for_workout(distance_metres: f64, kind: WorkoutKind) -> Option<PbCategory> {
        match kind {
            WorkoutKind::Intervals => None,
            WorkoutKind::Race | WorkoutKind::Steady => Self::resolve(distance_metres),
        }
    }

    /// Storage and wire label
    pub fn as_str(&self) -> &'static str {
        match self {
            PbCategory::M500 => "500m",
            PbCategory::M1000 => "1000m",
            PbCategory::M2000 => "2000m",
            PbCategory::M5000 => "5000m",
            PbCategory::M6000 => "6000m",
            PbCategory::M10000 => "10000m",
            PbCategory::HalfMarathon => "half_marathon",
            PbCategory::Marathon => "marathon",
        }
    }
}

impl fmt::Display for PbCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PbCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| format!("Invalid personal best category: {}", s))
    }
}

/// The stored fastest time for one athlete and category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalBestRecord {
    pub user_id: String,
    pub category: PbCategory,
    pub time_seconds: f64,
    pub achieved_at: DateTime<Utc>,
    pub workout_id: String,
}

impl PersonalBestRecord {
    /// Candidate record for a scored workout, when it falls in a category.
    ///
    /// The time is the workout's total elapsed time, not the interval sum.
    pub fn candidate(workout: &ScoredWorkout) -> Option<Self> {
        if workout.effort.workout_kind == WorkoutKind::Intervals {
            return None;
        }
        let category = workout.category?;
        Some(Self {
            user_id: workout.user_id.clone(),
            category,
            time_seconds: workout.total_time_seconds(),
            achieved_at: workout.achieved_at,
            workout_id: workout.id.clone(),
        })
    }

    /// True when this record should replace `existing`
    pub fn beats(&self, existing: Option<&PersonalBestRecord>) -> bool {
        existing.map_or(true, |current| self.time_seconds < current.time_seconds)
    }
}

/// What the pure decision says the caller should do
#[derive(Debug, Clone, PartialEq)]
pub enum PbDecision {
    /// Upsert this record and flag the workout as a personal best
    Replace(PersonalBestRecord),
    /// Leave the stored record and the workout untouched
    Keep,
    /// Not a continuous piece over a canonical distance
    NotEligible,
}

/// What actually happened once the store applied the decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PbOutcome {
    /// The workout is the new fastest time
    #[serde(rename_all = "camelCase")]
    NewRecord {
        record: PersonalBestRecord,
        previous: Option<PersonalBestRecord>,
    },
    /// An equal or faster time is already stored
    #[serde(rename_all = "camelCase")]
    NotFaster { current: Option<PersonalBestRecord> },
    /// Not a continuous piece over a canonical distance
    NoCategory,
}

impl PbOutcome {
    pub fn is_new_record(&self) -> bool {
        matches!(self, PbOutcome::NewRecord { .. })
    }
}

/// Storage for personal-best records
pub trait PersonalBestStore: Send + Sync {
    /// Current record for a key
    fn current_best(
        &self,
        user_id: &str,
        category: PbCategory,
    ) -> Result<Option<PersonalBestRecord>, StoreError>;

    /// Store `candidate` only if no record exists or it is strictly faster
    /// than the stored one, as one atomic step. Returns whether it was written.
    fn replace_if_faster(&self, candidate: &PersonalBestRecord) -> Result<bool, StoreError>;

    /// All records for a user, ordered by category
    fn list_for_user(&self, user_id: &str) -> Result<Vec<PersonalBestRecord>, StoreError>;
}

/// Mutex-guarded in-process store
#[derive(Debug, Default)]
pub struct InMemoryPbStore {
    records: Mutex<HashMap<(String, PbCategory), PersonalBestRecord>>,
}

impl InMemoryPbStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(String, PbCategory), PersonalBestRecord>>, StoreError>
    {
        self.records
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl PersonalBestStore for InMemoryPbStore {
    fn current_best(
        &self,
        user_id: &str,
        category: PbCategory,
    ) -> Result<Option<PersonalBestRecord>, StoreError> {
        Ok(self.lock()?.get(&(user_id.to_string(), category)).cloned())
    }

    fn replace_if_faster(&self, candidate: &PersonalBestRecord) -> Result<bool, StoreError> {
        let mut records = self.lock()?;
        let key = (candidate.user_id.clone(), candidate.category);
        if candidate.beats(records.get(&key)) {
            records.insert(key, candidate.clone());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<PersonalBestRecord>, StoreError> {
        let mut records: Vec<PersonalBestRecord> = self
            .lock()?
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.category);
        Ok(records)
    }
}

/// Personal-best decision and application
pub struct PersonalBestDetector;

impl PersonalBestDetector {
    /// Pure decision against the record currently known for the category
    pub fn decide(workout: &ScoredWorkout, current: Option<&PersonalBestRecord>) -> PbDecision {
        match PersonalBestRecord::candidate(workout) {
            None => PbDecision::NotEligible,
            Some(candidate) if candidate.beats(current) => PbDecision::Replace(candidate),
            Some(_) => PbDecision::Keep,
        }
    }

    /// Decide and persist through the store's atomic conditional write.
    ///
    /// The store's answer is authoritative: a concurrent faster submission
    /// that lands between the read and the write turns a `Replace` decision
    /// into `NotFaster`.
    pub fn apply(
        store: &dyn PersonalBestStore,
        workout: &ScoredWorkout,
    ) -> Result<PbOutcome, StoreError> {
        let Some(category) = workout.category else {
            return Ok(PbOutcome::NoCategory);
        };

        let previous = store.current_best(&workout.user_id, category)?;
        match Self::decide(workout, previous.as_ref()) {
            PbDecision::NotEligible => Ok(PbOutcome::NoCategory),
            PbDecision::Keep => Ok(PbOutcome::NotFaster { current: previous }),
            PbDecision::Replace(record) => {
                if store.replace_if_faster(&record)? {
                    Ok(PbOutcome::NewRecord { record, previous })
                } else {
                    let current = store.current_best(&workout.user_id, category)?;
                    Ok(PbOutcome::NotFaster { current })
                }
            }
        }
    }
}
