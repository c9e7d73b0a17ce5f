//! Effort scoring engine
//!
//! Turns a workout (one or more chronological intervals) plus an athlete
//! profile into two parallel effort representations:
//!
//! - **Legacy score** (0-10): time-weighted heart-rate intensity relative to
//!   max heart rate, scaled by duration and a workout-type multiplier.
//! - **Effort Points** (0-100): weighted composite of four sub-scores
//!   (cardiac load, work output, pacing, economy), each on a 0-100 scale,
//!   plus the zone label derived from the total.
//!
//! Every function here is pure: the same inputs always produce bit-identical
//! outputs. Degenerate intervals (zero distance or time) are absorbed by floors
//! and neutral values; only an empty interval list is an error.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::ValidationError;
use crate::models::{AthleteProfile, Interval};
use crate::zones::EffortZone;

/// Weight of cardiac load in Effort Points
pub const CARDIAC_WEIGHT: f64 = 0.40;
/// Weight of work output in Effort Points
pub const WORK_WEIGHT: f64 = 0.30;
/// Weight of pacing in Effort Points
pub const PACING_WEIGHT: f64 = 0.15;
/// Weight of economy in Effort Points
pub const ECONOMY_WEIGHT: f64 = 0.15;

/// Sub-score used when the data needed for a factor is missing
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Fastest split (s/500m) considered when converting pace to watts
const MIN_SPLIT_SECONDS: f64 = 60.0;
/// Lightest body weight used for W/kg normalization
const MIN_WEIGHT_KG: f64 = 40.0;
/// Erg pace-to-power constant: watts = 2.80 / (s/m)^3
const ERG_POWER_CONSTANT: f64 = 2.80;

/// Penalty per unit of split coefficient of variation
const PACING_CV_PENALTY: f64 = 400.0;
/// Scale applied to the relative first-half/second-half split difference
const PACING_TREND_SCALE: f64 = 200.0;
const PACING_TREND_MAX_BONUS: f64 = 10.0;
const PACING_TREND_MAX_PENALTY: f64 = 20.0;

/// Max heart rate assumed for the legacy score when no heart rate was recorded
pub const LEGACY_DEFAULT_MAX_HR: f64 = 190.0;
/// Heart rate assumed for intervals without a recorded heart rate
pub const LEGACY_FALLBACK_HR: f64 = 140.0;
const LEGACY_RATIO_FLOOR: f64 = 0.50;
const LEGACY_RATIO_SPAN: f64 = 0.45;

/// Sub-scores behind an Effort Points total, before weighting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffortBreakdown {
    pub cardiac_load: f64,
    pub work_output: f64,
    pub pacing: f64,
    pub economy: f64,
}

impl EffortBreakdown {
    /// Weighted sum of the sub-scores, unrounded
    pub fn weighted_total(&self) -> f64 {
        CARDIAC_WEIGHT * self.cardiac_load
            + WORK_WEIGHT * self.work_output
            + PACING_WEIGHT * self.pacing
            + ECONOMY_WEIGHT * self.economy
    }

    /// Each factor's weighted contribution to the total, labelled for display
    pub fn contributions(&self) -> [(&'static str, f64, f64); 4] {
        [
            ("cardiacLoad", self.cardiac_load, CARDIAC_WEIGHT * self.cardiac_load),
            ("workOutput", self.work_output, WORK_WEIGHT * self.work_output),
            ("pacing", self.pacing, PACING_WEIGHT * self.pacing),
            ("economy", self.economy, ECONOMY_WEIGHT * self.economy),
        ]
    }
}

/// Full scoring output for one workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffortResult {
    /// Composite score, 0-100
    pub effort_points: u8,

    /// Bucket derived from `effort_points`
    pub zone: EffortZone,

    /// Pre-weighting sub-scores
    pub breakdown: EffortBreakdown,

    /// Legacy heart-rate based score, 0-10
    pub legacy_score: f64,

    /// Workout shape used for the legacy multiplier
    pub workout_kind: WorkoutKind,
}

impl EffortResult {
    /// Legacy score as shown to users, one decimal place
    pub fn legacy_score_display(&self) -> String {
        format!("{:.1}", self.legacy_score)
    }
}

/// Coarse workout shape, used to scale the legacy score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutKind {
    /// Single short piece, raced or tested (anaerobic share undercounted by HR)
    Race,
    /// Several work intervals
    Intervals,
    /// Single long continuous piece
    Steady,
}

impl WorkoutKind {
    /// Longest single piece (m) still treated as a race
    const RACE_MAX_DISTANCE: f64 = 2500.0;
    /// Longest single piece (s) still treated as a race
    const RACE_MAX_SECONDS: f64 = 600.0;

    pub fn classify(intervals: &[Interval]) -> Self {
        match intervals {
            [single] => {
                if single.distance_metres <= Self::RACE_MAX_DISTANCE
                    || single.time_seconds <= Self::RACE_MAX_SECONDS
                {
                    WorkoutKind::Race
                } else {
                    WorkoutKind::Steady
                }
            }
            [] => WorkoutKind::Steady,
            _ => WorkoutKind::Intervals,
        }
    }

    pub fn legacy_multiplier(&self) -> f64 {
        match self {
            WorkoutKind::Race => 1.20,
            WorkoutKind::Intervals => 1.10,
            WorkoutKind::Steady => 1.00,
        }
    }
}

/// Reference row for a workout distance class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceClass {
    pub name: &'static str,
    /// Upper bound of the class in metres, inclusive
    pub max_distance: f64,
    /// W/kg that scores 100 for work output
    pub reference_wkg: f64,
    /// Distance per stroke that scores 0 for economy
    pub dps_floor: f64,
    /// Distance per stroke that scores 100 for economy
    pub dps_ceiling: f64,
}

pub static DISTANCE_CLASSES: [DistanceClass; 5] = [
    DistanceClass {
        name: "sprint",
        max_distance: 1000.0,
        reference_wkg: 6.0,
        dps_floor: 5.0,
        dps_ceiling: 11.0,
    },
    DistanceClass {
        name: "middle",
        max_distance: 2500.0,
        reference_wkg: 5.0,
        dps_floor: 6.0,
        dps_ceiling: 12.0,
    },
    DistanceClass {
        name: "threshold",
        max_distance: 6500.0,
        reference_wkg: 4.4,
        dps_floor: 6.5,
        dps_ceiling: 12.0,
    },
    DistanceClass {
        name: "endurance",
        max_distance: 12000.0,
        reference_wkg: 4.0,
        dps_floor: 7.0,
        dps_ceiling: 12.5,
    },
    DistanceClass {
        name: "long",
        max_distance: f64::INFINITY,
        reference_wkg: 3.6,
        dps_floor: 7.0,
        dps_ceiling: 12.5,
    },
];

impl DistanceClass {
    pub fn for_distance(distance_metres: f64) -> &'static DistanceClass {
        DISTANCE_CLASSES
            .iter()
            .find(|class| distance_metres <= class.max_distance)
            .unwrap_or(&DISTANCE_CLASSES[DISTANCE_CLASSES.len() - 1])
    }
}

/// Core effort calculation engine
pub struct EffortCalculator;

impl EffortCalculator {
    /// Score a workout for an athlete.
    ///
    /// Fails only when `intervals` is empty.
    pub fn calculate(
        profile: &AthleteProfile,
        intervals: &[Interval],
    ) -> Result<EffortResult, ValidationError> {
        if intervals.is_empty() {
            return Err(ValidationError::EmptyIntervals);
        }

        let breakdown = EffortBreakdown {
            cardiac_load: Self::cardiac_load(profile, intervals),
            work_output: Self::work_output(profile, intervals),
            pacing: Self::pacing(intervals),
            economy: Self::economy(intervals),
        };

        let effort_points = clamp_score(breakdown.weighted_total().round()) as u8;
        let workout_kind = WorkoutKind::classify(intervals);

        Ok(EffortResult {
            effort_points,
            zone: EffortZone::from_points(f64::from(effort_points)),
            breakdown,
            legacy_score: Self::legacy_score(profile, intervals),
            workout_kind,
        })
    }

    /// Legacy 0-10 score.
    ///
    /// Intervals without heart rate assume `LEGACY_FALLBACK_HR` against
    /// `LEGACY_DEFAULT_MAX_HR`, so a workout with no heart rate at all degrades
    /// to a duration-only estimate.
    pub fn legacy_score(profile: &AthleteProfile, intervals: &[Interval]) -> f64 {
        let max_hr = profile.effective_max_hr();
        let fallback_ratio = LEGACY_FALLBACK_HR / LEGACY_DEFAULT_MAX_HR;

        let ratio: f64 = intervals
            .iter()
            .zip(time_weights(intervals))
            .map(|(interval, weight)| {
                let ratio = match interval.avg_heart_rate {
                    Some(hr) if hr.is_finite() && hr > 0.0 && max_hr > 0.0 => hr / max_hr,
                    _ => fallback_ratio,
                };
                ratio * weight
            })
            .sum();

        let intensity =
            ((ratio - LEGACY_RATIO_FLOOR) / LEGACY_RATIO_SPAN).clamp(0.0, 1.0) * 10.0;

        let minutes = intervals.iter().map(|i| usable(i.time_seconds)).sum::<f64>() / 60.0;
        let duration_factor = (0.5 + minutes / 60.0).clamp(0.5, 1.0);

        let multiplier = WorkoutKind::classify(intervals).legacy_multiplier();

        let score = intensity * duration_factor * multiplier;
        if score.is_finite() {
            score.clamp(0.0, 10.0)
        } else {
            0.0
        }
    }

    /// Heart-rate reserve (Karvonen) load, time-weighted across intervals.
    ///
    /// Intervals without heart rate contribute `NEUTRAL_SCORE`.
    pub fn cardiac_load(profile: &AthleteProfile, intervals: &[Interval]) -> f64 {
        let reserve = profile.heart_rate_reserve();
        let resting = f64::from(profile.resting_hr);

        let load: f64 = intervals
            .iter()
            .zip(time_weights(intervals))
            .map(|(interval, weight)| {
                let value = match (interval.avg_heart_rate, reserve) {
                    (Some(hr), Some(reserve)) if hr.is_finite() && hr > 0.0 => {
                        ((hr - resting) / reserve).clamp(0.0, 1.0) * 100.0
                    }
                    _ => NEUTRAL_SCORE,
                };
                value * weight
            })
            .sum();

        clamp_score(load)
    }

    /// Mechanical work proxy: implied erg power per kilogram against the
    /// reference for the workout's distance class.
    pub fn work_output(profile: &AthleteProfile, intervals: &[Interval]) -> f64 {
        let total_time: f64 = intervals.iter().map(|i| usable(i.time_seconds)).sum();
        let total_distance: f64 = intervals.iter().map(|i| usable(i.distance_metres)).sum();

        if total_time <= 0.0 || total_distance <= 0.0 {
            return 0.0;
        }

        let split = (total_time / total_distance * 500.0).max(MIN_SPLIT_SECONDS);
        let watts = split_to_watts(split);
        let weight = if profile.weight_kg.is_finite() {
            profile.weight_kg.max(MIN_WEIGHT_KG)
        } else {
            MIN_WEIGHT_KG
        };

        let class = DistanceClass::for_distance(total_distance);
        clamp_score(watts / weight / class.reference_wkg * 100.0)
    }

    /// Pace consistency across intervals.
    ///
    /// Starts from the coefficient of variation of per-interval splits and
    /// rewards negative splits (faster second half) while penalising fades.
    pub fn pacing(intervals: &[Interval]) -> f64 {
        let splits: Vec<f64> = intervals
            .iter()
            .filter_map(Interval::split_seconds)
            .filter(|s| s.is_finite())
            .collect();

        if splits.len() < 2 {
            return NEUTRAL_SCORE;
        }

        let mean = splits.iter().mean();
        if mean <= 0.0 {
            return NEUTRAL_SCORE;
        }
        let cv = splits.iter().population_std_dev() / mean;
        let base = 100.0 - cv * PACING_CV_PENALTY;

        let half = splits.len() / 2;
        let first_half = splits[..half].iter().mean();
        let second_half = splits[splits.len() - half..].iter().mean();
        let trend = ((first_half - second_half) / mean * PACING_TREND_SCALE)
            .clamp(-PACING_TREND_MAX_PENALTY, PACING_TREND_MAX_BONUS);

        clamp_score(base + trend)
    }

    /// Distance per stroke against the reference for the workout's distance
    /// class. Lower stroke rate at the same pace scores higher.
    pub fn economy(intervals: &[Interval]) -> f64 {
        let samples: Vec<(f64, f64)> = intervals
            .iter()
            .filter_map(|interval| {
                let rate = interval.stroke_rate.filter(|r| r.is_finite() && *r > 0.0)?;
                let speed = interval.speed().filter(|s| s.is_finite())?;
                Some((speed * 60.0 / rate, interval.time_seconds))
            })
            .collect();

        if samples.is_empty() {
            return NEUTRAL_SCORE;
        }

        let total_time: f64 = samples.iter().map(|(_, t)| t).sum();
        let dps = if total_time > 0.0 {
            samples.iter().map(|(dps, t)| dps * t).sum::<f64>() / total_time
        } else {
            samples.iter().map(|(dps, _)| *dps).sum::<f64>() / samples.len() as f64
        };

        let total_distance: f64 = intervals.iter().map(|i| usable(i.distance_metres)).sum();
        let class = DistanceClass::for_distance(total_distance);
        clamp_score((dps - class.dps_floor) / (class.dps_ceiling - class.dps_floor) * 100.0)
    }
}

/// Erg power for a split in seconds per 500 m
pub fn split_to_watts(split_seconds: f64) -> f64 {
    let pace_per_metre = split_seconds / 500.0;
    ERG_POWER_CONSTANT / pace_per_metre.powi(3)
}

/// Per-interval weights proportional to time; equal when no time was recorded
fn time_weights(intervals: &[Interval]) -> Vec<f64> {
    let total: f64 = intervals.iter().map(|i| usable(i.time_seconds)).sum();
    if total > 0.0 {
        intervals.iter().map(|i| usable(i.time_seconds) / total).collect()
    } else {
        let equal = 1.0 / intervals.len().max(1) as f64;
        vec![equal; intervals.len()]
    }
}

fn usable(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn clamp_score(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
