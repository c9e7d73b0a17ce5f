//! Repair of erg-screen measurements
//!
//! Vision extraction confuses the total elapsed time with the per-500m split
//! (both are `M:SS` displays of similar shape) and often reads 0 distance for
//! time-based pieces. `FieldValidator` reconciles a raw field set against the
//! physical constraints of erg output. It never rejects input: every concern
//! lowers the confidence and adds a warning, and the caller decides what to
//! surface.
//!
//! Rules run in a fixed order and later rules see the effects of earlier ones.
//! Confidence is only ever capped (`min(current, cap)`), so the final value
//! reflects the single worst concern.

use crate::models::{RawMeasurement, ValidatedMeasurement};

/// Total time below this (seconds) looks like a split
pub const SHORT_TOTAL_TIME_SECONDS: f64 = 120.0;
/// Split above this (seconds per 500 m) looks like a total time
pub const SLOW_SPLIT_SECONDS: f64 = 200.0;
/// Relative distance mismatch tolerated before flagging
pub const DISTANCE_MISMATCH_TOLERANCE: f64 = 0.15;
/// Plausible average heart rate, inclusive
pub const HEART_RATE_RANGE: (f64, f64) = (40.0, 220.0);
/// Plausible average stroke rate, inclusive
pub const STROKE_RATE_RANGE: (f64, f64) = (14.0, 50.0);

/// Confidence when the extractor supplied none and no rule fired
pub const DEFAULT_CONFIDENCE: u8 = 80;

const SWAP_SUSPECTED_CAP: u8 = 30;
const SWAPPED_CAP: u8 = 60;
const DISTANCE_MISMATCH_CAP: u8 = 50;
const IMPLAUSIBLE_SENSOR_CAP: u8 = 70;

/// Stateless repair of raw workout fields
pub struct FieldValidator;

impl FieldValidator {
    /// Repair a raw measurement into a validated one
    pub fn repair(raw: &RawMeasurement) -> ValidatedMeasurement {
        let mut repair = Repair::new(raw);

        repair.flag_short_total_time();
        repair.flag_slow_split();
        repair.swap_time_and_split();
        repair.estimate_distance();
        repair.check_distance_consistency();
        repair.discard_implausible_heart_rate();
        repair.flag_implausible_stroke_rate();

        repair.finish()
    }
}

/// Working state while the rules run
struct Repair {
    fields: ValidatedMeasurement,
    confidence: Option<u8>,
}

impl Repair {
    fn new(raw: &RawMeasurement) -> Self {
        Self {
            fields: ValidatedMeasurement {
                total_time_seconds: finite(raw.total_time_seconds),
                total_distance_metres: finite(raw.total_distance_metres),
                avg_split_seconds: finite(raw.avg_split_seconds),
                avg_heart_rate: finite(raw.avg_heart_rate),
                max_heart_rate: finite(raw.max_heart_rate),
                avg_stroke_rate: finite(raw.avg_stroke_rate),
                confidence: DEFAULT_CONFIDENCE,
                warnings: Vec::new(),
                was_swapped: false,
                distance_estimated: false,
            },
            confidence: raw.confidence.map(|c| c.min(100)),
        }
    }

    fn cap(&mut self, limit: u8) {
        self.confidence = Some(self.confidence.map_or(limit, |c| c.min(limit)));
    }

    fn warn(&mut self, message: String) {
        self.fields.warnings.push(message);
    }

    fn flag_short_total_time(&mut self) {
        if let Some(time) = self.fields.total_time_seconds {
            if time < SHORT_TOTAL_TIME_SECONDS {
                self.cap(SWAP_SUSPECTED_CAP);
                self.warn(format!(
                    "Total time {:.1}s is under {:.0}s; it may be the split",
                    time, SHORT_TOTAL_TIME_SECONDS
                ));
            }
        }
    }

    fn flag_slow_split(&mut self) {
        if let Some(split) = self.fields.avg_split_seconds {
            if split > SLOW_SPLIT_SECONDS {
                self.cap(SWAP_SUSPECTED_CAP);
                self.warn(format!(
                    "Split {:.1}s/500m is over {:.0}s; it may be the total time",
                    split, SLOW_SPLIT_SECONDS
                ));
            }
        }
    }

    fn swap_time_and_split(&mut self) {
        if let (Some(time), Some(split)) =
            (self.fields.total_time_seconds, self.fields.avg_split_seconds)
        {
            if split > time {
                self.fields.total_time_seconds = Some(split);
                self.fields.avg_split_seconds = Some(time);
                self.fields.was_swapped = true;
                self.cap(SWAPPED_CAP);
                self.warn(format!(
                    "Split {:.1}s was longer than total time {:.1}s; values swapped",
                    split, time
                ));
            }
        }
    }

    fn estimate_distance(&mut self) {
        let missing = self
            .fields
            .total_distance_metres
            .map_or(true, |d| d == 0.0);
        if !missing {
            return;
        }

        if let Some(expected) = self.expected_distance() {
            let estimate = round_to_ten(expected);
            self.fields.total_distance_metres = Some(estimate);
            self.fields.distance_estimated = true;
            self.warn(format!(
                "Distance missing; estimated {:.0}m from time and split",
                estimate
            ));
        }
    }

    fn check_distance_consistency(&mut self) {
        let (Some(distance), Some(expected)) =
            (self.fields.total_distance_metres, self.expected_distance())
        else {
            return;
        };

        if expected > 0.0 && (distance - expected).abs() / expected > DISTANCE_MISMATCH_TOLERANCE {
            self.cap(DISTANCE_MISMATCH_CAP);
            self.warn(format!(
                "Distance {:.0}m does not match time and split (expected about {:.0}m)",
                distance, expected
            ));
        }
    }

    fn discard_implausible_heart_rate(&mut self) {
        if let Some(hr) = self.fields.avg_heart_rate {
            if !in_range(hr, HEART_RATE_RANGE) {
                self.fields.avg_heart_rate = None;
                self.cap(IMPLAUSIBLE_SENSOR_CAP);
                self.warn(format!(
                    "Average heart rate {:.0} bpm is implausible and was discarded",
                    hr
                ));
            }
        }
    }

    fn flag_implausible_stroke_rate(&mut self) {
        if let Some(rate) = self.fields.avg_stroke_rate {
            if !in_range(rate, STROKE_RATE_RANGE) {
                self.cap(IMPLAUSIBLE_SENSOR_CAP);
                self.warn(format!("Stroke rate {:.0} spm is unusual", rate));
            }
        }
    }

    /// `(time / split) * 500` when both are known and positive
    fn expected_distance(&self) -> Option<f64> {
        match (self.fields.total_time_seconds, self.fields.avg_split_seconds) {
            (Some(time), Some(split)) if split > 0.0 && time > 0.0 => Some(time / split * 500.0),
            _ => None,
        }
    }

    fn finish(mut self) -> ValidatedMeasurement {
        self.fields.confidence = self.confidence.unwrap_or(DEFAULT_CONFIDENCE);
        self.fields
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn in_range(value: f64, (min, max): (f64, f64)) -> bool {
    (min..=max).contains(&value)
}

fn round_to_ten(metres: f64) -> f64 {
    (metres / 10.0).round() * 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawMeasurement {
        RawMeasurement::default()
    }

    #[test]
    fn test_swapped_time_and_split_repaired() {
        let input = RawMeasurement {
            total_time_seconds: Some(105.0),
            avg_split_seconds: Some(540.0),
            total_distance_metres: None,
            ..raw()
        };

        let out = FieldValidator::repair(&input);

        assert_eq!(out.total_time_seconds, Some(540.0));
        assert_eq!(out.avg_split_seconds, Some(105.0));
        assert!(out.was_swapped);
        assert!(out.confidence <= 60);
        assert_eq!(out.confidence, 30);
        assert_eq!(out.total_distance_metres, Some(2570.0));
        assert!(out.distance_estimated);
    }

    #[test]
    fn test_clean_measurement_gets_default_confidence() {
        let input = RawMeasurement {
            total_time_seconds: Some(420.0),
            avg_split_seconds: Some(105.0),
            total_distance_metres: Some(2000.0),
            avg_heart_rate: Some(172.0),
            avg_stroke_rate: Some(30.0),
            ..raw()
        };

        let out = FieldValidator::repair(&input);

        assert_eq!(out.confidence, DEFAULT_CONFIDENCE);
        assert!(out.warnings.is_empty());
        assert!(!out.was_swapped);
        assert!(!out.distance_estimated);
    }

    #[test]
    fn test_confidence_never_raised() {
        let input = RawMeasurement {
            total_time_seconds: Some(420.0),
            avg_split_seconds: Some(105.0),
            total_distance_metres: Some(2000.0),
            confidence: Some(95),
            ..raw()
        };
        assert_eq!(FieldValidator::repair(&input).confidence, 95);

        let input = RawMeasurement {
            confidence: Some(20),
            avg_heart_rate: Some(300.0),
            ..raw()
        };
        assert_eq!(FieldValidator::repair(&input).confidence, 20);
    }

    #[test]
    fn test_implausible_heart_rate_discarded() {
        let input = RawMeasurement {
            avg_heart_rate: Some(300.0),
            ..raw()
        };

        let out = FieldValidator::repair(&input);

        assert_eq!(out.avg_heart_rate, None);
        assert!(out.confidence <= 70);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_unusual_stroke_rate_kept() {
        let input = RawMeasurement {
            avg_stroke_rate: Some(8.0),
            ..raw()
        };

        let out = FieldValidator::repair(&input);

        assert_eq!(out.avg_stroke_rate, Some(8.0));
        assert_eq!(out.confidence, 70);
    }

    #[test]
    fn test_distance_mismatch_kept_but_flagged() {
        let input = RawMeasurement {
            total_time_seconds: Some(420.0),
            avg_split_seconds: Some(105.0),
            total_distance_metres: Some(5000.0),
            ..raw()
        };

        let out = FieldValidator::repair(&input);

        assert_eq!(out.total_distance_metres, Some(5000.0));
        assert_eq!(out.confidence, 50);
        assert!(out.warnings[0].contains("2000"));
    }

    #[test]
    fn test_distance_within_tolerance_not_flagged() {
        let input = RawMeasurement {
            total_time_seconds: Some(420.0),
            avg_split_seconds: Some(105.0),
            total_distance_metres: Some(2200.0),
            ..raw()
        };
        assert_eq!(FieldValidator::repair(&input).confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_zero_distance_estimated() {
        let input = RawMeasurement {
            total_time_seconds: Some(1800.0),
            avg_split_seconds: Some(120.0),
            total_distance_metres: Some(0.0),
            ..raw()
        };

        let out = FieldValidator::repair(&input);

        assert_eq!(out.total_distance_metres, Some(7500.0));
        assert!(out.distance_estimated);
        assert_eq!(out.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_short_time_without_split_is_evidence_only() {
        let input = RawMeasurement {
            total_time_seconds: Some(95.0),
            total_distance_metres: Some(500.0),
            ..raw()
        };

        let out = FieldValidator::repair(&input);

        assert_eq!(out.total_time_seconds, Some(95.0));
        assert!(!out.was_swapped);
        assert_eq!(out.confidence, 30);
    }

    #[test]
    fn test_empty_measurement() {
        let out = FieldValidator::repair(&raw());
        assert_eq!(out.confidence, DEFAULT_CONFIDENCE);
        assert!(out.warnings.is_empty());
        assert_eq!(out.total_distance_metres, None);
    }

    // Property-based tests using proptest
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_split_never_exceeds_time(
            time in proptest::option::of(1.0f64..10000.0),
            split in proptest::option::of(1.0f64..10000.0),
            distance in proptest::option::of(0.0f64..50000.0),
            hr in proptest::option::of(0.0f64..400.0),
            rate in proptest::option::of(0.0f64..100.0),
            confidence in proptest::option::of(0u8..=100),
        ) {
            let input = RawMeasurement {
                total_time_seconds: time,
                total_distance_metres: distance,
                avg_split_seconds: split,
                avg_heart_rate: hr,
                max_heart_rate: None,
                avg_stroke_rate: rate,
                confidence,
            };

            let out = FieldValidator::repair(&input);

            if let (Some(t), Some(s)) = (out.total_time_seconds, out.avg_split_seconds) {
                prop_assert!(s <= t);
            }
            if let (Some(t), Some(s)) = (time, split) {
                prop_assert_eq!(out.was_swapped, s > t);
            }
            prop_assert!(out.confidence <= confidence.unwrap_or(DEFAULT_CONFIDENCE));
            if let Some(hr) = out.avg_heart_rate {
                prop_assert!((40.0..=220.0).contains(&hr));
            }
        }
    }
}
