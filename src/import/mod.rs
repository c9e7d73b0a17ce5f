//! Intake of submitted workouts
//!
//! Turns an untyped submission (manual entry or a vision model's JSON guess)
//! into a validated measurement plus a well-typed interval list, rejecting
//! anything outside the accepted boundary ranges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InputRangeError;
use crate::models::{Interval, RawMeasurement, ValidatedMeasurement, WorkoutSource};

pub mod bounds;
pub mod validation;

pub use validation::FieldValidator;

/// Longest interval list accepted for one workout
pub const MAX_INTERVALS: usize = 200;

/// A workout as submitted by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSubmission {
    /// Athlete identifier
    pub user_id: String,

    /// Manual entry or screen extraction
    pub source: WorkoutSource,

    /// Summary fields
    pub measurement: RawMeasurement,

    /// Optional per-interval breakdown, untyped until parsed
    #[serde(default)]
    pub intervals: Option<Value>,

    /// When the workout was performed (defaults to submission time)
    #[serde(default)]
    pub achieved_at: Option<DateTime<Utc>>,
}

/// A submission that passed the boundary checks
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedWorkout {
    pub measurement: ValidatedMeasurement,
    pub intervals: Vec<Interval>,
}

/// Check, repair and type a submission.
///
/// Manual entries are range-checked before repair so the athlete sees exactly
/// what was wrong with what they typed. Extractions are repaired first, then
/// the repaired fields are checked.
pub fn accept(submission: &WorkoutSubmission) -> Result<AcceptedWorkout, InputRangeError> {
    let measurement = match submission.source {
        WorkoutSource::Manual => {
            bounds::check_manual(&submission.measurement)?;
            FieldValidator::repair(&submission.measurement)
        }
        WorkoutSource::Ocr => {
            let mut measurement = FieldValidator::repair(&submission.measurement);
            bounds::enforce_extracted(&mut measurement)?;
            measurement
        }
    };

    let intervals = match &submission.intervals {
        None | Some(Value::Null) => whole_workout_interval(&measurement)?,
        Some(payload) => parse_intervals(payload)?,
    };

    Ok(AcceptedWorkout {
        measurement,
        intervals,
    })
}

/// Model a workout without an interval breakdown as one interval spanning it
pub fn whole_workout_interval(
    measurement: &ValidatedMeasurement,
) -> Result<Vec<Interval>, InputRangeError> {
    Ok(vec![Interval {
        distance_metres: bounds::TOTAL_DISTANCE.require(measurement.total_distance_metres)?,
        time_seconds: bounds::TOTAL_TIME.require(measurement.total_time_seconds)?,
        avg_heart_rate: measurement.avg_heart_rate,
        stroke_rate: measurement.avg_stroke_rate,
    }])
}

/// Parse an untyped interval payload.
///
/// The payload must be an array of at most `MAX_INTERVALS` objects, each with
/// `distanceMetres` and `timeSeconds` and optionally `avgHeartRate` and
/// `strokeRate`. The first bad element is reported by index.
pub fn parse_intervals(payload: &Value) -> Result<Vec<Interval>, InputRangeError> {
    let elements = payload.as_array().ok_or(InputRangeError::NotAnArray {
        found: json_type_name(payload),
    })?;

    if elements.len() > MAX_INTERVALS {
        return Err(InputRangeError::TooManyIntervals {
            count: elements.len(),
            max: MAX_INTERVALS,
        });
    }

    elements
        .iter()
        .enumerate()
        .map(|(index, element)| parse_interval(index, element))
        .collect()
}

fn parse_interval(index: usize, element: &Value) -> Result<Interval, InputRangeError> {
    let malformed = |reason: String| InputRangeError::MalformedInterval { index, reason };

    let interval: Interval =
        serde_json::from_value(element.clone()).map_err(|e| malformed(e.to_string()))?;

    if !(interval.distance_metres.is_finite()
        && (0.0..=bounds::TOTAL_DISTANCE.max).contains(&interval.distance_metres))
    {
        return Err(malformed(format!(
            "distanceMetres={} is outside [0, {}]",
            interval.distance_metres,
            bounds::TOTAL_DISTANCE.max
        )));
    }
    bounds::TOTAL_TIME
        .check(interval.time_seconds)
        .map_err(|e| malformed(e.to_string()))?;
    bounds::AVG_HEART_RATE
        .check_optional(interval.avg_heart_rate)
        .map_err(|e| malformed(e.to_string()))?;
    bounds::STROKE_RATE
        .check_optional(interval.stroke_rate)
        .map_err(|e| malformed(e.to_string()))?;

    Ok(interval)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission(source: WorkoutSource, measurement: RawMeasurement) -> WorkoutSubmission {
        WorkoutSubmission {
            user_id: "athlete-1".to_string(),
            source,
            measurement,
            intervals: None,
            achieved_at: None,
        }
    }

    #[test]
    fn test_parse_intervals() {
        let payload = json!([
            {"distanceMetres": 500, "timeSeconds": 100, "avgHeartRate": 160, "strokeRate": 30},
            {"distanceMetres": 500, "timeSeconds": 98.5}
        ]);
        let intervals = parse_intervals(&payload).unwrap();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].avg_heart_rate, Some(160.0));
        assert_eq!(intervals[1].stroke_rate, None);
    }

    #[test]
    fn test_parse_intervals_rejects_non_array() {
        let err = parse_intervals(&json!({"distanceMetres": 500})).unwrap_err();
        assert_eq!(err, InputRangeError::NotAnArray { found: "object" });
    }

    #[test]
    fn test_parse_intervals_reports_bad_index() {
        let payload = json!([
            {"distanceMetres": 500, "timeSeconds": 100},
            {"distanceMetres": 500, "timeSeconds": "1:40"},
        ]);
        let err = parse_intervals(&payload).unwrap_err();
        assert!(matches!(err, InputRangeError::MalformedInterval { index: 1, .. }));

        let payload = json!([{"distanceMetres": 500, "timeSeconds": 0}]);
        let err = parse_intervals(&payload).unwrap_err();
        assert!(matches!(err, InputRangeError::MalformedInterval { index: 0, .. }));

        let payload = json!([{"distanceMetres": 500, "timeSeconds": 100, "watts": 300}]);
        assert!(parse_intervals(&payload).is_err());
    }

    #[test]
    fn test_parse_intervals_length_checked() {
        let element = json!({"distanceMetres": 100, "timeSeconds": 20});
        let payload = Value::Array(vec![element; MAX_INTERVALS + 1]);
        assert_eq!(
            parse_intervals(&payload).unwrap_err(),
            InputRangeError::TooManyIntervals {
                count: MAX_INTERVALS + 1,
                max: MAX_INTERVALS
            }
        );
    }

    #[test]
    fn test_accept_builds_whole_workout_interval() {
        let accepted = accept(&submission(
            WorkoutSource::Manual,
            RawMeasurement {
                total_time_seconds: Some(420.0),
                total_distance_metres: Some(2000.0),
                avg_heart_rate: Some(175.0),
                avg_stroke_rate: Some(32.0),
                ..RawMeasurement::default()
            },
        ))
        .unwrap();

        assert_eq!(accepted.intervals.len(), 1);
        assert_eq!(accepted.intervals[0].distance_metres, 2000.0);
        assert_eq!(accepted.intervals[0].time_seconds, 420.0);
        assert_eq!(accepted.intervals[0].avg_heart_rate, Some(175.0));
        assert_eq!(accepted.intervals[0].stroke_rate, Some(32.0));
    }

    #[test]
    fn test_accept_manual_rejects_before_repair() {
        let err = accept(&submission(
            WorkoutSource::Manual,
            RawMeasurement {
                total_time_seconds: Some(420.0),
                total_distance_metres: Some(0.0),
                ..RawMeasurement::default()
            },
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            InputRangeError::OutOfRange {
                field: "totalDistanceMetres",
                ..
            }
        ));
    }

    #[test]
    fn test_accept_ocr_repairs_before_checking() {
        let accepted = accept(&submission(
            WorkoutSource::Ocr,
            RawMeasurement {
                total_time_seconds: Some(105.0),
                avg_split_seconds: Some(540.0),
                confidence: Some(90),
                ..RawMeasurement::default()
            },
        ))
        .unwrap();

        assert!(accepted.measurement.was_swapped);
        assert_eq!(accepted.intervals[0].time_seconds, 540.0);
        assert_eq!(accepted.intervals[0].distance_metres, 2570.0);
    }

    #[test]
    fn test_explicit_empty_intervals_kept_empty() {
        let mut sub = submission(
            WorkoutSource::Manual,
            RawMeasurement {
                total_time_seconds: Some(420.0),
                total_distance_metres: Some(2000.0),
                ..RawMeasurement::default()
            },
        );
        sub.intervals = Some(json!([]));
        assert!(accept(&sub).unwrap().intervals.is_empty());
    }
}
