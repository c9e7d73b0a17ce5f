//! Boundary ranges for submitted workout fields
//!
//! These mirror the accepted ranges of the existing product exactly. A
//! violation is an `InputRangeError` and the request is rejected; repair of
//! extraction mistakes happens in `validation`, not here.

use crate::error::InputRangeError;
use crate::models::{RawMeasurement, ValidatedMeasurement};

/// Accepted numeric range for one field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldBounds {
    pub field: &'static str,
    pub min: f64,
    pub max: f64,
    /// Whether `min` itself is accepted
    pub min_inclusive: bool,
}

pub const TOTAL_TIME: FieldBounds = FieldBounds {
    field: "totalTimeSeconds",
    min: 0.0,
    max: 86_400.0,
    min_inclusive: false,
};

pub const TOTAL_DISTANCE: FieldBounds = FieldBounds {
    field: "totalDistanceMetres",
    min: 0.0,
    max: 100_000.0,
    min_inclusive: false,
};

pub const STROKE_RATE: FieldBounds = FieldBounds {
    field: "avgStrokeRate",
    min: 10.0,
    max: 60.0,
    min_inclusive: true,
};

pub const AVG_HEART_RATE: FieldBounds = FieldBounds {
    field: "avgHeartRate",
    min: 30.0,
    max: 250.0,
    min_inclusive: true,
};

pub const MAX_HEART_RATE: FieldBounds = FieldBounds {
    field: "maxHeartRate",
    min: 30.0,
    max: 250.0,
    min_inclusive: true,
};

pub const CONFIDENCE: FieldBounds = FieldBounds {
    field: "confidence",
    min: 0.0,
    max: 100.0,
    min_inclusive: true,
};

impl FieldBounds {
    pub fn contains(&self, value: f64) -> bool {
        let above_min = if self.min_inclusive {
            value >= self.min
        } else {
            value > self.min
        };
        value.is_finite() && above_min && value <= self.max
    }

    /// Range in interval notation, e.g. `(0, 86400]`
    pub fn label(&self) -> String {
        format!(
            "{}{}, {}]",
            if self.min_inclusive { '[' } else { '(' },
            self.min,
            self.max
        )
    }

    /// Check a present value
    pub fn check(&self, value: f64) -> Result<f64, InputRangeError> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(InputRangeError::OutOfRange {
                field: self.field,
                value,
                range: self.label(),
            })
        }
    }

    /// Check a field that must be present
    pub fn require(&self, value: Option<f64>) -> Result<f64, InputRangeError> {
        let value = value.ok_or(InputRangeError::MissingField { field: self.field })?;
        self.check(value)
    }

    /// Check a field only when present
    pub fn check_optional(&self, value: Option<f64>) -> Result<(), InputRangeError> {
        match value {
            Some(v) => self.check(v).map(|_| ()),
            None => Ok(()),
        }
    }
}

/// Check a manually entered measurement before any repair
pub fn check_manual(raw: &RawMeasurement) -> Result<(), InputRangeError> {
    TOTAL_TIME.require(raw.total_time_seconds)?;
    TOTAL_DISTANCE.require(raw.total_distance_metres)?;
    STROKE_RATE.check_optional(raw.avg_stroke_rate)?;
    AVG_HEART_RATE.check_optional(raw.avg_heart_rate)?;
    MAX_HEART_RATE.check_optional(raw.max_heart_rate)?;
    CONFIDENCE.check_optional(raw.confidence.map(f64::from))?;
    Ok(())
}

/// Check a repaired extraction.
///
/// Time and distance must be usable after repair. Optional readings outside
/// the accepted ranges are dropped with a warning rather than failing the
/// whole extraction.
pub fn enforce_extracted(measurement: &mut ValidatedMeasurement) -> Result<(), InputRangeError> {
    TOTAL_TIME.require(measurement.total_time_seconds)?;
    TOTAL_DISTANCE.require(measurement.total_distance_metres)?;

    let optional = [
        (STROKE_RATE, &mut measurement.avg_stroke_rate),
        (AVG_HEART_RATE, &mut measurement.avg_heart_rate),
        (MAX_HEART_RATE, &mut measurement.max_heart_rate),
    ];
    for (bounds, slot) in optional {
        if let Some(value) = *slot {
            if !bounds.contains(value) {
                *slot = None;
                measurement.warnings.push(format!(
                    "{} {} is outside {} and was dropped",
                    bounds.field,
                    value,
                    bounds.label()
                ));
            }
        }
    }
    Ok(())
}
