use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::effort::EffortResult;
use crate::personal_best::PbCategory;

/// Where a workout's numbers came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutSource {
    /// Typed in by the athlete
    Manual,
    /// Extracted from a photo of the erg display by a vision model
    Ocr,
}

impl WorkoutSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkoutSource::Manual => "manual",
            WorkoutSource::Ocr => "ocr",
        }
    }
}

/// Untrusted workout fields as typed in or extracted from an erg screen.
///
/// Nothing is guaranteed here: fields may be missing, swapped or contradictory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMeasurement {
    /// Total elapsed time in seconds (or an erg display string such as `7:00.0`)
    #[serde(default, deserialize_with = "erg_time_serde::deserialize")]
    pub total_time_seconds: Option<f64>,

    /// Total distance in metres
    pub total_distance_metres: Option<f64>,

    /// Average pace in seconds per 500 m (or an erg display string such as `1:45.0`)
    #[serde(default, deserialize_with = "erg_time_serde::deserialize")]
    pub avg_split_seconds: Option<f64>,

    /// Average heart rate in beats per minute
    pub avg_heart_rate: Option<f64>,

    /// Maximum heart rate in beats per minute
    pub max_heart_rate: Option<f64>,

    /// Average stroke rate in strokes per minute
    pub avg_stroke_rate: Option<f64>,

    /// Extractor-supplied confidence, 0-100
    pub confidence: Option<u8>,
}

/// A raw measurement after the field validator has repaired it.
///
/// When both time and split are present, `avg_split_seconds <= total_time_seconds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedMeasurement {
    pub total_time_seconds: Option<f64>,
    pub total_distance_metres: Option<f64>,
    pub avg_split_seconds: Option<f64>,
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub avg_stroke_rate: Option<f64>,

    /// 0-100, never higher than the input confidence (or 80 when none was given)
    pub confidence: u8,

    /// Human-readable notes on every concern found
    pub warnings: Vec<String>,

    /// Time and split were exchanged
    pub was_swapped: bool,

    /// Distance was derived from time and split
    pub distance_estimated: bool,
}

/// Athlete physiology used by the effort engine.
///
/// Callers fill in defaults when values are unknown; the engine treats every
/// value as real input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AthleteProfile {
    pub age_years: u16,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub max_hr: u16,
    pub resting_hr: u16,
}

impl Default for AthleteProfile {
    fn default() -> Self {
        Self {
            age_years: 30,
            weight_kg: 75.0,
            height_cm: 180.0,
            max_hr: 190,
            resting_hr: 50,
        }
    }
}

impl AthleteProfile {
    /// Max heart rate to use for intensity ratios.
    ///
    /// Falls back to the age-predicted `220 - age` when the stated max does not
    /// exceed resting heart rate.
    pub fn effective_max_hr(&self) -> f64 {
        if self.max_hr > self.resting_hr {
            f64::from(self.max_hr)
        } else {
            220.0 - f64::from(self.age_years.min(120))
        }
    }

    /// Heart-rate reserve, or `None` when it is not positive
    pub fn heart_rate_reserve(&self) -> Option<f64> {
        let reserve = self.effective_max_hr() - f64::from(self.resting_hr);
        (reserve > 0.0).then_some(reserve)
    }
}

/// One timed effort segment, in chronological order within a workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Interval {
    pub distance_metres: f64,
    pub time_seconds: f64,
    #[serde(default)]
    pub avg_heart_rate: Option<f64>,
    #[serde(default)]
    pub stroke_rate: Option<f64>,
}

impl Interval {
    /// Seconds per 500 m, or `None` when distance or time is not positive
    pub fn split_seconds(&self) -> Option<f64> {
        (self.distance_metres > 0.0 && self.time_seconds > 0.0)
            .then(|| self.time_seconds / self.distance_metres * 500.0)
    }

    /// Metres per second, or `None` when distance or time is not positive
    pub fn speed(&self) -> Option<f64> {
        (self.distance_metres > 0.0 && self.time_seconds > 0.0)
            .then(|| self.distance_metres / self.time_seconds)
    }
}

/// A workout that has been validated and scored, ready for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredWorkout {
    /// Unique identifier for the workout
    pub id: String,

    /// Athlete identifier
    pub user_id: String,

    /// Manual entry or screen extraction
    pub source: WorkoutSource,

    /// Repaired measurement with confidence and warnings
    pub measurement: ValidatedMeasurement,

    /// Segments the effort was computed from
    pub intervals: Vec<Interval>,

    /// Legacy score and Effort Points
    pub effort: EffortResult,

    /// Canonical race distance this workout counts towards, if any
    pub category: Option<PbCategory>,

    /// Set when this workout produced a new personal best
    pub is_personal_best: bool,

    /// When the workout was performed
    pub achieved_at: DateTime<Utc>,
}

impl ScoredWorkout {
    /// Total elapsed time as measured, or the interval sum when the
    /// measurement carries none
    pub fn total_time_seconds(&self) -> f64 {
        self.measurement
            .total_time_seconds
            .unwrap_or_else(|| self.intervals.iter().map(|i| i.time_seconds).sum())
    }

    /// Total distance as measured, or the interval sum when the measurement
    /// carries none
    pub fn total_distance_metres(&self) -> f64 {
        self.measurement
            .total_distance_metres
            .unwrap_or_else(|| self.intervals.iter().map(|i| i.distance_metres).sum())
    }
}

/// Format seconds as an erg-style `M:SS.t` display
pub fn format_erg_time(seconds: f64) -> String {
    let tenths = (seconds.max(0.0) * 10.0).round() as u64;
    let hours = tenths / 36_000;
    let minutes = (tenths / 600) % 60;
    let secs = (tenths / 10) % 60;
    let tenth = tenths % 10;
    if hours > 0 {
        format!("{}:{:02}:{:02}.{}", hours, minutes, secs, tenth)
    } else {
        format!("{}:{:02}.{}", minutes, secs, tenth)
    }
}

/// Parse an erg display time (`1:45.3`, `7:00`, `1:02:03.4` or plain seconds)
pub fn parse_erg_time(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut total = 0.0;
    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    for (idx, part) in parts.iter().enumerate() {
        let value: f64 = part.parse().ok()?;
        if !value.is_finite() || value < 0.0 || (idx > 0 && value >= 60.0) {
            return None;
        }
        total = total * 60.0 + value;
    }
    Some(total)
}

// Time fields accept seconds or the display string read off the erg screen
mod erg_time_serde {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TimeField {
        Seconds(f64),
        Display(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<TimeField>::deserialize(deserializer)? {
            None => Ok(None),
            Some(TimeField::Seconds(seconds)) => Ok(Some(seconds)),
            Some(TimeField::Display(text)) => super::parse_erg_time(&text)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid erg time {:?}", text))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_max_hr_falls_back_to_age() {
        let profile = AthleteProfile {
            max_hr: 0,
            ..AthleteProfile::default()
        };
        assert_eq!(profile.effective_max_hr(), 190.0);

        let profile = AthleteProfile {
            age_years: 40,
            max_hr: 60,
            resting_hr: 60,
            ..AthleteProfile::default()
        };
        assert_eq!(profile.effective_max_hr(), 180.0);
        assert_eq!(profile.heart_rate_reserve(), Some(120.0));
    }

    #[test]
    fn test_interval_split() {
        let interval = Interval {
            distance_metres: 2000.0,
            time_seconds: 420.0,
            avg_heart_rate: None,
            stroke_rate: None,
        };
        assert_eq!(interval.split_seconds(), Some(105.0));

        let empty = Interval {
            distance_metres: 0.0,
            ..interval
        };
        assert_eq!(empty.split_seconds(), None);
        assert_eq!(empty.speed(), None);
    }

    #[test]
    fn test_erg_time_formatting() {
        assert_eq!(format_erg_time(105.0), "1:45.0");
        assert_eq!(format_erg_time(420.34), "7:00.3");
        assert_eq!(format_erg_time(3723.4), "1:02:03.4");
    }

    #[test]
    fn test_erg_time_parsing() {
        let split = parse_erg_time("1:45.3").unwrap();
        assert!((split - 105.3).abs() < 1e-9);
        assert_eq!(parse_erg_time("7:00"), Some(420.0));
        assert_eq!(parse_erg_time("1:02:03"), Some(3723.0));
        assert_eq!(parse_erg_time("95"), Some(95.0));
        assert_eq!(parse_erg_time("1:75"), None);
        assert_eq!(parse_erg_time("abc"), None);
        assert_eq!(parse_erg_time(""), None);
    }

    #[test]
    fn test_raw_measurement_uses_camel_case() {
        let raw: RawMeasurement = serde_json::from_str(
            r#"{"totalTimeSeconds": 105, "avgSplitSeconds": 540, "totalDistanceMetres": null}"#,
        )
        .unwrap();
        assert_eq!(raw.total_time_seconds, Some(105.0));
        assert_eq!(raw.avg_split_seconds, Some(540.0));
        assert_eq!(raw.total_distance_metres, None);
        assert_eq!(raw.confidence, None);
    }

    #[test]
    fn test_raw_measurement_accepts_display_times() {
        let raw: RawMeasurement = serde_json::from_str(
            r#"{"totalTimeSeconds": "7:00.0", "avgSplitSeconds": "1:45", "totalDistanceMetres": 2000}"#,
        )
        .unwrap();
        assert_eq!(raw.total_time_seconds, Some(420.0));
        assert_eq!(raw.avg_split_seconds, Some(105.0));

        let raw: RawMeasurement = serde_json::from_str(r#"{"avgSplitSeconds": null}"#).unwrap();
        assert_eq!(raw.total_time_seconds, None);
        assert_eq!(raw.avg_split_seconds, None);

        assert!(serde_json::from_str::<RawMeasurement>(r#"{"totalTimeSeconds": "7:xx"}"#).is_err());
    }
}
