//! Effort zone classification
//!
//! Effort Points map onto four coarse training-intensity buckets. Buckets are
//! closed at the bottom and open at the top:
//! - Recovery: < 25
//! - Building: 25-49
//! - Training: 50-74
//! - Peak: >= 75

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lower bound of the building zone
pub const BUILDING_MIN: f64 = 25.0;
/// Lower bound of the training zone
pub const TRAINING_MIN: f64 = 50.0;
/// Lower bound of the peak zone
pub const PEAK_MIN: f64 = 75.0;

/// Training-intensity bucket derived from Effort Points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortZone {
    Recovery,
    Building,
    Training,
    Peak,
}

impl EffortZone {
    /// Classify an Effort Points value.
    ///
    /// A value exactly on a boundary belongs to the higher bucket, anything
    /// below it to the lower one.
    pub fn from_points(points: f64) -> Self {
        match points {
            p if p >= PEAK_MIN => EffortZone::Peak,
            p if p >= TRAINING_MIN => EffortZone::Training,
            p if p >= BUILDING_MIN => EffortZone::Building,
            _ => EffortZone::Recovery,
        }
    }

    /// Wire label
    pub fn as_str(&self) -> &'static str {
        match self {
            EffortZone::Recovery => "recovery",
            EffortZone::Building => "building",
            EffortZone::Training => "training",
            EffortZone::Peak => "peak",
        }
    }

    /// Short description for display
    pub fn description(&self) -> &'static str {
        match self {
            EffortZone::Recovery => "Easy session that supports recovery",
            EffortZone::Building => "Aerobic work building your base",
            EffortZone::Training => "Solid training stimulus",
            EffortZone::Peak => "Maximal or near-maximal effort",
        }
    }

    /// Effort Points range covered by this zone, as `(min, max_exclusive)`
    pub fn range(&self) -> (f64, f64) {
        match self {
            EffortZone::Recovery => (0.0, BUILDING_MIN),
            EffortZone::Building => (BUILDING_MIN, TRAINING_MIN),
            EffortZone::Training => (TRAINING_MIN, PEAK_MIN),
            EffortZone::Peak => (PEAK_MIN, f64::INFINITY),
        }
    }
}

impl fmt::Display for EffortZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffortZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recovery" => Ok(EffortZone::Recovery),
            "building" => Ok(EffortZone::Building),
            "training" => Ok(EffortZone::Training),
            "peak" => Ok(EffortZone::Peak),
            _ => Err(format!("Invalid effort zone: {}", s)),
        }
    }
}
