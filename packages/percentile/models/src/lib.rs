#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Percentile table and rank assignment types.
//!
//! A percentile table is a list of [`PercentileEntry`] values computed
//! together from one dataset. Each measured point is then placed in the
//! table and receives an [`AssignedRank`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of steps in a dense percentile table. Produces ranks
/// `0.001, 0.002, ..., 0.999`.
pub const DEFAULT_PERCENTILE_STEPS: u32 = 1000;

/// One row of a percentile table.
///
/// `rank` is the percentile in `(0, 1)`; `value` is the boundary such that
/// roughly `rank` of the dataset's values are `<=` it. For example
/// `rank = 0.86, value = 490` means 86% of values are at most 490.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileEntry {
    /// Percentile rank, strictly between 0 and 1.
    pub rank: f64,
    /// Boundary value for this rank.
    pub value: f64,
}

/// The percentile bucket a point was placed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rank", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignedRank {
    /// The point's value is `<=` the boundary of this rank, and greater
    /// than every lower boundary.
    Ranked(f64),
    /// The point's value exceeds every boundary in the table, so it sits
    /// above the highest computed percentile.
    AboveRange,
}

impl AssignedRank {
    /// The rank to show to users. [`Self::AboveRange`] displays as `1.0`
    /// (top rank), but that rank has no boundary in the table.
    #[must_use]
    pub const fn display_rank(self) -> f64 {
        match self {
            Self::Ranked(rank) => rank,
            Self::AboveRange => 1.0,
        }
    }

    /// The table rank, or `None` for [`Self::AboveRange`].
    #[must_use]
    pub const fn rank(self) -> Option<f64> {
        match self {
            Self::Ranked(rank) => Some(rank),
            Self::AboveRange => None,
        }
    }

    /// Whether the point sits above every computed percentile.
    #[must_use]
    pub const fn is_above_range(self) -> bool {
        matches!(self, Self::AboveRange)
    }
}

/// A value-bearing item that can be placed in a percentile table.
pub trait PercentilePoint {
    /// The measured value, if the item has one. Items without a value are
    /// excluded from table generation and left unranked.
    fn value(&self) -> Option<f64>;

    /// Records the rank this item was assigned.
    fn set_rank(&mut self, rank: AssignedRank);
}

/// How finely a dense percentile table is divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PercentileResolution {
    steps: u32,
}

impl PercentileResolution {
    /// Creates a resolution with `steps` divisions, producing ranks
    /// `1/steps .. (steps-1)/steps`.
    ///
    /// # Errors
    ///
    /// Returns an error if `steps < 2`, which would produce no ranks.
    pub const fn new(steps: u32) -> Result<Self, InvalidResolutionError> {
        if steps < 2 {
            return Err(InvalidResolutionError { steps });
        }
        Ok(Self { steps })
    }

    /// Number of divisions.
    #[must_use]
    pub const fn steps(self) -> u32 {
        self.steps
    }

    /// The requested ranks, ascending.
    #[must_use]
    pub fn ranks(self) -> Vec<f64> {
        (1..self.steps)
            .map(|i| f64::from(i) / f64::from(self.steps))
            .collect()
    }
}

impl Default for PercentileResolution {
    fn default() -> Self {
        Self {
            steps: DEFAULT_PERCENTILE_STEPS,
        }
    }
}

impl TryFrom<u32> for PercentileResolution {
    type Error = InvalidResolutionError;

    fn try_from(steps: u32) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl From<PercentileResolution> for u32 {
    fn from(resolution: PercentileResolution) -> Self {
        resolution.steps
    }
}

/// Error returned for a [`PercentileResolution`] with too few steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid percentile resolution {steps}: expected at least 2 steps")]
pub struct InvalidResolutionError {
    /// The rejected step count.
    pub steps: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resolution_has_999_ranks() {
        let ranks = PercentileResolution::default().ranks();
        assert_eq!(ranks.len(), 999);
        assert!((ranks[0] - 0.001).abs() < f64::EPSILON);
        assert!((ranks[998] - 0.999).abs() < f64::EPSILON);
    }

    #[test]
    fn ranks_are_strictly_inside_unit_interval() {
        for steps in [2, 3, 10, 100] {
            let ranks = PercentileResolution::new(steps).unwrap().ranks();
            assert_eq!(ranks.len(), steps as usize - 1);
            assert!(ranks.iter().all(|r| *r > 0.0 && *r < 1.0));
            assert!(ranks.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn rejects_degenerate_resolution() {
        assert_eq!(
            PercentileResolution::new(1),
            Err(InvalidResolutionError { steps: 1 })
        );
        assert!(PercentileResolution::new(0).is_err());
    }

    #[test]
    fn resolution_error_names_the_step_count() {
        let err: Box<dyn std::error::Error> = Box::new(InvalidResolutionError { steps: 1 });
        assert_eq!(
            err.to_string(),
            "invalid percentile resolution 1: expected at least 2 steps"
        );
    }

    #[test]
    fn above_range_displays_as_top_rank() {
        assert!((AssignedRank::AboveRange.display_rank() - 1.0).abs() < f64::EPSILON);
        assert_eq!(AssignedRank::AboveRange.rank(), None);
        assert!(AssignedRank::AboveRange.is_above_range());
        assert_eq!(AssignedRank::Ranked(0.25).rank(), Some(0.25));
    }

    #[test]
    fn assigned_rank_serializes_tagged() {
        let json = serde_json::to_value(AssignedRank::Ranked(0.5)).unwrap();
        assert_eq!(json["kind"], "RANKED");
        assert_eq!(json["rank"], 0.5);
        let json = serde_json::to_value(AssignedRank::AboveRange).unwrap();
        assert_eq!(json["kind"], "ABOVE_RANGE");
    }

    #[test]
    fn resolution_deserializes_from_integer() {
        let res: PercentileResolution = serde_json::from_str("100").unwrap();
        assert_eq!(res.steps(), 100);
        assert!(serde_json::from_str::<PercentileResolution>("1").is_err());
    }
}
