#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Exclusive-percentile engine.
//!
//! Percentiles use the "third variant" definition recommended by NIST,
//! equivalent to Excel's `PERCENTILE.EXC`: a percentile `p` maps to the
//! 1-based rank `p * (N + 1)`, clamped to the first and last samples, and
//! values between two samples are linearly interpolated. `p = 0` and
//! `p = 1` are undefined under this scheme.
//!
//! See <https://en.wikipedia.org/wiki/Percentile#Third_variant>.

use std::cmp::Ordering;

use health_map_percentile_models::{
    AssignedRank, PercentileEntry, PercentilePoint, PercentileResolution,
};
use thiserror::Error;

/// Tolerance used when matching a rank against table entries.
const RANK_TOLERANCE: f64 = 1e-9;

/// Errors that can occur during percentile computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PercentileError {
    /// The requested percentile is outside `(0, 1)` or there are no values
    /// to draw from. Always fatal for the dataset being computed.
    #[error("Percentile bounds error: {message}")]
    Bounds {
        /// Description of what went wrong.
        message: String,
    },
}

/// Returns the 1-based rank `x` of percentile `p` in a sample of size `n`.
///
/// The result is real-valued: a fractional rank means the percentile value
/// lies between two samples. Requests at or below `1 / (n + 1)` clamp to
/// rank 1; requests at or above `n / (n + 1)` clamp to rank `n`. For
/// `n = 0` every valid `p` yields 1.
///
/// # Errors
///
/// Returns [`PercentileError::Bounds`] unless `0 < p < 1`.
pub fn rank(percentile: f64, sample_size: usize) -> Result<f64, PercentileError> {
    if !(percentile > 0.0 && percentile < 1.0) {
        return Err(PercentileError::Bounds {
            message: format!(
                "Cannot calculate percentile rank for p = {percentile} (must be strictly between 0 and 1)"
            ),
        });
    }

    #[allow(clippy::cast_precision_loss)]
    let n = sample_size as f64;
    let lower_bound = 1.0 / (n + 1.0);
    let upper_bound = n / (n + 1.0);

    if percentile <= lower_bound {
        Ok(1.0)
    } else if percentile >= upper_bound {
        Ok(n)
    } else {
        Ok(percentile * (n + 1.0))
    }
}

/// Returns the value at percentile `p` of `sorted_values`, which must be
/// sorted ascending.
///
/// # Errors
///
/// Returns [`PercentileError::Bounds`] if `sorted_values` is empty or `p`
/// is not strictly between 0 and 1.
pub fn percentile_value(percentile: f64, sorted_values: &[f64]) -> Result<f64, PercentileError> {
    let sample_size = sorted_values.len();
    if sample_size == 0 {
        return Err(PercentileError::Bounds {
            message: "Can't calculate percentile with no values".to_string(),
        });
    }

    let x = rank(percentile, sample_size)?;

    // rank is 1-based and always >= 1
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = x.floor() as usize - 1;
    let fraction = x % 1.0;

    #[allow(clippy::cast_precision_loss)]
    let n = sample_size as f64;
    if x >= n {
        // No element after the last one to interpolate towards.
        return Ok(sorted_values[index]);
    }

    let lower = sorted_values[index];
    let upper = sorted_values[index + 1];
    Ok(fraction.mul_add(upper - lower, lower))
}

/// Computes a `(rank, value)` entry for each requested rank.
///
/// `sorted_values` must be sorted ascending. Ranks are returned in the
/// order requested.
///
/// # Errors
///
/// Returns [`PercentileError::Bounds`] if `sorted_values` is empty or any
/// requested rank is not strictly between 0 and 1.
pub fn percentile_values(
    ranks: &[f64],
    sorted_values: &[f64],
) -> Result<Vec<PercentileEntry>, PercentileError> {
    ranks
        .iter()
        .map(|&rank| {
            Ok(PercentileEntry {
                rank,
                value: percentile_value(rank, sorted_values)?,
            })
        })
        .collect()
}

/// Computes the dense percentile table for a set of points.
///
/// Only points that carry a value contribute. Values are sorted once, then
/// each rank of `resolution` is evaluated, so the table's boundary values
/// are non-decreasing as rank increases.
///
/// # Errors
///
/// Returns [`PercentileError::Bounds`] if no point carries a value.
pub fn percentiles_for_points<P: PercentilePoint>(
    points: &[P],
    resolution: PercentileResolution,
) -> Result<Vec<PercentileEntry>, PercentileError> {
    let mut values: Vec<f64> = points.iter().filter_map(PercentilePoint::value).collect();
    values.sort_by(f64::total_cmp);

    log::debug!(
        "Computing {} percentiles from {} of {} points",
        resolution.steps() - 1,
        values.len(),
        points.len()
    );

    percentile_values(&resolution.ranks(), &values)
}

/// Orders points ascending by value; points without a value go last.
fn compare_points<P: PercentilePoint>(a: &P, b: &P) -> Ordering {
    match (a.value(), b.value()) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Assigns each point the rank of the first table entry whose boundary
/// value is `>=` the point's value.
///
/// Points are stable-sorted ascending by value in place, so callers observe
/// the order change. `table` must be non-decreasing in value (as produced
/// by [`percentiles_for_points`]); a single cursor then walks the table
/// once across all points. Points above every boundary receive
/// [`AssignedRank::AboveRange`]. Points without a value are left untouched.
pub fn assign_percentiles_to_points<P: PercentilePoint>(
    points: &mut [P],
    table: &[PercentileEntry],
) {
    points.sort_by(compare_points);

    let mut cursor = 0;
    let mut above_range = 0usize;
    for point in points.iter_mut() {
        let Some(value) = point.value() else {
            continue;
        };

        while cursor < table.len() && table[cursor].value < value {
            cursor += 1;
        }

        if let Some(entry) = table.get(cursor) {
            point.set_rank(AssignedRank::Ranked(entry.rank));
        } else {
            // Keep going: more than one point may sit above the table.
            above_range += 1;
            point.set_rank(AssignedRank::AboveRange);
        }
    }

    if above_range > 0 {
        log::debug!("{above_range} points lie above the highest computed percentile");
    }
}

/// Finds the rank for a single value by binary search.
///
/// Gives the same answer as [`assign_percentiles_to_points`] without
/// requiring the points to be sorted, at `O(log K)` per lookup. `table`
/// must be non-decreasing in value.
#[must_use]
pub fn rank_for_value(table: &[PercentileEntry], value: f64) -> AssignedRank {
    let idx = table.partition_point(|entry| entry.value < value);
    table
        .get(idx)
        .map_or(AssignedRank::AboveRange, |entry| {
            AssignedRank::Ranked(entry.rank)
        })
}

/// Looks up the boundary value for an assigned rank.
///
/// Returns `None` for [`AssignedRank::AboveRange`], which has no boundary,
/// and for ranks not present in the table.
#[must_use]
pub fn value_for_rank(table: &[PercentileEntry], rank: AssignedRank) -> Option<f64> {
    let wanted = rank.rank()?;
    table
        .iter()
        .find(|entry| (entry.rank - wanted).abs() < RANK_TOLERANCE)
        .map(|entry| entry.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct MockPoint {
        value: Option<f64>,
        rank: Option<AssignedRank>,
    }

    impl MockPoint {
        const fn new(value: f64) -> Self {
            Self {
                value: Some(value),
                rank: None,
            }
        }
    }

    impl PercentilePoint for MockPoint {
        fn value(&self) -> Option<f64> {
            self.value
        }

        fn set_rank(&mut self, rank: AssignedRank) {
            self.rank = Some(rank);
        }
    }

    fn is_sorted_by_value(points: &[MockPoint]) -> bool {
        points
            .windows(2)
            .all(|w| compare_points(&w[0], &w[1]) != Ordering::Greater)
    }

    fn hundredths() -> Vec<f64> {
        (1..100).map(|p| f64::from(p) / 100.0).collect()
    }

    // ── rank ────────────────────────────────────────────────────────

    #[test]
    fn zero_sample_size_always_ranks_first() {
        for p in 1..10 {
            let x = rank(f64::from(p) / 10.0, 0).unwrap();
            assert!((x - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn single_sample_always_ranks_first() {
        for p in hundredths() {
            assert!((rank(p, 1).unwrap() - 1.0).abs() < f64::EPSILON, "p = {p}");
        }
    }

    #[test]
    fn excluded_percentiles_are_errors() {
        assert!(matches!(rank(0.0, 100), Err(PercentileError::Bounds { .. })));
        assert!(matches!(rank(1.0, 100), Err(PercentileError::Bounds { .. })));
        assert!(rank(0.0, 0).is_err());
        assert!(rank(1.5, 10).is_err());
        assert!(rank(-0.1, 10).is_err());
        assert!(rank(f64::NAN, 10).is_err());
    }

    #[test]
    fn lower_boundary_is_inclusive() {
        let n = 2;
        assert!((rank(0.333, n).unwrap() - 1.0).abs() < f64::EPSILON);
        assert!((rank(0.334, n).unwrap() - 0.334 * 3.0).abs() < 1e-12);
    }

    #[test]
    fn upper_boundary_is_inclusive() {
        let n = 4;
        assert!((rank(0.80, n).unwrap() - 4.0).abs() < f64::EPSILON);
        assert!((rank(0.799, n).unwrap() - 0.799 * 5.0).abs() < 1e-12);
    }

    #[test]
    fn median_rank_is_midpoint() {
        for n in 1..14_u32 {
            let x = rank(0.5, n as usize).unwrap();
            let midpoint = f64::from(n + 1) / 2.0;
            assert!((x - midpoint).abs() < f64::EPSILON, "n = {n}");
        }
    }

    #[test]
    fn rank_is_monotonic_and_bounded() {
        for n in 1..30_u32 {
            let ranks: Vec<f64> = PercentileResolution::new(200)
                .unwrap()
                .ranks()
                .into_iter()
                .map(|p| rank(p, n as usize).unwrap())
                .collect();
            assert!(ranks.windows(2).all(|w| w[0] <= w[1]), "n = {n}");
            assert!(
                ranks.iter().all(|x| *x >= 1.0 && *x <= f64::from(n)),
                "n = {n}"
            );
        }
    }

    // ── percentile_value ────────────────────────────────────────────

    #[test]
    fn empty_list_is_an_error() {
        assert!(matches!(
            percentile_value(0.5, &[]),
            Err(PercentileError::Bounds { .. })
        ));
    }

    #[test]
    fn singleton_list_always_returns_its_value() {
        for p in hundredths() {
            assert!((percentile_value(p, &[20.0]).unwrap() - 20.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn two_element_list_clamps_then_interpolates() {
        let double = [1.0, 2.0];
        for p in hundredths() {
            let expected = if p <= 1.0 / 3.0 {
                1.0
            } else if p >= 2.0 / 3.0 {
                2.0
            } else {
                1.0 + (p * 3.0) % 1.0
            };
            let result = percentile_value(p, &double).unwrap();
            assert!((result - expected).abs() < 1e-12, "p = {p}");
        }
    }

    #[test]
    fn median_of_consecutive_integers() {
        for n in 1..15_u32 {
            let values: Vec<f64> = (0..n).map(f64::from).collect();
            let mid = (n - 1) / 2;
            let expected = if n % 2 == 0 {
                f64::from(mid) + 0.5
            } else {
                f64::from(mid)
            };
            let result = percentile_value(0.5, &values).unwrap();
            assert!((result - expected).abs() < 1e-12, "n = {n}");
        }
    }

    #[test]
    fn identical_values_give_identical_percentiles() {
        let same = [42.0; 10];
        for p in 1..10 {
            let result = percentile_value(f64::from(p) / 10.0, &same).unwrap();
            assert!((result - 42.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn unit_spaced_values_interpolate_by_percentile() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        for i in 1..10_u32 {
            let p = f64::from(i) / 10.0;
            let result = percentile_value(p, &values).unwrap();
            assert!((result - (values[i as usize - 1] + p)).abs() < 1e-9, "p = {p}");
        }
    }

    // ── percentile_values ───────────────────────────────────────────

    #[test]
    fn percentile_values_requires_values() {
        assert!(percentile_values(&[0.5], &[]).is_err());
    }

    #[test]
    fn percentile_values_preserves_requested_order() {
        let ranks = [0.25, 0.75, 0.5];
        let table = percentile_values(&ranks, &[5.0]).unwrap();
        let got: Vec<f64> = table.iter().map(|e| e.rank).collect();
        assert_eq!(got, ranks);
        assert!(table.iter().all(|e| (e.value - 5.0).abs() < f64::EPSILON));
    }

    // ── tables and assignment ───────────────────────────────────────

    #[test]
    fn dense_table_is_non_decreasing() {
        let points: Vec<MockPoint> = [7.0, 3.0, 9.5, 1.0, 4.0, 4.0, 12.0]
            .into_iter()
            .map(MockPoint::new)
            .collect();
        let table = percentiles_for_points(&points, PercentileResolution::default()).unwrap();
        assert_eq!(table.len(), 999);
        assert!(table.windows(2).all(|w| w[0].value <= w[1].value));
    }

    #[test]
    fn table_requires_at_least_one_value() {
        let points = vec![MockPoint {
            value: None,
            rank: None,
        }];
        assert!(percentiles_for_points(&points, PercentileResolution::default()).is_err());
    }

    #[test]
    fn descending_points_end_sorted_and_ranked() {
        let mut points: Vec<MockPoint> = (1..=10).rev().map(|v| MockPoint::new(f64::from(v))).collect();
        let table = percentiles_for_points(&points, PercentileResolution::default()).unwrap();

        assign_percentiles_to_points(&mut points, &table);

        assert!(is_sorted_by_value(&points));
        assert!(points.iter().all(|p| p.rank.is_some()));
    }

    #[test]
    fn assigned_boundary_is_at_least_the_point_value() {
        let mut points: Vec<MockPoint> = [0.3, 0.1, 0.7, 0.2, 0.9, 0.55, 0.42, 0.8]
            .into_iter()
            .map(MockPoint::new)
            .collect();
        let table = percentiles_for_points(&points, PercentileResolution::default()).unwrap();
        assign_percentiles_to_points(&mut points, &table);

        for point in &points {
            let rank = point.rank.unwrap();
            match value_for_rank(&table, rank) {
                Some(boundary) => assert!(boundary >= point.value.unwrap()),
                None => assert!(rank.is_above_range()),
            }
        }
    }

    #[test]
    fn points_above_the_table_are_above_range() {
        let table = vec![
            PercentileEntry {
                rank: 0.25,
                value: 1.0,
            },
            PercentileEntry {
                rank: 0.75,
                value: 2.0,
            },
        ];
        let mut points = vec![MockPoint::new(5.0), MockPoint::new(1.5), MockPoint::new(3.0)];

        assign_percentiles_to_points(&mut points, &table);

        assert_eq!(points[0].rank, Some(AssignedRank::Ranked(0.75)));
        assert_eq!(points[1].rank, Some(AssignedRank::AboveRange));
        assert_eq!(points[2].rank, Some(AssignedRank::AboveRange));
        assert_eq!(value_for_rank(&table, AssignedRank::AboveRange), None);
    }

    #[test]
    fn points_without_values_are_left_unranked_and_last() {
        let table = vec![PercentileEntry {
            rank: 0.5,
            value: 10.0,
        }];
        let mut points = vec![
            MockPoint {
                value: None,
                rank: None,
            },
            MockPoint::new(4.0),
        ];

        assign_percentiles_to_points(&mut points, &table);

        assert_eq!(points[0].rank, Some(AssignedRank::Ranked(0.5)));
        assert_eq!(points[1].value, None);
        assert_eq!(points[1].rank, None);
    }

    #[test]
    fn binary_search_agrees_with_cursor_pass() {
        let values = [4.0, 8.0, 15.0, 16.0, 23.0, 42.0, 42.0, 7.5];
        let mut points: Vec<MockPoint> = values.into_iter().map(MockPoint::new).collect();
        let resolution = PercentileResolution::new(20).unwrap();
        let table = percentiles_for_points(&points, resolution).unwrap();

        assign_percentiles_to_points(&mut points, &table);

        for point in &points {
            assert_eq!(
                point.rank,
                Some(rank_for_value(&table, point.value.unwrap()))
            );
        }
        assert_eq!(rank_for_value(&table, 100.0), AssignedRank::AboveRange);
    }
}
