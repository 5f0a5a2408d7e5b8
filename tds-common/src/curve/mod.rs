//! Dominance curves
//!
//! A [`DominanceCurve`] is an `(A + 1) × R` matrix over `A` attributes and `R`
//! discretized time steps. Row `A` is the delay state: the share of trials in
//! which no attribute has been asserted yet. Every column sums to 1.0, exactly
//! for a single trial (one-hot columns) and within floating tolerance for
//! merged curves.
//!
//! Along with the matrix a curve keeps per-trial provenance (raw durations,
//! raw delays, metadata) so that merged curves can still be grouped, weighted
//! and described.
//!
//! # Submodules
//!
//! - `builder`: event record → single-trial curve
//! - `aggregate`: many curves → one trial-count-weighted curve
//! - `export`: delimited text table
//! - `snapshot`: lossless serde shape for persistence

mod aggregate;
mod builder;
mod export;
mod matrix;
mod snapshot;

pub use export::{TableOptions, TABLE_PRECISION};
pub use matrix::DominanceMatrix;
pub use snapshot::CurveSnapshot;

use crate::labels::Labels;
use crate::meta::{normalize_key, Metadata};
use crate::{Error, Result};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key used for the delay state in attribute → value maps
pub const DELAY_KEY: &str = "(DELAY)";

/// Name given to curves built from a single record
pub const DEFAULT_NAME: &str = "No Name";

/// One-sided 95% quantile of the standard normal distribution
const Z_95: f64 = 1.64485362695145;

/// Discretized, mutually exclusive multi-attribute time series
#[derive(Debug, Clone)]
pub struct DominanceCurve {
    labels: Arc<Labels>,
    matrix: DominanceMatrix,
    durations: Vec<f64>,
    delays: Vec<f64>,
    metadata: Metadata,
    name: String,
}

impl DominanceCurve {
    /// Assemble a curve from its parts
    ///
    /// # Errors
    /// [`Error::MalformedRecord`] if the matrix does not have one row per
    /// attribute plus the delay row, or if `durations` and `delays` are empty
    /// or differ in length.
    pub fn new(
        labels: Arc<Labels>,
        durations: Vec<f64>,
        delays: Vec<f64>,
        matrix: DominanceMatrix,
        metadata: Metadata,
        name: impl Into<String>,
    ) -> Result<Self> {
        if matrix.rows() != labels.len() + 1 {
            return Err(Error::MalformedRecord(format!(
                "matrix has {} rows, expected {} attributes + delay",
                matrix.rows(),
                labels.len()
            )));
        }
        if durations.is_empty() || durations.len() != delays.len() {
            return Err(Error::MalformedRecord(format!(
                "{} durations and {} delays; both must be equal and non-zero",
                durations.len(),
                delays.len()
            )));
        }
        Ok(Self {
            labels,
            matrix,
            durations,
            delays,
            metadata,
            name: name.into(),
        })
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn labels(&self) -> &Arc<Labels> {
        &self.labels
    }

    pub fn attribute_names(&self) -> &[String] {
        self.labels.names()
    }

    pub fn matrix(&self) -> &DominanceMatrix {
        &self.matrix
    }

    /// Number of time steps
    pub fn resolution(&self) -> usize {
        self.matrix.cols()
    }

    /// Number of attributes, not counting delay
    pub fn attribute_count(&self) -> usize {
        self.labels.len()
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn delays(&self) -> &[f64] {
        &self.delays
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of trials folded into this curve
    pub fn trial_count(&self) -> usize {
        self.durations.len()
    }

    pub fn average_duration(&self) -> f64 {
        mean(&self.durations)
    }

    pub fn average_delay(&self) -> f64 {
        mean(&self.delays)
    }

    /// Dominance proportion over time for one attribute
    pub fn attribute(&self, name: &str) -> Option<&[f64]> {
        self.labels.index_of(name).map(|i| self.matrix.row(i))
    }

    /// Dominance proportions for several attributes; `None` if any is unknown
    pub fn attributes(&self, names: &[&str]) -> Option<Vec<&[f64]>> {
        names.iter().map(|name| self.attribute(name)).collect()
    }

    /// All rows (attributes then delay) at one time step
    pub fn column(&self, step: usize) -> Option<Vec<f64>> {
        (step < self.resolution()).then(|| self.matrix.column(step))
    }

    /// Share of trials still undecided at each time step
    pub fn delay_proportion(&self) -> &[f64] {
        self.matrix.row(self.labels.len())
    }

    /// Mean of the delay row
    pub fn normalized_delay(&self) -> f64 {
        mean(self.delay_proportion())
    }

    /// Fraction of the trial each row is dominant (row sum / R), delay last
    pub fn dominance_duration(&self) -> Vec<f64> {
        let r = self.resolution() as f64;
        self.matrix.row_sums().into_iter().map(|s| s / r).collect()
    }

    /// Proportion expected if every attribute were picked uniformly
    pub fn chance_level(&self) -> f64 {
        1.0 / self.attribute_count() as f64
    }

    /// One-sided 95% significance threshold above [`chance_level`](Self::chance_level)
    pub fn significance_level(&self) -> f64 {
        let p = self.chance_level();
        p + Z_95 * (p * (1.0 - p) / self.trial_count() as f64).sqrt()
    }

    /// Dominance proportions at a normalized trial position
    ///
    /// The position resolves to column `round(t * R) - 1`; positions before
    /// the first column report the pure pre-trial state (every attribute 0.0,
    /// delay 1.0).
    ///
    /// # Errors
    /// [`Error::InvalidInput`] if `normalized_time` is outside `[0, 1]`.
    pub fn value_at(
        &self,
        normalized_time: f64,
        include_delay: bool,
    ) -> Result<IndexMap<String, f64>> {
        if !(0.0..=1.0).contains(&normalized_time) {
            return Err(Error::InvalidInput(format!(
                "normalized time must be in range [0.0, 1.0], got {}",
                normalized_time
            )));
        }

        let step = (normalized_time * self.resolution() as f64).round_ties_even() as i64 - 1;
        let delay_row = self.labels.len();
        let value = |row: usize| -> f64 {
            if step < 0 {
                if row == delay_row { 1.0 } else { 0.0 }
            } else {
                self.matrix.get(row, step as usize)
            }
        };

        let mut out: IndexMap<String, f64> =
            self.labels.iter().enumerate().map(|(i, name)| (name.to_string(), value(i))).collect();
        if include_delay {
            out.insert(DELAY_KEY.to_string(), value(delay_row));
        }
        Ok(out)
    }

    /// Fraction of the trial each attribute is dominant, keyed by name
    pub fn attribute_durations(&self, include_delay: bool) -> IndexMap<String, f64> {
        let durations = self.dominance_duration();
        let mut out: IndexMap<String, f64> = self
            .labels
            .iter()
            .zip(&durations)
            .map(|(name, d)| (name.to_string(), *d))
            .collect();
        if include_delay {
            out.insert(DELAY_KEY.to_string(), durations[self.labels.len()]);
        }
        out
    }

    /// Time-averaged dissimilarity in `[0, 1]`
    ///
    /// Per column, the Euclidean norm of the difference over every row
    /// (delay included) divided by √2; the result is the mean over columns.
    ///
    /// # Errors
    /// [`Error::IncompatibleCurve`] on vocabulary or resolution mismatch.
    pub fn distance(&self, other: &DominanceCurve) -> Result<f64> {
        self.check_compatible(other)?;

        let mut sq = vec![0.0; self.resolution()];
        for row in 0..self.matrix.rows() {
            let pairs = self.matrix.row(row).iter().zip(other.matrix.row(row));
            for (acc, (a, b)) in sq.iter_mut().zip(pairs) {
                *acc += (a - b) * (a - b);
            }
        }
        let total: f64 = sq.iter().map(|s| (s / 2.0).sqrt()).sum();
        Ok(total / self.resolution() as f64)
    }

    /// Fail unless both curves share vocabulary (same order) and resolution
    pub fn check_compatible(&self, other: &DominanceCurve) -> Result<()> {
        if !Arc::ptr_eq(&self.labels, &other.labels) && self.labels != other.labels {
            return Err(Error::IncompatibleCurve(format!(
                "different attribute vocabularies are mixed: {} vs {}",
                self.labels, other.labels
            )));
        }
        if self.resolution() != other.resolution() {
            return Err(Error::IncompatibleCurve(format!(
                "different resolutions are mixed: {} vs {}",
                self.resolution(),
                other.resolution()
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // In-place transforms
    // ------------------------------------------------------------------

    /// Centered moving average of width `round(level * R)` on every row
    ///
    /// Edges are padded by repeating the first and last column so the width
    /// stays `R`. A window of one column or less leaves the curve unchanged.
    pub fn smooth(&mut self, level: f64) -> Result<&mut Self> {
        if !level.is_finite() || level < 0.0 {
            return Err(Error::InvalidInput(format!(
                "smoothing level must be a non-negative number, got {}",
                level
            )));
        }

        let width = (level * self.resolution() as f64).round_ties_even() as usize;
        if width <= 1 {
            debug!("Smoothing window of {} column(s) on '{}' is a no-op", width, self.name);
            return Ok(self);
        }

        self.matrix = self.matrix.map_rows(|row| moving_average(row, width))?;
        Ok(self)
    }

    /// Re-normalize every column to sum to 1
    pub fn fix(&mut self) -> &mut Self {
        self.matrix.normalize_columns();
        self
    }

    /// Keep every `R / resolution`-th column, starting at an offset set by
    /// `phase` (`0.0` = first column of each stride, `1.0` = last)
    ///
    /// Exactly `resolution` columns remain.
    pub fn resample(&mut self, resolution: usize, phase: f64) -> Result<&mut Self> {
        let current = self.resolution();
        if resolution == 0 || resolution > current {
            return Err(Error::InvalidInput(format!(
                "cannot resample {} steps to {}",
                current, resolution
            )));
        }
        if !phase.is_finite() {
            return Err(Error::InvalidInput(format!("phase must be finite, got {}", phase)));
        }

        let stride = current / resolution;
        let offset = ((stride as f64 * phase).floor().max(0.0) as usize).min(stride - 1);
        let cols: Vec<usize> = (offset..current).step_by(stride).take(resolution).collect();
        self.matrix = self.matrix.select_columns(&cols);
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Name and metadata
    // ------------------------------------------------------------------

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    /// Prepend a value under `key`, so it becomes the most recent one
    pub fn set_meta(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.metadata
            .entry(normalize_key(key))
            .or_default()
            .insert(0, value.into());
        self
    }

    /// Replace the whole value list for `key`; `None` removes the key
    pub fn set_meta_all(&mut self, key: &str, values: Option<Vec<Value>>) -> &mut Self {
        let key = normalize_key(key);
        match values {
            Some(values) => {
                self.metadata.insert(key, values);
            }
            None => {
                self.metadata.shift_remove(&key);
            }
        }
        self
    }

    /// Most recent value for `key`
    ///
    /// Warns when the key holds no value or more than one value.
    pub fn get_meta(&self, key: &str) -> Option<&Value> {
        let key = normalize_key(key);
        let values = self.metadata.get(&key).map(Vec::as_slice).unwrap_or_default();
        match values.len() {
            0 => warn!("No metadata found for \"{}\"", key),
            1 => {}
            _ => warn!("Metadata for \"{}\" has multiple values", key),
        }
        values.first()
    }

    /// Every value stored under `key`; warns when there are none
    pub fn get_meta_all(&self, key: &str) -> &[Value] {
        let key = normalize_key(key);
        let values = self.metadata.get(&key).map(Vec::as_slice).unwrap_or_default();
        if values.is_empty() {
            warn!("No metadata found for \"{}\"", key);
        }
        values
    }

    pub fn has_meta(&self, key: &str) -> bool {
        self.metadata.contains_key(&normalize_key(key))
    }
}

impl fmt::Display for DominanceCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.trial_count();
        write!(f, "[DominanceCurve of {} trial{}]", n, if n <= 1 { "" } else { "s" })
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Edge-padded centered moving average; output length equals input length
fn moving_average(row: &[f64], width: usize) -> Vec<f64> {
    let (Some(&first), Some(&last)) = (row.first(), row.last()) else {
        return Vec::new();
    };
    let left = width / 2;
    let right = width - left - 1;

    let padded: Vec<f64> = std::iter::repeat(first)
        .take(left)
        .chain(row.iter().copied())
        .chain(std::iter::repeat(last).take(right))
        .collect();

    padded
        .windows(width)
        .map(|w| w.iter().sum::<f64>() / width as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TrialRecord;
    use serde_json::json;

    fn curve(data: &[(&str, Vec<f64>)], duration: f64, resolution: usize) -> DominanceCurve {
        let record = TrialRecord::new(data.iter().map(|(k, v)| (*k, v.clone())), duration);
        DominanceCurve::from_record(&record, resolution).unwrap()
    }

    fn example() -> DominanceCurve {
        curve(&[("A", vec![1.0]), ("B", vec![2.0])], 4.0, 4)
    }

    #[test]
    fn test_value_at_before_first_column() {
        let c = example();
        let v = c.value_at(0.0, true).unwrap();
        assert_eq!(v["A"], 0.0);
        assert_eq!(v["B"], 0.0);
        assert_eq!(v[DELAY_KEY], 1.0);

        let v = c.value_at(0.1, false).unwrap();
        assert_eq!(v.len(), 2);
        assert!(v.values().all(|p| *p == 0.0));
    }

    #[test]
    fn test_value_at_resolves_column() {
        let c = example();
        // round(0.5 * 4) - 1 = 1 -> attribute A
        let v = c.value_at(0.5, true).unwrap();
        assert_eq!(v["A"], 1.0);
        assert_eq!(v["B"], 0.0);
        assert_eq!(v[DELAY_KEY], 0.0);

        let v = c.value_at(1.0, false).unwrap();
        assert_eq!(v["B"], 1.0);
    }

    #[test]
    fn test_value_at_out_of_range() {
        let c = example();
        assert!(matches!(c.value_at(1.5, false), Err(Error::InvalidInput(_))));
        assert!(matches!(c.value_at(-0.1, false), Err(Error::InvalidInput(_))));
        assert!(matches!(c.value_at(f64::NAN, false), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_attribute_durations() {
        let c = example();
        let d = c.attribute_durations(true);
        assert_eq!(d["A"], 0.25);
        assert_eq!(d["B"], 0.5);
        assert_eq!(d[DELAY_KEY], 0.25);
        assert_eq!(c.attribute_durations(false).len(), 2);
        assert_eq!(c.normalized_delay(), 0.25);
    }

    #[test]
    fn test_distance_self_and_symmetry() {
        let a = example();
        let b = curve(&[("A", vec![0.0, 3.0]), ("B", vec![1.0])], 4.0, 4);
        assert_eq!(a.distance(&a).unwrap(), 0.0);
        assert_eq!(a.distance(&b).unwrap(), b.distance(&a).unwrap());
        assert!(a.distance(&b).unwrap() > 0.0);
        assert!(a.distance(&b).unwrap() <= 1.0);
    }

    #[test]
    fn test_distance_disjoint_columns_is_one() {
        // A everywhere vs B everywhere: every column differs in two rows
        let a = curve(&[("A", vec![0.0]), ("B", vec![])], 1.0, 10);
        let b = curve(&[("A", vec![]), ("B", vec![0.0])], 1.0, 10);
        assert!((a.distance(&b).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_incompatible() {
        let a = example();
        let b = curve(&[("A", vec![1.0]), ("C", vec![2.0])], 4.0, 4);
        let c = curve(&[("A", vec![1.0]), ("B", vec![2.0])], 4.0, 8);
        assert!(matches!(a.distance(&b), Err(Error::IncompatibleCurve(_))));
        assert!(matches!(a.distance(&c), Err(Error::IncompatibleCurve(_))));
    }

    #[test]
    fn test_smooth_keeps_width_and_simplex() {
        let mut c = curve(&[("A", vec![1.0, 6.0]), ("B", vec![3.0])], 10.0, 100);
        c.smooth(0.1).unwrap();
        assert_eq!(c.resolution(), 100);
        for s in c.matrix().column_sums() {
            assert!((s - 1.0).abs() < 1e-9);
        }
        // the hard step between A and B at column 30 is now a ramp
        let a = c.attribute("A").unwrap();
        assert!(a[30] > 0.0 && a[30] < 1.0);
    }

    #[test]
    fn test_smooth_tiny_window_is_noop() {
        let mut c = example();
        let before = c.matrix().clone();
        c.smooth(0.01).unwrap();
        assert_eq!(c.matrix(), &before);
        assert!(c.smooth(-1.0).is_err());
    }

    #[test]
    fn test_moving_average_edges() {
        let out = moving_average(&[0.0, 0.0, 1.0, 1.0], 2);
        // left pad 1 copy of first, right pad 0
        assert_eq!(out, vec![0.0, 0.0, 0.5, 1.0]);
        let out = moving_average(&[1.0, 0.0, 0.0], 3);
        assert_eq!(out, vec![2.0 / 3.0, 1.0 / 3.0, 0.0]);
    }

    #[test]
    fn test_resample() {
        let mut c = curve(&[("A", vec![0.0]), ("B", vec![5.0])], 10.0, 10);
        c.resample(5, 0.0).unwrap();
        assert_eq!(c.resolution(), 5);
        assert_eq!(c.attribute("A").unwrap(), &[1.0, 1.0, 1.0, 0.0, 0.0]);

        let mut c = curve(&[("A", vec![0.0]), ("B", vec![5.0])], 10.0, 10);
        c.resample(3, 1.0).unwrap();
        // stride 3, offset 2 -> columns 2, 5, 8
        assert_eq!(c.attribute("B").unwrap(), &[0.0, 1.0, 1.0]);

        assert!(c.resample(0, 0.5).is_err());
        assert!(c.resample(4, 0.5).is_err());
    }

    #[test]
    fn test_fix_restores_simplex() {
        let mut c = example();
        c.matrix = c.matrix.scaled(3.0);
        c.fix();
        assert_eq!(c.matrix().column_sums(), vec![1.0; 4]);
    }

    #[test]
    fn test_metadata_accessors() {
        let mut c = example();
        assert_eq!(c.get_meta("assessor"), None);
        assert!(c.get_meta_all("assessor").is_empty());

        c.set_meta(" assessor", "alice").set_meta("ASSESSOR", "bob");
        assert_eq!(c.get_meta("Assessor"), Some(&json!("bob")));
        assert_eq!(c.get_meta_all("assessor"), &[json!("bob"), json!("alice")]);

        c.set_meta_all("assessor", Some(vec![json!("carol")]));
        assert_eq!(c.get_meta("assessor"), Some(&json!("carol")));

        c.set_meta_all("assessor", None);
        assert!(!c.has_meta("assessor"));
    }

    #[test]
    fn test_significance_level() {
        let c = example();
        assert_eq!(c.chance_level(), 0.5);
        let expected = 0.5 + Z_95 * (0.25f64).sqrt();
        assert!((c.significance_level() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_views() {
        let c = example();
        assert_eq!(c.column(0), Some(vec![0.0, 0.0, 1.0]));
        assert_eq!(c.column(4), None);
        assert_eq!(c.attributes(&["B", "A"]).unwrap()[0], &[0.0, 0.0, 1.0, 1.0]);
        assert!(c.attributes(&["A", "Z"]).is_none());
        assert_eq!(c.delay_proportion(), &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(c.to_string(), "[DominanceCurve of 1 trial]");
    }
}
