//! Per-curve feature vectors for principal component analysis
//!
//! Decomposition itself happens outside this crate; this module only
//! prepares the observation matrix: one row per curve, one column per
//! feature, all-zero columns pruned, optionally standardized.

use crate::collection::CurveCollection;
use crate::curve::DominanceCurve;
use crate::{Error, Result};
use tracing::debug;

/// Column totals at or below this are treated as zero
const ZERO_TOLERANCE: f64 = 1e-8;

/// Dominance duration of every attribute, delay excluded
pub fn dominance_features(curve: &DominanceCurve) -> Vec<f64> {
    let mut durations = curve.dominance_duration();
    durations.truncate(curve.attribute_count());
    durations
}

/// Observation matrix with column labels
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    labels: Vec<String>,
    names: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureTable {
    /// Extract one row per curve
    ///
    /// Columns are labelled with the first curve's attribute names when the
    /// extractor yields one value per attribute, otherwise `F1`, `F2`, ...
    ///
    /// # Errors
    /// - [`Error::EmptyAggregation`] for an empty collection
    /// - [`Error::InvalidInput`] when the extractor returns rows of
    ///   different lengths
    pub fn from_curves<F>(curves: &CurveCollection, extractor: F, standardize: bool) -> Result<Self>
    where
        F: Fn(&DominanceCurve) -> Vec<f64>,
    {
        let first = curves.get(0).ok_or(Error::EmptyAggregation)?;
        let mut rows = curves.map_values(&extractor);
        let names = curves.map_values(|c| c.name().to_string());

        let width = rows[0].len();
        if let Some(bad) = rows.iter().position(|r| r.len() != width) {
            return Err(Error::InvalidInput(format!(
                "feature row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                width
            )));
        }

        let all_labels: Vec<String> = {
            let curve = first.read();
            if width == curve.attribute_count() {
                curve.attribute_names().to_vec()
            } else {
                (1..=width).map(|i| format!("F{}", i)).collect()
            }
        };

        let keep: Vec<usize> = (0..width)
            .filter(|&col| rows.iter().map(|r| r[col]).sum::<f64>().abs() > ZERO_TOLERANCE)
            .collect();
        if keep.len() < width {
            debug!("Dropping {} all-zero feature columns", width - keep.len());
            for row in &mut rows {
                *row = keep.iter().map(|&col| row[col]).collect();
            }
        }
        let labels = keep.iter().map(|&col| all_labels[col].clone()).collect();

        let mut table = Self { labels, names, rows };
        if standardize {
            table.standardize();
        }
        Ok(table)
    }

    /// [`from_curves`](Self::from_curves) with [`dominance_features`]
    pub fn dominance(curves: &CurveCollection, standardize: bool) -> Result<Self> {
        Self::from_curves(curves, dominance_features, standardize)
    }

    /// Z-score every column (population standard deviation)
    ///
    /// Constant columns become all zeros.
    fn standardize(&mut self) {
        let n = self.rows.len() as f64;
        for col in 0..self.labels.len() {
            let mean = self.rows.iter().map(|r| r[col]).sum::<f64>() / n;
            let var = self.rows.iter().map(|r| (r[col] - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            for row in &mut self.rows {
                row[col] = if std > 0.0 { (row[col] - mean) / std } else { 0.0 };
            }
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Curve name of each row
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn column(&self, label: &str) -> Option<Vec<f64>> {
        let col = self.labels.iter().position(|l| l == label)?;
        Some(self.rows.iter().map(|r| r[col]).collect())
    }

    /// Delimited text with a `NAME` column followed by the feature columns
    pub fn to_table(&self, delimiter: &str) -> String {
        let mut out = std::iter::once("NAME")
            .chain(self.labels.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(delimiter);
        out.push('\n');
        for (name, row) in self.names.iter().zip(&self.rows) {
            let cells: Vec<String> = std::iter::once(name.clone())
                .chain(row.iter().map(|v| format!("{:.6}", v)))
                .collect();
            out.push_str(&cells.join(delimiter));
            out.push('\n');
        }
        out
    }
}
