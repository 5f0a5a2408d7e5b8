//! Lossless serde shape of a curve
//!
//! A snapshot carries everything needed to rebuild a curve: vocabulary,
//! matrix rows, per-trial provenance and name. Restoring re-interns the
//! vocabulary and checks every curve invariant.

use super::{DominanceCurve, DominanceMatrix};
use crate::labels::Labels;
use crate::meta::Metadata;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Allowed column-sum drift when restoring a snapshot
const SIMPLEX_TOLERANCE: f64 = 1e-6;

/// Plain-data form of a [`DominanceCurve`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSnapshot {
    pub name: String,
    pub labels: Vec<String>,
    pub durations: Vec<f64>,
    pub delays: Vec<f64>,
    #[serde(default)]
    pub meta: Metadata,
    /// Attribute rows followed by the delay row
    pub matrix: Vec<Vec<f64>>,
}

impl DominanceCurve {
    pub fn to_snapshot(&self) -> CurveSnapshot {
        CurveSnapshot {
            name: self.name.clone(),
            labels: self.labels.names().to_vec(),
            durations: self.durations.clone(),
            delays: self.delays.clone(),
            meta: self.metadata.clone(),
            matrix: self.matrix.to_rows(),
        }
    }

    /// Rebuild a curve, validating shape and the column-sum invariant
    pub fn from_snapshot(snapshot: CurveSnapshot) -> Result<DominanceCurve> {
        let labels = Labels::get(snapshot.labels)?;
        let matrix = DominanceMatrix::from_rows(snapshot.matrix)
            .map_err(|e| Error::MalformedRecord(e.to_string()))?;

        if matrix.cols() == 0 {
            return Err(Error::MalformedRecord("snapshot matrix has no columns".to_string()));
        }
        let in_range = |v: &f64| (0.0..=1.0 + SIMPLEX_TOLERANCE).contains(v);
        if let Some(v) = matrix.values().iter().find(|v| !in_range(v)) {
            return Err(Error::MalformedRecord(format!("proportion {} out of range", v)));
        }
        if let Some((step, sum)) = matrix
            .column_sums()
            .into_iter()
            .enumerate()
            .find(|(_, sum)| (sum - 1.0).abs() > SIMPLEX_TOLERANCE)
        {
            return Err(Error::MalformedRecord(format!(
                "column {} sums to {}, expected 1.0",
                step, sum
            )));
        }

        DominanceCurve::new(
            labels,
            snapshot.durations,
            snapshot.delays,
            matrix,
            snapshot.meta,
            snapshot.name,
        )
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_snapshot())?)
    }

    pub fn from_json(json: &str) -> Result<DominanceCurve> {
        DominanceCurve::from_snapshot(serde_json::from_str(json)?)
    }
}
