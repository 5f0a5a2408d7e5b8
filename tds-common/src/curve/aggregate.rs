//! Many curves → one trial-count-weighted curve
//!
//! Each input contributes `matrix * trial_count`, so a curve that is already
//! an aggregate of `n` trials weighs as much as `n` single trials. The summed
//! matrix is column-normalized once, at the very end.

use super::DominanceCurve;
use crate::meta::display_value;
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

impl DominanceCurve {
    /// Merge curves into their weighted average
    ///
    /// Durations, delays and metadata lists are concatenated in iteration
    /// order. A metadata key set that differs from the first curve's is
    /// reported with `warn!` and does not stop the merge. Inputs are not
    /// modified.
    ///
    /// The result is named `"<first ASSESSOR> and <N-1> others"` when the
    /// merged metadata has an `ASSESSOR` entry, otherwise `"<N> trials"`, where
    /// `N` is the total trial count.
    ///
    /// # Errors
    /// - [`Error::EmptyAggregation`] if `curves` yields nothing
    /// - [`Error::IncompatibleCurve`] if any curve differs from the first in
    ///   vocabulary or resolution
    pub fn merge<'a, I>(curves: I) -> Result<DominanceCurve>
    where
        I: IntoIterator<Item = &'a DominanceCurve>,
    {
        let mut iter = curves.into_iter();
        let first = iter.next().ok_or(Error::EmptyAggregation)?;

        let first_keys: HashSet<&str> = first.metadata.keys().map(String::as_str).collect();
        let mut durations = first.durations.clone();
        let mut delays = first.delays.clone();
        let mut metadata = first.metadata.clone();
        let mut weighted = first.matrix.scaled(first.trial_count() as f64);
        let mut inputs = 1usize;

        for curve in iter {
            first.check_compatible(curve)?;

            let keys: HashSet<&str> = curve.metadata.keys().map(String::as_str).collect();
            if keys != first_keys {
                warn!(
                    "Metadata of different types are mixed while merging \"{}\"; \
                     review the meta fields",
                    curve.name
                );
            }

            for (key, values) in &curve.metadata {
                metadata
                    .entry(key.clone())
                    .or_default()
                    .extend(values.iter().cloned());
            }
            durations.extend_from_slice(&curve.durations);
            delays.extend_from_slice(&curve.delays);
            weighted.add_scaled(&curve.matrix, curve.trial_count() as f64);
            inputs += 1;
        }

        weighted.normalize_columns();

        let trials = durations.len();
        let name = match metadata.get("ASSESSOR").and_then(|values| values.first()) {
            Some(assessor) => format!("{} and {} others", display_value(assessor), trials - 1),
            None => format!("{} trials", trials),
        };
        debug!("Merged {} curves ({} trials) into \"{}\"", inputs, trials, name);

        DominanceCurve::new(
            Arc::clone(&first.labels),
            durations,
            delays,
            weighted,
            metadata,
            name,
        )
    }

    /// Merge of `self` and `other`
    pub fn combine(&self, other: &DominanceCurve) -> Result<DominanceCurve> {
        DominanceCurve::merge([self, other])
    }
}
