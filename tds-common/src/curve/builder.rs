//! Event record → single-trial dominance curve
//!
//! Every timestamp becomes a `(row, step)` pair with
//! `step = round(t * R / duration)`. After a stable sort by step, each event
//! owns the columns up to the next event (or up to `R` for the last one) and
//! the columns before the first event belong to the delay row. The intervals
//! tile `[0, R)`, so every column is one-hot.

use super::{DominanceCurve, DominanceMatrix, DEFAULT_NAME};
use crate::labels::Labels;
use crate::meta::from_record_meta;
use crate::record::TrialRecord;
use crate::{Error, Result};
use tracing::debug;

impl DominanceCurve {
    /// Build a single-trial curve at `resolution` steps
    ///
    /// The trial's delay statistic is the *last* assertion time across all
    /// attributes, which is what downstream averages have always been
    /// computed from.
    ///
    /// # Errors
    /// - [`Error::MalformedRecord`] if the record has no attributes, no
    ///   timestamps, a non-finite timestamp, or a duration that is not a
    ///   positive finite number
    /// - [`Error::InvalidInput`] if `resolution` is zero
    pub fn from_record(record: &TrialRecord, resolution: usize) -> Result<Self> {
        if resolution == 0 {
            return Err(Error::InvalidInput("resolution must be at least 1".to_string()));
        }
        if record.data.is_empty() {
            return Err(Error::MalformedRecord("record has no attribute data".to_string()));
        }
        if !(record.duration.is_finite() && record.duration > 0.0) {
            return Err(Error::MalformedRecord(format!(
                "duration must be positive, got {}",
                record.duration
            )));
        }
        if let Some((name, _)) = record
            .data
            .iter()
            .find(|(_, stamps)| stamps.iter().any(|t| !t.is_finite()))
        {
            return Err(Error::MalformedRecord(format!(
                "attribute \"{}\" has a non-finite timestamp",
                name
            )));
        }

        let delay = record
            .data
            .values()
            .flatten()
            .copied()
            .reduce(f64::max)
            .ok_or_else(|| Error::MalformedRecord("record has no timestamps".to_string()))?;

        let mut names: Vec<&str> = record.data.keys().map(String::as_str).collect();
        names.sort_unstable();
        let labels = Labels::get(names)?;

        let scale = resolution as f64 / record.duration;
        let mut events: Vec<(usize, usize)> = Vec::with_capacity(record.event_count());
        for (name, stamps) in &record.data {
            let row = labels
                .index_of(name)
                .ok_or_else(|| Error::MalformedRecord(format!("unknown attribute \"{}\"", name)))?;
            events.extend(stamps.iter().map(|&t| (row, discretize(t, scale, resolution))));
        }
        // stable: equal steps keep record order, so the later event wins
        events.sort_by_key(|&(_, step)| step);

        let delay_row = labels.len();
        let mut matrix = DominanceMatrix::zeros(delay_row + 1, resolution);
        matrix.fill_row(delay_row, 0..events[0].1, 1.0);
        for (i, &(row, start)) in events.iter().enumerate() {
            let end = events.get(i + 1).map_or(resolution, |&(_, step)| step);
            matrix.fill_row(row, start..end, 1.0);
        }

        debug!(
            "Built curve: {} attributes, {} events, duration {}",
            labels.len(),
            events.len(),
            record.duration
        );

        DominanceCurve::new(
            labels,
            vec![record.duration],
            vec![delay],
            matrix,
            from_record_meta(&record.meta),
            DEFAULT_NAME,
        )
    }
}

/// Timestamp → step index, clamped to `[0, resolution]`
fn discretize(t: f64, scale: f64, resolution: usize) -> usize {
    let step = (t * scale).round_ties_even();
    if step <= 0.0 {
        0
    } else {
        (step as usize).min(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_four_step_example() {
        let record = TrialRecord::new([("A", vec![1.0]), ("B", vec![2.0])], 4.0);
        let curve = DominanceCurve::from_record(&record, 4).unwrap();

        assert_eq!(curve.attribute("A").unwrap(), &[0.0, 1.0, 0.0, 0.0]);
        assert_eq!(curve.attribute("B").unwrap(), &[0.0, 0.0, 1.0, 1.0]);
        assert_eq!(curve.delay_proportion(), &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(curve.durations(), &[4.0]);
        assert_eq!(curve.delays(), &[2.0]);
        assert_eq!(curve.name(), DEFAULT_NAME);
    }

    #[test]
    fn test_columns_are_one_hot() {
        let record = TrialRecord::new(
            [
                ("SWEET", vec![0.7, 5.1, 9.9]),
                ("SOUR", vec![2.2, 2.2]),
                ("BITTER", vec![7.3]),
            ],
            12.0,
        );
        let curve = DominanceCurve::from_record(&record, 1000).unwrap();
        for c in 0..curve.resolution() {
            let column = curve.column(c).unwrap();
            assert_eq!(column.iter().sum::<f64>(), 1.0);
            assert_eq!(column.iter().filter(|v| **v == 1.0).count(), 1);
        }
    }

    #[test]
    fn test_labels_sorted_and_delay_is_max() {
        let record = TrialRecord::new([("Z", vec![3.0]), ("M", vec![1.0, 8.0])], 10.0);
        let curve = DominanceCurve::from_record(&record, 10).unwrap();
        assert_eq!(curve.attribute_names(), &["M".to_string(), "Z".to_string()]);
        assert_eq!(curve.delays(), &[8.0]);
    }

    #[test]
    fn test_equal_steps_later_event_wins() {
        let record = TrialRecord::new([("A", vec![2.0]), ("B", vec![2.0])], 4.0);
        let curve = DominanceCurve::from_record(&record, 4).unwrap();
        assert_eq!(curve.attribute("A").unwrap(), &[0.0; 4]);
        assert_eq!(curve.attribute("B").unwrap(), &[0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_event_at_zero_has_no_delay() {
        let record = TrialRecord::new([("A", vec![0.0])], 5.0);
        let curve = DominanceCurve::from_record(&record, 5).unwrap();
        assert_eq!(curve.delay_proportion(), &[0.0; 5]);
        assert_eq!(curve.attribute("A").unwrap(), &[1.0; 5]);
    }

    #[test]
    fn test_out_of_range_timestamps_clamped() {
        let record = TrialRecord::new([("A", vec![-1.0]), ("B", vec![9.0])], 4.0);
        let curve = DominanceCurve::from_record(&record, 4).unwrap();
        assert_eq!(curve.attribute("A").unwrap(), &[1.0; 4]);
        assert_eq!(curve.attribute("B").unwrap(), &[0.0; 4]);
    }

    #[test]
    fn test_metadata_normalized() {
        let record = TrialRecord::new([("A", vec![1.0])], 2.0)
            .with_meta("assessor", "alice")
            .with_meta("score", json!([7]));
        let curve = DominanceCurve::from_record(&record, 4).unwrap();
        assert_eq!(curve.metadata()["ASSESSOR"], vec![json!("alice")]);
        assert_eq!(curve.metadata()["SCORE"], vec![json!(7)]);
    }

    #[test]
    fn test_malformed_records() {
        let empty = TrialRecord::new(Vec::<(&str, Vec<f64>)>::new(), 4.0);
        assert!(matches!(
            DominanceCurve::from_record(&empty, 4),
            Err(Error::MalformedRecord(_))
        ));

        let no_events = TrialRecord::new([("A", vec![]), ("B", vec![])], 4.0);
        assert!(matches!(
            DominanceCurve::from_record(&no_events, 4),
            Err(Error::MalformedRecord(_))
        ));

        for duration in [0.0, -1.0, f64::NAN] {
            let record = TrialRecord::new([("A", vec![1.0])], duration);
            assert!(matches!(
                DominanceCurve::from_record(&record, 4),
                Err(Error::MalformedRecord(_))
            ));
        }

        let nan = TrialRecord::new([("A", vec![f64::NAN])], 4.0);
        assert!(matches!(
            DominanceCurve::from_record(&nan, 4),
            Err(Error::MalformedRecord(_))
        ));

        let ok = TrialRecord::new([("A", vec![1.0])], 4.0);
        assert!(matches!(
            DominanceCurve::from_record(&ok, 0),
            Err(Error::InvalidInput(_))
        ));
    }
}
