//! Delimited text table export
//!
//! One header line with the attribute names (plus `DELAY`), then one line per
//! time step. Proportions are rounded half-to-even to [`TABLE_PRECISION`]
//! decimal places, like every other rounding in the engine.

use super::DominanceCurve;
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Decimal places kept in exported tables
pub const TABLE_PRECISION: i32 = 4;

/// Layout of an exported table
#[derive(Debug, Clone, PartialEq)]
pub struct TableOptions {
    pub delimiter: String,
    pub include_delay: bool,
    /// File stem used by [`DominanceCurve::save`]; empty means the curve name
    pub file_name: String,
    pub extension: String,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            delimiter: "\t".to_string(),
            include_delay: true,
            file_name: "untitled".to_string(),
            extension: ".csv".to_string(),
        }
    }
}

impl DominanceCurve {
    /// Render the curve as a delimited table, one row per time step
    pub fn to_table(&self, options: &TableOptions) -> String {
        let rows = if options.include_delay {
            self.matrix.rows()
        } else {
            self.labels.len()
        };

        let mut header: Vec<&str> = self.labels.iter().collect();
        if options.include_delay {
            header.push("DELAY");
        }

        let mut out = header.join(&options.delimiter);
        out.push('\n');
        for step in 0..self.resolution() {
            let line: Vec<String> = (0..rows)
                .map(|row| format_proportion(self.matrix.get(row, step)))
                .collect();
            out.push_str(&line.join(&options.delimiter));
            out.push('\n');
        }
        out
    }

    /// Write [`to_table`](Self::to_table) to `<dir>/<file_name><extension>`
    pub fn save(&self, dir: &Path, options: &TableOptions) -> Result<PathBuf> {
        let stem = if options.file_name.is_empty() {
            self.name.as_str()
        } else {
            options.file_name.as_str()
        };
        let path = dir.join(format!("{}{}", stem, options.extension));

        std::fs::write(&path, self.to_table(options))?;
        info!("Saved \"{}\" to {}", self.name, path.display());
        Ok(path)
    }
}

fn format_proportion(value: f64) -> String {
    let scale = 10f64.powi(TABLE_PRECISION);
    let rounded = (value * scale).round_ties_even() / scale;
    // `{:?}` keeps a trailing ".0" on whole numbers
    format!("{:?}", rounded + 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TrialRecord;

    fn example() -> DominanceCurve {
        let record = TrialRecord::new([("A", vec![1.0]), ("B", vec![2.0])], 4.0);
        DominanceCurve::from_record(&record, 4).unwrap()
    }

    #[test]
    fn test_table_with_delay() {
        let table = example().to_table(&TableOptions::default());
        assert_eq!(
            table,
            "A\tB\tDELAY\n0.0\t0.0\t1.0\n1.0\t0.0\t0.0\n0.0\t1.0\t0.0\n0.0\t1.0\t0.0\n"
        );
    }

    #[test]
    fn test_table_without_delay_and_rounding() {
        let a = example();
        let record = |a: f64, b: f64| TrialRecord::new([("A", vec![a]), ("B", vec![b])], 4.0);
        let b = DominanceCurve::from_record(&record(0.0, 3.0), 4).unwrap();
        let c = DominanceCurve::from_record(&record(3.0, 0.0), 4).unwrap();
        let merged = DominanceCurve::merge([&a, &b, &c]).unwrap();

        let options = TableOptions {
            delimiter: ",".to_string(),
            include_delay: false,
            ..TableOptions::default()
        };
        let table = merged.to_table(&options);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "A,B");
        assert_eq!(lines[1], "0.3333,0.3333");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_proportions_round_half_to_even() {
        assert_eq!(format_proportion(0.03125), "0.0312");
        assert_eq!(format_proportion(0.09375), "0.0938");
        assert_eq!(format_proportion(0.5), "0.5");
        assert_eq!(format_proportion(-0.0), "0.0");
    }

    #[test]
    fn test_save_uses_curve_name_when_stem_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut curve = example();
        curve.set_name("panel");

        let options = TableOptions {
            file_name: String::new(),
            ..TableOptions::default()
        };
        let path = curve.save(dir.path(), &options).unwrap();
        assert_eq!(path, dir.path().join("panel.csv"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), curve.to_table(&options));
    }
}
