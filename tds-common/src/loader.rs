//! Trial record loading
//!
//! Record files hold a YAML document stream (`---` separated, `#` comments
//! allowed). Each document is either a single [`TrialRecord`] or a sequence
//! of them; empty documents are skipped. Every record becomes one
//! single-trial curve, in stream order. JSON is valid YAML, so JSON record
//! files load as well.

use crate::collection::CurveCollection;
use crate::curve::DominanceCurve;
use crate::record::TrialRecord;
use crate::{Error, Result};
use serde::Deserialize;
use serde_yaml_ng::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Time steps per curve when none is configured
pub const DEFAULT_RESOLUTION: usize = 1000;

/// Extension of record files when none is configured
pub const DEFAULT_EXTENSION: &str = "yml";

/// Parse every record in a document stream
pub fn parse_records(text: &str) -> Result<Vec<TrialRecord>> {
    let mut records = Vec::new();
    for document in serde_yaml_ng::Deserializer::from_str(text) {
        match Value::deserialize(document)? {
            Value::Null => continue,
            Value::Sequence(items) => {
                for item in items {
                    records.push(serde_yaml_ng::from_value(item)?);
                }
            }
            other => records.push(serde_yaml_ng::from_value(other)?),
        }
    }
    Ok(records)
}

/// Build one curve per record found in `text`
pub fn load_str(text: &str, resolution: usize) -> Result<CurveCollection> {
    let records = parse_records(text)?;
    debug!("Parsed {} records", records.len());
    CurveCollection::from_records(&records, resolution)
}

/// Build one curve per record in a record file
pub fn load_file(path: &Path, resolution: usize) -> Result<CurveCollection> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
        _ => Error::Io(e),
    })?;

    let mut curves = CurveCollection::new();
    for record in parse_records(&text)? {
        let curve = DominanceCurve::from_record(&record, resolution)
            .map_err(|e| in_file(path, e))?;
        curves.push(curve);
    }
    info!("Loaded {} curves from {}", curves.len(), path.display());
    Ok(curves)
}

/// Load every record file below `dir` whose extension matches
///
/// Files are visited in path order so repeated runs build the same
/// collection. Unreadable directory entries are skipped with a warning.
pub fn load_dir(dir: &Path, extension: &str, resolution: usize) -> Result<CurveCollection> {
    if !dir.is_dir() {
        return Err(Error::NotFound(dir.display().to_string()));
    }

    let files = record_files(dir, extension);
    if files.is_empty() {
        return Err(Error::NotFound(format!(
            "no .{} files under {}",
            extension.trim_start_matches('.'),
            dir.display()
        )));
    }

    let mut curves = CurveCollection::new();
    for file in &files {
        curves.extend(load_file(file, resolution)?);
    }
    info!(
        "Loaded {} curves from {} files under {}",
        curves.len(),
        files.len(),
        dir.display()
    );
    Ok(curves)
}

/// [`load_file`] or [`load_dir`], whichever `path` is
pub fn load_path(path: &Path, extension: &str, resolution: usize) -> Result<CurveCollection> {
    if path.is_dir() {
        load_dir(path, extension, resolution)
    } else {
        load_file(path, resolution)
    }
}

fn record_files(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let wanted = extension.trim_start_matches('.');
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        match entry {
            Ok(entry) => {
                let matches = entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted));
                if entry.file_type().is_file() && matches {
                    files.push(entry.into_path());
                }
            }
            Err(e) => warn!("Error accessing entry: {}", e),
        }
    }
    files.sort();
    files
}

fn in_file(path: &Path, error: Error) -> Error {
    match error {
        Error::MalformedRecord(msg) => {
            Error::MalformedRecord(format!("{}: {}", path.display(), msg))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_DOCS: &str = "\
# session 1
meta:
  assessor: ann
data:
  A: [1.0]
  B: [2.0]
duration: 4.0
---
data: {A: [3.0], B: [0.5]}
duration: 4
";

    #[test]
    fn test_document_stream_in_order() {
        let curves = load_str(TWO_DOCS, 4).unwrap();
        assert_eq!(curves.len(), 2);
        assert_eq!(curves.get(0).unwrap().read().delays(), &[2.0]);
        assert_eq!(curves.get(1).unwrap().read().delays(), &[3.0]);
        assert_eq!(
            curves.get(0).unwrap().read().get_meta("assessor"),
            Some(&serde_json::json!("ann"))
        );
    }

    #[test]
    fn test_sequence_documents_flattened() {
        let text = "\
- data: {A: [1.0]}
  duration: 2.0
- data: {A: [0.5]}
  duration: 2.0
---
data: {A: [0.1]}
duration: 2.0
---
";
        assert_eq!(parse_records(text).unwrap().len(), 3);
    }

    #[test]
    fn test_json_document_is_accepted() {
        let text = r#"{"data": {"A": [1.0], "B": [2.0]}, "duration": 4.0}"#;
        let records = parse_records(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data["B"], vec![2.0]);
    }

    #[test]
    fn test_bad_documents() {
        assert!(matches!(parse_records("duration: 1.0"), Err(Error::Yaml(_))));
        assert!(matches!(parse_records("data: [unclosed"), Err(Error::Yaml(_))));
        assert!(matches!(
            load_str("data: {A: [1.0]}\nduration: 0\n", 10),
            Err(Error::MalformedRecord(_))
        ));
        assert!(parse_records("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_file(Path::new("/definitely/not/here.yml"), 10),
            Err(Error::NotFound(_))
        ));
    }
}
