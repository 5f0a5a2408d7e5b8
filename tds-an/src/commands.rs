//! Analyzer commands
//!
//! Each command takes an already-loaded collection and returns the report
//! text; `main` only loads, prints and sets up logging.

use anyhow::{Context, Result};
use rand::Rng;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tds_common::config::TomlConfig;
use tds_common::features::dominance_features;
use tds_common::{
    loader, CurveCollection, DominanceCurve, FeatureTable, KeySelector, TableOptions,
};
use tracing::info;

/// Load every curve below `path` (file or directory)
pub fn load(path: &Path, config: &TomlConfig) -> Result<CurveCollection> {
    let curves = loader::load_path(path, &config.file_extension, config.resolution)
        .with_context(|| format!("Failed to load records from {}", path.display()))?;
    info!("{}", curves);
    Ok(curves)
}

/// One line per curve: name, trials, average duration and delay
pub fn summary(curves: &CurveCollection) -> Result<String> {
    let mut out = String::new();
    for (i, curve) in curves.iter().enumerate() {
        let curve = curve.read();
        writeln!(
            out,
            "{:>4}  {:<24} trials={:<4} duration={:.3} delay={:.3}",
            i,
            curve.name(),
            curve.trial_count(),
            curve.average_duration(),
            curve.average_delay()
        )?;
    }
    writeln!(out, "{}", curves)?;
    Ok(out)
}

/// Options of the `merge` command
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Metadata key to merge per group
    pub group_by: Option<String>,
    pub name: Option<String>,
    /// Smoothing level; falls back to the configured one
    pub smooth: Option<f64>,
    /// Directory to write one table per merged curve into
    pub out: Option<PathBuf>,
    pub include_delay: bool,
}

/// Merge all curves, or each metadata group, and report attribute durations
pub fn merge(
    curves: &CurveCollection,
    options: &MergeOptions,
    config: &TomlConfig,
) -> Result<String> {
    let mut merged: Vec<DominanceCurve> = match &options.group_by {
        Some(key) => curves
            .group_by(KeySelector::metadata(key))
            .into_iter()
            .map(|(group, members)| {
                let name = match &options.name {
                    Some(prefix) => format!("{} {}", prefix, group),
                    None => group.to_string(),
                };
                members.merge_as(&name)
            })
            .collect::<tds_common::Result<Vec<_>>>()?,
        None => {
            let mut all = curves.merge()?;
            if let Some(name) = &options.name {
                all.set_name(name.as_str());
            }
            vec![all]
        }
    };

    let level = options.smooth.unwrap_or(config.smoothing);
    if level > 0.0 {
        for curve in &mut merged {
            curve.smooth(level)?;
        }
    }

    let table = TableOptions {
        delimiter: config.delimiter.clone(),
        include_delay: options.include_delay,
        file_name: String::new(),
        ..TableOptions::default()
    };

    let mut out = String::new();
    for curve in &merged {
        writeln!(out, "{} ({} trials)", curve.name(), curve.trial_count())?;
        for (attribute, share) in curve.attribute_durations(options.include_delay) {
            writeln!(out, "  {:<16} {:.4}", attribute, share)?;
        }
        writeln!(
            out,
            "  chance={:.4} significance={:.4}",
            curve.chance_level(),
            curve.significance_level()
        )?;
        if let Some(dir) = &options.out {
            let path = curve
                .save(dir, &table)
                .with_context(|| format!("Failed to write table into {}", dir.display()))?;
            writeln!(out, "  saved {}", path.display())?;
        }
    }
    Ok(out)
}

/// Distance of every curve from the overall average
pub fn distance(curves: &CurveCollection) -> Result<String> {
    let distances = curves.distance()?;
    let names = curves.map_values(|c| c.name().to_string());

    let mut out = String::new();
    for (i, (name, d)) in names.iter().zip(&distances).enumerate() {
        writeln!(out, "{:>4}  {:<24} {:.6}", i, name, d)?;
    }
    let mean = distances.iter().sum::<f64>() / distances.len() as f64;
    let min = distances.iter().copied().fold(f64::INFINITY, f64::min);
    let max = distances.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    writeln!(out, "mean={:.6} min={:.6} max={:.6}", mean, min, max)?;
    Ok(out)
}

/// Bootstrap mean and standard deviation of each attribute's dominance
/// duration in the merged curve
pub fn bootstrap<R: Rng>(
    curves: &CurveCollection,
    iterations: usize,
    rng: &mut R,
) -> Result<String> {
    anyhow::ensure!(iterations > 0, "bootstrap needs at least one iteration");

    let labels = curves.merge()?.attribute_names().to_vec();
    let mut samples: Vec<Vec<f64>> = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let merged = curves.bootstrap_with(None, rng)?.merge()?;
        samples.push(dominance_features(&merged));
    }

    let n = iterations as f64;
    let mut out = String::new();
    writeln!(out, "{} bootstrap samples of {} curves", iterations, curves.len())?;
    for (col, label) in labels.iter().enumerate() {
        let mean = samples.iter().map(|s| s[col]).sum::<f64>() / n;
        let std = (samples.iter().map(|s| (s[col] - mean).powi(2)).sum::<f64>() / n).sqrt();
        writeln!(out, "  {:<16} mean={:.4} std={:.4}", label, mean, std)?;
    }
    Ok(out)
}

/// Feature table for an external PCA
pub fn features(
    curves: &CurveCollection,
    standardize: bool,
    config: &TomlConfig,
) -> Result<String> {
    let table = FeatureTable::dominance(curves, standardize)?;
    Ok(table.to_table(&config.delimiter))
}
