//! Reference statistics.
//!
//! Drift is measured against the distribution the models were trained on.
//! The reference sample is resolved once at startup from the first source
//! that yields usable data:
//!
//! 1. the processed training sample (JSON records)
//! 2. the raw dataset (CSV with a header row)
//! 3. a seeded synthetic sample with plausible ranges
//!
//! The result is immutable and shared by every drift request.

use price_sentinel_core::{
    config::ReferenceConfig,
    features::Feature,
    stats, Error, Result,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Where the reference sample came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceSource {
    Processed,
    Raw,
    Synthetic,
}

impl fmt::Display for ReferenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReferenceSource::Processed => "processed",
            ReferenceSource::Raw => "raw",
            ReferenceSource::Synthetic => "synthetic",
        };
        f.write_str(s)
    }
}

/// Descriptive statistics of one reference column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl FeatureSummary {
    fn from_column(column: &[f64]) -> Self {
        Self {
            mean: stats::mean(column),
            std: stats::std_dev(column),
            min: stats::min(column),
            max: stats::max(column),
        }
    }
}

/// Reference observations, one column per feature in canonical order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceSample {
    columns: [Vec<f64>; 5],
}

impl ReferenceSample {
    /// Build from columns; all columns must have the same, non-zero length
    pub fn from_columns(columns: [Vec<f64>; 5]) -> Result<Self> {
        let len = columns[0].len();
        if len == 0 {
            return Err(Error::statistics("reference sample is empty"));
        }
        if columns.iter().any(|c| c.len() != len) {
            return Err(Error::statistics("reference columns have different lengths"));
        }
        if columns.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::statistics("reference sample contains non-finite values"));
        }
        Ok(Self { columns })
    }

    /// Build from rows in canonical feature order
    pub fn from_rows(rows: impl IntoIterator<Item = [f64; 5]>) -> Result<Self> {
        let mut columns: [Vec<f64>; 5] = Default::default();
        for row in rows {
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }
        Self::from_columns(columns)
    }

    pub fn column(&self, feature: Feature) -> &[f64] {
        &self.columns[feature.index()]
    }

    pub fn len(&self) -> usize {
        self.columns[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns[0].is_empty()
    }
}

/// Summary of the reference distribution plus the raw sample used by the
/// statistical tests.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceStatistics {
    pub source: ReferenceSource,
    pub count: usize,
    pub summaries: BTreeMap<Feature, FeatureSummary>,
    #[serde(skip)]
    sample: ReferenceSample,
}

impl ReferenceStatistics {
    /// Resolve the reference sample from the configured sources.
    ///
    /// Never fails: each file source that is absent, unreadable or empty
    /// falls through to the next one, ending with the synthetic sample.
    pub fn initialize(config: &ReferenceConfig) -> Self {
        match load_processed(&config.processed_path) {
            Ok(sample) => return Self::announce(ReferenceSource::Processed, sample),
            Err(e) => debug!(
                path = %config.processed_path.display(),
                error = %e,
                "Processed reference sample unavailable"
            ),
        }

        match load_raw_csv(&config.raw_path) {
            Ok(sample) => return Self::announce(ReferenceSource::Raw, sample),
            Err(e) => debug!(
                path = %config.raw_path.display(),
                error = %e,
                "Raw reference dataset unavailable"
            ),
        }

        warn!(
            seed = config.synthetic_seed,
            size = config.synthetic_size,
            "No reference dataset found, using synthetic reference sample"
        );
        Self::synthetic(config.synthetic_seed, config.synthetic_size)
    }

    fn announce(source: ReferenceSource, sample: ReferenceSample) -> Self {
        let reference = Self::from_sample(source, sample);
        info!(source = %source, count = reference.count, "Reference statistics initialized");
        reference
    }

    /// Compute summaries for an already loaded sample
    pub fn from_sample(source: ReferenceSource, sample: ReferenceSample) -> Self {
        let summaries = Feature::ALL
            .into_iter()
            .map(|f| (f, FeatureSummary::from_column(sample.column(f))))
            .collect();
        Self {
            source,
            count: sample.len(),
            summaries,
            sample,
        }
    }

    /// Deterministic synthetic sample.
    ///
    /// Columns are drawn one after another from a single seeded generator:
    /// normal draws clipped to a plausible range, truncated to whole numbers
    /// for the count features.
    pub fn synthetic(seed: u64, size: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let size = size.max(1);
        let mut columns: [Vec<f64>; 5] = Default::default();

        for feature in Feature::ALL {
            let (mean, std, lo, hi) = synthetic_profile(feature);
            let column = &mut columns[feature.index()];
            match Normal::new(mean, std) {
                Ok(normal) => {
                    for _ in 0..size {
                        let mut value = normal.sample(&mut rng).clamp(lo, hi);
                        if feature.is_count() {
                            value = value.trunc();
                        }
                        column.push(value);
                    }
                }
                Err(_) => column.resize(size, mean),
            }
        }

        let sample = ReferenceSample { columns };
        Self::from_sample(ReferenceSource::Synthetic, sample)
    }

    pub fn sample(&self) -> &ReferenceSample {
        &self.sample
    }

    pub fn summary(&self, feature: Feature) -> Option<&FeatureSummary> {
        self.summaries.get(&feature)
    }
}

/// (mean, std, min, max) of the synthetic distribution per feature
fn synthetic_profile(feature: Feature) -> (f64, f64, f64, f64) {
    match feature {
        Feature::BuildingArea => (150.0, 80.0, 30.0, 500.0),
        Feature::LandArea => (180.0, 100.0, 50.0, 600.0),
        Feature::Bedrooms => (4.0, 1.5, 1.0, 10.0),
        Feature::Bathrooms => (3.0, 1.2, 1.0, 8.0),
        Feature::Garages => (2.0, 1.0, 0.0, 5.0),
    }
}

#[derive(Debug, Deserialize)]
struct ProcessedRecord {
    #[serde(rename = "LB")]
    building_area: f64,
    #[serde(rename = "LT")]
    land_area: f64,
    #[serde(rename = "KT")]
    bedrooms: f64,
    #[serde(rename = "KM")]
    bathrooms: f64,
    #[serde(rename = "GRS")]
    garages: f64,
}

/// Processed sample: a JSON array of records keyed by feature name.
/// Any malformed record rejects the whole file.
fn load_processed(path: &Path) -> Result<ReferenceSample> {
    let content = std::fs::read_to_string(path)?;
    let records: Vec<ProcessedRecord> = serde_json::from_str(&content)?;
    ReferenceSample::from_rows(records.into_iter().map(|r| {
        [r.building_area, r.land_area, r.bedrooms, r.bathrooms, r.garages]
    }))
}

/// Raw dataset: RFC 4180 CSV with a header row.
///
/// Quoted cells may contain commas. The five feature columns are picked by
/// name; other columns are ignored.
/// Rows with a missing or non-numeric feature value are dropped.
fn load_raw_csv(path: &Path) -> Result<ReferenceSample> {
    let content = std::fs::read_to_string(path)?;
    parse_csv(&content)
}

fn parse_csv(content: &str) -> Result<ReferenceSample> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| Error::statistics(format!("raw dataset header unreadable: {}", e)))?
        .clone();

    let mut indices = [0usize; 5];
    for feature in Feature::ALL {
        indices[feature.index()] = headers
            .iter()
            .position(|name| name == feature.as_str())
            .ok_or_else(|| {
                Error::statistics(format!("raw dataset has no {} column", feature))
            })?;
    }

    let mut dropped = 0usize;
    let rows: Vec<[f64; 5]> = reader
        .records()
        .filter_map(|record| {
            let row = record.ok().and_then(|r| parse_row(&r, &indices));
            if row.is_none() {
                dropped += 1;
            }
            row
        })
        .collect();

    if dropped > 0 {
        debug!(dropped, "Dropped raw dataset rows with missing values");
    }
    ReferenceSample::from_rows(rows)
}

fn parse_row(record: &csv::StringRecord, indices: &[usize; 5]) -> Option<[f64; 5]> {
    let mut row = [0f64; 5];
    for (slot, &index) in row.iter_mut().zip(indices) {
        let value: f64 = record.get(index)?.parse().ok()?;
        if !value.is_finite() {
            return None;
        }
        *slot = value;
    }
    Some(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn missing_config(dir: &Path) -> ReferenceConfig {
        ReferenceConfig {
            processed_path: dir.join("x_train.json"),
            raw_path: dir.join("data_rumah.csv"),
            ..ReferenceConfig::default()
        }
    }

    #[test]
    fn test_synthetic_is_deterministic() {
        let a = ReferenceStatistics::synthetic(42, 100);
        let b = ReferenceStatistics::synthetic(42, 100);
        assert_eq!(a.count, 100);
        assert_eq!(a.source, ReferenceSource::Synthetic);
        assert_eq!(a.sample(), b.sample());
        assert_eq!(a.summaries, b.summaries);

        let c = ReferenceStatistics::synthetic(7, 100);
        assert_ne!(a.sample(), c.sample());
    }

    #[test]
    fn test_synthetic_respects_profiles() {
        let reference = ReferenceStatistics::synthetic(42, 100);
        for feature in Feature::ALL {
            let (_, _, lo, hi) = synthetic_profile(feature);
            let column = reference.sample().column(feature);
            assert_eq!(column.len(), 100);
            assert!(column.iter().all(|v| *v >= lo && *v <= hi));
            if feature.is_count() {
                assert!(column.iter().all(|v| v.fract() == 0.0));
            }
        }
        let lb = reference.summary(Feature::BuildingArea).unwrap();
        assert!(lb.mean > 100.0 && lb.mean < 200.0);
    }

    #[test]
    fn test_falls_back_to_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let reference = ReferenceStatistics::initialize(&missing_config(dir.path()));
        assert_eq!(reference.source, ReferenceSource::Synthetic);
        assert_eq!(reference.count, 100);
    }

    #[test]
    fn test_processed_sample_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let config = missing_config(dir.path());
        std::fs::write(
            &config.processed_path,
            r#"[
                {"LB": 100, "LT": 120, "KT": 3, "KM": 2, "GRS": 1},
                {"LB": 200, "LT": 240, "KT": 5, "KM": 4, "GRS": 3}
            ]"#,
        )
        .unwrap();
        std::fs::write(&config.raw_path, "LB,LT,KT,KM,GRS\n1,1,1,1,1\n").unwrap();

        let reference = ReferenceStatistics::initialize(&config);
        assert_eq!(reference.source, ReferenceSource::Processed);
        assert_eq!(reference.count, 2);
        let lb = reference.summary(Feature::BuildingArea).unwrap();
        assert_eq!(lb.mean, 150.0);
        assert_eq!(lb.min, 100.0);
        assert_eq!(lb.max, 200.0);
    }

    #[test]
    fn test_malformed_processed_falls_through_to_raw() {
        let dir = tempfile::tempdir().unwrap();
        let config = missing_config(dir.path());
        std::fs::write(&config.processed_path, r#"[{"LB": 100}]"#).unwrap();
        std::fs::write(
            &config.raw_path,
            "NO,HARGA,LB,LT,KT,KM,GRS\n1,3800000000,220,220,3,3,0\n2,4600000000,180,137,4,3,2\n",
        )
        .unwrap();

        let reference = ReferenceStatistics::initialize(&config);
        assert_eq!(reference.source, ReferenceSource::Raw);
        assert_eq!(reference.count, 2);
        assert_eq!(reference.sample().column(Feature::Bedrooms), &[3.0, 4.0]);
    }

    #[test]
    fn test_csv_drops_incomplete_rows() {
        let csv = "LB,LT,KT,KM,GRS,HARGA\n\
                   100,120,3,2,1,500\n\
                   150,,3,2,1,600\n\
                   abc,200,4,3,2,700\n\
                   200,240,4,3,\n\
                   300,\"360\",5,4,2,900\n";
        let sample = parse_csv(csv).unwrap();
        assert_eq!(sample.len(), 2);
        assert_eq!(sample.column(Feature::LandArea), &[120.0, 360.0]);
    }

    #[test]
    fn test_csv_quoted_comma_keeps_columns_aligned() {
        let csv = "NO,NAMA RUMAH,HARGA,LB,LT,KT,KM,GRS\n\
                   1,\"Rumah Mewah, Tebet\",3800000000,220,220,3,3,0\n\
                   2,Rumah Asri,4600000000,180,137,4,3,2\n";
        let sample = parse_csv(csv).unwrap();
        assert_eq!(sample.len(), 2);
        assert_eq!(sample.column(Feature::BuildingArea), &[220.0, 180.0]);
        assert_eq!(sample.column(Feature::LandArea), &[220.0, 137.0]);
        assert_eq!(sample.column(Feature::Garages), &[0.0, 2.0]);
    }

    #[test]
    fn test_csv_missing_column_is_error() {
        let csv = "LB,LT,KT,KM\n100,120,3,2\n";
        assert!(matches!(parse_csv(csv), Err(Error::Statistics(_))));
    }

    #[test]
    fn test_csv_with_no_usable_rows_is_error() {
        let csv = "LB,LT,KT,KM,GRS\n,,,,\n";
        assert!(parse_csv(csv).is_err());
    }

    #[test]
    fn test_empty_raw_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReferenceConfig {
            raw_path: PathBuf::from(dir.path().join("empty.csv")),
            ..missing_config(dir.path())
        };
        std::fs::write(&config.raw_path, "").unwrap();
        let reference = ReferenceStatistics::initialize(&config);
        assert_eq!(reference.source, ReferenceSource::Synthetic);
    }

    #[test]
    fn test_serialized_without_sample() {
        let reference = ReferenceStatistics::synthetic(42, 10);
        let value = serde_json::to_value(&reference).unwrap();
        assert_eq!(value["source"], "synthetic");
        assert_eq!(value["count"], 10);
        assert!(value["summaries"]["LB"]["mean"].is_number());
        assert!(value.get("sample").is_none());
    }
}
