//! Input drift analysis.
//!
//! # Detection Method
//! The last `window` successful request inputs form the current sample.
//! Each feature is compared with its reference column:
//! - statistical: chi-square for categorical-looking features, two-sample
//!   KS otherwise; a feature drifts when p < significance
//! - mean shift: |current mean - reference mean| / reference std > 0.5
//!
//! Reports are recomputed on every call and never cached.

use crate::stats::StatTest;
use price_sentinel_core::{
    config::MonitoringConfig,
    features::{Feature, FeatureVector},
    stats, Error, Result,
};
use price_sentinel_storage::{PredictionLog, ReferenceStatistics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// p-value below which a drifted feature is rated high severity
pub const HIGH_SEVERITY_P_VALUE: f64 = 0.01;

/// Share of drifted features at which the whole dataset counts as drifted
pub const DATASET_DRIFT_SHARE: f64 = 0.5;

/// Drifted feature count that alone makes the overall status high
pub const HIGH_DRIFTED_FEATURES: usize = 3;

/// Standardized mean shift above which a feature counts as drifted
pub const MEAN_SHIFT_DRIFT: f64 = 0.5;

/// Standardized mean shift from which severity is high
pub const MEAN_SHIFT_HIGH: f64 = 1.5;

/// Drift severity, used per feature and for the overall status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Algorithm that produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftMethod {
    Statistical,
    Fallback,
}

impl DriftMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftMethod::Statistical => "statistical",
            DriftMethod::Fallback => "fallback",
        }
    }
}

/// Drift verdict for one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDrift {
    pub feature_name: String,
    pub drift_detected: bool,
    pub drift_score: f64,
    pub p_value: Option<f64>,
    pub stattest: String,
    pub severity: Severity,
    pub reference_mean: f64,
    pub current_mean: f64,
    pub reference_std: f64,
    pub current_std: f64,
}

/// Dataset-level drift report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub overall_status: Severity,
    pub dataset_drift: bool,
    pub drift_share: f64,
    pub drifted_features_count: usize,
    pub total_features: usize,
    pub features: BTreeMap<Feature, FeatureDrift>,
    pub sample_size: usize,
    pub reference_size: usize,
    pub method: DriftMethod,
}

impl DriftReport {
    fn drifted_count(features: &BTreeMap<Feature, FeatureDrift>) -> usize {
        features.values().filter(|f| f.drift_detected).count()
    }

    fn max_severity(features: &BTreeMap<Feature, FeatureDrift>) -> Severity {
        features
            .values()
            .map(|f| f.severity)
            .max()
            .unwrap_or(Severity::Low)
    }
}

/// Payload returned instead of a report while too few predictions exist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsufficientData {
    pub overall_status: String,
    pub message: String,
    pub current_samples: usize,
}

impl InsufficientData {
    pub fn new(current_samples: usize, min_samples: usize) -> Self {
        Self {
            overall_status: "insufficient_data".to_string(),
            message: format!(
                "At least {} successful predictions are required for drift analysis",
                min_samples
            ),
            current_samples,
        }
    }
}

/// A drift algorithm over the current sample and the reference statistics.
pub trait DriftAlgorithm: fmt::Debug + Send + Sync {
    fn method(&self) -> DriftMethod;

    fn analyze(
        &self,
        reference: &ReferenceStatistics,
        current: &[FeatureVector],
    ) -> Result<DriftReport>;
}

fn column(current: &[FeatureVector], feature: Feature) -> Vec<f64> {
    current.iter().map(|v| v.get(feature) as f64).collect()
}

/// Per-feature statistical tests (KS / chi-square).
#[derive(Debug, Clone)]
pub struct StatisticalDrift {
    significance: f64,
}

impl Default for StatisticalDrift {
    fn default() -> Self {
        Self { significance: 0.05 }
    }
}

impl StatisticalDrift {
    pub fn new(significance: f64) -> Self {
        Self { significance }
    }

    fn feature_drift(
        &self,
        reference: &[f64],
        current: &[f64],
        feature: Feature,
    ) -> Result<FeatureDrift> {
        let test = StatTest::for_reference(reference);
        let outcome = test.run(reference, current)?;
        let p = outcome.p_value;
        if !p.is_finite() {
            return Err(Error::statistics(format!(
                "{} test on {} gave no p-value",
                test.name(),
                feature
            )));
        }

        let drift_detected = p < self.significance;
        let severity = if !drift_detected {
            Severity::Low
        } else if p < HIGH_SEVERITY_P_VALUE {
            Severity::High
        } else {
            Severity::Medium
        };

        debug!(
            feature = %feature,
            test = test.name(),
            statistic = outcome.statistic,
            p_value = p,
            drift_detected,
            "Feature tested"
        );

        Ok(FeatureDrift {
            feature_name: feature.display_name().to_string(),
            drift_detected,
            drift_score: stats::round_to(p, 4),
            p_value: Some(stats::round_to(p, 4)),
            stattest: test.name().to_string(),
            severity,
            reference_mean: stats::round_to(stats::mean(reference), 2),
            current_mean: stats::round_to(stats::mean(current), 2),
            reference_std: stats::round_to(stats::std_dev(reference), 2),
            current_std: stats::round_to(stats::std_dev(current), 2),
        })
    }
}

impl DriftAlgorithm for StatisticalDrift {
    fn method(&self) -> DriftMethod {
        DriftMethod::Statistical
    }

    fn analyze(
        &self,
        reference: &ReferenceStatistics,
        current: &[FeatureVector],
    ) -> Result<DriftReport> {
        if reference.sample().is_empty() {
            return Err(Error::statistics("reference sample is empty"));
        }
        if current.is_empty() {
            return Err(Error::statistics("current sample is empty"));
        }

        let mut features = BTreeMap::new();
        for feature in Feature::ALL {
            let reference_column = reference.sample().column(feature);
            let current_column = column(current, feature);
            features.insert(
                feature,
                self.feature_drift(reference_column, &current_column, feature)?,
            );
        }

        let total = features.len();
        let drifted = DriftReport::drifted_count(&features);
        let drift_share = drifted as f64 / total as f64;
        let dataset_drift = drift_share >= DATASET_DRIFT_SHARE;
        let max_severity = DriftReport::max_severity(&features);

        let overall_status = if dataset_drift
            || drifted >= HIGH_DRIFTED_FEATURES
            || max_severity == Severity::High
        {
            Severity::High
        } else if drifted >= 1 || max_severity == Severity::Medium {
            Severity::Medium
        } else {
            Severity::Low
        };

        Ok(DriftReport {
            overall_status,
            dataset_drift,
            drift_share: stats::round_to(drift_share, 2),
            drifted_features_count: drifted,
            total_features: total,
            features,
            sample_size: current.len(),
            reference_size: reference.count,
            method: DriftMethod::Statistical,
        })
    }
}

/// Standardized mean shift against the reference summaries.
#[derive(Debug, Clone, Default)]
pub struct MeanShiftDrift;

impl MeanShiftDrift {
    /// Build the report. Cannot fail for a non-empty current sample.
    pub fn report(
        &self,
        reference: &ReferenceStatistics,
        current: &[FeatureVector],
    ) -> DriftReport {
        let mut features = BTreeMap::new();

        for feature in Feature::ALL {
            let (ref_mean, ref_std) = reference
                .summary(feature)
                .map_or((0.0, 0.0), |s| (s.mean, s.std));
            let current_column = column(current, feature);
            let cur_mean = stats::mean(&current_column);

            let score = if ref_std > 0.0 {
                (cur_mean - ref_mean).abs() / ref_std
            } else {
                0.0
            };
            let severity = if score < MEAN_SHIFT_DRIFT {
                Severity::Low
            } else if score < MEAN_SHIFT_HIGH {
                Severity::Medium
            } else {
                Severity::High
            };

            features.insert(
                feature,
                FeatureDrift {
                    feature_name: feature.display_name().to_string(),
                    drift_detected: score > MEAN_SHIFT_DRIFT,
                    drift_score: stats::round_to(score, 4),
                    p_value: None,
                    stattest: "z-score".to_string(),
                    severity,
                    reference_mean: stats::round_to(ref_mean, 2),
                    current_mean: stats::round_to(cur_mean, 2),
                    reference_std: stats::round_to(ref_std, 2),
                    current_std: stats::round_to(stats::std_dev(&current_column), 2),
                },
            );
        }

        let total = features.len();
        let drifted = DriftReport::drifted_count(&features);
        let overall_status = DriftReport::max_severity(&features);

        DriftReport {
            overall_status,
            dataset_drift: overall_status != Severity::Low,
            drift_share: drifted as f64 / total as f64,
            drifted_features_count: drifted,
            total_features: total,
            features,
            sample_size: current.len(),
            reference_size: reference.count,
            method: DriftMethod::Fallback,
        }
    }
}

impl DriftAlgorithm for MeanShiftDrift {
    fn method(&self) -> DriftMethod {
        DriftMethod::Fallback
    }

    fn analyze(
        &self,
        reference: &ReferenceStatistics,
        current: &[FeatureVector],
    ) -> Result<DriftReport> {
        if current.is_empty() {
            return Err(Error::statistics("current sample is empty"));
        }
        Ok(self.report(reference, current))
    }
}

/// Drift detection settings
#[derive(Debug, Clone)]
pub struct DriftConfig {
    pub min_samples: usize,
    pub window: usize,
    pub significance: f64,
    pub statistical_tests: bool,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self::from(&MonitoringConfig::default())
    }
}

impl From<&MonitoringConfig> for DriftConfig {
    fn from(config: &MonitoringConfig) -> Self {
        Self {
            min_samples: config.drift_min_samples,
            window: config.drift_window,
            significance: config.drift_significance,
            statistical_tests: config.statistical_tests,
        }
    }
}

/// Runs the statistical algorithm and downgrades to the mean-shift one on
/// any error.
#[derive(Debug, Clone)]
pub struct DriftDetector {
    config: DriftConfig,
    primary: StatisticalDrift,
    fallback: MeanShiftDrift,
}

impl Default for DriftDetector {
    fn default() -> Self {
        Self::new(DriftConfig::default())
    }
}

impl DriftDetector {
    pub fn new(config: DriftConfig) -> Self {
        info!(
            min_samples = config.min_samples,
            window = config.window,
            significance = config.significance,
            statistical_tests = config.statistical_tests,
            "Creating drift detector"
        );
        Self {
            primary: StatisticalDrift::new(config.significance),
            fallback: MeanShiftDrift,
            config,
        }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// Insufficient-data payload for the current log state
    pub fn insufficient(&self, log: &PredictionLog) -> InsufficientData {
        InsufficientData::new(log.success_count(), self.config.min_samples)
    }

    /// Analyze the recent successful inputs.
    ///
    /// Returns `None` while fewer than `min_samples` successes are logged.
    pub fn analyze(
        &self,
        log: &PredictionLog,
        reference: &ReferenceStatistics,
    ) -> Option<DriftReport> {
        let current = log.recent_successes(self.config.window);
        if current.len() < self.config.min_samples {
            debug!(
                current_samples = current.len(),
                min_samples = self.config.min_samples,
                "Not enough predictions for drift analysis"
            );
            return None;
        }

        let report = if self.config.statistical_tests {
            match self.primary.analyze(reference, &current) {
                Ok(report) => report,
                Err(e) => {
                    warn!(
                        error = %e,
                        "Statistical drift analysis failed, using mean-shift fallback"
                    );
                    self.fallback.report(reference, &current)
                }
            }
        } else {
            self.fallback.report(reference, &current)
        };

        if report.overall_status == Severity::High {
            warn!(
                drifted = report.drifted_features_count,
                drift_share = report.drift_share,
                method = report.method.as_str(),
                "High input drift detected"
            );
        } else {
            debug!(
                status = %report.overall_status,
                drifted = report.drifted_features_count,
                method = report.method.as_str(),
                "Drift analysis complete"
            );
        }
        ::metrics::counter!(
            "price_sentinel_drift_reports_total",
            "method" => report.method.as_str(),
            "status" => report.overall_status.as_str()
        )
        .increment(1);

        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use price_sentinel_models::{ModelSlot, PredictionDetails, Selection};
    use price_sentinel_storage::{LogEntry, ReferenceSample, ReferenceSource};
    use serde_json::Map;

    /// Reference with 20 distinct areas and 3 bedroom/bathroom/garage levels
    fn reference() -> ReferenceStatistics {
        let rows = (0..60).map(|i| {
            let i = i as f64;
            [
                100.0 + (i % 20.0) * 5.0,
                150.0 + (i % 20.0) * 5.0,
                2.0 + i % 3.0,
                1.0 + i % 3.0,
                i % 3.0,
            ]
        });
        let sample = ReferenceSample::from_rows(rows).unwrap();
        ReferenceStatistics::from_sample(ReferenceSource::Processed, sample)
    }

    fn empty_reference() -> ReferenceStatistics {
        ReferenceStatistics::from_sample(ReferenceSource::Synthetic, ReferenceSample::default())
    }

    /// Constant columns except LB, which is 90/100/110 (mean 100, std 10)
    fn spread_lb_reference() -> ReferenceStatistics {
        let sample = ReferenceSample::from_rows(vec![
            [90.0, 100.0, 3.0, 2.0, 1.0],
            [100.0, 100.0, 3.0, 2.0, 1.0],
            [110.0, 100.0, 3.0, 2.0, 1.0],
        ])
        .unwrap();
        ReferenceStatistics::from_sample(ReferenceSource::Processed, sample)
    }

    fn in_distribution(n: usize) -> Vec<FeatureVector> {
        (0..n)
            .map(|i| {
                let i = i as i64;
                FeatureVector::new(
                    100 + (i % 20) * 5,
                    150 + (i % 20) * 5,
                    2 + i % 3,
                    1 + i % 3,
                    i % 3,
                )
            })
            .collect()
    }

    fn shifted(n: usize) -> Vec<FeatureVector> {
        (0..n)
            .map(|i| FeatureVector::new(900 + i as i64, 1_500 + i as i64, 9, 8, 6))
            .collect()
    }

    fn log_with(vectors: &[FeatureVector]) -> PredictionLog {
        let log = PredictionLog::new(100);
        for v in vectors {
            let selection = Selection {
                value: 1.0,
                model_used: "Linear Regression".to_string(),
                slot: ModelSlot::Primary,
                details: PredictionDetails {
                    model1: None,
                    model2: None,
                    switched: false,
                },
            };
            log.append(LogEntry::success(*v, &selection));
        }
        log
    }

    #[test]
    fn test_statistical_no_drift() {
        let report = StatisticalDrift::default()
            .analyze(&reference(), &in_distribution(60))
            .unwrap();
        assert_eq!(report.method, DriftMethod::Statistical);
        assert_eq!(report.overall_status, Severity::Low);
        assert!(!report.dataset_drift);
        assert_eq!(report.drifted_features_count, 0);
        assert_eq!(report.total_features, 5);
        assert_eq!(report.sample_size, 60);
        assert_eq!(report.reference_size, 60);

        let lb = &report.features[&Feature::BuildingArea];
        assert_eq!(lb.stattest, "K-S p_value");
        assert_eq!(lb.feature_name, "Luas Bangunan");
        assert_eq!(lb.drift_score, lb.p_value.unwrap());
        assert_eq!(report.features[&Feature::Garages].stattest, "chi-square p_value");
    }

    #[test]
    fn test_statistical_full_drift() {
        let report = StatisticalDrift::default()
            .analyze(&reference(), &shifted(20))
            .unwrap();
        assert_eq!(report.overall_status, Severity::High);
        assert!(report.dataset_drift);
        assert_eq!(report.drifted_features_count, 5);
        assert_eq!(report.drift_share, 1.0);
        assert!(report
            .features
            .values()
            .all(|f| f.drift_detected && f.severity == Severity::High));
    }

    #[test]
    fn test_statistical_rejects_empty_reference() {
        let empty = empty_reference();
        assert!(StatisticalDrift::default()
            .analyze(&empty, &in_distribution(10))
            .is_err());
    }

    #[test]
    fn test_mean_shift_scores() {
        let reference = reference();
        let report = MeanShiftDrift.report(&reference, &in_distribution(60));
        assert_eq!(report.method, DriftMethod::Fallback);
        assert_eq!(report.overall_status, Severity::Low);
        assert!(!report.dataset_drift);
        assert!(report.features.values().all(|f| f.p_value.is_none()));
        assert!(report.features.values().all(|f| f.stattest == "z-score"));

        let drifted = MeanShiftDrift.report(&reference, &shifted(10));
        assert_eq!(drifted.overall_status, Severity::High);
        assert!(drifted.dataset_drift);
        assert_eq!(drifted.drift_share, 1.0);

        let lb = &drifted.features[&Feature::BuildingArea];
        let summary = reference.summary(Feature::BuildingArea).unwrap();
        let expected = (904.5 - summary.mean).abs() / summary.std;
        assert!((lb.drift_score - stats::round_to(expected, 4)).abs() < 1e-9);
    }

    #[test]
    fn test_statistical_single_medium_feature() {
        // GRS counts 30/15/15 against an even reference: chi-square 7.5, p ~ 0.023
        let current: Vec<FeatureVector> = in_distribution(60)
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                let garages = match i {
                    0..=29 => 0,
                    30..=44 => 1,
                    _ => 2,
                };
                FeatureVector::new(
                    v.get(Feature::BuildingArea),
                    v.get(Feature::LandArea),
                    v.get(Feature::Bedrooms),
                    v.get(Feature::Bathrooms),
                    garages,
                )
            })
            .collect();

        let report = StatisticalDrift::default()
            .analyze(&reference(), &current)
            .unwrap();
        let grs = &report.features[&Feature::Garages];
        let p = grs.p_value.unwrap();
        assert!(p >= HIGH_SEVERITY_P_VALUE && p < 0.05, "p = {}", p);
        assert!(grs.drift_detected);
        assert_eq!(grs.severity, Severity::Medium);

        assert_eq!(report.drifted_features_count, 1);
        assert_eq!(report.drift_share, 0.2);
        assert!(!report.dataset_drift);
        assert_eq!(report.overall_status, Severity::Medium);
        assert!(report
            .features
            .iter()
            .filter(|(f, _)| **f != Feature::Garages)
            .all(|(_, d)| !d.drift_detected && d.severity == Severity::Low));
    }

    #[test]
    fn test_mean_shift_medium_severity() {
        let current = vec![FeatureVector::new(110, 100, 3, 2, 1); 5];
        let report = MeanShiftDrift.report(&spread_lb_reference(), &current);

        let lb = &report.features[&Feature::BuildingArea];
        assert_eq!(lb.drift_score, 1.0);
        assert!(lb.drift_detected);
        assert_eq!(lb.severity, Severity::Medium);
        assert_eq!(report.drifted_features_count, 1);
        assert_eq!(report.drift_share, 0.2);
        assert_eq!(report.overall_status, Severity::Medium);
        assert!(report.dataset_drift);
    }

    #[test]
    fn test_mean_shift_boundary_is_medium_but_not_drifted() {
        let current = vec![FeatureVector::new(105, 100, 3, 2, 1); 5];
        let report = MeanShiftDrift.report(&spread_lb_reference(), &current);

        let lb = &report.features[&Feature::BuildingArea];
        assert_eq!(lb.drift_score, MEAN_SHIFT_DRIFT);
        assert!(!lb.drift_detected);
        assert_eq!(lb.severity, Severity::Medium);
        assert_eq!(report.drifted_features_count, 0);
        assert_eq!(report.overall_status, Severity::Medium);
    }

    #[test]
    fn test_mean_shift_zero_reference_std() {
        let sample = ReferenceSample::from_rows(vec![[100.0, 100.0, 3.0, 2.0, 1.0]; 4]).unwrap();
        let reference = ReferenceStatistics::from_sample(ReferenceSource::Processed, sample);
        let report = MeanShiftDrift.report(&reference, &shifted(5));
        assert!(report.features.values().all(|f| f.drift_score == 0.0));
        assert_eq!(report.overall_status, Severity::Low);
    }

    #[test]
    fn test_detector_requires_min_samples() {
        let detector = DriftDetector::default();
        let reference = reference();
        let vectors = in_distribution(5);

        let log = log_with(&vectors[..4]);
        assert!(detector.analyze(&log, &reference).is_none());
        let insufficient = detector.insufficient(&log);
        assert_eq!(insufficient.overall_status, "insufficient_data");
        assert_eq!(insufficient.current_samples, 4);

        log.append(LogEntry::failure(Map::new(), "bad input"));
        assert!(detector.analyze(&log, &reference).is_none());

        let log = log_with(&vectors);
        let report = detector.analyze(&log, &reference).unwrap();
        assert_eq!(report.sample_size, 5);
    }

    #[test]
    fn test_detector_window_uses_latest_successes() {
        let config = DriftConfig {
            window: 10,
            ..DriftConfig::default()
        };
        let detector = DriftDetector::new(config);
        let mut vectors = shifted(30);
        vectors.extend(in_distribution(60));
        let log = log_with(&vectors);

        let report = detector.analyze(&log, &reference()).unwrap();
        assert_eq!(report.sample_size, 10);
        // Last ten inputs have LB 150..=195
        assert_eq!(report.features[&Feature::BuildingArea].current_mean, 172.5);
    }

    #[test]
    fn test_detector_fallback_paths() {
        let log = log_with(&shifted(10));

        let disabled = DriftDetector::new(DriftConfig {
            statistical_tests: false,
            ..DriftConfig::default()
        });
        let report = disabled.analyze(&log, &reference()).unwrap();
        assert_eq!(report.method, DriftMethod::Fallback);

        let empty = empty_reference();
        let report = DriftDetector::default().analyze(&log, &empty).unwrap();
        assert_eq!(report.method, DriftMethod::Fallback);
        assert_eq!(report.overall_status, Severity::Low);
    }

    #[test]
    fn test_report_serialization() {
        let report = MeanShiftDrift.report(&reference(), &shifted(5));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["overall_status"], "high");
        assert_eq!(value["method"], "fallback");
        assert!(value["features"]["GRS"]["p_value"].is_null());
        assert_eq!(value["features"]["LB"]["severity"], "high");
    }
}
