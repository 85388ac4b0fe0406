//! Range checks on request features.

use price_sentinel_core::{
    config::ValidationConfig,
    features::{Feature, FeatureRange, FeatureVector},
};
use std::collections::BTreeMap;

/// Checks each feature against its configured inclusive range.
///
/// Features without a configured range are not checked. Out-of-range values
/// are rejected, never clamped.
#[derive(Debug, Clone)]
pub struct FieldValidator {
    enforce: bool,
    ranges: BTreeMap<Feature, FeatureRange>,
}

impl Default for FieldValidator {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}

impl FieldValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            enforce: config.enforce,
            ranges: config.ranges.clone(),
        }
    }

    /// A validator that accepts every vector
    pub fn permissive() -> Self {
        Self {
            enforce: false,
            ranges: BTreeMap::new(),
        }
    }

    pub fn is_enforced(&self) -> bool {
        self.enforce
    }

    /// First violation in canonical feature order, as a message
    pub fn validate(&self, features: &FeatureVector) -> Result<(), String> {
        if !self.enforce {
            return Ok(());
        }
        for (feature, value) in features.iter() {
            if let Some(range) = self.ranges.get(&feature) {
                if !range.contains(value) {
                    return Err(format!(
                        "{}={} is outside the admissible range [{}, {}]",
                        feature, value, range.min, range.max
                    ));
                }
            }
        }
        Ok(())
    }
}
