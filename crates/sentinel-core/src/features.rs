//! The five house features and the typed feature vector built from request
//! bodies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A model input feature.
///
/// Declaration order is the canonical column order used by models, the
/// reference sample and drift reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Feature {
    /// Building area (m2)
    #[serde(rename = "LB")]
    BuildingArea,
    /// Land area (m2)
    #[serde(rename = "LT")]
    LandArea,
    /// Number of bedrooms
    #[serde(rename = "KT")]
    Bedrooms,
    /// Number of bathrooms
    #[serde(rename = "KM")]
    Bathrooms,
    /// Garage capacity
    #[serde(rename = "GRS")]
    Garages,
}

impl Feature {
    /// All features in canonical order
    pub const ALL: [Feature; 5] = [
        Feature::BuildingArea,
        Feature::LandArea,
        Feature::Bedrooms,
        Feature::Bathrooms,
        Feature::Garages,
    ];

    /// Wire name of the feature
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::BuildingArea => "LB",
            Feature::LandArea => "LT",
            Feature::Bedrooms => "KT",
            Feature::Bathrooms => "KM",
            Feature::Garages => "GRS",
        }
    }

    /// Human-readable name shown in reports
    pub fn display_name(&self) -> &'static str {
        match self {
            Feature::BuildingArea => "Luas Bangunan",
            Feature::LandArea => "Luas Tanah",
            Feature::Bedrooms => "Kamar Tidur",
            Feature::Bathrooms => "Kamar Mandi",
            Feature::Garages => "Garasi",
        }
    }

    /// Whether the feature counts discrete things rather than measuring area
    pub fn is_count(&self) -> bool {
        matches!(
            self,
            Feature::Bedrooms | Feature::Bathrooms | Feature::Garages
        )
    }

    /// Position in [`Feature::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("Unknown feature: {}", s))
    }
}

/// Inclusive admissible range for a feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    pub min: i64,
    pub max: i64,
}

impl FeatureRange {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Why a raw request body could not become a [`FeatureVector`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureParseError {
    /// One or more features were absent, listed in canonical order
    #[error("Missing features: [{}]", join_features(.0))]
    Missing(Vec<Feature>),

    /// A value could not be coerced to an integer
    #[error("Cannot convert {feature}={value} to integer")]
    NotCoercible { feature: Feature, value: String },
}

fn join_features(features: &[Feature]) -> String {
    features
        .iter()
        .map(Feature::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A complete, integer-valued set of house features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(rename = "LB")]
    pub building_area: i64,
    #[serde(rename = "LT")]
    pub land_area: i64,
    #[serde(rename = "KT")]
    pub bedrooms: i64,
    #[serde(rename = "KM")]
    pub bathrooms: i64,
    #[serde(rename = "GRS")]
    pub garages: i64,
}

impl FeatureVector {
    pub fn new(
        building_area: i64,
        land_area: i64,
        bedrooms: i64,
        bathrooms: i64,
        garages: i64,
    ) -> Self {
        Self {
            building_area,
            land_area,
            bedrooms,
            bathrooms,
            garages,
        }
    }

    /// Build a vector from an untyped JSON object.
    ///
    /// Every feature key must be present; missing keys are reported together
    /// before any coercion is attempted. Extra keys are ignored.
    pub fn from_json(object: &Map<String, Value>) -> Result<Self, FeatureParseError> {
        let missing: Vec<Feature> = Feature::ALL
            .into_iter()
            .filter(|f| !object.contains_key(f.as_str()))
            .collect();
        if !missing.is_empty() {
            return Err(FeatureParseError::Missing(missing));
        }

        let mut values = [0i64; 5];
        for feature in Feature::ALL {
            let raw = &object[feature.as_str()];
            values[feature.index()] =
                coerce_integer(raw).ok_or_else(|| FeatureParseError::NotCoercible {
                    feature,
                    value: raw.to_string(),
                })?;
        }

        Ok(Self::from_array(values))
    }

    /// Build from values in canonical order
    pub fn from_array(values: [i64; 5]) -> Self {
        Self::new(values[0], values[1], values[2], values[3], values[4])
    }

    /// Value of one feature
    pub fn get(&self, feature: Feature) -> i64 {
        match feature {
            Feature::BuildingArea => self.building_area,
            Feature::LandArea => self.land_area,
            Feature::Bedrooms => self.bedrooms,
            Feature::Bathrooms => self.bathrooms,
            Feature::Garages => self.garages,
        }
    }

    /// (feature, value) pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Feature, i64)> + '_ {
        Feature::ALL.into_iter().map(move |f| (f, self.get(f)))
    }
}

/// Integer coercion for request values.
///
/// Integers pass through, finite floats truncate toward zero, numeric strings
/// are parsed the same way. Everything else is rejected.
pub fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(truncate_float)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate_float))
        }
        _ => None,
    }
}

fn truncate_float(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let truncated = value.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return None;
    }
    Some(truncated as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_feature_order_and_names() {
        let names: Vec<&str> = Feature::ALL.iter().map(Feature::as_str).collect();
        assert_eq!(names, vec!["LB", "LT", "KT", "KM", "GRS"]);
        assert!(Feature::Garages.is_count());
        assert!(!Feature::LandArea.is_count());
        assert_eq!("KM".parse::<Feature>().unwrap(), Feature::Bathrooms);
        assert!("HARGA".parse::<Feature>().is_err());
    }

    #[test]
    fn test_from_json_complete() {
        let body = object(json!({"LB": 100, "LT": 120, "KT": 3, "KM": 2, "GRS": 1, "extra": true}));
        let vector = FeatureVector::from_json(&body).unwrap();
        assert_eq!(vector, FeatureVector::new(100, 120, 3, 2, 1));
    }

    #[test]
    fn test_from_json_reports_every_missing_key() {
        let body = object(json!({"LB": 100, "KM": 2}));
        let err = FeatureVector::from_json(&body).unwrap_err();
        assert_eq!(
            err,
            FeatureParseError::Missing(vec![
                Feature::LandArea,
                Feature::Bedrooms,
                Feature::Garages
            ])
        );
        assert_eq!(err.to_string(), "Missing features: [LT, KT, GRS]");
    }

    #[test]
    fn test_coercion_rules() {
        assert_eq!(coerce_integer(&json!(7)), Some(7));
        assert_eq!(coerce_integer(&json!(7.9)), Some(7));
        assert_eq!(coerce_integer(&json!(-2.5)), Some(-2));
        assert_eq!(coerce_integer(&json!(" 12 ")), Some(12));
        assert_eq!(coerce_integer(&json!("12.5")), Some(12));
        assert_eq!(coerce_integer(&json!("twelve")), None);
        assert_eq!(coerce_integer(&json!(true)), None);
        assert_eq!(coerce_integer(&Value::Null), None);
        assert_eq!(coerce_integer(&json!([1])), None);
    }

    #[test]
    fn test_not_coercible_names_the_feature() {
        let body = object(json!({"LB": 100, "LT": "big", "KT": 3, "KM": 2, "GRS": 1}));
        let err = FeatureVector::from_json(&body).unwrap_err();
        assert!(matches!(
            err,
            FeatureParseError::NotCoercible { feature: Feature::LandArea, .. }
        ));
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let vector = FeatureVector::new(100, 120, 3, 2, 1);
        let value = serde_json::to_value(vector).unwrap();
        assert_eq!(value, json!({"LB": 100, "LT": 120, "KT": 3, "KM": 2, "GRS": 1}));
    }

    #[test]
    fn test_range_is_inclusive() {
        let range = FeatureRange::new(1, 10);
        assert!(range.contains(1));
        assert!(range.contains(10));
        assert!(!range.contains(0));
        assert!(!range.contains(11));
    }
}
