//! Serialized regressors.
//!
//! The offline trainer exports each model as a JSON document tagged by
//! `kind`. Two shapes are understood:
//!
//! ```json
//! {"kind": "linear", "name": "Linear Regression", "intercept": 1.5e8,
//!  "coefficients": {"LB": 4.1e6, "LT": 3.2e6, "KT": -2.0e7, "KM": 1.1e7, "GRS": 5.0e6}}
//! ```
//!
//! ```json
//! {"kind": "forest", "name": "Random Forest", "trees": [
//!   {"nodes": [{"feature": "LB", "threshold": 120.5, "left": 1, "right": 2},
//!              {"value": 9.0e8}, {"value": 2.1e9}]}]}
//! ```

use price_sentinel_core::{
    features::{Feature, FeatureVector},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

/// A fitted model mapping house features to a price.
pub trait Regressor: Debug + Send + Sync {
    /// Predict a price for one feature vector
    fn predict(&self, features: &FeatureVector) -> f64;

    /// Short model family name
    fn kind(&self) -> &'static str;
}

/// A model artifact as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearModel),
    Forest(ForestModel),
}

impl ModelArtifact {
    /// Read, parse and validate an artifact file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let artifact: ModelArtifact = serde_json::from_str(&content)?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Structural checks that make prediction total
    pub fn validate(&self) -> Result<()> {
        match self {
            ModelArtifact::Linear(model) => model.validate(),
            ModelArtifact::Forest(model) => model.validate(),
        }
    }

    /// Name recorded by the trainer, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            ModelArtifact::Linear(model) => model.name.as_deref(),
            ModelArtifact::Forest(model) => model.name.as_deref(),
        }
    }

    pub fn into_regressor(self) -> Arc<dyn Regressor> {
        match self {
            ModelArtifact::Linear(model) => Arc::new(model),
            ModelArtifact::Forest(model) => Arc::new(model),
        }
    }
}

/// Ordinary least squares model: `intercept + Σ coefficient * feature`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default)]
    pub name: Option<String>,
    pub intercept: f64,
    pub coefficients: BTreeMap<Feature, f64>,
}

impl LinearModel {
    pub fn new(intercept: f64, coefficients: [f64; 5]) -> Self {
        Self {
            name: None,
            intercept,
            coefficients: Feature::ALL.into_iter().zip(coefficients).collect(),
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.intercept.is_finite() {
            return Err(Error::model("linear model intercept is not finite"));
        }
        for feature in Feature::ALL {
            match self.coefficients.get(&feature) {
                Some(c) if c.is_finite() => {}
                Some(_) => {
                    return Err(Error::model(format!(
                        "linear model coefficient for {} is not finite",
                        feature
                    )))
                }
                None => {
                    return Err(Error::model(format!(
                        "linear model has no coefficient for {}",
                        feature
                    )))
                }
            }
        }
        Ok(())
    }
}

impl Regressor for LinearModel {
    fn predict(&self, features: &FeatureVector) -> f64 {
        features.iter().fold(self.intercept, |acc, (feature, value)| {
            acc + self.coefficients.get(&feature).copied().unwrap_or(0.0) * value as f64
        })
    }

    fn kind(&self) -> &'static str {
        "linear"
    }
}

/// A node of a regression tree. Node 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Go to `left` when `x[feature] <= threshold`, else to `right`
    Split {
        feature: Feature,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A single regression tree in flat (array) form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Children must point strictly forward so every walk terminates.
    fn validate(&self, tree_index: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::model(format!("tree {} has no nodes", tree_index)));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if !threshold.is_finite() {
                        return Err(Error::model(format!(
                            "tree {} node {} has a non-finite threshold",
                            tree_index, index
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= index || child >= self.nodes.len() {
                            return Err(Error::model(format!(
                                "tree {} node {} has invalid child {}",
                                tree_index, index, child
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(Error::model(format!(
                            "tree {} leaf {} is not finite",
                            tree_index, index
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features.get(*feature) as f64 <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Bagged ensemble of regression trees; predicts the mean of its trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
    #[serde(default)]
    pub name: Option<String>,
    pub trees: Vec<DecisionTree>,
}

impl ForestModel {
    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(Error::model("forest has no trees"));
        }
        self.trees
            .iter()
            .enumerate()
            .try_for_each(|(i, tree)| tree.validate(i))
    }
}

impl Regressor for ForestModel {
    fn predict(&self, features: &FeatureVector) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        total / self.trees.len() as f64
    }

    fn kind(&self) -> &'static str {
        "forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn stump(threshold: f64, low: f64, high: f64) -> DecisionTree {
        DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: Feature::BuildingArea,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: low },
                TreeNode::Leaf { value: high },
            ],
        }
    }

    #[test]
    fn test_linear_prediction() {
        let model = LinearModel::new(1_000.0, [10.0, 5.0, 100.0, 50.0, 25.0]);
        let x = FeatureVector::new(100, 120, 3, 2, 1);
        // 1000 + 1000 + 600 + 300 + 100 + 25
        assert_eq!(model.predict(&x), 3_025.0);
    }

    #[test]
    fn test_forest_averages_trees() {
        let forest = ForestModel {
            name: None,
            trees: vec![stump(120.0, 1.0, 3.0), stump(80.0, 10.0, 30.0)],
        };
        assert!(forest.validate().is_ok());

        let small = FeatureVector::new(50, 60, 2, 1, 0);
        let mid = FeatureVector::new(100, 60, 2, 1, 0);
        assert_eq!(forest.predict(&small), (1.0 + 10.0) / 2.0);
        assert_eq!(forest.predict(&mid), (1.0 + 30.0) / 2.0);
    }

    #[test]
    fn test_threshold_goes_left_when_equal() {
        let tree = stump(100.0, 1.0, 2.0);
        assert_eq!(tree.predict(&FeatureVector::new(100, 0, 0, 0, 0)), 1.0);
        assert_eq!(tree.predict(&FeatureVector::new(101, 0, 0, 0, 0)), 2.0);
    }

    #[test]
    fn test_parse_tagged_artifacts() {
        let linear: ModelArtifact = serde_json::from_value(json!({
            "kind": "linear",
            "name": "Linear Regression",
            "intercept": 0.0,
            "coefficients": {"LB": 1.0, "LT": 1.0, "KT": 1.0, "KM": 1.0, "GRS": 1.0}
        }))
        .unwrap();
        assert!(linear.validate().is_ok());
        assert_eq!(linear.name(), Some("Linear Regression"));

        let forest: ModelArtifact = serde_json::from_value(json!({
            "kind": "forest",
            "trees": [{"nodes": [
                {"feature": "KT", "threshold": 2.5, "left": 1, "right": 2},
                {"value": 5.0},
                {"value": 7.0}
            ]}]
        }))
        .unwrap();
        assert!(forest.validate().is_ok());
        assert_eq!(forest.name(), None);
        let regressor = forest.into_regressor();
        assert_eq!(regressor.kind(), "forest");
        assert_eq!(regressor.predict(&FeatureVector::new(1, 1, 3, 1, 1)), 7.0);
    }

    #[test]
    fn test_linear_missing_coefficient_rejected() {
        let artifact: ModelArtifact = serde_json::from_value(json!({
            "kind": "linear",
            "intercept": 0.0,
            "coefficients": {"LB": 1.0}
        }))
        .unwrap();
        assert!(matches!(artifact.validate(), Err(Error::Model(_))));
    }

    #[test]
    fn test_backward_child_rejected() {
        let forest = ForestModel {
            name: None,
            trees: vec![DecisionTree {
                nodes: vec![
                    TreeNode::Split {
                        feature: Feature::LandArea,
                        threshold: 1.0,
                        left: 0,
                        right: 1,
                    },
                    TreeNode::Leaf { value: 1.0 },
                ],
            }],
        };
        assert!(forest.validate().is_err());

        let empty = ForestModel {
            name: None,
            trees: vec![],
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let artifact = ModelArtifact::Linear(LinearModel::new(5.0, [1.0; 5]));
        write!(file, "{}", serde_json::to_string(&artifact).unwrap()).unwrap();

        let loaded = ModelArtifact::load(file.path()).unwrap();
        let x = FeatureVector::new(1, 1, 1, 1, 1);
        assert_eq!(loaded.into_regressor().predict(&x), 10.0);
    }
}
