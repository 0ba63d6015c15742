//! Serialized estimators
//!
//! Estimators are stored as JSON tagged by `kind`. At load time each one is
//! turned into an [`Estimator`] whose [`Capability`] says whether it yields
//! class probabilities or a scalar, so the prediction path never probes for it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PredictionError;

/// Estimator as it appears in the artifact bundle under `model`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SerializedEstimator {
    RandomForestClassifier(RandomForestClassifier),
    LogisticRegression(LogisticRegression),
    GradientBoostingRegressor(GradientBoostingRegressor),
    LinearRegression(LinearRegression),
}

impl SerializedEstimator {
    pub fn kind(&self) -> &'static str {
        match self {
            SerializedEstimator::RandomForestClassifier(_) => "random_forest_classifier",
            SerializedEstimator::LogisticRegression(_) => "logistic_regression",
            SerializedEstimator::GradientBoostingRegressor(_) => "gradient_boosting_regressor",
            SerializedEstimator::LinearRegression(_) => "linear_regression",
        }
    }

    /// Input-feature count the estimator was fitted with, if declared
    pub fn n_features_in(&self) -> Option<usize> {
        match self {
            SerializedEstimator::RandomForestClassifier(m) => m.n_features_in,
            SerializedEstimator::LogisticRegression(m) => m.n_features_in,
            SerializedEstimator::GradientBoostingRegressor(m) => m.n_features_in,
            SerializedEstimator::LinearRegression(m) => m.n_features_in,
        }
    }

    /// Resolve the capability once, binding the declared feature count
    pub fn into_estimator(self, n_features: usize) -> Estimator {
        let kind = self.kind();
        let capability = match self {
            SerializedEstimator::RandomForestClassifier(m) => Capability::Probabilistic(Box::new(m)),
            SerializedEstimator::LogisticRegression(m) => Capability::Probabilistic(Box::new(m)),
            SerializedEstimator::GradientBoostingRegressor(m) => Capability::Scalar(Box::new(m)),
            SerializedEstimator::LinearRegression(m) => Capability::Scalar(Box::new(m)),
        };
        Estimator {
            kind,
            n_features,
            capability,
        }
    }
}

/// Estimators that produce a class-probability vector
pub trait ClassProbabilities: Send + Sync + fmt::Debug {
    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, PredictionError>;
}

/// Estimators that produce a single scalar prediction
pub trait ScalarPrediction: Send + Sync + fmt::Debug {
    fn predict(&self, x: &[f64]) -> Result<f64, PredictionError>;
}

#[derive(Debug)]
pub enum Capability {
    Probabilistic(Box<dyn ClassProbabilities>),
    Scalar(Box<dyn ScalarPrediction>),
}

/// A validated, immutable estimator
#[derive(Debug)]
pub struct Estimator {
    kind: &'static str,
    n_features: usize,
    capability: Capability,
}

impl Estimator {
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn is_probabilistic(&self) -> bool {
        matches!(self.capability, Capability::Probabilistic(_))
    }

    pub fn check_shape(&self, x: &[f64]) -> Result<(), PredictionError> {
        if x.len() != self.n_features {
            return Err(PredictionError::ShapeMismatch {
                expected: self.n_features,
                actual: x.len(),
            });
        }
        Ok(())
    }
}

/// Binary tree stored as a flat node array, root at index 0.
///
/// Samples go left when `x[feature] <= threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

impl DecisionTree {
    /// Walk from the root to the leaf selected by `x`
    pub fn leaf(&self, x: &[f64]) -> Result<&[f64], PredictionError> {
        let mut idx = 0;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..self.nodes.len() {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return Ok(value.as_slice()),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = x.get(*feature).ok_or_else(|| {
                        PredictionError::MalformedEstimator(format!(
                            "split on feature {} outside input of {}",
                            feature,
                            x.len()
                        ))
                    })?;
                    idx = if *v <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(PredictionError::MalformedEstimator(format!(
                        "node index {} out of range",
                        idx
                    )))
                }
            }
        }
        Err(PredictionError::MalformedEstimator(
            "tree traversal did not reach a leaf".to_string(),
        ))
    }
}

fn default_classes() -> Vec<i64> {
    vec![0, 1]
}

/// Bagged tree ensemble averaging per-tree class distributions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    #[serde(default)]
    pub n_features_in: Option<usize>,
    #[serde(default = "default_classes")]
    pub classes: Vec<i64>,
    pub trees: Vec<DecisionTree>,
}

impl ClassProbabilities for RandomForestClassifier {
    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, PredictionError> {
        if self.trees.is_empty() {
            return Err(PredictionError::MalformedEstimator(
                "forest has no trees".to_string(),
            ));
        }

        let n_classes = self.classes.len();
        let mut proba = vec![0.0; n_classes];

        for tree in &self.trees {
            let leaf = tree.leaf(x)?;
            if leaf.len() != n_classes {
                return Err(PredictionError::MalformedEstimator(format!(
                    "leaf has {} values for {} classes",
                    leaf.len(),
                    n_classes
                )));
            }
            // Leaves may hold raw sample counts; normalize to a distribution
            let total: f64 = leaf.iter().sum();
            if total.is_nan() || total <= 0.0 {
                return Err(PredictionError::MalformedEstimator(
                    "leaf distribution sums to zero".to_string(),
                ));
            }
            for (p, v) in proba.iter_mut().zip(leaf) {
                *p += v / total;
            }
        }

        let n_trees = self.trees.len() as f64;
        Ok(proba.into_iter().map(|p| p / n_trees).collect())
    }
}

/// Binary logistic regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    #[serde(default)]
    pub n_features_in: Option<usize>,
    #[serde(default = "default_classes")]
    pub classes: Vec<i64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl ClassProbabilities for LogisticRegression {
    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, PredictionError> {
        let z = linear_decision(&self.coefficients, self.intercept, x)?;
        match self.classes.len() {
            1 => Ok(vec![1.0]),
            2 => {
                let p = 1.0 / (1.0 + (-z).exp());
                Ok(vec![1.0 - p, p])
            }
            n => Err(PredictionError::MalformedEstimator(format!(
                "logistic regression supports 1 or 2 classes, got {}",
                n
            ))),
        }
    }
}

/// Additive tree ensemble: `init + learning_rate * sum(tree outputs)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    #[serde(default)]
    pub n_features_in: Option<usize>,
    #[serde(default)]
    pub init: f64,
    pub learning_rate: f64,
    pub trees: Vec<DecisionTree>,
}

impl ScalarPrediction for GradientBoostingRegressor {
    fn predict(&self, x: &[f64]) -> Result<f64, PredictionError> {
        let mut total = 0.0;
        for tree in &self.trees {
            let leaf = tree.leaf(x)?;
            let value = leaf.first().ok_or_else(|| {
                PredictionError::MalformedEstimator("regression leaf is empty".to_string())
            })?;
            total += value;
        }
        Ok(self.init + self.learning_rate * total)
    }
}

/// Ordinary least-squares regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    #[serde(default)]
    pub n_features_in: Option<usize>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl ScalarPrediction for LinearRegression {
    fn predict(&self, x: &[f64]) -> Result<f64, PredictionError> {
        linear_decision(&self.coefficients, self.intercept, x)
    }
}

fn linear_decision(coefficients: &[f64], intercept: f64, x: &[f64]) -> Result<f64, PredictionError> {
    if coefficients.len() != x.len() {
        return Err(PredictionError::MalformedEstimator(format!(
            "{} coefficients for {} features",
            coefficients.len(),
            x.len()
        )));
    }
    Ok(coefficients
        .iter()
        .zip(x)
        .map(|(w, v)| w * v)
        .sum::<f64>()
        + intercept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stump(feature: usize, threshold: f64, left: Vec<f64>, right: Vec<f64>) -> DecisionTree {
        DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: left },
                TreeNode::Leaf { value: right },
            ],
        }
    }

    #[test]
    fn test_deserialize_tagged_estimator() {
        let raw = json!({
            "kind": "random_forest_classifier",
            "n_features_in": 2,
            "trees": [{"nodes": [
                {"feature": 0, "threshold": 5.0, "left": 1, "right": 2},
                {"value": [3.0, 1.0]},
                {"value": [0.0, 4.0]}
            ]}]
        });
        let est: SerializedEstimator = serde_json::from_value(raw).unwrap();

        assert_eq!(est.kind(), "random_forest_classifier");
        assert_eq!(est.n_features_in(), Some(2));
        assert!(est.into_estimator(2).is_probabilistic());
    }

    #[test]
    fn test_tree_goes_left_on_equal() {
        let tree = stump(0, 5.0, vec![1.0], vec![2.0]);
        assert_eq!(tree.leaf(&[5.0]).unwrap(), &[1.0]);
        assert_eq!(tree.leaf(&[5.1]).unwrap(), &[2.0]);
    }

    #[test]
    fn test_tree_rejects_cycles_and_bad_indices() {
        let cyclic = DecisionTree {
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 0.0,
                left: 0,
                right: 0,
            }],
        };
        assert!(matches!(
            cyclic.leaf(&[1.0]),
            Err(PredictionError::MalformedEstimator(_))
        ));

        let dangling = stump(0, 0.0, vec![1.0], vec![1.0]);
        let mut nodes = dangling.nodes.clone();
        nodes.truncate(1);
        let dangling = DecisionTree { nodes };
        assert!(dangling.leaf(&[1.0]).is_err());
    }

    #[test]
    fn test_forest_averages_normalized_leaves() {
        let forest = RandomForestClassifier {
            n_features_in: Some(1),
            classes: vec![0, 1],
            trees: vec![
                stump(0, 5.0, vec![3.0, 1.0], vec![0.0, 4.0]),
                stump(0, 2.0, vec![1.0, 0.0], vec![0.5, 0.5]),
            ],
        };
        let proba = forest.predict_proba(&[4.0]).unwrap();
        // tree 1 -> [0.75, 0.25], tree 2 -> [0.5, 0.5]
        assert!((proba[1] - 0.375).abs() < 1e-12);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_logistic_probabilities() {
        let model = LogisticRegression {
            n_features_in: Some(2),
            classes: vec![0, 1],
            coefficients: vec![1.0, -1.0],
            intercept: 0.0,
        };
        let proba = model.predict_proba(&[2.0, 2.0]).unwrap();
        assert!((proba[1] - 0.5).abs() < 1e-12);

        assert!(model.predict_proba(&[1.0]).is_err());
    }

    #[test]
    fn test_gradient_boosting_sum() {
        let model = GradientBoostingRegressor {
            n_features_in: Some(1),
            init: 40.0,
            learning_rate: 0.5,
            trees: vec![
                stump(0, 1.0, vec![-10.0], vec![10.0]),
                stump(0, 3.0, vec![4.0], vec![8.0]),
            ],
        };
        // 40 + 0.5 * (10 + 4)
        assert_eq!(model.predict(&[2.0]).unwrap(), 47.0);
    }

    #[test]
    fn test_shape_check() {
        let est = SerializedEstimator::LinearRegression(LinearRegression {
            n_features_in: Some(3),
            coefficients: vec![1.0, 1.0, 1.0],
            intercept: 0.0,
        })
        .into_estimator(3);

        assert!(est.check_shape(&[1.0, 2.0, 3.0]).is_ok());
        assert_eq!(
            est.check_shape(&[1.0]),
            Err(PredictionError::ShapeMismatch {
                expected: 3,
                actual: 1
            })
        );
    }
}
