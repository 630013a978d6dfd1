//! Regression tree representation and evaluation
//!
//! Trees are stored as flat node arrays (the layout tree learners export).
//! A split node routes a row left when `x[feature] <= threshold`. Every
//! node keeps its training-time mean `value`, which is what decision-path
//! attribution walks over.

use serde::{Deserialize, Serialize};

use crate::types::EncodedMatrix;

/// One node of a regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Internal node
    Split {
        /// Encoded column index tested at this node
        feature: usize,
        /// Rows with `x[feature] <= threshold` go left
        threshold: f64,
        /// Index of the left child
        left: usize,
        /// Index of the right child
        right: usize,
        /// Mean target of training rows reaching this node
        value: f64,
    },
    /// Terminal node
    Leaf {
        /// Prediction for rows reaching this leaf
        value: f64,
    },
}

impl TreeNode {
    /// Node mean value.
    pub const fn value(&self) -> f64 {
        match self {
            Self::Split { value, .. } | Self::Leaf { value } => *value,
        }
    }
}

/// A single regression tree of the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Build a tree from its node array. Call [`validate`](Self::validate)
    /// before evaluating untrusted input.
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    /// Single-leaf tree that always predicts `value`.
    pub fn constant(value: f64) -> Self {
        Self {
            nodes: vec![TreeNode::Leaf { value }],
        }
    }

    /// Depth-one tree: `low` when `x[feature] <= threshold`, else `high`.
    pub fn stump(feature: usize, threshold: f64, low: f64, high: f64) -> Self {
        Self {
            nodes: vec![
                TreeNode::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                    value: (low + high) / 2.0,
                },
                TreeNode::Leaf { value: low },
                TreeNode::Leaf { value: high },
            ],
        }
    }

    /// Node array.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Check structural soundness against an encoded width.
    ///
    /// Children must point strictly forward, which rules out cycles and
    /// guarantees every walk terminates.
    pub fn validate(&self, width: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let n = self.nodes.len();
        for (idx, node) in self.nodes.iter().enumerate() {
            if !node.value().is_finite() {
                return Err(format!("node {idx} has non-finite value"));
            }
            if let TreeNode::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } = *node
            {
                if feature >= width {
                    return Err(format!(
                        "node {idx} splits on column {feature} but the layout has {width} columns"
                    ));
                }
                if threshold.is_nan() {
                    return Err(format!("node {idx} has NaN threshold"));
                }
                for child in [left, right] {
                    if child <= idx || child >= n {
                        return Err(format!(
                            "node {idx} has child {child} outside ({idx}, {n})"
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Index of the leaf a row lands in.
    fn leaf_index(&self, row: &[f64]) -> usize {
        let mut idx = 0;
        while let TreeNode::Split {
            feature,
            threshold,
            left,
            right,
            ..
        } = self.nodes[idx]
        {
            idx = if row[feature] <= threshold { left } else { right };
        }
        idx
    }

    /// Predict one encoded row.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.nodes[self.leaf_index(row)].value()
    }

    /// Predict every row of a matrix in one pass over this tree.
    pub fn predict_rows(&self, rows: &EncodedMatrix) -> Vec<f64> {
        rows.iter_rows().map(|row| self.predict_row(row)).collect()
    }

    /// Decision-path attribution for one row.
    ///
    /// Adds `value(child) - value(parent)` to `contributions[feature]` for
    /// every split on the path and returns the root value (the bias).
    /// `bias + Σ contributions` equals the leaf prediction.
    pub fn attribute_row(&self, row: &[f64], contributions: &mut [f64]) -> f64 {
        let bias = self.nodes[0].value();
        let mut idx = 0;
        while let TreeNode::Split {
            feature,
            threshold,
            left,
            right,
            value,
        } = self.nodes[idx]
        {
            let next = if row[feature] <= threshold { left } else { right };
            contributions[feature] += self.nodes[next].value() - value;
            idx = next;
        }
        bias
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two-level tree over 2 columns:
    /// col0 <= 5 ? (col1 <= 0.5 ? 1 : 3) : 10
    fn make_tree() -> RegressionTree {
        RegressionTree::new(vec![
            TreeNode::Split {
                feature: 0,
                threshold: 5.0,
                left: 1,
                right: 4,
                value: 5.0,
            },
            TreeNode::Split {
                feature: 1,
                threshold: 0.5,
                left: 2,
                right: 3,
                value: 2.0,
            },
            TreeNode::Leaf { value: 1.0 },
            TreeNode::Leaf { value: 3.0 },
            TreeNode::Leaf { value: 10.0 },
        ])
    }

    #[test]
    fn routes_rows_to_leaves() {
        let tree = make_tree();
        assert_eq!(tree.predict_row(&[5.0, 0.0]), 1.0); // <= goes left
        assert_eq!(tree.predict_row(&[1.0, 1.0]), 3.0);
        assert_eq!(tree.predict_row(&[6.0, 0.0]), 10.0);
    }

    #[test]
    fn predict_rows_matches_row_by_row() {
        let tree = make_tree();
        let mut m = EncodedMatrix::with_capacity(3, 2);
        m.push_row(&[0.0, 0.0]);
        m.push_row(&[0.0, 1.0]);
        m.push_row(&[9.0, 1.0]);
        assert_eq!(tree.predict_rows(&m), vec![1.0, 3.0, 10.0]);
    }

    #[test]
    fn attribution_reconstructs_leaf() {
        let tree = make_tree();
        for row in [[0.0, 0.0], [0.0, 1.0], [9.0, 1.0]] {
            let mut contrib = [0.0; 2];
            let bias = tree.attribute_row(&row, &mut contrib);
            let total = bias + contrib.iter().sum::<f64>();
            assert!((total - tree.predict_row(&row)).abs() < 1e-12);
        }
    }

    #[test]
    fn validate_rejects_backward_child() {
        let tree = RegressionTree::new(vec![
            TreeNode::Split {
                feature: 0,
                threshold: 1.0,
                left: 0,
                right: 1,
                value: 0.0,
            },
            TreeNode::Leaf { value: 1.0 },
        ]);
        assert!(tree.validate(1).is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_feature() {
        assert!(make_tree().validate(1).is_err());
        assert!(make_tree().validate(2).is_ok());
    }

    #[test]
    fn deserializes_tagged_nodes() {
        let json = r#"{"nodes": [
            {"kind": "split", "feature": 0, "threshold": 1.0, "left": 1, "right": 2, "value": 1.5},
            {"kind": "leaf", "value": 1.0},
            {"kind": "leaf", "value": 2.0}
        ]}"#;
        let tree: RegressionTree = serde_json::from_str(json).unwrap();
        assert_eq!(tree, RegressionTree::stump(0, 1.0, 1.0, 2.0));
    }
}
