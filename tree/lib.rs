/*!
This crate holds the structural view of a trained tree ensemble classifier and turns it into decision rules. A forest is read from the arrays a scikit-learn style tree exposes (`children_left`, `children_right`, `feature`, `threshold` and the per-node class counts in `value`), and every root-to-leaf path of every tree becomes a [`Rule`].

The crate also computes the per-rule measurements of the inTrees framework (frequency, error and length) and some descriptive statistics about how features are used by the trees.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod extract;
mod feature_importances;
mod metrics;
mod stats;

pub use self::extract::{extract_conditions, extract_forest_rules, extract_rules};
pub use self::feature_importances::split_count_importances;
pub use self::metrics::{rule_error, rule_frequency, rule_length, RuleMetrics};
pub use self::stats::{
	feature_relations, forest_stats, negative_leaf_ratio, split_info, tree_info, DirectionCounts,
	FeatureRelations, ForestStats, SplitInfo, TreeInfo,
};

use anyhow::{Context, Result};
use ndarray::prelude::*;
use std::{convert::TryFrom, path::Path};
use thiserror::Error;

/// A `Forest` is the ordered list of trees in an ensemble.
#[derive(Debug, serde::Deserialize)]
pub struct Forest {
	/// The number of input features the ensemble was trained with. When it is absent, it is inferred from the largest feature id used by a split.
	#[serde(default)]
	pub n_features: Option<usize>,
	pub trees: Vec<Tree>,
}

impl Forest {
	/// Read a forest from the JSON file at `path`.
	pub fn from_path(path: &Path) -> Result<Forest> {
		let file = std::fs::File::open(path)
			.with_context(|| format!("failed to open forest file {}", path.display()))?;
		let reader = std::io::BufReader::new(file);
		let forest = serde_json::from_reader(reader)
			.with_context(|| format!("failed to parse forest file {}", path.display()))?;
		Ok(forest)
	}

	pub fn n_features(&self) -> usize {
		if let Some(n_features) = self.n_features {
			return n_features;
		}
		self.trees
			.iter()
			.flat_map(|tree| tree.feature.iter())
			.filter(|feature| **feature >= 0)
			.max()
			.map(|feature| *feature as usize + 1)
			.unwrap_or(0)
	}
}

/**
A `Tree` stores one decision tree as parallel arrays indexed by node id, in the layout scikit-learn uses:

- `children_left[i]` and `children_right[i]` are the ids of node `i`'s children. A node whose two child ids are equal is a leaf. Leaves conventionally use `-1` for both.
- `feature[i]` and `threshold[i]` describe the split at an internal node. Examples with `value <= threshold` go left, the rest go right.
- `value[[i, c]]` is the number (or weighted number) of training examples of class `c` that reached node `i`.

Node 0 is the root. The lengths of the arrays are checked when the tree is built. The shape of the tree itself (child ids in range, no node reachable twice) is checked lazily by every traversal.
*/
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(try_from = "TreeArrays")]
pub struct Tree {
	children_left: Vec<i64>,
	children_right: Vec<i64>,
	feature: Vec<i64>,
	threshold: Vec<f64>,
	value: Array2<f64>,
}

/// The serialized form of a [`Tree`].
#[derive(Debug, serde::Deserialize)]
pub struct TreeArrays {
	pub children_left: Vec<i64>,
	pub children_right: Vec<i64>,
	pub feature: Vec<i64>,
	pub threshold: Vec<f64>,
	pub value: Vec<Vec<f64>>,
}

impl TryFrom<TreeArrays> for Tree {
	type Error = StructureError;
	fn try_from(arrays: TreeArrays) -> Result<Tree, StructureError> {
		let n_nodes = arrays.value.len();
		let n_classes = arrays.value.first().map(|row| row.len()).unwrap_or(0);
		let mut value = Array2::zeros((n_nodes, n_classes));
		for (node_id, row) in arrays.value.iter().enumerate() {
			if row.len() != n_classes {
				return Err(StructureError::RaggedClassCounts {
					node_id,
					expected: n_classes,
					actual: row.len(),
				});
			}
			for (class, count) in row.iter().enumerate() {
				value[[node_id, class]] = *count;
			}
		}
		Tree::new(
			arrays.children_left,
			arrays.children_right,
			arrays.feature,
			arrays.threshold,
			value,
		)
	}
}

impl Tree {
	pub fn new(
		children_left: Vec<i64>,
		children_right: Vec<i64>,
		feature: Vec<i64>,
		threshold: Vec<f64>,
		value: Array2<f64>,
	) -> Result<Tree, StructureError> {
		let n_nodes = value.nrows();
		if n_nodes == 0 {
			return Err(StructureError::Empty);
		}
		if value.ncols() == 0 {
			return Err(StructureError::NoClasses);
		}
		for (array, len) in [
			("children_left", children_left.len()),
			("children_right", children_right.len()),
			("feature", feature.len()),
			("threshold", threshold.len()),
		]
		.iter()
		{
			if *len != n_nodes {
				return Err(StructureError::LengthMismatch {
					array: *array,
					expected: n_nodes,
					actual: *len,
				});
			}
		}
		Ok(Tree {
			children_left,
			children_right,
			feature,
			threshold,
			value,
		})
	}

	pub fn n_nodes(&self) -> usize {
		self.value.nrows()
	}

	pub fn n_classes(&self) -> usize {
		self.value.ncols()
	}

	pub fn is_leaf(&self, node_id: usize) -> bool {
		self.children_left[node_id] == self.children_right[node_id]
	}

	/// Retrieve the ids of a node's left and right children, or `None` if the node is a leaf.
	pub fn children(&self, node_id: usize) -> Result<Option<(usize, usize)>, StructureError> {
		let left = self.children_left[node_id];
		let right = self.children_right[node_id];
		if left == right {
			return Ok(None);
		}
		let left = self.child_id(node_id, left)?;
		let right = self.child_id(node_id, right)?;
		Ok(Some((left, right)))
	}

	fn child_id(&self, node_id: usize, child_id: i64) -> Result<usize, StructureError> {
		if child_id < 0 || child_id as usize >= self.n_nodes() {
			return Err(StructureError::ChildOutOfRange { node_id, child_id });
		}
		Ok(child_id as usize)
	}

	/// Retrieve the feature id an internal node splits on.
	pub fn feature(&self, node_id: usize) -> Result<usize, StructureError> {
		let feature = self.feature[node_id];
		if feature < 0 {
			return Err(StructureError::InvalidFeature { node_id, feature });
		}
		Ok(feature as usize)
	}

	pub fn threshold(&self, node_id: usize) -> f64 {
		self.threshold[node_id]
	}

	pub fn class_counts(&self, node_id: usize) -> ArrayView1<f64> {
		self.value.row(node_id)
	}

	/// The total number of training examples that reached the node.
	pub fn n_examples(&self, node_id: usize) -> f64 {
		self.class_counts(node_id).sum()
	}

	/// The class with the largest count at the node. A later class replaces an earlier one when their counts are equal, so for a binary tree the positive class wins a tie.
	pub fn majority_class(&self, node_id: usize) -> usize {
		let mut majority_class = 0;
		let mut majority_count = f64::NEG_INFINITY;
		for (class, count) in self.class_counts(node_id).iter().enumerate() {
			if *count >= majority_count {
				majority_class = class;
				majority_count = *count;
			}
		}
		majority_class
	}

	/// Visit every node reachable from `root` in depth first order, left child first, yielding each node id with its depth below `root`. Fails if a child id is out of range or a node is reachable twice.
	pub fn depth_first(&self, root: usize) -> Result<Vec<(usize, usize)>, StructureError> {
		let mut visited = vec![false; self.n_nodes()];
		let mut order = Vec::new();
		let mut stack = vec![(root, 0)];
		while let Some((node_id, depth)) = stack.pop() {
			if std::mem::replace(&mut visited[node_id], true) {
				return Err(StructureError::Cycle { node_id });
			}
			order.push((node_id, depth));
			if let Some((left, right)) = self.children(node_id)? {
				stack.push((right, depth + 1));
				stack.push((left, depth + 1));
			}
		}
		Ok(order)
	}

	/// The ids of the leaves below `root`.
	pub fn leaves(&self, root: usize) -> Result<Vec<usize>, StructureError> {
		Ok(self
			.depth_first(root)?
			.into_iter()
			.map(|(node_id, _)| node_id)
			.filter(|node_id| self.is_leaf(*node_id))
			.collect())
	}
}

/// The ways the arrays of a [`Tree`] can fail to describe a tree. None of these are recoverable: the tree is rejected as a whole.
#[derive(Debug, Error, PartialEq)]
pub enum StructureError {
	#[error("the tree has no nodes")]
	Empty,
	#[error("the tree's class counts have no classes")]
	NoClasses,
	#[error("{array} has {actual} entries but the tree has {expected} nodes")]
	LengthMismatch {
		array: &'static str,
		expected: usize,
		actual: usize,
	},
	#[error("node {node_id} has {actual} class counts but node 0 has {expected}")]
	RaggedClassCounts {
		node_id: usize,
		expected: usize,
		actual: usize,
	},
	#[error("node {node_id} has child id {child_id}, which is not a node in the tree")]
	ChildOutOfRange { node_id: usize, child_id: i64 },
	#[error("node {node_id} is a branch but splits on feature {feature}")]
	InvalidFeature { node_id: usize, feature: i64 },
	#[error("node {node_id} is reachable by more than one path")]
	Cycle { node_id: usize },
}

/// Which side of a split a path takes. `Left` means the feature value is less than or equal to the threshold and `Right` means it is greater.
#[derive(
	Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum SplitDirection {
	Left,
	Right,
}

impl SplitDirection {
	pub fn comparison(self) -> &'static str {
		match self {
			SplitDirection::Left => "<=",
			SplitDirection::Right => ">",
		}
	}
}

/// One test along a decision path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Split {
	pub node_id: usize,
	pub feature_id: usize,
	pub threshold: f64,
	pub direction: SplitDirection,
}

/// A `Rule` is the conjunction of the splits on the path from a tree's root to one of its leaves, together with the class the leaf predicts. The splits are in root to leaf order.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
	pub tree_index: usize,
	pub leaf_node_id: usize,
	pub condition: Vec<Split>,
	pub target: usize,
}

impl std::fmt::Display for Rule {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		for split in self.condition.iter() {
			writeln!(
				f,
				"# {:3}: {} {:.3}",
				split.feature_id,
				split.direction.comparison(),
				split.threshold
			)?;
		}
		write!(f, "=> {}", self.target)
	}
}

#[cfg(test)]
pub(crate) fn stump(threshold: f64, left_counts: [f64; 2], right_counts: [f64; 2]) -> Tree {
	Tree::new(
		vec![1, -1, -1],
		vec![2, -1, -1],
		vec![0, -2, -2],
		vec![threshold, -2.0, -2.0],
		ndarray::arr2(&[
			[
				left_counts[0] + right_counts[0],
				left_counts[1] + right_counts[1],
			],
			left_counts,
			right_counts,
		]),
	)
	.unwrap()
}

#[cfg(test)]
pub(crate) fn two_level_tree() -> Tree {
	//         0: f1 <= 0.5
	//        /            \
	//   1: f0 <= 2.0     2: leaf [1, 9]
	//    /        \
	// 3: [8, 2]  4: [3, 3]
	Tree::new(
		vec![1, 3, -1, -1, -1],
		vec![2, 4, -1, -1, -1],
		vec![1, 0, -2, -2, -2],
		vec![0.5, 2.0, -2.0, -2.0, -2.0],
		ndarray::arr2(&[[12.0, 14.0], [11.0, 5.0], [1.0, 9.0], [8.0, 2.0], [3.0, 3.0]]),
	)
	.unwrap()
}

#[test]
fn test_forest_from_json() {
	let forest: Forest = serde_json::from_str(
		r#"{
			"trees": [{
				"children_left": [1, -1, -1],
				"children_right": [2, -1, -1],
				"feature": [3, -2, -2],
				"threshold": [0.5, -2.0, -2.0],
				"value": [[4.0, 4.0], [3.0, 1.0], [1.0, 3.0]]
			}]
		}"#,
	)
	.unwrap();
	assert_eq!(forest.trees.len(), 1);
	assert_eq!(forest.n_features(), 4);
	assert_eq!(forest.trees[0].n_classes(), 2);
	assert_eq!(forest.trees[0].children(0).unwrap(), Some((1, 2)));
}

#[test]
fn test_forest_from_json_rejects_ragged_counts() {
	let result: Result<Forest, _> = serde_json::from_str(
		r#"{
			"trees": [{
				"children_left": [-1],
				"children_right": [-1],
				"feature": [-2],
				"threshold": [-2.0],
				"value": [[4.0, 4.0, 1.0], [3.0]]
			}]
		}"#,
	);
	assert!(result.is_err());
}

#[test]
fn test_rule_display() {
	let tree = two_level_tree();
	let rules = extract_rules(&tree, 0).unwrap();
	insta::assert_snapshot!(rules[1].to_string(), @r###"
 #   1: <= 0.500
 #   0: > 2.000
 => 1
 "###);
	assert_eq!(SplitDirection::Left.comparison(), "<=");
}

#[test]
fn test_length_mismatch() {
	let result = Tree::new(
		vec![-1],
		vec![-1, -1],
		vec![-2],
		vec![-2.0],
		ndarray::arr2(&[[1.0, 0.0]]),
	);
	assert_eq!(
		result.unwrap_err(),
		StructureError::LengthMismatch {
			array: "children_right",
			expected: 1,
			actual: 2,
		}
	);
}

#[test]
fn test_majority_class_tie_goes_to_positive_class() {
	let tree = stump(0.0, [5.0, 5.0], [7.0, 2.0]);
	assert_eq!(tree.majority_class(1), 1);
	assert_eq!(tree.majority_class(2), 0);
}

#[test]
fn test_depth_first_detects_cycles() {
	let tree = Tree::new(
		vec![1, 0, -1],
		vec![2, 2, -1],
		vec![0, 1, -2],
		vec![1.0, 1.0, -2.0],
		ndarray::arr2(&[[2.0, 2.0], [1.0, 1.0], [1.0, 1.0]]),
	)
	.unwrap();
	assert_eq!(
		tree.depth_first(0).unwrap_err(),
		StructureError::Cycle { node_id: 0 }
	);
}

#[test]
fn test_children_out_of_range() {
	let tree = Tree::new(
		vec![1, -1],
		vec![5, -1],
		vec![0, -2],
		vec![1.0, -2.0],
		ndarray::arr2(&[[2.0, 2.0], [1.0, 1.0]]),
	)
	.unwrap();
	assert_eq!(
		tree.children(0).unwrap_err(),
		StructureError::ChildOutOfRange {
			node_id: 0,
			child_id: 5
		}
	);
}
