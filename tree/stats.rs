/*!
Descriptive statistics about how a forest's trees use their features. None of these feed into rule scoring; they are reported alongside the rules to help read them.
*/

use crate::{
	extract_conditions, extract_forest_rules, split_count_importances, Forest, Rule,
	SplitDirection, StructureError, Tree,
};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// The fraction of the leaves below `node_id` whose majority class is the first class.
pub fn negative_leaf_ratio(tree: &Tree, node_id: usize) -> Result<f32, StructureError> {
	let leaves = tree.leaves(node_id)?;
	let n_negative = leaves
		.iter()
		.filter(|leaf_id| tree.majority_class(**leaf_id) == 0)
		.count();
	Ok(n_negative as f32 / leaves.len() as f32)
}

/// How the first node splitting on a feature divides the tree.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SplitInfo {
	pub node_id: usize,
	pub threshold: f64,
	pub negative_leaf_ratio: f32,
	pub negative_leaf_ratio_left: f32,
	pub negative_leaf_ratio_right: f32,
}

/// Describe the split made by the lowest numbered node that splits on `feature_id`, or return `None` if no node does.
pub fn split_info(tree: &Tree, feature_id: usize) -> Result<Option<SplitInfo>, StructureError> {
	let node_id = (0..tree.n_nodes())
		.filter(|node_id| !tree.is_leaf(*node_id))
		.find(|node_id| tree.feature(*node_id).ok() == Some(feature_id));
	let node_id = match node_id {
		Some(node_id) => node_id,
		None => return Ok(None),
	};
	let (left, right) = match tree.children(node_id)? {
		Some(children) => children,
		None => return Ok(None),
	};
	Ok(Some(SplitInfo {
		node_id,
		threshold: tree.threshold(node_id),
		negative_leaf_ratio: negative_leaf_ratio(tree, node_id)?,
		negative_leaf_ratio_left: negative_leaf_ratio(tree, left)?,
		negative_leaf_ratio_right: negative_leaf_ratio(tree, right)?,
	}))
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TreeInfo {
	pub max_depth: usize,
	pub n_nodes: usize,
	pub n_leaves: usize,
	/// The split information for each feature id, `None` where the tree does not use the feature.
	pub splits: Vec<Option<SplitInfo>>,
}

pub fn tree_info(tree: &Tree, n_features: usize) -> Result<TreeInfo, StructureError> {
	let nodes = tree.depth_first(0)?;
	let max_depth = nodes.iter().map(|(_, depth)| *depth).max().unwrap_or(0);
	let n_leaves = nodes
		.iter()
		.filter(|(node_id, _)| tree.is_leaf(*node_id))
		.count();
	let splits = (0..n_features)
		.map(|feature_id| split_info(tree, feature_id))
		.collect::<Result<_, _>>()?;
	Ok(TreeInfo {
		max_depth,
		n_nodes: nodes.len(),
		n_leaves,
		splits,
	})
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct DirectionCounts {
	pub left: u64,
	pub right: u64,
}

impl DirectionCounts {
	fn inc(&mut self, direction: SplitDirection) {
		match direction {
			SplitDirection::Left => self.left += 1,
			SplitDirection::Right => self.right += 1,
		}
	}
}

/// For one feature, how often each other feature is tested before it (closer to the root) and after it (closer to the leaf) on the same rule path.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct FeatureRelations {
	pub before: BTreeMap<usize, DirectionCounts>,
	pub after: BTreeMap<usize, DirectionCounts>,
}

pub fn feature_relations(rules: &[Rule]) -> BTreeMap<usize, FeatureRelations> {
	let mut relations: BTreeMap<usize, FeatureRelations> = BTreeMap::new();
	for rule in rules.iter() {
		for (i, split) in rule.condition.iter().enumerate() {
			let entry = relations.entry(split.feature_id).or_default();
			for before in rule.condition[..i].iter() {
				entry
					.before
					.entry(before.feature_id)
					.or_default()
					.inc(before.direction);
			}
			for after in rule.condition[i + 1..].iter() {
				entry
					.after
					.entry(after.feature_id)
					.or_default()
					.inc(after.direction);
			}
		}
	}
	relations
}

/// Everything [`forest_stats`] reports about a forest.
#[derive(Debug, serde::Serialize)]
pub struct ForestStats {
	pub n_trees: usize,
	pub n_features: usize,
	pub n_rules: usize,
	/// The number of distinct conditions per tree once each path is cut after `max_depth` splits. With no maximum depth this equals the number of rules.
	pub n_conditions: Vec<usize>,
	pub max_depth: Option<usize>,
	pub feature_importances: Vec<f32>,
	pub trees: Vec<TreeInfo>,
	pub feature_relations: BTreeMap<usize, FeatureRelations>,
}

pub fn forest_stats(forest: &Forest, max_depth: Option<usize>) -> Result<ForestStats> {
	let n_features = forest.n_features();
	let trees = forest
		.trees
		.par_iter()
		.enumerate()
		.map(|(tree_index, tree)| {
			tree_info(tree, n_features)
				.with_context(|| format!("failed to describe tree {}", tree_index))
		})
		.collect::<Result<Vec<_>>>()?;
	let n_conditions = forest
		.trees
		.iter()
		.enumerate()
		.map(|(tree_index, tree)| {
			extract_conditions(tree, max_depth)
				.map(|conditions| conditions.len())
				.with_context(|| format!("failed to extract the conditions of tree {}", tree_index))
		})
		.collect::<Result<Vec<_>>>()?;
	let feature_importances = split_count_importances(forest, n_features)?;
	let rules = extract_forest_rules(forest)?;
	Ok(ForestStats {
		n_trees: forest.trees.len(),
		n_features,
		n_rules: rules.len(),
		n_conditions,
		max_depth,
		feature_importances,
		trees,
		feature_relations: feature_relations(&rules),
	})
}

#[test]
fn test_negative_leaf_ratio() {
	let tree = crate::two_level_tree();
	// Leaves 3, 4, 2 predict 0, 1, 1.
	assert!((negative_leaf_ratio(&tree, 0).unwrap() - 1.0 / 3.0).abs() < 1e-6);
	assert_eq!(negative_leaf_ratio(&tree, 1).unwrap(), 0.5);
	assert_eq!(negative_leaf_ratio(&tree, 2).unwrap(), 0.0);
}

#[test]
fn test_tree_info() {
	let tree = crate::two_level_tree();
	let info = tree_info(&tree, 3).unwrap();
	assert_eq!(info.max_depth, 2);
	assert_eq!(info.n_nodes, 5);
	assert_eq!(info.n_leaves, 3);
	assert_eq!(
		info.splits[0],
		Some(SplitInfo {
			node_id: 1,
			threshold: 2.0,
			negative_leaf_ratio: 0.5,
			negative_leaf_ratio_left: 1.0,
			negative_leaf_ratio_right: 0.0,
		})
	);
	assert_eq!(info.splits[1].as_ref().map(|split| split.node_id), Some(0));
	assert_eq!(info.splits[2], None);
}

#[test]
fn test_feature_relations() {
	let tree = crate::two_level_tree();
	let rules = crate::extract_rules(&tree, 0).unwrap();
	let relations = feature_relations(&rules);
	insta::assert_debug_snapshot!(relations, @r###"
 {
     0: FeatureRelations {
         before: {
             1: DirectionCounts {
                 left: 2,
                 right: 0,
             },
         },
         after: {},
     },
     1: FeatureRelations {
         before: {},
         after: {
             0: DirectionCounts {
                 left: 1,
                 right: 1,
             },
         },
     },
 }
 "###);
}

#[test]
fn test_forest_stats() {
	let forest = Forest {
		n_features: None,
		trees: vec![crate::two_level_tree(), crate::stump(0.5, [4.0, 1.0], [1.0, 4.0])],
	};
	let stats = forest_stats(&forest, None).unwrap();
	assert_eq!(stats.n_trees, 2);
	assert_eq!(stats.n_conditions, vec![3, 2]);
	assert_eq!(stats.n_features, 2);
	assert_eq!(stats.n_rules, 5);
	assert_eq!(stats.trees[1].max_depth, 1);
	assert_eq!(stats.feature_importances, vec![2.0 / 3.0, 1.0 / 3.0]);
	assert_eq!(stats.feature_relations[&0].before[&1].left, 2);
	let truncated = forest_stats(&forest, Some(1)).unwrap();
	assert_eq!(truncated.n_conditions, vec![2, 2]);
	assert_eq!(truncated.n_rules, 5);
}
