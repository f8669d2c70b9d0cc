use crate::{Forest, Rule, Split, SplitDirection, StructureError, Tree};
use anyhow::{Context, Result};
use rayon::prelude::*;

/// Extract one rule for every leaf of every tree in the forest. Trees are processed in parallel but the rules come back grouped by tree, in forest order.
pub fn extract_forest_rules(forest: &Forest) -> Result<Vec<Rule>> {
	let rules_per_tree: Vec<Vec<Rule>> = forest
		.trees
		.par_iter()
		.enumerate()
		.map(|(tree_index, tree)| {
			extract_rules(tree, tree_index)
				.with_context(|| format!("failed to extract the rules of tree {}", tree_index))
		})
		.collect::<Result<_>>()?;
	Ok(rules_per_tree.into_iter().flatten().collect())
}

/// Extract one rule for every leaf of `tree`, visiting left children before right children.
pub fn extract_rules(tree: &Tree, tree_index: usize) -> Result<Vec<Rule>, StructureError> {
	let mut state = ExtractState {
		tree,
		visited: vec![false; tree.n_nodes()],
		path: Vec::new(),
	};
	let mut rules = Vec::new();
	state.visit(0, None, &mut |state: &ExtractState, node_id: usize| {
		rules.push(Rule {
			tree_index,
			leaf_node_id: node_id,
			condition: state.path.clone(),
			target: tree.majority_class(node_id),
		});
	})?;
	Ok(rules)
}

/// Extract the distinct conditions of `tree`: the path from the root to each leaf, cut short after `max_depth` splits. Paths that share their first `max_depth` splits produce one condition.
pub fn extract_conditions(
	tree: &Tree,
	max_depth: Option<usize>,
) -> Result<Vec<Vec<Split>>, StructureError> {
	let mut state = ExtractState {
		tree,
		visited: vec![false; tree.n_nodes()],
		path: Vec::new(),
	};
	let mut conditions = Vec::new();
	state.visit(0, max_depth, &mut |state: &ExtractState, _: usize| {
		conditions.push(state.path.clone());
	})?;
	Ok(conditions)
}

struct ExtractState<'a> {
	tree: &'a Tree,
	visited: Vec<bool>,
	path: Vec<Split>,
}

impl<'a> ExtractState<'a> {
	fn visit(
		&mut self,
		node_id: usize,
		max_depth: Option<usize>,
		emit: &mut dyn FnMut(&Self, usize),
	) -> Result<(), StructureError> {
		if std::mem::replace(&mut self.visited[node_id], true) {
			return Err(StructureError::Cycle { node_id });
		}
		let children = self.tree.children(node_id)?;
		let at_max_depth = max_depth
			.map(|max_depth| self.path.len() >= max_depth)
			.unwrap_or(false);
		let (left, right) = match children {
			Some(children) if !at_max_depth => children,
			_ => {
				emit(self, node_id);
				return Ok(());
			}
		};
		let feature_id = self.tree.feature(node_id)?;
		let threshold = self.tree.threshold(node_id);
		for (child, direction) in [(left, SplitDirection::Left), (right, SplitDirection::Right)]
			.iter()
			.copied()
		{
			self.path.push(Split {
				node_id,
				feature_id,
				threshold,
				direction,
			});
			self.visit(child, max_depth, emit)?;
			self.path.pop();
		}
		Ok(())
	}
}

#[test]
fn test_extract_stump() {
	let tree = crate::stump(1.5, [3.0, 1.0], [2.0, 6.0]);
	let rules = extract_rules(&tree, 4).unwrap();
	assert_eq!(rules.len(), 2);
	assert_eq!(rules[0].tree_index, 4);
	assert_eq!(rules[0].leaf_node_id, 1);
	assert_eq!(rules[0].target, 0);
	assert_eq!(
		rules[0].condition,
		vec![Split {
			node_id: 0,
			feature_id: 0,
			threshold: 1.5,
			direction: SplitDirection::Left,
		}]
	);
	assert_eq!(rules[1].target, 1);
	assert_eq!(rules[1].condition[0].direction, SplitDirection::Right);
}

#[test]
fn test_rule_count_equals_leaf_count() {
	let tree = crate::two_level_tree();
	let rules = extract_rules(&tree, 0).unwrap();
	assert_eq!(rules.len(), tree.leaves(0).unwrap().len());
	let leaf_ids: Vec<usize> = rules.iter().map(|rule| rule.leaf_node_id).collect();
	assert_eq!(leaf_ids, vec![3, 4, 2]);
}

#[test]
fn test_targets_are_leaf_majorities() {
	let tree = crate::two_level_tree();
	for rule in extract_rules(&tree, 0).unwrap() {
		assert_eq!(rule.target, tree.majority_class(rule.leaf_node_id));
	}
	// Leaf 4 holds [3, 3], which goes to the positive class.
	let rules = extract_rules(&tree, 0).unwrap();
	assert_eq!(rules[1].target, 1);
}

#[test]
fn test_single_leaf_tree() {
	let tree = Tree::new(
		vec![-1],
		vec![-1],
		vec![-2],
		vec![-2.0],
		ndarray::arr2(&[[1.0, 4.0]]),
	)
	.unwrap();
	let rules = extract_rules(&tree, 0).unwrap();
	assert_eq!(rules.len(), 1);
	assert!(rules[0].condition.is_empty());
	assert_eq!(rules[0].target, 1);
}

#[test]
fn test_branch_without_feature_is_rejected() {
	let tree = Tree::new(
		vec![1, -1, -1],
		vec![2, -1, -1],
		vec![-2, -2, -2],
		vec![0.0, -2.0, -2.0],
		ndarray::arr2(&[[1.0, 1.0], [1.0, 0.0], [0.0, 1.0]]),
	)
	.unwrap();
	assert_eq!(
		extract_rules(&tree, 0).unwrap_err(),
		StructureError::InvalidFeature {
			node_id: 0,
			feature: -2
		}
	);
}

#[test]
fn test_extract_conditions_truncates() {
	let tree = crate::two_level_tree();
	let full = extract_conditions(&tree, None).unwrap();
	assert_eq!(full.len(), 3);
	let truncated = extract_conditions(&tree, Some(1)).unwrap();
	assert_eq!(truncated.len(), 2);
	assert!(truncated.iter().all(|condition| condition.len() == 1));
	let root_only = extract_conditions(&tree, Some(0)).unwrap();
	assert_eq!(root_only, vec![Vec::<Split>::new()]);
}

#[test]
fn test_extract_forest_rules_keeps_tree_order() {
	let forest = Forest {
		n_features: None,
		trees: vec![crate::two_level_tree(), crate::stump(0.5, [1.0, 0.0], [0.0, 1.0])],
	};
	let rules = extract_forest_rules(&forest).unwrap();
	let tree_indexes: Vec<usize> = rules.iter().map(|rule| rule.tree_index).collect();
	assert_eq!(tree_indexes, vec![0, 0, 0, 1, 1]);
}

#[test]
fn test_extract_forest_rules_names_the_broken_tree() {
	let broken = Tree::new(
		vec![1, 7, -1],
		vec![2, -1, -1],
		vec![0, 0, -2],
		vec![0.0, 0.0, -2.0],
		ndarray::arr2(&[[1.0, 1.0], [1.0, 0.0], [0.0, 1.0]]),
	)
	.unwrap();
	let forest = Forest {
		n_features: None,
		trees: vec![crate::stump(0.5, [1.0, 0.0], [0.0, 1.0]), broken],
	};
	let error = extract_forest_rules(&forest).unwrap_err();
	assert!(format!("{:#}", error).contains("tree 1"));
}
