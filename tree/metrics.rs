/*!
The measurements inTrees reports for a single rule, computed from the class counts the rule's tree stored at training time.
*/

use crate::{Rule, Tree};

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RuleMetrics {
	pub length: usize,
	pub frequency: f32,
	pub error: f32,
}

impl RuleMetrics {
	pub fn compute(tree: &Tree, rule: &Rule) -> RuleMetrics {
		RuleMetrics {
			length: rule_length(rule),
			frequency: rule_frequency(tree, rule),
			error: rule_error(tree, rule),
		}
	}
}

/// The fraction of the tree's training examples that satisfy the rule's condition, i.e. that reached its leaf.
pub fn rule_frequency(tree: &Tree, rule: &Rule) -> f32 {
	let root_count = tree.n_examples(0);
	if root_count <= 0.0 {
		return 0.0;
	}
	(tree.n_examples(rule.leaf_node_id) / root_count) as f32
}

/// The fraction of the training examples at the rule's leaf that do not belong to the class the rule predicts.
pub fn rule_error(tree: &Tree, rule: &Rule) -> f32 {
	let leaf_count = tree.n_examples(rule.leaf_node_id);
	if leaf_count <= 0.0 {
		return 0.0;
	}
	let correct = tree.class_counts(rule.leaf_node_id)[rule.target];
	((leaf_count - correct) / leaf_count) as f32
}

pub fn rule_length(rule: &Rule) -> usize {
	rule.condition.len()
}

#[test]
fn test_rule_metrics() {
	let tree = crate::two_level_tree();
	let rules = crate::extract_rules(&tree, 0).unwrap();
	let metrics: Vec<RuleMetrics> = rules
		.iter()
		.map(|rule| RuleMetrics::compute(&tree, rule))
		.collect();
	insta::assert_debug_snapshot!(metrics, @r###"
 [
     RuleMetrics {
         length: 2,
         frequency: 0.3846154,
         error: 0.2,
     },
     RuleMetrics {
         length: 2,
         frequency: 0.23076923,
         error: 0.5,
     },
     RuleMetrics {
         length: 1,
         frequency: 0.3846154,
         error: 0.1,
     },
 ]
 "###);
}

#[test]
fn test_rule_metrics_of_empty_leaf() {
	let tree = crate::stump(0.0, [0.0, 0.0], [2.0, 3.0]);
	let rules = crate::extract_rules(&tree, 0).unwrap();
	assert_eq!(rule_error(&tree, &rules[0]), 0.0);
	assert_eq!(rule_frequency(&tree, &rules[0]), 0.0);
	assert_eq!(rule_frequency(&tree, &rules[1]), 1.0);
}
