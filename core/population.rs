use crate::association::AssociationRule;
use anyhow::Result;
use ruleminer_tree::{extract_forest_rules, Forest, Rule, RuleMetrics};

/**
The `RulePopulation` is every rule of every tree in a forest, sorted by ascending condition length so the most general rules come first. The sort is stable, so rules of equal length keep their forest order, which makes a rule's index in the population the same in every process that extracts it from the same forest. Batches rely on this to address rules by index.
*/
#[derive(Debug)]
pub struct RulePopulation {
	pub rules: Vec<Rule>,
	pub metrics: Vec<RuleMetrics>,
}

impl RulePopulation {
	pub fn from_forest(forest: &Forest) -> Result<RulePopulation> {
		let mut rules = extract_forest_rules(forest)?;
		rules.sort_by_key(|rule| rule.condition.len());
		let metrics = rules
			.iter()
			.map(|rule| RuleMetrics::compute(&forest.trees[rule.tree_index], rule))
			.collect();
		Ok(RulePopulation { rules, metrics })
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}

	/// Abstract every rule, keeping the first `max_depth` splits of each.
	pub fn association_rules(&self, max_depth: Option<usize>) -> Vec<AssociationRule> {
		self.rules
			.iter()
			.map(|rule| AssociationRule::from_rule(rule, max_depth))
			.collect()
	}
}

#[cfg(test)]
pub(crate) fn forest_from_json(json: &str) -> Forest {
	serde_json::from_str(json).unwrap()
}

/// Two trees that both split only on feature 0, at different thresholds.
#[cfg(test)]
pub(crate) fn two_stumps() -> Forest {
	forest_from_json(
		r#"{
			"trees": [
				{
					"children_left": [1, -1, -1],
					"children_right": [2, -1, -1],
					"feature": [0, -2, -2],
					"threshold": [0.5, -2.0, -2.0],
					"value": [[10.0, 10.0], [8.0, 2.0], [2.0, 8.0]]
				},
				{
					"children_left": [1, -1, -1],
					"children_right": [2, -1, -1],
					"feature": [0, -2, -2],
					"threshold": [1.5, -2.0, -2.0],
					"value": [[10.0, 10.0], [7.0, 1.0], [3.0, 9.0]]
				}
			]
		}"#,
	)
}

/// A stump and a deeper tree, so the population has rules of different lengths.
#[cfg(test)]
pub(crate) fn mixed_forest() -> Forest {
	forest_from_json(
		r#"{
			"n_features": 3,
			"trees": [
				{
					"children_left": [1, 3, -1, -1, 5, -1, -1],
					"children_right": [2, 4, -1, -1, 6, -1, -1],
					"feature": [1, 0, -2, -2, 2, -2, -2],
					"threshold": [0.5, 2.0, -2.0, -2.0, 3.0, -2.0, -2.0],
					"value": [[12.0, 14.0], [11.0, 5.0], [1.0, 9.0], [8.0, 2.0], [3.0, 3.0], [0.0, 2.0], [3.0, 1.0]]
				},
				{
					"children_left": [1, -1, -1],
					"children_right": [2, -1, -1],
					"feature": [1, -2, -2],
					"threshold": [0.7, -2.0, -2.0],
					"value": [[10.0, 10.0], [9.0, 4.0], [1.0, 6.0]]
				}
			]
		}"#,
	)
}

#[test]
fn test_population_is_sorted_by_length() {
	let forest = mixed_forest();
	let population = RulePopulation::from_forest(&forest).unwrap();
	let lengths: Vec<usize> = population
		.rules
		.iter()
		.map(|rule| rule.condition.len())
		.collect();
	assert_eq!(lengths, vec![1, 1, 1, 2, 3, 3]);
	// Equal lengths keep forest order: the deep tree's right child comes before the stump's rules.
	let origins: Vec<(usize, usize)> = population
		.rules
		.iter()
		.map(|rule| (rule.tree_index, rule.leaf_node_id))
		.collect();
	assert_eq!(
		origins,
		vec![(0, 2), (1, 1), (1, 2), (0, 3), (0, 5), (0, 6)]
	);
	assert_eq!(population.metrics[3].length, 2);
}

#[test]
fn test_two_stumps_have_four_rules() {
	let population = RulePopulation::from_forest(&two_stumps()).unwrap();
	assert_eq!(population.len(), 4);
	let association_rules = population.association_rules(None);
	// The left rules of both trees abstract to the same condition despite their thresholds.
	assert_eq!(association_rules[0], association_rules[2]);
	assert_eq!(association_rules[1], association_rules[3]);
	assert_ne!(association_rules[0], association_rules[1]);
}
