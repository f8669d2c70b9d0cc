use crate::{Forest, StructureError};

/// This function computes feature importances using the "split" method, where a feature's importance is proportional to the number of reachable branch nodes that split on it. The importances sum to one unless the forest has no splits at all, in which case they are all zero.
pub fn split_count_importances(
	forest: &Forest,
	n_features: usize,
) -> Result<Vec<f32>, StructureError> {
	let mut feature_importances = vec![0.0f32; n_features];
	for tree in forest.trees.iter() {
		for (node_id, _) in tree.depth_first(0)? {
			if tree.is_leaf(node_id) {
				continue;
			}
			let feature_id = tree.feature(node_id)?;
			if let Some(feature_importance) = feature_importances.get_mut(feature_id) {
				*feature_importance += 1.0;
			}
		}
	}
	// Normalize the feature_importances.
	let total: f32 = feature_importances.iter().sum();
	if total > 0.0 {
		for feature_importance in feature_importances.iter_mut() {
			*feature_importance /= total;
		}
	}
	Ok(feature_importances)
}

#[test]
fn test_split_count_importances() {
	let forest = Forest {
		n_features: Some(3),
		trees: vec![
			crate::two_level_tree(),
			crate::stump(0.5, [1.0, 0.0], [0.0, 1.0]),
		],
	};
	let importances = split_count_importances(&forest, 3).unwrap();
	assert_eq!(importances, vec![2.0 / 3.0, 1.0 / 3.0, 0.0]);
}
