use ruleminer_tree::{Rule, Split, SplitDirection};

/// One `(feature, direction)` test, with the node id and threshold of the split it came from dropped.
#[derive(
	Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Item {
	pub feature_id: usize,
	pub direction: SplitDirection,
}

/**
An `AssociationCondition` is the set of `(feature, direction)` tests of a rule. Rules from different trees, with different thresholds or with the tests in a different order, abstract to the same condition when they test the same features in the same directions.

The items are kept sorted and without duplicates, so equality, hashing and ordering are those of the set.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "Vec<Item>", into = "Vec<Item>")]
pub struct AssociationCondition {
	items: Vec<Item>,
}

impl AssociationCondition {
	pub fn new(items: impl IntoIterator<Item = Item>) -> AssociationCondition {
		let mut items: Vec<Item> = items.into_iter().collect();
		items.sort_unstable();
		items.dedup();
		AssociationCondition { items }
	}

	/// Abstract the first `max_depth` splits of a path, counted from the root. With `None` the whole path is used.
	pub fn from_splits(splits: &[Split], max_depth: Option<usize>) -> AssociationCondition {
		let depth = max_depth.map_or(splits.len(), |max_depth| max_depth.min(splits.len()));
		AssociationCondition::new(splits[..depth].iter().map(|split| Item {
			feature_id: split.feature_id,
			direction: split.direction,
		}))
	}

	pub fn items(&self) -> &[Item] {
		&self.items
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Check whether every item of `self` is also an item of `other`. Both item lists are sorted, so this is a single merge pass.
	pub fn is_subset(&self, other: &AssociationCondition) -> bool {
		if self.items.len() > other.items.len() {
			return false;
		}
		let mut other_items = other.items.iter();
		'items: for item in self.items.iter() {
			for other_item in &mut other_items {
				if other_item == item {
					continue 'items;
				}
				if other_item > item {
					return false;
				}
			}
			return false;
		}
		true
	}
}

impl From<Vec<Item>> for AssociationCondition {
	fn from(items: Vec<Item>) -> AssociationCondition {
		AssociationCondition::new(items)
	}
}

impl From<AssociationCondition> for Vec<Item> {
	fn from(condition: AssociationCondition) -> Vec<Item> {
		condition.items
	}
}

/// A rule whose condition has been abstracted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AssociationRule {
	pub condition: AssociationCondition,
	pub target: usize,
}

impl AssociationRule {
	pub fn from_rule(rule: &Rule, max_depth: Option<usize>) -> AssociationRule {
		AssociationRule {
			condition: AssociationCondition::from_splits(&rule.condition, max_depth),
			target: rule.target,
		}
	}
}

#[cfg(test)]
pub(crate) fn item(feature_id: usize, direction: SplitDirection) -> Item {
	Item {
		feature_id,
		direction,
	}
}

#[cfg(test)]
fn split(node_id: usize, feature_id: usize, threshold: f64, direction: SplitDirection) -> Split {
	Split {
		node_id,
		feature_id,
		threshold,
		direction,
	}
}

#[test]
fn test_from_splits_drops_thresholds_and_duplicates() {
	use SplitDirection::*;
	let splits = vec![
		split(0, 3, 0.5, Right),
		split(2, 1, 7.0, Left),
		split(5, 3, 0.9, Right),
		split(9, 3, 0.1, Left),
	];
	let condition = AssociationCondition::from_splits(&splits, None);
	assert_eq!(
		condition.items(),
		&[item(1, Left), item(3, Left), item(3, Right)]
	);
}

#[test]
fn test_from_splits_truncates_from_the_root() {
	use SplitDirection::*;
	let splits = vec![split(0, 3, 0.5, Right), split(2, 1, 7.0, Left)];
	assert_eq!(
		AssociationCondition::from_splits(&splits, Some(1)).items(),
		&[item(3, Right)]
	);
	assert!(AssociationCondition::from_splits(&splits, Some(0)).is_empty());
	assert_eq!(AssociationCondition::from_splits(&splits, Some(10)).len(), 2);
	assert!(AssociationCondition::from_splits(&[], None).is_empty());
}

#[test]
fn test_abstraction_is_idempotent() {
	use SplitDirection::*;
	let condition = AssociationCondition::new(vec![
		item(4, Right),
		item(0, Left),
		item(4, Right),
		item(2, Left),
	]);
	let again = AssociationCondition::new(condition.items().iter().copied());
	assert_eq!(condition, again);
	assert_eq!(again.len(), 3);
}

#[test]
fn test_is_subset() {
	use SplitDirection::*;
	let empty = AssociationCondition::default();
	let a = AssociationCondition::new(vec![item(1, Left)]);
	let ab = AssociationCondition::new(vec![item(1, Left), item(2, Right)]);
	let ac = AssociationCondition::new(vec![item(1, Left), item(3, Left)]);
	let a_right = AssociationCondition::new(vec![item(1, Right)]);
	assert!(empty.is_subset(&a));
	assert!(empty.is_subset(&empty));
	assert!(a.is_subset(&a));
	assert!(a.is_subset(&ab));
	assert!(a.is_subset(&ac));
	assert!(!ab.is_subset(&a));
	assert!(!ab.is_subset(&ac));
	assert!(!a_right.is_subset(&ab));
	assert!(!a.is_subset(&empty));
}

#[test]
fn test_condition_serialization_keeps_the_set_invariant() {
	use SplitDirection::*;
	let items = vec![item(2, Left), item(2, Left), item(1, Right)];
	let condition: AssociationCondition = rmp_serde::from_slice(&rmp_serde::to_vec(&items).unwrap()).unwrap();
	assert_eq!(condition.items(), &[item(1, Right), item(2, Left)]);
}
