use crate::association::{AssociationCondition, AssociationRule};

/// Which rules a rule is scored against. The scored rule is never one of its own candidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidatePolicy {
	/// Only the rules after the scored rule in the sorted population.
	Suffix,
	/// Every other rule in the population.
	AllOthers,
}

impl Default for CandidatePolicy {
	fn default() -> Self {
		CandidatePolicy::Suffix
	}
}

impl CandidatePolicy {
	/// Retrieve the candidates for the rule at `index` in `population`. `index` must be in bounds.
	pub fn candidates<'a>(
		self,
		population: &'a [AssociationRule],
		index: usize,
	) -> impl Iterator<Item = &'a AssociationRule> + 'a {
		let before = match self {
			CandidatePolicy::Suffix => &population[..0],
			CandidatePolicy::AllOthers => &population[..index],
		};
		let after = &population[index + 1..];
		before.iter().chain(after.iter())
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Score {
	/// The number of candidates whose condition contains the scored condition.
	pub support: u64,
	/// The fraction of the supporting candidates that predict the same class. It is zero when there is no support.
	pub confidence: f32,
}

/// Compute the support and confidence of the rule `condition => target` among `candidates`.
pub fn score<'a>(
	condition: &AssociationCondition,
	target: usize,
	candidates: impl IntoIterator<Item = &'a AssociationRule>,
) -> Score {
	let mut support = 0u64;
	let mut agreeing = 0u64;
	for candidate in candidates {
		if condition.is_subset(&candidate.condition) {
			support += 1;
			if candidate.target == target {
				agreeing += 1;
			}
		}
	}
	let confidence = if support == 0 {
		0.0
	} else {
		agreeing as f32 / support as f32
	};
	Score {
		support,
		confidence,
	}
}

#[cfg(test)]
use crate::association::item;
#[cfg(test)]
use ruleminer_tree::SplitDirection::{Left, Right};

#[cfg(test)]
fn rule(items: &[(usize, ruleminer_tree::SplitDirection)], target: usize) -> AssociationRule {
	AssociationRule {
		condition: AssociationCondition::new(
			items
				.iter()
				.map(|(feature_id, direction)| item(*feature_id, *direction)),
		),
		target,
	}
}

#[test]
fn test_score() {
	let population = vec![
		rule(&[(0, Left)], 1),
		rule(&[(0, Left), (1, Right)], 1),
		rule(&[(0, Left), (2, Left)], 0),
		rule(&[(0, Right), (1, Right)], 1),
		rule(&[(1, Right)], 1),
	];
	let score = score(&population[0].condition, 1, population[1..].iter());
	assert_eq!(score.support, 2);
	assert_eq!(score.confidence, 0.5);
}

#[test]
fn test_score_without_support() {
	let population = vec![rule(&[(5, Left)], 1), rule(&[(0, Left)], 1)];
	let score = score(&population[0].condition, 1, population[1..].iter());
	assert_eq!(
		score,
		Score {
			support: 0,
			confidence: 0.0
		}
	);
}

#[test]
fn test_empty_condition_is_supported_by_everything() {
	let population = vec![
		rule(&[], 0),
		rule(&[(0, Left)], 0),
		rule(&[(1, Right)], 1),
		rule(&[], 1),
	];
	let score = score(&population[0].condition, 0, population[1..].iter());
	assert_eq!(score.support, 3);
	assert!((score.confidence - 1.0 / 3.0).abs() < 1e-6);
}

#[test]
fn test_candidate_policies_exclude_the_scored_rule() {
	let population = vec![
		rule(&[(0, Left), (1, Left)], 0),
		rule(&[(0, Left)], 1),
		rule(&[(0, Left), (1, Left)], 1),
	];
	let suffix: Vec<_> = CandidatePolicy::Suffix.candidates(&population, 1).collect();
	assert_eq!(suffix, vec![&population[2]]);
	let all_others: Vec<_> = CandidatePolicy::AllOthers
		.candidates(&population, 1)
		.collect();
	assert_eq!(all_others, vec![&population[0], &population[2]]);
	let last: Vec<_> = CandidatePolicy::Suffix.candidates(&population, 2).collect();
	assert!(last.is_empty());
	// Scoring the middle rule against everyone else sees the rule before it too.
	let target = &population[1];
	let suffix_score = score(
		&target.condition,
		target.target,
		CandidatePolicy::Suffix.candidates(&population, 1),
	);
	let all_others_score = score(
		&target.condition,
		target.target,
		CandidatePolicy::AllOthers.candidates(&population, 1),
	);
	assert_eq!(suffix_score.support, 1);
	assert_eq!(all_others_score.support, 2);
	assert_eq!(all_others_score.confidence, 0.5);
}

#[test]
fn test_confidence_is_a_fraction() {
	let population: Vec<AssociationRule> = (0..40)
		.map(|i| {
			let items: Vec<(usize, ruleminer_tree::SplitDirection)> = (0..(i % 4))
				.map(|feature_id| (feature_id, if i % 3 == 0 { Left } else { Right }))
				.collect();
			rule(&items, i % 2)
		})
		.collect();
	for (index, target) in population.iter().enumerate() {
		let score = score(
			&target.condition,
			target.target,
			CandidatePolicy::AllOthers.candidates(&population, index),
		);
		assert!(score.confidence >= 0.0 && score.confidence <= 1.0);
		if score.support == 0 {
			assert_eq!(score.confidence, 0.0);
		}
	}
}
