/*!
This module cuts the scoring of a rule population into tasks and runs them.

Each rule of the sorted population is one task: score the rule against its candidates and hand the result to the sink. Tasks are grouped into batches of a fixed size that are addressed by a single integer, so a cluster job array can give every job its own batch. A batch never depends on another batch, and the batches for `k = 0, 1, ...` cover the population exactly once.
*/

use crate::{
	association::AssociationRule,
	population::RulePopulation,
	progress::Progress,
	result::AnalysisResult,
	score::{score, CandidatePolicy},
	sink::ArtifactSink,
};
use anyhow::Result;
use ruleminer_tree::RuleMetrics;
use ruleminer_util::{progress_counter::ProgressCounter, thread_pool::ThreadPool};
use std::{ops::Range, sync::Arc};

/// The rule indexes of batch `batch_index`: `[k * B, min((k + 1) * B, n))`. A batch that starts at or past the end of the population is empty, which tells a caller scanning batch indexes that there is no more work.
pub fn batch_range(batch_index: usize, batch_size: usize, n_rules: usize) -> Range<usize> {
	let start = batch_index.saturating_mul(batch_size).min(n_rules);
	let end = start.saturating_add(batch_size).min(n_rules);
	start..end
}

/// The number of batches needed to cover `n_rules` rules.
pub fn n_batches(n_rules: usize, batch_size: usize) -> usize {
	if batch_size == 0 {
		return 0;
	}
	n_rules / batch_size + usize::from(n_rules % batch_size != 0)
}

/// Everything a task reads. It is built once per run and shared read-only by every task.
#[derive(Debug)]
pub struct ScoringContext {
	/// The rules being scored, abstracted with the run's maximum depth.
	pub targets: Arc<[AssociationRule]>,
	/// The rules they are scored against, abstracted from their full conditions.
	pub candidates: Arc<[AssociationRule]>,
	pub metrics: Vec<RuleMetrics>,
	pub policy: CandidatePolicy,
}

impl ScoringContext {
	pub fn new(
		population: &RulePopulation,
		max_depth: Option<usize>,
		policy: CandidatePolicy,
	) -> ScoringContext {
		let candidates: Arc<[AssociationRule]> = population.association_rules(None).into();
		let targets = match max_depth {
			None => candidates.clone(),
			Some(_) => population.association_rules(max_depth).into(),
		};
		ScoringContext {
			targets,
			candidates,
			metrics: population.metrics.clone(),
			policy,
		}
	}

	pub fn len(&self) -> usize {
		self.targets.len()
	}

	pub fn is_empty(&self) -> bool {
		self.targets.is_empty()
	}

	/// Score the rule at `index`.
	pub fn score(&self, index: usize) -> AnalysisResult {
		let target = &self.targets[index];
		let score = score(
			&target.condition,
			target.target,
			self.policy.candidates(&self.candidates, index),
		);
		AnalysisResult {
			index,
			condition: target.condition.clone(),
			target: target.target,
			support: score.support,
			confidence: score.confidence,
			metrics: self.metrics[index],
		}
	}
}

#[derive(Debug)]
pub enum TaskOutcome {
	Scored(AnalysisResult),
	/// The rule's artifact already existed, so it was not scored again.
	Skipped(usize),
}

/// Run the task for the rule at `index`.
pub fn run_task(
	context: &ScoringContext,
	sink: Option<&ArtifactSink>,
	index: usize,
) -> Result<TaskOutcome> {
	if let Some(sink) = sink {
		if sink.exists(index) {
			return Ok(TaskOutcome::Skipped(index));
		}
	}
	let result = context.score(index);
	if let Some(sink) = sink {
		sink.write(&result)?;
	}
	Ok(TaskOutcome::Scored(result))
}

/// How the tasks of a range are run.
pub enum Execution<'a> {
	/// One after another on the calling thread, reporting progress after each rule.
	Sequential,
	/// On the workers of a pool. The call blocks until every task has finished.
	Pool(&'a ThreadPool),
}

#[derive(Debug, Default)]
pub struct RangeOutput {
	/// The results of the rules scored in this call, in the order they finished.
	pub results: Vec<AnalysisResult>,
	pub skipped: Vec<usize>,
}

impl RangeOutput {
	fn push(&mut self, outcome: TaskOutcome) {
		match outcome {
			TaskOutcome::Scored(result) => self.results.push(result),
			TaskOutcome::Skipped(index) => self.skipped.push(index),
		}
	}
}

/// Run the tasks for every rule index in `range`. Indexes past the end of the population are ignored.
pub fn score_range(
	context: Arc<ScoringContext>,
	sink: Option<Arc<ArtifactSink>>,
	range: Range<usize>,
	execution: Execution,
	update_progress: &mut dyn FnMut(Progress),
) -> Result<RangeOutput> {
	let range = range.start.min(context.len())..range.end.min(context.len());
	let mut output = RangeOutput::default();
	match execution {
		Execution::Sequential => {
			let progress_counter = ProgressCounter::new(range.len() as u64);
			update_progress(Progress::Scoring(progress_counter.clone()));
			for index in range {
				output.push(run_task(&context, sink.as_deref(), index)?);
				progress_counter.inc(1);
			}
		}
		Execution::Pool(pool) => {
			update_progress(Progress::ScoringInPool {
				n_tasks: range.len(),
				n_threads: pool.size(),
			});
			let tasks: Vec<_> = range
				.map(|index| {
					let context = context.clone();
					let sink = sink.clone();
					move || run_task(&context, sink.as_deref(), index)
				})
				.collect();
			for outcome in pool.execute(tasks)? {
				output.push(outcome?);
			}
		}
	}
	Ok(output)
}

#[test]
fn test_batch_ranges_cover_the_population_once() {
	for n_rules in 0..60 {
		for batch_size in 1..12 {
			let mut covered = vec![0usize; n_rules];
			let n_batches = n_batches(n_rules, batch_size);
			for batch_index in 0..n_batches {
				let range = batch_range(batch_index, batch_size, n_rules);
				assert!(!range.is_empty());
				for index in range {
					covered[index] += 1;
				}
			}
			assert!(covered.iter().all(|count| *count == 1));
			assert!(batch_range(n_batches, batch_size, n_rules).is_empty());
		}
	}
}

#[test]
fn test_batch_range() {
	assert_eq!(batch_range(0, 100, 250), 0..100);
	assert_eq!(batch_range(2, 100, 250), 200..250);
	assert_eq!(batch_range(3, 100, 250), 250..250);
	assert_eq!(batch_range(usize::MAX, 100, 250), 250..250);
	assert_eq!(n_batches(250, 100), 3);
	assert_eq!(n_batches(0, 100), 0);
	assert_eq!(n_batches(5, usize::MAX), 1);
	assert_eq!(n_batches(usize::MAX, usize::MAX), 1);
	assert_eq!(batch_range(0, usize::MAX, 5), 0..5);
	assert_eq!(batch_range(1, usize::MAX, 5), 5..5);
}

#[cfg(test)]
fn sorted_indexes(output: &RangeOutput) -> Vec<usize> {
	let mut indexes: Vec<usize> = output.results.iter().map(|result| result.index).collect();
	indexes.sort_unstable();
	indexes
}

#[test]
fn test_pool_and_sequential_agree() {
	let population = RulePopulation::from_forest(&crate::population::mixed_forest()).unwrap();
	let context = Arc::new(ScoringContext::new(
		&population,
		None,
		CandidatePolicy::AllOthers,
	));
	let mut sequential = score_range(
		context.clone(),
		None,
		0..population.len(),
		Execution::Sequential,
		&mut |_| {},
	)
	.unwrap();
	let pool = ThreadPool::new(3);
	let mut pooled = score_range(
		context,
		None,
		0..population.len(),
		Execution::Pool(&pool),
		&mut |_| {},
	)
	.unwrap();
	assert_eq!(sorted_indexes(&sequential), (0..population.len()).collect::<Vec<_>>());
	sequential.results.sort_by_key(|result| result.index);
	pooled.results.sort_by_key(|result| result.index);
	assert_eq!(sequential.results, pooled.results);
}

#[test]
fn test_sequential_scoring_reports_progress() {
	let population = RulePopulation::from_forest(&crate::population::mixed_forest()).unwrap();
	let context = Arc::new(ScoringContext::new(&population, None, CandidatePolicy::Suffix));
	let mut counter = None;
	score_range(context, None, 1..4, Execution::Sequential, &mut |progress| {
		if let Progress::Scoring(progress_counter) = progress {
			counter = Some(progress_counter);
		}
	})
	.unwrap();
	let counter = counter.unwrap();
	assert_eq!(counter.total(), 3);
	assert_eq!(counter.percent(), 100);
}

#[test]
fn test_range_past_the_end_is_empty() {
	let population = RulePopulation::from_forest(&crate::population::two_stumps()).unwrap();
	let context = Arc::new(ScoringContext::new(&population, None, CandidatePolicy::Suffix));
	let output = score_range(context, None, 2..10, Execution::Sequential, &mut |_| {}).unwrap();
	assert_eq!(sorted_indexes(&output), vec![2, 3]);
	let context = Arc::new(ScoringContext::new(&population, None, CandidatePolicy::Suffix));
	let output = score_range(context, None, 8..10, Execution::Sequential, &mut |_| {}).unwrap();
	assert!(output.results.is_empty());
}

#[test]
fn test_support_grows_as_max_depth_shrinks() {
	let population = RulePopulation::from_forest(&crate::population::mixed_forest()).unwrap();
	let depths = [None, Some(3), Some(2), Some(1), Some(0)];
	let supports: Vec<Vec<u64>> = depths
		.iter()
		.map(|max_depth| {
			let context = ScoringContext::new(&population, *max_depth, CandidatePolicy::AllOthers);
			(0..context.len())
				.map(|index| context.score(index).support)
				.collect()
		})
		.collect();
	for pair in supports.windows(2) {
		for (deeper, shallower) in pair[0].iter().zip(pair[1].iter()) {
			assert!(shallower >= deeper);
		}
	}
	// With no tests left every other rule supports every rule.
	assert!(supports[4].iter().all(|support| *support == population.len() as u64 - 1));
}

#[test]
fn test_skip_on_exists() {
	use crate::features::FeatureTable;
	let dir = tempfile::tempdir().unwrap();
	let population = RulePopulation::from_forest(&crate::population::two_stumps()).unwrap();
	let context = Arc::new(ScoringContext::new(&population, None, CandidatePolicy::Suffix));
	let sink = Arc::new(ArtifactSink::create(dir.path(), Arc::new(FeatureTable::default())).unwrap());
	std::fs::write(sink.path(1), "Support: 99, Confidence: 1.00\n\n").unwrap();
	let output = score_range(
		context,
		Some(sink.clone()),
		0..4,
		Execution::Sequential,
		&mut |_| {},
	)
	.unwrap();
	assert_eq!(output.skipped, vec![1]);
	assert_eq!(sorted_indexes(&output), vec![0, 2, 3]);
	// The existing artifact was left alone.
	assert_eq!(
		std::fs::read_to_string(sink.path(1)).unwrap(),
		"Support: 99, Confidence: 1.00\n\n"
	);
	assert!(sink.exists(0) && sink.exists(2) && sink.exists(3));
}
