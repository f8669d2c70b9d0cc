use crate::{
	config::AnalysisOptions,
	features::FeatureTable,
	partition::{batch_range, n_batches, score_range, Execution, ScoringContext},
	population::RulePopulation,
	progress::Progress,
	report::write_overview,
	result::{merge_results, read_results, write_results, AnalysisResult},
	sink::ArtifactSink,
};
use anyhow::{Context, Result};
use ruleminer_tree::Forest;
use ruleminer_util::thread_pool::ThreadPool;
use std::{
	ops::Range,
	path::{Path, PathBuf},
	sync::Arc,
};

pub const RESULTS_FILE_NAME: &str = "assoc_rules.dat";

/// Which rules of the population a run scores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
	/// Every rule, with the output written directly to the output directory.
	Full,
	/// The batch with this index, with the output written to `jobarray/<index>` below the output directory.
	Batch(usize),
}

#[derive(Debug)]
pub struct AnalysisOutput {
	/// The directory the run wrote to.
	pub output_dir: PathBuf,
	pub n_rules: usize,
	pub n_batches: usize,
	pub range: Range<usize>,
	/// Set when a batch index lies past the end of the population. Nothing was written.
	pub past_the_end: bool,
	/// The number of rules scored by this run.
	pub n_scored: usize,
	/// The rules whose artifacts already existed.
	pub skipped: Vec<usize>,
	/// The directory holding the per-rule artifacts, when they are written.
	pub artifact_dir: Option<PathBuf>,
	pub results_path: Option<PathBuf>,
	pub overview_path: Option<PathBuf>,
}

/**
Extract the rules of `forest`, score the rules in `scope` and write the results below `output_dir`.

Running the same batch again resumes it: rules whose artifacts exist are skipped, and the results of the earlier run are read back from its `assoc_rules.dat` so the new aggregate covers the whole batch.
*/
pub fn analyze(
	forest: &Forest,
	features: FeatureTable,
	output_dir: &Path,
	scope: Scope,
	options: &AnalysisOptions,
	update_progress: &mut dyn FnMut(Progress),
) -> Result<AnalysisOutput> {
	update_progress(Progress::Extracting);
	let population = RulePopulation::from_forest(forest)?;
	let n_rules = population.len();
	let n_batches = n_batches(n_rules, options.batch_size);

	let (range, output_dir) = match scope {
		Scope::Full => (0..n_rules, output_dir.to_owned()),
		Scope::Batch(batch_index) => (
			batch_range(batch_index, options.batch_size, n_rules),
			output_dir.join("jobarray").join(batch_index.to_string()),
		),
	};
	let mut output = AnalysisOutput {
		output_dir,
		n_rules,
		n_batches,
		range: range.clone(),
		past_the_end: false,
		n_scored: 0,
		skipped: Vec::new(),
		artifact_dir: None,
		results_path: None,
		overview_path: None,
	};
	if let Scope::Batch(_) = scope {
		if range.is_empty() {
			output.past_the_end = true;
			return Ok(output);
		}
	}
	std::fs::create_dir_all(&output.output_dir).with_context(|| {
		format!(
			"failed to create output directory {}",
			output.output_dir.display()
		)
	})?;

	let features = Arc::new(features);
	let sink = if options.write_artifacts {
		Some(Arc::new(ArtifactSink::create(
			&output.output_dir,
			features.clone(),
		)?))
	} else {
		None
	};
	output.artifact_dir = sink.as_ref().map(|sink| sink.dir().to_owned());
	let context = Arc::new(ScoringContext::new(
		&population,
		options.max_depth,
		options.candidates,
	));

	let scored = if options.sequential {
		score_range(
			context.clone(),
			sink,
			range.clone(),
			Execution::Sequential,
			update_progress,
		)?
	} else {
		let pool = match options.n_threads {
			Some(n_threads) => ThreadPool::new(n_threads),
			None => ThreadPool::with_available_parallelism(),
		};
		score_range(
			context.clone(),
			sink,
			range.clone(),
			Execution::Pool(&pool),
			update_progress,
		)?
	};
	output.n_scored = scored.results.len();
	output.skipped = scored.skipped;
	output.skipped.sort_unstable();

	update_progress(Progress::Writing);
	let results_path = output.output_dir.join(RESULTS_FILE_NAME);
	let previous = load_previous_results(&results_path, &range)?;
	let mut results = merge_results(previous, scored.results);
	// A run killed after writing artifacts but before writing the aggregate leaves skipped rules with no stored result. Score those again without touching their artifacts.
	let missing = missing_indexes(&results, &output.skipped);
	if !missing.is_empty() {
		let recovered = missing.into_iter().map(|index| context.score(index)).collect();
		results = merge_results(results, recovered);
	}
	write_results(&results_path, &results)?;
	output.results_path = Some(results_path);

	if options.write_overview {
		output.overview_path = Some(write_overview(&output.output_dir, &results, &features)?);
	}
	Ok(output)
}

fn load_previous_results(path: &Path, range: &Range<usize>) -> Result<Vec<AnalysisResult>> {
	if !path.exists() {
		return Ok(Vec::new());
	}
	let previous = read_results(path)?;
	Ok(previous
		.into_iter()
		.filter(|result| range.contains(&result.index))
		.collect())
}

/// The indexes in `skipped` with no result in `results`. `results` must be sorted by index.
fn missing_indexes(results: &[AnalysisResult], skipped: &[usize]) -> Vec<usize> {
	skipped
		.iter()
		.copied()
		.filter(|index| {
			results
				.binary_search_by_key(index, |result| result.index)
				.is_err()
		})
		.collect()
}

#[cfg(test)]
fn sequential_options() -> AnalysisOptions {
	AnalysisOptions {
		sequential: true,
		..AnalysisOptions::default()
	}
}

#[test]
fn test_two_stumps_end_to_end() {
	let dir = tempfile::tempdir().unwrap();
	let forest = crate::population::two_stumps();
	let output = analyze(
		&forest,
		FeatureTable::new(vec![1.0]),
		dir.path(),
		Scope::Full,
		&sequential_options(),
		&mut |_| {},
	)
	.unwrap();
	assert_eq!(output.n_rules, 4);
	assert_eq!(output.n_scored, 4);
	assert!(!output.past_the_end);
	let results = read_results(output.results_path.as_ref().unwrap()).unwrap();
	let scores: Vec<(usize, u64)> = results
		.iter()
		.map(|result| (result.index, result.support))
		.collect();
	assert_eq!(scores, vec![(0, 1), (1, 1), (2, 0), (3, 0)]);
	for index in 0..4 {
		assert!(dir.path().join("job-parts/part").join(index.to_string()).is_file());
	}
	let overview = std::fs::read_to_string(output.overview_path.unwrap()).unwrap();
	insta::assert_snapshot!(overview.trim_end(), @r###"
 # Listing of rules found by association rule analysis

 This list is sorted by descending support and confidence values.

 feature 0 (low), importance: 1.00
 => 0
 Support: 1, Confidence: 1.00

 feature 0 (**high**), importance: 1.00
 => 1
 Support: 1, Confidence: 1.00
 "###);
}

#[test]
fn test_pool_run_matches_sequential_run() {
	let forest = crate::population::mixed_forest();
	let sequential_dir = tempfile::tempdir().unwrap();
	analyze(
		&forest,
		FeatureTable::default(),
		sequential_dir.path(),
		Scope::Full,
		&sequential_options(),
		&mut |_| {},
	)
	.unwrap();
	let pool_dir = tempfile::tempdir().unwrap();
	let options = AnalysisOptions {
		n_threads: Some(2),
		..AnalysisOptions::default()
	};
	let mut saw_pool = false;
	analyze(
		&forest,
		FeatureTable::default(),
		pool_dir.path(),
		Scope::Full,
		&options,
		&mut |progress| {
			if let Progress::ScoringInPool { n_threads, .. } = progress {
				assert_eq!(n_threads, 2);
				saw_pool = true;
			}
		},
	)
	.unwrap();
	assert!(saw_pool);
	assert_eq!(
		read_results(&sequential_dir.path().join(RESULTS_FILE_NAME)).unwrap(),
		read_results(&pool_dir.path().join(RESULTS_FILE_NAME)).unwrap()
	);
}

#[test]
fn test_batch_resumes() {
	let dir = tempfile::tempdir().unwrap();
	let forest = crate::population::two_stumps();
	let options = AnalysisOptions {
		batch_size: 3,
		..sequential_options()
	};
	let run = |batch_index| {
		analyze(
			&forest,
			FeatureTable::default(),
			dir.path(),
			Scope::Batch(batch_index),
			&options,
			&mut |_| {},
		)
		.unwrap()
	};
	let first = run(1);
	assert_eq!(first.n_batches, 2);
	assert_eq!(first.range, 3..4);
	assert_eq!(first.output_dir, dir.path().join("jobarray").join("1"));
	assert_eq!(first.n_scored, 1);
	let first_results = read_results(first.results_path.as_ref().unwrap()).unwrap();

	let second = run(1);
	assert_eq!(second.n_scored, 0);
	assert_eq!(second.skipped, vec![3]);
	let second_results = read_results(second.results_path.as_ref().unwrap()).unwrap();
	assert_eq!(first_results, second_results);

	// Losing the aggregate between runs does not lose the results of skipped rules.
	std::fs::remove_file(second.results_path.as_ref().unwrap()).unwrap();
	let third = run(1);
	assert_eq!(third.skipped, vec![3]);
	let third_results = read_results(third.results_path.as_ref().unwrap()).unwrap();
	assert_eq!(first_results, third_results);

	let past_the_end = run(2);
	assert!(past_the_end.past_the_end);
	assert!(!dir.path().join("jobarray").join("2").exists());
}

#[test]
fn test_run_without_artifacts() {
	let dir = tempfile::tempdir().unwrap();
	let options = AnalysisOptions {
		write_artifacts: false,
		..sequential_options()
	};
	let output = analyze(
		&crate::population::two_stumps(),
		FeatureTable::default(),
		dir.path(),
		Scope::Full,
		&options,
		&mut |_| {},
	)
	.unwrap();
	assert_eq!(output.artifact_dir, None);
	assert!(!dir.path().join("job-parts").exists());
	assert_eq!(output.n_scored, 4);
	assert!(output.skipped.is_empty());
	let results = read_results(output.results_path.as_ref().unwrap()).unwrap();
	assert_eq!(results.len(), 4);
	assert!(output.overview_path.unwrap().is_file());
	// Without artifacts nothing marks a rule as done, so a second run scores everything again.
	let again = analyze(
		&crate::population::two_stumps(),
		FeatureTable::default(),
		dir.path(),
		Scope::Full,
		&options,
		&mut |_| {},
	)
	.unwrap();
	assert_eq!(again.n_scored, 4);
}

#[test]
fn test_batch_larger_than_the_population() {
	let dir = tempfile::tempdir().unwrap();
	let options = AnalysisOptions {
		batch_size: usize::MAX,
		..sequential_options()
	};
	let output = analyze(
		&crate::population::two_stumps(),
		FeatureTable::default(),
		dir.path(),
		Scope::Batch(0),
		&options,
		&mut |_| {},
	)
	.unwrap();
	assert_eq!(output.n_batches, 1);
	assert_eq!(output.range, 0..4);
	assert_eq!(
		output.artifact_dir,
		Some(dir.path().join("jobarray/0/job-parts/part"))
	);
}
