use crate::{
	association::AssociationCondition, features::FeatureTable, result::AnalysisResult,
	sink::render_result,
};
use anyhow::{Context, Result};
use fnv::FnvHashSet;
use std::{cmp::Ordering, path::Path};

pub const OVERVIEW_FILE_NAME: &str = "assoc_rule_overview.md";

pub const OVERVIEW_HEADER: &str = "# Listing of rules found by association rule analysis\n\nThis list is sorted by descending support and confidence values.\n\n";

/// Order results by descending support, then descending confidence. Ties are broken by condition and target so the order does not depend on the order the results finished in.
pub fn compare_results(a: &AnalysisResult, b: &AnalysisResult) -> Ordering {
	b.support
		.cmp(&a.support)
		.then_with(|| b.confidence.total_cmp(&a.confidence))
		.then_with(|| a.condition.cmp(&b.condition))
		.then_with(|| a.target.cmp(&b.target))
}

/// Sort the results for the overview and keep only the first result for each condition.
pub fn overview_results(results: &[AnalysisResult]) -> Vec<&AnalysisResult> {
	let mut sorted: Vec<&AnalysisResult> = results.iter().collect();
	sorted.sort_by(|a, b| compare_results(a, b));
	let mut seen: FnvHashSet<&AssociationCondition> = FnvHashSet::default();
	sorted
		.into_iter()
		.filter(|result| seen.insert(&result.condition))
		.collect()
}

pub fn render_overview(results: &[AnalysisResult], features: &FeatureTable) -> String {
	let mut output = String::from(OVERVIEW_HEADER);
	for result in overview_results(results) {
		render_result(&mut output, result, features);
	}
	output
}

/// Write the overview of `results` into `output_dir` and return its path.
pub fn write_overview(
	output_dir: &Path,
	results: &[AnalysisResult],
	features: &FeatureTable,
) -> Result<std::path::PathBuf> {
	let path = output_dir.join(OVERVIEW_FILE_NAME);
	std::fs::write(&path, render_overview(results, features))
		.with_context(|| format!("failed to write overview {}", path.display()))?;
	Ok(path)
}

#[test]
fn test_overview_is_sorted_and_deduplicated() {
	use crate::result::result;
	// Indexes 0 and 3 share a condition, as do 1 and 4.
	let results = vec![
		result(0, 4, 0.5),
		result(1, 9, 0.25),
		result(2, 4, 1.0),
		result(3, 7, 0.5),
		result(4, 9, 0.75),
	];
	let overview: Vec<(usize, u64)> = overview_results(&results)
		.into_iter()
		.map(|result| (result.index, result.support))
		.collect();
	assert_eq!(overview, vec![(4, 9), (3, 7), (2, 4)]);
}

#[test]
fn test_render_overview() {
	use crate::result::result;
	let results = vec![result(1, 2, 0.5), result(0, 6, 1.0)];
	let overview = render_overview(&results, &FeatureTable::new(vec![0.7, 0.3]));
	insta::assert_snapshot!(overview.trim_end(), @r###"
 # Listing of rules found by association rule analysis

 This list is sorted by descending support and confidence values.

 feature 0 (low), importance: 0.70
 => 0
 Support: 6, Confidence: 1.00

 feature 1 (low), importance: 0.30
 => 1
 Support: 2, Confidence: 0.50
 "###);
}
