use crate::association::AssociationCondition;
use anyhow::{format_err, Context, Result};
use ruleminer_tree::RuleMetrics;
use std::{
	collections::BTreeMap,
	io::{Read, Write},
	path::Path,
};

/// The support and confidence computed for one rule of the population.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisResult {
	/// The rule's index in the sorted population.
	pub index: usize,
	pub condition: AssociationCondition,
	pub target: usize,
	pub support: u64,
	pub confidence: f32,
	pub metrics: RuleMetrics,
}

const MAJOR_VERSION: u8 = 0;

/// Write `results` to the file at `path`: one version byte followed by the MessagePack encoding of the results. The file is written under a temporary name and renamed into place, so a reader never sees a partial file.
pub fn write_results(path: &Path, results: &[AnalysisResult]) -> Result<()> {
	let tmp_path = path.with_extension("tmp");
	{
		let file = std::fs::File::create(&tmp_path)
			.with_context(|| format!("failed to create {}", tmp_path.display()))?;
		let mut writer = std::io::BufWriter::new(file);
		writer.write_all(&[MAJOR_VERSION])?;
		rmp_serde::encode::write_named(&mut writer, &results)?;
		writer.flush()?;
	}
	std::fs::rename(&tmp_path, path)
		.with_context(|| format!("failed to move results into place at {}", path.display()))?;
	Ok(())
}

/// Read results written by [`write_results`].
pub fn read_results(path: &Path) -> Result<Vec<AnalysisResult>> {
	let file = std::fs::File::open(path)
		.with_context(|| format!("failed to open results file {}", path.display()))?;
	let mut reader = std::io::BufReader::new(file);
	let mut major_version = [0u8; 1];
	reader.read_exact(&mut major_version)?;
	let major_version = major_version[0];
	if major_version != MAJOR_VERSION {
		return Err(format_err!(
			"unknown major version {} in results file {}",
			major_version,
			path.display()
		));
	}
	let results = rmp_serde::from_read(&mut reader)
		.with_context(|| format!("failed to decode results file {}", path.display()))?;
	Ok(results)
}

/// Combine the results of an earlier run with new ones. A rule scored in both keeps its new result. The combined results are ordered by rule index.
pub fn merge_results(
	previous: Vec<AnalysisResult>,
	new: Vec<AnalysisResult>,
) -> Vec<AnalysisResult> {
	let mut by_index = BTreeMap::new();
	for result in previous.into_iter().chain(new.into_iter()) {
		by_index.insert(result.index, result);
	}
	by_index.into_iter().map(|(_, result)| result).collect()
}

#[cfg(test)]
pub(crate) fn result(index: usize, support: u64, confidence: f32) -> AnalysisResult {
	use crate::association::item;
	use ruleminer_tree::SplitDirection;
	AnalysisResult {
		index,
		condition: AssociationCondition::new(vec![item(index % 3, SplitDirection::Left)]),
		target: index % 2,
		support,
		confidence,
		metrics: RuleMetrics {
			length: 1,
			frequency: 0.5,
			error: 0.25,
		},
	}
}

#[test]
fn test_results_file() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("assoc_rules.dat");
	let results = vec![result(3, 10, 0.5), result(1, 0, 0.0)];
	write_results(&path, &results).unwrap();
	assert_eq!(read_results(&path).unwrap(), results);
	assert!(!path.with_extension("tmp").exists());
}

#[test]
fn test_results_file_with_unknown_version() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("assoc_rules.dat");
	std::fs::write(&path, &[7u8, 0x90]).unwrap();
	let error = read_results(&path).unwrap_err();
	assert!(error.to_string().contains("unknown major version 7"));
}

#[test]
fn test_merge_results_prefers_new_results() {
	let previous = vec![result(0, 1, 1.0), result(2, 1, 1.0)];
	let new = vec![result(2, 5, 0.2), result(1, 3, 0.5)];
	let merged = merge_results(previous, new);
	let indexes: Vec<usize> = merged.iter().map(|result| result.index).collect();
	assert_eq!(indexes, vec![0, 1, 2]);
	assert_eq!(merged[2].support, 5);
}
