/*!
This module gathers the per-rule artifacts written by the batches of a job array into one report sorted by descending support.

A job array directory has one subdirectory per batch, each holding its artifacts in `job-parts/part/`. Artifacts are plain text and carry their support on a line starting with `Support:`. Artifacts that cannot be read or have no support line are reported and left out. Rules without support are dropped.
*/

use crate::sink::artifact_dir;
use anyhow::{Context, Result};
use regex::Regex;
use std::{
	io::Write,
	path::{Path, PathBuf},
};

#[derive(Debug, Default)]
pub struct MergeSummary {
	/// The number of artifacts written to the target file.
	pub merged: usize,
	/// The number of artifacts dropped because their support was zero.
	pub unsupported: usize,
	/// The artifacts that could not be merged, with the reason.
	pub failed: Vec<(PathBuf, String)>,
}

/// Matches the support value on a `Support:` line.
pub fn support_regex() -> Result<Regex> {
	Ok(Regex::new(r"\b\d+\b")?)
}

/// Extract the first integer on the first line of `artifact` that starts with `Support:`.
pub fn extract_support(regex: &Regex, artifact: &str) -> Option<u64> {
	let line = artifact
		.lines()
		.find(|line| line.starts_with("Support:"))?;
	regex
		.find(line)
		.and_then(|number| number.as_str().parse().ok())
}

/// Gather the artifacts of every job below `jobarray_dir` into `target_file`.
pub fn merge(jobarray_dir: &Path, target_file: &Path) -> Result<MergeSummary> {
	let regex = support_regex()?;
	let mut summary = MergeSummary::default();
	let mut supported: Vec<(PathBuf, u64)> = Vec::new();
	for job_dir in sorted_entries(jobarray_dir, true, &mut summary.failed)? {
		let part_dir = artifact_dir(&job_dir);
		if !part_dir.is_dir() {
			continue;
		}
		let artifact_paths = match sorted_entries(&part_dir, false, &mut summary.failed) {
			Ok(artifact_paths) => artifact_paths,
			Err(error) => {
				summary.failed.push((part_dir, format!("{:#}", error)));
				continue;
			}
		};
		for artifact_path in artifact_paths {
			let artifact = match std::fs::read_to_string(&artifact_path) {
				Ok(artifact) => artifact,
				Err(error) => {
					summary.failed.push((artifact_path, error.to_string()));
					continue;
				}
			};
			match extract_support(&regex, &artifact) {
				Some(0) => summary.unsupported += 1,
				Some(support) => supported.push((artifact_path, support)),
				None => summary
					.failed
					.push((artifact_path, "did not find a support value".to_owned())),
			}
		}
	}
	// The sort is stable, so artifacts with equal support stay in scan order.
	supported.sort_by(|(_, a), (_, b)| b.cmp(a));
	let file = std::fs::File::create(target_file)
		.with_context(|| format!("failed to create {}", target_file.display()))?;
	let mut writer = std::io::BufWriter::new(file);
	for (artifact_path, _) in supported {
		match std::fs::read(&artifact_path) {
			Ok(artifact) => {
				writer
					.write_all(&artifact)
					.with_context(|| format!("failed to write {}", target_file.display()))?;
				summary.merged += 1;
			}
			Err(error) => summary.failed.push((artifact_path, error.to_string())),
		}
	}
	writer
		.flush()
		.with_context(|| format!("failed to write {}", target_file.display()))?;
	Ok(summary)
}

/// List the directories or the files in `dir`, ordered numerically where the names are numbers. Hidden entries, such as artifacts still being written, are left out. Entries that cannot be inspected are added to `failed`.
fn sorted_entries(
	dir: &Path,
	directories: bool,
	failed: &mut Vec<(PathBuf, String)>,
) -> Result<Vec<PathBuf>> {
	let entries = std::fs::read_dir(dir)
		.with_context(|| format!("failed to read directory {}", dir.display()))?;
	let mut paths = Vec::new();
	for entry in entries {
		let path = match entry {
			Ok(entry) => entry.path(),
			Err(error) => {
				failed.push((dir.to_owned(), error.to_string()));
				continue;
			}
		};
		let hidden = path
			.file_name()
			.map(|name| name.to_string_lossy().starts_with('.'))
			.unwrap_or(true);
		if hidden || path.is_dir() != directories {
			continue;
		}
		paths.push(path);
	}
	paths.sort_by_cached_key(|path| {
		let name = path
			.file_name()
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_default();
		(name.parse::<u64>().ok(), name)
	});
	Ok(paths)
}

#[cfg(test)]
fn write_artifact(jobarray_dir: &Path, job: usize, index: usize, contents: &str) {
	let part_dir = artifact_dir(&jobarray_dir.join(job.to_string()));
	std::fs::create_dir_all(&part_dir).unwrap();
	std::fs::write(part_dir.join(index.to_string()), contents).unwrap();
}

#[test]
fn test_extract_support() {
	let regex = support_regex().unwrap();
	assert_eq!(
		extract_support(
			&regex,
			"a (low), importance: 0.50\n=> 1\nSupport: 42, Confidence: 0.93\n\n"
		),
		Some(42)
	);
	assert_eq!(extract_support(&regex, "=> 1\nConfidence: 0.93\n"), None);
	assert_eq!(extract_support(&regex, "Support: none\nSupport: 7\n"), None);
}

#[test]
fn test_merge_sorts_by_descending_support() {
	let dir = tempfile::tempdir().unwrap();
	let jobarray_dir = dir.path().join("jobarray");
	write_artifact(&jobarray_dir, 0, 0, "=> 0\nSupport: 5, Confidence: 1.00\n\n");
	write_artifact(&jobarray_dir, 0, 1, "=> 1\nSupport: 0, Confidence: 0.00\n\n");
	write_artifact(&jobarray_dir, 1, 2, "=> 0\nSupport: 12, Confidence: 0.50\n\n");
	write_artifact(&jobarray_dir, 1, 3, "=> 1\nSupport: 3, Confidence: 0.67\n\n");
	let target_file = dir.path().join("merged.md");
	let summary = merge(&jobarray_dir, &target_file).unwrap();
	assert_eq!(summary.merged, 3);
	assert_eq!(summary.unsupported, 1);
	assert!(summary.failed.is_empty());
	let merged = std::fs::read_to_string(&target_file).unwrap();
	insta::assert_snapshot!(merged.trim_end(), @r###"
 => 0
 Support: 12, Confidence: 0.50

 => 0
 Support: 5, Confidence: 1.00

 => 1
 Support: 3, Confidence: 0.67
 "###);
}

#[test]
fn test_merge_reports_artifacts_without_support() {
	let dir = tempfile::tempdir().unwrap();
	let jobarray_dir = dir.path().join("jobarray");
	write_artifact(&jobarray_dir, 0, 0, "=> 0\nSupport: 2, Confidence: 1.00\n\n");
	write_artifact(&jobarray_dir, 0, 1, "=> 1\n");
	write_artifact(&jobarray_dir, 2, 9, "=> 1\nSupport: 4, Confidence: 0.25\n\n");
	// A job that never wrote any artifact.
	std::fs::create_dir_all(jobarray_dir.join("1")).unwrap();
	let target_file = dir.path().join("merged.md");
	let summary = merge(&jobarray_dir, &target_file).unwrap();
	assert_eq!(summary.merged, 2);
	assert_eq!(summary.failed.len(), 1);
	assert!(summary.failed[0].0.ends_with("0/job-parts/part/1"));
	let merged = std::fs::read_to_string(&target_file).unwrap();
	assert!(merged.starts_with("=> 1\nSupport: 4"));
}

#[test]
fn test_merge_of_a_missing_directory_fails() {
	let dir = tempfile::tempdir().unwrap();
	let result = merge(&dir.path().join("missing"), &dir.path().join("merged.md"));
	assert!(result.is_err());
}

#[test]
fn test_merge_ignores_artifacts_being_written() {
	let dir = tempfile::tempdir().unwrap();
	let jobarray_dir = dir.path().join("jobarray");
	write_artifact(&jobarray_dir, 0, 0, "=> 0\nSupport: 2, Confidence: 1.00\n\n");
	let part_dir = artifact_dir(&jobarray_dir.join("0"));
	std::fs::write(part_dir.join(".1.tmp"), "=> 1\nSupport: 9, Conf").unwrap();
	let target_file = dir.path().join("merged.md");
	let summary = merge(&jobarray_dir, &target_file).unwrap();
	assert_eq!(summary.merged, 1);
	assert!(summary.failed.is_empty());
	assert_eq!(
		std::fs::read_to_string(&target_file).unwrap(),
		"=> 0\nSupport: 2, Confidence: 1.00\n\n"
	);
}

#[cfg(unix)]
#[test]
fn test_merge_continues_past_non_utf8_file_names() {
	use std::{ffi::OsStr, os::unix::ffi::OsStrExt};
	let dir = tempfile::tempdir().unwrap();
	let jobarray_dir = dir.path().join("jobarray");
	write_artifact(&jobarray_dir, 0, 0, "=> 0\nSupport: 5, Confidence: 1.00\n\n");
	let part_dir = artifact_dir(&jobarray_dir.join("0"));
	let bad_path = part_dir.join(OsStr::from_bytes(b"bad\xff"));
	if std::fs::write(&bad_path, "=> 1\n").is_err() {
		// Some filesystems refuse names that are not UTF-8.
		return;
	}
	let target_file = dir.path().join("merged.md");
	let summary = merge(&jobarray_dir, &target_file).unwrap();
	assert_eq!(summary.merged, 1);
	assert_eq!(summary.failed.len(), 1);
	assert_eq!(summary.failed[0].0, bad_path);
	let merged = std::fs::read_to_string(&target_file).unwrap();
	assert!(merged.starts_with("=> 0\nSupport: 5"));
}
