use crate::{association::AssociationCondition, features::FeatureTable, result::AnalysisResult};
use anyhow::{Context, Result};
use ruleminer_tree::SplitDirection;
use std::{
	fmt::Write,
	path::{Path, PathBuf},
	sync::Arc,
};

/// The directory below a run's output directory that holds the per-rule artifacts.
pub fn artifact_dir(output_dir: &Path) -> PathBuf {
	output_dir.join("job-parts").join("part")
}

/**
An `ArtifactSink` writes one text file per scored rule, named by the rule's index in the sorted population. An existing artifact marks its rule as done: a batch that is run again after being killed skips every rule whose artifact is already there. Artifacts are written under a temporary name and renamed into place, so an artifact that exists is always complete.
*/
#[derive(Debug)]
pub struct ArtifactSink {
	dir: PathBuf,
	features: Arc<FeatureTable>,
}

impl ArtifactSink {
	/// Create the artifact directory below `output_dir` if it does not exist.
	pub fn create(output_dir: &Path, features: Arc<FeatureTable>) -> Result<ArtifactSink> {
		let dir = artifact_dir(output_dir);
		std::fs::create_dir_all(&dir)
			.with_context(|| format!("failed to create artifact directory {}", dir.display()))?;
		Ok(ArtifactSink { dir, features })
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn path(&self, index: usize) -> PathBuf {
		self.dir.join(index.to_string())
	}

	pub fn exists(&self, index: usize) -> bool {
		self.path(index).is_file()
	}

	pub fn write(&self, result: &AnalysisResult) -> Result<()> {
		let path = self.path(result.index);
		let tmp_path = self.dir.join(format!(".{}.tmp", result.index));
		let mut artifact = String::new();
		render_result(&mut artifact, result, &self.features);
		std::fs::write(&tmp_path, artifact)
			.with_context(|| format!("failed to write artifact {}", tmp_path.display()))?;
		std::fs::rename(&tmp_path, &path)
			.with_context(|| format!("failed to move artifact into place at {}", path.display()))?;
		Ok(())
	}
}

/**
Render one result in the artifact format:

```text
Quantifiers per conjunct (**high**), importance: 0.31
Number of conjuncts [structure] (low), importance: 0.12
=> 1
Support: 12, Confidence: 0.75

```

The tests are ordered by descending feature importance. The `Support:` line is what [`merge`](crate::merge::merge) reads back, so its format must not change.
*/
pub fn render_result(output: &mut String, result: &AnalysisResult, features: &FeatureTable) {
	render_condition(output, &result.condition, features);
	writeln!(output, "=> {}", result.target).ok();
	writeln!(
		output,
		"Support: {}, Confidence: {:.2}",
		result.support, result.confidence
	)
	.ok();
	output.push('\n');
}

fn render_condition(output: &mut String, condition: &AssociationCondition, features: &FeatureTable) {
	let mut items = condition.items().to_vec();
	// The sort is stable, so equally important tests stay in feature order.
	items.sort_by(|a, b| {
		features
			.importance(b.feature_id)
			.total_cmp(&features.importance(a.feature_id))
	});
	for item in items {
		output.push_str(&features.name(item.feature_id));
		if let Some(category) = features.category(item.feature_id) {
			write!(output, " [{}]", category).ok();
		}
		output.push_str(match item.direction {
			SplitDirection::Left => " (low)",
			SplitDirection::Right => " (**high**)",
		});
		writeln!(
			output,
			", importance: {:.2}",
			features.importance(item.feature_id)
		)
		.ok();
	}
}

#[cfg(test)]
fn example_features() -> FeatureTable {
	use crate::features::FeatureEntry;
	FeatureTable::from_entries(
		vec![
			FeatureEntry {
				id: 0,
				name: Some("Number of conjuncts".to_owned()),
				category: Some("structure".to_owned()),
				importance: None,
			},
			FeatureEntry {
				id: 2,
				name: Some("Quantifiers per conjunct".to_owned()),
				category: None,
				importance: None,
			},
		],
		vec![0.12, 0.05, 0.31],
	)
}

#[test]
fn test_render_result() {
	use crate::association::item;
	let result = AnalysisResult {
		condition: AssociationCondition::new(vec![
			item(0, SplitDirection::Left),
			item(1, SplitDirection::Left),
			item(2, SplitDirection::Right),
		]),
		target: 1,
		support: 12,
		confidence: 0.75,
		..crate::result::result(0, 0, 0.0)
	};
	let mut output = String::new();
	render_result(&mut output, &result, &example_features());
	insta::assert_snapshot!(output.trim_end(), @r###"
 Quantifiers per conjunct (**high**), importance: 0.31
 Number of conjuncts [structure] (low), importance: 0.12
 feature 1 (low), importance: 0.05
 => 1
 Support: 12, Confidence: 0.75
 "###);
	assert!(output.ends_with("0.75\n\n"));
}

#[test]
fn test_sink_writes_one_file_per_rule() {
	let dir = tempfile::tempdir().unwrap();
	let sink = ArtifactSink::create(dir.path(), Arc::new(example_features())).unwrap();
	assert_eq!(sink.dir(), dir.path().join("job-parts").join("part"));
	assert!(!sink.exists(7));
	sink.write(&crate::result::result(7, 3, 0.5)).unwrap();
	assert!(sink.exists(7));
	let artifact = std::fs::read_to_string(sink.path(7)).unwrap();
	assert!(artifact.contains("Support: 3, Confidence: 0.50\n"));
	let entries: Vec<_> = std::fs::read_dir(sink.dir()).unwrap().collect();
	assert_eq!(entries.len(), 1);
}
