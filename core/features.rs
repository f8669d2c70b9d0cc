/*!
Display metadata for features: a name, an optional category and an importance used to order the tests of a rendered rule. Scoring never looks at any of this.
*/

use anyhow::{Context, Result};
use std::{borrow::Cow, path::Path};

/// A lookup table indexed by feature id, built once when a run starts.
#[derive(Clone, Debug, Default)]
pub struct FeatureTable {
	names: Vec<Option<String>>,
	categories: Vec<Option<String>>,
	importances: Vec<f32>,
}

/// The file format read by [`FeatureTable::from_path`]. It is YAML, so JSON works too.
#[derive(Debug, serde::Deserialize)]
pub struct FeaturesFile {
	pub features: Vec<FeatureEntry>,
}

#[derive(Debug, serde::Deserialize)]
pub struct FeatureEntry {
	pub id: usize,
	pub name: Option<String>,
	pub category: Option<String>,
	pub importance: Option<f32>,
}

impl FeatureTable {
	/// Create a table with no names or categories and the given importances.
	pub fn new(importances: Vec<f32>) -> FeatureTable {
		FeatureTable {
			names: vec![None; importances.len()],
			categories: vec![None; importances.len()],
			importances,
		}
	}

	/// Create a table from the entries of a features file. Entries without an importance take theirs from `fallback_importances`.
	pub fn from_entries(entries: Vec<FeatureEntry>, fallback_importances: Vec<f32>) -> FeatureTable {
		let mut table = FeatureTable::new(fallback_importances);
		for entry in entries {
			table.ensure_len(entry.id + 1);
			table.names[entry.id] = entry.name;
			table.categories[entry.id] = entry.category;
			if let Some(importance) = entry.importance {
				table.importances[entry.id] = importance;
			}
		}
		table
	}

	pub fn from_path(path: &Path, fallback_importances: Vec<f32>) -> Result<FeatureTable> {
		let features = std::fs::read_to_string(path)
			.with_context(|| format!("failed to read features file {}", path.display()))?;
		let features: FeaturesFile = serde_yaml::from_str(&features)
			.with_context(|| format!("failed to parse features file {}", path.display()))?;
		Ok(FeatureTable::from_entries(
			features.features,
			fallback_importances,
		))
	}

	fn ensure_len(&mut self, len: usize) {
		if self.names.len() < len {
			self.names.resize(len, None);
			self.categories.resize(len, None);
			self.importances.resize(len, 0.0);
		}
	}

	pub fn name(&self, feature_id: usize) -> Cow<str> {
		match self.names.get(feature_id) {
			Some(Some(name)) => Cow::Borrowed(name),
			_ => Cow::Owned(format!("feature {}", feature_id)),
		}
	}

	pub fn category(&self, feature_id: usize) -> Option<&str> {
		self.categories
			.get(feature_id)
			.and_then(|category| category.as_deref())
	}

	pub fn importance(&self, feature_id: usize) -> f32 {
		self.importances.get(feature_id).copied().unwrap_or(0.0)
	}
}

#[test]
fn test_feature_table_from_yaml() {
	let file: FeaturesFile = serde_yaml::from_str(
		r#"
features:
  - id: 0
    name: Number of conjuncts
    category: structure
  - id: 3
    name: Quantifiers per conjunct
    importance: 0.4
"#,
	)
	.unwrap();
	let table = FeatureTable::from_entries(file.features, vec![0.1, 0.2]);
	assert_eq!(table.name(0), "Number of conjuncts");
	assert_eq!(table.category(0), Some("structure"));
	assert_eq!(table.importance(0), 0.1);
	assert_eq!(table.name(1), "feature 1");
	assert_eq!(table.importance(1), 0.2);
	assert_eq!(table.category(1), None);
	assert_eq!(table.importance(2), 0.0);
	assert_eq!(table.importance(3), 0.4);
	assert_eq!(table.name(17), "feature 17");
	assert_eq!(table.importance(17), 0.0);
}
