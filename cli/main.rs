//! This module contains the main entrypoint to the ruleminer cli.

use self::progress_view::ProgressView;
use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use ruleminer_core::{
	config::{load_config, AnalysisOptions},
	features::FeatureTable,
	merge::merge,
	population::RulePopulation,
	AnalysisOutput, Scope,
};
use ruleminer_tree::{forest_stats, split_count_importances, Forest};
use std::path::PathBuf;

mod progress_view;

#[derive(Parser)]
#[clap(
	about = "Extract the rules of a tree ensemble and score them against each other.",
	disable_help_subcommand = true,
)]
enum Options {
	#[clap(name = "analyze")]
	Analyze(AnalyzeOptions),
	#[clap(name = "batch")]
	Batch(BatchOptions),
	#[clap(name = "merge")]
	Merge(MergeOptions),
	#[clap(name = "rules")]
	Rules(RulesOptions),
	#[clap(name = "stats")]
	Stats(StatsOptions),
}

#[derive(clap::Args, Debug)]
struct RunOptions {
	#[clap(short, long, help = "the path to the forest .json file")]
	model: PathBuf,
	#[clap(short, long, help = "the directory to write the results to")]
	output: PathBuf,
	#[clap(short, long, help = "the path to a config file")]
	config: Option<PathBuf>,
	#[clap(short, long, help = "the path to a features file with names and importances")]
	features: Option<PathBuf>,
	#[clap(long, help = "keep only the first splits of each scored rule")]
	max_depth: Option<usize>,
	#[clap(long, help = "the number of worker threads")]
	threads: Option<usize>,
	#[clap(long, help = "score on a single thread")]
	sequential: bool,
	#[clap(long = "no-progress", help = "disable the cli progress view", parse(from_flag = std::ops::Not::not))]
	progress: bool,
}

#[derive(clap::Args, Debug)]
#[clap(about = "score every rule of a forest")]
struct AnalyzeOptions {
	#[clap(flatten)]
	run: RunOptions,
}

#[derive(clap::Args, Debug)]
#[clap(about = "score one batch of rules")]
#[clap(
	long_about = "score one batch of rules, writing the output to <output>/jobarray/<index>. Run it once for each index of a cluster job array and gather the results with `ruleminer merge`."
)]
struct BatchOptions {
	#[clap(flatten)]
	run: RunOptions,
	#[clap(short, long, help = "the index of the batch to score")]
	index: usize,
}

#[derive(clap::Args, Debug)]
#[clap(about = "gather the results of a job array into one file")]
struct MergeOptions {
	#[clap(help = "the jobarray directory written by `ruleminer batch`")]
	jobarray_dir: PathBuf,
	#[clap(help = "the file to write the merged rules to")]
	target_file: PathBuf,
}

#[derive(clap::Args, Debug)]
#[clap(about = "print the rules of a forest in the order they are scored")]
struct RulesOptions {
	#[clap(short, long, help = "the path to the forest .json file")]
	model: PathBuf,
}

#[derive(clap::Args, Debug)]
#[clap(about = "print statistics about a forest as json")]
struct StatsOptions {
	#[clap(short, long, help = "the path to the forest .json file")]
	model: PathBuf,
	#[clap(long, help = "count the conditions cut after this many splits")]
	max_depth: Option<usize>,
}

fn main() {
	let options = Options::parse();
	let result = match options {
		Options::Analyze(options) => cli_analyze(options.run, Scope::Full),
		Options::Batch(options) => cli_analyze(options.run, Scope::Batch(options.index)),
		Options::Merge(options) => cli_merge(options),
		Options::Rules(options) => cli_rules(options),
		Options::Stats(options) => cli_stats(options),
	};
	if let Err(error) = result {
		eprintln!("{}: {:#}", "error".red().bold(), error);
		std::process::exit(1);
	}
}

fn cli_analyze(options: RunOptions, scope: Scope) -> Result<()> {
	// Flags given on the command line take precedence over the config file.
	let mut config = load_config(options.config.as_deref())?;
	if options.max_depth.is_some() {
		config.max_depth = options.max_depth;
	}
	if options.threads.is_some() {
		config.n_threads = options.threads;
	}
	if options.sequential {
		config.sequential = Some(true);
	}
	let analysis_options = AnalysisOptions::from_config(&config)?;

	let forest = Forest::from_path(&options.model)?;
	let importances = split_count_importances(&forest, forest.n_features())?;
	let features = match options.features.as_deref() {
		Some(features_path) => FeatureTable::from_path(features_path, importances)?,
		None => FeatureTable::new(importances),
	};

	let output = {
		let mut progress_view = if options.progress {
			Some(ProgressView::new())
		} else {
			None
		};
		ruleminer_core::analyze(
			&forest,
			features,
			&options.output,
			scope,
			&analysis_options,
			&mut |progress| {
				if let Some(progress_view) = progress_view.as_mut() {
					progress_view.update(progress)
				}
			},
		)?
	};
	announce(&output, scope);
	Ok(())
}

fn announce(output: &AnalysisOutput, scope: Scope) {
	if output.past_the_end {
		if let Scope::Batch(index) = scope {
			eprintln!(
				"Batch {} is past the end of the {} rules ({} batches). There is nothing to do.",
				index, output.n_rules, output.n_batches
			);
		}
		return;
	}
	eprintln!(
		"Scored {} of the rules {}..{} out of {}.",
		output.n_scored, output.range.start, output.range.end, output.n_rules
	);
	if !output.skipped.is_empty() {
		eprintln!(
			"{}: skipped {} rules whose artifacts already existed",
			"warning".yellow().bold(),
			output.skipped.len()
		);
	}
	if let Some(artifact_dir) = output.artifact_dir.as_ref() {
		eprintln!("The rule artifacts were written to {}.", artifact_dir.display());
	}
	if let Some(results_path) = output.results_path.as_ref() {
		eprintln!("Your results were written to {}.", results_path.display());
	}
	if let Some(overview_path) = output.overview_path.as_ref() {
		eprintln!("The overview was written to {}.", overview_path.display());
	}
}

fn cli_merge(options: MergeOptions) -> Result<()> {
	let summary = merge(&options.jobarray_dir, &options.target_file)?;
	for (path, reason) in summary.failed.iter() {
		eprintln!(
			"{}: {}: {}",
			"warning".yellow().bold(),
			path.display(),
			reason
		);
	}
	eprintln!(
		"Merged {} rules into {}, dropped {} without support.",
		summary.merged,
		options.target_file.display(),
		summary.unsupported
	);
	Ok(())
}

fn cli_rules(options: RulesOptions) -> Result<()> {
	let forest = Forest::from_path(&options.model)?;
	let population = RulePopulation::from_forest(&forest)?;
	for (index, rule) in population.rules.iter().enumerate() {
		println!(
			"rule {} (tree {}, leaf {})\n{}\n",
			index, rule.tree_index, rule.leaf_node_id, rule
		);
	}
	Ok(())
}

fn cli_stats(options: StatsOptions) -> Result<()> {
	let forest = Forest::from_path(&options.model)?;
	let stats = forest_stats(&forest, options.max_depth)?;
	println!("{}", serde_json::to_string_pretty(&stats)?);
	Ok(())
}
