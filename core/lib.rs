/*!
This crate scores the rules extracted from a tree ensemble against each other. Each rule is abstracted into an [`AssociationCondition`](association::AssociationCondition), its support and confidence are computed against the rest of the rule population, and the work is cut into batches that can run on a local thread pool or as the elements of a cluster job array. Per-rule artifacts written by the batches are later gathered into one report by [`merge`](merge::merge).

The main entrypoint is [`analyze`].
*/

#![allow(clippy::tabs_in_doc_comments)]

mod analyze;
pub mod association;
pub mod config;
pub mod features;
pub mod merge;
pub mod partition;
pub mod population;
pub mod progress;
pub mod report;
pub mod result;
pub mod score;
pub mod sink;

pub use self::analyze::{analyze, AnalysisOutput, Scope, RESULTS_FILE_NAME};
