use ruleminer_util::progress_counter::ProgressCounter;

#[derive(Debug)]
pub enum Progress {
	Extracting,
	/// Rules are being scored one at a time on the calling thread. The counter advances after each rule.
	Scoring(ProgressCounter),
	/// Rules are being scored on a pool of `n_threads` workers. Nothing more is reported until every task has finished.
	ScoringInPool { n_tasks: usize, n_threads: usize },
	Writing,
}
