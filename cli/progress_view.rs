use colored::Colorize;
use ruleminer_core::progress::Progress;
use std::{
	io::Write,
	sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender},
	thread::{spawn, JoinHandle},
	time::Duration,
};

/// Renders the progress of a run on stderr from a background thread. The scoring loop only sends stage changes, the thread polls the current counter.
pub struct ProgressView {
	thread: Option<JoinHandle<()>>,
	sender: Option<Sender<Option<Progress>>>,
}

impl ProgressView {
	pub fn new() -> ProgressView {
		let (sender, receiver) = channel::<Option<Progress>>();
		let thread = Some(spawn(move || thread_main(receiver)));
		ProgressView {
			thread,
			sender: Some(sender),
		}
	}

	pub fn update(&mut self, progress: Progress) {
		if let Some(sender) = self.sender.as_ref() {
			sender.send(Some(progress)).ok();
		}
	}
}

impl Drop for ProgressView {
	fn drop(&mut self) {
		if let Some(sender) = self.sender.take() {
			sender.send(None).ok();
		}
		if let Some(thread) = self.thread.take() {
			thread.join().ok();
		}
	}
}

fn thread_main(receiver: Receiver<Option<Progress>>) {
	let mut stderr = std::io::stderr();
	let mut progress: Option<Progress> = None;
	loop {
		match receiver.recv_timeout(Duration::from_millis(100)) {
			Err(RecvTimeoutError::Timeout) => {}
			Ok(None) | Err(RecvTimeoutError::Disconnected) => {
				finish_line(&mut stderr, progress.as_ref());
				break;
			}
			Ok(Some(new_progress)) => {
				finish_line(&mut stderr, progress.as_ref());
				announce(&new_progress);
				progress = Some(new_progress);
			}
		}
		if let Some(Progress::Scoring(progress_counter)) = progress.as_ref() {
			write!(
				stderr,
				"\r{} {}/{} ({}%)",
				"scoring".bold(),
				progress_counter.get(),
				progress_counter.total(),
				progress_counter.percent()
			)
			.ok();
			stderr.flush().ok();
		}
	}
}

fn announce(progress: &Progress) {
	match progress {
		Progress::Extracting => eprintln!("{}", "extracting rules".bold()),
		Progress::Scoring(_) => {}
		Progress::ScoringInPool { n_tasks, n_threads } => eprintln!(
			"{} {} rules on {} threads",
			"scoring".bold(),
			n_tasks,
			n_threads
		),
		Progress::Writing => eprintln!("{}", "writing results".bold()),
	}
}

/// End the line of a counter view so the next message starts on its own line.
fn finish_line(stderr: &mut std::io::Stderr, progress: Option<&Progress>) {
	if let Some(Progress::Scoring(progress_counter)) = progress {
		writeln!(
			stderr,
			"\r{} {}/{} ({}%)",
			"scoring".bold(),
			progress_counter.get(),
			progress_counter.total(),
			progress_counter.percent()
		)
		.ok();
	}
}
