use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};

/**
A `ProgressCounter` tracks how many of a fixed number of rules have been handled so far. It is cheap to clone and every clone shares the same count, so the coordinating thread can hand one to a progress view while the scoring loop increments another.

```
use ruleminer_util::progress_counter::ProgressCounter;

let progress_counter = ProgressCounter::new(4);
progress_counter.inc(1);
assert_eq!(progress_counter.percent(), 25);
```
*/
#[derive(Clone, Debug)]
pub struct ProgressCounter {
	current: Arc<AtomicU64>,
	total: u64,
}

impl ProgressCounter {
	/// Create a new `ProgressCounter` that will count from 0 up to the specified `total`.
	pub fn new(total: u64) -> Self {
		Self {
			current: Arc::new(AtomicU64::new(0)),
			total,
		}
	}

	pub fn total(&self) -> u64 {
		self.total
	}

	pub fn get(&self) -> u64 {
		self.current.load(Ordering::Relaxed)
	}

	pub fn inc(&self, amount: u64) {
		self.current.fetch_add(amount, Ordering::Relaxed);
	}

	/// The whole-number percentage of work done. An empty counter is reported as complete.
	pub fn percent(&self) -> u64 {
		if self.total == 0 {
			return 100;
		}
		(self.get().min(self.total) * 100) / self.total
	}

	pub fn is_done(&self) -> bool {
		self.get() >= self.total
	}
}

#[test]
fn test_percent() {
	let progress_counter = ProgressCounter::new(3);
	assert_eq!(progress_counter.percent(), 0);
	let clone = progress_counter.clone();
	clone.inc(1);
	assert_eq!(progress_counter.percent(), 33);
	clone.inc(2);
	assert_eq!(progress_counter.percent(), 100);
	assert!(progress_counter.is_done());
}

#[test]
fn test_percent_empty() {
	let progress_counter = ProgressCounter::new(0);
	assert_eq!(progress_counter.percent(), 100);
	assert!(progress_counter.is_done());
}
