use anyhow::{format_err, Result};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::{
	panic::{catch_unwind, AssertUnwindSafe},
	thread::JoinHandle,
};

type Job = Box<dyn FnOnce() + Send + 'static>;

/**
A `ThreadPool` owns a fixed number of worker threads that pull jobs from a shared queue. It is an ordinary value: create it when a run starts, pass it by reference to whatever dispatches work, and drop it when the run ends to join its workers.

`execute` is a barrier. It submits every task, blocks until all of them have finished, and returns their outputs in the order they completed, which is not the order they were submitted.

```
use ruleminer_util::thread_pool::ThreadPool;

let pool = ThreadPool::new(2);
let mut squares = pool.execute((0..4u64).map(|i| move || i * i).collect()).unwrap();
squares.sort_unstable();
assert_eq!(squares, vec![0, 1, 4, 9]);
```
*/
pub struct ThreadPool {
	job_sender: Option<Sender<Job>>,
	threads: Vec<JoinHandle<()>>,
}

impl ThreadPool {
	/// Start a pool with `size` workers. A size of zero is treated as one.
	pub fn new(size: usize) -> ThreadPool {
		let size = size.max(1);
		let (job_sender, job_receiver) = unbounded::<Job>();
		let threads = (0..size)
			.map(|_| {
				let job_receiver = job_receiver.clone();
				std::thread::spawn(move || worker_main(job_receiver))
			})
			.collect();
		ThreadPool {
			job_sender: Some(job_sender),
			threads,
		}
	}

	/// Start a pool with one worker per available core.
	pub fn with_available_parallelism() -> ThreadPool {
		let size = std::thread::available_parallelism()
			.map(|n| n.get())
			.unwrap_or(1);
		ThreadPool::new(size)
	}

	pub fn size(&self) -> usize {
		self.threads.len()
	}

	pub fn execute<F, R>(&self, tasks: Vec<F>) -> Result<Vec<R>>
	where
		F: FnOnce() -> R + Send + 'static,
		R: Send + 'static,
	{
		let job_sender = self
			.job_sender
			.as_ref()
			.ok_or_else(|| format_err!("the thread pool has shut down"))?;
		let n_tasks = tasks.len();
		let (result_sender, result_receiver) = unbounded::<std::thread::Result<R>>();
		for task in tasks {
			let result_sender = result_sender.clone();
			let job: Job = Box::new(move || {
				let result = catch_unwind(AssertUnwindSafe(task));
				// The receiver lives until every sender is gone, so this cannot fail.
				result_sender.send(result).ok();
			});
			job_sender
				.send(job)
				.map_err(|_| format_err!("the thread pool's workers have exited"))?;
		}
		drop(result_sender);
		let mut results = Vec::with_capacity(n_tasks);
		let mut n_panicked = 0;
		for result in result_receiver.iter() {
			match result {
				Ok(result) => results.push(result),
				Err(_) => n_panicked += 1,
			}
		}
		if n_panicked > 0 {
			return Err(format_err!(
				"{} of {} tasks panicked",
				n_panicked,
				n_tasks
			));
		}
		Ok(results)
	}
}

impl Drop for ThreadPool {
	fn drop(&mut self) {
		// Closing the queue makes every idle worker return.
		self.job_sender.take();
		for thread in self.threads.drain(..) {
			thread.join().ok();
		}
	}
}

fn worker_main(job_receiver: Receiver<Job>) {
	while let Ok(job) = job_receiver.recv() {
		job();
	}
}

#[test]
fn test_execute_collects_every_result() {
	let pool = ThreadPool::new(3);
	let mut results = pool
		.execute((0..100usize).map(|i| move || i + 1).collect())
		.unwrap();
	results.sort_unstable();
	assert_eq!(results, (1..=100).collect::<Vec<_>>());
}

#[test]
fn test_execute_empty() {
	let pool = ThreadPool::new(2);
	let results: Vec<usize> = pool.execute(Vec::<fn() -> usize>::new()).unwrap();
	assert!(results.is_empty());
}

#[test]
fn test_pool_is_reusable_across_barriers() {
	let pool = ThreadPool::new(2);
	let one: fn() -> usize = || 1;
	let first = pool.execute(vec![one, one]).unwrap();
	let second = pool.execute(vec![|| 2]).unwrap();
	assert_eq!(first.len() + second.len(), 3);
}

#[test]
fn test_panicking_task_is_reported() {
	let pool = ThreadPool::new(2);
	let tasks: Vec<Box<dyn FnOnce() -> usize + Send>> =
		vec![Box::new(|| 1), Box::new(|| panic!("boom"))];
	let result = pool.execute(tasks);
	assert!(result.is_err());
	// The worker that ran the panicking task is still alive.
	let three: fn() -> usize = || 3;
	assert_eq!(pool.execute(vec![three; 3]).unwrap().len(), 3);
}

#[test]
fn test_zero_size_pool_has_one_worker() {
	assert_eq!(ThreadPool::new(0).size(), 1);
}
