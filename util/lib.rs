/*!
Small shared pieces used across the ruleminer crates: the bounded worker pool that runs scoring tasks and the atomic counter used to report progress.
*/

#![allow(clippy::tabs_in_doc_comments)]

pub mod progress_counter;
pub mod thread_pool;
