#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Synchronization primitives for running the same unit of work on a fixed set of threads,
//! over and over, blocking until every thread has finished each time.
//!
//! This crate provides:
//!
//! * [`Broadcaster`] - a reusable many-to-many barrier. One party opens a round with
//!   [`send()`][Broadcaster::send] and blocks until a fixed number of receivers have each
//!   acknowledged it with [`receive()`][Broadcaster::receive]. The barrier re-arms itself after
//!   every round.
//! * [`WorkerPool`] - a set of persistent worker threads built on two broadcasters. Each
//!   [`execute()`][WorkerPool::execute] call runs a function once on every worker and returns
//!   when all of them are done.
//!
//! Neither primitive is a task queue: there is no backpressure, no priority and no isolation of
//! panics. Every round involves every party.
//!
//! # Example
//!
//! ```
//! use std::sync::Mutex;
//!
//! use simple_sync::WorkerPool;
//!
//! let pool = WorkerPool::new(4).unwrap();
//!
//! let chunks = Mutex::new(Vec::new());
//! let data = (0..100).collect::<Vec<u32>>();
//!
//! pool.execute(|worker_index| {
//!     let sum: u32 = data.iter().skip(worker_index).step_by(4).sum();
//!     chunks.lock().unwrap().push(sum);
//! })
//! .unwrap();
//!
//! let total: u32 = chunks.into_inner().unwrap().into_iter().sum();
//! assert_eq!(total, 4950);
//! ```
//!
//! # Logging
//!
//! Pool lifecycle and round progress are reported through [`tracing`](https://docs.rs/tracing)
//! at `debug` and `trace` level. The crate never installs a subscriber.

mod broadcaster;
mod builder;
mod constants;
mod error;
mod pending_receive;
mod worker_pool;

pub use broadcaster::*;
pub use builder::*;
pub(crate) use error::Result;
pub use error::Error;
pub use pending_receive::*;
pub use worker_pool::*;
