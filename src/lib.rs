//! Race independent jobs on parallel threads and keep the first usable
//! result.
//!
//! A [`Racer`] collects jobs, each a closure returning `Result<T, E>`. A run
//! starts every job on its own thread and resolves with the first outcome
//! that satisfies the completion [`Policy`]:
//!
//! | Policy       | When does it return?                                     |
//! | ---          | ---                                                      |
//! | `Tolerant`   | On the first job to finish, `Ok` or `Err`                |
//! | `Intolerant` | On the first `Ok`, or with `AllFailed` after the last `Err` |
//!
//! If nothing qualifies before the configured timeout, the timeout fallback
//! decides the result instead. Either way, the run's [`CancelToken`] is
//! cancelled once the outcome is known, so jobs still running can notice and
//! stop early. Cancellation is cooperative: a job that never checks its token
//! keeps running, and its result is dropped.
//!
//! # Examples
//!
//! ```
//! use job_racer::{Error, Racer};
//! use std::thread::sleep;
//! use std::time::Duration;
//!
//! let mut racer = Racer::<&str, &str>::new();
//! racer
//!     .set_error_tolerant(false)
//!     .add_job(|| Err("mirror down"))
//!     .add_job_with_cancel(|token| {
//!         for _ in 0..10 {
//!             if token.is_cancelled() {
//!                 return Err("cancelled");
//!             }
//!             sleep(Duration::from_millis(5));
//!         }
//!         Ok("primary")
//!     });
//!
//! assert_eq!(racer.run_blocking(), Ok(Some("primary")));
//!
//! // Every run takes the jobs registered since the last one.
//! racer.add_job(|| Err("a")).add_job(|| Err("b"));
//! assert!(matches!(racer.run_blocking(), Err(Error::AllFailed(errs)) if errs.len() == 2));
//! ```
//!
//! [`Racer::run`] returns a future and works under any executor;
//! [`Racer::run_blocking`] drives it on the current thread.

#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]

mod cancel;
mod config;
mod error;
mod job;
mod racer;
mod run;
mod slot;

pub use cancel::{CancelToken, Cancelled};
pub use config::{Config, OnTimeout, Policy, DEFAULT_TIMEOUT};
pub use error::{AggregateError, Error};
pub use racer::Racer;
pub use run::{Outcome, Run};
