use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use async_io::Timer;
use futures_core::FusedFuture;
use pin_project::{pin_project, pinned_drop};

use crate::config::{Config, OnTimeout, Policy};
use crate::error::{AggregateError, Error};
use crate::job::{Fallback, Job};
use crate::slot::Slot;
use crate::CancelToken;

/// The outcome of a run: `Ok(None)` is the empty result.
pub type Outcome<T, E> = Result<Option<T>, Error<E>>;

/// State shared between a run and its worker threads.
struct Shared<T, E> {
    policy: Policy,
    total: usize,
    finished: AtomicUsize,
    failures: Mutex<Vec<E>>,
    slot: Slot<Outcome<T, E>>,
}

impl<T, E> Shared<T, E> {
    fn new(policy: Policy, total: usize) -> Self {
        Self {
            policy,
            total,
            finished: AtomicUsize::new(0),
            failures: Mutex::new(Vec::new()),
            slot: Slot::new(),
        }
    }

    /// Record that one unit finished. `None` means the unit produced nothing
    /// (it panicked or never started).
    fn complete(&self, index: usize, result: Option<Result<T, E>>) {
        match (self.policy, result) {
            (_, Some(Ok(value))) => {
                if self.slot.deliver(Ok(Some(value))) {
                    tracing::trace!(job = index, "job won the race");
                }
            }
            (Policy::Tolerant, Some(Err(err))) => {
                if self.slot.deliver(Err(Error::Job(err))) {
                    tracing::trace!(job = index, "failed job won the race");
                }
            }
            (Policy::Intolerant, Some(Err(err))) => {
                if !self.slot.is_claimed() {
                    self.failures
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(err);
                }
            }
            (_, None) => {}
        }

        let finished = self.finished.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert!(finished <= self.total);
        tracing::trace!(job = index, finished, total = self.total, "job finished");

        if finished == self.total && !self.slot.is_claimed() {
            let errors = std::mem::take(
                &mut *self.failures.lock().unwrap_or_else(PoisonError::into_inner),
            );
            self.slot
                .deliver(Err(Error::AllFailed(AggregateError::new(errors))));
        }
    }
}

/// Run one job to completion on the current thread.
fn run_unit<T, E>(shared: &Shared<T, E>, index: usize, job: Job<T, E>, token: CancelToken) {
    match panic::catch_unwind(AssertUnwindSafe(move || job(token))) {
        Ok(result) => shared.complete(index, Some(result)),
        Err(_) => {
            tracing::warn!(job = index, "job panicked, discarding it");
            shared.complete(index, None);
        }
    }
}

fn launch<T, E>(jobs: Vec<Job<T, E>>, policy: Policy, scope: &CancelToken) -> Arc<Shared<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    let shared = Arc::new(Shared::new(policy, jobs.len()));

    for (index, job) in jobs.into_iter().enumerate() {
        let unit = shared.clone();
        let token = scope.clone();
        let spawned = thread::Builder::new()
            .name(format!("job-racer-{index}"))
            .spawn(move || run_unit(&unit, index, job, token));

        if let Err(err) = spawned {
            tracing::warn!(job = index, error = %err, "failed to spawn job thread");
            shared.complete(index, None);
        }
    }

    shared
}

enum State<T, E> {
    Init(Vec<Job<T, E>>),
    Racing {
        shared: Arc<Shared<T, E>>,
        timer: Timer,
        started: Instant,
    },
    Done,
}

/// A future which races a set of jobs against a deadline.
///
/// This `struct` is created by the [`run`] method on [`Racer`]. See its
/// documentation for more.
///
/// Jobs are launched on the first poll. Dropping an unfinished `Run`
/// cancels its scope; the jobs already running are left to finish on their
/// own.
///
/// [`run`]: crate::Racer::run
/// [`Racer`]: crate::Racer
#[pin_project(PinnedDrop)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Run<T, E> {
    state: State<T, E>,
    scope: Option<CancelToken>,
    timeout: Duration,
    policy: Policy,
    on_timeout: OnTimeout,
    fallback: Option<Fallback<T, E>>,
}

impl<T, E> Run<T, E> {
    pub(crate) fn new(
        jobs: Vec<Job<T, E>>,
        scope: CancelToken,
        config: &Config,
        fallback: Option<Fallback<T, E>>,
    ) -> Self {
        Self {
            state: State::Init(jobs),
            scope: Some(scope),
            timeout: config.timeout,
            policy: config.policy,
            on_timeout: config.on_timeout,
            fallback,
        }
    }

    /// The cancellation token handed to this run's jobs.
    pub fn scope(&self) -> Option<&CancelToken> {
        self.scope.as_ref()
    }
}

/// Cancel the run scope. Only ever fires once: the token is taken.
fn cancel_scope(scope: &mut Option<CancelToken>) {
    if let Some(scope) = scope.take() {
        scope.cancel();
    }
}

impl<T, E> Future for Run<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = Outcome<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        loop {
            match this.state {
                State::Init(jobs) => {
                    if jobs.is_empty() {
                        *this.state = State::Done;
                        cancel_scope(this.scope);
                        return Poll::Ready(Ok(None));
                    }

                    let Some(scope) = this.scope.as_ref() else {
                        panic!("`Run` polled after completing");
                    };
                    let jobs = std::mem::take(jobs);
                    tracing::debug!(
                        jobs = jobs.len(),
                        policy = ?this.policy,
                        timeout_ms = this.timeout.as_millis(),
                        "launching race"
                    );
                    *this.state = State::Racing {
                        shared: launch(jobs, *this.policy, scope),
                        timer: Timer::after(*this.timeout),
                        started: Instant::now(),
                    };
                }
                State::Racing {
                    shared,
                    timer,
                    started,
                } => {
                    if let Poll::Ready(outcome) = shared.slot.poll_take(cx) {
                        tracing::debug!(
                            elapsed_ms = started.elapsed().as_millis(),
                            ok = outcome.is_ok(),
                            "race resolved"
                        );
                        *this.state = State::Done;
                        cancel_scope(this.scope);
                        return Poll::Ready(outcome);
                    }

                    if Pin::new(timer).poll(cx).is_pending() {
                        return Poll::Pending;
                    }

                    tracing::warn!(
                        timeout_ms = this.timeout.as_millis(),
                        "no job finished before the deadline, running the timeout fallback"
                    );
                    let outcome = match (this.fallback.as_ref(), this.scope.as_ref()) {
                        (Some(fallback), Some(scope)) => match fallback(scope) {
                            Ok(value) => Ok(Some(value)),
                            Err(err) => Err(Error::Fallback(err)),
                        },
                        _ => match this.on_timeout {
                            OnTimeout::Fail => Err(Error::Timeout),
                            OnTimeout::Empty => Ok(None),
                        },
                    };
                    *this.state = State::Done;
                    cancel_scope(this.scope);
                    return Poll::Ready(outcome);
                }
                State::Done => panic!("`Run` polled after completing"),
            }
        }
    }
}

impl<T, E> FusedFuture for Run<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn is_terminated(&self) -> bool {
        matches!(self.state, State::Done)
    }
}

#[pinned_drop]
impl<T, E> PinnedDrop for Run<T, E> {
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        if this.scope.is_some() && !matches!(this.state, State::Init(_)) {
            tracing::debug!("race dropped before resolving, cancelling its jobs");
        }
        cancel_scope(this.scope);
    }
}

impl<T, E> fmt::Debug for Run<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Init(jobs) => format!("Init({} jobs)", jobs.len()),
            State::Racing { shared, .. } => format!(
                "Racing({}/{} finished)",
                shared.finished.load(Ordering::Acquire),
                shared.total
            ),
            State::Done => "Done".to_owned(),
        };
        f.debug_struct("Run")
            .field("state", &state)
            .field("timeout", &self.timeout)
            .field("policy", &self.policy)
            .finish()
    }
}
