use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, OnTimeout, Policy};
use crate::job::{self, Fallback, Job};
use crate::run::{Outcome, Run};
use crate::CancelToken;

/// Races jobs on parallel threads and keeps the first qualifying outcome.
///
/// Register jobs, configure, then call [`run`][Racer::run] (or
/// [`run_blocking`][Racer::run_blocking]). Each run takes the jobs
/// registered since the previous run, so a racer can be reused.
///
/// # Examples
///
/// ```
/// use job_racer::Racer;
/// use std::thread::sleep;
/// use std::time::Duration;
///
/// let mut racer = Racer::<&str, &str>::new();
/// racer.add_job(|| {
///     sleep(Duration::from_millis(50));
///     Ok("slow")
/// });
/// racer.add_job(|| Ok("fast"));
///
/// assert_eq!(racer.run_blocking().unwrap(), Some("fast"));
/// ```
pub struct Racer<T, E> {
    scope: CancelToken,
    config: Config,
    jobs: Vec<Job<T, E>>,
    fallback: Option<Fallback<T, E>>,
}

impl<T, E> Racer<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Create a racer with a fresh root cancellation scope.
    pub fn new() -> Self {
        Self::with_scope(CancelToken::new(), Config::default())
    }

    /// Create a racer whose runs are cancelled whenever `parent` is.
    pub fn with_parent(parent: &CancelToken) -> Self {
        Self::with_scope(parent.child_token(), Config::default())
    }

    /// Create a racer from an existing configuration.
    pub fn with_config(config: Config) -> Self {
        Self::with_scope(CancelToken::new(), config)
    }

    fn with_scope(scope: CancelToken, config: Config) -> Self {
        Self {
            scope,
            config,
            jobs: Vec::new(),
            fallback: None,
        }
    }

    /// Set how long a run waits before falling back.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.config.timeout = timeout;
        self
    }

    /// `true`: the first job to finish wins, even with an error.
    /// `false`: the first job to succeed wins; if all fail the run fails.
    pub fn set_error_tolerant(&mut self, error_tolerant: bool) -> &mut Self {
        self.set_policy(error_tolerant)
    }

    /// Set the completion policy.
    pub fn set_policy(&mut self, policy: impl Into<Policy>) -> &mut Self {
        self.config.policy = policy.into();
        self
    }

    /// Choose what the default timeout fallback returns.
    pub fn set_on_timeout(&mut self, on_timeout: OnTimeout) -> &mut Self {
        self.config.on_timeout = on_timeout;
        self
    }

    /// Replace the timeout fallback.
    ///
    /// The fallback runs on the polling thread once the deadline passes. Its
    /// error is reported as [`Error::Fallback`][crate::Error::Fallback].
    ///
    /// It is called from inside `Run::poll`, so it blocks the executor thread
    /// until it returns. Keep it short when awaiting the run from async code.
    pub fn set_timeout_fallback<F>(&mut self, fallback: F) -> &mut Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(move |_: &CancelToken| fallback()));
        self
    }

    /// Replace the timeout fallback with one that sees the run's token.
    ///
    /// The token has not been cancelled yet when the fallback is called. Like
    /// [`set_timeout_fallback`][Racer::set_timeout_fallback], it runs inside
    /// `Run::poll` and blocks the executor thread.
    pub fn set_timeout_fallback_with_cancel<F>(&mut self, fallback: F) -> &mut Self
    where
        F: Fn(&CancelToken) -> Result<T, E> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Register a job that does not observe cancellation.
    pub fn add_job<F>(&mut self, job: F) -> &mut Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        self.jobs.push(job::ignoring_cancel(job));
        self
    }

    /// Register several jobs that do not observe cancellation.
    pub fn add_jobs<I, F>(&mut self, jobs: I) -> &mut Self
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        self.jobs.extend(jobs.into_iter().map(job::ignoring_cancel));
        self
    }

    /// Register a job that receives the run's cancellation token.
    ///
    /// The token is cancelled once the run has its outcome. Jobs should check
    /// it at safe points and return early; nothing forces them to.
    pub fn add_job_with_cancel<F>(&mut self, job: F) -> &mut Self
    where
        F: FnOnce(CancelToken) -> Result<T, E> + Send + 'static,
    {
        self.jobs.push(job::with_cancel(job));
        self
    }

    /// Register several jobs that receive the run's cancellation token.
    pub fn add_jobs_with_cancel<I, F>(&mut self, jobs: I) -> &mut Self
    where
        I: IntoIterator<Item = F>,
        F: FnOnce(CancelToken) -> Result<T, E> + Send + 'static,
    {
        self.jobs.extend(jobs.into_iter().map(job::with_cancel));
        self
    }

    /// Start a run over the jobs registered so far.
    ///
    /// The returned future launches one thread per job when first polled and
    /// resolves with the first outcome that satisfies the policy, or with the
    /// timeout fallback's result. With no jobs it resolves to `Ok(None)`
    /// right away.
    pub fn run(&mut self) -> Run<T, E> {
        Run::new(
            std::mem::take(&mut self.jobs),
            self.scope.child_token(),
            &self.config,
            self.fallback.clone(),
        )
    }

    /// Like [`run`][Racer::run], blocking the current thread until done.
    pub fn run_blocking(&mut self) -> Outcome<T, E> {
        futures_lite::future::block_on(self.run())
    }
}

impl<T, E> Racer<T, E> {
    /// The current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The racer's scope. Every run gets a child of this token.
    pub fn scope(&self) -> &CancelToken {
        &self.scope
    }

    /// Number of jobs waiting for the next run.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns `true` if no jobs are waiting for the next run.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl<T, E> Default for Racer<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Racer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Racer")
            .field("jobs", &self.jobs.len())
            .field("config", &self.config)
            .field("custom_fallback", &self.fallback.is_some())
            .field("scope", &self.scope)
            .finish()
    }
}
