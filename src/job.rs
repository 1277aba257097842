use std::sync::Arc;

use crate::CancelToken;

/// A registered job: runs once, on its own thread, with the run's token.
pub(crate) type Job<T, E> = Box<dyn FnOnce(CancelToken) -> Result<T, E> + Send + 'static>;

/// A custom timeout fallback. Shared so every run of a racer can call it.
pub(crate) type Fallback<T, E> = Arc<dyn Fn(&CancelToken) -> Result<T, E> + Send + Sync + 'static>;

/// Box a job that ignores cancellation.
pub(crate) fn ignoring_cancel<T, E, F>(job: F) -> Job<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    Box::new(move |_| job())
}

/// Box a job that receives the run's cancellation token.
pub(crate) fn with_cancel<T, E, F>(job: F) -> Job<T, E>
where
    F: FnOnce(CancelToken) -> Result<T, E> + Send + 'static,
{
    Box::new(job)
}
