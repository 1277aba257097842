use core::fmt;
use core::ops::{Deref, DerefMut};

/// The ways a run can end without a usable value.
///
/// Match on the variant to tell the kinds apart; only [`Error::Job`] and
/// [`Error::Fallback`] carry a job-specific error.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error<E> {
    /// The winning job returned this error (tolerant policy only).
    #[error("job failed: {0}")]
    Job(E),
    /// Every job failed. The individual errors are kept in completion order.
    #[error("all jobs failed: {0}")]
    AllFailed(AggregateError<E>),
    /// No qualifying outcome arrived before the deadline.
    #[error("timed out waiting for a job")]
    Timeout,
    /// The custom timeout fallback returned this error.
    #[error("timeout fallback failed: {0}")]
    Fallback(E),
}

impl<E> Error<E> {
    /// Returns `true` for [`Error::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// Returns `true` for [`Error::AllFailed`].
    pub fn is_all_failed(&self) -> bool {
        matches!(self, Error::AllFailed(_))
    }

    /// The winning job's own error, if that is what this is.
    pub fn into_job_error(self) -> Option<E> {
        match self {
            Error::Job(err) => Some(err),
            _ => None,
        }
    }
}

/// A collection of errors.
#[repr(transparent)]
pub struct AggregateError<E> {
    pub(crate) inner: Vec<E>,
}

impl<E> AggregateError<E> {
    pub(crate) fn new(inner: Vec<E>) -> Self {
        Self { inner }
    }

    /// Consume the aggregate, returning the errors in completion order.
    pub fn into_inner(self) -> Vec<E> {
        self.inner
    }
}

impl<E: fmt::Debug> fmt::Debug for AggregateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} errors occurred:", self.inner.len())?;

        for (i, err) in self.inner.iter().enumerate() {
            writeln!(f, "- Error {}: {err:?}", i + 1)?;
        }

        Ok(())
    }
}

impl<E: fmt::Display> fmt::Display for AggregateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred", self.inner.len())
    }
}

impl<E: PartialEq> PartialEq for AggregateError<E> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<E: Eq> Eq for AggregateError<E> {}

impl<E> Deref for AggregateError<E> {
    type Target = Vec<E>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<E> DerefMut for AggregateError<E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<E: std::error::Error> std::error::Error for AggregateError<E> {}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::{self, ErrorKind};

    #[test]
    fn aggregate_display_counts() {
        let errs = AggregateError::new(vec![
            io::Error::new(ErrorKind::Other, "oops"),
            io::Error::new(ErrorKind::Other, "oh no"),
        ]);
        assert_eq!(errs.to_string(), "2 errors occurred");
        assert_eq!(errs[1].to_string(), "oh no");
    }

    #[test]
    fn aggregate_debug_lists_each_error() {
        let errs = AggregateError::new(vec!["a", "b"]);
        assert_eq!(
            format!("{errs:?}"),
            "2 errors occurred:\n- Error 1: \"a\"\n- Error 2: \"b\"\n"
        );
    }

    #[test]
    fn error_kinds() {
        let timeout: Error<&str> = Error::Timeout;
        assert!(timeout.is_timeout());
        assert!(!timeout.is_all_failed());
        assert_eq!(timeout.to_string(), "timed out waiting for a job");

        let all: Error<&str> = Error::AllFailed(AggregateError::new(vec!["x"]));
        assert!(all.is_all_failed());
        assert_eq!(all.to_string(), "all jobs failed: 1 errors occurred");
        assert_eq!(all.into_job_error(), None);

        let job: Error<&str> = Error::Job("boom");
        assert_eq!(job.to_string(), "job failed: boom");
        assert_eq!(job.into_job_error(), Some("boom"));
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<T: std::error::Error>(_: &T) {}
        let err: Error<io::Error> = Error::Fallback(io::Error::new(ErrorKind::Other, "late"));
        assert_error(&err);
    }
}
