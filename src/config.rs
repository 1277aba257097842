//! Racer configuration.

use std::time::Duration;

/// How long a run waits for a qualifying outcome unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Which job outcome ends a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Policy {
    /// The first job to finish wins, whether it succeeded or failed.
    #[default]
    Tolerant,
    /// The first job to succeed wins. If every job fails the run fails with
    /// [`Error::AllFailed`][crate::Error::AllFailed].
    Intolerant,
}

impl Policy {
    /// Returns `true` for [`Policy::Tolerant`].
    pub fn is_tolerant(self) -> bool {
        matches!(self, Policy::Tolerant)
    }
}

impl From<bool> for Policy {
    fn from(error_tolerant: bool) -> Self {
        if error_tolerant {
            Policy::Tolerant
        } else {
            Policy::Intolerant
        }
    }
}

/// What the default timeout fallback produces.
///
/// Ignored once a custom fallback is installed with
/// [`Racer::set_timeout_fallback`][crate::Racer::set_timeout_fallback].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OnTimeout {
    /// Fail the run with [`Error::Timeout`][crate::Error::Timeout].
    #[default]
    Fail,
    /// Succeed with no value.
    Empty,
}

/// Settings shared by every run of a [`Racer`][crate::Racer].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Deadline for a qualifying outcome, measured from launch.
    pub timeout: Duration,
    /// Completion policy.
    pub policy: Policy,
    /// Default timeout behavior.
    pub on_timeout: OnTimeout,
}

impl Config {
    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the completion policy.
    pub fn with_policy(mut self, policy: impl Into<Policy>) -> Self {
        self.policy = policy.into();
        self
    }

    /// Set the default timeout behavior.
    pub fn with_on_timeout(mut self, on_timeout: OnTimeout) -> Self {
        self.on_timeout = on_timeout;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            policy: Policy::default(),
            on_timeout: OnTimeout::default(),
        }
    }
}
