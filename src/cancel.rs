//! Cooperative cancellation.
//!
//! A [`CancelToken`] is an advisory signal. Cancelling it never interrupts a
//! running job; jobs are expected to check [`CancelToken::is_cancelled`] at
//! points where stopping is safe, or to await [`CancelToken::cancelled`].
//! A job that ignores its token runs to completion, and its result is
//! discarded.

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_core::FusedFuture;
use slab::Slab;

/// A cloneable, hierarchical cancellation signal.
///
/// All clones share the same state. Tokens created with
/// [`child_token`][CancelToken::child_token] are cancelled together with
/// their parent, but cancelling a child leaves the parent untouched.
///
/// # Examples
///
/// ```
/// use job_racer::CancelToken;
///
/// let parent = CancelToken::new();
/// let child = parent.child_token();
///
/// assert!(parent.cancel());
/// assert!(child.is_cancelled());
/// ```
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    children: Vec<Weak<Inner>>,
    // One entry per pending `Cancelled`, removed when it is dropped.
    wakers: Slab<Waker>,
}

impl Inner {
    fn new(cancelled: bool) -> Self {
        Self {
            cancelled: AtomicBool::new(cancelled),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }

        // Wake and cascade outside the lock so children never contend on it.
        let State { children, wakers } = std::mem::take(&mut *self.lock());
        for (_, waker) in wakers {
            waker.wake();
        }
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
        true
    }
}

impl CancelToken {
    /// Create a new root token in the non-cancelled state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new(false)),
        }
    }

    /// Derive a token that is cancelled whenever `self` is.
    ///
    /// If `self` is already cancelled the child starts out cancelled.
    pub fn child_token(&self) -> CancelToken {
        let mut state = self.inner.lock();
        if self.is_cancelled() {
            return Self {
                inner: Arc::new(Inner::new(true)),
            };
        }

        let child = Arc::new(Inner::new(false));
        state.children.retain(|c| c.strong_count() > 0);
        state.children.push(Arc::downgrade(&child));
        Self { inner: child }
    }

    /// Cancel this token and every token derived from it.
    ///
    /// Returns `true` if this call performed the cancellation, `false` if the
    /// token was already cancelled.
    pub fn cancel(&self) -> bool {
        self.inner.cancel()
    }

    /// Check whether this token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// A future which resolves once this token is cancelled.
    pub fn cancelled(&self) -> Cancelled {
        Cancelled {
            token: self.clone(),
            key: None,
            done: false,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Waits for a [`CancelToken`] to be cancelled.
///
/// This `struct` is created by the [`cancelled`] method on [`CancelToken`].
///
/// [`cancelled`]: CancelToken::cancelled
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Cancelled {
    token: CancelToken,
    key: Option<usize>,
    done: bool,
}

impl Future for Cancelled {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.token.is_cancelled() {
            this.done = true;
            return Poll::Ready(());
        }

        let mut state = this.token.inner.lock();
        // `cancel` sets the flag before taking the lock, so checking again
        // under the lock cannot miss a wakeup.
        if this.token.is_cancelled() {
            drop(state);
            this.done = true;
            return Poll::Ready(());
        }
        match this.key.filter(|&key| state.wakers.contains(key)) {
            Some(key) => {
                let waker = &mut state.wakers[key];
                if !waker.will_wake(cx.waker()) {
                    *waker = cx.waker().clone();
                }
            }
            None => this.key = Some(state.wakers.insert(cx.waker().clone())),
        }
        Poll::Pending
    }
}

impl Drop for Cancelled {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            // After `cancel` the slab has been drained, so the key may be gone.
            self.token.inner.lock().wakers.try_remove(key);
        }
    }
}

impl FusedFuture for Cancelled {
    fn is_terminated(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(!token.clone().is_cancelled());
    }

    #[test]
    fn cancel_is_observed_by_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn cancel_reports_first_transition_only() {
        let token = CancelToken::new();
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(!token.clone().cancel());
    }

    #[test]
    fn parent_cascades_to_grandchildren() {
        let root = CancelToken::new();
        let child = root.child_token();
        let grandchild = child.child_token();

        root.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn child_does_not_cancel_parent() {
        let root = CancelToken::new();
        let child = root.child_token();
        let sibling = root.child_token();

        child.cancel();
        assert!(!root.is_cancelled());
        assert!(!sibling.is_cancelled());
    }

    #[test]
    fn child_of_cancelled_starts_cancelled() {
        let root = CancelToken::new();
        root.cancel();
        assert!(root.child_token().is_cancelled());
    }

    #[test]
    fn dropped_children_are_pruned() {
        let root = CancelToken::new();
        for _ in 0..16 {
            drop(root.child_token());
        }
        let _live = root.child_token();
        assert_eq!(root.inner.lock().children.len(), 1);
    }

    #[test]
    fn dropped_waiters_release_their_wakers() {
        use futures_lite::future::{block_on, poll_once};

        let token = CancelToken::new();
        for _ in 0..1000 {
            let mut fut = token.cancelled();
            assert_eq!(block_on(poll_once(&mut fut)), None);
        }
        assert!(token.inner.lock().wakers.is_empty());
    }

    #[test]
    fn repolling_reuses_the_waker_entry() {
        use futures_lite::future::{block_on, poll_once};

        let token = CancelToken::new();
        let mut fut = token.cancelled();
        for _ in 0..10 {
            block_on(poll_once(&mut fut));
        }
        assert_eq!(token.inner.lock().wakers.len(), 1);
        drop(fut);
        assert!(token.inner.lock().wakers.is_empty());
    }

    #[test]
    fn cancelled_resolves_immediately_when_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        futures_lite::future::block_on(token.cancelled());
    }

    #[test]
    fn cancelled_wakes_across_threads() {
        let token = CancelToken::new();
        let remote = token.child_token();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            token.cancel();
        });

        let mut fut = remote.cancelled();
        assert!(!fut.is_terminated());
        futures_lite::future::block_on(&mut fut);
        assert!(fut.is_terminated());
        handle.join().unwrap();
    }
}
