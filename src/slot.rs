//! Single-delivery slot.
//!
//! Any number of threads may call [`Slot::deliver`]; exactly one of them
//! stores its value. The rest are no-ops. The receiving side polls.

use core::task::{Context, Poll, Waker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) struct Slot<T> {
    claimed: AtomicBool,
    state: Mutex<State<T>>,
}

struct State<T> {
    value: Option<T>,
    waker: Option<Waker>,
}

impl<T> Slot<T> {
    pub(crate) fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
            state: Mutex::new(State {
                value: None,
                waker: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether some caller already won the slot.
    pub(crate) fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Try to deliver `value`. Returns `true` if this call won.
    pub(crate) fn deliver(&self, value: T) -> bool {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let waker = {
            let mut state = self.lock();
            state.value = Some(value);
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    /// Take the delivered value, or register `cx` to be woken when it lands.
    pub(crate) fn poll_take(&self, cx: &mut Context<'_>) -> Poll<T> {
        let mut state = self.lock();
        match state.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                match &mut state.waker {
                    Some(waker) if waker.will_wake(cx.waker()) => {}
                    waker => *waker = Some(cx.waker().clone()),
                }
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn take<T>(slot: &Slot<T>) -> T {
        futures_lite::future::block_on(futures_lite::future::poll_fn(|cx| slot.poll_take(cx)))
    }

    #[test]
    fn first_delivery_wins() {
        let slot = Slot::new();
        assert!(!slot.is_claimed());
        assert!(slot.deliver("first"));
        assert!(!slot.deliver("second"));
        assert!(slot.is_claimed());
        assert_eq!(take(&slot), "first");
    }

    #[test]
    fn wakes_waiting_receiver() {
        let slot = Arc::new(Slot::new());
        let sender = slot.clone();
        let handle = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(20));
            sender.deliver(7u32);
        });
        assert_eq!(take(&slot), 7);
        handle.join().unwrap();
    }

    #[test]
    fn exactly_one_winner_under_contention() {
        const THREADS: usize = 32;

        for _ in 0..50 {
            let slot = Arc::new(Slot::new());
            let barrier = Arc::new(Barrier::new(THREADS));
            let winners = Arc::new(AtomicUsize::new(0));

            let handles: Vec<_> = (0..THREADS)
                .map(|i| {
                    let slot = slot.clone();
                    let barrier = barrier.clone();
                    let winners = winners.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        if slot.deliver((i, i * 10)) {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(winners.load(Ordering::SeqCst), 1);
            let (i, tenfold) = take(&slot);
            assert_eq!(tenfold, i * 10);
        }
    }
}
