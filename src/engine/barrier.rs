// src/engine/barrier.rs
//
// One-shot completion barrier: a down-counter that wakes the dispatcher once
// every task has reported in.

use crate::error::{GrayPoolError, Result};
use parking_lot::{Condvar, Mutex};
use std::borrow::Cow;
use tracing::warn;

#[derive(Debug)]
struct State {
    remaining: usize,
    fired: bool,
    aborted: Option<(usize, Cow<'static, str>)>,
}

/// Counts task completions down to zero and fires exactly once.
///
/// Decrement-and-test happens under the lock, so exactly one `arrive()` sees
/// the transition to zero no matter how arrivals interleave.
#[derive(Debug)]
pub struct CompletionBarrier {
    state: Mutex<State>,
    cvar: Condvar,
}

impl CompletionBarrier {
    /// A barrier expecting `count` arrivals. With `count == 0` it is born fired.
    pub fn new(count: usize) -> Self {
        Self {
            state: Mutex::new(State {
                remaining: count,
                fired: count == 0,
                aborted: None,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Report one finished task. Returns `true` for the arrival that fired the
    /// barrier and `false` for every other one.
    pub fn arrive(&self) -> bool {
        let mut state = self.state.lock();
        if state.remaining == 0 {
            warn!("completion barrier: arrival after all tasks were counted");
            return false;
        }
        state.remaining -= 1;
        if state.remaining == 0 && !state.fired {
            state.fired = true;
            drop(state);
            self.cvar.notify_all();
            return true;
        }
        false
    }

    /// Release the waiter without completing, reporting a worker failure.
    /// Only the first abort is kept.
    pub fn abort(&self, worker: usize, message: impl Into<Cow<'static, str>>) {
        let mut state = self.state.lock();
        if state.aborted.is_none() {
            state.aborted = Some((worker, message.into()));
        }
        drop(state);
        self.cvar.notify_all();
    }

    /// Block until the last arrival, or until a worker aborted the run.
    pub fn wait(&self) -> Result<()> {
        let mut state = self.state.lock();
        loop {
            if let Some((worker, message)) = &state.aborted {
                return Err(GrayPoolError::worker_panicked(*worker, message.clone()));
            }
            if state.fired {
                return Ok(());
            }
            self.cvar.wait(&mut state);
        }
    }

    pub fn remaining(&self) -> usize {
        self.state.lock().remaining
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_zero_count_is_already_complete() {
        let barrier = CompletionBarrier::new(0);
        assert!(barrier.is_complete());
        barrier.wait().unwrap();
        assert!(!barrier.arrive());
    }

    #[test]
    fn test_fires_on_last_arrival_only() {
        let barrier = CompletionBarrier::new(3);
        assert!(!barrier.arrive());
        assert!(!barrier.arrive());
        assert_eq!(barrier.remaining(), 1);
        assert!(!barrier.is_complete());
        assert!(barrier.arrive());
        assert!(barrier.is_complete());
        // extra arrivals never re-fire
        assert!(!barrier.arrive());
        assert_eq!(barrier.remaining(), 0);
    }

    #[test]
    fn test_concurrent_arrivals_fire_exactly_once() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;
        let barrier = Arc::new(CompletionBarrier::new(THREADS * PER_THREAD));
        let fired = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let fired = Arc::clone(&fired);
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        if barrier.arrive() {
                            fired.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        barrier.wait().unwrap();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wait_blocks_until_last_arrival() {
        let barrier = Arc::new(CompletionBarrier::new(1));
        let (tx, rx) = mpsc::channel();
        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait().unwrap();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        barrier.arrive();
        rx.recv_timeout(Duration::from_secs(1))
            .expect("waiter should wake after the last arrival");
        waiter.join().unwrap();
    }

    #[test]
    fn test_abort_releases_waiter_with_error() {
        let barrier = Arc::new(CompletionBarrier::new(2));
        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait())
        };
        thread::sleep(Duration::from_millis(20));
        barrier.abort(3, "boom");
        barrier.abort(1, "second abort is ignored");
        let err = waiter.join().unwrap().unwrap_err();
        match err {
            GrayPoolError::WorkerPanicked { worker, message } => {
                assert_eq!(worker, 3);
                assert_eq!(message, "boom");
            }
            other => panic!("expected WorkerPanicked, got {other:?}"),
        }
    }
}
