//! Tallies shared by every worker of one run.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::watch;

/// Processed/error tallies plus the one-shot start barrier.
///
/// A fresh instance is created by every `start()` and handed to each worker
/// through an `Arc`. The two tallies are independent: a reader may see one
/// of them one step ahead of the other.
#[derive(Debug)]
pub struct SharedCounters {
    total_count: usize,
    processed: AtomicUsize,
    errors: AtomicUsize,
    started: AtomicBool,
    start_gate: watch::Sender<bool>,
}

impl SharedCounters {
    pub fn new(total_count: usize) -> Self {
        let (start_gate, _) = watch::channel(false);
        Self {
            total_count,
            processed: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            started: AtomicBool::new(false),
            start_gate,
        }
    }

    /// Counts one more finished (done or failed) item and returns the new tally.
    pub fn increment_processed(&self) -> usize {
        self.processed.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Counts one more failed item and returns the new tally.
    pub fn increment_errors(&self) -> usize {
        self.errors.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Flips the start barrier.
    ///
    /// Returns true only for the single caller that performed the
    /// false -> true transition; that caller also opens the start gate.
    pub fn try_set_started(&self) -> bool {
        let won = self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if won {
            self.start_gate.send_replace(true);
        }
        won
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Returns a signal that resolves once the barrier has been flipped.
    pub fn start_signal(&self) -> StartSignal {
        StartSignal {
            rx: self.start_gate.subscribe(),
        }
    }
}

/// Waits for the first worker of a run to begin.
#[derive(Debug)]
pub struct StartSignal {
    rx: watch::Receiver<bool>,
}

impl StartSignal {
    pub async fn wait(mut self) {
        // The sender lives as long as the counters; if they are gone there is
        // nothing left to wait for.
        let _ = self.rx.wait_for(|started| *started).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_increments_return_new_value() {
        let counters = SharedCounters::new(3);
        assert_eq!(counters.increment_processed(), 1);
        assert_eq!(counters.increment_processed(), 2);
        assert_eq!(counters.increment_errors(), 1);
        assert_eq!(counters.processed(), 2);
        assert_eq!(counters.errors(), 1);
        assert_eq!(counters.total_count(), 3);
    }

    #[test]
    fn test_try_set_started_only_once() {
        let counters = SharedCounters::new(1);
        assert!(!counters.is_started());
        assert!(counters.try_set_started());
        assert!(!counters.try_set_started());
        assert!(!counters.try_set_started());
        assert!(counters.is_started());
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let counters = Arc::new(SharedCounters::new(8000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = Arc::clone(&counters);
                std::thread::spawn(move || {
                    let mut seen = Vec::with_capacity(1000);
                    for _ in 0..1000 {
                        seen.push(counters.increment_processed());
                    }
                    seen
                })
            })
            .collect();

        let mut all: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();

        assert_eq!(counters.processed(), 8000);
        // Every caller observed a distinct post-increment value
        assert_eq!(all.len(), 8000);
    }

    #[test]
    fn test_single_winner_under_contention() {
        let counters = Arc::new(SharedCounters::new(1));
        let winners: usize = (0..16)
            .map(|_| {
                let counters = Arc::clone(&counters);
                std::thread::spawn(move || counters.try_set_started())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_start_signal_resolves_after_flip() {
        let counters = Arc::new(SharedCounters::new(1));
        let signal = counters.start_signal();

        let flipper = Arc::clone(&counters);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flipper.try_set_started();
        });

        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("start signal should resolve");
    }

    #[tokio::test]
    async fn test_start_signal_already_open() {
        let counters = SharedCounters::new(1);
        counters.try_set_started();
        tokio::time::timeout(Duration::from_millis(100), counters.start_signal().wait())
            .await
            .expect("already-open gate should resolve immediately");
    }
}
