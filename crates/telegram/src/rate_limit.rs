//! Token bucket shared by every outbound Bot API call.
//!
//! Tokens are reset to full capacity on each refill tick. Callers that find
//! the bucket empty, or find others already waiting, join a FIFO queue and are
//! released in arrival order as tokens come back.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use {
    tokio::{sync::oneshot, time::MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::trace,
};

/// Shortest accepted refill period; `interval` rejects a zero period.
const MIN_REFILL: Duration = Duration::from_millis(1);

struct Bucket {
    remaining: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

pub struct RateLimiter {
    bucket: Arc<Mutex<Bucket>>,
    cancel: CancellationToken,
}

impl RateLimiter {
    /// Create a full bucket and start its refill task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(capacity: usize, refill_every: Duration) -> Self {
        let capacity = capacity.max(1);
        let refill_every = refill_every.max(MIN_REFILL);
        let bucket = Arc::new(Mutex::new(Bucket {
            remaining: capacity,
            waiters: VecDeque::new(),
        }));
        let cancel = CancellationToken::new();

        let task_bucket = Arc::clone(&bucket);
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + refill_every;
            let mut ticker = tokio::time::interval_at(start, refill_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = task_cancel.cancelled() => break,
                    _ = ticker.tick() => refill(&task_bucket, capacity),
                }
            }
        });

        Self { bucket, cancel }
    }

    /// Wait for a token.
    pub async fn acquire(&self) {
        let rx = {
            let mut bucket = lock(&self.bucket);
            if bucket.waiters.is_empty() && bucket.remaining > 0 {
                bucket.remaining -= 1;
                return;
            }
            let (tx, rx) = oneshot::channel();
            bucket.waiters.push_back(tx);
            trace!(queued = bucket.waiters.len(), "rate limiter full, queueing");
            rx
        };
        // The sender is only dropped without sending when the limiter itself
        // goes away, which cannot happen while `&self` is borrowed.
        let _ = rx.await;
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        lock(&self.bucket).remaining
    }

    /// Number of callers currently waiting for a token.
    #[must_use]
    pub fn queued(&self) -> usize {
        lock(&self.bucket).waiters.len()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn lock(bucket: &Mutex<Bucket>) -> MutexGuard<'_, Bucket> {
    bucket.lock().unwrap_or_else(PoisonError::into_inner)
}

fn refill(bucket: &Mutex<Bucket>, capacity: usize) {
    let mut bucket = lock(bucket);
    bucket.remaining = capacity;
    while bucket.remaining > 0 {
        let Some(waiter) = bucket.waiters.pop_front() else {
            break;
        };
        // A waiter whose caller gave up does not consume a token.
        if waiter.send(()).is_ok() {
            bucket.remaining -= 1;
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        tokio::{sync::mpsc, time::Instant},
    };

    async fn wait_for_queue(limiter: &RateLimiter, len: usize) {
        while limiter.queued() < len {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_refill_period_still_refills() {
        let limiter = RateLimiter::new(1, Duration::ZERO);
        limiter.acquire().await;
        tokio::time::timeout(Duration::from_secs(1), limiter.acquire())
            .await
            .expect("second acquire should be released by the refill task");
    }

    #[tokio::test(start_paused = true)]
    async fn acquires_up_to_capacity_without_waiting() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn excess_acquisitions_wait_for_refill() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(1)));
        let start = Instant::now();
        let (tx, mut rx) = mpsc::unbounded_channel();

        for i in 0..3 {
            let limiter = Arc::clone(&limiter);
            let tx = tx.clone();
            tokio::spawn(async move {
                limiter.acquire().await;
                let _ = tx.send((i, start.elapsed()));
            });
        }
        drop(tx);

        let mut done = Vec::new();
        while let Some(item) = rx.recv().await {
            done.push(item);
        }
        assert_eq!(done.len(), 3);
        assert!(done[0].1 < Duration::from_secs(1));
        assert!(done[1].1 < Duration::from_secs(1));
        assert!(done[2].1 >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_are_served_in_arrival_order() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_millis(100)));
        limiter.acquire().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        for i in 1..=4 {
            let l = Arc::clone(&limiter);
            let tx = tx.clone();
            tokio::spawn(async move {
                l.acquire().await;
                let _ = tx.send(i);
            });
            wait_for_queue(&limiter, i).await;
        }
        drop(tx);

        let mut order = Vec::new();
        while let Some(i) = rx.recv().await {
            order.push(i);
        }
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn new_callers_do_not_jump_the_queue() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(1)));
        limiter.acquire().await;
        limiter.acquire().await;

        let l = Arc::clone(&limiter);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let first_tx = tx.clone();
        tokio::spawn(async move {
            l.acquire().await;
            let _ = first_tx.send("queued-first");
        });
        wait_for_queue(&limiter, 1).await;

        // After the refill exactly one token is left over; the queued caller
        // got the other one before this late caller.
        tokio::time::sleep(Duration::from_millis(1001)).await;
        limiter.acquire().await;
        let _ = tx.send("late");
        drop(tx);

        assert_eq!(rx.recv().await, Some("queued-first"));
        assert_eq!(rx.recv().await, Some("late"));
        assert_eq!(limiter.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_waiter_does_not_consume_a_token() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1));
        limiter.acquire().await;

        let timed_out =
            tokio::time::timeout(Duration::from_millis(100), limiter.acquire()).await;
        assert!(timed_out.is_err());
        assert_eq!(limiter.queued(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(limiter.queued(), 0);
        assert_eq!(limiter.remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refill_resets_to_capacity_not_beyond() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(limiter.remaining(), 2);
    }
}
