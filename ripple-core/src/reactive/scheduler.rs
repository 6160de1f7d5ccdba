//! Batch Scheduler
//!
//! A minimal [`Scheduler`] for hosts that do not bring their own. Deferred
//! Computations are queued, deduplicated by id, and run when the host calls
//! [`BatchScheduler::flush`].
//!
//! # Algorithm
//!
//! 1. `enqueue` ignores Computations that are already waiting or torn down,
//!    and drops queued entries that were torn down since.
//! 2. `flush` drains the queue and runs it in ascending id order, so
//!    Computations created first run first.
//! 3. A Computation is removed from the waiting set right before it runs. If
//!    running it notifies a Computation again, that one is queued for the
//!    next round of the same flush.
//! 4. After `MAX_ROUNDS` rounds the flush gives up with a warning: some
//!    Computation keeps invalidating itself.

use std::collections::HashSet;

use parking_lot::Mutex;

use super::runtime::Scheduler;
use super::subscriber::SubscriberId;
use super::Computation;
use crate::error::Result;

/// Upper bound on flush rounds before a cycle is assumed.
pub const MAX_ROUNDS: usize = 100;

#[derive(Default)]
struct Queue {
    waiting: HashSet<SubscriberId>,
    pending: Vec<Computation>,
}

/// Deduplicating queue of deferred Computations.
#[derive(Default)]
pub struct BatchScheduler {
    queue: Mutex<Queue>,
    /// Set for the per-thread default, which no host flushes.
    unattended: bool,
}

impl BatchScheduler {
    /// Create an empty scheduler. The host is expected to call `flush`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The per-thread default installed before any host scheduler.
    pub(crate) fn unattended() -> Self {
        Self {
            queue: Mutex::default(),
            unattended: true,
        }
    }

    /// Number of Computations waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.lock().pending.len()
    }

    /// Whether `computation` is waiting for the next flush.
    pub fn is_queued(&self, computation: &Computation) -> bool {
        self.queue.lock().waiting.contains(&computation.id())
    }

    /// Run everything queued, including Computations queued while flushing.
    ///
    /// Returns the number of runs performed. An error from an internal
    /// Computation aborts the flush; what is still queued stays queued.
    pub fn flush(&self) -> Result<usize> {
        let mut runs = 0;
        for _ in 0..MAX_ROUNDS {
            let mut batch = std::mem::take(&mut self.queue.lock().pending);
            if batch.is_empty() {
                return Ok(runs);
            }
            batch.retain(|computation| {
                let live = computation.is_active();
                if !live {
                    self.queue.lock().waiting.remove(&computation.id());
                }
                live
            });
            batch.sort_by_key(|c| c.id());

            for (index, computation) in batch.iter().enumerate() {
                self.queue.lock().waiting.remove(&computation.id());
                if let Err(err) = computation.run() {
                    self.requeue(&batch[index + 1..]);
                    return Err(err);
                }
                runs += 1;
            }
        }

        tracing::warn!(
            rounds = MAX_ROUNDS,
            pending = self.pending(),
            "possible infinite update loop, giving up on flush"
        );
        Ok(runs)
    }

    fn requeue(&self, rest: &[Computation]) {
        let mut queue = self.queue.lock();
        queue.pending.splice(0..0, rest.iter().cloned());
    }
}

impl Scheduler for BatchScheduler {
    fn enqueue(&self, computation: Computation) {
        if !computation.is_active() {
            return;
        }
        let mut queue = self.queue.lock();
        // Drop torn-down entries so the queue never keeps them alive.
        let Queue { waiting, pending } = &mut *queue;
        pending.retain(|queued| {
            let keep = queued.is_active();
            if !keep {
                waiting.remove(&queued.id());
            }
            keep
        });
        if !waiting.insert(computation.id()) {
            return;
        }
        if self.unattended {
            tracing::debug!(
                computation = %computation.id(),
                pending = pending.len() + 1,
                "deferred computation queued on the default scheduler, install and flush a scheduler to run it"
            );
        }
        pending.push(computation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Owner, WatchOptions, WatchSource};
    use crate::value::Value;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    fn counter(owner: &Owner, runs: Arc<AtomicI32>) -> Computation {
        Computation::new(
            owner,
            WatchSource::getter(move |_| {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Undefined)
            }),
            None,
            WatchOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn enqueue_deduplicates() {
        let scheduler = BatchScheduler::new();
        let owner = Owner::detached("scheduler-test");
        let runs = Arc::new(AtomicI32::new(0));
        let computation = counter(&owner, runs.clone());

        scheduler.enqueue(computation.clone());
        scheduler.enqueue(computation.clone());
        assert_eq!(scheduler.pending(), 1);
        assert!(scheduler.is_queued(&computation));

        assert_eq!(scheduler.flush().unwrap(), 1);
        // Once on creation, once on flush.
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!scheduler.is_queued(&computation));
    }

    #[test]
    fn flush_runs_in_id_order() {
        let scheduler = BatchScheduler::new();
        let owner = Owner::detached("scheduler-test");
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let make = |tag: i32| {
            let order = order.clone();
            Computation::new(
                &owner,
                WatchSource::getter(move |_| {
                    order.lock().push(tag);
                    Ok(Value::Undefined)
                }),
                None,
                WatchOptions::default(),
            )
            .unwrap()
        };
        let first = make(1);
        let second = make(2);
        order.lock().clear();

        scheduler.enqueue(second);
        scheduler.enqueue(first);
        scheduler.flush().unwrap();

        assert_eq!(order.lock().as_slice(), [1, 2]);
    }

    #[test]
    fn torn_down_computations_are_released() {
        let scheduler = BatchScheduler::unattended();
        let owner = Owner::detached("scheduler-test");
        let first = counter(&owner, Arc::new(AtomicI32::new(0)));
        let second = counter(&owner, Arc::new(AtomicI32::new(0)));

        scheduler.enqueue(first.clone());
        assert_eq!(scheduler.pending(), 1);

        first.teardown();
        scheduler.enqueue(first.clone());
        scheduler.enqueue(second.clone());
        assert_eq!(scheduler.pending(), 1);
        assert!(!scheduler.is_queued(&first));
        assert!(scheduler.is_queued(&second));

        second.teardown();
        scheduler.enqueue(counter(&owner, Arc::new(AtomicI32::new(0))));
        assert!(!scheduler.is_queued(&second));
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn torn_down_computations_do_not_run() {
        let scheduler = BatchScheduler::new();
        let owner = Owner::detached("scheduler-test");
        let runs = Arc::new(AtomicI32::new(0));
        let computation = counter(&owner, runs.clone());

        scheduler.enqueue(computation.clone());
        computation.teardown();
        scheduler.flush().unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
