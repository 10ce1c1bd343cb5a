//! Serial Execution Queue
//!
//! One shared lane for all upstream generative calls. However many
//! orchestrators submit concurrently, tasks run strictly in submission
//! order, one at a time, with a cooldown between the end of one task and
//! the start of the next to smooth bursts against the upstream rate limit.
//!
//! The busy flag is the sole mutual-exclusion primitive: set before a task
//! starts, cleared only in the runner's completion path (success or
//! failure), so the lane can never deadlock on a failed task. The lane
//! stays closed through the cooldown, so a task submitted mid-cooldown
//! cannot jump the idle gap.
//!
//! There is no cancellation: a caller may drop the returned future, but a
//! submitted task still runs and still occupies the lane.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use pulse_core::{PulseError, PulseResult};

/// Idle gap between the end of one upstream call and the start of the next
pub const QUEUE_COOLDOWN_MS: u64 = 2000;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct QueueState {
    busy: bool,
    tasks: VecDeque<Job>,
}

/// Single-lane FIFO executor with an inter-task cooldown
pub struct SerialQueue {
    state: Mutex<QueueState>,
    cooldown: Duration,
}

impl SerialQueue {
    /// Create a queue with the production cooldown
    pub fn new() -> Arc<Self> {
        Self::with_cooldown(Duration::from_millis(QUEUE_COOLDOWN_MS))
    }

    /// Create a queue with a custom cooldown
    pub fn with_cooldown(cooldown: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState {
                busy: false,
                tasks: VecDeque::new(),
            }),
            cooldown,
        })
    }

    /// Append a task to the tail of the lane
    ///
    /// Enqueueing happens synchronously at call time, so submission order
    /// is the call order. The returned future resolves with the task's
    /// result once the lane reaches it.
    pub fn submit<T, F, Fut>(
        self: &Arc<Self>,
        task: F,
    ) -> impl Future<Output = PulseResult<T>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = PulseResult<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let job: Job = Box::pin(async move {
            let result = task().await;
            // Receiver may have been dropped; the task ran regardless.
            let _ = tx.send(result);
        });

        {
            let mut state = self.state.lock();
            state.tasks.push_back(job);
            debug!("Task queued, {} pending", state.tasks.len());
        }
        self.pump();

        async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(PulseError::internal(
                    "queued task dropped without completing",
                )),
            }
        }
    }

    /// Number of tasks waiting behind the one in flight
    pub fn pending(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// If the lane is idle and work is waiting, start the head task
    fn pump(self: &Arc<Self>) {
        let job = {
            let mut state = self.state.lock();
            if state.busy {
                return;
            }
            let Some(job) = state.tasks.pop_front() else {
                return;
            };
            state.busy = true;
            job
        };

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            job.await;
            tokio::time::sleep(queue.cooldown).await;
            queue.state.lock().busy = false;
            queue.pump();
        });
    }
}
