// src/engine/pool.rs
//
// Fixed worker pool for one run.
//
// **Lifecycle**: threads are spawned once per run, before any task is queued,
// and joined before `execute` returns. No thread is spawned while work is in
// flight.
//
// **Worker loop**: Idle -> WaitingForTask (blocked in `pop`) -> Processing ->
// arrive on the barrier -> Idle ... -> Terminated when `pop` reports the
// queue closed and drained. A worker never exits holding an unprocessed task.
//
// **Shutdown** is two-phase: wait on the completion barrier (all work done),
// then close the queue (every idle worker wakes and leaves its loop), then
// join. Borrowed buffers outlive the scope, so nothing they point to can be
// freed while a worker is mid-task.
//
// **Panics**: a panicking job is caught in the worker, which aborts the
// barrier and closes the queue so neither the dispatcher's `push` nor its
// `wait` can hang on work that will never finish.

use crate::engine::barrier::CompletionBarrier;
use crate::engine::config::EngineConfig;
use crate::engine::queue::{BoundedTaskQueue, Closed};
use crate::error::{GrayPoolError, Result};
use std::any::Any;
use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What one `execute` call did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolStats {
    /// Jobs handed to the queue
    pub tasks: usize,
    /// Worker threads spawned
    pub threads: usize,
    /// Jobs completed by each worker, indexed by worker id
    pub processed_per_worker: Vec<usize>,
    pub elapsed: Duration,
}

impl PoolStats {
    pub fn processed(&self) -> usize {
        self.processed_per_worker.iter().sum()
    }
}

#[derive(Clone, Debug)]
pub struct WorkerPool {
    threads: usize,
    queue_capacity: usize,
}

impl WorkerPool {
    pub fn new(threads: usize, queue_capacity: usize) -> Result<Self> {
        EngineConfig::default()
            .with_threads(threads)
            .with_queue_capacity(queue_capacity)
            .validate()?;
        Ok(Self {
            threads,
            queue_capacity,
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            threads: config.threads,
            queue_capacity: config.queue_capacity,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Run `work(worker_id, job)` for every job on the pool's threads.
    ///
    /// Jobs are queued in order and may complete in any order. Returns once
    /// every job has finished and every worker has been joined.
    pub fn execute<T, F>(&self, jobs: Vec<T>, work: F) -> Result<PoolStats>
    where
        T: Send,
        F: Fn(usize, T) + Sync,
    {
        let started = Instant::now();
        let task_count = jobs.len();
        let queue = BoundedTaskQueue::new(self.queue_capacity)?;
        let barrier = CompletionBarrier::new(task_count);

        info!(
            threads = self.threads,
            tasks = task_count,
            queue_capacity = self.queue_capacity,
            "starting worker pool"
        );

        let processed_per_worker = thread::scope(|scope| -> Result<Vec<usize>> {
            let queue = &queue;
            let barrier = &barrier;
            let work = &work;

            let mut handles = Vec::with_capacity(self.threads);
            for id in 0..self.threads {
                let spawned = thread::Builder::new()
                    .name(format!("graypool-worker-{id}"))
                    .spawn_scoped(scope, move || worker_loop(id, queue, barrier, work));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        // Release the workers that did start; the scope joins them.
                        queue.try_close_and_drain();
                        return Err(GrayPoolError::worker_spawn_failed(id, e));
                    }
                }
            }

            for job in jobs {
                if let Err(Closed(_)) = queue.push(job) {
                    warn!("task queue closed during dispatch; remaining tasks dropped");
                    break;
                }
            }

            let completion = barrier.wait();
            let leftover = queue.try_close_and_drain();

            let mut processed = Vec::with_capacity(handles.len());
            let mut join_error = None;
            for (id, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(count) => processed.push(count),
                    Err(payload) => {
                        processed.push(0);
                        join_error.get_or_insert_with(|| {
                            GrayPoolError::worker_panicked(id, panic_message(payload.as_ref()))
                        });
                    }
                }
            }

            completion?;
            if let Some(err) = join_error {
                return Err(err);
            }
            if !leftover.is_empty() {
                return Err(GrayPoolError::internal(format!(
                    "{} tasks still queued after completion",
                    leftover.len()
                )));
            }
            Ok(processed)
        })?;

        let stats = PoolStats {
            tasks: task_count,
            threads: self.threads,
            processed_per_worker,
            elapsed: started.elapsed(),
        };
        info!(
            tasks = stats.tasks,
            elapsed_ms = stats.elapsed.as_secs_f64() * 1000.0,
            "worker pool finished"
        );
        Ok(stats)
    }
}

fn worker_loop<T, F>(
    id: usize,
    queue: &BoundedTaskQueue<T>,
    barrier: &CompletionBarrier,
    work: &F,
) -> usize
where
    F: Fn(usize, T),
{
    debug!(worker = id, "worker started");
    let mut processed = 0;
    while let Some(job) = queue.pop() {
        match panic::catch_unwind(AssertUnwindSafe(|| work(id, job))) {
            Ok(()) => {
                processed += 1;
                barrier.arrive();
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(worker = id, %message, "worker panicked while processing a task");
                barrier.abort(id, message);
                queue.try_close_and_drain();
                break;
            }
        }
    }
    debug!(worker = id, processed, "worker terminated");
    processed
}

fn panic_message(payload: &(dyn Any + Send)) -> Cow<'static, str> {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        Cow::Borrowed(s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        Cow::Owned(s.clone())
    } else {
        Cow::Borrowed("non-string panic payload")
    }
}
