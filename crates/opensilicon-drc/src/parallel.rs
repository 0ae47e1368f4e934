//! Worker pool for data-parallel sweeps over large item sets.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::error::DrcError;
use crate::progress::CancellationToken;

/// Chunks handed out per worker thread, to even out uneven work.
const CHUNKS_PER_THREAD: usize = 4;

static SHARED_POOL: OnceLock<Arc<WorkerPool>> = OnceLock::new();

pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.thread_count())
            .finish()
    }
}

impl WorkerPool {
    /// Build a pool with `threads` workers, or one per CPU when `None`.
    pub fn new(threads: Option<usize>) -> Result<Self, DrcError> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("drc-worker-{i}"));
        if let Some(n) = threads {
            builder = builder.num_threads(n.max(1));
        }
        let pool = builder.build()?;
        log::debug!("DRC worker pool started with {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    /// The process-wide pool, built on first use.
    pub fn shared() -> Result<Arc<WorkerPool>, DrcError> {
        if let Some(pool) = SHARED_POOL.get() {
            return Ok(Arc::clone(pool));
        }
        let pool = Arc::new(WorkerPool::new(None)?);
        Ok(Arc::clone(SHARED_POOL.get_or_init(|| pool)))
    }

    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `work(i)` for every `i` in `0..count` on the pool.
    ///
    /// The calling thread waits for chunk completions, waking at least every
    /// `poll` to call `on_poll(done, count)`. If `on_poll` returns false the
    /// token is cancelled. Once the token is cancelled no new indices start;
    /// chunks already running finish their current index before returning.
    ///
    /// Returns how many indices were processed.
    pub fn for_each_index<F, P>(
        &self,
        count: usize,
        cancel: &CancellationToken,
        poll: Duration,
        mut on_poll: P,
        work: F,
    ) -> usize
    where
        F: Fn(usize) + Sync,
        P: FnMut(usize, usize) -> bool,
    {
        if count == 0 || cancel.is_cancelled() {
            return 0;
        }
        let chunk_size = count.div_ceil(self.thread_count() * CHUNKS_PER_THREAD).max(1);
        let chunks = count.div_ceil(chunk_size);
        let done = AtomicUsize::new(0);

        self.pool.in_place_scope(|scope| {
            let (tx, rx) = mpsc::channel::<()>();
            for chunk in 0..chunks {
                let tx = tx.clone();
                let (work, done) = (&work, &done);
                scope.spawn(move |_| {
                    let start = chunk * chunk_size;
                    for i in start..(start + chunk_size).min(count) {
                        if cancel.is_cancelled() {
                            break;
                        }
                        work(i);
                        done.fetch_add(1, Ordering::Relaxed);
                    }
                    let _ = tx.send(());
                });
            }
            drop(tx);

            let mut finished = 0;
            while finished < chunks {
                match rx.recv_timeout(poll) {
                    Ok(()) => finished += 1,
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
                if !cancel.is_cancelled() && !on_poll(done.load(Ordering::Relaxed), count) {
                    cancel.cancel();
                }
            }
        });

        done.into_inner()
    }
}
