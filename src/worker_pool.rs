//! # WorkerPool — Fixed-Thread Chunk Dispatch
//!
//! A fixed number of worker threads (one per core by default) pulling chunks
//! of primes (spec §4.6 — "no suspension points, no async, no coroutines" —
//! each chunk still runs to completion on its thread with no yielding mid
//! chunk). Chunks are *handed out* in strict prime-ascending order but may
//! *complete* out of order; the pool tracks each worker's own watermark and
//! publishes the minimum across all of them as "largest prime tested with no
//! gaps" (spec §4.6, §4.8).
//!
//! Two entry points: [`WorkerPool::run_chunk`] dispatches and blocks on a
//! single chunk, for callers happy with one chunk outstanding at a time.
//! [`WorkerPool::scope`] hands out a [`Dispatcher`] that can have several
//! chunks in flight across the pool's threads at once, via `spawn`/`recv` —
//! this is what makes the pool genuinely concurrent rather than a sequential
//! loop wearing a `ThreadPool` (spec §4.6/§4.8). `Driver` currently drives
//! the pool through `run_chunk` one chunk at a time; see `driver.rs`'s own
//! doc comment for why.
//!
//! Grounded in the teacher's rayon usage (`carol_kynea::sieve_carol_kynea`,
//! `factorial`'s `rayon::join`): this module generalizes that pattern from
//! ad hoc `par_iter`/`join` calls into a reusable pool with watermark
//! tracking and a shared interrupt flag, since the spec's driver needs both
//! across every family rather than once per call site. `scope`/`Dispatcher`
//! is grounded the same way rayon's own `Scope` is built: a channel back to
//! the spawning side instead of rayon's join-style return value, since here
//! the spawning side wants to keep dispatching while results trickle in.

use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// How a chunk finished: the worker that ran it, its last prime (for the
/// watermark), and whatever `process` returned.
pub struct ChunkDone<T> {
    pub worker: usize,
    pub last_prime: u64,
    pub value: T,
}

/// Shared cancellation flag. Workers poll it at chunk boundaries and, inside
/// long inner loops, at a coarse throttle (spec §4.6: "once per ~60 seconds").
#[derive(Default)]
pub struct InterruptFlag(AtomicBool);

impl InterruptFlag {
    pub fn new() -> Self {
        InterruptFlag(AtomicBool::new(false))
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Per-worker "largest prime fully tested" watermark, written only by its
/// owning worker and read by the driver under the pool's watermark mutex
/// (spec §5: "`LargestTested` per worker: written only by its owner, read
/// by the driver under a tiny mutex for the min-reduction").
struct Watermarks {
    per_worker: Mutex<Vec<u64>>,
}

impl Watermarks {
    fn new(worker_count: usize, floor: u64) -> Self {
        Watermarks {
            per_worker: Mutex::new(vec![floor; worker_count]),
        }
    }

    fn report(&self, worker: usize, largest_prime_in_chunk: u64) {
        let mut wm = self.per_worker.lock().unwrap();
        // A worker's own watermark only advances; chunks complete
        // out-of-order but one worker's own chunks are still handed to it
        // in ascending order (spec §4.6).
        if largest_prime_in_chunk > wm[worker] {
            wm[worker] = largest_prime_in_chunk;
        }
    }

    fn min_watermark(&self) -> u64 {
        *self.per_worker.lock().unwrap().iter().min().unwrap_or(&0)
    }
}

pub struct WorkerPool {
    pool: ThreadPool,
    worker_count: usize,
    watermarks: Watermarks,
    interrupt: InterruptFlag,
    chunks_completed: AtomicU64,
}

impl WorkerPool {
    pub fn new(worker_count: usize, floor: u64) -> Self {
        let worker_count = worker_count.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .build()
            .expect("failed to build worker thread pool");
        WorkerPool {
            pool,
            worker_count,
            watermarks: Watermarks::new(worker_count, floor),
            interrupt: InterruptFlag::new(),
            chunks_completed: AtomicU64::new(0),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn interrupt(&self) -> &InterruptFlag {
        &self.interrupt
    }

    /// Dispatch `chunk` (an ascending slice of primes assigned to `worker`)
    /// through `process` on the pool, then advance that worker's watermark
    /// to the chunk's last prime. Blocks the caller until `process`
    /// returns — a simple synchronous entry point for callers (and tests)
    /// that only ever have one chunk outstanding at a time. `Driver` uses
    /// [`WorkerPool::scope`] instead, to keep several chunks in flight at
    /// once (spec §4.6).
    pub fn run_chunk<F>(&self, worker: usize, chunk: &[u64], process: F)
    where
        F: FnOnce(&[u64]) + Send,
    {
        if chunk.is_empty() {
            return;
        }
        let last = *chunk.last().unwrap();
        self.pool.install(|| {
            process(chunk);
        });
        self.watermarks.report(worker, last);
        self.chunks_completed.fetch_add(1, Ordering::Relaxed);
        debug!(worker, last_prime = last, "chunk completed");
    }

    /// "Largest prime tested with no gaps": the minimum watermark across
    /// all workers (spec §4.6).
    pub fn largest_tested_no_gaps(&self) -> u64 {
        self.watermarks.min_watermark()
    }

    pub fn chunks_completed(&self) -> u64 {
        self.chunks_completed.load(Ordering::Relaxed)
    }

    /// Run `body` with a [`Dispatcher`] bound to this pool's threads. Chunks
    /// spawned through the dispatcher run concurrently with each other and
    /// with the caller (spec §4.6: genuinely concurrent, non-blocking chunk
    /// assignment across a fixed worker pool) — `body` drains completions at
    /// its own pace via `Dispatcher::recv`/`try_recv`, and any chunk still
    /// in flight when `body` returns is awaited before `scope` itself
    /// returns, matching rayon's own scope teardown.
    pub fn scope<F, R, T>(&self, body: F) -> R
    where
        F: for<'b, 'scope> FnOnce(&Dispatcher<'b, 'scope, T>) -> R,
        T: Send,
        R: Send,
    {
        self.pool.scope(|s| {
            let (tx, rx) = std::sync::mpsc::channel();
            let dispatcher = Dispatcher {
                scope: s,
                watermarks: &self.watermarks,
                chunks_completed: &self.chunks_completed,
                tx,
                rx,
            };
            body(&dispatcher)
        })
    }
}

/// Spawns chunks onto a [`WorkerPool`]'s threads without blocking the
/// spawning side; completions (in whatever order they finish, per spec
/// §4.6) arrive through `recv`/`try_recv`. `'scope` bounds how long spawned
/// closures may borrow for; `'b` is just this handle's own borrow of the
/// rayon scope, same two-lifetime shape rayon's own `Scope` uses.
pub struct Dispatcher<'b, 'scope: 'b, T> {
    scope: &'b rayon::Scope<'scope>,
    watermarks: &'b Watermarks,
    chunks_completed: &'b AtomicU64,
    tx: std::sync::mpsc::Sender<ChunkDone<T>>,
    rx: std::sync::mpsc::Receiver<ChunkDone<T>>,
}

impl<'b, 'scope: 'b, T: Send> Dispatcher<'b, 'scope, T> {
    /// Hand `chunk` (ascending primes assigned to `worker`) to the pool.
    /// Returns immediately; `process` runs on a pool thread whenever one is
    /// free, and its result reaches `recv`/`try_recv` once it finishes —
    /// this is what makes dispatch non-blocking rather than the old
    /// one-chunk-at-a-time `run_chunk`.
    pub fn spawn<F>(&self, worker: usize, chunk: Vec<u64>, process: F)
    where
        F: FnOnce(&[u64]) -> T + Send + 'scope,
    {
        if chunk.is_empty() {
            return;
        }
        let last = *chunk.last().unwrap();
        let tx = self.tx.clone();
        self.scope.spawn(move |_| {
            let value = process(&chunk);
            let _ = tx.send(ChunkDone {
                worker,
                last_prime: last,
                value,
            });
        });
    }

    /// Block until the next spawned chunk completes, updating its worker's
    /// watermark and the completed-chunk counter before returning it.
    pub fn recv(&self) -> Option<ChunkDone<T>> {
        let done = self.rx.recv().ok()?;
        self.watermarks.report(done.worker, done.last_prime);
        self.chunks_completed.fetch_add(1, Ordering::Relaxed);
        debug!(worker = done.worker, last_prime = done.last_prime, "chunk completed");
        Some(done)
    }

    /// Non-blocking `recv`: `None` if no spawned chunk has finished yet.
    pub fn try_recv(&self) -> Option<ChunkDone<T>> {
        let done = self.rx.try_recv().ok()?;
        self.watermarks.report(done.worker, done.last_prime);
        self.chunks_completed.fetch_add(1, Ordering::Relaxed);
        debug!(worker = done.worker, last_prime = done.last_prime, "chunk completed");
        Some(done)
    }
}
