//! Fixed-size fork/join scheduling.
//!
//! A dispatch splits an index range into contiguous, word-aligned chunks, runs
//! one chunk per thread, and joins every thread before returning. A failing or
//! panicking callback never cancels sibling threads; failures are collected and
//! reported once the whole dispatch has finished.
//!
//! With the `parallel` feature every [`ThreadGroup`] owns a rayon pool built
//! once at construction, so a thread that cannot be started fails the setup
//! rather than a running epoch. Without it each dispatch spawns scoped threads.

use core::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use super::atomic::{AtomicBitset, WORD_BITS};
use crate::error::{Error, ProgramError, Result};
use crate::graph::WorkerId;

/// A fixed set of named threads that runs one task per item and joins.
pub struct ThreadGroup {
    name: String,
    threads: usize,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl ThreadGroup {
    /// Creates a group of `threads` threads named `{name}-{index}`.
    ///
    /// # Errors
    /// [`Error::ResourceExhaustion`] if the threads cannot be started.
    ///
    /// # Panics
    /// Panics if `threads == 0`.
    pub fn new(name: impl Into<String>, threads: usize) -> Result<Self> {
        assert!(threads != 0, "threads must be > 0");
        let name = name.into();
        #[cfg(feature = "parallel")]
        let pool = if threads > 1 {
            let prefix = name.clone();
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(move |i| format!("{prefix}-{i}"))
                .build()
                .map_err(|err| {
                    Error::ResourceExhaustion(format!("{name}: failed to start threads: {err}"))
                })?;
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            name,
            threads,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    /// Number of threads.
    #[inline]
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Returns `true` if the threads outlive a single dispatch.
    #[inline]
    pub fn is_persistent(&self) -> bool {
        #[cfg(feature = "parallel")]
        {
            self.pool.is_some()
        }
        #[cfg(not(feature = "parallel"))]
        {
            false
        }
    }

    /// Runs `task(index, item)` for every item and returns results in item order.
    ///
    /// A single item runs inline on the caller. `task` is expected to catch
    /// its own panics; an escaping panic is resumed on the caller.
    ///
    /// # Errors
    /// [`Error::ResourceExhaustion`] if a per-dispatch thread cannot be spawned.
    pub fn for_each_mut<I, R, G>(&self, items: &mut [I], task: G) -> Result<Vec<R>>
    where
        I: Send,
        R: Send,
        G: Fn(usize, &mut I) -> R + Sync,
    {
        match items {
            [] => Ok(Vec::new()),
            [only] => Ok(vec![task(0, only)]),
            _ => self.dispatch(items, &task),
        }
    }

    #[cfg(feature = "parallel")]
    fn dispatch<I, R, G>(&self, items: &mut [I], task: &G) -> Result<Vec<R>>
    where
        I: Send,
        R: Send,
        G: Fn(usize, &mut I) -> R + Sync,
    {
        use rayon::prelude::*;

        match &self.pool {
            Some(pool) => Ok(pool.install(|| {
                items
                    .par_iter_mut()
                    .enumerate()
                    .with_max_len(1)
                    .map(|(i, item)| task(i, item))
                    .collect()
            })),
            None => self.spawn_scoped(items, task),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn dispatch<I, R, G>(&self, items: &mut [I], task: &G) -> Result<Vec<R>>
    where
        I: Send,
        R: Send,
        G: Fn(usize, &mut I) -> R + Sync,
    {
        self.spawn_scoped(items, task)
    }

    fn spawn_scoped<I, R, G>(&self, items: &mut [I], task: &G) -> Result<Vec<R>>
    where
        I: Send,
        R: Send,
        G: Fn(usize, &mut I) -> R + Sync,
    {
        let mut spawn_error = None;
        let results = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(items.len());
            for (i, item) in items.iter_mut().enumerate() {
                let spawned = thread::Builder::new()
                    .name(format!("{}-{i}", self.name))
                    .spawn_scoped(scope, move || task(i, item));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        spawn_error.get_or_insert(err);
                        break;
                    }
                }
            }
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
                .collect::<Vec<R>>()
        });

        if let Some(err) = spawn_error {
            return Err(Error::ResourceExhaustion(format!(
                "{}: failed to spawn thread: {err}",
                self.name
            )));
        }
        Ok(results)
    }
}

impl core::fmt::Debug for ThreadGroup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ThreadGroup")
            .field("name", &self.name)
            .field("threads", &self.threads)
            .field("persistent", &self.is_persistent())
            .finish()
    }
}

/// Per-worker parallel scheduler with a fixed thread count.
#[derive(Debug)]
pub struct ParallelScheduler {
    worker: WorkerId,
    group: ThreadGroup,
    epoch: u64,
}

impl ParallelScheduler {
    /// Creates a scheduler for `worker` using `threads` threads per dispatch.
    ///
    /// # Errors
    /// [`Error::ResourceExhaustion`] if the thread pool cannot be started.
    ///
    /// # Panics
    /// Panics if `threads == 0`.
    pub fn new(worker: WorkerId, threads: usize) -> Result<Self> {
        Ok(Self {
            worker,
            group: ThreadGroup::new(format!("grape-w{worker}"), threads)?,
            epoch: 0,
        })
    }

    /// Number of threads per dispatch.
    #[inline]
    pub fn threads(&self) -> usize {
        self.group.threads()
    }

    /// The threads chunks run on.
    #[inline]
    pub fn thread_group(&self) -> &ThreadGroup {
        &self.group
    }

    /// Worker this scheduler belongs to.
    #[inline]
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Epoch reported with failures.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Sets the epoch reported with failures. Called between epochs only.
    pub fn set_epoch(&mut self, epoch: u64) {
        self.epoch = epoch;
    }

    /// Splits `0..len` into at most `threads` contiguous, word-aligned chunks.
    ///
    /// Chunk `i` is always run as thread index `i`.
    pub fn chunks(&self, len: usize) -> Vec<Range<usize>> {
        if len == 0 {
            return Vec::new();
        }
        let per = len.div_ceil(self.threads()).next_multiple_of(WORD_BITS);
        (0..len)
            .step_by(per)
            .map(|start| start..(start + per).min(len))
            .collect()
    }

    /// Invokes `vertex_fn(vertex, thread_index)` for every set bit of `active`.
    ///
    /// No ordering is guaranteed between vertices, within or across threads.
    pub fn for_each_active<F>(&self, active: &AtomicBitset, vertex_fn: F) -> Result<()>
    where
        F: Fn(usize, usize) -> core::result::Result<(), ProgramError> + Sync,
    {
        self.run_chunked(active.len_bits(), |range, tid| {
            let mut first = None;
            for v in active.iter_ones_in(range) {
                if let Err(err) = vertex_fn(v, tid) {
                    first.get_or_insert(err);
                }
            }
            first.map_or(Ok(()), Err)
        })
    }

    /// Invokes `index_fn(index, thread_index)` for every index in `0..len`.
    pub fn for_each_index<F>(&self, len: usize, index_fn: F) -> Result<()>
    where
        F: Fn(usize, usize) -> core::result::Result<(), ProgramError> + Sync,
    {
        self.run_chunked(len, |range, tid| {
            let mut first = None;
            for i in range {
                if let Err(err) = index_fn(i, tid) {
                    first.get_or_insert(err);
                }
            }
            first.map_or(Ok(()), Err)
        })
    }

    /// Runs `chunk_fn(range, thread_index)` once per chunk of `0..len` and joins.
    pub fn run_chunked<F>(&self, len: usize, chunk_fn: F) -> Result<()>
    where
        F: Fn(Range<usize>, usize) -> core::result::Result<(), ProgramError> + Sync,
    {
        let mut chunks = self.chunks(len);
        let outcomes = self
            .group
            .for_each_mut(&mut chunks, |tid, range| run_guarded(&chunk_fn, range.clone(), tid))?;

        let mut failures: Vec<ProgramError> =
            outcomes.into_iter().filter_map(core::result::Result::err).collect();
        match failures.len() {
            0 => Ok(()),
            1 => Err(self.program_error(failures.remove(0))),
            _ => Err(self.program_error(ProgramError::Many(failures))),
        }
    }

    fn program_error(&self, source: ProgramError) -> Error {
        Error::ProgramLogic {
            worker: self.worker,
            epoch: self.epoch,
            source,
        }
    }
}

fn run_guarded<F>(
    chunk_fn: &F,
    range: Range<usize>,
    tid: usize,
) -> core::result::Result<(), ProgramError>
where
    F: Fn(Range<usize>, usize) -> core::result::Result<(), ProgramError> + Sync,
{
    match panic::catch_unwind(AssertUnwindSafe(|| chunk_fn(range, tid))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_owned());
            Err(ProgramError::Panicked {
                thread: tid,
                message,
            })
        }
    }
}
