//! The work pool.
//!
//! Worker threads take the front item of a pending deque and search nonces
//! until one meets the item's difficulty. A monotonically increasing ticket
//! stops the losing workers as soon as any worker (or the GPU backend)
//! succeeds, and lets `cancel` abort in-flight searches by root.

use almond_types::Root;
use rand::RngCore;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::validate::work_value;

/// Nonces tried between ticket checks.
const BATCH_SIZE: u64 = 256;

/// Optional GPU work backend: given a root and difficulty, either produces a
/// valid nonce or gives up (falling back to the CPU workers).
pub type GpuWorkFn = Box<dyn Fn(&Root, u64) -> Option<u64> + Send + Sync>;

type WorkCallback = Box<dyn FnOnce(Option<u64>) + Send>;

struct WorkItem {
    root: Root,
    callback: WorkCallback,
    difficulty: u64,
}

struct PoolState {
    pending: VecDeque<WorkItem>,
    done: bool,
}

struct PoolShared {
    state: Mutex<PoolState>,
    producer_condition: Condvar,
    /// Incremented whenever the current front item is resolved; workers
    /// snapshot it before searching and bail once it moves on.
    ticket: AtomicUsize,
    gpu: Option<GpuWorkFn>,
}

/// A pool of proof-of-work worker threads.
pub struct WorkPool {
    shared: Arc<PoolShared>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkPool {
    /// Spawn `thread_count` CPU workers, plus an optional GPU backend tried
    /// first by worker 0.
    pub fn new(thread_count: usize, gpu: Option<GpuWorkFn>) -> Self {
        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                pending: VecDeque::new(),
                done: false,
            }),
            producer_condition: Condvar::new(),
            ticket: AtomicUsize::new(0),
            gpu,
        });

        let count = thread_count.max(1);
        let mut threads = Vec::with_capacity(count);
        for index in 0..count {
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name("work".to_string())
                .spawn(move || worker_loop(shared, index))
                .expect("failed to spawn work thread");
            threads.push(handle);
        }

        Self { shared, threads }
    }

    /// Enqueue a work request; `callback` fires exactly once with the nonce,
    /// or with `None` if the request is cancelled or the pool stops.
    pub fn generate(
        &self,
        root: Root,
        difficulty: u64,
        callback: impl FnOnce(Option<u64>) + Send + 'static,
    ) {
        let mut state = self.shared.state.lock().expect("work pool poisoned");
        if state.done {
            drop(state);
            callback(None);
            return;
        }
        state.pending.push_back(WorkItem {
            root,
            callback: Box::new(callback),
            difficulty,
        });
        drop(state);
        self.shared.producer_condition.notify_all();
    }

    /// Generate work synchronously. Returns `None` only if the pool is
    /// stopped or the root is cancelled while queued.
    pub fn generate_blocking(&self, root: Root, difficulty: u64) -> Option<u64> {
        let (tx, rx) = std::sync::mpsc::channel();
        self.generate(root, difficulty, move |result| {
            let _ = tx.send(result);
        });
        rx.recv().ok().flatten()
    }

    /// Abort all pending work for a root. Each aborted item's callback fires
    /// once with `None`. If the root is being searched right now, the ticket
    /// bumps so workers abandon it.
    pub fn cancel(&self, root: &Root) {
        let mut cancelled = Vec::new();
        {
            let mut state = self.shared.state.lock().expect("work pool poisoned");
            if let Some(front) = state.pending.front() {
                if front.root == *root {
                    self.shared.ticket.fetch_add(1, Ordering::SeqCst);
                }
            }
            let mut index = 0;
            while index < state.pending.len() {
                if state.pending[index].root == *root {
                    let item = state.pending.remove(index).expect("index in bounds");
                    cancelled.push(item.callback);
                } else {
                    index += 1;
                }
            }
        }
        for callback in cancelled {
            callback(None);
        }
    }

    /// Stop the pool: flush every queued item with `None` and join workers.
    pub fn stop(&mut self) {
        let drained: Vec<WorkCallback> = {
            let mut state = self.shared.state.lock().expect("work pool poisoned");
            if state.done {
                return;
            }
            state.done = true;
            self.shared.ticket.fetch_add(1, Ordering::SeqCst);
            state.pending.drain(..).map(|item| item.callback).collect()
        };
        self.shared.producer_condition.notify_all();
        for callback in drained {
            callback(None);
        }
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }

    /// Number of queued (not yet resolved) work items.
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().expect("work pool poisoned").pending.len()
    }
}

impl Drop for WorkPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(shared: Arc<PoolShared>, thread_index: usize) {
    let mut rng = rand::thread_rng();
    let mut state = shared.state.lock().expect("work pool poisoned");
    loop {
        if state.done {
            break;
        }
        let Some(front) = state.pending.front() else {
            state = shared
                .producer_condition
                .wait(state)
                .expect("work pool poisoned");
            continue;
        };

        let root = front.root;
        let difficulty = front.difficulty;
        let ticket = shared.ticket.load(Ordering::SeqCst);
        drop(state);

        let mut found: Option<u64> = None;

        // The GPU backend, when present, is only consulted by one worker so
        // the remaining threads keep the CPU search going in parallel.
        if thread_index == 0 {
            if let Some(gpu) = &shared.gpu {
                found = gpu(&root, difficulty);
            }
        }

        while found.is_none() && shared.ticket.load(Ordering::SeqCst) == ticket {
            let mut nonce = rng.next_u64();
            for _ in 0..BATCH_SIZE {
                if work_value(&root, nonce) >= difficulty {
                    found = Some(nonce);
                    break;
                }
                nonce = nonce.wrapping_add(1);
            }
        }

        state = shared.state.lock().expect("work pool poisoned");
        if shared.ticket.load(Ordering::SeqCst) == ticket {
            if let Some(nonce) = found {
                // This worker won the race for the current item.
                shared.ticket.fetch_add(1, Ordering::SeqCst);
                let item = state.pending.pop_front().expect("front item present");
                drop(state);
                tracing::trace!(root = %item.root, nonce, "work generated");
                (item.callback)(Some(nonce));
                state = shared.state.lock().expect("work pool poisoned");
            }
        }
    }
}
