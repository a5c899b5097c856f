// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]

//
// a fixed pool of long-lived workers behind a start gate
//
// Every worker runs the same function against its own private data. Workers are
// registered first, launched together, and held at the gate until the producer
// calls `release_all()`; `join_all()` hands back each worker's result in worker
// order once all of them have returned.
//

use super::error::{Result, ScanError};
use crossbeam_channel::unbounded;
use std::sync::{Arc, Barrier};
use threadpool::ThreadPool;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PoolState {
    Created,
    Launched,
    Released,
    Joined,
}

type WorkerFn<D, R> = dyn Fn(usize, D) -> R + Send + Sync;

pub struct WorkerPool<D, R> {
    func: Arc<WorkerFn<D, R>>,
    data: Vec<D>,
    nworkers: usize,
    pool: Option<ThreadPool>,
    gate: Option<Arc<Barrier>>,
    results: Option<crossbeam_channel::Receiver<(usize, R)>>,
    state: PoolState,
}

// a worker that unwinds leaves the producer waiting on units that never come back,
// so a panic in the worker function takes the process down
struct AbortOnPanic {
    worker: usize,
}

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        if std::thread::panicking() {
            log::error!("worker {} panicked, abort", self.worker);
            std::process::abort();
        }
    }
}

impl<D, R> WorkerPool<D, R>
where
    D: Send + 'static,
    R: Send + 'static,
{
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(usize, D) -> R + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            data: Vec::new(),
            nworkers: 0,
            pool: None,
            gate: None,
            results: None,
            state: PoolState::Created,
        }
    }

    pub fn add_worker(&mut self, data: D) -> Result<usize> {
        if self.state != PoolState::Created {
            return Err(ScanError::setup("can not add a worker after the pool is launched"));
        }
        self.data.push(data);
        self.nworkers += 1;
        Ok(self.nworkers - 1)
    }

    pub fn worker_count(&self) -> usize {
        self.nworkers
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    pub fn launch(&mut self) -> Result<()> {
        if self.state != PoolState::Created {
            return Err(ScanError::setup("worker pool launched twice"));
        }
        if self.nworkers == 0 {
            return Err(ScanError::setup("worker pool has no registered worker"));
        }
        let pool = ThreadPool::with_name("wscan-worker".to_string(), self.nworkers);
        // the producer is the last party at the gate
        let gate = Arc::new(Barrier::new(self.nworkers + 1));
        let (tx, rx) = unbounded::<(usize, R)>();

        for (idx, data) in self.data.drain(..).enumerate() {
            let func = self.func.clone();
            let gate = gate.clone();
            let tx = tx.clone();
            pool.execute(move || {
                let _guard = AbortOnPanic { worker: idx };
                gate.wait();
                log::debug!("worker {} running", idx);
                let r = func(idx, data);
                let _ = tx.send((idx, r));
                log::debug!("worker {} finished", idx);
            });
        }
        log::info!("worker pool launched: {} workers", self.nworkers);
        self.pool = Some(pool);
        self.gate = Some(gate);
        self.results = Some(rx);
        self.state = PoolState::Launched;
        Ok(())
    }

    /// Open the start gate. Blocks until every worker has reached it.
    pub fn release_all(&mut self) -> Result<()> {
        if self.state != PoolState::Launched {
            return Err(ScanError::setup(format!(
                "release_all called in state {:?}",
                self.state
            )));
        }
        if let Some(gate) = self.gate.take() {
            gate.wait();
        }
        self.state = PoolState::Released;
        Ok(())
    }

    pub fn join_all(&mut self) -> Result<Vec<R>> {
        if self.state != PoolState::Released {
            return Err(ScanError::setup(format!(
                "join_all called in state {:?}",
                self.state
            )));
        }
        if let Some(pool) = self.pool.take() {
            pool.join();
        }
        self.state = PoolState::Joined;

        let mut slots: Vec<Option<R>> = (0..self.nworkers).map(|_| None).collect();
        if let Some(rx) = self.results.take() {
            for (idx, r) in rx.try_iter() {
                slots[idx] = Some(r);
            }
        }
        let mut out = Vec::<R>::with_capacity(self.nworkers);
        for (idx, r) in slots.into_iter().enumerate() {
            match r {
                Some(r) => out.push(r),
                None => {
                    return Err(ScanError::internal(
                        Some(idx),
                        None,
                        "worker exited without a result",
                    ))
                }
            }
        }
        log::info!("worker pool joined: {} workers", self.nworkers);
        Ok(out)
    }
}
