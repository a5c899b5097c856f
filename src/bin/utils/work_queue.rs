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
// a bounded two-way handoff between one reader and many workers
//
// `capacity` units are allocated once and circulate for the whole run: the reader
// fills a unit and publishes it on the "ready" channel, a worker takes it, and when
// the worker is done the unit goes back on the "recycled" channel for the reader
// to refill. Both channels are bounded by `capacity`, so memory use does not depend
// on the size of the input stream.
//

use super::error::{Result, ScanError};
use crossbeam_channel::{bounded, Receiver, Sender};

pub struct WorkQueue<T> {
    ready_tx: Sender<T>,
    ready_rx: Receiver<T>,
    recycled_tx: Sender<T>,
    recycled_rx: Receiver<T>,
    capacity: usize,
}

impl<T> WorkQueue<T> {
    pub fn new<F>(capacity: usize, mut factory: F) -> Result<Self>
    where
        F: FnMut() -> T,
    {
        if capacity == 0 {
            return Err(ScanError::setup("work queue capacity must be at least 1"));
        }
        let (ready_tx, ready_rx) = bounded::<T>(capacity);
        let (recycled_tx, recycled_rx) = bounded::<T>(capacity);
        for _ in 0..capacity {
            recycled_tx
                .send(factory())
                .map_err(|_| ScanError::setup("fail to seed the work queue"))?;
        }
        log::debug!("work queue created, capacity: {}", capacity);
        Ok(Self {
            ready_tx,
            ready_rx,
            recycled_tx,
            recycled_rx,
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Publish a filled unit (if any) and block until a recycled one can be refilled.
    pub fn producer_handoff(&self, filled: Option<T>) -> Result<T> {
        if let Some(unit) = filled {
            self.publish(unit)?;
        }
        self.recycled_rx
            .recv()
            .map_err(|_| ScanError::internal(None, None, "recycled channel disconnected"))
    }

    /// Publish a filled unit without asking for another one back.
    pub fn producer_publish(&self, filled: T) -> Result<()> {
        self.publish(filled)
    }

    /// Hand back a drained unit (if any) and block until a ready one arrives.
    pub fn worker_handoff(&self, drained: Option<T>) -> Result<T> {
        if let Some(unit) = drained {
            self.recycle(unit)?;
        }
        self.ready_rx
            .recv()
            .map_err(|_| ScanError::internal(None, None, "ready channel disconnected"))
    }

    /// Hand back a drained unit on the way out.
    pub fn worker_release(&self, drained: T) -> Result<()> {
        self.recycle(drained)
    }

    pub fn ready_len(&self) -> usize {
        self.ready_rx.len()
    }

    pub fn recycled_len(&self) -> usize {
        self.recycled_rx.len()
    }

    /// Take back every unit once the producer and all workers are done. Every unit
    /// allocated at creation must be accounted for.
    pub fn drain(&self) -> Result<Vec<T>> {
        let mut units = Vec::<T>::with_capacity(self.capacity);
        units.extend(self.ready_rx.try_iter());
        units.extend(self.recycled_rx.try_iter());
        if units.len() != self.capacity {
            return Err(ScanError::internal(
                None,
                None,
                format!(
                    "work queue holds {} units at shutdown, {} were allocated",
                    units.len(),
                    self.capacity
                ),
            ));
        }
        Ok(units)
    }

    fn publish(&self, unit: T) -> Result<()> {
        self.ready_tx
            .send(unit)
            .map_err(|_| ScanError::internal(None, None, "ready channel disconnected"))
    }

    fn recycle(&self, unit: T) -> Result<()> {
        self.recycled_tx
            .send(unit)
            .map_err(|_| ScanError::internal(None, None, "recycled channel disconnected"))
    }
}
