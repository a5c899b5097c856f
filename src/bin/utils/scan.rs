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
// drive a scan: one producer filling work units, `nthreads` workers searching them
//

use super::coords::WorkerState;
use super::error::{Result, ScanError};
use super::merge::{merge_results, ScanResults};
use super::search::SearchModel;
use super::window_reader::{SequenceSource, WindowReader, WorkUnit};
use super::work_queue::WorkQueue;
use super::worker_pool::WorkerPool;
use super::{Parameters, StrandMode};
use std::sync::Arc;
use std::time::Instant;

type Queue = Arc<WorkQueue<WorkUnit>>;

/// Scan every sequence of `source` with `model` and return the merged hits.
///
/// Consecutive windows of a sequence overlap by `model.max_length() - 1` residues, so
/// no hit the model can report is cut by a window boundary. With
/// `params.nthreads == 0` the scan runs in the calling thread.
pub fn scan_database<S, M>(source: &mut S, model: Arc<M>, params: &Parameters) -> Result<ScanResults>
where
    S: SequenceSource + ?Sized,
    M: SearchModel + 'static,
{
    params.validate()?;
    let max_length = model.max_length();
    if max_length == 0 {
        return Err(ScanError::config(format!(
            "model {} reports a maximum hit length of 0",
            model.name()
        )));
    }
    let overlap = max_length - 1;
    log::info!(
        "scan with model {}: threads: {}, block length: {}, overlap: {}, strand: {:?}",
        model.name(),
        params.nthreads,
        params.block_length,
        overlap,
        params.strand
    );

    let mut reader = WindowReader::new(source, overlap, params.block_length);
    if let Some(n) = params.n_targetseqs {
        reader.restrict_sequences(n);
    }

    let start = Instant::now();
    let states = if params.nthreads == 0 {
        serial_loop(&mut reader, &*model, params.strand)?
    } else {
        thread_loop(&mut reader, model, params)?
    };
    log::info!("search done in {:.3} s", start.elapsed().as_secs_f64());

    merge_results(states, reader.into_seq_table())
}

fn serial_loop<S, M>(
    reader: &mut WindowReader<S>,
    model: &M,
    strand: StrandMode,
) -> Result<Vec<WorkerState>>
where
    S: SequenceSource + ?Sized,
    M: SearchModel + ?Sized,
{
    let mut state = WorkerState::new(0);
    let mut unit = WorkUnit::new();
    while reader.fill_block(&mut unit)? > 0 {
        let t0 = Instant::now();
        state.search_unit(model, &unit, strand);
        state.stats.busy += t0.elapsed();
    }
    state.record_cpu_time();
    Ok(vec![state])
}

fn thread_loop<S, M>(
    reader: &mut WindowReader<S>,
    model: Arc<M>,
    params: &Parameters,
) -> Result<Vec<WorkerState>>
where
    S: SequenceSource + ?Sized,
    M: SearchModel + 'static,
{
    let nworkers = params.nthreads as usize;
    let strand = params.strand;
    let queue: Queue = Arc::new(WorkQueue::new(nworkers * 2, WorkUnit::new)?);

    let mut pool = WorkerPool::new(move |idx: usize, (queue, model): (Queue, Arc<M>)| {
        worker_loop(idx, &queue, &*model, strand)
    });
    for _ in 0..nworkers {
        pool.add_worker((queue.clone(), model.clone()))?;
    }
    pool.launch()?;
    pool.release_all()?;

    let produced = produce(reader, &queue, nworkers);
    let joined = pool.join_all();

    let nunits = produced?;
    let mut states = Vec::<WorkerState>::with_capacity(nworkers);
    for r in joined? {
        states.push(r?);
    }
    queue.drain()?;
    log::info!("{} work units searched by {} workers", nunits, nworkers);
    Ok(states)
}

/// Fill and publish units until the reader is exhausted or fails, then publish one
/// terminal unit per worker. The terminal units go out on both paths, otherwise the
/// workers never return.
fn produce<S>(reader: &mut WindowReader<S>, queue: &WorkQueue<WorkUnit>, nworkers: usize) -> Result<usize>
where
    S: SequenceSource + ?Sized,
{
    let mut unit = queue.producer_handoff(None)?;
    let mut nunits = 0_usize;
    let status = loop {
        match reader.fill_block(&mut unit) {
            Ok(0) => break Ok(()),
            Ok(_) => {
                nunits += 1;
                unit = queue.producer_handoff(Some(unit))?;
            }
            Err(e) => {
                log::error!("reading stopped after {} work units: {}", nunits, e);
                break Err(e);
            }
        }
    };

    unit.reset();
    queue.producer_publish(unit)?;
    for _ in 1..nworkers {
        let mut unit = queue.producer_handoff(None)?;
        unit.reset();
        queue.producer_publish(unit)?;
    }
    log::debug!("{} terminal units published", nworkers);
    status.map(|_| nunits)
}

fn worker_loop<M>(idx: usize, queue: &WorkQueue<WorkUnit>, model: &M, strand: StrandMode) -> Result<WorkerState>
where
    M: SearchModel + ?Sized,
{
    let mut state = WorkerState::new(idx);
    let mut drained: Option<WorkUnit> = None;
    loop {
        let t0 = Instant::now();
        let unit = queue.worker_handoff(drained.take())?;
        state.stats.wait += t0.elapsed();
        if unit.is_terminal() {
            queue.worker_release(unit)?;
            break;
        }
        let t1 = Instant::now();
        state.search_unit(model, &unit, strand);
        state.stats.busy += t1.elapsed();
        drained = Some(unit);
    }
    state.record_cpu_time();
    log::debug!(
        "worker {}: units: {}, windows: {}, residues: {}, hits: {}, busy: {:.3} s, wait: {:.3} s",
        idx,
        state.stats.units,
        state.stats.windows,
        state.stats.residues,
        state.stats.hits,
        state.stats.busy.as_secs_f64(),
        state.stats.wait.as_secs_f64()
    );
    Ok(state)
}
