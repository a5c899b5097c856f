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
// per-worker search of a window on one or both strands, and the translation of
// window-relative hit coordinates to full-sequence coordinates
//

use super::search::{reverse_complement_into, Hit, SearchModel, Strand};
use super::window_reader::{Window, WorkUnit};
use super::{thread_cpu_time, StrandMode};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    pub worker: usize,
    pub units: usize,
    pub windows: usize,
    // tail windows seen, i.e. sequences finished by this worker
    pub sequences: usize,
    // residues scanned, each residue of the database counted once
    pub residues: usize,
    // residues scanned summed over the strands searched
    pub strand_residues: usize,
    pub hits: usize,
    pub busy: Duration,
    pub wait: Duration,
    pub user_time: f64,
    pub sys_time: f64,
}

impl WorkerStats {
    pub fn merge(&mut self, other: &WorkerStats) {
        self.units += other.units;
        self.windows += other.windows;
        self.sequences += other.sequences;
        self.residues += other.residues;
        self.strand_residues += other.strand_residues;
        self.hits += other.hits;
        self.busy += other.busy;
        self.wait += other.wait;
        self.user_time += other.user_time;
        self.sys_time += other.sys_time;
    }
}

/// Everything a worker accumulates. Owned by its worker thread until the pool is
/// joined, then handed to the merge.
#[derive(Debug, Default)]
pub struct WorkerState {
    pub hits: Vec<Hit>,
    pub stats: WorkerStats,
    rc_buf: Vec<u8>,
}

impl WorkerState {
    pub fn new(worker: usize) -> Self {
        WorkerState {
            hits: Vec::<Hit>::with_capacity(1024),
            stats: WorkerStats {
                worker,
                ..WorkerStats::default()
            },
            rc_buf: Vec::new(),
        }
    }

    pub fn worker(&self) -> usize {
        self.stats.worker
    }

    pub fn search_unit<M: SearchModel + ?Sized>(
        &mut self,
        model: &M,
        unit: &WorkUnit,
        strand: StrandMode,
    ) {
        for window in unit.windows() {
            self.search_window(model, window, strand);
        }
        self.stats.units += 1;
    }

    pub fn search_window<M: SearchModel + ?Sized>(
        &mut self,
        model: &M,
        window: &Window,
        strand: StrandMode,
    ) {
        let prev_hit_cnt = self.hits.len();

        if strand.searches_forward() {
            let offset = window.start - 1;
            for mut hit in model.search(&window.residues) {
                correct_forward(&mut hit, offset);
                self.push_hit(hit, window, Strand::Forward);
            }
        }

        if strand.searches_reverse() && !window.is_empty() {
            reverse_complement_into(&window.residues, &mut self.rc_buf);
            let rc_start = window.reverse_start();
            for mut hit in model.search(&self.rc_buf) {
                correct_reverse(&mut hit, rc_start);
                self.push_hit(hit, window, Strand::Reverse);
            }
        }

        // overlap residues were counted with the previous window
        let fresh = window.fresh();
        self.stats.residues += fresh;
        self.stats.strand_residues += fresh * strand.strand_count();
        self.stats.windows += 1;
        if window.is_tail {
            self.stats.sequences += 1;
        }
        self.stats.hits += self.hits.len() - prev_hit_cnt;
    }

    pub fn record_cpu_time(&mut self) {
        let (user, sys) = thread_cpu_time();
        self.stats.user_time = user;
        self.stats.sys_time = sys;
    }

    fn push_hit(&mut self, mut hit: Hit, window: &Window, strand: Strand) {
        hit.seq_idx = window.seq_idx;
        hit.strand = strand;
        self.hits.push(hit);
    }
}

/// shift window coordinates by the window's offset in the sequence
pub fn correct_forward(hit: &mut Hit, offset: usize) {
    hit.ali_from += offset;
    hit.ali_to += offset;
    hit.env_from += offset;
    hit.env_to += offset;
}

// Reverse-complement coordinates run backwards along the sequence. A coordinate
// past the window (a model bug) maps to 0, which the merge rejects.
fn reflect(rc_start: usize, rel: usize) -> usize {
    (rc_start + 1).saturating_sub(rel)
}

/// map reverse-complement window coordinates back onto the top strand
pub fn correct_reverse(hit: &mut Hit, rc_start: usize) {
    hit.ali_from = reflect(rc_start, hit.ali_from);
    hit.ali_to = reflect(rc_start, hit.ali_to);
    hit.env_from = reflect(rc_start, hit.env_from);
    hit.env_to = reflect(rc_start, hit.env_to);
}
