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
// fold the private results of all workers into one ordered hit list
//
// Only called after the worker pool has been joined. The result does not depend on
// which worker searched which window: hits are checked against the final sequence
// lengths, sorted, and hits found twice in the overlap of two windows are removed.
//

use super::coords::{WorkerState, WorkerStats};
use super::error::{Result, ScanError};
use super::search::Hit;
use super::window_reader::SeqLengthTable;
use std::cmp::Ordering;

/// two hits on the same sequence and strand are the same hit when their alignments
/// share more than this fraction of the shorter one
pub const DUP_OVERLAP_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub nseqs: usize,
    pub nres: usize,
    pub strand_residues: usize,
    pub nwindows: usize,
    pub nunits: usize,
    pub raw_hits: usize,
    pub duplicates: usize,
    pub workers: Vec<WorkerStats>,
}

#[derive(Debug)]
pub struct ScanResults {
    pub hits: Vec<Hit>,
    pub seq_table: SeqLengthTable,
    pub summary: ScanSummary,
}

impl ScanResults {
    pub fn seq_name(&self, seq_idx: usize) -> &str {
        self.seq_table
            .get(seq_idx)
            .map(|e| e.name.as_str())
            .unwrap_or("")
    }
}

fn span_overlap(a: (usize, usize), b: (usize, usize)) -> usize {
    let lo = a.0.max(b.0);
    let hi = a.1.min(b.1);
    if hi >= lo {
        hi - lo + 1
    } else {
        0
    }
}

pub fn is_duplicate(a: &Hit, b: &Hit) -> bool {
    if a.seq_idx != b.seq_idx || a.strand != b.strand {
        return false;
    }
    let ov = span_overlap(a.ali_span(), b.ali_span());
    let shorter = a.ali_len().min(b.ali_len());
    ov as f64 > DUP_OVERLAP_FRACTION * shorter as f64
}

// of two duplicates, keep the better scoring, then the longer one
fn prefer(candidate: &Hit, kept: &Hit) -> bool {
    match candidate.score.total_cmp(&kept.score) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.ali_len() > kept.ali_len(),
    }
}

fn dedup_cmp(a: &Hit, b: &Hit) -> Ordering {
    let (alo, ahi) = a.ali_span();
    let (blo, bhi) = b.ali_span();
    a.seq_idx
        .cmp(&b.seq_idx)
        .then(a.strand.cmp(&b.strand))
        .then(alo.cmp(&blo))
        .then(ahi.cmp(&bhi))
        .then(b.score.total_cmp(&a.score))
        .then(a.env_from.cmp(&b.env_from))
        .then(a.env_to.cmp(&b.env_to))
}

/// Remove duplicates from hits sorted by `dedup_cmp`; returns the number removed.
fn remove_duplicates(hits: &mut Vec<Hit>) -> usize {
    let mut kept = Vec::<Hit>::with_capacity(hits.len());
    let mut removed = 0_usize;
    for hit in hits.drain(..) {
        if let Some(last) = kept.last_mut() {
            if is_duplicate(last, &hit) {
                if prefer(&hit, last) {
                    *last = hit;
                }
                removed += 1;
                continue;
            }
        }
        kept.push(hit);
    }
    *hits = kept;
    removed
}

pub fn merge_results(states: Vec<WorkerState>, seq_table: SeqLengthTable) -> Result<ScanResults> {
    let mut summary = ScanSummary::default();
    let mut total = WorkerStats::default();
    let mut hits = Vec::<Hit>::with_capacity(states.iter().map(|s| s.hits.len()).sum());

    for state in states {
        let worker = state.worker();
        total.merge(&state.stats);
        for mut hit in state.hits {
            let entry = seq_table.get(hit.seq_idx).ok_or_else(|| {
                ScanError::internal(
                    Some(worker),
                    Some(hit.seq_idx),
                    "hit on a sequence the reader never recorded",
                )
            })?;
            if let Some(c) = hit.coords().iter().find(|&&c| c == 0 || c > entry.length) {
                return Err(ScanError::internal(
                    Some(worker),
                    Some(hit.seq_idx),
                    format!(
                        "hit coordinate {} outside sequence {} of length {}",
                        c, entry.name, entry.length
                    ),
                ));
            }
            hit.seq_len = entry.length;
            hits.push(hit);
        }
        summary.workers.push(state.stats);
    }

    if total.sequences != seq_table.len() {
        return Err(ScanError::internal(
            None,
            None,
            format!(
                "workers finished {} sequences, the reader produced {}",
                total.sequences,
                seq_table.len()
            ),
        ));
    }
    if total.residues != seq_table.total_length() {
        return Err(ScanError::internal(
            None,
            None,
            format!(
                "workers scanned {} residues, the database holds {}",
                total.residues,
                seq_table.total_length()
            ),
        ));
    }

    summary.raw_hits = hits.len();
    hits.sort_by(dedup_cmp);
    summary.duplicates = remove_duplicates(&mut hits);
    hits.sort_by(|a, b| a.output_cmp(b));

    summary.nseqs = total.sequences;
    summary.nres = total.residues;
    summary.strand_residues = total.strand_residues;
    summary.nwindows = total.windows;
    summary.nunits = total.units;
    log::info!(
        "merged {} workers: {} sequences, {} residues, {} hits ({} duplicates removed)",
        summary.workers.len(),
        summary.nseqs,
        summary.nres,
        hits.len(),
        summary.duplicates
    );

    Ok(ScanResults {
        hits,
        seq_table,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::super::search::Strand;
    use super::*;

    fn hit(seq_idx: usize, strand: Strand, from: usize, to: usize, score: f32) -> Hit {
        let mut h = Hit::relative(from, to, score);
        h.seq_idx = seq_idx;
        h.strand = strand;
        h
    }

    fn table(lens: &[usize]) -> SeqLengthTable {
        let mut t = SeqLengthTable::new();
        for (i, &l) in lens.iter().enumerate() {
            t.record(i, &format!("s{}", i), l);
        }
        t
    }

    fn state(worker: usize, hits: Vec<Hit>, sequences: usize, residues: usize) -> WorkerState {
        let mut s = WorkerState::new(worker);
        s.hits = hits;
        s.stats.sequences = sequences;
        s.stats.residues = residues;
        s
    }

    #[test]
    fn duplicates_from_window_overlap_are_removed() {
        let w0 = state(
            0,
            vec![
                hit(0, Strand::Forward, 90, 110, 20.0),
                hit(1, Strand::Forward, 5, 15, 11.0),
            ],
            1,
            150,
        );
        let w1 = state(
            1,
            vec![
                hit(0, Strand::Forward, 90, 110, 20.0),
                hit(0, Strand::Reverse, 110, 90, 20.0),
            ],
            1,
            100,
        );
        let r = merge_results(vec![w1, w0], table(&[200, 50])).unwrap();
        assert_eq!(r.summary.raw_hits, 4);
        assert_eq!(r.summary.duplicates, 1);
        assert_eq!(r.hits.len(), 3);
        assert_eq!((r.hits[0].seq_idx, r.hits[0].ali_from), (0, 90));
        assert_eq!((r.hits[1].seq_idx, r.hits[1].ali_from), (0, 110));
        assert_eq!(r.hits[1].strand, Strand::Reverse);
        assert_eq!(r.hits[2].seq_idx, 1);
        assert_eq!(r.hits[0].seq_len, 200);
        assert_eq!(r.hits[2].seq_len, 50);
        assert_eq!(r.summary.nres, 250);
        assert_eq!(r.summary.workers.len(), 2);
    }

    #[test]
    fn better_scoring_duplicate_wins() {
        let hits = vec![
            hit(0, Strand::Forward, 10, 30, 5.0),
            hit(0, Strand::Forward, 12, 30, 9.0),
            hit(0, Strand::Forward, 60, 70, 1.0),
        ];
        let r = merge_results(vec![state(0, hits, 1, 100)], table(&[100])).unwrap();
        assert_eq!(r.hits.len(), 2);
        assert_eq!(r.hits[0].ali_from, 12);
        assert_eq!(r.hits[0].score, 9.0);
    }

    #[test]
    fn small_overlaps_are_not_duplicates() {
        let a = hit(0, Strand::Forward, 10, 29, 1.0);
        let b = hit(0, Strand::Forward, 25, 44, 1.0);
        assert!(!is_duplicate(&a, &b));
        let c = hit(0, Strand::Forward, 15, 34, 1.0);
        assert!(is_duplicate(&a, &c));
        let d = hit(0, Strand::Reverse, 29, 10, 1.0);
        assert!(!is_duplicate(&a, &d));
    }

    #[test]
    fn out_of_range_hit_is_an_internal_error() {
        let s = state(3, vec![hit(0, Strand::Forward, 95, 105, 1.0)], 1, 100);
        let r = merge_results(vec![s], table(&[100]));
        match r {
            Err(ScanError::Internal { worker, seq_idx, .. }) => {
                assert_eq!(worker, Some(3));
                assert_eq!(seq_idx, Some(0));
            }
            other => panic!("unexpected {:?}", other.map(|r| r.hits.len())),
        }
    }

    #[test]
    fn unknown_sequence_is_an_internal_error() {
        let s = state(0, vec![hit(4, Strand::Forward, 1, 5, 1.0)], 1, 100);
        assert!(merge_results(vec![s], table(&[100])).is_err());
    }

    #[test]
    fn lost_work_is_detected() {
        let s = state(0, vec![], 1, 90);
        assert!(merge_results(vec![s], table(&[100])).is_err());
        let s = state(0, vec![], 1, 100);
        assert!(merge_results(vec![s], table(&[100, 20])).is_err());
    }
}
