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
// the per-window search step
//
// A `SearchModel` is applied to the residues of one window (or of its reverse
// complement) and reports hits in window-relative, 1-based coordinates. It must
// not touch shared state; the scan calls it from many workers at once.
//

use super::error::{Result, ScanError};
use std::cmp::Ordering;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn symbol(&self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub seq_idx: usize,
    pub strand: Strand,
    pub ali_from: usize,
    pub ali_to: usize,
    pub env_from: usize,
    pub env_to: usize,
    pub score: f32,
    // 0 until the final sequence length is known
    pub seq_len: usize,
}

impl Hit {
    /// a hit as reported by a search step, before coordinate correction
    pub fn relative(ali_from: usize, ali_to: usize, score: f32) -> Self {
        Hit {
            seq_idx: 0,
            strand: Strand::Forward,
            ali_from,
            ali_to,
            env_from: ali_from,
            env_to: ali_to,
            score,
            seq_len: 0,
        }
    }

    /// alignment span as (low, high), independent of strand
    pub fn ali_span(&self) -> (usize, usize) {
        if self.ali_from <= self.ali_to {
            (self.ali_from, self.ali_to)
        } else {
            (self.ali_to, self.ali_from)
        }
    }

    pub fn ali_len(&self) -> usize {
        let (lo, hi) = self.ali_span();
        hi - lo + 1
    }

    pub fn coords(&self) -> [usize; 4] {
        [self.ali_from, self.ali_to, self.env_from, self.env_to]
    }

    /// the order of the merged output: sequence, then alignment start
    pub fn output_cmp(&self, other: &Hit) -> Ordering {
        self.seq_idx
            .cmp(&other.seq_idx)
            .then(self.ali_from.cmp(&other.ali_from))
            .then(self.ali_to.cmp(&other.ali_to))
            .then(self.strand.cmp(&other.strand))
            .then(other.score.total_cmp(&self.score))
    }
}

pub trait SearchModel: Send + Sync {
    /// hits in `residues`, 1-based and relative to the first residue
    fn search(&self, residues: &[u8]) -> Vec<Hit>;

    /// longest hit the model can report; consecutive windows overlap by one less
    fn max_length(&self) -> usize;

    fn name(&self) -> &str {
        "model"
    }
}

pub fn complement(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        b'a' => b't',
        b'c' => b'g',
        b'g' => b'c',
        b't' => b'a',
        _ => b'N',
    }
}

/// reverse complement of `seq` into `out`; `out` is cleared first so its buffer
/// can be reused window after window
pub fn reverse_complement_into(seq: &[u8], out: &mut Vec<u8>) {
    out.clear();
    out.extend(seq.iter().rev().map(|&b| complement(b)));
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::<u8>::with_capacity(seq.len());
    reverse_complement_into(seq, &mut out);
    out
}

/// A nucleotide motif with an allowed number of mismatches. `N` in the motif
/// matches anything; `N` in the target only matches an `N` in the motif.
pub struct MotifModel {
    name: String,
    motif: Vec<u8>,
    max_mismatches: usize,
    max_length: usize,
}

impl MotifModel {
    pub fn new(name: &str, motif: &str, max_mismatches: usize) -> Result<Self> {
        let motif = motif.trim().as_bytes().to_ascii_uppercase();
        if motif.is_empty() {
            return Err(ScanError::config("empty motif"));
        }
        if let Some(p) = motif
            .iter()
            .position(|c| !matches!(c, b'A' | b'C' | b'G' | b'T' | b'N'))
        {
            return Err(ScanError::config(format!(
                "motif has a non-nucleotide character '{}' at position {}",
                motif[p] as char,
                p + 1
            )));
        }
        if max_mismatches >= motif.len() {
            return Err(ScanError::config(format!(
                "{} mismatches allowed for a motif of length {}",
                max_mismatches,
                motif.len()
            )));
        }
        let max_length = motif.len();
        Ok(Self {
            name: name.to_string(),
            motif,
            max_mismatches,
            max_length,
        })
    }

    /// Widen the window overlap beyond the motif length (`--w_length`).
    pub fn with_max_length(mut self, max_length: usize) -> Result<Self> {
        if max_length < self.motif.len() {
            return Err(ScanError::config(format!(
                "window length {} is shorter than the motif ({})",
                max_length,
                self.motif.len()
            )));
        }
        self.max_length = max_length;
        Ok(self)
    }

    pub fn motif(&self) -> &[u8] {
        &self.motif
    }
}

impl SearchModel for MotifModel {
    fn search(&self, residues: &[u8]) -> Vec<Hit> {
        let m = self.motif.len();
        let mut hits = Vec::<Hit>::new();
        if residues.len() < m {
            return hits;
        }
        for i in 0..=(residues.len() - m) {
            let mut mismatches = 0_usize;
            for (p, &c) in self.motif.iter().enumerate() {
                if c != b'N' && c != residues[i + p].to_ascii_uppercase() {
                    mismatches += 1;
                    if mismatches > self.max_mismatches {
                        break;
                    }
                }
            }
            if mismatches <= self.max_mismatches {
                hits.push(Hit::relative(i + 1, i + m, (m - mismatches) as f32));
            }
        }
        hits
    }

    fn max_length(&self) -> usize {
        self.max_length
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_complement_roundtrip() {
        let s = b"ACGTTNAC";
        assert_eq!(reverse_complement(s), b"GTNAACGT".to_vec());
        assert_eq!(reverse_complement(&reverse_complement(s)), s.to_vec());
    }

    #[test]
    fn motif_hits_are_one_based() {
        let m = MotifModel::new("m", "GATTACA", 0).unwrap();
        let hits = m.search(b"CCGATTACATTGATTACA");
        assert_eq!(hits.len(), 2);
        assert_eq!((hits[0].ali_from, hits[0].ali_to), (3, 9));
        assert_eq!((hits[1].ali_from, hits[1].ali_to), (12, 18));
        assert_eq!(hits[0].score, 7.0);
    }

    #[test]
    fn motif_mismatches_and_wildcards() {
        let m = MotifModel::new("m", "GANTACA", 1).unwrap();
        let hits = m.search(b"GACTAGA");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 6.0);
        assert!(m.search(b"GACTGGA").is_empty());
        assert!(m.search(b"GAT").is_empty());
    }

    #[test]
    fn motif_validation() {
        assert!(MotifModel::new("m", "", 0).is_err());
        assert!(MotifModel::new("m", "ACGU", 0).is_err());
        assert!(MotifModel::new("m", "ACG", 3).is_err());
        let m = MotifModel::new("m", "acgt", 0).unwrap();
        assert_eq!(m.motif(), b"ACGT");
        assert_eq!(m.max_length(), 4);
        assert!(MotifModel::new("m", "ACGT", 0).unwrap().with_max_length(3).is_err());
        let m = MotifModel::new("m", "ACGT", 0).unwrap().with_max_length(40).unwrap();
        assert_eq!(m.max_length(), 40);
    }

    #[test]
    fn output_order() {
        let mut a = Hit::relative(10, 20, 1.0);
        a.seq_idx = 1;
        let mut b = Hit::relative(5, 9, 1.0);
        b.seq_idx = 2;
        let mut c = Hit::relative(30, 12, 1.0);
        c.seq_idx = 1;
        c.strand = Strand::Reverse;
        let mut v = vec![b.clone(), c.clone(), a.clone()];
        v.sort_by(|x, y| x.output_cmp(y));
        assert_eq!(v, vec![a, c, b]);
    }
}
