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
// turn a sequence source into a stream of work units made of overlapping windows
//
// Consecutive windows of one sequence overlap by `max_length - 1` residues of the
// model, so any hit no longer than `max_length` lies entirely inside at least one
// window. Each unit carries at most `block_length` new (non-overlap) residues; a unit
// may hold the tails of many short sequences, and a long sequence is spread over
// many units.
//

use super::error::{Result, ScanError};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    Window { is_tail: bool },
    Eof,
}

pub trait SequenceSource {
    /// Append up to `max_residues` residues of the current sequence, starting at the
    /// 0-based `offset`, to `buf`. After a read that reaches the end of the sequence
    /// (`is_tail`), the source moves on to the next sequence. `Eof` is only returned
    /// when a new sequence is requested and none is left.
    fn read_window(
        &mut self,
        offset: usize,
        max_residues: usize,
        buf: &mut Vec<u8>,
    ) -> Result<ReadStatus>;

    /// name of the sequence the last `read_window` call read from
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Default)]
pub struct Window {
    pub seq_idx: usize,
    // 1-based coordinate of the first residue in the full sequence
    pub start: usize,
    pub residues: Vec<u8>,
    // leading residues already seen by the previous window of the same sequence
    pub overlap: usize,
    pub is_tail: bool,
}

impl Window {
    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// residues not covered by the previous window
    pub fn fresh(&self) -> usize {
        self.residues.len() - self.overlap
    }

    pub fn end(&self) -> usize {
        self.start + self.residues.len() - 1
    }

    /// Full-sequence coordinate of the first residue of the reverse complement of
    /// this window, i.e. of this window's last residue.
    pub fn reverse_start(&self) -> usize {
        self.start + self.residues.len() - 1
    }
}

/// A block of windows moved through the work queue as one unit. The window
/// buffers are kept between fills, so a recycled unit refills without allocating.
#[derive(Debug, Default)]
pub struct WorkUnit {
    windows: Vec<Window>,
    count: usize,
    // false when the last window is not the tail of its sequence
    pub complete: bool,
}

impl WorkUnit {
    pub fn new() -> Self {
        WorkUnit {
            windows: Vec::new(),
            count: 0,
            complete: true,
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.complete = true;
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows[..self.count]
    }

    pub fn len(&self) -> usize {
        self.count
    }

    /// a unit without windows tells a worker to stop
    pub fn is_terminal(&self) -> bool {
        self.count == 0
    }

    pub fn fresh_residues(&self) -> usize {
        self.windows().iter().map(|w| w.fresh()).sum()
    }

    fn next_slot(&mut self) -> &mut Window {
        if self.count == self.windows.len() {
            self.windows.push(Window::default());
        }
        let w = &mut self.windows[self.count];
        w.residues.clear();
        w.overlap = 0;
        w.is_tail = false;
        self.count += 1;
        w
    }

    fn pop_slot(&mut self) {
        self.count -= 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqEntry {
    pub seq_idx: usize,
    pub name: String,
    pub length: usize,
}

/// Sequence lengths as observed by the reader. The length of a sequence is only
/// final once its tail window has been read; until then the entry holds the end of
/// the furthest window read so far.
#[derive(Debug, Clone, Default)]
pub struct SeqLengthTable {
    entries: Vec<SeqEntry>,
}

impl SeqLengthTable {
    pub fn new() -> Self {
        SeqLengthTable {
            entries: Vec::<SeqEntry>::with_capacity(1000),
        }
    }

    pub fn record(&mut self, seq_idx: usize, name: &str, length: usize) {
        if let Some(last) = self.entries.last_mut() {
            if last.seq_idx == seq_idx {
                last.length = length;
                return;
            }
        }
        self.entries.push(SeqEntry {
            seq_idx,
            name: name.to_string(),
            length,
        });
    }

    pub fn get(&self, seq_idx: usize) -> Option<&SeqEntry> {
        self.entries
            .binary_search_by_key(&seq_idx, |e| e.seq_idx)
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_length(&self) -> usize {
        self.entries.iter().map(|e| e.length).sum()
    }

    pub fn entries(&self) -> &[SeqEntry] {
        &self.entries
    }
}

pub struct WindowReader<'a, S: SequenceSource + ?Sized> {
    source: &'a mut S,
    overlap: usize,
    block_length: usize,
    seq_idx: usize,
    // residues of the current sequence read so far
    pos: usize,
    at_eof: bool,
    n_targetseqs: Option<usize>,
    seq_table: SeqLengthTable,
    nunits: usize,
}

impl<'a, S: SequenceSource + ?Sized> WindowReader<'a, S> {
    pub fn new(source: &'a mut S, overlap: usize, block_length: usize) -> Self {
        WindowReader {
            source,
            overlap,
            block_length: block_length.max(1),
            seq_idx: 0,
            pos: 0,
            at_eof: false,
            n_targetseqs: None,
            seq_table: SeqLengthTable::new(),
            nunits: 0,
        }
    }

    /// End the stream after `n` complete sequences.
    pub fn restrict_sequences(&mut self, n: usize) {
        self.n_targetseqs = Some(n);
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn sequences_started(&self) -> usize {
        self.seq_table.len()
    }

    /// Refill `unit` with the next windows of the stream and return how many it got.
    /// Zero means the stream is exhausted.
    pub fn fill_block(&mut self, unit: &mut WorkUnit) -> Result<usize> {
        unit.reset();
        if self.at_eof {
            return Ok(0);
        }
        let mut budget = self.block_length;
        while budget > 0 {
            if self.pos == 0 {
                if let Some(n) = self.n_targetseqs {
                    if self.seq_idx >= n {
                        log::info!("stop after {} target sequences", n);
                        self.at_eof = true;
                        break;
                    }
                }
            }
            let offset = self.pos.saturating_sub(self.overlap);
            let carried = self.pos - offset;
            let max_residues = budget + carried;

            let window = unit.next_slot();
            let status = self
                .source
                .read_window(offset, max_residues, &mut window.residues)?;
            match status {
                ReadStatus::Eof => {
                    unit.pop_slot();
                    if self.pos != 0 {
                        return Err(ScanError::format(
                            self.seq_idx,
                            self.pos,
                            "end of stream inside a sequence",
                        ));
                    }
                    self.at_eof = true;
                    break;
                }
                ReadStatus::Window { is_tail } => {
                    let n = window.residues.len();
                    if n > max_residues || n < carried {
                        return Err(ScanError::format(
                            self.seq_idx,
                            offset,
                            format!(
                                "source returned {} residues, expected {}..={}",
                                n, carried, max_residues
                            ),
                        ));
                    }
                    let fresh = n - carried;
                    if fresh == 0 && !is_tail {
                        return Err(ScanError::format(
                            self.seq_idx,
                            offset,
                            "no new residues before the end of the sequence",
                        ));
                    }
                    window.seq_idx = self.seq_idx;
                    window.start = offset + 1;
                    window.overlap = carried;
                    window.is_tail = is_tail;
                    self.seq_table
                        .record(self.seq_idx, self.source.name(), offset + n);
                    budget -= fresh;

                    if is_tail {
                        self.seq_idx += 1;
                        self.pos = 0;
                    } else {
                        // the source stopped short of the end, so the budget is used up
                        self.pos = offset + n;
                        unit.complete = false;
                        break;
                    }
                }
            }
        }
        if unit.len() > 0 {
            self.nunits += 1;
            log::debug!(
                "unit {}: {} windows, {} new residues, complete: {}",
                self.nunits,
                unit.len(),
                unit.fresh_residues(),
                unit.complete
            );
        }
        Ok(unit.len())
    }

    pub fn seq_table(&self) -> &SeqLengthTable {
        &self.seq_table
    }

    pub fn into_seq_table(self) -> SeqLengthTable {
        self.seq_table
    }
}

/// in-memory sequences, mostly for tests and small inputs
pub struct MemorySource {
    seqs: Vec<(String, Vec<u8>)>,
    cur: usize,
    last: usize,
}

impl MemorySource {
    pub fn new(seqs: Vec<(String, Vec<u8>)>) -> Self {
        MemorySource {
            seqs,
            cur: 0,
            last: 0,
        }
    }
}

impl SequenceSource for MemorySource {
    fn read_window(
        &mut self,
        offset: usize,
        max_residues: usize,
        buf: &mut Vec<u8>,
    ) -> Result<ReadStatus> {
        if self.cur >= self.seqs.len() {
            if offset == 0 {
                return Ok(ReadStatus::Eof);
            }
            return Err(ScanError::format(self.cur, offset, "read past the last sequence"));
        }
        let seq = &self.seqs[self.cur].1;
        if offset > seq.len() {
            return Err(ScanError::format(
                self.cur,
                offset,
                format!("offset beyond sequence length {}", seq.len()),
            ));
        }
        let end = seq.len().min(offset + max_residues);
        buf.extend_from_slice(&seq[offset..end]);
        self.last = self.cur;
        let is_tail = end == seq.len();
        if is_tail {
            self.cur += 1;
        }
        Ok(ReadStatus::Window { is_tail })
    }

    fn name(&self) -> &str {
        self.seqs.get(self.last).map(|s| s.0.as_str()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(lens: &[usize]) -> MemorySource {
        MemorySource::new(
            lens.iter()
                .enumerate()
                .map(|(i, &l)| {
                    let s = (0..l).map(|p| b"ACGT"[(p * 7 + i) % 4]).collect::<Vec<u8>>();
                    (format!("seq{}", i), s)
                })
                .collect(),
        )
    }

    fn all_units<S: SequenceSource>(reader: &mut WindowReader<S>) -> Vec<Vec<Window>> {
        let mut units = Vec::new();
        let mut unit = WorkUnit::new();
        while reader.fill_block(&mut unit).unwrap() > 0 {
            units.push(unit.windows().to_vec());
        }
        units
    }

    #[test]
    fn short_sequences_share_a_unit() {
        let mut src = source(&[10, 20, 30]);
        let mut reader = WindowReader::new(&mut src, 4, 100);
        let units = all_units(&mut reader);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].len(), 3);
        assert!(units[0].iter().all(|w| w.is_tail && w.start == 1 && w.overlap == 0));
        let table = reader.into_seq_table();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(1).unwrap().length, 20);
        assert_eq!(table.get(2).unwrap().name, "seq2");
    }

    #[test]
    fn long_sequence_windows_overlap_without_gaps() {
        let mut src = source(&[1000]);
        let overlap = 29;
        let mut reader = WindowReader::new(&mut src, overlap, 128);
        let units = all_units(&mut reader);
        let windows: Vec<Window> = units.into_iter().flatten().collect();
        assert!(windows.len() > 1);

        let mut covered = 0;
        let mut fresh_total = 0;
        for (i, w) in windows.iter().enumerate() {
            assert!(w.fresh() <= 128);
            if i == 0 {
                assert_eq!(w.start, 1);
                assert_eq!(w.overlap, 0);
            } else {
                // the window starts `overlap` residues before the previous end
                assert_eq!(w.start, covered + 1 - w.overlap);
                assert_eq!(w.overlap, overlap.min(covered));
            }
            covered = w.end();
            fresh_total += w.fresh();
            assert_eq!(w.is_tail, i + 1 == windows.len());
        }
        assert_eq!(covered, 1000);
        assert_eq!(fresh_total, 1000);
    }

    #[test]
    fn provisional_length_is_overwritten_by_tail() {
        let mut src = source(&[300]);
        let mut reader = WindowReader::new(&mut src, 9, 100);
        let mut unit = WorkUnit::new();
        reader.fill_block(&mut unit).unwrap();
        assert!(!unit.complete);
        assert_eq!(reader.seq_table().get(0).unwrap().length, 100);
        while reader.fill_block(&mut unit).unwrap() > 0 {}
        assert_eq!(reader.seq_table().len(), 1);
        assert_eq!(reader.seq_table().get(0).unwrap().length, 300);
    }

    #[test]
    fn zero_length_sequence_gets_a_tail_window() {
        let mut src = source(&[5, 0, 5]);
        let mut reader = WindowReader::new(&mut src, 3, 100);
        let units = all_units(&mut reader);
        assert_eq!(units[0].len(), 3);
        assert!(units[0][1].is_empty() && units[0][1].is_tail);
        assert_eq!(reader.seq_table().get(1).unwrap().length, 0);
    }

    #[test]
    fn sequence_shorter_than_overlap_is_one_window() {
        let mut src = source(&[12]);
        let mut reader = WindowReader::new(&mut src, 50, 1000);
        let units = all_units(&mut reader);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].len(), 1);
        assert_eq!(units[0][0].len(), 12);
    }

    #[test]
    fn tiny_blocks_still_make_progress() {
        // block smaller than the overlap: each window adds a few residues
        let mut src = source(&[40]);
        let mut reader = WindowReader::new(&mut src, 15, 4);
        let windows: Vec<Window> = all_units(&mut reader).into_iter().flatten().collect();
        assert_eq!(windows.len(), 10);
        assert_eq!(windows.iter().map(|w| w.fresh()).sum::<usize>(), 40);
        assert!(windows.iter().all(|w| w.overlap <= 15));
    }

    #[test]
    fn restricted_number_of_sequences() {
        let mut src = source(&[10, 10, 10, 10]);
        let mut reader = WindowReader::new(&mut src, 3, 15);
        reader.restrict_sequences(2);
        let windows: Vec<Window> = all_units(&mut reader).into_iter().flatten().collect();
        assert!(windows.iter().all(|w| w.seq_idx < 2));
        assert_eq!(reader.seq_table().len(), 2);
    }

    #[test]
    fn empty_source_ends_immediately() {
        let mut src = MemorySource::new(vec![]);
        let mut reader = WindowReader::new(&mut src, 3, 15);
        let mut unit = WorkUnit::new();
        assert_eq!(reader.fill_block(&mut unit).unwrap(), 0);
        assert!(unit.is_terminal());
        assert_eq!(reader.fill_block(&mut unit).unwrap(), 0);
    }

    struct Stuck;
    impl SequenceSource for Stuck {
        fn read_window(&mut self, _o: usize, _m: usize, _b: &mut Vec<u8>) -> Result<ReadStatus> {
            Ok(ReadStatus::Window { is_tail: false })
        }
        fn name(&self) -> &str {
            "stuck"
        }
    }

    #[test]
    fn a_source_without_progress_is_a_format_error() {
        let mut src = Stuck;
        let mut reader = WindowReader::new(&mut src, 3, 15);
        let mut unit = WorkUnit::new();
        let r = reader.fill_block(&mut unit);
        assert!(matches!(r, Err(ScanError::Format { seq_idx: 0, .. })));
    }
}
