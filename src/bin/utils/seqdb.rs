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
// the sequence database written by `ws_build_sdb`
//
// `<prefix>.seqdb` holds one byte per base: the low 4 bits code the base, the high
// 4 bits code its complement (A = 0, C = 1, G = 2, T = 3, anything else = 12).
// `<prefix>.idx` has one line per sequence: `<id:09> <name> <length> <start>`.
//

use super::error::{Result, ScanError};
use super::window_reader::{ReadStatus, SequenceSource};
use memmap::{Mmap, MmapOptions};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{self, BufRead};
use std::path::Path;

pub const N_CODE: u8 = 0b1100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqIndexRecord {
    pub name: String,
    pub start: usize,
    pub len: usize,
}

fn read_lines<P>(filename: P) -> io::Result<io::Lines<io::BufReader<File>>>
where
    P: AsRef<Path>,
{
    let file = File::open(filename)?;
    Ok(io::BufReader::new(file).lines())
}

/// Parse a seqdb index. Errors carry the line number (as `seq_idx`).
pub fn read_seq_index<P: AsRef<Path>>(path: P) -> Result<Vec<SeqIndexRecord>> {
    let mut index = Vec::<SeqIndexRecord>::new();
    for (line_no, line) in read_lines(path)?.enumerate() {
        let rec = line?;
        if rec.trim().is_empty() {
            continue;
        }
        // the record line looks like 000000023 chr1 20359 467415
        let v: Vec<&str> = rec.split_whitespace().collect();
        if v.len() < 4 {
            return Err(ScanError::format(
                line_no,
                0,
                format!("index line {} has {} fields, expect 4", line_no + 1, v.len()),
            ));
        }
        let len: usize = v[2].parse().map_err(|_| {
            ScanError::format(line_no, 0, format!("bad length '{}' on index line {}", v[2], line_no + 1))
        })?;
        let start: usize = v[3].parse().map_err(|_| {
            ScanError::format(line_no, 0, format!("bad start '{}' on index line {}", v[3], line_no + 1))
        })?;
        index.push(SeqIndexRecord {
            name: v[1].to_string(),
            start,
            len,
        });
    }
    Ok(index)
}

fn base_code(b: u8) -> u8 {
    match b {
        b'A' | b'a' => 0,
        b'C' | b'c' => 1,
        b'G' | b'g' => 2,
        b'T' | b't' => 3,
        _ => N_CODE,
    }
}

/// forward code in the low nibble, complement code in the high nibble
pub fn encode_base(b: u8) -> u8 {
    let f = base_code(b);
    let r = if f == N_CODE { N_CODE } else { f ^ 0b0011 };
    (r << 4) | f
}

pub fn encode_seq(seq: &[u8]) -> Vec<u8> {
    seq.iter().map(|&b| encode_base(b)).collect()
}

pub fn decode_base(code: u8) -> Option<u8> {
    match code & 0x0F {
        0 => Some(b'A'),
        1 => Some(b'C'),
        2 => Some(b'G'),
        3 => Some(b'T'),
        N_CODE => Some(b'N'),
        _ => None,
    }
}

pub struct SeqDbSource {
    // None for an empty database, which can not be mapped
    seqdb: Option<Mmap>,
    index: Vec<SeqIndexRecord>,
    name_to_idx: FxHashMap<String, usize>,
    cur: usize,
    last: usize,
    started: bool,
}

impl SeqDbSource {
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(seqdb_file: P, index_file: Q) -> Result<Self> {
        let seqdb_file = seqdb_file.as_ref();
        let index = read_seq_index(index_file.as_ref()).map_err(|e| match e {
            ScanError::Io(e) => ScanError::setup(format!(
                "can not read index {}: {}",
                index_file.as_ref().display(),
                e
            )),
            e => e,
        })?;
        let f = File::open(seqdb_file).map_err(|e| {
            ScanError::setup(format!("can not open seqdb {}: {}", seqdb_file.display(), e))
        })?;
        let db_len = f.metadata()?.len() as usize;
        let seqdb = if db_len == 0 {
            None
        } else {
            Some(unsafe { MmapOptions::new().map(&f)? })
        };

        let mut name_to_idx = FxHashMap::<String, usize>::default();
        for (i, rec) in index.iter().enumerate() {
            if rec.start + rec.len > db_len {
                return Err(ScanError::format(
                    i,
                    rec.start,
                    format!(
                        "sequence {} ({} bases) runs past the end of the seqdb ({} bytes)",
                        rec.name, rec.len, db_len
                    ),
                ));
            }
            name_to_idx.entry(rec.name.clone()).or_insert(i);
        }
        log::info!(
            "seqdb {}: {} sequences, {} bytes",
            seqdb_file.display(),
            index.len(),
            db_len
        );
        Ok(SeqDbSource {
            seqdb,
            index,
            name_to_idx,
            cur: 0,
            last: 0,
            started: false,
        })
    }

    pub fn n_seqs(&self) -> usize {
        self.index.len()
    }

    pub fn records(&self) -> &[SeqIndexRecord] {
        &self.index
    }

    /// Start the stream at the sequence called `name`. Only valid before the first read.
    pub fn position_by_name(&mut self, name: &str) -> Result<usize> {
        if self.started {
            return Err(ScanError::setup("can not reposition a seqdb after reading started"));
        }
        let idx = *self
            .name_to_idx
            .get(name)
            .ok_or_else(|| ScanError::config(format!("sequence {} not in the seqdb index", name)))?;
        log::info!("start at sequence {} (#{})", name, idx);
        self.cur = idx;
        self.last = idx;
        Ok(idx)
    }

    fn bytes(&self, rec: &SeqIndexRecord) -> &[u8] {
        match &self.seqdb {
            Some(m) => &m[rec.start..rec.start + rec.len],
            None => &[],
        }
    }
}

impl SequenceSource for SeqDbSource {
    fn read_window(
        &mut self,
        offset: usize,
        max_residues: usize,
        buf: &mut Vec<u8>,
    ) -> Result<ReadStatus> {
        self.started = true;
        let cur = self.cur;
        let rec = match self.index.get(cur) {
            Some(rec) => rec,
            None if offset == 0 => return Ok(ReadStatus::Eof),
            None => return Err(ScanError::format(cur, offset, "read past the last sequence")),
        };
        if offset > rec.len {
            return Err(ScanError::format(
                cur,
                offset,
                format!("offset beyond sequence length {}", rec.len),
            ));
        }
        let end = rec.len.min(offset + max_residues);
        let codes = &self.bytes(rec)[offset..end];
        buf.reserve(codes.len());
        for (i, &c) in codes.iter().enumerate() {
            match decode_base(c) {
                Some(b) => buf.push(b),
                None => {
                    return Err(ScanError::format(
                        cur,
                        offset + i,
                        format!("invalid base code {:#04x} in {}", c, rec.name),
                    ))
                }
            }
        }
        let is_tail = end == rec.len;
        self.last = cur;
        if is_tail {
            self.cur += 1;
        }
        Ok(ReadStatus::Window { is_tail })
    }

    fn name(&self) -> &str {
        self.index
            .get(self.last)
            .map(|r| r.name.as_str())
            .unwrap_or("")
    }
}
