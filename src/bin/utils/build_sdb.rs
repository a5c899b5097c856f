// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]

use super::error::{Result, ScanError};
use super::fastx::{open_fastx_file, SeqRec};
use super::seqdb::encode_seq;
use rayon::prelude::*;
use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};

// records encoded in parallel per batch
const BATCH_BASES: usize = 1 << 26;

struct DbWriter {
    db: BufWriter<File>,
    idx: BufWriter<File>,
    seq_id: usize,
    start: usize,
}

impl DbWriter {
    fn write_batch(&mut self, batch: &mut Vec<SeqRec>) -> Result<()> {
        let encoded = batch
            .par_iter()
            .map(|r| encode_seq(&r.seq))
            .collect::<Vec<Vec<u8>>>();
        for (rec, s) in batch.iter().zip(encoded.iter()) {
            self.db.write_all(s)?;
            writeln!(
                self.idx,
                "{:09} {} {} {}",
                self.seq_id,
                String::from_utf8_lossy(&rec.id),
                s.len(),
                self.start
            )?;
            self.start += s.len();
            self.seq_id += 1;
        }
        batch.clear();
        Ok(())
    }
}

/// Given a list of FASTA/FASTQ files (plain or gzip) in `seq_list_file`, one per
/// line, write `<out_prefix>.seqdb` and `<out_prefix>.idx`. Sequences shorter than
/// `min_length` are skipped. Returns the number of sequences and bases written.
pub fn build(seq_list_file: &str, out_prefix: &str, min_length: usize) -> Result<(usize, usize)> {
    let seqdb_name = format!("{}.seqdb", out_prefix);
    log::info!("create seq db: {}", seqdb_name);
    let seqidx_name = format!("{}.idx", out_prefix);
    log::info!("create seq index: {}", seqidx_name);
    let mut out = DbWriter {
        db: BufWriter::new(File::create(seqdb_name)?),
        idx: BufWriter::new(File::create(seqidx_name)?),
        seq_id: 0,
        start: 0,
    };

    log::info!("get input files from: {}", seq_list_file);
    let seq_list_buf = BufReader::new(File::open(seq_list_file)?);

    let mut skipped = 0_usize;
    for fastx_file in seq_list_buf.lines() {
        let input_fn = fastx_file?;
        let input_fn = input_fn.trim();
        if input_fn.is_empty() {
            continue;
        }
        log::info!("input file: {}", input_fn);
        let mut fastx_reader = open_fastx_file(input_fn)?;
        let mut batch = Vec::<SeqRec>::new();
        let mut batch_bases = 0_usize;
        let mut nrec = 0_usize;
        while let Some(r) = fastx_reader.next_rec() {
            let r = r.map_err(|e| {
                ScanError::format(nrec, 0, format!("{}: {}", input_fn, e))
            })?;
            nrec += 1;
            if r.seq.len() < min_length {
                skipped += 1;
                continue;
            }
            batch_bases += r.seq.len();
            batch.push(r);
            if batch_bases >= BATCH_BASES {
                out.write_batch(&mut batch)?;
                batch_bases = 0;
            }
        }
        out.write_batch(&mut batch)?;
    }
    out.db.flush()?;
    out.idx.flush()?;

    log::info!("total number of sequences indexed: {}", out.seq_id);
    log::info!("total number of bases: {}", out.start);
    if skipped > 0 {
        log::info!("sequences shorter than {} skipped: {}", min_length, skipped);
    }
    if out.seq_id > 0 {
        log::info!(
            "average sequence length: {}",
            out.start as f32 / out.seq_id as f32
        );
    }
    Ok((out.seq_id, out.start))
}

#[cfg(test)]
mod tests {
    use super::super::seqdb::{read_seq_index, SeqDbSource};
    use super::super::window_reader::{ReadStatus, SequenceSource};
    use super::*;

    #[test]
    fn build_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let fa = dir.path().join("a.fa");
        std::fs::write(&fa, b">s1 first\nACGT\nNNAC\n>short\nAC\n").unwrap();
        let fq = dir.path().join("b.fq");
        std::fs::write(&fq, b"@s2\nttgca\n+\nIIIII\n").unwrap();
        let list = dir.path().join("list");
        std::fs::write(&list, format!("{}\n\n{}\n", fa.display(), fq.display())).unwrap();
        let prefix = dir.path().join("db").display().to_string();

        let (nseqs, nbases) = build(&list.display().to_string(), &prefix, 3).unwrap();
        assert_eq!((nseqs, nbases), (2, 13));

        let idx = read_seq_index(format!("{}.idx", prefix)).unwrap();
        assert_eq!(idx.len(), 2);
        assert_eq!((idx[1].name.as_str(), idx[1].start, idx[1].len), ("s2", 8, 5));

        let mut src =
            SeqDbSource::open(format!("{}.seqdb", prefix), format!("{}.idx", prefix)).unwrap();
        let mut buf = Vec::new();
        src.read_window(0, 100, &mut buf).unwrap();
        assert_eq!(buf, b"ACGTNNAC".to_vec());
        buf.clear();
        src.read_window(0, 100, &mut buf).unwrap();
        assert_eq!(buf, b"TTGCA".to_vec());
        assert_eq!(src.name(), "s2");
        assert_eq!(src.read_window(0, 100, &mut buf).unwrap(), ReadStatus::Eof);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("list");
        std::fs::write(&list, "/no/such/file.fa\n").unwrap();
        let prefix = dir.path().join("db").display().to_string();
        assert!(build(&list.display().to_string(), &prefix, 0).is_err());
    }
}
