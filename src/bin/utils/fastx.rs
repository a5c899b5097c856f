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
use super::window_reader::{ReadStatus, SequenceSource};
use flate2::bufread::MultiGzDecoder;
use std::fs::File;
use std::io::prelude::*;
use std::io::{self, BufReader, SeekFrom};
use std::path::Path;

pub struct SeqRec {
    pub id: Vec<u8>,
    pub seq: Vec<u8>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Fastx {
    FastQ,
    FastA,
    Empty,
}

pub struct FastxReader<R> {
    // struct for reading different file types
    inner: R,
    t: Fastx,
    line: Vec<u8>,
    // a FASTA header read while collecting the previous record
    next_header: Option<Vec<u8>>,
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

// the id runs up to the first white space
fn parse_id(header: &[u8]) -> Vec<u8> {
    header[1..]
        .split(|c| c.is_ascii_whitespace())
        .next()
        .unwrap_or(&[])
        .to_vec()
}

fn trim_eol(line: &mut Vec<u8>) {
    while let Some(&c) = line.last() {
        if c == b'\n' || c == b'\r' {
            line.pop();
        } else {
            break;
        }
    }
}

impl<R: BufRead> FastxReader<R> {
    pub fn new(mut inner: R, filename: &str) -> io::Result<Self> {
        // peek the file to decide if it is fasta or fastq
        let t = match inner.fill_buf()?.first() {
            None => {
                log::info!("input file: {} is empty", filename);
                Fastx::Empty
            }
            Some(b'>') => Fastx::FastA,
            Some(b'@') => Fastx::FastQ,
            Some(c) => {
                return Err(invalid_data(format!(
                    "{}: expect '>' or '@' at the start, found '{}'",
                    filename, *c as char
                )))
            }
        };
        Ok(Self {
            inner,
            t,
            line: Vec::<u8>::with_capacity(512),
            next_header: None,
        })
    }

    pub fn next_rec(&mut self) -> Option<io::Result<SeqRec>> {
        match self.t {
            Fastx::FastA => self.fasta_next_rec(),
            Fastx::FastQ => self.fastq_next_rec(),
            Fastx::Empty => None,
        }
    }

    fn read_line(&mut self) -> io::Result<bool> {
        self.line.clear();
        let n = self.inner.read_until(b'\n', &mut self.line)?;
        trim_eol(&mut self.line);
        Ok(n > 0)
    }

    fn fasta_next_rec(&mut self) -> Option<io::Result<SeqRec>> {
        let header = match self.next_header.take() {
            Some(h) => h,
            None => loop {
                match self.read_line() {
                    Ok(false) => return None,
                    Ok(true) if self.line.is_empty() => continue,
                    Ok(true) => break self.line.clone(),
                    Err(e) => return Some(Err(e)),
                }
            },
        };
        if header[0] != b'>' {
            return Some(Err(invalid_data(format!(
                "expect a FASTA header, found '{}'",
                String::from_utf8_lossy(&header)
            ))));
        }
        let id = parse_id(&header);
        let mut seq = Vec::<u8>::with_capacity(1 << 14);
        loop {
            match self.read_line() {
                Ok(false) => break,
                Ok(true) => {
                    if self.line.first() == Some(&b'>') {
                        self.next_header = Some(self.line.clone());
                        break;
                    }
                    seq.extend(self.line.iter().filter(|c| !c.is_ascii_whitespace()));
                }
                Err(e) => return Some(Err(e)),
            }
        }
        Some(Ok(SeqRec { id, seq }))
    }

    fn fastq_next_rec(&mut self) -> Option<io::Result<SeqRec>> {
        // QV strings are ignored
        loop {
            match self.read_line() {
                Ok(false) => return None,
                Ok(true) if self.line.is_empty() => continue,
                Ok(true) => break,
                Err(e) => return Some(Err(e)),
            }
        }
        if self.line[0] != b'@' {
            return Some(Err(invalid_data(format!(
                "expect a FASTQ header, found '{}'",
                String::from_utf8_lossy(&self.line)
            ))));
        }
        let id = parse_id(&self.line);
        let mut fields = Vec::<Vec<u8>>::with_capacity(3);
        for _ in 0..3 {
            match self.read_line() {
                Ok(true) => fields.push(self.line.clone()),
                Ok(false) => {
                    return Some(Err(invalid_data(format!(
                        "truncated FASTQ record {}",
                        String::from_utf8_lossy(&id)
                    ))))
                }
                Err(e) => return Some(Err(e)),
            }
        }
        if fields[1].first() != Some(&b'+') || fields[2].len() != fields[0].len() {
            return Some(Err(invalid_data(format!(
                "malformed FASTQ record {}",
                String::from_utf8_lossy(&id)
            ))));
        }
        let seq = fields.swap_remove(0);
        Some(Ok(SeqRec { id, seq }))
    }
}

/// Open a FASTA/FASTQ file, plain or gzip-compressed.
pub fn open_fastx_file<P: AsRef<Path>>(path: P) -> io::Result<FastxReader<Box<dyn BufRead + Send>>> {
    let path = path.as_ref();
    let input_fn = path.display().to_string();
    let mut reader = BufReader::new(File::open(path)?);
    let mut is_gzfile = false;
    {
        let r = reader.by_ref();
        let mut buf = Vec::<u8>::new();
        r.take(2).read_to_end(&mut buf)?;
        if buf == [0x1F_u8, 0x8B_u8] {
            log::info!("input file: {} detected as gz-compressed file", input_fn);
            is_gzfile = true;
        }
    }
    reader.seek(SeekFrom::Start(0))?;
    let inner: Box<dyn BufRead + Send> = if is_gzfile {
        Box::new(BufReader::new(MultiGzDecoder::new(reader)))
    } else {
        Box::new(reader)
    };
    FastxReader::new(inner, &input_fn)
}

/// Streams the records of a FASTA/FASTQ reader as a `SequenceSource`. Only the
/// record being windowed is held in memory.
pub struct FastxSource<R> {
    reader: FastxReader<R>,
    current: Option<Vec<u8>>,
    name: String,
    seq_idx: usize,
}

impl<R: BufRead> FastxSource<R> {
    pub fn new(reader: FastxReader<R>) -> Self {
        FastxSource {
            reader,
            current: None,
            name: String::new(),
            seq_idx: 0,
        }
    }

    // skip records before the one called `name`
    pub fn skip_to(&mut self, name: &str) -> Result<usize> {
        let mut skipped = 0_usize;
        loop {
            match self.reader.next_rec() {
                None => {
                    return Err(ScanError::config(format!("sequence {} not found", name)));
                }
                Some(rec) => {
                    let rec = self.load_error(rec)?;
                    if rec.id == name.as_bytes() {
                        self.name = name.to_string();
                        self.current = Some(rec.seq);
                        return Ok(skipped);
                    }
                    skipped += 1;
                }
            }
        }
    }

    fn load_error(&self, rec: io::Result<SeqRec>) -> Result<SeqRec> {
        rec.map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => ScanError::format(self.seq_idx, 0, e.to_string()),
            _ => ScanError::Io(e),
        })
    }
}

impl<R: BufRead> SequenceSource for FastxSource<R> {
    fn read_window(
        &mut self,
        offset: usize,
        max_residues: usize,
        buf: &mut Vec<u8>,
    ) -> Result<ReadStatus> {
        if self.current.is_none() {
            if offset != 0 {
                return Err(ScanError::format(
                    self.seq_idx,
                    offset,
                    "read past the end of a record",
                ));
            }
            match self.reader.next_rec() {
                None => return Ok(ReadStatus::Eof),
                Some(rec) => {
                    let rec = self.load_error(rec)?;
                    self.name = String::from_utf8_lossy(&rec.id).into_owned();
                    self.current = Some(rec.seq);
                }
            }
        }
        let seq = match &self.current {
            Some(seq) => seq,
            None => return Ok(ReadStatus::Eof),
        };
        if offset > seq.len() {
            return Err(ScanError::format(
                self.seq_idx,
                offset,
                format!("offset beyond sequence length {}", seq.len()),
            ));
        }
        let end = seq.len().min(offset + max_residues);
        buf.extend(seq[offset..end].iter().map(|c| c.to_ascii_uppercase()));
        let is_tail = end == seq.len();
        if is_tail {
            self.current = None;
            self.seq_idx += 1;
        }
        Ok(ReadStatus::Window { is_tail })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn records<R: BufRead>(mut r: FastxReader<R>) -> Vec<(String, String)> {
        let mut out = Vec::new();
        while let Some(rec) = r.next_rec() {
            let rec = rec.unwrap();
            out.push((
                String::from_utf8(rec.id).unwrap(),
                String::from_utf8(rec.seq).unwrap(),
            ));
        }
        out
    }

    fn pair(id: &str, seq: &str) -> (String, String) {
        (id.to_string(), seq.to_string())
    }

    #[test]
    fn multi_line_fasta() {
        let data = b">r1 some description\nACGT\nacgt\n\n>r2\r\nTTTT\r\n>r3\n";
        let r = FastxReader::new(&data[..], "mem").unwrap();
        assert_eq!(
            records(r),
            vec![pair("r1", "ACGTacgt"), pair("r2", "TTTT"), pair("r3", "")]
        );
    }

    #[test]
    fn fastq_records() {
        let data = b"@q1 x\nACGTN\n+\nIIIII\n@q2\nGG\n+q2\n@@\n";
        let r = FastxReader::new(&data[..], "mem").unwrap();
        assert_eq!(records(r), vec![pair("q1", "ACGTN"), pair("q2", "GG")]);
    }

    #[test]
    fn malformed_input() {
        assert!(FastxReader::new(&b"ACGT\n"[..], "mem").is_err());
        let mut r = FastxReader::new(&b"@q1\nACGT\n+\nII\n"[..], "mem").unwrap();
        assert!(r.next_rec().unwrap().is_err());
        let mut r = FastxReader::new(&b"@q1\nACGT\n"[..], "mem").unwrap();
        assert!(r.next_rec().unwrap().is_err());
        let mut r = FastxReader::new(&b""[..], "mem").unwrap();
        assert!(r.next_rec().is_none());
    }

    #[test]
    fn gzip_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.fa.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(b">a\nACGTACGT\n>b\nCC\n").unwrap();
        enc.finish().unwrap();
        let r = open_fastx_file(&path).unwrap();
        assert_eq!(records(r), vec![pair("a", "ACGTACGT"), pair("b", "CC")]);

        let plain = dir.path().join("t.fa");
        std::fs::write(&plain, b">c\nGGG\n").unwrap();
        assert_eq!(records(open_fastx_file(&plain).unwrap()), vec![pair("c", "GGG")]);
    }

    #[test]
    fn windows_from_a_fasta_stream() {
        let data = b">a\nacgtacgtac\n>b\n>c\nTTNGG\n";
        let mut src = FastxSource::new(FastxReader::new(&data[..], "mem").unwrap());
        let mut buf = Vec::new();
        assert_eq!(
            src.read_window(0, 4, &mut buf).unwrap(),
            ReadStatus::Window { is_tail: false }
        );
        assert_eq!(buf, b"ACGT".to_vec());
        assert_eq!(src.name(), "a");
        buf.clear();
        assert_eq!(
            src.read_window(1, 100, &mut buf).unwrap(),
            ReadStatus::Window { is_tail: true }
        );
        assert_eq!(buf, b"CGTACGTAC".to_vec());
        buf.clear();
        assert_eq!(
            src.read_window(0, 100, &mut buf).unwrap(),
            ReadStatus::Window { is_tail: true }
        );
        assert!(buf.is_empty());
        assert_eq!(src.name(), "b");
        src.read_window(0, 100, &mut buf).unwrap();
        assert_eq!(buf, b"TTNGG".to_vec());
        assert_eq!(src.read_window(0, 100, &mut buf).unwrap(), ReadStatus::Eof);
        assert!(src.read_window(3, 100, &mut buf).is_err());
    }

    #[test]
    fn skip_to_a_named_record() {
        let data = b">a\nAAAA\n>b\nCCCC\n>c\nGGGG\n";
        let mut src = FastxSource::new(FastxReader::new(&data[..], "mem").unwrap());
        assert_eq!(src.skip_to("b").unwrap(), 1);
        let mut buf = Vec::new();
        src.read_window(0, 100, &mut buf).unwrap();
        assert_eq!(buf, b"CCCC".to_vec());
        assert_eq!(src.name(), "b");
        assert!(src.skip_to("zz").is_err());
    }
}
