// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]

pub mod build_sdb;
pub mod coords;
pub mod error;
pub mod fastx;
pub mod merge;
pub mod scan;
pub mod search;
pub mod seqdb;
pub mod window_reader;
pub mod work_queue;
pub mod worker_pool;
pub use core::mem::MaybeUninit;
pub use libc::{getrusage, rusage, RUSAGE_SELF, RUSAGE_THREAD};

use self::error::{Result, ScanError};

/// residues per work unit when `--block_length` is not given (1/4 Mb)
pub const BLOCK_LENGTH: usize = 1024 * 256;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StrandMode {
    Both,
    TopOnly,
    BottomOnly,
}

impl StrandMode {
    pub fn searches_forward(&self) -> bool {
        *self != StrandMode::BottomOnly
    }

    pub fn searches_reverse(&self) -> bool {
        *self != StrandMode::TopOnly
    }

    pub fn strand_count(&self) -> usize {
        match self {
            StrandMode::Both => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Parameters {
    // 0 runs the serial loop in the calling thread
    pub nthreads: u32,
    pub block_length: usize,
    pub strand: StrandMode,
    // stop after this many complete sequences
    pub n_targetseqs: Option<usize>,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            nthreads: num_cpus::get() as u32,
            block_length: BLOCK_LENGTH,
            strand: StrandMode::Both,
            n_targetseqs: None,
        }
    }
}

impl Parameters {
    pub fn validate(&self) -> Result<()> {
        if self.block_length == 0 {
            return Err(ScanError::config("block length must be at least 1 residue"));
        }
        if self.n_targetseqs == Some(0) {
            return Err(ScanError::config("the number of target sequences must be at least 1"));
        }
        Ok(())
    }
}

fn read_rusage(who: libc::c_int) -> rusage {
    let mut data = MaybeUninit::<rusage>::zeroed();
    unsafe {
        getrusage(who, data.as_mut_ptr());
        data.assume_init()
    }
}

fn tv_seconds(tv: &libc::timeval) -> f64 {
    tv.tv_sec as f64 + tv.tv_usec as f64 / 1e6
}

/// (user, system) CPU seconds spent by the calling thread
pub fn thread_cpu_time() -> (f64, f64) {
    let data = read_rusage(RUSAGE_THREAD);
    (tv_seconds(&data.ru_utime), tv_seconds(&data.ru_stime))
}

pub fn log_resource(msg: &str) -> (u64, u64, u64) {
    let data = read_rusage(RUSAGE_SELF);
    log::info!(
        "{} : (maxRSS, utime, stime): {} {} {}",
        msg,
        data.ru_maxrss,
        data.ru_utime.tv_sec,
        data.ru_stime.tv_sec
    );

    (
        data.ru_maxrss as u64,
        data.ru_utime.tv_sec as u64,
        data.ru_stime.tv_sec as u64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strand_modes() {
        assert!(StrandMode::Both.searches_forward() && StrandMode::Both.searches_reverse());
        assert!(!StrandMode::TopOnly.searches_reverse());
        assert!(!StrandMode::BottomOnly.searches_forward());
        assert_eq!(StrandMode::Both.strand_count(), 2);
        assert_eq!(StrandMode::TopOnly.strand_count(), 1);
    }

    #[test]
    fn parameter_validation() {
        let p = Parameters::default();
        assert!(p.nthreads >= 1);
        assert!(p.validate().is_ok());
        let bad = Parameters {
            block_length: 0,
            ..p
        };
        assert!(matches!(bad.validate(), Err(ScanError::Config { .. })));
        let bad = Parameters {
            n_targetseqs: Some(0),
            ..p
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn thread_time_is_monotonic() {
        let (u0, s0) = thread_cpu_time();
        let mut x = 0_u64;
        for i in 0..1_000_000_u64 {
            x = x.wrapping_add(i * i);
        }
        assert!(x > 0);
        let (u1, s1) = thread_cpu_time();
        assert!(u1 + s1 >= u0 + s0);
    }
}
