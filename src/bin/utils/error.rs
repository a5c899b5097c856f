// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

//
// error type shared by the scan pipeline
//

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// queue / pool / database could not be set up; nothing has been started
    #[error("setup error: {message}")]
    Setup { message: String },

    /// malformed sequence data; the whole run is aborted
    #[error("format error at sequence {seq_idx}, offset {offset}: {message}")]
    Format {
        seq_idx: usize,
        offset: usize,
        message: String,
    },

    /// coordinate or queue bookkeeping went wrong
    #[error("internal consistency error (worker {worker:?}, sequence {seq_idx:?}): {message}")]
    Internal {
        worker: Option<usize>,
        seq_idx: Option<usize>,
        message: String,
    },

    #[error("configuration error: {message}")]
    Config { message: String },
}

pub type Result<T> = std::result::Result<T, ScanError>;

impl ScanError {
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }

    pub fn format(seq_idx: usize, offset: usize, message: impl Into<String>) -> Self {
        Self::Format {
            seq_idx,
            offset,
            message: message.into(),
        }
    }

    pub fn internal(
        worker: Option<usize>,
        seq_idx: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        Self::Internal {
            worker,
            seq_idx,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_reports_position() {
        let e = ScanError::format(3, 1024, "invalid residue code 7");
        let msg = format!("{}", e);
        assert!(msg.contains("sequence 3"));
        assert!(msg.contains("offset 1024"));
    }

    #[test]
    fn io_errors_convert() {
        fn open_missing() -> Result<std::fs::File> {
            Ok(std::fs::File::open("/nonexistent/wscan/seqdb")?)
        }
        assert!(matches!(open_missing(), Err(ScanError::Io(_))));
    }
}
