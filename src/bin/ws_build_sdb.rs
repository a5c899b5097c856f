// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

const VERSION_STRING: &'static str = env!("VERSION_STRING");

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::clap_app;
use simple_logger::SimpleLogger;
use std::io::{self, Write};
mod utils;
use utils::build_sdb::build;
use utils::error::ScanError;
use utils::log_resource;

fn main() -> () {
    let matches = clap_app!(ws_build_sdb =>
        (version: VERSION_STRING)
        (author: "Jason Chin <jason@omnibio.ai>")
        (about: "
ws_build_sdb: build the sequence database scanned by ws_scan
LICENSE: http://creativecommons.org/licenses/by-nc-sa/4.0/")
        (@arg input: --input +required +takes_value "Path to a file that contains the list of sequence files in .fa .fa.gz .fastq or fastq.gz formats")
        (@arg out_prefix: --out_prefix +required +takes_value "The prefix for the sequence database and index files")
        (@arg min_length: --min_length +takes_value "Skip sequences shorter than this [default: 0]")
        (@arg log: --log +takes_value "log level: DBBUG or INFO (default)")
    ).get_matches();

    let log_level = match matches.value_of("log").unwrap_or("INFO") {
        "DEBUG" => log::LevelFilter::Debug,
        _ => log::LevelFilter::Info,
    };

    let logger = SimpleLogger::new()
        .with_level(log_level)
        .with_utc_timestamps()
        .init();
    if let Err(e) = logger {
        let _ = writeln!(io::stderr(), "fail to initialize the logger: {}", e);
    }

    let seq_list_file = matches.value_of("input").unwrap_or("");
    let out_prefix = matches.value_of("out_prefix").unwrap_or("");
    let min_length = matches.value_of("min_length").unwrap_or("0");

    log_resource("BGN: building sequence database");
    let res = min_length
        .parse::<usize>()
        .map_err(|_| ScanError::config(format!("invalid --min_length '{}'", min_length)))
        .and_then(|min_length| build(seq_list_file, out_prefix, min_length));
    match res {
        Ok((nseqs, nbases)) => {
            log::info!("seqdb {}: {} sequences, {} bases", out_prefix, nseqs, nbases);
            log_resource("END: building sequence database");
        }
        Err(e) => {
            log::error!("ws_build_sdb: {}", e);
            std::process::exit(1);
        }
    }
}
