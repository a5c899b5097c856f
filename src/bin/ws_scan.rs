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

use clap::{clap_app, ArgMatches};
use simple_logger::SimpleLogger;
use std::io::{self, BufWriter, Write};
use std::str::FromStr;
use std::sync::Arc;
mod utils;
use utils::error::{Result, ScanError};
use utils::fastx::{open_fastx_file, FastxSource};
use utils::merge::ScanResults;
use utils::scan::scan_database;
use utils::search::MotifModel;
use utils::seqdb::SeqDbSource;
use utils::{log_resource, Parameters, StrandMode, BLOCK_LENGTH};

fn parse_opt<T: FromStr>(matches: &ArgMatches, name: &str, default: T) -> Result<T> {
    match matches.value_of(name) {
        None => Ok(default),
        Some(v) => v
            .parse::<T>()
            .map_err(|_| ScanError::config(format!("invalid value '{}' for --{}", v, name))),
    }
}

fn get_parameters(matches: &ArgMatches) -> Result<Parameters> {
    let defaults = Parameters::default();
    let strand = match (matches.is_present("toponly"), matches.is_present("bottomonly")) {
        (true, true) => {
            return Err(ScanError::config(
                "--toponly and --bottomonly are mutually exclusive",
            ))
        }
        (true, false) => StrandMode::TopOnly,
        (false, true) => StrandMode::BottomOnly,
        (false, false) => StrandMode::Both,
    };
    let n_targetseqs = match matches.value_of("restrictdb_n") {
        None => None,
        Some(_) => Some(parse_opt::<usize>(matches, "restrictdb_n", 0)?),
    };
    let parameters = Parameters {
        nthreads: parse_opt(matches, "cpu", defaults.nthreads)?,
        block_length: parse_opt(matches, "block_length", BLOCK_LENGTH)?,
        strand,
        n_targetseqs,
    };
    parameters.validate()?;
    Ok(parameters)
}

fn get_model(matches: &ArgMatches) -> Result<MotifModel> {
    let motif = matches.value_of("MOTIF").unwrap_or("");
    let mismatches = parse_opt::<usize>(matches, "mismatches", 0)?;
    let model = MotifModel::new(motif, motif, mismatches)?;
    match matches.value_of("w_length") {
        None => Ok(model),
        Some(_) => {
            let w_length = parse_opt::<usize>(matches, "w_length", 0)?;
            model.with_max_length(w_length)
        }
    }
}

fn write_hits(results: &ScanResults) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    writeln!(
        out,
        "#target\tstrand\tali_from\tali_to\tenv_from\tenv_to\tsq_len\tscore"
    )?;
    for h in results.hits.iter() {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.1}",
            results.seq_name(h.seq_idx),
            h.strand.symbol(),
            h.ali_from,
            h.ali_to,
            h.env_from,
            h.env_to,
            h.seq_len,
            h.score
        )?;
    }
    out.flush()?;
    Ok(())
}

fn log_summary(results: &ScanResults) {
    let s = &results.summary;
    log::info!(
        "targets: {} sequences, {} residues ({} searched over strands), {} windows, {} units",
        s.nseqs,
        s.nres,
        s.strand_residues,
        s.nwindows,
        s.nunits
    );
    log::info!(
        "hits: {} reported, {} before duplicate removal",
        results.hits.len(),
        s.raw_hits
    );
    for w in s.workers.iter() {
        log::info!(
            "worker {}: units: {}, residues: {}, hits: {}, busy: {:.3} s, wait: {:.3} s, utime: {:.3} s, stime: {:.3} s",
            w.worker,
            w.units,
            w.residues,
            w.hits,
            w.busy.as_secs_f64(),
            w.wait.as_secs_f64(),
            w.user_time,
            w.sys_time
        );
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let parameters = get_parameters(matches)?;
    let model = Arc::new(get_model(matches)?);
    let target = matches.value_of("TARGET").unwrap_or("");
    let stkey = matches.value_of("restrictdb_stkey");

    log_resource("BGN: scan");
    let results = if matches.is_present("fastx") {
        let mut source = FastxSource::new(open_fastx_file(target)?);
        if let Some(name) = stkey {
            let skipped = source.skip_to(name)?;
            log::info!("start at sequence {}, {} sequences skipped", name, skipped);
        }
        scan_database(&mut source, model, &parameters)?
    } else {
        let seqdb_file = format!("{}.seqdb", target);
        let index_file = format!("{}.idx", target);
        let mut source = SeqDbSource::open(&seqdb_file, &index_file)?;
        if let Some(name) = stkey {
            source.position_by_name(name)?;
        }
        scan_database(&mut source, model, &parameters)?
    };
    log_summary(&results);
    write_hits(&results)?;
    log_resource("END: scan");
    Ok(())
}

fn main() -> () {
    let matches = clap_app!(ws_scan =>
        (version: VERSION_STRING)
        (author: "Jason Chin <jason@omnibio.ai>")
        (about: "
ws_scan: scan a nucleotide sequence database for a motif, both strands, in parallel
LICENSE: http://creativecommons.org/licenses/by-nc-sa/4.0/")
        (@arg MOTIF: +required "The motif to search for (A, C, G, T; N matches any base)")
        (@arg TARGET: +required "The prefix of the seqdb/idx files, or a FASTA/FASTQ(.gz) file with --fastx")
        (@arg fastx: --fastx "TARGET is a FASTA/FASTQ file instead of a seqdb prefix")
        (@arg cpu: --cpu +takes_value "Number of worker threads, 0 for a serial scan [default: all cores]")
        (@arg block_length: --block_length +takes_value "Residues per work unit [default: 262144]")
        (@arg toponly: --toponly "Only search the top (forward) strand")
        (@arg bottomonly: --bottomonly "Only search the bottom (reverse complement) strand")
        (@arg w_length: --w_length +takes_value "Maximum hit length, sets the window overlap [default: motif length]")
        (@arg mismatches: --mismatches +takes_value "Mismatches allowed in a hit [default: 0]")
        (@arg restrictdb_stkey: --restrictdb_stkey +takes_value "Start the scan at the sequence with this name")
        (@arg restrictdb_n: --restrictdb_n +takes_value "Stop after this many sequences")
        (@arg log: --log +takes_value "log level: DBBUG or INFO (default)")
    ).get_matches();

    let log_level = match matches.value_of("log").unwrap_or("INFO") {
        "DEBUG" => log::LevelFilter::Debug,
        _ => log::LevelFilter::Info,
    };

    // logs go to stderr, the hits to stdout
    let logger = SimpleLogger::new()
        .with_level(log_level)
        .with_utc_timestamps()
        .init();
    if let Err(e) = logger {
        let _ = writeln!(io::stderr(), "fail to initialize the logger: {}", e);
    }

    if let Err(e) = run(&matches) {
        log::error!("ws_scan: {}", e);
        std::process::exit(1);
    }
}
