//! Command-line decoder for ASTERIX CAT021/CAT048 recordings.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use asterix_core::config::{self, Config};
use asterix_core::types::{hex_encode, AsterixError, Result};
use asterix_core::{Decoder, Message};

mod input;
mod report;

#[derive(Parser)]
#[command(name = "asterix", version, about = "ASTERIX CAT021/CAT048 decoder")]
struct Cli {
    /// Config file (default: ~/.asterix-decode/config.yaml)
    #[arg(long, global = true, env = "ASTERIX_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging, overrides RUST_LOG and the config level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode messages and print a target summary
    Decode {
        /// Hex file (one message per line), binary recording with --binary, or - for stdin
        file: PathBuf,

        /// Input is a concatenated binary recording
        #[arg(short, long)]
        binary: bool,

        /// Print every decoded message instead of only the summary
        #[arg(short, long)]
        raw: bool,

        /// Only decode these categories (repeatable)
        #[arg(short = 'c', long = "category")]
        categories: Vec<u8>,

        /// Worker threads
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Decode messages and print every Comm-B register with its verdict
    Bds {
        /// Hex file, binary recording with --binary, or - for stdin
        file: PathBuf,

        /// Input is a concatenated binary recording
        #[arg(short, long)]
        binary: bool,

        /// Speed disagreement (kt) at which a BDS 5,0/6,0 reading is dropped
        #[arg(long)]
        threshold: Option<f64>,

        /// Decode only the layout named by the register's own code
        #[arg(long)]
        trust_declared: bool,
    },

    /// Convert a binary recording to hex lines
    Convert {
        /// Binary recording, or - for stdin
        file: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the active configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path).unwrap_or_else(|e| {
            eprintln!("Error loading config: {e}");
            std::process::exit(1);
        }),
        None => config::load_config(),
    };
    init_logging(&config.logging.level, cli.verbose);

    match cli.command {
        Commands::Decode {
            file,
            binary,
            raw,
            categories,
            jobs,
        } => {
            let mut config = config;
            if !categories.is_empty() {
                config.decode.categories = Some(categories);
            }
            if let Some(jobs) = jobs {
                config.decode.jobs = jobs.max(1);
            }
            cmd_decode(&config, &file, binary, raw);
        }
        Commands::Bds {
            file,
            binary,
            threshold,
            trust_declared,
        } => {
            let mut config = config;
            if let Some(threshold) = threshold {
                config.bds.threshold_kt = threshold;
            }
            config.bds.trust_declared |= trust_declared;
            cmd_bds(&config, &file, binary);
        }
        Commands::Convert { file, output } => cmd_convert(&file, output.as_deref()),
        Commands::Config { init } => cmd_config(&config, cli.config.as_deref(), init),
    }
}

fn init_logging(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

enum Input {
    Chunks(Vec<Vec<u8>>),
    Binary(Vec<u8>),
}

fn load_input(file: &Path, binary: bool) -> Input {
    let loaded = if binary {
        input::read_binary(file).map(Input::Binary)
    } else {
        input::read_hex_chunks(file).map(|(chunks, skipped)| {
            if skipped > 0 {
                warn!(skipped, "lines without a hex message were skipped");
            }
            Input::Chunks(chunks)
        })
    };
    loaded.unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", file.display());
        std::process::exit(1);
    })
}

/// Decode the whole input, preserving message order.
fn decode_input(decoder: &Decoder, input: &Input, jobs: usize) -> Vec<Result<Message>> {
    match input {
        Input::Binary(buf) if jobs <= 1 => decoder.stream(buf).collect(),
        Input::Binary(buf) => {
            let (frames, rest) = input::split_binary(buf);
            if !rest.is_empty() {
                warn!(bytes = rest.len(), "unframed bytes at end of recording");
            }
            decode_parallel(decoder, &frames, jobs)
        }
        Input::Chunks(chunks) => decode_parallel(decoder, chunks, jobs),
    }
}

/// Split `chunks` into `jobs` contiguous slices and decode them concurrently.
fn decode_parallel<T>(decoder: &Decoder, chunks: &[T], jobs: usize) -> Vec<Result<Message>>
where
    T: AsRef<[u8]> + Sync,
{
    if jobs <= 1 || chunks.len() < 2 {
        return decoder.decode_chunks(chunks).collect();
    }

    let size = chunks.len().div_ceil(jobs);
    std::thread::scope(|s| {
        let handles: Vec<_> = chunks
            .chunks(size)
            .map(|slice| s.spawn(move || decoder.decode_chunks(slice).collect::<Vec<_>>()))
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}

fn cmd_decode(config: &Config, file: &Path, binary: bool, raw: bool) {
    let input = load_input(file, binary);
    let decoder = config.decoder();
    info!(
        "Decoding: {} (categories {:?}, {} jobs)",
        file.display(),
        decoder.registry().categories(),
        config.decode.jobs
    );

    let results = decode_input(&decoder, &input, config.decode.jobs);

    let mut summary = report::Summary::new();
    for result in &results {
        if raw {
            print_raw(result);
        }
        summary.add(result);
    }
    info!(
        messages = summary.messages,
        records = summary.records,
        errors = summary.error_count(),
        "decode finished"
    );

    report::print_summary(&summary);
}

fn print_raw(result: &Result<Message>) {
    match result {
        Ok(msg) => {
            println!("{msg:?}");
            for rec in &msg.records {
                println!("  FSPEC {}", rec.fspec_bits());
            }
        }
        Err(err) => println!("error: {err}"),
    }
}

fn cmd_bds(config: &Config, file: &Path, binary: bool) {
    let input = load_input(file, binary);
    let decoder = config.decoder();
    info!(
        "Decoding Comm-B registers: {} (threshold {} kt, trust declared: {})",
        file.display(),
        config.bds.threshold_kt,
        config.bds.trust_declared
    );

    let messages: Vec<Message> = decode_input(&decoder, &input, config.decode.jobs)
        .into_iter()
        .filter_map(|result| match result {
            Ok(msg) => Some(msg),
            Err(AsterixError::LengthMismatch { message, .. }) => Some(*message),
            Err(_) => None,
        })
        .collect();

    let rows = report::collect_registers(&messages);
    report::print_registers(&rows);
}

// ---------------------------------------------------------------------------
// Convert / config
// ---------------------------------------------------------------------------

fn cmd_convert(file: &Path, output: Option<&Path>) {
    let buf = input::read_binary(file).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", file.display());
        std::process::exit(1);
    });

    let (messages, rest) = input::split_binary(&buf);
    if !rest.is_empty() {
        warn!(bytes = rest.len(), "unframed bytes at end of recording");
    }

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let f = File::create(path).unwrap_or_else(|e| {
                eprintln!("Error creating {}: {e}", path.display());
                std::process::exit(1);
            });
            Box::new(f)
        }
        None => Box::new(io::stdout().lock()),
    };

    if let Err(e) = write_hex_lines(BufWriter::new(writer), &messages) {
        eprintln!("Error writing output: {e}");
        std::process::exit(1);
    }
    info!(messages = messages.len(), "converted");
}

fn write_hex_lines<W: Write>(mut out: W, messages: &[&[u8]]) -> io::Result<()> {
    for msg in messages {
        writeln!(out, "{}", hex_encode(msg))?;
    }
    out.flush()
}

fn cmd_config(config: &Config, path: Option<&Path>, init: bool) {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config::config_file);

    if init {
        if path.exists() {
            eprintln!("{} already exists", path.display());
            std::process::exit(1);
        }
        if let Err(e) = config::save_config_to(&Config::default(), &path) {
            eprintln!("Error writing config: {e}");
            std::process::exit(1);
        }
        println!("Wrote {}", path.display());
        return;
    }

    println!("# {}", path.display());
    print!("{}", config::serialize_config(config));
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLOT: [u8; 6] = [0x30, 0x00, 0x06, 0x80, 0x01, 0x02];

    fn chunks(n: usize) -> Vec<Vec<u8>> {
        (0..n)
            .map(|i| {
                let mut m = PLOT.to_vec();
                m[5] = i as u8;
                m
            })
            .collect()
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::parse_from(["asterix", "decode", "-", "-c", "48", "-c", "21", "-j", "4"]);
        match cli.command {
            Commands::Decode {
                categories, jobs, ..
            } => {
                assert_eq!(categories, vec![48, 21]);
                assert_eq!(jobs, Some(4));
            }
            _ => panic!("expected decode"),
        }
    }

    #[test]
    fn test_decode_parallel_keeps_order() {
        let decoder = Decoder::default();
        let input = chunks(10);
        let results = decode_parallel(&decoder, &input, 3);
        assert_eq!(results.len(), 10);
        for (i, result) in results.iter().enumerate() {
            let msg = result.as_ref().unwrap();
            let sic = msg.records[0].present("I048/010").unwrap().field("sic").unwrap().as_u64();
            assert_eq!(sic, Some(i as u64));
        }
    }

    #[test]
    fn test_decode_input_binary_matches_chunks() {
        let decoder = Decoder::default();
        let input = chunks(5);
        let buf: Vec<u8> = input.concat();

        let sequential = decode_input(&decoder, &Input::Binary(buf.clone()), 1);
        let parallel = decode_input(&decoder, &Input::Binary(buf), 2);
        let from_chunks = decode_input(&decoder, &Input::Chunks(input), 2);

        let ok = |rs: &[Result<Message>]| rs.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok(&sequential), 5);
        assert_eq!(ok(&parallel), 5);
        assert_eq!(ok(&from_chunks), 5);
    }

    #[test]
    fn test_write_hex_lines() {
        let a: &[u8] = &[0x30, 0x00, 0x03];
        let b: &[u8] = &[0x15, 0x00, 0x04, 0xAB];
        let mut out = Vec::new();
        write_hex_lines(&mut out, &[a, b]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "300003\n150004AB\n");
    }
}
