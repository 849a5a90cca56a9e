// Command-line front end for zstream.
//
// Mirrors the everyday surface of the reference `zstd` tool: compress,
// decompress and test files or stdin/stdout, with `.zst` suffix handling.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::codec::{self, CompressionContext, DEFAULT_LEVEL, DecompressionContext, MIN_CHUNK_SIZE};
use crate::compress::decoder::DecompressOptions;
use crate::compress::encoder::CompressOptions;
use crate::io::{self as zio, CompressStats, DecompressStats};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const SUFFIX: &str = "zst";

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Streaming Zstandard compressor.
#[derive(Parser, Debug)]
#[command(
    name = "zstream",
    version,
    about = "Streaming Zstandard compressor",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files (and allow a terminal as output).
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compress a file or stdin into a single frame.
    Compress(CompressArgs),
    /// Decompress a file or stdin.
    Decompress(DecompressArgs),
    /// Decompress and discard, verifying integrity.
    Test(TestArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct CompressArgs {
    /// Compression level (negative levels are faster).
    #[arg(long, short = 'l', allow_negative_numbers = true, default_value_t = DEFAULT_LEVEL)]
    level: i32,

    /// Worker threads (0 = one per core).
    #[arg(long, short = 'T', default_value_t = 1)]
    threads: u32,

    /// Window size as a power of two.
    #[arg(long = "window-log")]
    window_log: Option<u32>,

    /// Output staging buffer size (supports K/M/G suffix).
    #[arg(long = "chunk-size", value_parser = parse_byte_size)]
    chunk_size: Option<u64>,

    /// Do not append a content checksum.
    #[arg(long = "no-checksum")]
    no_checksum: bool,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Input file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Output file (default: INPUT.zst, or stdout for stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DecompressArgs {
    /// Refuse frames needing a window larger than 2^N bytes.
    #[arg(long = "window-log-max")]
    window_log_max: Option<u32>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Input file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Output file (default: INPUT without .zst, or stdout for stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TestArgs {
    /// Refuse frames needing a window larger than 2^N bytes.
    #[arg(long = "window-log-max")]
    window_log_max: Option<u32>,

    /// Input file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Compress,
    Decompress,
    Test,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    level: i32,
    threads: u32,
    window_log: Option<u32>,
    window_log_max: Option<u32>,
    chunk_size: Option<u64>,
    no_checksum: bool,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    json_output: bool,
}

impl Options {
    fn new(command: Command, cli: &Cli) -> Self {
        Self {
            command,
            use_stdout: false,
            force: cli.force,
            quiet: cli.quiet,
            verbose: cli.verbose.min(2),
            level: DEFAULT_LEVEL,
            threads: 1,
            window_log: None,
            window_log_max: None,
            chunk_size: None,
            no_checksum: false,
            input_file: None,
            output_file: None,
            json_output: cli.json_output,
        }
    }
}

fn resolve_options(mut cli: Cli) -> Options {
    let command = std::mem::replace(&mut cli.command, Cmd::Config);
    match command {
        Cmd::Compress(args) => Options {
            use_stdout: args.stdout,
            level: args.level,
            threads: args.threads,
            window_log: args.window_log,
            chunk_size: args.chunk_size,
            no_checksum: args.no_checksum,
            input_file: args.input,
            output_file: args.output,
            ..Options::new(Command::Compress, &cli)
        },
        Cmd::Decompress(args) => Options {
            use_stdout: args.stdout,
            window_log_max: args.window_log_max,
            input_file: args.input,
            output_file: args.output,
            ..Options::new(Command::Decompress, &cli)
        },
        Cmd::Test(args) => Options {
            window_log_max: args.window_log_max,
            input_file: args.input,
            ..Options::new(Command::Test, &cli)
        },
        Cmd::Config => Options::new(Command::Config, &cli),
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("zstream".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        let _ = build_compress_options(&opts);
        let _ = default_output(&opts);
    }
}

/// Output path implied by the input name when none is given.
///
/// Compressing appends `.zst`; decompressing strips it and refuses other
/// names. `Ok(None)` means stdout.
fn default_output(opts: &Options) -> Result<Option<PathBuf>, String> {
    if opts.use_stdout {
        return Ok(None);
    }
    if let Some(out) = &opts.output_file {
        return Ok(Some(out.clone()));
    }
    let Some(input) = &opts.input_file else {
        return Ok(None);
    };
    match opts.command {
        Command::Compress => {
            let mut name = input.clone().into_os_string();
            name.push(".");
            name.push(SUFFIX);
            Ok(Some(PathBuf::from(name)))
        }
        Command::Decompress => {
            if input.extension().is_some_and(|ext| ext == SUFFIX) {
                Ok(Some(input.with_extension("")))
            } else {
                Err(format!(
                    "{}: unknown suffix (expected .{SUFFIX}); give an output name or use -c",
                    input.display()
                ))
            }
        }
        Command::Test | Command::Config => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config(opts: &Options) -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    let levels = codec::level_range();

    if opts.json_output {
        let json = serde_json::json!({
            "version": version,
            "codec_version": zstd_safe::version_string(),
            "multithread": codec::multithread_supported(),
            "file_io": cfg!(feature = "file-io"),
            "min_level": levels.start(),
            "max_level": levels.end(),
            "default_level": DEFAULT_LEVEL,
            "min_chunk_size": MIN_CHUNK_SIZE,
            "compress_in_size": CompressionContext::recommended_input_size(),
            "compress_out_size": CompressionContext::recommended_output_size(),
            "decompress_in_size": DecompressionContext::recommended_input_size(),
            "decompress_out_size": DecompressionContext::recommended_output_size(),
        });
        eprintln!("{json:#}");
        return 0;
    }

    eprintln!("zstream version {version} (Rust), codec {}", zstd_safe::version_string());
    eprintln!("MULTITHREAD={}", codec::multithread_supported() as u8);
    eprintln!("FILE_IO={}", cfg!(feature = "file-io") as u8);
    eprintln!("LEVELS={}..={}", levels.start(), levels.end());
    eprintln!("DEFAULT_LEVEL={DEFAULT_LEVEL}");
    eprintln!("MIN_CHUNK_SIZE={MIN_CHUNK_SIZE}");
    eprintln!(
        "CSTREAM_IN_SIZE={}",
        CompressionContext::recommended_input_size()
    );
    eprintln!(
        "CSTREAM_OUT_SIZE={}",
        CompressionContext::recommended_output_size()
    );
    eprintln!(
        "DSTREAM_IN_SIZE={}",
        DecompressionContext::recommended_input_size()
    );
    eprintln!(
        "DSTREAM_OUT_SIZE={}",
        DecompressionContext::recommended_output_size()
    );

    0
}

// ---------------------------------------------------------------------------
// Build library options from CLI options
// ---------------------------------------------------------------------------

fn build_compress_options(opts: &Options) -> Result<CompressOptions, String> {
    let workers = match opts.threads {
        0 => std::thread::available_parallelism()
            .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
            .unwrap_or(1),
        n => n,
    };
    let chunk_size = match opts.chunk_size {
        Some(size) => {
            usize::try_from(size).map_err(|_| format!("chunk size {size} is too large"))?
        }
        None => CompressionContext::recommended_output_size(),
    };

    Ok(CompressOptions {
        level: opts.level,
        workers,
        checksum: !opts.no_checksum,
        window_log: opts.window_log,
        chunk_size,
        ..Default::default()
    })
}

fn build_decompress_options(opts: &Options) -> DecompressOptions {
    DecompressOptions {
        window_log_max: opts.window_log_max,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Shared I/O plumbing
// ---------------------------------------------------------------------------

/// Opened input plus its size when it is a regular file.
fn open_input(path: Option<&Path>) -> Result<(Box<dyn Read>, Option<u64>), String> {
    match path {
        Some(path) => {
            let file = File::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
            let size = file
                .metadata()
                .ok()
                .filter(|m| m.is_file())
                .map(|m| m.len());
            Ok((Box::new(BufReader::with_capacity(BUF_SIZE, file)), size))
        }
        None => Ok((Box::new(BufReader::new(io::stdin())), None)),
    }
}

fn open_output(path: Option<&Path>, opts: &Options) -> Result<Box<dyn Write>, String> {
    match path {
        None => Ok(Box::new(BufWriter::with_capacity(
            BUF_SIZE,
            io::stdout().lock(),
        ))),
        Some(path) => {
            if path.exists() && !opts.force {
                return Err(format!(
                    "output file exists, use -f to overwrite: {}",
                    path.display()
                ));
            }
            let file = File::create(path).map_err(|e| format!("{}: {e}", path.display()))?;
            Ok(Box::new(BufWriter::with_capacity(BUF_SIZE, file)))
        }
    }
}

/// Remove a partially written output file after a failure.
fn discard_output(path: Option<&Path>) {
    if let Some(path) = path
        && let Err(e) = std::fs::remove_file(path)
    {
        log::warn!("could not remove partial output {}: {e}", path.display());
    }
}

fn display_name(path: Option<&Path>) -> String {
    path.map_or_else(|| "<stdin>".to_string(), |p| p.display().to_string())
}

// ---------------------------------------------------------------------------
// Compress command
// ---------------------------------------------------------------------------

fn cmd_compress(opts: &Options) -> i32 {
    let mut compress_opts = match build_compress_options(opts) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("zstream: {e}");
            return 1;
        }
    };

    let output_path = match default_output(opts) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("zstream: {e}");
            return 1;
        }
    };
    if output_path.is_none() && io::stdout().is_terminal() && !opts.force {
        eprintln!("zstream: stdout is a terminal, refusing to write compressed data (use -f)");
        return 1;
    }

    let input_path = opts.input_file.as_deref();
    let (mut reader, input_size) = match open_input(input_path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("zstream: {e}");
            return 1;
        }
    };
    compress_opts.pledged_size = input_size;

    let mut writer = match open_output(output_path.as_deref(), opts) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("zstream: {e}");
            return 1;
        }
    };

    let result = zio::compress_stream(&mut reader, &mut writer, compress_opts)
        .and_then(|stats| writer.flush().map(|()| stats).map_err(Into::into));
    drop(writer);
    let stats = match result {
        Ok(s) => s,
        Err(e) => {
            eprintln!("zstream: {}: {e}", display_name(input_path));
            discard_output(output_path.as_deref());
            return 1;
        }
    };

    report_compress(opts, input_path, &stats);
    0
}

fn report_compress(opts: &Options, input: Option<&Path>, stats: &CompressStats) {
    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "zstream: {}: {} -> {} bytes ({:.2}%){}",
            display_name(input),
            stats.input_size,
            stats.output_size,
            stats.ratio() * 100.0,
            if stats.multithreaded {
                ", multithreaded"
            } else {
                ""
            }
        );
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": "compress",
            "input_size": stats.input_size,
            "output_size": stats.output_size,
            "ratio": stats.ratio(),
            "level": opts.level,
            "multithreaded": stats.multithreaded,
            "input_sha256": stats.input_sha256.as_ref().map(|d| zio::hex(d)),
        });
        eprintln!("{json:#}");
    }
}

// ---------------------------------------------------------------------------
// Decompress / test commands
// ---------------------------------------------------------------------------

fn cmd_decompress(opts: &Options) -> i32 {
    let discard = opts.command == Command::Test;

    let output_path = if discard {
        None
    } else {
        match default_output(opts) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("zstream: {e}");
                return 1;
            }
        }
    };

    let input_path = opts.input_file.as_deref();
    let (reader, _) = match open_input(input_path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("zstream: {e}");
            return 1;
        }
    };

    let mut writer: Box<dyn Write> = if discard {
        Box::new(io::sink())
    } else {
        match open_output(output_path.as_deref(), opts) {
            Ok(w) => w,
            Err(e) => {
                eprintln!("zstream: {e}");
                return 1;
            }
        }
    };

    let result = zio::decompress_stream(reader, &mut writer, build_decompress_options(opts));
    drop(writer);
    let stats = match result {
        Ok(s) => s,
        Err(e) => {
            eprintln!("zstream: {}: {e}", display_name(input_path));
            discard_output(output_path.as_deref());
            return 1;
        }
    };

    report_decompress(opts, input_path, &stats);
    0
}

fn report_decompress(opts: &Options, input: Option<&Path>, stats: &DecompressStats) {
    let command = if opts.command == Command::Test {
        "test"
    } else {
        "decompress"
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "zstream: {}: {} -> {} bytes, {} frame(s){}",
            display_name(input),
            stats.input_size,
            stats.output_size,
            stats.frames,
            if command == "test" { ", OK" } else { "" }
        );
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": command,
            "input_size": stats.input_size,
            "output_size": stats.output_size,
            "frames": stats.frames,
            "output_sha256": stats.output_sha256.as_ref().map(|d| zio::hex(d)),
        });
        eprintln!("{json:#}");
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    let filter = match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    if opts.use_stdout && !opts.quiet
        && let Some(out) = &opts.output_file
    {
        eprintln!(
            "zstream: warning: -c option overrides output filename: {}",
            out.display()
        );
    }

    let exit_code = match opts.command {
        Command::Compress => cmd_compress(&opts),
        Command::Decompress | Command::Test => cmd_decompress(&opts),
        Command::Config => cmd_config(&opts),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
