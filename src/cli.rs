// Command-line interface for chunkdelta.
//
// Each subcommand is a thin wrapper over one file-level operation:
// signature, delta, patch, plus `explain` to inspect a delta file.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::config::{
    COPY_BUFFER_SIZE, DATA_BUFFER_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_READ_BUFFER_SIZE,
    MAX_CHUNK_SIZE, MIN_CHUNK_SIZE,
};
use crate::delta::{
    DataRange, DeltaApplier, DeltaBuilder, DeltaOptions, DeltaSink, DeltaSummary, PatchOptions,
};
use crate::error::to_hex;
use crate::hash::{HashAlgorithm, RollingChecksumAlgorithm};
use crate::io::{delta_file, patch_file, signature_file};
use crate::progress::ProgressReporter;
use crate::signature::{SignatureBuilder, SignatureOptions};

const PROGRAM: &str = "chunkdelta";

// ---------------------------------------------------------------------------
// Value parsers
// ---------------------------------------------------------------------------

/// Byte counts with optional K, M or G suffix.
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

fn parse_hash(s: &str) -> Result<HashAlgorithm, String> {
    HashAlgorithm::from_name(&s.to_ascii_uppercase().replace('-', "")).map_err(|e| e.to_string())
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Signature-based binary delta tool (rsync-style).
#[derive(Parser, Debug)]
#[command(
    name = "chunkdelta",
    version,
    about = "Signature-based binary delta tool",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
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

    /// Print progress percentages to stderr.
    #[arg(long, global = true)]
    progress: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Build the signature of a basis file.
    Signature(SignatureArgs),
    /// Build a delta from a signature and a new file.
    Delta(DeltaArgs),
    /// Apply a delta to a basis file.
    Patch(PatchArgs),
    /// Describe the commands in a delta file.
    Explain(ExplainArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct SignatureArgs {
    /// Nominal chunk size (supports K suffix).
    #[arg(long = "chunk-size", value_parser = parse_byte_size, default_value_t = DEFAULT_CHUNK_SIZE as u64)]
    chunk_size: u64,

    /// Strong hash algorithm.
    #[arg(long, value_parser = parse_hash, default_value = "SHA1")]
    hash: HashAlgorithm,

    /// File to fingerprint.
    #[arg(value_hint = ValueHint::FilePath)]
    basis: PathBuf,

    /// Signature file to write.
    #[arg(value_hint = ValueHint::FilePath)]
    signature: PathBuf,
}

#[derive(Args, Debug)]
struct DeltaArgs {
    /// Scan buffer size (supports K/M/G suffix).
    #[arg(long = "buffer-size", value_parser = parse_byte_size, default_value_t = DEFAULT_READ_BUFFER_SIZE as u64)]
    buffer_size: u64,

    /// Emit one Copy per matched chunk instead of merging contiguous runs.
    #[arg(long = "no-aggregate")]
    no_aggregate: bool,

    /// Signature of the basis file.
    #[arg(value_hint = ValueHint::FilePath)]
    signature: PathBuf,

    /// New version of the file.
    #[arg(value_hint = ValueHint::FilePath)]
    new_file: PathBuf,

    /// Delta file to write.
    #[arg(value_hint = ValueHint::FilePath)]
    delta: PathBuf,
}

#[derive(Args, Debug)]
struct PatchArgs {
    /// Do not hash the output to check it against the delta.
    #[arg(long = "skip-verification")]
    skip_verification: bool,

    /// Basis file the signature was taken from.
    #[arg(value_hint = ValueHint::FilePath)]
    basis: PathBuf,

    /// Delta file to apply.
    #[arg(value_hint = ValueHint::FilePath)]
    delta: PathBuf,

    /// Reconstructed file to write.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct ExplainArgs {
    /// Delta file to describe.
    #[arg(value_hint = ValueHint::FilePath)]
    delta: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Signature {
        basis: PathBuf,
        signature: PathBuf,
    },
    Delta {
        signature: PathBuf,
        new_file: PathBuf,
        delta: PathBuf,
    },
    Patch {
        basis: PathBuf,
        delta: PathBuf,
        output: PathBuf,
    },
    Explain {
        delta: PathBuf,
    },
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    progress: bool,
    signature: SignatureOptions,
    delta: DeltaOptions,
    patch: PatchOptions,
}

impl Options {
    fn show_progress(&self) -> bool {
        self.progress && !self.quiet
    }
}

fn resolve_options(cli: Cli) -> Options {
    let mut opts = Options {
        command: Command::Config,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        progress: cli.progress,
        signature: SignatureOptions::default(),
        delta: DeltaOptions::default(),
        patch: PatchOptions::default(),
    };

    opts.command = match cli.command {
        Cmd::Signature(args) => {
            opts.signature.chunk_size = to_usize(args.chunk_size);
            opts.signature.hash = args.hash;
            Command::Signature {
                basis: args.basis,
                signature: args.signature,
            }
        }
        Cmd::Delta(args) => {
            opts.delta.read_buffer_size = to_usize(args.buffer_size);
            opts.delta.aggregate_copies = !args.no_aggregate;
            Command::Delta {
                signature: args.signature,
                new_file: args.new_file,
                delta: args.delta,
            }
        }
        Cmd::Patch(args) => {
            opts.patch.verify = !args.skip_verification;
            Command::Patch {
                basis: args.basis,
                delta: args.delta,
                output: args.output,
            }
        }
        Cmd::Explain(args) => Command::Explain { delta: args.delta },
        Cmd::Config => Command::Config,
    };
    opts
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once(PROGRAM.to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Console progress
// ---------------------------------------------------------------------------

/// Prints `operation: N%` to stderr whenever the whole percentage changes.
#[derive(Debug, Default)]
struct ConsoleProgress {
    last: Option<(String, u64)>,
}

fn percent(current: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    (u128::from(current.min(total)) * 100 / u128::from(total)) as u64
}

impl ProgressReporter for ConsoleProgress {
    fn report(&mut self, operation: &str, current: u64, total: u64) {
        let pct = percent(current, total);
        if let Some((op, last)) = &self.last
            && op == operation
            && *last == pct
        {
            return;
        }
        eprintln!("{operation}: {pct}%");
        self.last = Some((operation.to_string(), pct));
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Refuse to clobber an existing file unless `--force` was given.
fn check_output(path: &Path, force: bool) -> bool {
    if path.exists() && !force {
        eprintln!(
            "{PROGRAM}: output file exists, use -f to overwrite: {}",
            path.display()
        );
        return false;
    }
    true
}

fn print_json(json: &serde_json::Value) {
    eprintln!("{json:#}");
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("{PROGRAM} version {version} (Rust)");

    let sha256 = cfg!(feature = "sha256") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();
    let hashes: Vec<&str> = [HashAlgorithm::Sha1]
        .into_iter()
        .chain(HashAlgorithm::from_name("SHA256").ok())
        .map(HashAlgorithm::name)
        .collect();
    let rolling: Vec<&str> = RollingChecksumAlgorithm::ALL
        .iter()
        .map(|r| r.name())
        .collect();

    eprintln!("SHA256={sha256}");
    eprintln!("HASH_ALGORITHMS={}", hashes.join(","));
    eprintln!("ROLLING_ALGORITHMS={}", rolling.join(","));
    eprintln!("DEFAULT_CHUNK_SIZE={DEFAULT_CHUNK_SIZE}");
    eprintln!("MIN_CHUNK_SIZE={MIN_CHUNK_SIZE}");
    eprintln!("MAX_CHUNK_SIZE={MAX_CHUNK_SIZE}");
    eprintln!("DEFAULT_READ_BUFFER_SIZE={DEFAULT_READ_BUFFER_SIZE}");
    eprintln!("COPY_BUFFER_SIZE={COPY_BUFFER_SIZE}");
    eprintln!("DATA_BUFFER_SIZE={DATA_BUFFER_SIZE}");
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Signature command
// ---------------------------------------------------------------------------

fn cmd_signature(opts: &Options, basis: &Path, signature: &Path) -> i32 {
    let mut builder = match SignatureBuilder::new(opts.signature) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{PROGRAM}: {e}");
            return 1;
        }
    };
    if !check_output(signature, opts.force) {
        return 1;
    }
    if opts.show_progress() {
        builder = builder.with_progress(ConsoleProgress::default());
    }

    let stats = match signature_file(&mut builder, basis, signature) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("{PROGRAM}: signature error: {e}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "{PROGRAM}: signature: basis size: {}, chunks: {}, signature size: {}",
            stats.basis_size, stats.chunks, stats.signature_size
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "signature",
            "basis_size": stats.basis_size,
            "signature_size": stats.signature_size,
            "chunk_size": opts.signature.chunk_size,
            "chunks": stats.chunks,
            "hash": stats.hash.name(),
            "basis_hash": to_hex(&stats.basis_hash),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Delta command
// ---------------------------------------------------------------------------

fn cmd_delta(opts: &Options, signature: &Path, new_file: &Path, delta: &Path) -> i32 {
    if !check_output(delta, opts.force) {
        return 1;
    }
    let mut builder = DeltaBuilder::new(opts.delta);
    if opts.show_progress() {
        builder = builder.with_progress(ConsoleProgress::default());
    }

    let stats = match delta_file(&mut builder, signature, new_file, delta) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("{PROGRAM}: delta error: {e}");
            return 1;
        }
    };

    let s = stats.summary;
    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "{PROGRAM}: delta: new size: {}, delta size: {}, copy: {} ({} bytes), data: {} ({} bytes)",
            stats.new_size,
            stats.delta_size,
            s.copy_commands,
            s.copy_bytes,
            s.data_commands,
            s.data_bytes
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "delta",
            "basis_size": stats.basis_size,
            "new_size": stats.new_size,
            "delta_size": stats.delta_size,
            "copy_commands": s.copy_commands,
            "copy_bytes": s.copy_bytes,
            "data_commands": s.data_commands,
            "data_bytes": s.data_bytes,
            "aggregate_copies": opts.delta.aggregate_copies,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Patch command
// ---------------------------------------------------------------------------

fn cmd_patch(opts: &Options, basis: &Path, delta: &Path, output: &Path) -> i32 {
    if !check_output(output, opts.force) {
        return 1;
    }
    let mut applier = DeltaApplier::new(opts.patch);
    if opts.show_progress() {
        applier = applier.with_progress(ConsoleProgress::default());
    }

    let stats = match patch_file(&mut applier, basis, delta, output) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("{PROGRAM}: patch error: {e}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "{PROGRAM}: patch: basis size: {}, delta size: {}, output size: {}, verified: {}",
            stats.basis_size, stats.delta_size, stats.output_size, stats.verified
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "patch",
            "basis_size": stats.basis_size,
            "delta_size": stats.delta_size,
            "output_size": stats.output_size,
            "hash": stats.hash.name(),
            "expected_hash": to_hex(&stats.expected_hash),
            "verified": stats.verified,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Explain command
// ---------------------------------------------------------------------------

/// Tallies commands and, when listing, prints one line per command.
struct CommandPrinter<W: Write> {
    out: W,
    list: bool,
    summary: DeltaSummary,
}

impl<W: Write> DeltaSink for CommandPrinter<W> {
    fn copy(&mut self, range: DataRange) -> crate::Result<()> {
        if self.list {
            writeln!(
                self.out,
                "  {:>12}  COPY  {:>12}  {:>10}",
                self.summary.output_len(),
                range.start,
                range.length
            )?;
        }
        self.summary.copy(range)
    }

    fn begin_data(&mut self, length: u64) -> crate::Result<()> {
        if self.list {
            writeln!(
                self.out,
                "  {:>12}  DATA  {:>12}  {:>10}",
                self.summary.output_len(),
                "-",
                length
            )?;
        }
        self.summary.begin_data(length)
    }

    fn data(&mut self, _bytes: &[u8]) -> crate::Result<()> {
        Ok(())
    }
}

fn explain(delta: &Path, list: bool, out: &mut impl Write) -> crate::Result<(HashAlgorithm, Vec<u8>, DeltaSummary)> {
    let file = std::fs::File::open(delta)?;
    let mut reader = crate::format::DeltaReader::new(io::BufReader::new(file))?;
    let hash = reader.hash_algorithm();
    let expected = reader.expected_hash().to_vec();

    writeln!(out, "hash algorithm:   {hash}")?;
    writeln!(out, "expected hash:    {}", to_hex(&expected))?;
    if list {
        writeln!(out, "  {:>12}  {:4}  {:>12}  {:>10}", "output", "cmd", "basis", "length")?;
    }

    let mut printer = CommandPrinter {
        out: &mut *out,
        list,
        summary: DeltaSummary::default(),
    };
    reader.replay(&mut printer)?;
    let summary = printer.summary;

    writeln!(out, "copy commands:    {} ({} bytes)", summary.copy_commands, summary.copy_bytes)?;
    writeln!(out, "data commands:    {} ({} bytes)", summary.data_commands, summary.data_bytes)?;
    writeln!(out, "output size:      {}", summary.output_len())?;
    Ok((hash, expected, summary))
}

fn cmd_explain(opts: &Options, delta: &Path) -> i32 {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let result = explain(delta, opts.verbose > 0, &mut out);
    if let Err(e) = out.flush() {
        eprintln!("{PROGRAM}: write flush error: {e}");
        return 1;
    }

    let (hash, expected, summary) = match result {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{PROGRAM}: explain error: {e}");
            return 1;
        }
    };

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "explain",
            "hash": hash.name(),
            "expected_hash": to_hex(&expected),
            "copy_commands": summary.copy_commands,
            "copy_bytes": summary.copy_bytes,
            "data_commands": summary.data_commands,
            "data_bytes": summary.data_bytes,
            "output_size": summary.output_len(),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let default_filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let opts = resolve_options(cli);
    log::debug!("{:?}", opts.command);

    let exit_code = match &opts.command {
        Command::Signature { basis, signature } => cmd_signature(&opts, basis, signature),
        Command::Delta {
            signature,
            new_file,
            delta,
        } => cmd_delta(&opts, signature, new_file, delta),
        Command::Patch {
            basis,
            delta,
            output,
        } => cmd_patch(&opts, basis, delta, output),
        Command::Explain { delta } => cmd_explain(&opts, delta),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
