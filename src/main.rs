//! `tracy-lz4` command line front end.
//!
//! `pack` streams a file (or stdin) through a [`BlockWriter`]; `frames` lists
//! the frames of an existing output file.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tracy_lz4::framing::FRAME_HEADER_LEN;
use tracy_lz4::{BlockWriter, CodecKind, FrameReader, WriterConfig};

#[derive(Parser, Debug)]
#[command(name = "tracy-lz4", version, about = "Block-framed LZ4 writer")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress input into length-prefixed blocks.
    Pack(PackArgs),
    /// List the frames of a framed file.
    Frames {
        file: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct PackArgs {
    /// Input file, or `-` for stdin.
    #[arg(default_value = "-")]
    input: PathBuf,

    #[arg(short, long)]
    output: PathBuf,

    /// JSON writer config; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    block_size: Option<usize>,

    /// Keep existing output content instead of truncating.
    #[arg(long)]
    append: bool,

    #[arg(long, value_enum)]
    codec: Option<CodecArg>,

    /// Acceleration for lz4-fast, level for lz4-high and deflate.
    #[arg(long)]
    level: Option<i32>,

    /// Bytes handed to each write call.
    #[arg(long, default_value_t = 16 * 1024)]
    read_size: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CodecArg {
    Lz4,
    Lz4Fast,
    Lz4High,
    Deflate,
}

impl CodecArg {
    fn to_kind(self, level: Option<i32>) -> Result<CodecKind> {
        Ok(match self {
            CodecArg::Lz4 => CodecKind::Lz4,
            CodecArg::Lz4Fast => CodecKind::Lz4Fast {
                acceleration: level.unwrap_or(1),
            },
            CodecArg::Lz4High => CodecKind::Lz4High {
                level: level.unwrap_or(9),
            },
            CodecArg::Deflate => CodecKind::Deflate {
                level: u32::try_from(level.unwrap_or(6)).context("deflate level must be >= 0")?,
            },
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Pack(args) => pack(args),
        Command::Frames { file } => list_frames(&file),
    }
}

fn pack(args: PackArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => WriterConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => WriterConfig::default().with_append(false),
    };
    if let Some(block_size) = args.block_size {
        config.block_size = block_size;
    }
    if args.append {
        config.append = true;
    }
    if let Some(codec) = args.codec {
        config.codec = codec.to_kind(args.level)?;
    }
    anyhow::ensure!(args.read_size > 0, "--read-size must be positive");

    let mut writer = BlockWriter::open_with_config(Some(args.output.as_path()), &config)
        .with_context(|| format!("opening {}", args.output.display()))?;

    let mut input: Box<dyn Read> = if args.input == Path::new("-") {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("opening {}", args.input.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut chunk = vec![0u8; args.read_size];
    loop {
        let n = match input.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("reading input"),
        };
        writer.write(&chunk[..n], false)?;
    }
    writer.close().context("finalizing output")?;

    let stats = *writer.stats();
    info!(blocks = stats.blocks, bytes_in = stats.bytes_in, "pack complete");
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn list_frames(path: &Path) -> Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = FrameReader::new(BufReader::new(file));
    let mut count = 0u64;
    let mut total = 0u64;
    loop {
        let offset = reader.offset();
        let Some(frame) = reader.next() else { break };
        let payload = frame.with_context(|| format!("reading frame {count}"))?;
        println!("{count:>6}  offset {offset:>10}  length {:>8}", payload.len());
        count += 1;
        total += (FRAME_HEADER_LEN + payload.len()) as u64;
    }
    println!("{count} frames, {total} bytes");
    Ok(())
}
