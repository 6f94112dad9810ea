#![forbid(unsafe_code)]

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

use lc3_forth::asm::encoding::{BinaryFormat, ObjFileFormat, TextFormat};
use lc3_forth::asm::ObjectFile;
use lc3_forth::err::report;
use lc3_forth::forth::layout::Layout;
use lc3_forth::forth::runtime::assemble_runtime;
use lc3_forth::forth::{Config, Forth};
use lc3_forth::sim::io::BiChannelIO;
use lc3_forth::sim::{EofBehavior, PauseCondition, SimFlags, Simulator};

#[derive(Parser)]
#[clap(version, author, about)]
struct Opt {
    /// Increase the level of verbosity. Can be used multiple times.
    #[clap(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive Forth session on stdin/stdout
    Forth {
        /// Print the machine state every time a `debug` word runs
        #[clap(long)]
        trace: bool,

        /// Start with only the built-in words
        #[clap(long)]
        no_prelude: bool,
    },

    /// Assemble the Forth runtime into a flat image
    Build {
        /// Where to write the image
        #[clap(short, long)]
        output: PathBuf,
    },

    /// Load a flat image at x3000 and run it on stdin/stdout
    Run {
        /// The image to run
        image: PathBuf,

        /// Value GETC puts in R0 at the end of input (default: stop running)
        #[clap(long, value_parser = parse_word)]
        eof: Option<u16>,

        /// Stop after this many instructions
        #[clap(long)]
        max_steps: Option<u64>,
    },

    /// List every cell of an image (or of the Forth runtime)
    Dump {
        /// The image to list
        image: Option<PathBuf>,
    },
}

impl Opt {
    const fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "lc3_forth=debug,info",
            2 => "lc3_forth=trace,info",
            3..=u8::MAX => "trace",
        }
    }

    fn filter_layer(&self) -> EnvFilter {
        // Parse log level from env
        EnvFilter::try_from_default_env()
            // or infer from args
            .or_else(|_| EnvFilter::try_new(self.log_filter()))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

/// Parses a word written as `x3000`, `0x3000` or `12288`.
fn parse_word(s: &str) -> Result<u16, String> {
    let result = match s.strip_prefix("0x").or_else(|| s.strip_prefix('x')) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    result.map_err(|e| format!("{s:?} is not a 16-bit word: {e}"))
}

/// Converts a crate error into an [`anyhow::Error`], keeping its help message.
fn reported<E: lc3_forth::err::Error>(e: E) -> anyhow::Error {
    let msg = report(&e);
    anyhow::anyhow!(msg.strip_prefix("error: ").unwrap_or(&msg).to_string())
}

fn read_image(path: &Path) -> anyhow::Result<ObjectFile> {
    info!(path = %path.display(), "Reading image");
    let bytes = std::fs::read(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    if bytes.len() % 2 != 0 {
        tracing::warn!("image has an odd number of bytes, ignoring the last one");
    }

    BinaryFormat::deserialize(&bytes)
        .with_context(|| format!("{} is not a valid image", path.display()))
}

fn forth(trace: bool, no_prelude: bool) -> anyhow::Result<()> {
    let config = Config {
        prelude: if no_prelude { None } else { Config::default().prelude },
        trace,
        ..Default::default()
    };
    let mut forth = Forth::new(config).map_err(reported)?;
    debug!(words = forth.dictionary().names().len(), "session ready");

    // Lines go to the console as raw bytes, UTF-8 or not.
    let mut stdin = std::io::stdin().lock();
    let mut stdout = std::io::stdout();
    let mut line = vec![];
    loop {
        line.clear();
        let n = stdin.read_until(b'\n', &mut line).context("could not read stdin")?;
        if n == 0 { break; }
        if line.last() != Some(&b'\n') {
            line.push(b'\n');
        }

        forth.feed(&line);
        forth.run().map_err(reported)?;

        for snapshot in forth.take_traces() {
            eprint!("{snapshot}");
        }
        stdout.write_all(&forth.take_output_bytes())?;
        stdout.flush()?;

        if forth.halted() {
            debug!("bye");
            break;
        }
    }
    Ok(())
}

fn build(output: &Path) -> anyhow::Result<()> {
    let obj = assemble_runtime(&Layout::default()).map_err(reported)?;
    info!(words = obj.len(), path = %output.display(), "Writing image");

    std::fs::write(output, BinaryFormat::serialize(&obj))
        .with_context(|| format!("could not write {}", output.display()))
}

fn run(image: &Path, eof: Option<u16>, max_steps: Option<u64>) -> anyhow::Result<()> {
    let obj = read_image(image)?;

    let flags = SimFlags {
        eof: eof.map_or(EofBehavior::Pause, EofBehavior::Sentinel),
        ..Default::default()
    };
    let mut sim = Simulator::new(flags);
    sim.load_obj_file(&obj);
    sim.open_io(BiChannelIO::stdio());

    info!("Running image");
    let result = match max_steps {
        Some(n) => sim.run_with_limit(n),
        None => sim.run(),
    };
    sim.close_io();

    match result.map_err(reported)? {
        PauseCondition::Halt => info!(instructions_run = sim.instructions_run, "halted"),
        PauseCondition::InputExhausted => info!(pc = format_args!("x{:04X}", sim.pc), "stopped at the end of input"),
        cond => info!(?cond, pc = format_args!("x{:04X}", sim.pc), "stopped"),
    }
    Ok(())
}

fn dump(image: Option<&Path>) -> anyhow::Result<()> {
    let obj = match image {
        Some(path) => read_image(path)?,
        None => assemble_runtime(&Layout::default()).map_err(reported)?,
    };
    print!("{}", TextFormat::serialize(&obj));
    Ok(())
}

impl Command {
    fn exec(self) -> anyhow::Result<()> {
        match self {
            Command::Forth { trace, no_prelude } => forth(trace, no_prelude),
            Command::Build { output } => build(&output),
            Command::Run { image, eof, max_steps } => run(&image, eof, max_steps),
            Command::Dump { image } => dump(image.as_deref()),
        }
    }
}

fn main() {
    // First, parse the arguments
    let opt = Opt::parse();

    // Then, setup the tracing formatter for logging
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false);
    tracing_subscriber::Registry::default()
        .with(opt.filter_layer())
        .with(fmt_layer)
        .init();

    // And run the command
    if let Err(e) = opt.command.exec() {
        error!("{e:#}");
        exit(1);
    }
}
