use anyhow::{bail, Context, Result};
use clap::Parser;
use emu8086_core::cpu_8086::registers::SP;
use emu8086_core::logging::{LogCategory, LogConfig, LogLevel};
use emu8086_core::{ArrayMemory, Cpu8086, CpuConfig, CpuError, RegisterSnapshot, RunOutcome};
use log::{info, warn};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Run a flat 8086 binary image until HLT
#[derive(Parser)]
#[command(name = "emu8086", version)]
struct Args {
    /// Raw binary image to execute
    image: PathBuf,

    /// Segment to load into (CS, DS, ES and SS), hex
    #[arg(long, default_value = "1000", value_parser = parse_hex_u16)]
    segment: u16,

    /// Offset within the segment of the first byte and the entry point, hex
    #[arg(long, default_value = "0100", value_parser = parse_hex_u16)]
    offset: u16,

    /// Stop after this many instructions
    #[arg(long, default_value_t = 10_000_000)]
    max_steps: u64,

    /// CPU configuration as JSON (fields not given keep their defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the final register snapshot to this file as JSON
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Core log level for all categories: off, error, warn, info, debug, trace
    #[arg(long, default_value = "off")]
    log_level: String,

    /// Per-category override, e.g. `--log cpu=trace --log interrupts=debug`
    #[arg(long = "log", value_name = "CATEGORY=LEVEL")]
    log_overrides: Vec<String>,

    /// Send core log output to a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Core log messages per second per category, 0 for no limit
    #[arg(long, default_value_t = 60)]
    log_rate: usize,
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex value {:?}: {}", s, e))
}

fn configure_logging(args: &Args) -> Result<()> {
    let config = LogConfig::global();
    let Some(level) = LogLevel::from_str(&args.log_level) else {
        bail!("unknown log level: {}", args.log_level);
    };
    config.set_global_level(level);
    config.set_rate_limit(args.log_rate);

    for entry in &args.log_overrides {
        let Some((name, level)) = entry.split_once('=') else {
            bail!("expected CATEGORY=LEVEL, got {:?}", entry);
        };
        let category = LogCategory::from_str(name)
            .with_context(|| format!("unknown log category: {}", name))?;
        let level = LogLevel::from_str(level)
            .with_context(|| format!("unknown log level: {}", level))?;
        config.set_level(category, level);
    }

    if let Some(path) = &args.log_file {
        config
            .set_log_file(path.clone())
            .with_context(|| format!("opening log file {}", path.display()))?;
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<CpuConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn write_snapshot(path: &Path, snapshot: &RegisterSnapshot) -> Result<()> {
    let mut f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write!(f, "{}", serde_json::to_string_pretty(snapshot)?)?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    configure_logging(&args)?;

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => CpuConfig::default(),
    };
    let image = fs::read(&args.image)
        .with_context(|| format!("reading image {}", args.image.display()))?;
    if args.offset as usize + image.len() > 0x10000 {
        warn!(
            "image of {} bytes at offset {:04X} runs past the end of the segment",
            image.len(),
            args.offset
        );
    }

    let mut cpu = Cpu8086::with_config(ArrayMemory::new(), config);
    cpu.segs.cs = args.segment;
    cpu.segs.ds = args.segment;
    cpu.segs.es = args.segment;
    cpu.segs.ss = args.segment;
    cpu.regs.set_word_reg(SP, 0xFFFE);
    cpu.load(args.offset, &image);
    info!(
        "loaded {} ({} bytes) at {:04X}:{:04X}",
        args.image.display(),
        image.len(),
        args.segment,
        args.offset
    );

    let outcome = cpu.run_bounded(args.max_steps);
    let snapshot = cpu.snapshot();
    if let Some(path) = &args.snapshot {
        write_snapshot(path, &snapshot)?;
    }

    match outcome {
        Ok(RunOutcome::Halted { steps }) => {
            info!("halted after {} steps, {} cycles", steps, cpu.total_cycles());
        }
        Ok(RunOutcome::StepLimit) => {
            warn!("step limit of {} reached without HLT", args.max_steps);
        }
        Err(err) => {
            if let CpuError::Decode { snapshot, .. } = &err {
                eprintln!("{}", serde_json::to_string_pretty(snapshot)?);
            }
            return Err(err).context("execution aborted");
        }
    }

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
