//
// bmpflow - multithreaded BMP convolution/median filtering
// bmpflow.rs - CLI utility selecting single-image or pipeline execution
//
// Copyright (c) 2018 Brion Vibber
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.
//

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use clap::Parser;

use bmpflow::backend::{ExecutionMode, ExecutionOutcome, PipelineMode, SingleImageMode};
use bmpflow::config::{Config, ExecutionConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_QUEUE_MEM_CAP_MB};
use bmpflow::logging::TimingLog;
use bmpflow::tile::PartitionMode;

const OUTPUT_DIR: &str = "test-img";
const TIMING_LOG_PATH: &str = "timing.log";

/// Multithreaded 2-D convolution and median filtering for 24-bit BMP images.
///
/// Runs in single-image mode by default, spreading one image across
/// `--threadnum` worker threads. Passing `--rww=R,W,T` switches to pipeline
/// mode, which streams every input file through R readers, W workers, and T
/// writers instead.
#[derive(Parser, Debug)]
#[command(name = "bmpflow", version, author)]
struct Cli {
    /// Filter id: one of bb, mb, em, gg, gb, co, sh, mm, bo, mg.
    #[arg(long)]
    filter: String,

    /// Tile partitioning mode: row, column, grid, or pixel.
    #[arg(long)]
    mode: String,

    /// Scheduler block size (strip height/width for row/column, square side
    /// for grid; ignored for pixel). Must be >= 1.
    #[arg(long)]
    block: u32,

    /// Single-image mode: number of worker threads to spread one image
    /// across. Ignored (and required absent) when --rww selects pipeline
    /// mode.
    #[arg(long)]
    threadnum: Option<u32>,

    /// Pipeline mode: reader,worker,writer counts, e.g. --rww=2,4,2. Presence
    /// of this flag selects pipeline mode over single-image mode.
    #[arg(long)]
    rww: Option<String>,

    /// Pipeline mode: queue memory cap in megabytes (default 500).
    #[arg(long)]
    lim: Option<usize>,

    /// Pipeline mode: queue length cap (default 20).
    #[arg(long)]
    capacity: Option<usize>,

    /// Single-image mode: output filename (written under test-img/).
    /// Pipeline mode: output filename prefix.
    #[arg(long)]
    output: Option<String>,

    /// Append timing records to ./timing.log (0 or 1, default 0).
    #[arg(long, default_value_t = 0)]
    log: u8,

    /// Input BMP filenames.
    #[arg(required = true)]
    files: Vec<String>,
}

fn parse_rww(spec: &str) -> anyhow::Result<(u32, u32, u32)> {
    let parts: Vec<&str> = spec.split(',').collect();
    if parts.len() != 3 {
        bail!("--rww expects three comma-separated values R,W,T, got '{spec}'");
    }
    let mut values = [0u32; 3];
    for (slot, part) in values.iter_mut().zip(parts.iter()) {
        *slot = part.trim().parse::<u32>().with_context(|| format!("invalid --rww value '{part}'"))?;
    }
    Ok((values[0], values[1], values[2]))
}

fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mode = PartitionMode::from_str(&cli.mode)
        .ok_or_else(|| anyhow!("unknown --mode '{}', expected row, column, grid, or pixel", cli.mode))?;

    let execution = match &cli.rww {
        Some(spec) => {
            let (readers, workers, writers) = parse_rww(spec)?;
            if cli.threadnum.is_some() {
                bail!("--threadnum is not valid in pipeline mode (selected by --rww)");
            }
            let queue_capacity = cli.capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY);
            let queue_mem_cap_bytes =
                cli.lim.unwrap_or(DEFAULT_QUEUE_MEM_CAP_MB) * 1024 * 1024;
            ExecutionConfig::Pipeline {
                readers,
                workers,
                writers,
                queue_capacity,
                queue_mem_cap_bytes,
            }
        }
        None => {
            if cli.capacity.is_some() || cli.lim.is_some() {
                bail!("--capacity/--lim are pipeline-mode flags; pass --rww to select pipeline mode");
            }
            let threadnum = cli
                .threadnum
                .ok_or_else(|| anyhow!("--threadnum is required in single-image mode (pass --rww to select pipeline mode instead)"))?;
            ExecutionConfig::SingleImage { threadnum }
        }
    };

    let config = Config {
        mode,
        block_size: cli.block,
        filter_id: cli.filter.clone(),
        execution,
        files: cli.files.clone(),
        output_prefix: cli.output.clone(),
        log_enabled: cli.log != 0,
    };
    config.validate().map_err(|e| anyhow!(e))?;
    Ok(config)
}

/// Builds the execution mode named by `config.execution`, matching the
/// reference's `compute_backend_ops` vtable dispatch on a backend descriptor
/// (here, the closed set is just {single-image, pipeline} since CPU is the
/// only backend in scope); runs it through the uniform `init`/`process`/
/// `cleanup` lifecycle and reports what it did.
fn doit(config: &Config, output_dir: &PathBuf, timing_log: Option<&TimingLog>) -> anyhow::Result<()> {
    match &config.execution {
        ExecutionConfig::SingleImage { threadnum } => {
            let mut mode = SingleImageMode::new(config, *threadnum, output_dir, config.output_prefix.clone(), timing_log);
            mode.init().map_err(|e| anyhow!(e))?;
            let outcome = mode.process().map_err(|e| anyhow!(e))?;
            mode.cleanup();
            match outcome {
                ExecutionOutcome::SingleImage { written } => {
                    for (filename, out_path) in config.files.iter().zip(written.iter()) {
                        eprintln!("{filename} -> {} ({} mode, {} thread{})",
                            out_path.display(), mode.name(), threadnum, if *threadnum == 1 { "" } else { "s" });
                    }
                }
                ExecutionOutcome::Pipeline(_) => unreachable!("SingleImageMode always returns SingleImage"),
            }
            Ok(())
        }
        ExecutionConfig::Pipeline { readers, workers, writers, queue_capacity, queue_mem_cap_bytes } => {
            let mut mode = PipelineMode::new(
                config, *readers, *workers, *writers, *queue_capacity, *queue_mem_cap_bytes, output_dir, timing_log,
            );
            mode.init().map_err(|e| anyhow!(e))?;
            let outcome = mode.process().map_err(|e| anyhow!(e))?;
            mode.cleanup();
            match outcome {
                ExecutionOutcome::Pipeline(result) => {
                    eprintln!(
                        "{} done: {}/{} files written to {}",
                        mode.name(),
                        result.written,
                        config.files.len(),
                        output_dir.display()
                    );
                }
                ExecutionOutcome::SingleImage { .. } => unreachable!("PipelineMode always returns Pipeline"),
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    bmpflow::logging::init_tracing();
    let cli = Cli::parse();

    // Argument parsing and config validation (spec §7's BadArgument kind)
    // exit 2 before any worker spawns; everything `doit` can fail on from
    // here is I/O or allocation and exits 1, per spec §6's exit code table.
    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(2);
        }
    };

    let output_dir = PathBuf::from(OUTPUT_DIR);
    if let Err(e) = std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("could not create output directory '{}'", output_dir.display()))
    {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }
    let timing_log = config.log_enabled.then(|| TimingLog::new(TIMING_LOG_PATH));

    match doit(&config, &output_dir, timing_log.as_ref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
