#![allow(clippy::print_stdout)]

use anonmap::RegionAllocator;
use anyhow::{ensure, Context, Result};
use clap::Parser;

/// Maps an anonymous region straight from the OS, reports where it landed,
/// and hands it back.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Options {
    /// Number of i32 values to make room for
    #[arg(short = 'n', long = "count", default_value_t = 5)]
    count: usize,

    /// Enables debug logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn main() -> Result<()> {
    let opts = Options::parse();
    init_logging(opts.verbose);

    let size = opts
        .count
        .checked_mul(size_of::<i32>())
        .context("Requested element count overflows the address space")?;

    let allocator = RegionAllocator::new();
    let mut region = allocator
        .acquire(size)
        .context("mmap: could not acquire region")?;

    println!("Memory allocation starts at {:p}", region.base());

    region
        .write_i32(0, 42)
        .context("Failed to write to region")?;
    let value = region.read_i32(0).context("Failed to read from region")?;
    ensure!(value == 42, "Read back {} instead of 42", value);

    let len = region.len();
    allocator
        .release(&mut region, len)
        .context("munmap: could not release region")?;

    Ok(())
}
