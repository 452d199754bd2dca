use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;

use dos_sandbox::platform::disk::{DiskImage, Geometry};
use dos_sandbox::platform::{Machine, DEFAULT_STORE_SIZE};
use dos_sandbox::sim::debug::{spawn_console, LineReader};
use dos_sandbox::sim::decode::NOP;
use dos_sandbox::sim::interrupt::DEFAULT_QUEUE_CAPACITY;
use dos_sandbox::sim::mem::StoreInit;
use dos_sandbox::sim::{SimFlags, DEFAULT_BURST_SIZE};

#[derive(Parser, Debug)]
#[command(
    name = "dos-sandbox",
    about = "Step through a program on a minimal virtual PC with an interactive debugger."
)]
struct Args {
    /// Size of the instruction/data store in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_STORE_SIZE)]
    store_size: usize,

    /// Number of steps run by the `go` command
    #[arg(long, value_name = "STEPS", default_value_t = DEFAULT_BURST_SIZE)]
    burst: u32,

    /// Number of interrupt queue slots (one more than the number of pending interrupts it holds)
    #[arg(long, value_name = "SLOTS", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Raw program image to load (defaults to three NOPs)
    #[arg(long, value_name = "PATH")]
    program: Option<PathBuf>,

    /// Store address to load the program at (decimal or 0x-prefixed hex)
    #[arg(long, value_name = "ADDR", default_value = "0", value_parser = parse_addr)]
    load_addr: usize,

    /// Fill the store with seeded random bytes instead of zeroes
    #[arg(long, value_name = "SEED")]
    fill_seed: Option<u64>,

    /// Disk image path (created and zero-filled if missing)
    #[arg(long, value_name = "PATH", default_value = "disk.img")]
    disk: PathBuf,

    /// Run without a disk image
    #[arg(long, action = clap::ArgAction::SetTrue)]
    no_disk: bool,

    /// Read commands on a separate console thread
    #[arg(long, action = clap::ArgAction::SetTrue)]
    console_thread: bool,
}

fn parse_addr(s: &str) -> Result<usize, String> {
    let result = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => s.parse(),
    };
    result.map_err(|e| format!("invalid address {s:?}: {e}"))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.queue_capacity == 0 {
        bail!("--queue-capacity must be at least 1");
    }

    let flags = SimFlags {
        burst_size: args.burst,
        queue_capacity: args.queue_capacity,
        store_init: match args.fill_seed {
            Some(seed) => StoreInit::Seeded { seed },
            None => StoreInit::Zeroed,
        },
    };
    let mut machine = Machine::new(args.store_size, flags);

    let image = match &args.program {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("read program {}", path.display()))?,
        None => vec![NOP; 3],
    };
    machine.load_program(args.load_addr, &image).context("load program")?;

    if !args.no_disk {
        let disk = DiskImage::open(&args.disk, Geometry::default())
            .with_context(|| format!("open disk image {}", args.disk.display()))?;
        machine.attach_disk(disk);
    }

    let stdout = io::stdout().lock();
    if args.console_thread {
        // The console thread stays blocked on stdin; it is not joined.
        let (source, _console) = spawn_console();
        machine.session(source, stdout).run()?;
    } else {
        machine.session(LineReader::new(io::stdin().lock()), stdout).run()?;
    }

    log::info!("ran {} instructions ({} ticks)", machine.engine.instructions_run, machine.timer.ticks());
    Ok(())
}
