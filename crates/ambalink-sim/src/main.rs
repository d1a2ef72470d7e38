// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Host simulator for the AmbaLink IPC core.
//!
//! Runs the Linux and RTOS halves of the lock tables, the ambafs client
//! and the link-control channel against one simulated PPM.

mod board;
mod fs_demo;
mod link_demo;

use std::fmt;
use std::io::{self, Write};
use std::process::ExitCode;
use std::thread;

use ambalink_abi::layout::{NUM_MUTEX, RPMSG_BUF_SIZE, RPMSG_NUM_BUFS};
use ambalink_abi::{Paddr, PpmLayout, RingConfig};
use ambalink_ipc::diag::{
    CommandError, MUTEX_USAGE, MutexCommand, SPINLOCK_USAGE, SpinlockCommand,
};
use ambalink_ipc::SharedRegionError;
use ambalink_rpmsg::linkctrl::parse_c_uint;
use ambalink_rpmsg::{FsError, LinkCtrlError};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::board::{Board, Core};
use crate::fs_demo::FsOptions;

/// Default physical base of the PPM.
const DEFAULT_BASE: &str = "0x78000000";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Physical base address of shared memory (C integer syntax).
    #[arg(long, global = true, default_value = DEFAULT_BASE)]
    base: String,

    /// RPMSG buffers per ring.
    #[arg(long, global = true, default_value_t = RPMSG_NUM_BUFS)]
    bufs: u64,

    /// RPMSG buffer size in bytes.
    #[arg(long, global = true, default_value_t = RPMSG_BUF_SIZE)]
    buf_size: u64,

    #[command(subcommand)]
    command: SimCommand,
}

#[derive(Subcommand, Debug)]
enum SimCommand {
    /// Print the shared-memory layout.
    Layout,
    /// Run mutex exerciser commands on the Linux core ("n +", "n -").
    Mutex {
        #[arg(required = true)]
        commands: Vec<String>,
    },
    /// Run spinlock exerciser commands on the Linux core ("id [ms]").
    Spinlock {
        #[arg(required = true)]
        commands: Vec<String>,
    },
    /// Let both cores fight over one mutex.
    Contend {
        /// Mutex id.
        #[arg(long, default_value_t = 0)]
        id: usize,
        /// Lock rounds per core.
        #[arg(long, default_value_t = 1000)]
        rounds: u64,
    },
    /// List and revalidate a remote tree through ambafs.
    Fs {
        /// Files in the listed directory.
        #[arg(long, default_value_t = 12)]
        files: usize,
        /// Records per listing batch.
        #[arg(long, default_value_t = 5)]
        batch: u8,
        /// Entries accepted per listing page.
        #[arg(long, default_value_t = 4)]
        page: usize,
        /// Mount root on the RTOS side.
        #[arg(long, default_value = "c:")]
        root: String,
    },
    /// Exchange link-control messages with the RTOS.
    Link,
}

// =============================================================================
// Errors
// =============================================================================

/// Why a simulator run failed.
#[derive(Debug)]
enum SimError {
    Io(io::Error),
    BadBase(String),
    Command(CommandError),
    Region(SharedRegionError),
    Fs(FsError),
    Link(LinkCtrlError),
    Mismatch { expected: u64, found: u64 },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "output failed: {err}"),
            Self::BadBase(raw) => write!(f, "bad base address: {raw:?}"),
            Self::Command(err) => write!(f, "{err}"),
            Self::Region(err) => write!(f, "shared memory: {err}"),
            Self::Fs(err) => write!(f, "ambafs: {err}"),
            Self::Link(err) => write!(f, "link control: {err}"),
            Self::Mismatch { expected, found } => {
                write!(f, "counter is {found}, expected {expected}")
            }
        }
    }
}

impl std::error::Error for SimError {}

impl From<io::Error> for SimError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<CommandError> for SimError {
    fn from(err: CommandError) -> Self {
        Self::Command(err)
    }
}

impl From<SharedRegionError> for SimError {
    fn from(err: SharedRegionError) -> Self {
        Self::Region(err)
    }
}

impl From<FsError> for SimError {
    fn from(err: FsError) -> Self {
        Self::Fs(err)
    }
}

impl From<LinkCtrlError> for SimError {
    fn from(err: LinkCtrlError) -> Self {
        Self::Link(err)
    }
}

// =============================================================================
// Commands
// =============================================================================

fn layout(out: &mut impl Write, layout: &PpmLayout) -> Result<(), SimError> {
    let rows = [
        ("vring c0->c1", layout.vring_c0_to_c1()),
        ("vring c1->c0", layout.vring_c1_to_c0()),
        ("spinlocks", layout.slock_table()),
        ("mutexes", layout.mutex_table()),
        ("suspend backup", layout.suspend_backup()),
        ("rpc profile", layout.rpc_profile()),
        ("rpmsg profile", layout.rpmsg_profile()),
        ("end", layout.total_size()),
    ];
    let ring = layout.ring();
    writeln!(
        out,
        "ring: {} buffers of {} bytes",
        ring.num_bufs, ring.buf_size
    )?;
    for (name, offset) in rows {
        writeln!(
            out,
            "{name:<16} +{offset:#09x}  {:#010x}",
            layout.paddr(offset).as_u64()
        )?;
    }
    Ok(())
}

fn mutex(out: &mut impl Write, core: &Core, commands: &[String]) -> Result<(), SimError> {
    let table = core.mutexes();
    for line in commands {
        let parsed = MutexCommand::parse(line).and_then(|cmd| cmd.apply(table).map(|()| cmd));
        let cmd = match parsed {
            Ok(cmd) => cmd,
            Err(err) => {
                writeln!(out, "{MUTEX_USAGE}")?;
                return Err(err.into());
            }
        };
        writeln!(
            out,
            "mutex {}: owner {:?} count {:?} waiters {:?}",
            cmd.id,
            table.owner(cmd.id),
            table.count(cmd.id),
            table.wait_list(cmd.id)
        )?;
    }
    Ok(())
}

fn spinlock(out: &mut impl Write, core: &Core, commands: &[String]) -> Result<(), SimError> {
    let table = core.spinlocks();
    for line in commands {
        let parsed = SpinlockCommand::parse(line).and_then(|cmd| cmd.apply(table).map(|()| cmd));
        let cmd = match parsed {
            Ok(cmd) => cmd,
            Err(err) => {
                writeln!(out, "{SPINLOCK_USAGE}")?;
                return Err(err.into());
            }
        };
        writeln!(out, "spinlock {}: word {:?}", cmd.id, table.peek(cmd.id))?;
    }
    Ok(())
}

fn contend(out: &mut impl Write, board: &Board, id: usize, rounds: u64) -> Result<(), SimError> {
    if id >= NUM_MUTEX {
        return Err(CommandError::IdOutOfRange {
            id,
            size: NUM_MUTEX,
        }
        .into());
    }
    let counter = board.scratch;
    board.linux.region().publish_u64(counter, 0);

    thread::scope(|scope| {
        for core in [&board.linux, &board.rtos] {
            scope.spawn(move || {
                let region = core.region();
                for _ in 0..rounds {
                    core.mutexes().lock(id);
                    let value = region.acquire_u64(counter);
                    region.publish_u64(counter, value + 1);
                    core.mutexes().unlock(id);
                }
            });
        }
    });

    let found = board.linux.region().acquire_u64(counter);
    let expected = rounds * 2;
    if found != expected {
        return Err(SimError::Mismatch { expected, found });
    }
    writeln!(out, "counter {found} after {rounds} rounds per core")?;
    for (name, core) in [("linux", &board.linux), ("rtos", &board.rtos)] {
        writeln!(
            out,
            "{name}: woken {} times",
            core.mutexes().wake_count(id).unwrap_or(0)
        )?;
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), SimError> {
    let base = parse_c_uint(cli.base.as_bytes())
        .map(|raw| Paddr::new(u64::from(raw)))
        .ok_or_else(|| SimError::BadBase(cli.base.clone()))?;
    let ring = RingConfig::new(cli.bufs, cli.buf_size);
    let mut out = io::stdout().lock();

    if matches!(cli.command, SimCommand::Layout) {
        return layout(&mut out, &PpmLayout::new(base, ring));
    }

    let board = Board::new(base, ring)?;
    match cli.command {
        // Printed without bringing up the board.
        SimCommand::Layout => Ok(()),
        SimCommand::Mutex { commands } => mutex(&mut out, &board.linux, &commands),
        SimCommand::Spinlock { commands } => spinlock(&mut out, &board.linux, &commands),
        SimCommand::Contend { id, rounds } => contend(&mut out, &board, id, rounds),
        SimCommand::Fs {
            files,
            batch,
            page,
            root,
        } => fs_demo::run(
            &mut out,
            &board,
            &FsOptions {
                root,
                files,
                batch,
                page,
            },
        ),
        SimCommand::Link => link_demo::run(&mut out, &board),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    info!(command = ?cli.command, "ambalink-sim");
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
