// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Text-command exercisers for the lock tables.
//!
//! These back the `/proc/ambarella/mutex` and `/proc/ambarella/spinlock`
//! entries: a short command line selects a lock and an action.

use core::fmt;
use std::time::{Duration, Instant};

use tracing::info;

use crate::mutex::MutexTable;
use crate::platform::Platform;
use crate::slock::SpinlockTable;

/// Usage text of the mutex exerciser.
pub const MUTEX_USAGE: &str = "usage: echo id [op] > /proc/ambarella/mutex\n    \
\"echo n +\" to lock mutex n\n    \
\"echo n -\" to unlock mutex n";

/// Usage text of the spinlock exerciser.
pub const SPINLOCK_USAGE: &str = "usage: echo id [t] > /proc/ambarella/spinlock\n    \
id is the spinlock id\n    \
t is the duration(ms) which spinlock is locked. Default is 0";

/// A rejected exerciser command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command was empty.
    Empty,
    /// A field did not parse as a number.
    BadNumber(String),
    /// The mutex operation was neither `+` nor `-`.
    BadOp(String),
    /// Trailing fields after a complete command.
    TrailingInput(String),
    /// The lock id is outside its table.
    IdOutOfRange {
        /// Requested id.
        id: usize,
        /// Table size.
        size: usize,
    },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::BadNumber(field) => write!(f, "not a number: {field:?}"),
            Self::BadOp(op) => write!(f, "unknown operation: {op:?}"),
            Self::TrailingInput(rest) => write!(f, "unexpected input: {rest:?}"),
            Self::IdOutOfRange { id, size } => {
                write!(f, "id {id} out of range (0..{size})")
            }
        }
    }
}

impl core::error::Error for CommandError {}

/// Mutex exerciser operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutexOp {
    /// `+`
    Lock,
    /// `-`
    Unlock,
}

/// A parsed mutex exerciser command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MutexCommand {
    /// Mutex id.
    pub id: usize,
    /// Operation; `None` means the id alone was given.
    pub op: Option<MutexOp>,
}

/// A parsed spinlock exerciser command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpinlockCommand {
    /// Spinlock id.
    pub id: usize,
    /// How long to hold the lock.
    pub hold: Duration,
}

fn parse_id(field: &str) -> Result<usize, CommandError> {
    field
        .parse()
        .map_err(|_| CommandError::BadNumber(field.to_owned()))
}

impl MutexCommand {
    /// Parse `"<id> [+|-]"`.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut fields = line.split_whitespace();
        let id = parse_id(fields.next().ok_or(CommandError::Empty)?)?;
        let op = match fields.next() {
            None => None,
            Some("+") => Some(MutexOp::Lock),
            Some("-") => Some(MutexOp::Unlock),
            Some(other) => return Err(CommandError::BadOp(other.to_owned())),
        };
        if let Some(rest) = fields.next() {
            return Err(CommandError::TrailingInput(rest.to_owned()));
        }
        Ok(Self { id, op })
    }

    /// Run against `table`. A bare id does nothing.
    pub fn apply<P: Platform>(self, table: &MutexTable<P>) -> Result<(), CommandError> {
        if self.id >= table.len() {
            return Err(CommandError::IdOutOfRange {
                id: self.id,
                size: table.len(),
            });
        }
        match self.op {
            Some(MutexOp::Lock) => {
                table.lock(self.id);
                info!(id = self.id, "mutex locked");
            }
            Some(MutexOp::Unlock) => {
                table.unlock(self.id);
                info!(id = self.id, "mutex unlocked");
            }
            None => {}
        }
        Ok(())
    }
}

impl SpinlockCommand {
    /// Parse `"<id> [hold_ms]"`.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut fields = line.split_whitespace();
        let id = parse_id(fields.next().ok_or(CommandError::Empty)?)?;
        let hold_ms: u64 = match fields.next() {
            None => 0,
            Some(field) => field
                .parse()
                .map_err(|_| CommandError::BadNumber(field.to_owned()))?,
        };
        if let Some(rest) = fields.next() {
            return Err(CommandError::TrailingInput(rest.to_owned()));
        }
        Ok(Self {
            id,
            hold: Duration::from_millis(hold_ms),
        })
    }

    /// Take the lock with interrupts off, hold it, release it.
    pub fn apply<P: Platform>(self, table: &SpinlockTable<P>) -> Result<(), CommandError> {
        if self.id >= table.len() {
            return Err(CommandError::IdOutOfRange {
                id: self.id,
                size: table.len(),
            });
        }
        let flags = table.lock_irqsave(self.id);
        spin_for(self.hold);
        table.unlock_irqrestore(self.id, flags);
        info!(id = self.id, hold_ms = self.hold.as_millis(), "spinlock exercised");
        Ok(())
    }
}

/// Busy-wait for `hold`. The caller may be inside a spinlock with
/// interrupts off, so it must not sleep.
fn spin_for(hold: Duration) {
    let until = Instant::now() + hold;
    while Instant::now() < until {
        core::hint::spin_loop();
    }
}
