// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! A short ambafs session against the simulated RTOS.

use std::io::Write;
use std::sync::Arc;

use ambalink_abi::SoftIrq;
use ambalink_abi::ambafs::Command;
use ambalink_ipc::platform::{CoreCache, MockPlatform};
use ambalink_rpmsg::ambafs::{Fill, InodeKind, ReadDir};
use ambalink_rpmsg::transport::MockRemoteFs;
use ambalink_rpmsg::{FsClient, FsConfig};

use crate::SimError;
use crate::board::Board;

/// Session parameters.
pub struct FsOptions {
    pub root: String,
    pub files: usize,
    pub batch: u8,
    pub page: usize,
}

type Peer = MockRemoteFs<CoreCache>;

const fn kind_name(kind: InodeKind) -> &'static str {
    match kind {
        InodeKind::File => "file",
        InodeKind::Dir => "dir",
    }
}

/// Populate the remote tree, list it page by page and revalidate.
pub fn run(out: &mut impl Write, board: &Board, opts: &FsOptions) -> Result<(), SimError> {
    let root = opts.root.as_str();
    let peer = Arc::new(Peer::new(root, Some(board.rtos_region())));
    peer.add_dir(&format!("{root}/DCIM"));
    peer.add_dir(&format!("{root}/DCIM/100MEDIA"));
    peer.add_dir(&format!("{root}/MISC"));
    for index in 0..opts.files {
        let size = 0x0010_0000 + i64::try_from(index).unwrap_or(0) * 0x400;
        peer.add_file(&format!("{root}/DCIM/IMG_{index:04}.JPG"), size, 1000);
    }

    let config = FsConfig::new(root)
        .with_ls_batch(opts.batch)
        .with_qstat_kick(SoftIrq::VRING_C0_TO_C1_KICK, 1024);
    let client = FsClient::<MockPlatform, Arc<Peer>>::new(Arc::clone(&peer), config)
        .with_quick_stat(board.linux_region(), board.scratch, Some(Arc::new(board.bus.clone())))?;

    for name in ["DCIM", "MISC"] {
        if client.lookup("", name)?.is_none() {
            writeln!(out, "lookup {name}: missing")?;
        }
    }

    writeln!(out, "listing {root}/DCIM, {} entries per page", opts.page)?;
    let mut handle = client.open_dir("/DCIM")?;
    let mut pages = 0;
    loop {
        let mut entries = Vec::new();
        let outcome = client.read_dir(&mut handle, |entry| {
            if entries.len() == opts.page {
                return Fill::Full;
            }
            entries.push(format!(
                "{:>6}  {:<14} ino {:<5} {}",
                entry.offset,
                entry.name,
                entry.ino,
                kind_name(entry.kind)
            ));
            Fill::Continue
        })?;
        pages += 1;
        writeln!(out, "page {pages}")?;
        for line in &entries {
            writeln!(out, "{line}")?;
        }
        if outcome == ReadDir::Done {
            break;
        }
    }
    client.close_dir(handle);

    if let Some(dir) = client.inode("/DCIM") {
        writeln!(out, "DCIM nlink {}", dir.nlink())?;
    }
    if opts.files > 0 {
        let attrs = client.getattr("/DCIM/IMG_0000.JPG")?;
        writeln!(out, "IMG_0000.JPG size {} mtime {}", attrs.size, attrs.mtime)?;
    }

    peer.remove(&format!("{root}/MISC"));
    for path in ["/DCIM", "/MISC"] {
        let valid = client.revalidate(path)?;
        writeln!(out, "revalidate {path}: {}", if valid { "valid" } else { "stale" })?;
    }

    writeln!(
        out,
        "remote calls: init {} next {} exit {} stat {} quick-stat {}",
        peer.calls(Command::LsInit),
        peer.calls(Command::LsNext),
        peer.calls(Command::LsExit),
        peer.calls(Command::Stat),
        peer.calls(Command::QuickStat),
    )?;
    Ok(())
}
