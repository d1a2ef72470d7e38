// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for inode shadows and the dentry cache.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use ambalink_abi::ambafs::{Stat, StatType};

use super::*;

fn file_stat(size: i64, mtime: u32) -> Stat {
    Stat {
        statp: 0,
        kind: StatType::File as i32,
        size,
        atime: mtime,
        mtime,
        ctime: mtime,
    }
}

fn file_inode(size: i64, mtime: u32) -> Inode {
    let inode = Inode::new(300, &file_stat(0, 0));
    inode.set_local(size, mtime);
    inode
}

// =============================================================================
// Update Rule
// =============================================================================

#[test]
fn test_matching_size_and_mtime_is_skipped() {
    let inode = file_inode(100, 50);
    assert!(!inode.update_from_stat(&file_stat(100, 50)));
    assert_eq!(inode.attrs().cache_purges, 0);
}

#[test]
fn test_newer_local_copy_is_skipped() {
    let inode = file_inode(100, 60);
    assert!(!inode.update_from_stat(&file_stat(200, 50)));
    assert_eq!(inode.attrs().size, 100);
    assert_eq!(inode.attrs().mtime, 60);
}

#[test]
fn test_created_for_write_with_content_is_skipped() {
    let inode = file_inode(10, 5);
    inode.insert_flags(InodeFlags::CREATE_FOR_WRITE);
    assert!(!inode.update_from_stat(&file_stat(0, 9)));
    assert_eq!(inode.attrs().size, 10);
}

#[test]
fn test_created_for_write_while_empty_is_updated() {
    let inode = file_inode(0, 5);
    inode.insert_flags(InodeFlags::CREATE_FOR_WRITE);
    assert!(inode.update_from_stat(&file_stat(64, 9)));
    assert_eq!(inode.attrs().size, 64);
    assert_eq!(inode.attrs().cache_purges, 0);
}

#[test]
fn test_changed_remote_purges_nonempty_cache() {
    let inode = file_inode(100, 50);
    let remote = Stat {
        atime: 70,
        ctime: 71,
        ..file_stat(300, 72)
    };
    assert!(inode.update_from_stat(&remote));

    let attrs = inode.attrs();
    assert_eq!(attrs.size, 300);
    assert_eq!((attrs.atime, attrs.mtime, attrs.ctime), (70, 72, 71));
    assert_eq!(attrs.cache_purges, 1);
}

#[test]
fn test_empty_inode_adopts_without_purge() {
    let inode = file_inode(0, 0);
    assert!(inode.update_from_stat(&file_stat(12, 3)));
    assert_eq!(inode.attrs().cache_purges, 0);
}

// =============================================================================
// Flags and Mode
// =============================================================================

#[test]
fn test_take_flags_clears_once() {
    let inode = file_inode(0, 0);
    inode.insert_flags(InodeFlags::SKIP_GET_STAT);
    assert!(inode.take_flags(InodeFlags::SKIP_GET_STAT));
    assert!(!inode.take_flags(InodeFlags::SKIP_GET_STAT));
    assert!(inode.flags().is_empty());
}

#[test]
fn test_take_flags_leaves_other_bits() {
    let inode = file_inode(0, 0);
    inode.insert_flags(InodeFlags::SKIP_GET_STAT | InodeFlags::CREATE_FOR_WRITE);
    inode.take_flags(InodeFlags::SKIP_GET_STAT);
    assert_eq!(inode.flags(), InodeFlags::CREATE_FOR_WRITE);
}

#[test]
fn test_mode_bits() {
    let file = Inode::new(1, &file_stat(0, 0));
    let dir = Inode::new(2, &Stat::of_type(StatType::Dir));
    assert_eq!(file.mode(), 0o100_744);
    assert_eq!(dir.mode(), 0o040_744);
    assert_eq!(InodeKind::from_stat(StatType::Null), InodeKind::Dir);
}

// =============================================================================
// Dentry Cache
// =============================================================================

#[test]
fn test_cache_starts_with_root() {
    let cache = InodeCache::new();
    let root = cache.root();
    assert_eq!(root.kind(), InodeKind::Dir);
    assert_eq!(root.nlink(), 2);
    assert!(root.ino() > ambalink_abi::ambafs::INO_MAX_RESERVED);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_alloc_numbers_are_unique() {
    let cache = InodeCache::new();
    let a = cache.alloc(&file_stat(0, 0));
    let b = cache.alloc(&file_stat(0, 0));
    assert_ne!(a.ino(), b.ino());
}

#[test]
fn test_get_or_alloc_reuses_same_kind_only() {
    let cache = InodeCache::new();
    let first = cache.get_or_alloc("/a", &file_stat(1, 1));
    let again = cache.get_or_alloc("/a", &file_stat(2, 2));
    assert!(Arc::ptr_eq(&first, &again));

    let as_dir = cache.get_or_alloc("/a", &Stat::of_type(StatType::Dir));
    assert!(!Arc::ptr_eq(&first, &as_dir));
    assert_eq!(cache.get("/a").unwrap().kind(), InodeKind::Dir);
}

#[test]
fn test_remove_tree_spares_siblings_with_common_prefix() {
    let cache = InodeCache::new();
    for path in ["/d", "/d/x", "/d/y/z", "/dd"] {
        cache.get_or_alloc(path, &file_stat(0, 0));
    }
    cache.remove_tree("/d");
    assert!(cache.get("/d").is_none());
    assert!(cache.get("/d/y/z").is_none());
    assert!(cache.get("/dd").is_some());
    assert!(cache.get("").is_some());
}

#[test]
fn test_rename_tree_moves_descendants_and_replaces_target() {
    let cache = InodeCache::new();
    let dir = cache.get_or_alloc("/old", &Stat::of_type(StatType::Dir));
    let child = cache.get_or_alloc("/old/f", &file_stat(0, 0));
    cache.get_or_alloc("/new", &Stat::of_type(StatType::Dir));
    cache.get_or_alloc("/new/stale", &file_stat(0, 0));

    cache.rename_tree("/old", "/new");

    assert!(Arc::ptr_eq(&cache.get("/new").unwrap(), &dir));
    assert!(Arc::ptr_eq(&cache.get("/new/f").unwrap(), &child));
    assert!(cache.get("/new/stale").is_none());
    assert!(cache.get("/old").is_none());
    assert!(cache.get("/old/f").is_none());
}
