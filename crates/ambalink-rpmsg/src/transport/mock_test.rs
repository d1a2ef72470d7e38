// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the in-process RTOS peers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use ambalink_abi::ambafs::{
    Command, MSG_PARAM_OFFSET, MsgHeader, NAMEI_BUF_SIZE, Stat, StatType,
};
use ambalink_abi::codec;
use ambalink_ipc::platform::CoreCache;

use super::*;

type Peer = MockRemoteFs<CoreCache>;

fn request(cmd: Command, flag: u8, path: &str) -> (Vec<u8>, usize) {
    let mut msg = vec![0u8; NAMEI_BUF_SIZE];
    let len = codec::put_c_str(&mut msg, MSG_PARAM_OFFSET, path.as_bytes()).unwrap();
    MsgHeader {
        cmd: cmd as u8,
        flag,
        len: u16::try_from(len).unwrap(),
        xfr: 0,
    }
    .write(&mut msg)
    .unwrap();
    (msg, len)
}

fn names(msg: &[u8]) -> Vec<String> {
    let mut offset = MSG_PARAM_OFFSET;
    let mut out = Vec::new();
    for _ in 0..msg[1] {
        let (_, name) = Stat::decode_with_name(msg, offset).unwrap();
        out.push(String::from_utf8(name.to_vec()).unwrap());
        offset += ambalink_abi::ambafs::stat_record_stride(name.len());
    }
    out
}

fn peer_with_tree() -> Peer {
    let peer = Peer::new("c:", None);
    peer.add_dir("c:/docs");
    peer.add_file("c:/docs/a.txt", 10, 5);
    peer.add_file("c:/docs/b.txt", 20, 6);
    peer.add_file("c:/docs/c.txt", 30, 7);
    peer
}

#[test]
fn test_listing_batches_follow_session() {
    let peer = peer_with_tree();
    let (mut msg, len) = request(Command::LsInit, 2, "c:/docs/*");
    peer.exec(&mut msg, len).unwrap();
    assert_eq!(names(&msg), [".", ".."]);
    assert_eq!(peer.open_listings(), 1);

    let xfr = MsgHeader::read(&msg).unwrap().xfr;
    let mut next = |msg: &mut Vec<u8>| {
        MsgHeader {
            cmd: Command::LsNext as u8,
            flag: 2,
            len: 4,
            xfr,
        }
        .write(msg)
        .unwrap();
        peer.exec(msg, 4).unwrap();
        names(msg)
    };
    assert_eq!(next(&mut msg), ["a.txt", "b.txt"]);
    assert_eq!(next(&mut msg), ["c.txt"]);
    assert!(next(&mut msg).is_empty());

    MsgHeader {
        cmd: Command::LsExit as u8,
        flag: 0,
        len: 4,
        xfr,
    }
    .write(&mut msg)
    .unwrap();
    assert_eq!(peer.exec(&mut msg, 4), Err(TransportError::NoReply));
    assert_eq!(peer.open_listings(), 0);
}

#[test]
fn test_listing_missing_dir_reports_error_code() {
    let peer = peer_with_tree();
    let (mut msg, len) = request(Command::LsInit, 16, "c:/nope/*");
    peer.exec(&mut msg, len).unwrap();
    assert_eq!(msg[1], 0);
    let stat = Stat::decode(&msg, MSG_PARAM_OFFSET).unwrap();
    assert_eq!(stat.error_code(), Some(-2));
    assert_eq!(peer.open_listings(), 0);
}

#[test]
fn test_stat_reports_node_or_nothing() {
    let peer = peer_with_tree();
    let (mut msg, len) = request(Command::Stat, 0, "c:/docs/b.txt");
    peer.exec(&mut msg, len).unwrap();
    assert_eq!(msg[1], 1);
    let stat = Stat::decode(&msg, MSG_PARAM_OFFSET).unwrap();
    assert_eq!(stat.stat_type(), StatType::File);
    assert_eq!((stat.size, stat.mtime), (20, 6));

    let (mut msg, len) = request(Command::Stat, 0, "c:/docs/zzz");
    peer.exec(&mut msg, len).unwrap();
    assert_eq!(msg[1], 0);
    assert_eq!(peer.calls(Command::Stat), 2);
}

#[test]
fn test_rename_moves_subtree() {
    let peer = peer_with_tree();
    let mut msg = vec![0u8; NAMEI_BUF_SIZE];
    let new_len = codec::put_c_str(&mut msg, MSG_PARAM_OFFSET, b"c:/papers").unwrap();
    let old_len = codec::put_c_str(&mut msg, MSG_PARAM_OFFSET + new_len, b"c:/docs").unwrap();
    let len = new_len + old_len;
    MsgHeader {
        cmd: Command::Rename as u8,
        flag: 0,
        len: u16::try_from(len).unwrap(),
        xfr: 0,
    }
    .write(&mut msg)
    .unwrap();

    peer.exec(&mut msg, len).unwrap();
    assert_eq!(msg[1], 1);
    assert!(peer.node("c:/docs").is_none());
    assert_eq!(peer.node("c:/papers/a.txt").unwrap().size, 10);
}

#[test]
fn test_rmdir_refuses_nonempty_directory() {
    let peer = peer_with_tree();
    let (mut msg, len) = request(Command::Rmdir, 0, "c:/docs");
    peer.exec(&mut msg, len).unwrap();
    assert_eq!(msg[1], 1);
    assert!(peer.node("c:/docs").is_some());
}

#[test]
fn test_silent_peer_never_replies() {
    let peer = peer_with_tree();
    peer.set_silent(true);
    let (mut msg, len) = request(Command::Stat, 0, "c:/docs");
    assert_eq!(peer.exec(&mut msg, len), Err(TransportError::NoReply));
}

#[test]
fn test_oversized_request_is_rejected() {
    let peer = peer_with_tree();
    let mut msg = vec![0u8; 16];
    assert_eq!(
        peer.exec(&mut msg, 9),
        Err(TransportError::TooLarge { len: 17, max: 16 })
    );
}

#[test]
fn test_send_delivers_reply_to_callback() {
    let peer = peer_with_tree();
    let (msg, len) = request(Command::Stat, 0, "c:/docs/a.txt");
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    peer.send(
        &msg,
        len,
        Some(Box::new(move |reply: &[u8]| {
            *sink.lock().unwrap() = Some(reply[1]);
        })),
    )
    .unwrap();
    assert_eq!(*seen.lock().unwrap(), Some(1));
}

#[test]
fn test_channel_records_and_answers() {
    let channel = Arc::new(MockChannel::new());
    let echoes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&echoes);
    channel.set_responder(move |data| sink.lock().unwrap().push(data.len()));

    channel.send(&[1, 2, 3]).unwrap();
    channel.send(&[4]).unwrap();

    assert_eq!(channel.sent(), vec![vec![1, 2, 3], vec![4]]);
    assert_eq!(*echoes.lock().unwrap(), vec![3, 1]);
}
