// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the remote filesystem wire format.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;

#[test]
fn command_codes_are_bit_exact() {
    assert_eq!(Command::LsInit as u8, 0);
    assert_eq!(Command::Stat as u8, 3);
    assert_eq!(Command::Rename as u8, 12);
    assert_eq!(Command::Volsize as u8, 17);
    assert_eq!(Command::QuickStat as u8, 18);
    for raw in 0..=18u8 {
        assert_eq!(Command::from_u8(raw).unwrap() as u8, raw);
    }
    assert_eq!(Command::from_u8(19), None);
}

#[test]
fn header_layout() {
    let mut buf = [0u8; 16];
    let header = MsgHeader {
        cmd: Command::Mkdir as u8,
        flag: 16,
        len: 0x0102,
        xfr: 0xAABB_CCDD,
    };
    header.write(&mut buf).unwrap();
    assert_eq!(&buf[..8], &[10, 16, 0x02, 0x01, 0xDD, 0xCC, 0xBB, 0xAA]);
    assert_eq!(MsgHeader::read(&buf), Some(header));
    assert_eq!(header.command(), Some(Command::Mkdir));
}

#[test]
fn stat_fields_at_documented_offsets() {
    let mut buf = [0u8; 64];
    let stat = Stat {
        statp: 0x11,
        kind: StatType::File as i32,
        size: 0x1_0000_0002,
        atime: 3,
        mtime: 4,
        ctime: 5,
    };
    let stride = stat.encode(&mut buf, 0, b"abc").unwrap();
    assert_eq!(stride, 32);
    assert_eq!(buf[4], 1);
    assert_eq!(buf[8], 2);
    assert_eq!(buf[12], 1);
    assert_eq!(buf[16], 3);
    assert_eq!(buf[20], 4);
    assert_eq!(buf[24], 5);
    assert_eq!(&buf[28..32], b"abc\0");

    let (decoded, name) = Stat::decode_with_name(&buf, 0).unwrap();
    assert_eq!(decoded, stat);
    assert_eq!(name, b"abc");
}

#[test]
fn record_stride_is_eight_aligned() {
    assert_eq!(stat_record_stride(0), 32);
    assert_eq!(stat_record_stride(3), 32);
    assert_eq!(stat_record_stride(4), 40);
    assert_eq!(stat_record_stride(11), 40);
    assert_eq!(stat_record_stride(12), 48);
}

#[test]
fn negative_type_is_error_code() {
    let stat = Stat {
        kind: -5,
        ..Stat::default()
    };
    assert_eq!(stat.error_code(), Some(-5));
    assert_eq!(stat.stat_type(), StatType::Null);
    assert_eq!(Stat::of_type(StatType::Dir).error_code(), None);
}

#[test]
fn qstat_overlay() {
    let mut buf = [0u8; QSTAT_SIZE];
    let qstat = Qstat {
        stat: Stat {
            kind: StatType::Dir as i32,
            size: 7,
            mtime: 9,
            ..Stat::default()
        },
        magic: QSTAT_MAGIC,
    };
    qstat.encode(&mut buf, 0).unwrap();
    assert_eq!(buf[28], 2);
    assert_eq!(buf[32], 7);
    assert_eq!(buf[44], 9);
    assert_eq!(&buf[56..60], &QSTAT_MAGIC.to_le_bytes());
    let decoded = Qstat::decode(&buf, 0).unwrap();
    assert!(decoded.is_complete());
    assert_eq!(decoded.stat.stat_type(), StatType::Dir);
}

#[test]
fn truncated_records_are_rejected() {
    let buf = [0u8; 20];
    assert_eq!(Stat::decode(&buf, 0), None);
    assert_eq!(Qstat::decode(&[0u8; 40], 0), None);
    let mut small = [0u8; 30];
    assert_eq!(Stat::default().encode(&mut small, 0, b"abcdef"), None);
}
