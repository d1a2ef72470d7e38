// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Parsing of the Linux-only GPIO list.

/// GPIO numbers in a list separated by commas and spaces.
///
/// Tokens that are not unsigned integers (including empty ones between
/// adjacent separators) are skipped.
#[must_use]
pub fn parse_gpio_list(list: &[u8]) -> Vec<u32> {
    list.split(|&byte| byte == b',' || byte == b' ')
        .filter_map(parse_c_uint)
        .collect()
}

/// An unsigned integer with C base-0 rules.
///
/// `0x` selects hexadecimal, a leading `0` octal, anything else decimal.
/// One leading `+` and one trailing newline are accepted.
#[must_use]
pub fn parse_c_uint(token: &[u8]) -> Option<u32> {
    let token = token.strip_suffix(b"\n").unwrap_or(token);
    let token = token.strip_prefix(b"+").unwrap_or(token);
    let (digits, radix) = match token {
        [b'0', b'x' | b'X', rest @ ..] => (rest, 16),
        [b'0', rest @ ..] if !rest.is_empty() => (rest, 8),
        _ => (token, 10),
    };
    if digits.is_empty() {
        return None;
    }
    let text = core::str::from_utf8(digits).ok()?;
    if !text.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(text, radix).ok()
}
