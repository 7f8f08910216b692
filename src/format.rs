//! Formatting helpers for addresses and byte buffers as they appear on the
//! wire (`0x`-prefixed fixed-width hex for addresses, space-separated
//! uppercase pairs for byte dumps).

use itertools::Itertools;
use serde::Serializer;

/// Address-sized integer of the debugged target.
pub type Address = u64;

/// Format an address as `0x`-prefixed, zero-padded 16-digit uppercase hex.
pub fn format_address(addr: Address) -> String {
    format!("0x{addr:016X}")
}

/// Format a value as bare hex without prefix or padding.
pub fn format_hex(value: u64) -> String {
    format!("{value:X}")
}

/// Format bytes as space-separated uppercase hex pairs.
pub fn format_bytes_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).join(" ")
}

/// Format bytes as a contiguous uppercase hex string.
pub fn format_bytes_compact(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).join("")
}

/// Parse a hex byte string into raw bytes. Spaces, tabs, newlines, commas
/// and `0x` prefixes are skipped, so "0x90 0x90", "90,90" and "9090" all
/// parse to the same buffer. A trailing unpaired nibble is dropped.
pub fn parse_hex_bytes(hex: &str) -> Vec<u8> {
    let mut clean = String::with_capacity(hex.len());
    let mut chars = hex.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ' ' | ',' | '\t' | '\n' | '\r' => {}
            '0' if matches!(chars.peek(), Some('x') | Some('X')) => {
                chars.next();
            }
            _ => clean.push(c),
        }
    }

    clean
        .as_bytes()
        .chunks_exact(2)
        .filter_map(|pair| {
            let s = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(s, 16).ok()
        })
        .collect()
}

/// Parse an address string (with or without `0x` prefix) as hex.
pub fn parse_address(s: &str) -> Option<Address> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    Address::from_str_radix(digits, 16).ok()
}

/// Printable-ASCII preview of a byte buffer, non-printables replaced by '.'.
pub fn ascii_preview(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if (0x20..0x7f).contains(&b) {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

/// Serde serializer rendering an address field as a hex string.
pub fn serialize_address<S: Serializer>(addr: &Address, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_address(*addr))
}
