//! Chained-octet primitive shared by FSPEC and extensible items.
//!
//! Both are "read a part, check its trailing FX bit, stop or continue". The
//! first part may be wider than one octet (e.g. the 2-octet primary of the
//! CAT21 SGV subfield); every later part is one octet. FX is always the least
//! significant bit of a part's last octet.

use crate::types::{need, Result};

const FX: u8 = 0x01;

/// Length in bytes of the FX chain starting at `pos`.
///
/// Fails with `TruncatedBuffer` when the buffer ends while FX is still set.
pub fn chain_len(buf: &[u8], pos: usize, first: usize) -> Result<usize> {
    let first = first.max(1);
    need(buf, pos, first)?;
    let mut len = first;
    while buf[pos + len - 1] & FX != 0 {
        need(buf, pos, len + 1)?;
        len += 1;
    }
    Ok(len)
}

/// Split a chain into its parts (first part `first` octets wide).
pub fn parts(chain: &[u8], first: usize) -> Vec<&[u8]> {
    let first = first.max(1).min(chain.len());
    let mut parts = Vec::with_capacity(chain.len().saturating_sub(first) + 1);
    if chain.is_empty() {
        return parts;
    }
    parts.push(&chain[..first]);
    parts.extend(chain[first..].chunks(1));
    parts
}

/// Presence bits of a chain: the high 7 bits of every octet, MSB first.
pub fn presence_bits(chain: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(chain.len() * 7);
    for &octet in chain {
        for shift in (1..8).rev() {
            bits.push((octet >> shift) & 1 == 1);
        }
    }
    bits
}

/// Presence bits of a single 8-bit indicator octet without FX.
pub fn octet_bits(octet: u8) -> Vec<bool> {
    (0..8).rev().map(|shift| (octet >> shift) & 1 == 1).collect()
}

/// True if the part's trailing FX bit is set.
pub fn has_fx(part: &[u8]) -> bool {
    part.last().is_some_and(|b| b & FX != 0)
}
