//! The `trusted.pgfid.<PARENT>` parent-link-count family.
//!
//! Each non-directory object carries one counter per distinct parent
//! directory it is linked from; the sum across all counters equals
//! `st_nlink - 1` (spec invariant 3).

use byteorder::{BigEndian, ByteOrder};

use crate::error::{BrickError, BrickResult};
use crate::gfid::Gfid;

use super::keys::PGFID_PREFIX;

/// Big-endian 32-bit counter width stored in a `pgfid.*` xattr value.
pub const COUNTER_SIZE: usize = 4;

/// Builds the xattr key for the pgfid counter of `parent`.
pub fn key_for(parent: &Gfid) -> String {
    format!("{PGFID_PREFIX}{}", parent.canonical())
}

/// Parses the parent GFID out of a `trusted.pgfid.<PARENT>` key.
pub fn parent_from_key(key: &str) -> Option<Gfid> {
    let suffix = key.strip_prefix(PGFID_PREFIX)?;
    parse_canonical(suffix)
}

fn parse_canonical(s: &str) -> Option<Gfid> {
    let hex: String = s.chars().filter(|c| *c != '-').collect();
    if hex.len() != 32 {
        return None;
    }
    let mut bytes = [0u8; 16];
    for i in 0..16 {
        bytes[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(Gfid(bytes))
}

/// Decodes a stored counter value. A missing attribute is treated as `0`
/// by the caller before this is ever invoked.
pub fn decode(value: &[u8]) -> BrickResult<u32> {
    if value.len() != COUNTER_SIZE {
        return Err(BrickError::InvalidArgument);
    }
    Ok(BigEndian::read_u32(value))
}

/// Encodes a counter value for storage.
pub fn encode(count: u32) -> [u8; COUNTER_SIZE] {
    let mut buf = [0u8; COUNTER_SIZE];
    BigEndian::write_u32(&mut buf, count);
    buf
}
