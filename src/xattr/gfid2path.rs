//! The `trusted.gfid2path.<HASH>` reverse-path-index family.
//!
//! One record per link: `<pargfid_canonical><SEP><basename>`. `HASH`
//! disambiguates multiple links from the same parent with different
//! names (hard links); it is not meant to be reversed, only to give each
//! record a distinct key.

use super::keys::GFID2PATH_PREFIX;
use crate::gfid::Gfid;

/// Maximum length of the configured separator (spec §6).
pub const MAX_SEPARATOR_LEN: usize = 7;

/// Computes the 8 hex character disambiguation hash used in the key.
///
/// A simple FNV-1a over the parent GFID bytes and the basename: cheap,
/// stable, and collision-tolerant enough for "distinct key per link",
/// not a content hash anyone reverses.
pub fn hash(parent: &Gfid, basename: &str) -> String {
    let mut h: u64 = 0xcbf29ce484222325;
    for byte in parent.0.iter().chain(basename.as_bytes().iter()) {
        h ^= *byte as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    format!("{:08x}", (h ^ (h >> 32)) as u32)
}

/// Builds the xattr key for a `(parent, basename)` link record.
pub fn key_for(parent: &Gfid, basename: &str) -> String {
    format!("{GFID2PATH_PREFIX}{}", hash(parent, basename))
}

/// Encodes the xattr value for a link record.
pub fn encode(parent: &Gfid, basename: &str, separator: &str) -> Vec<u8> {
    let mut value = Vec::with_capacity(32 + separator.len() + basename.len());
    value.extend_from_slice(parent.canonical().as_bytes());
    value.extend_from_slice(separator.as_bytes());
    value.extend_from_slice(basename.as_bytes());
    value
}

/// Decodes a stored record back into `(parent, basename)`, given the
/// configured separator.
pub fn decode(value: &[u8], separator: &str) -> Option<(Gfid, String)> {
    let text = std::str::from_utf8(value).ok()?;
    let (pargfid_str, basename) = text.split_once(separator)?;
    let hex: String = pargfid_str.chars().filter(|c| *c != '-').collect();
    if hex.len() != 32 {
        return None;
    }
    let mut bytes = [0u8; 16];
    for i in 0..16 {
        bytes[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some((Gfid(bytes), basename.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let parent = Gfid::new_random();
        let sep = "/";
        let encoded = encode(&parent, "report.csv", sep);
        let (decoded_parent, decoded_name) = decode(&encoded, sep).unwrap();
        assert_eq!(decoded_parent, parent);
        assert_eq!(decoded_name, "report.csv");
    }

    #[test]
    fn hash_is_stable_for_same_input() {
        let parent = Gfid::new_random();
        assert_eq!(hash(&parent, "a"), hash(&parent, "a"));
    }

    #[test]
    fn hash_differs_for_different_basenames() {
        let parent = Gfid::new_random();
        assert_ne!(hash(&parent, "a"), hash(&parent, "b"));
    }
}
