//! The 128-bit object identity used throughout the brick.
//!
//! A [`Gfid`] is invariant under rename and link: it is the one thing a
//! caller can hold onto across a path changing underneath it.

use std::fmt;

/// Number of raw bytes in a GFID, and the size of the `trusted.gfid` xattr.
pub const GFID_SIZE: usize = 16;

/// A 128-bit globally unique file identifier.
///
/// Uniformly random except for [`Gfid::ROOT`], which is reserved for the
/// brick root directory.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Gfid(pub [u8; GFID_SIZE]);

impl Gfid {
    /// The reserved root GFID, `00000000-0000-0000-0000-000000000001`.
    pub const ROOT: Gfid = Gfid([
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,
    ]);

    /// Generates a new random, non-root GFID.
    ///
    /// Draws from the OS randomness source; retries in the vanishingly
    /// unlikely case the draw collides with [`Gfid::ROOT`].
    pub fn new_random() -> Gfid {
        loop {
            let mut bytes = [0u8; GFID_SIZE];
            fill_random(&mut bytes);
            let candidate = Gfid(bytes);
            if candidate != Gfid::ROOT {
                return candidate;
            }
        }
    }

    /// The first fanout byte, `g[0]`, used as the first handle directory.
    pub fn fanout_hi(&self) -> u8 {
        self.0[0]
    }

    /// The second fanout byte, `g[1]`, used as the second handle directory.
    pub fn fanout_lo(&self) -> u8 {
        self.0[1]
    }

    /// Canonical dashed hex form, e.g. `8f3a2e10-...`.
    pub fn canonical(&self) -> String {
        let b = &self.0;
        format!(
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
        )
    }

    /// Parses the raw 16-byte xattr value produced by `getxattr("trusted.gfid")`.
    ///
    /// Per the Open Question resolution in SPEC_FULL.md §9, any length other
    /// than [`GFID_SIZE`] is treated as corruption, not partial data.
    pub fn from_xattr_value(value: &[u8]) -> Option<Gfid> {
        if value.len() != GFID_SIZE {
            return None;
        }
        let mut bytes = [0u8; GFID_SIZE];
        bytes.copy_from_slice(value);
        Some(Gfid(bytes))
    }

    /// The raw bytes as stored in the `trusted.gfid` xattr.
    pub fn as_xattr_value(&self) -> &[u8; GFID_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Gfid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gfid({})", self.canonical())
    }
}

impl fmt::Display for Gfid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

#[cfg(unix)]
fn fill_random(buf: &mut [u8; GFID_SIZE]) {
    // getrandom(2) rather than reading /dev/urandom: no fd to leak or
    // exhaust across the lifetime of a long-running brick process.
    let ret = unsafe { libc::getrandom(buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0) };
    if ret != buf.len() as isize {
        // Extremely unlikely short read; fill the remainder with a weaker
        // fallback rather than looping on a syscall that keeps partially
        // failing.
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        for (i, b) in buf.iter_mut().enumerate() {
            *b ^= (nanos >> (i % 16 * 4)) as u8;
        }
    }
}

#[cfg(not(unix))]
fn fill_random(buf: &mut [u8; GFID_SIZE]) {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    for (i, b) in buf.iter_mut().enumerate() {
        *b = (nanos >> (i % 16 * 4)) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_reserved_and_stable() {
        assert_eq!(Gfid::ROOT.0[15], 1);
        assert_eq!(&Gfid::ROOT.0[..15], &[0u8; 15]);
    }

    #[test]
    fn random_gfids_are_not_root() {
        for _ in 0..1000 {
            assert_ne!(Gfid::new_random(), Gfid::ROOT);
        }
    }

    #[test]
    fn xattr_round_trip() {
        let g = Gfid::new_random();
        let parsed = Gfid::from_xattr_value(g.as_xattr_value()).unwrap();
        assert_eq!(g, parsed);
    }

    #[test]
    fn corrupt_length_is_rejected() {
        assert!(Gfid::from_xattr_value(&[0u8; 15]).is_none());
        assert!(Gfid::from_xattr_value(&[0u8; 17]).is_none());
    }

    #[test]
    fn canonical_format_is_dashed_hex() {
        let g = Gfid::ROOT;
        assert_eq!(g.canonical(), "00000000-0000-0000-0000-000000000001");
    }
}
