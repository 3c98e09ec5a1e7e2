//! The `xattrop`/`fxattrop` atomic read-modify-write primitive (spec §4.1).
//!
//! All variants are meant to be applied under the target inode's
//! `xattrop_lock`; this module is pure value transformation and leaves
//! locking and the actual xattr read/write syscalls to
//! `src/posix/xattrop.rs`.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{BrickError, BrickResult};

/// The width of each vector element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Bits32,
    Bits64,
}

impl Width {
    fn byte_len(self) -> usize {
        match self {
            Width::Bits32 => 4,
            Width::Bits64 => 8,
        }
    }
}

/// The requested `xattrop` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Add the caller's vector componentwise to the on-disk value,
    /// creating it as zeros if absent.
    AddArray(Width),
    /// The caller sends two concatenated vectors (`new`, `default`); where
    /// the on-disk value is absent or zero per component, the result is
    /// `new + default`, otherwise `current + new`.
    AddArrayWithDefault(Width),
    /// Atomically return the prior value and replace it with the supplied
    /// one.
    GetAndSet,
}

/// Zero-extends `value` to the next multiple of `width`'s byte length.
///
/// Resolves the Open Question in spec §9: the original zero-extends a
/// short tail rather than erroring.
fn zero_extend(value: &[u8], width: usize) -> Vec<u8> {
    let remainder = value.len() % width;
    if remainder == 0 {
        return value.to_vec();
    }
    let mut extended = value.to_vec();
    extended.resize(value.len() + (width - remainder), 0);
    extended
}

fn read_vec(value: &[u8], width: Width) -> Vec<i64> {
    let extended = zero_extend(value, width.byte_len());
    extended
        .chunks(width.byte_len())
        .map(|chunk| match width {
            Width::Bits32 => BigEndian::read_i32(chunk) as i64,
            Width::Bits64 => BigEndian::read_i64(chunk),
        })
        .collect()
}

fn write_vec(values: &[i64], width: Width) -> Vec<u8> {
    let mut out = vec![0u8; values.len() * width.byte_len()];
    for (i, v) in values.iter().enumerate() {
        let chunk = &mut out[i * width.byte_len()..(i + 1) * width.byte_len()];
        match width {
            Width::Bits32 => BigEndian::write_i32(chunk, *v as i32),
            Width::Bits64 => BigEndian::write_i64(chunk, *v),
        }
    }
    out
}

/// The result of applying an opcode: the value to persist, and the prior
/// value to return in the reply (spec §4.1: "the prior value is always
/// returned").
pub struct Applied {
    pub prior: Vec<u8>,
    pub next: Vec<u8>,
}

/// Applies `opcode` to `current` (the on-disk value, or `None` if absent)
/// with caller-supplied `operand`.
pub fn apply(opcode: Opcode, current: Option<&[u8]>, operand: &[u8]) -> BrickResult<Applied> {
    match opcode {
        Opcode::GetAndSet => {
            let prior = current.map(|v| v.to_vec()).unwrap_or_default();
            Ok(Applied { prior, next: operand.to_vec() })
        }
        Opcode::AddArray(width) => {
            let delta = read_vec(operand, width);
            let current_vec = match current {
                Some(v) => read_vec(v, width),
                None => vec![0i64; delta.len()],
            };
            if current_vec.len() != delta.len() {
                return Err(BrickError::InvalidArgument);
            }
            let next: Vec<i64> =
                current_vec.iter().zip(delta.iter()).map(|(c, d)| c.wrapping_add(*d)).collect();
            Ok(Applied {
                prior: current.map(|v| v.to_vec()).unwrap_or_else(|| write_vec(&current_vec, width)),
                next: write_vec(&next, width),
            })
        }
        Opcode::AddArrayWithDefault(width) => {
            // The operand is two concatenated vectors of equal length,
            // `new` followed by `default`; zero-extend first so an odd
            // total still splits evenly.
            let extended = zero_extend(operand, 2 * width.byte_len());
            let half = extended.len() / 2;
            let new = read_vec(&extended[..half], width);
            let default = read_vec(&extended[half..], width);
            let current_vec: Vec<i64> = match current {
                Some(v) => read_vec(v, width),
                None => vec![0i64; new.len()],
            };
            let next: Vec<i64> = (0..new.len())
                .map(|i| {
                    let cur = current_vec.get(i).copied().unwrap_or(0);
                    if cur == 0 {
                        new[i].wrapping_add(default.get(i).copied().unwrap_or(0))
                    } else {
                        cur.wrapping_add(new[i])
                    }
                })
                .collect();
            Ok(Applied {
                prior: current.map(|v| v.to_vec()).unwrap_or_else(|| write_vec(&current_vec, width)),
                next: write_vec(&next, width),
            })
        }
    }
}
