//! `statfs` — filesystem-level capacity and inode statistics.
//!
//! When `export_statfs_size` is disabled the engine reports a zeroed
//! block/inode count so the caller falls back to whatever default the
//! translator above it applies (spec §4.1). `shared_brick_count` divides
//! the reported capacity among the bricks sharing this backing
//! filesystem, so a caller summing across bricks doesn't overcount.

use crate::error::{BrickError, BrickResult};

use super::PosixEngine;

#[derive(Debug, Clone, Copy)]
pub struct Statfs {
    pub block_size: u64,
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_available: u64,
    pub files: u64,
    pub files_free: u64,
}

pub async fn statfs(engine: &PosixEngine) -> BrickResult<Statfs> {
    if !engine.config.export_statfs_size {
        return Ok(Statfs { block_size: 4096, blocks: 0, blocks_free: 0, blocks_available: 0, files: 0, files_free: 0 });
    }

    use std::os::unix::ffi::OsStrExt;
    let mut raw: libc::statvfs = unsafe { std::mem::zeroed() };
    let c_path = std::ffi::CString::new(engine.root.path().as_os_str().as_bytes())
        .map_err(|_| BrickError::InvalidArgument)?;
    if unsafe { libc::statvfs(c_path.as_ptr(), &mut raw) } != 0 {
        return Err(BrickError::last_os_error());
    }

    let shared = engine.config.shared_brick_count.max(1) as u64;
    Ok(Statfs {
        block_size: raw.f_frsize as u64,
        blocks: raw.f_blocks as u64 / shared,
        blocks_free: raw.f_bfree as u64 / shared,
        blocks_available: raw.f_bavail as u64 / shared,
        files: raw.f_files as u64,
        files_free: raw.f_ffree as u64,
    })
}
