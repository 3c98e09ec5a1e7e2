//! `readdir` / `readdirp` — paginated directory listing.
//!
//! Entries are read from the kernel in OS order and packed into the
//! caller's byte budget; the stream position is saved back onto the
//! [`PosixFd`] via `d_off` so the next call resumes exactly where this one
//! left off. Once the kernel reports end-of-directory, `dir_eof` latches
//! so a caller that re-requests the same offset gets an empty page
//! instead of re-running the scan (spec §4.1).

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::context::PosixFd;
use crate::error::{BrickError, BrickResult};

use super::{lstat_path, PosixEngine, Stat};

/// Fixed overhead charged per entry against the caller's byte budget,
/// independent of the real on-disk dirent size (spec §4.1 "byte-budget").
const ENTRY_OVERHEAD: usize = 24;

pub struct Entry {
    pub name: String,
    pub d_off: i64,
    pub d_ino: u64,
    pub d_type: u8,
    /// Present only for `readdirp`.
    pub attr: Option<Stat>,
}

pub struct Args {
    pub max_bytes: usize,
    pub with_stat: bool,
}

pub struct Success {
    pub entries: Vec<Entry>,
    pub eof: bool,
}

pub async fn readdir(engine: &PosixEngine, fd: &Arc<PosixFd>, args: Args) -> BrickResult<Success> {
    if fd.is_stale() {
        return Err(BrickError::FdStale);
    }
    if !fd.is_directory {
        return Err(BrickError::WrongType);
    }

    if fd.dir_eof.load(Ordering::Acquire) {
        return Ok(Success { entries: Vec::new(), eof: true });
    }

    let raw_fd = *fd.active_fd.lock().await;
    let dup_fd = unsafe { libc::dup(raw_fd) };
    if dup_fd < 0 {
        return Err(BrickError::last_os_error());
    }
    let dirp = unsafe { libc::fdopendir(dup_fd) };
    if dirp.is_null() {
        unsafe { libc::close(dup_fd) };
        return Err(BrickError::last_os_error());
    }

    let mut offset_guard = fd.dir_offset.lock().await;
    if let Some(offset) = *offset_guard {
        unsafe { libc::seekdir(dirp, offset as libc::c_long) };
    }

    let mut entries = Vec::new();
    let mut used = 0usize;
    let mut eof = false;
    let mut prev_offset = unsafe { libc::telldir(dirp) };

    loop {
        let raw = unsafe { libc::readdir(dirp) };
        if raw.is_null() {
            eof = true;
            break;
        }
        let entry = unsafe { &*raw };
        let name = c_str_to_string(entry.d_name.as_ptr());
        if name == "." || name == ".." {
            prev_offset = unsafe { libc::telldir(dirp) };
            continue;
        }

        let entry_cost = ENTRY_OVERHEAD + name.len();
        if used + entry_cost > args.max_bytes && !entries.is_empty() {
            unsafe { libc::seekdir(dirp, prev_offset) };
            break;
        }
        used += entry_cost;

        let attr = if args.with_stat {
            stat_child(engine, fd, &name).ok()
        } else {
            None
        };

        let d_off = unsafe { libc::telldir(dirp) };
        entries.push(Entry {
            name,
            d_off: d_off as i64,
            d_ino: entry.d_ino as u64,
            d_type: entry.d_type,
            attr,
        });
        prev_offset = d_off;

        if used >= args.max_bytes {
            break;
        }
    }

    *offset_guard = Some(unsafe { libc::telldir(dirp) } as u64);
    unsafe { libc::closedir(dirp) };

    if eof {
        fd.dir_eof.store(true, Ordering::Release);
    }

    Ok(Success { entries, eof })
}

fn c_str_to_string(ptr: *const libc::c_char) -> String {
    unsafe { std::ffi::CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

fn stat_child(engine: &PosixEngine, fd: &Arc<PosixFd>, name: &str) -> BrickResult<Stat> {
    let dir_path = engine.resolve_handle(&fd.inode.gfid)?;
    lstat_path(&dir_path.join(name))
}

pub async fn readdirp(engine: &PosixEngine, fd: &Arc<PosixFd>, mut args: Args) -> BrickResult<Success> {
    args.with_stat = true;
    readdir(engine, fd, args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfid::Gfid;
    use crate::posix::{mkdir, opendir, testutil::test_engine};

    #[tokio::test]
    async fn readdir_lists_created_children_and_reaches_eof() {
        let (_dir, engine) = test_engine();
        mkdir::mkdir(&engine, mkdir::Args { parent: Gfid::ROOT, name: "a".to_string(), mode: 0o755, preop_parent_xattr: None })
            .await
            .unwrap();
        mkdir::mkdir(&engine, mkdir::Args { parent: Gfid::ROOT, name: "b".to_string(), mode: 0o755, preop_parent_xattr: None })
            .await
            .unwrap();

        let dirfd = opendir::opendir(&engine, opendir::Args { gfid: Gfid::ROOT }).await.unwrap();
        let mut names: Vec<String> = Vec::new();
        loop {
            let page = readdir(&engine, &dirfd, Args { max_bytes: 4096, with_stat: false }).await.unwrap();
            names.extend(page.entries.into_iter().map(|e| e.name));
            if page.eof {
                break;
            }
        }
        assert!(names.contains(&"a".to_string()));
        assert!(names.contains(&"b".to_string()));
    }
}
