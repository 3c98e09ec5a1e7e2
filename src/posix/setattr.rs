//! `setattr` / `fsetattr` — change mode, ownership, and/or timestamps.

use std::sync::Arc;

use crate::context::PosixFd;
use crate::error::{BrickError, BrickResult};
use crate::gfid::Gfid;

use super::{stat_path, PosixEngine, Stat};

/// A partial attribute update; `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttrUpdate {
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    /// Seconds-resolution atime/mtime; `None` leaves the timestamp as-is.
    pub atime: Option<i64>,
    pub mtime: Option<i64>,
}

pub struct Args {
    pub gfid: Gfid,
    pub update: AttrUpdate,
}

pub async fn setattr(engine: &PosixEngine, args: Args) -> BrickResult<Stat> {
    engine.check_writable()?;
    let path = engine.resolve_handle(&args.gfid)?;
    apply(&path, &args.update)?;
    if engine.config.ctime {
        crate::xattr::mdata::bump_ctime(&path, crate::xattr::mdata::now())?;
    }
    stat_path(&path)
}

pub async fn fsetattr(engine: &PosixEngine, fd: &Arc<PosixFd>, update: AttrUpdate) -> BrickResult<()> {
    if fd.is_stale() {
        return Err(BrickError::FdStale);
    }
    let raw_fd = *fd.active_fd.lock().await;
    if let Some(mode) = update.mode {
        if unsafe { libc::fchmod(raw_fd, mode as libc::mode_t) } != 0 {
            return Err(BrickError::last_os_error());
        }
    }
    if update.uid.is_some() || update.gid.is_some() {
        let uid = update.uid.map(|u| u as libc::uid_t).unwrap_or(u32::MAX as libc::uid_t);
        let gid = update.gid.map(|g| g as libc::gid_t).unwrap_or(u32::MAX as libc::gid_t);
        if unsafe { libc::fchown(raw_fd, uid, gid) } != 0 {
            return Err(BrickError::last_os_error());
        }
    }
    if engine.config.ctime {
        let path = crate::handle::path_from_proc_fd(raw_fd)?;
        crate::xattr::mdata::bump_ctime(&path, crate::xattr::mdata::now())?;
    }
    Ok(())
}

fn apply(path: &std::path::Path, update: &AttrUpdate) -> BrickResult<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| BrickError::InvalidArgument)?;

    if let Some(mode) = update.mode {
        if unsafe { libc::chmod(c_path.as_ptr(), mode as libc::mode_t) } != 0 {
            return Err(BrickError::last_os_error());
        }
    }
    if update.uid.is_some() || update.gid.is_some() {
        let uid = update.uid.map(|u| u as libc::uid_t).unwrap_or(u32::MAX as libc::uid_t);
        let gid = update.gid.map(|g| g as libc::gid_t).unwrap_or(u32::MAX as libc::gid_t);
        if unsafe { libc::chown(c_path.as_ptr(), uid, gid) } != 0 {
            return Err(BrickError::last_os_error());
        }
    }
    if update.atime.is_some() || update.mtime.is_some() {
        let to_timespec = |secs: Option<i64>| libc::timespec {
            tv_sec: secs.unwrap_or(0),
            tv_nsec: if secs.is_some() { 0 } else { libc::UTIME_OMIT },
        };
        let times = [to_timespec(update.atime), to_timespec(update.mtime)];
        if unsafe { libc::utimensat(libc::AT_FDCWD, c_path.as_ptr(), times.as_ptr(), 0) } != 0 {
            return Err(BrickError::last_os_error());
        }
    }
    Ok(())
}
