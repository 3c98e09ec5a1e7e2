//! `writev` — positioned write, honoring the `write-is-append` and
//! `update-atomic` xdata contracts (spec §4.1).

use std::sync::Arc;

use crate::context::PosixFd;
use crate::error::{BrickError, BrickResult};

use super::{PosixEngine, Stat};

pub struct Args {
    pub offset: u64,
    pub data: Vec<u8>,
    /// `write-is-append` xdata: report whether this write landed at what
    /// was, at prestat time, the end of the file.
    pub is_append_intent: bool,
    /// `update-atomic` xdata: hold `write_atomic_lock` across prestat,
    /// write, and poststat so the caller observes a consistent pair.
    pub update_atomic: bool,
    /// `write-update-atomic` xdata: this write is itself the internal
    /// writer's protected operation, so it bypasses the
    /// `protect-from-external-writes` fence below rather than being
    /// refused by it.
    pub internal_write: bool,
}

pub struct Success {
    /// Set when `is_append_intent` was requested and this write's offset
    /// matched the prestat size (or the descriptor was append-only).
    pub was_append: bool,
    pub poststat: Option<Stat>,
}

pub async fn writev(engine: &PosixEngine, fd: &Arc<PosixFd>, args: Args) -> BrickResult<Success> {
    engine.check_writable()?;
    if fd.is_stale() {
        return Err(BrickError::FdStale);
    }

    let needs_lock = args.is_append_intent || args.update_atomic;
    let _guard = if needs_lock { Some(fd.inode.write_atomic_lock.lock().await) } else { None };

    let raw_fd = *fd.active_fd.lock().await;

    if !args.internal_write {
        let path = crate::handle::path_from_proc_fd(raw_fd)?;
        if xattr::get(&path, crate::xattr::keys::PROTECT_FROM_EXTERNAL_WRITES).ok().flatten().is_some() {
            return Err(BrickError::Busy);
        }
    }

    let prestat_size = if needs_lock { Some(fstat_size(raw_fd)?) } else { None };

    let was_append = args.is_append_intent
        && (fd.flags & libc::O_APPEND != 0 || prestat_size == Some(args.offset));

    raw_write(raw_fd, args.offset, &args.data, engine.config.linux_aio)?;

    if engine.config.ctime {
        let path = crate::handle::path_from_proc_fd(raw_fd)?;
        crate::xattr::mdata::bump_mtime(&path, crate::xattr::mdata::now())?;
    }

    if fd.flags & (libc::O_SYNC | libc::O_DSYNC) != 0 {
        unsafe { libc::fsync(raw_fd) };
    }

    let poststat = if args.update_atomic {
        Some(fstat(raw_fd)?)
    } else {
        None
    };

    Ok(Success { was_append, poststat })
}

fn raw_write(fd: std::os::unix::io::RawFd, offset: u64, data: &[u8], linux_aio: bool) -> BrickResult<()> {
    let written = if linux_aio {
        let iov = libc::iovec { iov_base: data.as_ptr() as *mut libc::c_void, iov_len: data.len() };
        unsafe { libc::pwritev(fd, &iov, 1, offset as libc::off_t) }
    } else {
        unsafe { libc::pwrite(fd, data.as_ptr() as *const libc::c_void, data.len(), offset as libc::off_t) }
    };
    if written < 0 || written as usize != data.len() {
        return Err(BrickError::last_os_error());
    }
    Ok(())
}

fn fstat_size(fd: std::os::unix::io::RawFd) -> BrickResult<u64> {
    Ok(fstat(fd)?.size)
}

fn fstat(fd: std::os::unix::io::RawFd) -> BrickResult<Stat> {
    let mut raw: libc::stat = unsafe { std::mem::zeroed() };
    if unsafe { libc::fstat(fd, &mut raw) } != 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(Stat {
        ino: raw.st_ino,
        mode: raw.st_mode,
        nlink: raw.st_nlink as u64,
        uid: raw.st_uid,
        gid: raw.st_gid,
        size: raw.st_size as u64,
        blocks: raw.st_blocks as u64,
        atime: raw.st_atime,
        mtime: raw.st_mtime,
        ctime: raw.st_ctime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfid::Gfid;
    use crate::posix::{create, testutil::test_engine};

    #[tokio::test]
    async fn writev_reports_append_at_file_end() {
        let (_dir, engine) = test_engine();
        let created = create::create(&engine, create::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: 0o644, flags: libc::O_RDWR, xattrs: Vec::new() })
            .await
            .unwrap();

        let result = writev(&engine, &created.fd, Args { offset: 0, data: b"hi".to_vec(), is_append_intent: true, update_atomic: false, internal_write: false })
            .await
            .unwrap();
        assert!(result.was_append);
    }

    #[tokio::test]
    async fn writev_update_atomic_reports_poststat() {
        let (_dir, engine) = test_engine();
        let created = create::create(&engine, create::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: 0o644, flags: libc::O_RDWR, xattrs: Vec::new() })
            .await
            .unwrap();

        let result = writev(&engine, &created.fd, Args { offset: 0, data: b"hi".to_vec(), is_append_intent: false, update_atomic: true, internal_write: false })
            .await
            .unwrap();
        assert_eq!(result.poststat.unwrap().size, 2);
    }

    #[tokio::test]
    async fn writev_uses_pwritev_path_when_linux_aio_enabled() {
        let (_dir, mut engine) = test_engine();
        engine.config.linux_aio = true;
        let created = create::create(&engine, create::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: 0o644, flags: libc::O_RDWR, xattrs: Vec::new() })
            .await
            .unwrap();

        writev(&engine, &created.fd, Args { offset: 0, data: b"hi".to_vec(), is_append_intent: false, update_atomic: false, internal_write: false })
            .await
            .unwrap();

        let path = engine.resolve_handle(&created.entry.gfid).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"hi");
    }

    #[tokio::test]
    async fn writev_bumps_mdata_mtime_when_enabled() {
        let (_dir, mut engine) = test_engine();
        engine.config.ctime = true;
        let created = create::create(&engine, create::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: 0o644, flags: libc::O_RDWR, xattrs: Vec::new() })
            .await
            .unwrap();

        writev(&engine, &created.fd, Args { offset: 0, data: b"hi".to_vec(), is_append_intent: false, update_atomic: false, internal_write: false })
            .await
            .unwrap();

        let path = engine.resolve_handle(&created.entry.gfid).unwrap();
        let mdata = crate::xattr::mdata::decode(&xattr::get(&path, crate::xattr::keys::MDATA).unwrap().unwrap()).unwrap();
        assert_eq!(mdata.ctime, mdata.mtime);
    }

    #[tokio::test]
    async fn writev_refuses_external_write_while_protected() {
        let (_dir, engine) = test_engine();
        let created = create::create(&engine, create::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: 0o644, flags: libc::O_RDWR, xattrs: Vec::new() })
            .await
            .unwrap();
        let path = engine.resolve_handle(&created.entry.gfid).unwrap();
        xattr::set(&path, crate::xattr::keys::PROTECT_FROM_EXTERNAL_WRITES, b"1").unwrap();

        let result = writev(&engine, &created.fd, Args { offset: 0, data: b"hi".to_vec(), is_append_intent: false, update_atomic: false, internal_write: false }).await;
        assert_eq!(result.err(), Some(BrickError::Busy));
    }

    #[tokio::test]
    async fn writev_internal_write_bypasses_protection() {
        let (_dir, engine) = test_engine();
        let created = create::create(&engine, create::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: 0o644, flags: libc::O_RDWR, xattrs: Vec::new() })
            .await
            .unwrap();
        let path = engine.resolve_handle(&created.entry.gfid).unwrap();
        xattr::set(&path, crate::xattr::keys::PROTECT_FROM_EXTERNAL_WRITES, b"1").unwrap();

        let result = writev(&engine, &created.fd, Args { offset: 0, data: b"hi".to_vec(), is_append_intent: false, update_atomic: false, internal_write: true }).await;
        assert!(result.is_ok());
    }
}
