//! `unlink` — remove one name for a non-directory object (spec §4.1).
//!
//! When the removed name was the last link but the object still has open
//! descriptors, the handle is staged under `.glusterfs/unlink/<gfid>`
//! instead of being deleted outright, and the inode's `unlink_flag` is
//! set; the release path finalizes the delete once the last descriptor
//! closes.

use crate::error::{BrickError, BrickResult};
use crate::gfid::Gfid;
use crate::handle;

use super::{adjust_pgfid_counter, lstat_path, stat_path, update_gfid2path, PosixEngine, Stat};

pub struct Args {
    pub parent: Gfid,
    pub name: String,
    /// `skip-open-fd-unlink` xdata: refuse the unlink outright if the
    /// object has open descriptors, rather than staging it.
    pub skip_open_fd_unlink: bool,
}

pub struct Success {
    pub parent_attr: Stat,
    /// `link-count` xdata: the object's remaining nlink after removal,
    /// when it is still known (not staged away).
    pub link_count: Option<u64>,
}

pub async fn unlink(engine: &PosixEngine, args: Args) -> BrickResult<Success> {
    engine.check_writable()?;

    let parent_path = engine.resolve_handle(&args.parent)?;
    let path = parent_path.join(&args.name);
    let gfid = engine.read_gfid(&path)?;

    let ctx = engine.inode_ctx(gfid).await;
    if args.skip_open_fd_unlink && ctx.open_fds() > 0 {
        return Err(BrickError::Busy);
    }

    raw_unlink(&path)?;

    if engine.config.update_link_count_parent {
        let _guard = ctx.pgfid_lock.lock().await;
        adjust_pgfid_counter(&engine.root.handle_abs_path(&gfid), &args.parent, -1)?;
    }
    update_gfid2path(&engine.config, &engine.root.handle_abs_path(&gfid), &args.parent, &args.name, true)?;

    let handle_path = engine.root.handle_abs_path(&gfid);
    let link_count = match lstat_path(&handle_path) {
        Ok(stat) => {
            if stat.nlink <= 1 {
                if ctx.open_fds() > 0 {
                    ctx.mark_unlinked();
                    handle::move_to_unlink_staging(&engine.root, &gfid)?;
                } else {
                    handle::remove_handle(&engine.root, &gfid)?;
                }
                None
            } else {
                Some(stat.nlink - 1)
            }
        }
        Err(_) => None,
    };

    let parent_attr = stat_path(&parent_path)?;
    Ok(Success { parent_attr, link_count })
}

fn raw_unlink(path: &std::path::Path) -> BrickResult<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| BrickError::InvalidArgument)?;
    let ret = unsafe { libc::unlink(c_path.as_ptr()) };
    if ret != 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posix::{mknod, testutil::test_engine};

    #[tokio::test]
    async fn unlink_last_link_removes_handle() {
        let (dir, engine) = test_engine();
        let created = mknod::mknod(
            &engine,
            mknod::Args { parent: Gfid::ROOT, name: "a".to_string(), mode: libc::S_IFREG | 0o644, rdev: 0, xattrs: Vec::new() },
        )
        .await
        .unwrap();

        unlink(&engine, Args { parent: Gfid::ROOT, name: "a".to_string(), skip_open_fd_unlink: false }).await.unwrap();
        assert!(!dir.path().join("a").exists());
        assert!(!engine.root.handle_abs_path(&created.gfid).exists());
    }

    #[tokio::test]
    async fn unlink_with_open_fd_stages_handle_for_later_cleanup() {
        let (dir, engine) = test_engine();
        let created = mknod::mknod(
            &engine,
            mknod::Args { parent: Gfid::ROOT, name: "a".to_string(), mode: libc::S_IFREG | 0o644, rdev: 0, xattrs: Vec::new() },
        )
        .await
        .unwrap();
        let ctx = engine.inode_ctx(created.gfid).await;
        ctx.inc_open_fds();

        unlink(&engine, Args { parent: Gfid::ROOT, name: "a".to_string(), skip_open_fd_unlink: false }).await.unwrap();
        assert!(!dir.path().join("a").exists());
        assert!(engine.root.unlink_staging_path(&created.gfid).exists());
        assert!(ctx.is_unlinked());
    }
}
