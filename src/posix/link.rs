//! `link` — add a new name for an existing object (spec §4.1 create-class
//! ordering, specialized: no new content or handle is created, only a
//! new directory entry pointing at the existing inode).

use crate::error::{BrickError, BrickResult};
use crate::gfid::Gfid;

use super::{adjust_pgfid_counter, lstat_path, stat_path, update_gfid2path, PosixEngine, Stat};

pub struct Args {
    pub gfid: Gfid,
    pub new_parent: Gfid,
    pub new_name: String,
}

pub struct Success {
    pub attr: Stat,
    pub parent_attr: Stat,
}

pub async fn link(engine: &PosixEngine, args: Args) -> BrickResult<Success> {
    engine.check_writable()?;

    let target_path = engine.resolve_handle(&args.gfid)?;
    let new_parent_path = engine.resolve_handle(&args.new_parent)?;
    let new_path = new_parent_path.join(&args.new_name);

    let current = lstat_path(&target_path)?;
    if engine.config.max_hardlinks != 0 && current.nlink + 1 > engine.config.max_hardlinks as u64 {
        return Err(BrickError::MaxHardlinks);
    }

    create_hardlink(&target_path, &new_path)?;

    if engine.config.update_link_count_parent {
        let ctx = engine.inode_ctx(args.gfid).await;
        let _guard = ctx.pgfid_lock.lock().await;
        adjust_pgfid_counter(&new_path, &args.new_parent, 1)?;
    }
    update_gfid2path(&engine.config, &new_path, &args.new_parent, &args.new_name, false)?;

    let attr = lstat_path(&new_path)?;
    let parent_attr = stat_path(&new_parent_path)?;
    Ok(Success { attr, parent_attr })
}

fn create_hardlink(original: &std::path::Path, link: &std::path::Path) -> BrickResult<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    let original_c = CString::new(original.as_os_str().as_bytes()).map_err(|_| BrickError::InvalidArgument)?;
    let link_c = CString::new(link.as_os_str().as_bytes()).map_err(|_| BrickError::InvalidArgument)?;
    let ret = unsafe { libc::link(original_c.as_ptr(), link_c.as_ptr()) };
    if ret != 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(())
}
