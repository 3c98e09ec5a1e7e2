//! `rename` — atomically move a name across (possibly distinct) parent
//! directories (spec §4.1, §5 lock ordering).

use crate::error::BrickResult;
use crate::gfid::Gfid;
use crate::handle;

use super::{adjust_pgfid_counter, lstat_path, stat_path, update_gfid2path, PosixEngine, Stat};

pub struct Args {
    pub old_parent: Gfid,
    pub old_name: String,
    pub new_parent: Gfid,
    pub new_name: String,
}

pub struct Success {
    pub old_parent_attr: Stat,
    pub new_parent_attr: Stat,
    /// `link-count` xdata: the renamed object's nlink at its new name.
    pub link_count: u64,
}

pub async fn rename(engine: &PosixEngine, args: Args) -> BrickResult<Success> {
    engine.check_writable()?;

    let old_parent_path = engine.resolve_handle(&args.old_parent)?;
    let new_parent_path = engine.resolve_handle(&args.new_parent)?;
    let old_path = old_parent_path.join(&args.old_name);
    let new_path = new_parent_path.join(&args.new_name);

    let source_gfid = engine.read_gfid(&old_path)?;
    let victim_gfid = engine.read_gfid(&new_path).ok();
    let source_is_dir = stat_path(&old_path)?.is_dir();

    let source_ctx = engine.inode_ctx(source_gfid).await;
    let victim_ctx = match victim_gfid {
        Some(g) => Some(engine.inode_ctx(g).await),
        None => None,
    };

    // Lock both inodes' pgfid_lock in (source-GFID, dest-GFID)
    // lexicographic order (spec §5) so two concurrent renames that swap
    // a pair of names can't deadlock against each other.
    let mut parties = vec![(source_gfid, &source_ctx)];
    if let Some(ctx) = &victim_ctx {
        parties.push((victim_gfid.unwrap(), ctx));
    }
    parties.sort_by_key(|(gfid, _)| *gfid);
    let mut _guards = Vec::new();
    for (_, ctx) in &parties {
        _guards.push(ctx.pgfid_lock.lock().await);
    }

    let source_handle = engine.root.handle_abs_path(&source_gfid);
    if engine.config.update_link_count_parent {
        adjust_pgfid_counter(&source_handle, &args.old_parent, -1)?;
        adjust_pgfid_counter(&source_handle, &args.new_parent, 1)?;
    }
    update_gfid2path(&engine.config, &source_handle, &args.old_parent, &args.old_name, true)?;
    update_gfid2path(&engine.config, &source_handle, &args.new_parent, &args.new_name, false)?;

    std::fs::rename(&old_path, &new_path).map_err(|_| crate::error::BrickError::last_os_error())?;

    if source_is_dir {
        handle::update_directory_handle_target(&engine.root, &source_gfid, &new_path)?;
    }

    if let Some(vgfid) = victim_gfid {
        let vctx = victim_ctx.expect("victim_ctx set alongside victim_gfid");
        let handle_path = engine.root.handle_abs_path(&vgfid);
        if let Ok(stat) = lstat_path(&handle_path) {
            if stat.nlink <= 1 {
                if vctx.open_fds() > 0 {
                    vctx.mark_unlinked();
                    let _ = handle::move_to_unlink_staging(&engine.root, &vgfid);
                } else {
                    let _ = handle::remove_handle(&engine.root, &vgfid);
                }
            }
        }
    }

    let link_count = lstat_path(&new_path).map(|s| s.nlink).unwrap_or(0);
    let old_parent_attr = stat_path(&old_parent_path)?;
    let new_parent_attr = stat_path(&new_parent_path)?;
    Ok(Success { old_parent_attr, new_parent_attr, link_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posix::{mknod, testutil::test_engine};

    #[tokio::test]
    async fn rename_moves_name_to_new_parent() {
        let (dir, engine) = test_engine();
        mknod::mknod(&engine, mknod::Args { parent: Gfid::ROOT, name: "a".to_string(), mode: libc::S_IFREG | 0o644, rdev: 0, xattrs: Vec::new() })
            .await
            .unwrap();

        rename(&engine, Args { old_parent: Gfid::ROOT, old_name: "a".to_string(), new_parent: Gfid::ROOT, new_name: "b".to_string() })
            .await
            .unwrap();
        assert!(!dir.path().join("a").exists());
        assert!(dir.path().join("b").exists());
    }

    #[tokio::test]
    async fn rename_over_existing_victim_releases_its_handle() {
        let (dir, engine) = test_engine();
        mknod::mknod(&engine, mknod::Args { parent: Gfid::ROOT, name: "a".to_string(), mode: libc::S_IFREG | 0o644, rdev: 0, xattrs: Vec::new() })
            .await
            .unwrap();
        let victim = mknod::mknod(&engine, mknod::Args { parent: Gfid::ROOT, name: "b".to_string(), mode: libc::S_IFREG | 0o644, rdev: 0, xattrs: Vec::new() })
            .await
            .unwrap();

        rename(&engine, Args { old_parent: Gfid::ROOT, old_name: "a".to_string(), new_parent: Gfid::ROOT, new_name: "b".to_string() })
            .await
            .unwrap();
        assert!(dir.path().join("b").exists());
        assert!(!engine.root.handle_abs_path(&victim.gfid).exists());
    }
}
