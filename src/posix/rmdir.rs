//! `rmdir` — remove a directory, optionally "into trash" for delayed,
//! janitor-driven cleanup (spec §4.1).

use crate::error::{BrickError, BrickResult};
use crate::gfid::Gfid;
use crate::handle;

use super::{stat_path, PosixEngine, Stat};

pub struct Args {
    pub parent: Gfid,
    pub name: String,
    /// When set, the directory (regardless of contents) is moved to
    /// `.glusterfs/landfill/<rand>` and the janitor deletes it
    /// asynchronously, decoupling the caller from large-rmdir latency.
    pub into_trash: bool,
}

pub struct Success {
    pub parent_attr: Stat,
}

pub async fn rmdir(engine: &PosixEngine, args: Args) -> BrickResult<Success> {
    engine.check_writable()?;

    let parent_path = engine.resolve_handle(&args.parent)?;
    let path = parent_path.join(&args.name);
    let gfid = engine.read_gfid(&path)?;

    if args.into_trash {
        handle::move_to_landfill(&engine.root, &path)?;
        let _ = handle::remove_handle(&engine.root, &gfid);
    } else {
        if std::fs::read_dir(&path).map_err(|_| BrickError::last_os_error())?.next().is_some() {
            return Err(BrickError::NotEmpty);
        }
        raw_rmdir(&path)?;
        handle::remove_handle(&engine.root, &gfid)?;
    }

    let parent_attr = stat_path(&parent_path)?;
    Ok(Success { parent_attr })
}

fn raw_rmdir(path: &std::path::Path) -> BrickResult<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| BrickError::InvalidArgument)?;
    let ret = unsafe { libc::rmdir(c_path.as_ptr()) };
    if ret != 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posix::{mkdir, testutil::test_engine};

    #[tokio::test]
    async fn rmdir_of_empty_directory_removes_handle() {
        let (dir, engine) = test_engine();
        let created = mkdir::mkdir(&engine, mkdir::Args { parent: Gfid::ROOT, name: "d".to_string(), mode: 0o755, preop_parent_xattr: None })
            .await
            .unwrap();

        rmdir(&engine, Args { parent: Gfid::ROOT, name: "d".to_string(), into_trash: false }).await.unwrap();
        assert!(!dir.path().join("d").exists());
        assert!(!engine.root.handle_abs_path(&created.gfid).exists());
    }

    #[tokio::test]
    async fn rmdir_of_nonempty_without_trash_fails() {
        let (dir, engine) = test_engine();
        mkdir::mkdir(&engine, mkdir::Args { parent: Gfid::ROOT, name: "d".to_string(), mode: 0o755, preop_parent_xattr: None })
            .await
            .unwrap();
        std::fs::write(dir.path().join("d/f"), b"x").unwrap();

        let result = rmdir(&engine, Args { parent: Gfid::ROOT, name: "d".to_string(), into_trash: false }).await;
        assert_eq!(result.err(), Some(BrickError::NotEmpty));
    }

    #[tokio::test]
    async fn rmdir_into_trash_moves_nonempty_directory() {
        let (dir, engine) = test_engine();
        mkdir::mkdir(&engine, mkdir::Args { parent: Gfid::ROOT, name: "d".to_string(), mode: 0o755, preop_parent_xattr: None })
            .await
            .unwrap();
        std::fs::write(dir.path().join("d/f"), b"x").unwrap();

        rmdir(&engine, Args { parent: Gfid::ROOT, name: "d".to_string(), into_trash: true }).await.unwrap();
        assert!(!dir.path().join("d").exists());
    }
}
