//! `lookup` — resolve a name under a parent directory to its GFID and stat.

use crate::error::BrickResult;
use crate::gfid::Gfid;

use super::{stat_path, PosixEngine, Stat};

/// Arguments to [`lookup`].
pub struct Args {
    pub parent: Gfid,
    pub name: String,
}

/// Result of a successful lookup: the resolved GFID plus its stat, and
/// (when the name resolved through a directory) the parent's stat for
/// the caller's attribute cache.
pub struct Success {
    pub gfid: Gfid,
    pub attr: Stat,
    pub parent_attr: Stat,
}

/// Searches `args.parent` for `args.name` and returns the resolved GFID.
///
/// Does not follow a final symlink component (spec §4.1: "this procedure
/// does not follow symbolic links").
pub async fn lookup(engine: &PosixEngine, args: Args) -> BrickResult<Success> {
    let parent_path = engine.resolve_handle(&args.parent)?;
    let parent_attr = stat_path(&parent_path)?;

    let full = parent_path.join(&args.name);
    let path = full.clone();
    let gfid = tokio::task::spawn_blocking(move || engine_read_gfid(&path))
        .await
        .map_err(|_| crate::error::BrickError::Errno(libc::EIO))??;

    let attr = super::lstat_path(&full)?;
    Ok(Success { gfid, attr, parent_attr })
}

fn engine_read_gfid(path: &std::path::Path) -> BrickResult<Gfid> {
    let value = xattr::get(path, crate::xattr::keys::GFID)
        .map_err(|_| crate::error::BrickError::last_os_error())?
        .ok_or(crate::error::BrickError::StaleHandle)?;
    Gfid::from_xattr_value(&value).ok_or(crate::error::BrickError::StaleHandle)
}
