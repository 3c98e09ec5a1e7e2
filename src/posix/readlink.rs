//! `readlink` — return a symlink's target.

use crate::error::{BrickError, BrickResult};
use crate::gfid::Gfid;

use super::PosixEngine;

pub struct Args {
    pub gfid: Gfid,
}

pub struct Success {
    pub target: String,
}

pub async fn readlink(engine: &PosixEngine, args: Args) -> BrickResult<Success> {
    let path = engine.resolve_handle(&args.gfid)?;
    let target = std::fs::read_link(&path).map_err(|_| BrickError::last_os_error())?;
    let target = target.to_str().ok_or(BrickError::InvalidArgument)?.to_string();
    Ok(Success { target })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posix::{symlink, testutil::test_engine};

    #[tokio::test]
    async fn readlink_returns_stored_target() {
        let (_dir, engine) = test_engine();
        let created = symlink::symlink(
            &engine,
            symlink::Args { parent: Gfid::ROOT, name: "l".to_string(), link_target: "/etc/hosts".to_string(), xattrs: Vec::new() },
        )
        .await
        .unwrap();

        let result = readlink(&engine, Args { gfid: created.gfid }).await.unwrap();
        assert_eq!(result.target, "/etc/hosts");
    }
}
