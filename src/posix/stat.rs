//! `stat` — attribute lookup by handle GFID.

use crate::error::BrickResult;
use crate::gfid::Gfid;

use super::{stat_path, PosixEngine, Stat};

pub struct Args {
    pub gfid: Gfid,
}

pub struct Success {
    pub attr: Stat,
}

pub async fn stat(engine: &PosixEngine, args: Args) -> BrickResult<Success> {
    let path = engine.resolve_handle(&args.gfid)?;
    let attr = stat_path(&path)?;
    Ok(Success { attr })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posix::{mkdir, testutil::test_engine};

    #[tokio::test]
    async fn stat_returns_attr_for_handle() {
        let (_dir, engine) = test_engine();
        let created = mkdir::mkdir(&engine, mkdir::Args { parent: Gfid::ROOT, name: "d".to_string(), mode: 0o755, preop_parent_xattr: None })
            .await
            .unwrap();
        let result = stat(&engine, Args { gfid: created.gfid }).await.unwrap();
        assert!(result.attr.is_dir());
    }
}
