//! The janitor background worker (spec §4.5, §4.1 "rmdir with delayed cleanup").
//!
//! Grounded on the teacher's `vfs_task.rs`/`read_task.rs` shape: a struct
//! holding its channel endpoints, constructed via `spawn` which returns a
//! `JoinHandle`.

use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::context::InodeTable;
use crate::handle::BrickRoot;

/// Periodically reaps `.glusterfs/landfill/*` and closes fds released by
/// request handlers, so close() latency is never visible to a caller.
pub struct Janitor {
    root: Arc<BrickRoot>,
    inodes: Arc<InodeTable>,
    interval: Duration,
    landfill_disabled: bool,
}

impl Janitor {
    pub fn spawn(
        root: Arc<BrickRoot>,
        inodes: Arc<InodeTable>,
        interval: Duration,
        landfill_disabled: bool,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            Janitor { root, inodes, interval, landfill_disabled }.run().await
        })
    }

    async fn run(self) {
        // Startup sweep: clean orphans left in unlink staging by a crash,
        // per spec §4.1 ("the janitor thread independently scans the
        // unlink staging directory on startup").
        self.sweep_unlink_orphans();

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if !self.landfill_disabled {
                self.sweep_landfill();
            }
            self.drain_close_queue();
        }
    }

    fn sweep_unlink_orphans(&self) {
        let dir = self.root.path().join(".glusterfs/unlink");
        let Ok(entries) = std::fs::read_dir(&dir) else { return };
        for entry in entries.flatten() {
            debug!(path = ?entry.path(), "reaping orphaned unlink-staged handle");
            let _ = std::fs::remove_file(entry.path());
        }
    }

    fn sweep_landfill(&self) {
        let dir = self.root.path().join(".glusterfs/landfill");
        let Ok(entries) = std::fs::read_dir(&dir) else { return };
        for entry in entries.flatten() {
            let path = entry.path();
            debug!(?path, "reaping landfill entry");
            if path.is_dir() {
                if let Err(e) = std::fs::remove_dir_all(&path) {
                    warn!(?path, error = %e, "failed to reap landfill entry");
                }
            } else {
                let _ = std::fs::remove_file(&path);
            }
        }
    }

    fn drain_close_queue(&self) {
        for fd in self.inodes.drain_close_queue() {
            close_fd(fd);
        }
    }
}

fn close_fd(fd: RawFd) {
    // SAFETY: fds reach the close queue exactly once, from the release
    // path that owns them; nothing else holds this fd afterward.
    unsafe {
        libc::close(fd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn startup_sweep_clears_unlink_staging() {
        let dir = TempDir::new().unwrap();
        let root = Arc::new(BrickRoot::open(dir.path()).unwrap());
        std::fs::write(dir.path().join(".glusterfs/unlink/orphan"), b"x").unwrap();

        let inodes = Arc::new(InodeTable::new());
        let janitor = Janitor { root: root.clone(), inodes, interval: Duration::from_secs(3600), landfill_disabled: false };
        janitor.sweep_unlink_orphans();

        assert!(!dir.path().join(".glusterfs/unlink/orphan").exists());
    }

    #[tokio::test]
    async fn landfill_sweep_removes_directories_recursively() {
        let dir = TempDir::new().unwrap();
        let root = Arc::new(BrickRoot::open(dir.path()).unwrap());
        let victim = dir.path().join(".glusterfs/landfill/abc");
        std::fs::create_dir_all(victim.join("nested")).unwrap();
        std::fs::write(victim.join("nested/f"), b"x").unwrap();

        let inodes = Arc::new(InodeTable::new());
        let janitor = Janitor { root, inodes, interval: Duration::from_secs(3600), landfill_disabled: false };
        janitor.sweep_landfill();

        assert!(!victim.exists());
    }
}
