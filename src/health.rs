//! The periodic write+read health probe (spec §4.5).

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::handle::BrickRoot;

/// Shared flag consulted by the storage engine before any mutating
/// operation: once the health check fails, the engine refuses writes
/// until the next successful probe (spec §7 `backend-ill`).
#[derive(Default)]
pub struct HealthFlag(AtomicBool);

impl HealthFlag {
    pub fn is_ill(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set_ill(&self, ill: bool) {
        self.0.store(ill, Ordering::Release);
    }
}

/// Runs the write/fsync/read/close probe every `interval`, bounded by
/// `timeout`. A failed or overrunning cycle marks the engine degraded; a
/// following successful cycle clears it.
pub struct HealthCheck {
    root: Arc<BrickRoot>,
    flag: Arc<HealthFlag>,
    interval: Duration,
    timeout: Duration,
}

impl HealthCheck {
    pub fn spawn(
        root: Arc<BrickRoot>,
        flag: Arc<HealthFlag>,
        interval: Duration,
        timeout: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move { HealthCheck { root, flag, interval, timeout }.run().await })
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            let root = self.root.clone();
            let probe = tokio::task::spawn_blocking(move || probe_once(&root));
            let outcome = tokio::time::timeout(self.timeout, probe).await;
            match outcome {
                Ok(Ok(Ok(()))) => {
                    if self.flag.is_ill() {
                        info!("health check recovered");
                    }
                    self.flag.set_ill(false);
                }
                Ok(Ok(Err(e))) => {
                    error!(error = %e, "health check probe failed");
                    self.flag.set_ill(true);
                }
                Ok(Err(_join_err)) => {
                    error!("health check probe task panicked");
                    self.flag.set_ill(true);
                }
                Err(_elapsed) => {
                    error!("health check probe exceeded hard timeout");
                    self.flag.set_ill(true);
                }
            }
        }
    }
}

fn probe_once(root: &BrickRoot) -> std::io::Result<()> {
    let path = root.health_check_path();
    let mut file = std::fs::OpenOptions::new().create(true).write(true).read(true).truncate(true).open(&path)?;
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .to_string();
    file.write_all(stamp.as_bytes())?;
    file.sync_all()?;
    file.seek(SeekFrom::Start(0))?;
    let mut readback = String::new();
    file.read_to_string(&mut readback)?;
    if readback != stamp {
        return Err(std::io::Error::new(std::io::ErrorKind::Other, "health probe readback mismatch"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn probe_once_round_trips_a_timestamp() {
        let dir = TempDir::new().unwrap();
        let root = BrickRoot::open(dir.path()).unwrap();
        assert!(probe_once(&root).is_ok());
    }

    #[test]
    fn flag_defaults_to_healthy() {
        let flag = HealthFlag::default();
        assert!(!flag.is_ill());
    }
}
