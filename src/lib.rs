//! A brick-side POSIX storage engine and translator-graph lifecycle, the
//! local half of a distributed filesystem node.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod fsyncer;
pub mod gfid;
pub mod graph;
pub mod handle;
pub mod health;
pub mod janitor;
pub mod posix;
pub mod reserve;
pub mod xattr;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::config::BrickConfig;
use crate::context::InodeTable;
use crate::error::BrickResult;
use crate::fsyncer::Fsyncer;
use crate::graph::switch::GraphSwitcher;
use crate::graph::Graph;
use crate::handle::BrickRoot;
use crate::health::{HealthCheck, HealthFlag};
use crate::janitor::Janitor;
use crate::posix::PosixEngine;
use crate::reserve::DiskReserve;

/// The background workers a running brick keeps alive for its whole
/// lifetime, returned so a caller can await or abort them.
pub struct Workers {
    pub janitor: JoinHandle<()>,
    pub health: JoinHandle<()>,
    pub reserve: JoinHandle<()>,
    pub fsyncer: JoinHandle<()>,
}

/// A fully assembled brick: the storage engine, its translator-graph
/// switcher, and the background workers that gate or defer its
/// operations.
///
/// This is the top-level type a FUSE bridge or RPC server (out of scope
/// here) would hold one of per exported directory, calling
/// [`dispatch::dispatch`] against `engine` and a [`dispatch::Stack`] built
/// from [`Brick::new_stack`] for every incoming request.
pub struct Brick {
    pub engine: PosixEngine,
    pub switcher: Arc<GraphSwitcher>,
    pub workers: Workers,
}

impl Brick {
    /// Opens `brick_path` under `config`, verifies the brick root carries
    /// the expected `trusted.glusterfs.volume-id` (spec invariant 5),
    /// and spawns the janitor, health-check, disk-reserve, and fsyncer
    /// workers.
    ///
    /// `graph` is the brick's initial translator graph (spec §4.4); later
    /// graphs are installed with [`GraphSwitcher::install`].
    pub async fn start(
        brick_path: impl Into<std::path::PathBuf>,
        config: BrickConfig,
        graph: Graph,
    ) -> BrickResult<Brick> {
        let root = Arc::new(BrickRoot::open(brick_path)?);
        let inodes = Arc::new(InodeTable::new());
        let health = Arc::new(HealthFlag::default());
        let reserve = DiskReserve::new(root.clone(), config.reserve, Duration::from_secs(30));
        let (fsync_queue, fsyncer) = Fsyncer::new(
            config.batch_fsync_mode,
            Duration::from_micros(config.batch_fsync_delay_usec.max(1)),
        );

        let engine = PosixEngine {
            root: root.clone(),
            config: config.clone(),
            inodes: inodes.clone(),
            health: health.clone(),
            reserve: reserve.clone(),
            fsync_queue,
        };
        engine.verify_volume_id()?;

        let janitor = Janitor::spawn(
            root.clone(),
            inodes,
            Duration::from_secs(config.janitor_interval_secs),
            config.janitor_landfill_disabled,
        );
        let health_check = HealthCheck::spawn(
            root,
            health,
            Duration::from_secs(config.health_check_interval_secs),
            Duration::from_secs(config.health_check_timeout_secs),
        );
        let reserve_task = reserve.spawn(Duration::from_secs(30));
        let fsyncer_task = fsyncer.spawn();

        info!(volume_id = %config.volume_id, "brick started");

        Ok(Brick {
            engine,
            switcher: Arc::new(GraphSwitcher::new(graph)),
            workers: Workers { janitor, health: health_check, reserve: reserve_task, fsyncer: fsyncer_task },
        })
    }

    /// Builds a [`dispatch::Stack`] for a new request against the
    /// currently active graph snapshot.
    pub async fn new_stack(&self, credentials: dispatch::Credentials, op: dispatch::OpId) -> dispatch::Stack {
        dispatch::Stack::new(dispatch::Frame {
            credentials,
            op,
            xdata: crate::xattr::xdata::Xdata::new(),
            graph: self.switcher.current().await,
        })
    }
}
