//! Reserved extended-attribute key constants (spec §3's table).
//!
//! Grounded on `original_source/xlators/storage/posix/src/posix-gfid-path.h`
//! and `glusterfs-acl.h`.

/// Present on every object; equals the object's GFID (16 raw bytes).
pub const GFID: &str = "trusted.gfid";

/// Present on the brick root only; identifies the volume (16 raw bytes).
pub const VOLUME_ID: &str = "trusted.glusterfs.volume-id";

/// Prefix for the per-parent link counter: `trusted.pgfid.<PARENT_GFID>`.
pub const PGFID_PREFIX: &str = "trusted.pgfid.";

/// Prefix for the reverse path index: `trusted.gfid2path.<HASH>`.
pub const GFID2PATH_PREFIX: &str = "trusted.gfid2path.";

/// Marks a redirect placeholder file owned by a distribution translator.
pub const DHT_LINKTO: &str = "trusted.glusterfs.dht.linkto";

/// Prefix for cloud-tier state-machine attributes.
pub const CLOUDSYNC_PREFIX: &str = "trusted.glusterfs.cs.";

/// Authoritative timestamp metadata xattr (enabled by `ctime` config).
pub const MDATA: &str = "trusted.glusterfs.mdata";

/// Set by an internal writer (e.g. self-heal) to fence out ordinary
/// client writes for the duration of its own read-modify-write; checked
/// by `writev`'s `write-update-atomic` contract (spec §4.1).
pub const PROTECT_FROM_EXTERNAL_WRITES: &str = "trusted.glusterfs.protect-from-external-writes";

/// A caller-supplied marker consulted by a set-at-startup sanity check
/// (spec §6, "required extended-attribute support").
pub const TEST: &str = "trusted.glusterfs.test";

/// POSIX ACL access-list namespace key (passthrough, not engine-owned).
pub const ACL_ACCESS: &str = "system.posix_acl_access";

/// POSIX ACL default-list namespace key (passthrough, not engine-owned).
pub const ACL_DEFAULT: &str = "system.posix_acl_default";

/// Computed on read: the object's full canonical path, never stored
/// (spec §4.3).
pub const GET_REAL_FILENAME_PREFIX: &str = "trusted.glusterfs.pathinfo";

/// Computed on read: this brick's node UUID, never stored.
pub const NODE_UUID: &str = "trusted.glusterfs.node-uuid";

/// Computed on read: the list of all parent paths derived from
/// `pgfid.*` entries, never stored.
pub const PARENT_PATH_LIST: &str = "trusted.glusterfs.parent-paths";

/// Computed on read: the count of currently open descriptors against
/// the object, never stored.
pub const OPEN_FD_COUNT: &str = "trusted.glusterfs.open-fd-count";

/// Keys that may never be removed via `removexattr`, even in a bulk
/// request (spec §4.3's disallow-list).
pub const REMOVE_DISALLOW_LIST: &[&str] = &[GFID, VOLUME_ID];

/// Returns true if `key` is in the `trusted.pgfid.*` family.
pub fn is_pgfid_key(key: &str) -> bool {
    key.starts_with(PGFID_PREFIX)
}

/// Returns true if `key` is in the `trusted.gfid2path.*` family.
pub fn is_gfid2path_key(key: &str) -> bool {
    key.starts_with(GFID2PATH_PREFIX)
}

/// Returns true if setting `key` directly would bypass engine-owned
/// invariants (identity and accounting keys a caller must never set
/// directly through plain `setxattr`).
pub fn is_engine_owned(key: &str) -> bool {
    key == GFID || key == VOLUME_ID || is_pgfid_key(key) || is_gfid2path_key(key)
}

/// Returns true if `key` belongs to the POSIX-ACL passthrough namespace.
pub fn is_acl_key(key: &str) -> bool {
    key == ACL_ACCESS || key == ACL_DEFAULT
}

/// Returns true if `key` is synthesized on read and never persisted
/// (spec §4.3's "computed" key family).
pub fn is_computed_key(key: &str) -> bool {
    key == GET_REAL_FILENAME_PREFIX || key == NODE_UUID || key == PARENT_PATH_LIST || key == OPEN_FD_COUNT
}
