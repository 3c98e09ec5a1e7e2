//! POSIX ACL namespace passthrough.
//!
//! The storage engine never interprets `system.posix_acl_*` values; it
//! only has to make sure the apply-order in create-class operations
//! (spec §4.1 step 5, "apply POSIX ACL xattrs if supplied") runs after
//! ownership and before the identity xattrs. This module just carries the
//! raw bytes and, per `original_source/libglusterfs/src/glusterfs-acl.h`,
//! maps them to/from the namespace-translation keys `trusted.glusterfs`
//! layers use to talk about ACLs without depending on `system.*` support.

use super::keys::{ACL_ACCESS, ACL_DEFAULT};

/// An ACL xattr supplied by a caller on a create-class operation.
#[derive(Debug, Clone)]
pub struct AclXattr {
    pub key: String,
    pub value: Vec<u8>,
}

/// Splits a caller-supplied xattr batch into ACL entries (applied via the
/// passthrough namespace) and everything else (applied as plain xattrs).
pub fn partition(xattrs: Vec<(String, Vec<u8>)>) -> (Vec<AclXattr>, Vec<(String, Vec<u8>)>) {
    let mut acl = Vec::new();
    let mut rest = Vec::new();
    for (key, value) in xattrs {
        if key == ACL_ACCESS || key == ACL_DEFAULT {
            acl.push(AclXattr { key, value });
        } else {
            rest.push((key, value));
        }
    }
    (acl, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_acl_keys_out() {
        let xattrs = vec![
            (ACL_ACCESS.to_string(), vec![1, 2, 3]),
            ("user.note".to_string(), vec![4]),
        ];
        let (acl, rest) = partition(xattrs);
        assert_eq!(acl.len(), 1);
        assert_eq!(rest.len(), 1);
        assert_eq!(acl[0].key, ACL_ACCESS);
    }
}
