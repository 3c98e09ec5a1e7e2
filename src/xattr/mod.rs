//! Component C — the reserved extended-attribute protocol.
//!
//! The xattr namespace is bidirectional: keys can be stored, computed,
//! sideband-requested, or sideband-reported (spec §4.3). This module
//! groups the four key families and the xdata side-channel type that
//! carries the sideband traffic.

pub mod acl;
pub mod gfid2path;
pub mod keys;
pub mod mdata;
pub mod pgfid;
pub mod xattrop;
pub mod xdata;

use crate::error::{BrickError, BrickResult};

/// Validates a bulk `removexattr` batch against the disallow-list
/// (spec §4.3): "any attempt to remove a disallowed key fails the whole
/// batch" — checked up front, before any removal begins.
pub fn check_bulk_remove_allowed(names: &[String]) -> BrickResult<()> {
    for name in names {
        if keys::REMOVE_DISALLOW_LIST.contains(&name.as_str()) {
            return Err(BrickError::Disallowed);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_remove_rejects_whole_batch_on_one_bad_key() {
        let names = vec!["user.a".to_string(), keys::GFID.to_string(), "user.b".to_string()];
        assert_eq!(check_bulk_remove_allowed(&names), Err(BrickError::Disallowed));
    }

    #[test]
    fn bulk_remove_allows_clean_batch() {
        let names = vec!["user.a".to_string(), "user.b".to_string()];
        assert!(check_bulk_remove_allowed(&names).is_ok());
    }
}
