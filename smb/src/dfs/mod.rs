//! DFS referral resolution, MS-DFSC 3.1.
//!
//! A [`DfsResolver`] keeps three caches behind one lock: the domains the
//! user's domain trusts (each holding its roots), the referrals learned for
//! stand-alone paths, and negative entries for roots that could not be
//! resolved. Network traffic goes through a [`DfsReferralContext`].

use std::time::Instant;

use smb_core::SMBResult;

use crate::protocol::transaction::dfs_referral::DfsReferralResponse;

pub use cache::DfsResolver;
pub use referral::{DfsReferral, DfsTarget};

mod cache;
mod referral;

/// What the resolver needs from a connected client.
pub trait DfsReferralContext {
    /// The domain the user authenticates against, if any.
    fn user_domain(&self) -> Option<String>;

    /// Sends `TRANS2_GET_DFS_REFERRAL` for `path` to `server`.
    fn get_referrals(&mut self, server: &str, path: &str, max_level: u16) -> SMBResult<DfsReferralResponse>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
