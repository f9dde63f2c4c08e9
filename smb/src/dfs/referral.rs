use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::protocol::transaction::dfs_referral::{DfsReferralResponse, ReferralHeaderFlags};

/// One place a DFS path can be redirected to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct DfsTarget {
    pub server: String,
    pub share: String,
    /// Remainder below the share, without a leading separator.
    pub path: String,
}

impl DfsTarget {
    /// Splits a `\server\share\path` node.
    pub fn parse(node: &str) -> Self {
        let mut parts = node.trim_start_matches('\\').splitn(3, '\\');
        Self {
            server: parts.next().unwrap_or_default().into(),
            share: parts.next().unwrap_or_default().into(),
            path: parts.next().unwrap_or_default().trim_end_matches('\\').into(),
        }
    }

    /// A target naming only a server, as domain and DC lists do.
    pub fn server(name: &str) -> Self {
        Self {
            server: name.trim_start_matches('\\').into(),
            ..Default::default()
        }
    }

    pub fn unc(&self) -> String {
        let mut unc = format!("\\{}\\{}", self.server, self.share);
        if !self.path.is_empty() {
            unc.push('\\');
            unc.push_str(&self.path);
        }
        unc
    }
}

/// A resolved referral: a ring of equivalent targets and how much of the
/// request path they replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfsReferral {
    targets: Vec<DfsTarget>,
    current: usize,
    /// Characters of the lookup key this referral covers.
    pub path_consumed: usize,
    pub ttl: u32,
    pub expiration: Instant,
    /// Whether credentials for the targets come from stored hashes.
    pub resolve_hashes: bool,
    pub flags: ReferralHeaderFlags,
    /// The link below the root this referral was stored under.
    pub link: Option<String>,
    /// The cache key it was stored under.
    pub key: Option<String>,
}

impl DfsReferral {
    /// Builds the target ring from a response. Returns `None` when the
    /// response names no target.
    ///
    /// Name list entries contribute their expanded names, or the special
    /// name itself when none were returned.
    pub fn from_response(response: &DfsReferralResponse, now: Instant) -> Option<Self> {
        let mut targets = Vec::new();
        for entry in &response.referrals {
            if entry.is_name_list() {
                if entry.expanded_names.is_empty() {
                    targets.push(DfsTarget::server(&entry.special_name));
                } else {
                    targets.extend(entry.expanded_names.iter().map(|name| DfsTarget::server(name)));
                }
            } else if !entry.node.is_empty() {
                targets.push(DfsTarget::parse(&entry.node));
            }
        }
        if targets.is_empty() {
            return None;
        }
        let ttl = response.referrals.iter().map(|entry| entry.ttl).min().unwrap_or_default();
        Some(Self {
            targets,
            current: 0,
            path_consumed: response.path_consumed as usize,
            ttl,
            expiration: now + Duration::from_secs(ttl as u64),
            resolve_hashes: false,
            flags: response.flags,
            link: None,
            key: None,
        })
    }

    pub fn targets(&self) -> &[DfsTarget] {
        &self.targets
    }

    pub fn current(&self) -> &DfsTarget {
        &self.targets[self.current]
    }

    /// Moves to the next target in the ring and returns it.
    pub fn rotate(&mut self) -> &DfsTarget {
        self.current = (self.current + 1) % self.targets.len();
        self.current()
    }

    pub fn server(&self) -> &str {
        &self.current().server
    }

    pub fn share(&self) -> &str {
        &self.current().share
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expiration
    }

    /// Rewrites `path`, relative to the key the referral was resolved for,
    /// onto the current target.
    pub fn redirect(&self, path: &str) -> String {
        let split = path.char_indices().nth(self.path_consumed).map_or(path.len(), |(index, _)| index);
        let remainder = path[split..].trim_start_matches('\\');
        let mut unc = self.current().unc();
        if !remainder.is_empty() {
            unc.push('\\');
            unc.push_str(remainder);
        }
        unc
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::transaction::dfs_referral::{DfsReferralEntry, ReferralEntryFlags};

    use super::*;

    fn node(node: &str, ttl: u32) -> DfsReferralEntry {
        DfsReferralEntry {
            version: 3,
            ttl,
            path: "\\corp\\root\\link".into(),
            node: node.into(),
            ..Default::default()
        }
    }

    #[test]
    fn targets_form_a_ring() {
        let response = DfsReferralResponse {
            path_consumed: 15,
            referrals: vec![node("\\fs1\\data\\projects", 600), node("\\fs2\\data", 300)],
            ..Default::default()
        };
        let now = Instant::now();
        let mut referral = DfsReferral::from_response(&response, now).unwrap();
        assert_eq!(referral.current(), &DfsTarget {
            server: "fs1".into(),
            share: "data".into(),
            path: "projects".into(),
        });
        assert_eq!(referral.rotate().server, "fs2");
        assert_eq!(referral.rotate().server, "fs1");
        assert_eq!(referral.ttl, 300);
        assert!(!referral.is_expired(now + Duration::from_secs(299)));
        assert!(referral.is_expired(now + Duration::from_secs(300)));
    }

    #[test]
    fn name_list_entries_contribute_servers() {
        let response = DfsReferralResponse {
            referrals: vec![DfsReferralEntry {
                version: 3,
                flags: ReferralEntryFlags::NAME_LIST_REFERRAL,
                special_name: "\\CORP".into(),
                expanded_names: vec!["\\dc1.corp".into(), "\\dc2.corp".into()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let referral = DfsReferral::from_response(&response, Instant::now()).unwrap();
        let servers: Vec<_> = referral.targets().iter().map(|target| target.server.as_str()).collect();
        assert_eq!(servers, ["dc1.corp", "dc2.corp"]);
    }

    #[test]
    fn empty_response_has_no_referral() {
        assert!(DfsReferral::from_response(&DfsReferralResponse::default(), Instant::now()).is_none());
    }

    #[test]
    fn redirect_replaces_the_consumed_prefix() {
        let response = DfsReferralResponse {
            path_consumed: 5,
            referrals: vec![node("\\fs1\\data\\projects", 60)],
            ..Default::default()
        };
        let referral = DfsReferral::from_response(&response, Instant::now()).unwrap();
        assert_eq!(referral.redirect("\\link\\docs\\a.txt"), "\\fs1\\data\\projects\\docs\\a.txt");
        assert_eq!(referral.redirect("\\link"), "\\fs1\\data\\projects");
    }
}
