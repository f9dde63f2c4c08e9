use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use smb_core::error::SMBError;
use smb_core::logging::{debug, trace};
use smb_core::SMBResult;

use crate::config::SMBClientConfig;
use crate::dfs::{Clock, DfsReferral, DfsReferralContext, SystemClock};
use crate::protocol::transaction::dfs_referral::DEFAULT_MAX_REFERRAL_LEVEL;

const ROOT_LINK: &str = "\\";
const IPC_SHARE: &str = "IPC$";
/// A stand-alone cache this close to expiring is dropped before an insert.
const EXPIRY_MARGIN: Duration = Duration::from_secs(10);
/// The trusted domain list outlives the other tiers by this factor.
const DOMAIN_TTL_FACTOR: u32 = 10;

#[derive(Debug)]
struct CacheEntry<T> {
    expiration: Instant,
    value: T,
}

impl<T> CacheEntry<T> {
    fn new(value: T, expiration: Instant) -> Self {
        Self { expiration, value }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expiration
    }
}

#[derive(Debug)]
enum RootEntry {
    /// The root could not be resolved. Cleared only with the domain cache.
    Negative,
    Links(CacheEntry<HashMap<String, DfsReferral>>),
}

type Roots = HashMap<String, RootEntry>;

#[derive(Debug, Default)]
struct DfsCache {
    /// Trusted domains, lower-cased, each with its roots.
    domains: Option<CacheEntry<HashMap<String, Roots>>>,
    /// Referrals for `\server\share\path` keys, lower-cased.
    standalone: Option<CacheEntry<HashMap<String, DfsReferral>>>,
}

/// Resolves DFS paths against the referral caches, fetching on a miss.
///
/// All three tiers sit behind one lock, held across the network calls a
/// miss makes. Failed lookups resolve to `None`; only an authentication
/// failure under a strict view reaches the caller.
#[derive(Debug)]
pub struct DfsResolver<C: Clock = SystemClock> {
    disabled: bool,
    strict_view: bool,
    ttl: Duration,
    clock: C,
    cache: Mutex<DfsCache>,
}

impl DfsResolver<SystemClock> {
    pub fn new(config: &SMBClientConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> DfsResolver<C> {
    pub fn with_clock(config: &SMBClientConfig, clock: C) -> Self {
        Self {
            disabled: config.dfs_disabled,
            strict_view: config.dfs_strict_view,
            ttl: Duration::from_secs(config.dfs_ttl),
            clock,
            cache: Mutex::new(DfsCache::default()),
        }
    }

    fn lock(&self) -> SMBResult<MutexGuard<'_, DfsCache>> {
        self.cache.lock().map_err(|_| SMBError::precondition_failed("DFS cache lock poisoned"))
    }

    /// Whether `domain` is among the domains the user's domain trusts.
    pub fn is_trusted_domain(&self, domain: &str, context: &mut dyn DfsReferralContext) -> SMBResult<bool> {
        if self.disabled {
            return Ok(false);
        }
        let now = self.clock.now();
        let mut cache = self.lock()?;
        if !self.load_domains(&mut cache, context, now)? {
            return Ok(false);
        }
        Ok(cache.domains.as_ref().is_some_and(|domains| domains.value.contains_key(&domain.to_lowercase())))
    }

    /// The first domain controller the domain referral names.
    pub fn get_dc(&self, domain: &str, context: &mut dyn DfsReferralContext) -> SMBResult<Option<String>> {
        if self.disabled {
            return Ok(None);
        }
        self.find_dc(context, domain, self.clock.now())
    }

    /// Resolves `\domain\root[path]`. `path`, when given, starts with a
    /// separator and is only consulted against stand-alone referrals.
    pub fn resolve(
        &self,
        domain: &str,
        root: &str,
        path: Option<&str>,
        context: &mut dyn DfsReferralContext,
    ) -> SMBResult<Option<DfsReferral>> {
        if self.disabled || root.eq_ignore_ascii_case(IPC_SHARE) {
            return Ok(None);
        }
        let now = self.clock.now();
        let mut cache = self.lock()?;

        let mut referral = None;
        if self.load_domains(&mut cache, context, now)? {
            referral = self.resolve_root(&mut cache, context, domain, root, now)?;
        }
        match (referral, path) {
            (None, Some(path)) => {
                let mut key = format!("\\{}\\{}", domain, root);
                if path != ROOT_LINK {
                    key.push_str(path);
                }
                Ok(self.resolve_standalone(&mut cache, &key.to_lowercase(), now))
            }
            (referral, _) => Ok(referral),
        }
    }

    /// Stores a referral a share returned for `path`, a `\server\share\...`
    /// request path. The server counted `path_consumed` over the whole path;
    /// the stored referral counts it below the share.
    pub fn insert(&self, path: &str, mut referral: DfsReferral) -> SMBResult<()> {
        if self.disabled {
            return Ok(());
        }
        let mut parts = path.strip_prefix('\\').unwrap_or_default().splitn(3, '\\');
        let (Some(server), Some(share)) = (parts.next(), parts.next()) else {
            return Err(SMBError::precondition_failed(format!("{} does not name a server and share", path)));
        };
        if server.is_empty() || share.is_empty() {
            return Err(SMBError::precondition_failed(format!("{} does not name a server and share", path)));
        }

        let mut key: String = path.chars().take(referral.path_consumed).collect::<String>().to_lowercase();
        while key.len() > 1 && key.ends_with('\\') {
            key.pop();
        }
        let prefix = 1 + server.chars().count() + 1 + share.chars().count();
        referral.path_consumed = referral.path_consumed.saturating_sub(prefix);
        referral.key = Some(key.clone());

        let now = self.clock.now();
        let mut cache = self.lock()?;
        if cache.standalone.as_ref().is_some_and(|entry| now + EXPIRY_MARGIN > entry.expiration) {
            debug!("stand-alone referral cache near expiry, dropping");
            cache.standalone = None;
        }
        trace!(key = %key, path_consumed = referral.path_consumed, "caching stand-alone referral");
        cache
            .standalone
            .get_or_insert_with(|| CacheEntry::new(HashMap::new(), now + self.ttl))
            .value
            .insert(key, referral);
        Ok(())
    }

    /// Drops the trusted domains and every root entry, negative ones included.
    pub fn invalidate_domains(&self) -> SMBResult<()> {
        self.lock()?.domains = None;
        Ok(())
    }

    fn fetch(
        &self,
        context: &mut dyn DfsReferralContext,
        server: &str,
        path: &str,
        max_level: u16,
        now: Instant,
    ) -> SMBResult<Option<DfsReferral>> {
        match context.get_referrals(server, path, max_level) {
            Ok(response) => Ok(DfsReferral::from_response(&response, now)),
            Err(error) if self.strict_view && error.is_auth_error() => Err(error),
            Err(_error) => {
                debug!(server, path, error = %_error, "DFS referral lookup failed");
                Ok(None)
            }
        }
    }

    fn find_dc(&self, context: &mut dyn DfsReferralContext, domain: &str, now: Instant) -> SMBResult<Option<String>> {
        let referral = self.fetch(context, domain, &format!("\\{}", domain), DEFAULT_MAX_REFERRAL_LEVEL, now)?;
        Ok(referral.map(|referral| referral.server().to_string()))
    }

    /// Makes sure a live trusted domain list is cached, fetching it from the
    /// user's domain if needed.
    fn load_domains(&self, cache: &mut DfsCache, context: &mut dyn DfsReferralContext, now: Instant) -> SMBResult<bool> {
        if cache.domains.as_ref().is_some_and(|domains| domains.is_expired(now)) {
            debug!("trusted domain cache expired");
            cache.domains = None;
        }
        if cache.domains.is_some() {
            return Ok(true);
        }
        let Some(user_domain) = context.user_domain().filter(|domain| !domain.is_empty()) else {
            return Ok(false);
        };
        let Some(referral) = self.fetch(context, &user_domain, "", DEFAULT_MAX_REFERRAL_LEVEL, now)? else {
            return Ok(false);
        };
        let domains: HashMap<String, Roots> = referral
            .targets()
            .iter()
            .map(|target| (target.server.to_lowercase(), Roots::new()))
            .collect();
        debug!(count = domains.len(), "loaded trusted domains");
        cache.domains = Some(CacheEntry::new(domains, now + self.ttl * DOMAIN_TTL_FACTOR));
        Ok(true)
    }

    fn resolve_root(
        &self,
        cache: &mut DfsCache,
        context: &mut dyn DfsReferralContext,
        domain: &str,
        root: &str,
        now: Instant,
    ) -> SMBResult<Option<DfsReferral>> {
        let Some(domains) = cache.domains.as_mut() else {
            return Ok(None);
        };
        let Some(roots) = domains.value.get_mut(&domain.to_lowercase()) else {
            return Ok(None);
        };
        let root_key = root.to_lowercase();
        if matches!(roots.get(&root_key), Some(RootEntry::Links(links)) if links.is_expired(now)) {
            roots.remove(&root_key);
        }
        if !roots.contains_key(&root_key) {
            let entry = match self.fetch_root(context, domain, root, now)? {
                Some(referral) => {
                    let links = HashMap::from([(ROOT_LINK.to_string(), referral)]);
                    RootEntry::Links(CacheEntry::new(links, now + self.ttl))
                }
                None => {
                    debug!(domain, root, "caching negative root entry");
                    RootEntry::Negative
                }
            };
            roots.insert(root_key.clone(), entry);
        }

        let Some(RootEntry::Links(links)) = roots.get_mut(&root_key) else {
            trace!(domain, root, "negative root entry");
            return Ok(None);
        };
        if links.value.get(ROOT_LINK).is_some_and(|referral| referral.is_expired(now)) {
            links.value.remove(ROOT_LINK);
        }
        if !links.value.contains_key(ROOT_LINK) {
            if let Some(referral) = self.fetch_root(context, domain, root, now)? {
                links.value.insert(ROOT_LINK.to_string(), referral);
            }
        }
        Ok(links.value.get(ROOT_LINK).cloned())
    }

    fn fetch_root(
        &self,
        context: &mut dyn DfsReferralContext,
        domain: &str,
        root: &str,
        now: Instant,
    ) -> SMBResult<Option<DfsReferral>> {
        let Some(dc) = self.find_dc(context, domain, now)? else {
            return Ok(None);
        };
        let path = format!("\\{}\\{}", domain, root);
        let Some(mut referral) = self.fetch(context, &dc, &path, DEFAULT_MAX_REFERRAL_LEVEL, now)? else {
            return Ok(None);
        };
        referral.path_consumed = referral.path_consumed.saturating_sub(path.chars().count());
        referral.link = Some(ROOT_LINK.to_string());
        referral.key = Some(ROOT_LINK.to_string());
        debug!(path = %path, dc = %dc, server = referral.server(), "resolved DFS root");
        Ok(Some(referral))
    }

    /// The most specific stand-alone referral covering `key`.
    fn resolve_standalone(&self, cache: &mut DfsCache, key: &str, now: Instant) -> Option<DfsReferral> {
        if cache.standalone.as_ref().is_some_and(|entry| entry.is_expired(now)) {
            debug!("stand-alone referral cache expired");
            cache.standalone = None;
        }
        let entries = &mut cache.standalone.get_or_insert_with(|| CacheEntry::new(HashMap::new(), now + self.ttl)).value;
        let matched = entries
            .keys()
            .filter(|candidate| covers(candidate, key))
            .max_by_key(|candidate| candidate.len())
            .cloned()?;
        if entries.get(&matched).is_some_and(|referral| referral.is_expired(now)) {
            trace!(key = %matched, "stand-alone referral expired");
            entries.remove(&matched);
            return None;
        }
        entries.get(&matched).cloned()
    }
}

/// `candidate` equals `key` or is a prefix of it ending at a separator.
fn covers(candidate: &str, key: &str) -> bool {
    match key.strip_prefix(candidate) {
        Some(rest) => rest.is_empty() || rest.starts_with('\\'),
        None => false,
    }
}
