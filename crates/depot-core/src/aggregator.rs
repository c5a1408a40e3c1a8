//! Repository aggregation and effective policy computation
//!
//! [`RemoteRepositoryManager::aggregate_repositories`] merges a dominant and a
//! recessive repository list into the list of repositories a request should
//! contact. Dominant entries always come first and win on id collisions,
//! except that a dominant mirror absorbs repositories it does not yet cover.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::repository::{
    CHECKSUM_POLICY_FAIL, CHECKSUM_POLICY_IGNORE, CHECKSUM_POLICY_WARN, RemoteRepository,
    RepositoryPolicy, UPDATE_POLICY_ALWAYS, UPDATE_POLICY_DAILY, UPDATE_POLICY_INTERVAL,
};
use crate::session::ValidSession;

const MINUTES_PER_DAY: u64 = 24 * 60;

/// Decides how often a repository is checked for updates
pub trait UpdatePolicyAnalyzer: Send + Sync {
    /// The more frequent of two update policies
    fn effective_update_policy(&self, session: &ValidSession<'_>, policy1: &str, policy2: &str) -> String;

    /// Whether a resource last checked at `last_checked` is due under `policy`
    fn is_update_required(
        &self,
        session: &ValidSession<'_>,
        last_checked: Option<SystemTime>,
        policy: &str,
    ) -> bool;
}

pub trait ChecksumPolicyProvider: Send + Sync {
    /// The stricter of two checksum policies
    fn effective_checksum_policy(&self, session: &ValidSession<'_>, policy1: &str, policy2: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUpdatePolicyAnalyzer;

impl DefaultUpdatePolicyAnalyzer {
    /// Minutes between checks; `never` and unknown policies map to `u64::MAX`
    fn interval_minutes(policy: &str) -> u64 {
        match policy {
            UPDATE_POLICY_ALWAYS => 0,
            UPDATE_POLICY_DAILY => MINUTES_PER_DAY,
            _ => policy
                .strip_prefix(UPDATE_POLICY_INTERVAL)
                .and_then(|rest| rest.strip_prefix(':'))
                .map(|minutes| minutes.trim().parse().unwrap_or(MINUTES_PER_DAY))
                .unwrap_or(u64::MAX),
        }
    }
}

impl UpdatePolicyAnalyzer for DefaultUpdatePolicyAnalyzer {
    fn effective_update_policy(&self, _session: &ValidSession<'_>, policy1: &str, policy2: &str) -> String {
        if Self::interval_minutes(policy1) < Self::interval_minutes(policy2) {
            policy1.to_string()
        } else {
            policy2.to_string()
        }
    }

    fn is_update_required(
        &self,
        _session: &ValidSession<'_>,
        last_checked: Option<SystemTime>,
        policy: &str,
    ) -> bool {
        let Some(last_checked) = last_checked else {
            return true;
        };
        let minutes = Self::interval_minutes(policy);
        if minutes == u64::MAX {
            return false;
        }
        let elapsed = SystemTime::now()
            .duration_since(last_checked)
            .unwrap_or(Duration::ZERO);
        elapsed >= Duration::from_secs(minutes.saturating_mul(60))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultChecksumPolicyProvider;

impl DefaultChecksumPolicyProvider {
    fn strictness(policy: &str) -> u8 {
        match policy {
            CHECKSUM_POLICY_FAIL => 2,
            CHECKSUM_POLICY_WARN => 1,
            CHECKSUM_POLICY_IGNORE => 0,
            _ => 1,
        }
    }
}

impl ChecksumPolicyProvider for DefaultChecksumPolicyProvider {
    fn effective_checksum_policy(&self, _session: &ValidSession<'_>, policy1: &str, policy2: &str) -> String {
        if Self::strictness(policy1) >= Self::strictness(policy2) {
            policy1.to_string()
        } else {
            policy2.to_string()
        }
    }
}

#[derive(Clone)]
pub struct RemoteRepositoryManager {
    update_policy_analyzer: Arc<dyn UpdatePolicyAnalyzer>,
    checksum_policy_provider: Arc<dyn ChecksumPolicyProvider>,
}

impl Default for RemoteRepositoryManager {
    fn default() -> Self {
        Self::new(
            Arc::new(DefaultUpdatePolicyAnalyzer),
            Arc::new(DefaultChecksumPolicyProvider),
        )
    }
}

impl std::fmt::Debug for RemoteRepositoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRepositoryManager").finish_non_exhaustive()
    }
}

impl RemoteRepositoryManager {
    pub fn new(
        update_policy_analyzer: Arc<dyn UpdatePolicyAnalyzer>,
        checksum_policy_provider: Arc<dyn ChecksumPolicyProvider>,
    ) -> Self {
        Self {
            update_policy_analyzer,
            checksum_policy_provider,
        }
    }

    pub fn update_policy_analyzer(&self) -> &dyn UpdatePolicyAnalyzer {
        self.update_policy_analyzer.as_ref()
    }

    /// Merge `recessive` into `dominant`
    ///
    /// With `resolve_mirrors_and_proxies`, each recessive repository is first
    /// replaced by its mirror (if any) and given credentials and a proxy from
    /// the session's selectors.
    pub fn aggregate_repositories(
        &self,
        session: &ValidSession<'_>,
        dominant: &[RemoteRepository],
        recessive: &[RemoteRepository],
        resolve_mirrors_and_proxies: bool,
    ) -> Vec<RemoteRepository> {
        if recessive.is_empty() {
            return dominant.to_vec();
        }

        let mut result = dominant.to_vec();
        for repository in recessive {
            let repository = if resolve_mirrors_and_proxies {
                self.preprocess(session, repository)
            } else {
                repository.clone()
            };

            let Some(index) = result.iter().position(|r| r.id() == repository.id()) else {
                result.push(repository);
                continue;
            };

            let existing = &result[index];
            if !existing.is_mirror() {
                tracing::debug!(
                    id = repository.id(),
                    kept = existing.url(),
                    discarded = repository.url(),
                    "dominant repository shadows recessive one"
                );
                continue;
            }
            if let Some(merged) = merge_mirrors(existing, &repository) {
                tracing::debug!(
                    id = merged.id(),
                    mirrored = merged.mirrored_repositories().len(),
                    "extended dominant mirror"
                );
                result[index] = merged;
            }
        }
        result
    }

    fn preprocess(&self, session: &ValidSession<'_>, repository: &RemoteRepository) -> RemoteRepository {
        let repository = match session.mirror_selector().mirror(repository) {
            Some(mirror) => {
                tracing::debug!(repository = repository.id(), mirror = mirror.id(), "using mirror");
                if mirror
                    .mirrored_repositories()
                    .iter()
                    .any(|m| m.id() == repository.id())
                {
                    mirror
                } else {
                    mirror
                        .to_builder()
                        .add_mirrored_repository(repository.clone())
                        .build()
                }
            }
            None => repository.clone(),
        };

        let mut builder = repository.to_builder();
        if repository.authentication().is_none() {
            builder = builder.authentication(session.authentication_selector().authentication(&repository));
        }
        if let Some(proxy) = session.proxy_selector().proxy(&repository) {
            builder = builder.proxy(Some(proxy));
        }
        builder.build()
    }

    /// Effective policy of a repository for releases, snapshots or both
    pub fn get_policy(
        &self,
        session: &ValidSession<'_>,
        repository: &RemoteRepository,
        releases: bool,
        snapshots: bool,
    ) -> RepositoryPolicy {
        let release = releases.then(|| repository.release_policy());
        let snapshot = snapshots.then(|| repository.snapshot_policy());
        match (release, snapshot) {
            (Some(a), Some(b)) => self.merge_policies(session, a, b),
            (Some(policy), None) | (None, Some(policy)) => with_overrides(session, policy.clone()),
            (None, None) => RepositoryPolicy::disabled(),
        }
    }

    /// Combine two policies: enabled only if both are, the stricter checksum
    /// policy and the more frequent update policy, then session overrides
    pub fn merge_policies(
        &self,
        session: &ValidSession<'_>,
        policy1: &RepositoryPolicy,
        policy2: &RepositoryPolicy,
    ) -> RepositoryPolicy {
        let checksums = match session.checksum_policy() {
            Some(policy) => policy.to_string(),
            None => self.checksum_policy_provider.effective_checksum_policy(
                session,
                policy1.checksum_policy(),
                policy2.checksum_policy(),
            ),
        };
        let updates = match session.update_policy() {
            Some(policy) => policy.to_string(),
            None => self.update_policy_analyzer.effective_update_policy(
                session,
                policy1.update_policy(),
                policy2.update_policy(),
            ),
        };
        RepositoryPolicy::new(policy1.is_enabled() && policy2.is_enabled(), updates, checksums)
    }
}

fn with_overrides(session: &ValidSession<'_>, mut policy: RepositoryPolicy) -> RepositoryPolicy {
    if let Some(checksums) = session.checksum_policy() {
        policy = policy.with_checksum_policy(checksums);
    }
    if let Some(updates) = session.update_policy() {
        policy = policy.with_update_policy(updates);
    }
    policy
}

/// Extend a dominant mirror with whatever `recessive` contributes that it does not cover yet
///
/// Returns `None` if the mirror already covers everything.
fn merge_mirrors(dominant: &RemoteRepository, recessive: &RemoteRepository) -> Option<RemoteRepository> {
    let coverage: HashSet<&str> = dominant
        .mirrored_repositories()
        .iter()
        .map(RemoteRepository::id)
        .collect();
    let underlying: &[RemoteRepository] = if recessive.is_mirror() {
        recessive.mirrored_repositories()
    } else {
        std::slice::from_ref(recessive)
    };

    let mut seen = coverage.clone();
    let additions: Vec<RemoteRepository> = underlying
        .iter()
        .filter(|r| seen.insert(r.id()))
        .cloned()
        .collect();
    if additions.is_empty() {
        return None;
    }

    let mut mirrored = dominant.mirrored_repositories().to_vec();
    mirrored.extend(additions);
    Some(
        dominant
            .to_builder()
            .release_policy(recessive.release_policy().clone())
            .snapshot_policy(recessive.snapshot_policy().clone())
            .mirrored_repositories(mirrored)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::SimpleLocalStore;
    use crate::repository::{Authentication, Proxy, UPDATE_POLICY_NEVER};
    use crate::session::Session;
    use crate::selector::MirrorSelector;

    fn session() -> Session {
        Session::new(Arc::new(SimpleLocalStore::new("/tmp/depot-aggregator")))
    }

    fn repo(id: &str, url: &str, enabled: bool) -> RemoteRepository {
        RemoteRepository::builder(id, "test", url)
            .policy(RepositoryPolicy::new(enabled, "", ""))
            .build()
    }

    fn ids(repos: &[RemoteRepository]) -> Vec<&str> {
        repos.iter().map(RemoteRepository::id).collect()
    }

    #[test]
    fn test_get_policy() {
        let repo = RemoteRepository::builder("id", "type", "http://localhost")
            .snapshot_policy(RepositoryPolicy::new(true, UPDATE_POLICY_ALWAYS, CHECKSUM_POLICY_IGNORE))
            .release_policy(RepositoryPolicy::new(true, UPDATE_POLICY_NEVER, CHECKSUM_POLICY_FAIL))
            .build();
        let session = session();
        let manager = RemoteRepositoryManager::default();

        let policy = manager.get_policy(&session.validate().unwrap(), &repo, true, true);
        assert!(policy.is_enabled());
        assert_eq!(policy.checksum_policy(), CHECKSUM_POLICY_FAIL);
        assert_eq!(policy.update_policy(), UPDATE_POLICY_ALWAYS);

        let releases = manager.get_policy(&session.validate().unwrap(), &repo, true, false);
        assert_eq!(releases.update_policy(), UPDATE_POLICY_NEVER);
        assert!(!manager.get_policy(&session.validate().unwrap(), &repo, false, false).is_enabled());
    }

    #[test]
    fn test_get_policy_enabled_requires_both() {
        let repo = RemoteRepository::builder("id", "type", "http://localhost")
            .snapshot_policy(RepositoryPolicy::disabled())
            .build();
        let session = session();
        let policy =
            RemoteRepositoryManager::default().get_policy(&session.validate().unwrap(), &repo, true, true);
        assert!(!policy.is_enabled());
    }

    #[test]
    fn test_session_overrides_policy() {
        let repo = RemoteRepository::builder("id", "type", "http://localhost").build();
        let session = session()
            .with_checksum_policy(Some(CHECKSUM_POLICY_IGNORE.into()))
            .with_update_policy(Some(UPDATE_POLICY_NEVER.into()));
        let policy =
            RemoteRepositoryManager::default().get_policy(&session.validate().unwrap(), &repo, true, true);
        assert_eq!(policy.checksum_policy(), CHECKSUM_POLICY_IGNORE);
        assert_eq!(policy.update_policy(), UPDATE_POLICY_NEVER);
    }

    #[test]
    fn test_effective_update_policy() {
        let session = session();
        let session = session.validate().unwrap();
        let analyzer = DefaultUpdatePolicyAnalyzer;
        assert_eq!(analyzer.effective_update_policy(&session, "daily", "always"), "always");
        assert_eq!(analyzer.effective_update_policy(&session, "interval:30", "daily"), "interval:30");
        assert_eq!(analyzer.effective_update_policy(&session, "never", "interval:2000"), "interval:2000");
        assert_eq!(analyzer.effective_update_policy(&session, "never", "never"), "never");
    }

    #[test]
    fn test_update_required() {
        let session = session();
        let session = session.validate().unwrap();
        let analyzer = DefaultUpdatePolicyAnalyzer;
        let hour_ago = SystemTime::now() - Duration::from_secs(3600);

        assert!(analyzer.is_update_required(&session, None, "never"));
        assert!(analyzer.is_update_required(&session, Some(hour_ago), "always"));
        assert!(analyzer.is_update_required(&session, Some(hour_ago), "interval:30"));
        assert!(!analyzer.is_update_required(&session, Some(hour_ago), "daily"));
        assert!(!analyzer.is_update_required(&session, Some(hour_ago), "never"));
    }

    #[test]
    fn test_aggregate_disjoint_keeps_order() {
        let session = session();
        let dominant = vec![repo("a", "file://a", true), repo("b", "file://b", true)];
        let recessive = vec![repo("c", "http://c", true), repo("d", "http://d", false)];

        let result = RemoteRepositoryManager::default().aggregate_repositories(
            &session.validate().unwrap(),
            &dominant,
            &recessive,
            false,
        );
        let expected: Vec<RemoteRepository> = dominant.into_iter().chain(recessive).collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_aggregate_simple_repos() {
        let session = session();
        let dominant = repo("a", "file://", false);
        let recessive1 = repo("a", "http://", true);
        let recessive2 = repo("b", "file://", true);

        let result = RemoteRepositoryManager::default().aggregate_repositories(
            &session.validate().unwrap(),
            &[dominant.clone()],
            &[recessive1, recessive2.clone()],
            false,
        );
        assert_eq!(result, vec![dominant, recessive2]);
    }

    #[test]
    fn test_aggregate_keeps_disabled_recessive_repo() {
        let session = session();
        let session = session.validate().unwrap();
        let manager = RemoteRepositoryManager::default();
        let dominant = repo("a", "file://", true);
        let recessive1 = repo("b", "http://", false);

        let first = manager.aggregate_repositories(&session, &[dominant.clone()], &[recessive1.clone()], false);
        let recessive2 = repo("b", "http://", true);
        let second = manager.aggregate_repositories(&session, &first, &[recessive2], false);

        assert_eq!(second, vec![dominant, recessive1]);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let session = session();
        let session = session.validate().unwrap();
        let manager = RemoteRepositoryManager::default();
        let dominant = vec![repo("a", "file://a", true)];
        let recessive = vec![repo("b", "http://b", true)];

        let once = manager.aggregate_repositories(&session, &dominant, &recessive, false);
        let twice = manager.aggregate_repositories(&session, &once, &recessive, false);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_dominant_mirror_complete() {
        let session = session();
        let dominant1 = repo("a", "http://", false);
        let dominant_mirror = repo("x", "file://", false)
            .to_builder()
            .add_mirrored_repository(dominant1.clone())
            .build();
        let recessive1 = repo("a", "https://", true);
        let recessive_mirror = repo("x", "http://", true)
            .to_builder()
            .add_mirrored_repository(recessive1)
            .build();

        let result = RemoteRepositoryManager::default().aggregate_repositories(
            &session.validate().unwrap(),
            &[dominant_mirror.clone()],
            &[recessive_mirror],
            false,
        );
        assert_eq!(result, vec![dominant_mirror]);
        assert_eq!(result[0].mirrored_repositories(), &[dominant1]);
    }

    #[test]
    fn test_dominant_mirror_incomplete() {
        let session = session();
        let dominant1 = repo("a", "http://", false);
        let dominant_mirror = repo("x", "file://", false)
            .to_builder()
            .add_mirrored_repository(dominant1.clone())
            .build();
        let recessive1 = repo("a", "https://", true);
        let recessive2 = repo("b", "https://", true);
        let recessive_mirror = repo("x", "http://", true)
            .to_builder()
            .mirrored_repositories(vec![recessive1, recessive2.clone()])
            .build();

        let result = RemoteRepositoryManager::default().aggregate_repositories(
            &session.validate().unwrap(),
            &[dominant_mirror],
            &[recessive_mirror],
            false,
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].url(), "file://");
        assert!(result[0].release_policy().is_enabled());
        assert!(result[0].snapshot_policy().is_enabled());
        assert_eq!(result[0].mirrored_repositories(), &[dominant1, recessive2]);
    }

    #[test]
    fn test_dominant_mirror_absorbs_plain_recessive() {
        let session = session();
        let dominant_mirror = repo("x", "file://", true)
            .to_builder()
            .add_mirrored_repository(repo("a", "http://a", true))
            .build();
        let plain = repo("x", "http://x", true);

        let result = RemoteRepositoryManager::default().aggregate_repositories(
            &session.validate().unwrap(),
            &[dominant_mirror],
            &[plain],
            false,
        );
        assert_eq!(ids(result[0].mirrored_repositories()), vec!["a", "x"]);
    }

    #[test]
    fn test_mirror_substitution_and_authentication() {
        let repo_a = repo("a", "http://a", true);
        let mirror = repo("m", "http://mirror", true)
            .to_builder()
            .authentication(Some(Authentication::new("test", "")))
            .build();
        let selected = mirror.clone();
        let session = session()
            .with_mirror_selector(Arc::new(move |_: &RemoteRepository| Some(selected.clone())))
            .with_authentication_selector(Arc::new(|_: &RemoteRepository| {
                Some(Authentication::new("selector", ""))
            }));

        let result = RemoteRepositoryManager::default().aggregate_repositories(
            &session.validate().unwrap(),
            &[],
            &[repo_a.clone()],
            true,
        );
        assert_eq!(ids(&result), vec!["m"]);
        assert_eq!(result[0].authentication(), mirror.authentication());
        assert_eq!(result[0].mirrored_repositories(), &[repo_a]);
    }

    #[test]
    fn test_mirror_proxy_is_kept_without_selector_proxy() {
        let repo_a = repo("a", "http://a", true);
        let mirror = repo("a", "http://a", true)
            .to_builder()
            .proxy(Some(Proxy::new("http", "host", 2011)))
            .build();
        let session = session().with_mirror_selector(Arc::new(move |_: &RemoteRepository| Some(mirror.clone())));

        let result = RemoteRepositoryManager::default().aggregate_repositories(
            &session.validate().unwrap(),
            &[],
            &[repo_a],
            true,
        );
        let proxy = result[0].proxy().unwrap();
        assert_eq!((proxy.protocol(), proxy.host(), proxy.port()), ("http", "host", 2011));
    }

    #[test]
    fn test_proxy_selector() {
        let session = session()
            .with_proxy_selector(Arc::new(|_: &RemoteRepository| Some(Proxy::new("http", "host", 2011))));

        let result = RemoteRepositoryManager::default().aggregate_repositories(
            &session.validate().unwrap(),
            &[],
            &[repo("a", "http://a", true)],
            true,
        );
        assert_eq!(result[0].proxy().unwrap().port(), 2011);
        assert!(result[0].authentication().is_none());
    }

    #[test]
    fn test_closure_mirror_selector_is_consulted_per_repository() {
        let selector = |r: &RemoteRepository| {
            (r.id() == "b").then(|| repo("mb", "http://mb", true))
        };
        assert!(selector.mirror(&repo("a", "http://a", true)).is_none());
        assert_eq!(selector.mirror(&repo("b", "http://b", true)).unwrap().id(), "mb");
    }
}
