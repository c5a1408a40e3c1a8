//! Mirror, proxy and authentication lookups consulted when repositories are aggregated

use std::collections::HashMap;

use crate::repository::{Authentication, Proxy, RemoteRepository};

const WILDCARD: &str = "*";
const EXTERNAL_WILDCARD: &str = "external:*";

pub trait MirrorSelector: Send + Sync {
    /// Mirror to use instead of `repository`, if any
    fn mirror(&self, repository: &RemoteRepository) -> Option<RemoteRepository>;
}

pub trait ProxySelector: Send + Sync {
    fn proxy(&self, repository: &RemoteRepository) -> Option<Proxy>;
}

pub trait AuthenticationSelector: Send + Sync {
    fn authentication(&self, repository: &RemoteRepository) -> Option<Authentication>;
}

impl<F> MirrorSelector for F
where
    F: Fn(&RemoteRepository) -> Option<RemoteRepository> + Send + Sync,
{
    fn mirror(&self, repository: &RemoteRepository) -> Option<RemoteRepository> {
        self(repository)
    }
}

impl<F> ProxySelector for F
where
    F: Fn(&RemoteRepository) -> Option<Proxy> + Send + Sync,
{
    fn proxy(&self, repository: &RemoteRepository) -> Option<Proxy> {
        self(repository)
    }
}

impl<F> AuthenticationSelector for F
where
    F: Fn(&RemoteRepository) -> Option<Authentication> + Send + Sync,
{
    fn authentication(&self, repository: &RemoteRepository) -> Option<Authentication> {
        self(repository)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoMirrors;

impl MirrorSelector for NoMirrors {
    fn mirror(&self, _repository: &RemoteRepository) -> Option<RemoteRepository> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProxy;

impl ProxySelector for NoProxy {
    fn proxy(&self, _repository: &RemoteRepository) -> Option<Proxy> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthentication;

impl AuthenticationSelector for NoAuthentication {
    fn authentication(&self, _repository: &RemoteRepository) -> Option<Authentication> {
        None
    }
}

#[derive(Debug, Clone)]
struct MirrorDefinition {
    id: String,
    url: String,
    content_type: String,
    repository_manager: bool,
    mirror_of: String,
    mirror_of_types: String,
}

/// Mirror lookup driven by `mirror_of` patterns
///
/// A pattern is a comma separated list of repository ids where `*` matches
/// everything, `external:*` matches everything not hosted on the local machine
/// and `!id` excludes a repository. An exact id match takes precedence over
/// pattern matches; otherwise the first matching mirror in registration order
/// wins.
#[derive(Debug, Clone, Default)]
pub struct DefaultMirrorSelector {
    mirrors: Vec<MirrorDefinition>,
}

impl DefaultMirrorSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mirror; an empty `content_type` keeps the mirrored repository's type
    pub fn add(
        &mut self,
        id: impl Into<String>,
        url: impl Into<String>,
        content_type: impl Into<String>,
        repository_manager: bool,
        mirror_of: impl Into<String>,
        mirror_of_types: impl Into<String>,
    ) -> &mut Self {
        self.mirrors.push(MirrorDefinition {
            id: id.into(),
            url: url.into(),
            content_type: content_type.into(),
            repository_manager,
            mirror_of: mirror_of.into(),
            mirror_of_types: mirror_of_types.into(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    fn find(&self, repository: &RemoteRepository) -> Option<&MirrorDefinition> {
        let exact = self.mirrors.iter().find(|m| {
            m.mirror_of == repository.id() && matches_type(repository.content_type(), &m.mirror_of_types)
        });
        exact.or_else(|| {
            self.mirrors.iter().find(|m| {
                matches_pattern(repository, &m.mirror_of)
                    && matches_type(repository.content_type(), &m.mirror_of_types)
            })
        })
    }
}

impl MirrorSelector for DefaultMirrorSelector {
    fn mirror(&self, repository: &RemoteRepository) -> Option<RemoteRepository> {
        let definition = self.find(repository)?;
        let content_type = if definition.content_type.is_empty() {
            repository.content_type()
        } else {
            definition.content_type.as_str()
        };
        Some(
            RemoteRepository::builder(definition.id.as_str(), content_type, definition.url.as_str())
                .repository_manager(definition.repository_manager)
                .release_policy(repository.release_policy().clone())
                .snapshot_policy(repository.snapshot_policy().clone())
                .add_mirrored_repository(repository.clone())
                .build(),
        )
    }
}

fn matches_pattern(repository: &RemoteRepository, pattern: &str) -> bool {
    let pattern = pattern.trim();
    if pattern == WILDCARD || pattern == repository.id() {
        return true;
    }

    let mut matched = false;
    for token in pattern.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(excluded) = token.strip_prefix('!') {
            if excluded == repository.id() {
                return false;
            }
        } else if token == repository.id() || token == WILDCARD {
            matched = true;
        } else if token == EXTERNAL_WILDCARD && !repository.is_local_host() {
            matched = true;
        }
    }
    matched
}

fn matches_type(content_type: &str, types: &str) -> bool {
    let types = types.trim();
    if types.is_empty() || types == WILDCARD || types == content_type {
        return true;
    }

    let mut matched = false;
    for token in types.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(excluded) = token.strip_prefix('!') {
            if excluded == content_type {
                return false;
            }
        } else if token == content_type || token == WILDCARD {
            matched = true;
        }
    }
    matched
}

#[derive(Debug, Clone)]
struct ProxyDefinition {
    proxy: Proxy,
    non_proxy_hosts: Vec<String>,
}

/// Proxy lookup by repository protocol, honouring non-proxied host patterns
#[derive(Debug, Clone, Default)]
pub struct DefaultProxySelector {
    proxies: Vec<ProxyDefinition>,
}

impl DefaultProxySelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// `non_proxy_hosts` is a `|` or `,` separated list of host names, `*` wildcards allowed
    pub fn add(&mut self, proxy: Proxy, non_proxy_hosts: &str) -> &mut Self {
        let non_proxy_hosts = non_proxy_hosts
            .split(['|', ','])
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        self.proxies.push(ProxyDefinition {
            proxy,
            non_proxy_hosts,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

impl ProxySelector for DefaultProxySelector {
    fn proxy(&self, repository: &RemoteRepository) -> Option<Proxy> {
        let host = repository.host();
        self.proxies
            .iter()
            .find(|def| {
                def.proxy.protocol().eq_ignore_ascii_case(repository.protocol())
                    && !def.non_proxy_hosts.iter().any(|p| glob_matches(p, host))
            })
            .map(|def| def.proxy.clone())
    }
}

/// Case-sensitive glob match supporting `*` only; callers lower-case both sides
fn glob_matches(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };
    let segments: Vec<&str> = parts.collect();
    let Some((last, middle)) = segments.split_last() else {
        return rest.is_empty();
    };
    for segment in middle {
        match rest.find(segment) {
            Some(at) => rest = &rest[at + segment.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

/// Credentials looked up by repository id
#[derive(Debug, Clone, Default)]
pub struct DefaultAuthenticationSelector {
    repositories: HashMap<String, Authentication>,
}

impl DefaultAuthenticationSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, repository_id: impl Into<String>, authentication: Authentication) -> &mut Self {
        self.repositories.insert(repository_id.into(), authentication);
        self
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

impl AuthenticationSelector for DefaultAuthenticationSelector {
    fn authentication(&self, repository: &RemoteRepository) -> Option<Authentication> {
        self.repositories.get(repository.id()).cloned()
    }
}
