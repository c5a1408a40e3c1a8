//! Remote repository descriptors and their policies

use std::fmt;

pub const UPDATE_POLICY_NEVER: &str = "never";
pub const UPDATE_POLICY_ALWAYS: &str = "always";
pub const UPDATE_POLICY_DAILY: &str = "daily";
/// Prefix of `interval:<minutes>`
pub const UPDATE_POLICY_INTERVAL: &str = "interval";

pub const CHECKSUM_POLICY_FAIL: &str = "fail";
pub const CHECKSUM_POLICY_WARN: &str = "warn";
pub const CHECKSUM_POLICY_IGNORE: &str = "ignore";

/// Whether a repository serves releases or snapshots, how often to check it and
/// how strictly to verify checksums
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryPolicy {
    enabled: bool,
    update_policy: String,
    checksum_policy: String,
}

impl RepositoryPolicy {
    pub fn new(
        enabled: bool,
        update_policy: impl Into<String>,
        checksum_policy: impl Into<String>,
    ) -> Self {
        Self {
            enabled,
            update_policy: update_policy.into(),
            checksum_policy: checksum_policy.into(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, UPDATE_POLICY_DAILY, CHECKSUM_POLICY_WARN)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn update_policy(&self) -> &str {
        &self.update_policy
    }

    pub fn checksum_policy(&self) -> &str {
        &self.checksum_policy
    }

    pub fn with_update_policy(mut self, update_policy: impl Into<String>) -> Self {
        self.update_policy = update_policy.into();
        self
    }

    pub fn with_checksum_policy(mut self, checksum_policy: impl Into<String>) -> Self {
        self.checksum_policy = checksum_policy.into();
        self
    }
}

impl Default for RepositoryPolicy {
    fn default() -> Self {
        Self::new(true, UPDATE_POLICY_DAILY, CHECKSUM_POLICY_WARN)
    }
}

impl fmt::Display for RepositoryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.enabled {
            write!(
                f,
                "enabled (updates: {}, checksums: {})",
                self.update_policy, self.checksum_policy
            )
        } else {
            f.write_str("disabled")
        }
    }
}

/// Credentials for a repository or proxy
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Authentication {
    username: String,
    password: String,
}

impl Authentication {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authentication")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Proxy {
    protocol: String,
    host: String,
    port: u16,
    authentication: Option<Authentication>,
}

impl Proxy {
    pub fn new(protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
            authentication: None,
        }
    }

    pub fn with_authentication(mut self, authentication: Option<Authentication>) -> Self {
        self.authentication = authentication;
        self
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn authentication(&self) -> Option<&Authentication> {
        self.authentication.as_ref()
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// A remote repository, possibly standing in as a mirror for others
///
/// Descriptors are immutable; use [`RemoteRepository::to_builder`] to derive a
/// modified copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteRepository {
    id: String,
    content_type: String,
    url: String,
    protocol: String,
    host: String,
    release_policy: RepositoryPolicy,
    snapshot_policy: RepositoryPolicy,
    proxy: Option<Proxy>,
    authentication: Option<Authentication>,
    mirrored: Vec<RemoteRepository>,
    repository_manager: bool,
}

impl RemoteRepository {
    pub fn builder(
        id: impl Into<String>,
        content_type: impl Into<String>,
        url: impl Into<String>,
    ) -> RepositoryBuilder {
        RepositoryBuilder {
            id: id.into(),
            content_type: content_type.into(),
            url: url.into(),
            release_policy: RepositoryPolicy::default(),
            snapshot_policy: RepositoryPolicy::default(),
            proxy: None,
            authentication: None,
            mirrored: Vec::new(),
            repository_manager: false,
        }
    }

    /// Builder seeded with every attribute of this repository
    pub fn to_builder(&self) -> RepositoryBuilder {
        RepositoryBuilder {
            id: self.id.clone(),
            content_type: self.content_type.clone(),
            url: self.url.clone(),
            release_policy: self.release_policy.clone(),
            snapshot_policy: self.snapshot_policy.clone(),
            proxy: self.proxy.clone(),
            authentication: self.authentication.clone(),
            mirrored: self.mirrored.clone(),
            repository_manager: self.repository_manager,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Lower-cased URL scheme, e.g. `https` or `file`
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn policy(&self, snapshot: bool) -> &RepositoryPolicy {
        if snapshot {
            &self.snapshot_policy
        } else {
            &self.release_policy
        }
    }

    pub fn release_policy(&self) -> &RepositoryPolicy {
        &self.release_policy
    }

    pub fn snapshot_policy(&self) -> &RepositoryPolicy {
        &self.snapshot_policy
    }

    /// Enabled for at least one of releases or snapshots
    pub fn is_enabled(&self) -> bool {
        self.release_policy.is_enabled() || self.snapshot_policy.is_enabled()
    }

    pub fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    pub fn authentication(&self) -> Option<&Authentication> {
        self.authentication.as_ref()
    }

    pub fn mirrored_repositories(&self) -> &[RemoteRepository] {
        &self.mirrored
    }

    pub fn is_mirror(&self) -> bool {
        !self.mirrored.is_empty()
    }

    pub fn is_repository_manager(&self) -> bool {
        self.repository_manager
    }

    pub fn is_local_host(&self) -> bool {
        self.protocol == "file" || matches!(self.host.as_str(), "localhost" | "127.0.0.1" | "::1")
    }
}

impl fmt::Display for RemoteRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {}", self.id, self.url, self.content_type)?;
        let flags: Vec<&str> = [
            (self.release_policy.is_enabled(), "releases"),
            (self.snapshot_policy.is_enabled(), "snapshots"),
            (self.is_repository_manager(), "managed"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        if !flags.is_empty() {
            write!(f, ", {}", flags.join("+"))?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, Clone)]
pub struct RepositoryBuilder {
    id: String,
    content_type: String,
    url: String,
    release_policy: RepositoryPolicy,
    snapshot_policy: RepositoryPolicy,
    proxy: Option<Proxy>,
    authentication: Option<Authentication>,
    mirrored: Vec<RemoteRepository>,
    repository_manager: bool,
}

impl RepositoryBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Use the same policy for releases and snapshots
    pub fn policy(mut self, policy: RepositoryPolicy) -> Self {
        self.snapshot_policy = policy.clone();
        self.release_policy = policy;
        self
    }

    pub fn release_policy(mut self, policy: RepositoryPolicy) -> Self {
        self.release_policy = policy;
        self
    }

    pub fn snapshot_policy(mut self, policy: RepositoryPolicy) -> Self {
        self.snapshot_policy = policy;
        self
    }

    pub fn proxy(mut self, proxy: Option<Proxy>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn authentication(mut self, authentication: Option<Authentication>) -> Self {
        self.authentication = authentication;
        self
    }

    pub fn add_mirrored_repository(mut self, repository: RemoteRepository) -> Self {
        self.mirrored.push(repository);
        self
    }

    pub fn mirrored_repositories(mut self, repositories: Vec<RemoteRepository>) -> Self {
        self.mirrored = repositories;
        self
    }

    pub fn repository_manager(mut self, repository_manager: bool) -> Self {
        self.repository_manager = repository_manager;
        self
    }

    pub fn build(self) -> RemoteRepository {
        let (protocol, host) = split_url(&self.url);
        RemoteRepository {
            id: self.id,
            content_type: self.content_type,
            protocol,
            host,
            url: self.url,
            release_policy: self.release_policy,
            snapshot_policy: self.snapshot_policy,
            proxy: self.proxy,
            authentication: self.authentication,
            mirrored: self.mirrored,
            repository_manager: self.repository_manager,
        }
    }
}

/// Extract the scheme and host of a repository URL
fn split_url(url: &str) -> (String, String) {
    let Some((scheme, rest)) = url.split_once(':') else {
        return (String::new(), String::new());
    };
    let protocol = scheme.trim().to_ascii_lowercase();
    let Some(authority) = rest.strip_prefix("//") else {
        return (protocol, String::new());
    };
    let authority = authority.split('/').next().unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    let host = if let Some(bracketed) = host_port.strip_prefix('[') {
        bracketed.split(']').next().unwrap_or_default()
    } else {
        host_port.split(':').next().unwrap_or_default()
    };
    (protocol, host.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_and_host() {
        let repo = RemoteRepository::builder("central", "default", "HTTPS://user@Repo.Example.org:8443/maven2").build();
        assert_eq!(repo.protocol(), "https");
        assert_eq!(repo.host(), "repo.example.org");

        let file = RemoteRepository::builder("local", "default", "file:///var/repo").build();
        assert_eq!(file.protocol(), "file");
        assert_eq!(file.host(), "");
        assert!(file.is_local_host());

        let v6 = RemoteRepository::builder("v6", "default", "http://[::1]:8080/repo").build();
        assert_eq!(v6.host(), "::1");
        assert!(v6.is_local_host());

        let bare = RemoteRepository::builder("bare", "default", "not a url").build();
        assert_eq!(bare.protocol(), "");
    }

    #[test]
    fn test_to_builder_copies_everything() {
        let original = RemoteRepository::builder("a", "default", "http://a")
            .snapshot_policy(RepositoryPolicy::disabled())
            .authentication(Some(Authentication::new("user", "secret")))
            .proxy(Some(Proxy::new("http", "proxy", 3128)))
            .add_mirrored_repository(RemoteRepository::builder("b", "default", "http://b").build())
            .build();

        assert_eq!(original.to_builder().build(), original);
        let changed = original.to_builder().url("http://changed").build();
        assert_eq!(changed.host(), "changed");
        assert_eq!(changed.mirrored_repositories(), original.mirrored_repositories());
        assert!(changed.is_mirror());
    }

    #[test]
    fn test_authentication_debug_hides_password() {
        let auth = Authentication::new("deployer", "hunter2");
        let debug = format!("{auth:?}");
        assert!(debug.contains("deployer"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_display() {
        let repo = RemoteRepository::builder("central", "default", "https://repo1")
            .snapshot_policy(RepositoryPolicy::disabled())
            .build();
        assert_eq!(repo.to_string(), "central (https://repo1, default, releases)");
    }
}
