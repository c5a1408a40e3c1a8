//! Repository system session
//!
//! A [`Session`] bundles everything an operation needs besides its request.
//! Every field is optional so that a partially configured session can be
//! detected up front: operations call [`Session::validate`] and work with the
//! resulting [`ValidSession`], whose fields are guaranteed to be present.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::artifact::ArtifactTypeRegistry;
use crate::config::ConfigProperties;
use crate::error::InvalidSession;
use crate::events::{NoopListener, RepositoryEvent, RepositoryListener};
use crate::local::LocalStore;
use crate::selector::{
    AuthenticationSelector, MirrorSelector, NoAuthentication, NoMirrors, NoProxy, ProxySelector,
};

static NOOP_LISTENER: NoopListener = NoopListener;

type DataValue = Arc<dyn Any + Send + Sync>;

/// Thread-safe bag for state shared by components during a session, e.g. caches
#[derive(Default)]
pub struct SessionData {
    values: Mutex<HashMap<String, DataValue>>,
}

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<DataValue> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Typed lookup; `None` if absent or of another type
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.get(key).and_then(|value| value.downcast::<T>().ok())
    }

    /// Store or, with `None`, remove a value
    pub fn set(&self, key: impl Into<String>, value: Option<DataValue>) {
        let key: String = key.into();
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        match value {
            Some(value) => {
                values.insert(key, value);
            }
            None => {
                values.remove(&key);
            }
        }
    }

    /// Value under `key`, inserting the result of `init` first if absent
    pub fn get_or_insert_with<T, F>(&self, key: &str, init: F) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        let value = values
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(init()) as DataValue)
            .clone();
        value.downcast::<T>().ok()
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SessionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<&String> = values.keys().collect();
        keys.sort();
        f.debug_struct("SessionData").field("keys", &keys).finish()
    }
}

/// Configuration bundle for repository system operations
///
/// Construct with [`Session::new`] for a usable default, then adjust with the
/// `with_*` methods.
#[derive(Clone, Default)]
pub struct Session {
    pub local_store: Option<Arc<dyn LocalStore>>,
    pub system_properties: Option<HashMap<String, String>>,
    pub user_properties: Option<HashMap<String, String>>,
    pub config_properties: Option<ConfigProperties>,
    pub mirror_selector: Option<Arc<dyn MirrorSelector>>,
    pub proxy_selector: Option<Arc<dyn ProxySelector>>,
    pub authentication_selector: Option<Arc<dyn AuthenticationSelector>>,
    pub artifact_types: Option<ArtifactTypeRegistry>,
    pub data: Option<Arc<SessionData>>,
    pub listener: Option<Arc<dyn RepositoryListener>>,
    /// Overrides the checksum policy of every repository
    pub checksum_policy: Option<String>,
    /// Overrides the update policy of every repository
    pub update_policy: Option<String>,
    pub offline: bool,
}

impl Session {
    /// Session over `local_store` with empty properties and no mirrors, proxies or credentials
    pub fn new(local_store: Arc<dyn LocalStore>) -> Self {
        Self {
            local_store: Some(local_store),
            system_properties: Some(std::env::vars().collect()),
            user_properties: Some(HashMap::new()),
            config_properties: Some(ConfigProperties::new()),
            mirror_selector: Some(Arc::new(NoMirrors)),
            proxy_selector: Some(Arc::new(NoProxy)),
            authentication_selector: Some(Arc::new(NoAuthentication)),
            artifact_types: Some(ArtifactTypeRegistry::with_defaults()),
            data: Some(Arc::new(SessionData::new())),
            listener: None,
            checksum_policy: None,
            update_policy: None,
            offline: false,
        }
    }

    pub fn with_config(mut self, config: ConfigProperties) -> Self {
        self.config_properties = Some(config);
        self
    }

    pub fn with_user_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.user_properties = Some(properties);
        self
    }

    pub fn with_mirror_selector(mut self, selector: Arc<dyn MirrorSelector>) -> Self {
        self.mirror_selector = Some(selector);
        self
    }

    pub fn with_proxy_selector(mut self, selector: Arc<dyn ProxySelector>) -> Self {
        self.proxy_selector = Some(selector);
        self
    }

    pub fn with_authentication_selector(mut self, selector: Arc<dyn AuthenticationSelector>) -> Self {
        self.authentication_selector = Some(selector);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn RepositoryListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_checksum_policy(mut self, policy: Option<String>) -> Self {
        self.checksum_policy = policy;
        self
    }

    pub fn with_update_policy(mut self, policy: Option<String>) -> Self {
        self.update_policy = policy;
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Check that every required field is set
    pub fn validate(&self) -> Result<ValidSession<'_>, InvalidSession> {
        fn require<'a, T: ?Sized>(
            value: Option<&'a T>,
            field: &'static str,
        ) -> Result<&'a T, InvalidSession> {
            value.ok_or(InvalidSession { field })
        }

        Ok(ValidSession {
            local_store: require(self.local_store.as_deref(), "local store")?,
            system_properties: require(self.system_properties.as_ref(), "system properties")?,
            user_properties: require(self.user_properties.as_ref(), "user properties")?,
            config: require(self.config_properties.as_ref(), "config properties")?,
            mirror_selector: require(self.mirror_selector.as_deref(), "mirror selector")?,
            proxy_selector: require(self.proxy_selector.as_deref(), "proxy selector")?,
            authentication_selector: require(
                self.authentication_selector.as_deref(),
                "authentication selector",
            )?,
            artifact_types: require(self.artifact_types.as_ref(), "artifact type registry")?,
            data: require(self.data.as_deref(), "session data")?,
            listener: self.listener.as_deref().unwrap_or(&NOOP_LISTENER),
            checksum_policy: self.checksum_policy.as_deref().filter(|p| !p.is_empty()),
            update_policy: self.update_policy.as_deref().filter(|p| !p.is_empty()),
            offline: self.offline,
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("local_store", &self.local_store.as_ref().map(|s| s.base_dir().to_path_buf()))
            .field("config_properties", &self.config_properties)
            .field("checksum_policy", &self.checksum_policy)
            .field("update_policy", &self.update_policy)
            .field("offline", &self.offline)
            .finish_non_exhaustive()
    }
}

/// Borrowed view of a [`Session`] whose required fields are all present
#[derive(Clone, Copy)]
pub struct ValidSession<'a> {
    local_store: &'a dyn LocalStore,
    system_properties: &'a HashMap<String, String>,
    user_properties: &'a HashMap<String, String>,
    config: &'a ConfigProperties,
    mirror_selector: &'a dyn MirrorSelector,
    proxy_selector: &'a dyn ProxySelector,
    authentication_selector: &'a dyn AuthenticationSelector,
    artifact_types: &'a ArtifactTypeRegistry,
    data: &'a SessionData,
    listener: &'a dyn RepositoryListener,
    checksum_policy: Option<&'a str>,
    update_policy: Option<&'a str>,
    offline: bool,
}

impl<'a> ValidSession<'a> {
    pub fn local_store(&self) -> &'a dyn LocalStore {
        self.local_store
    }

    pub fn system_properties(&self) -> &'a HashMap<String, String> {
        self.system_properties
    }

    pub fn user_properties(&self) -> &'a HashMap<String, String> {
        self.user_properties
    }

    /// User properties take precedence over system properties
    pub fn property(&self, key: &str) -> Option<&'a str> {
        self.user_properties
            .get(key)
            .or_else(|| self.system_properties.get(key))
            .map(String::as_str)
    }

    pub fn config(&self) -> &'a ConfigProperties {
        self.config
    }

    pub fn mirror_selector(&self) -> &'a dyn MirrorSelector {
        self.mirror_selector
    }

    pub fn proxy_selector(&self) -> &'a dyn ProxySelector {
        self.proxy_selector
    }

    pub fn authentication_selector(&self) -> &'a dyn AuthenticationSelector {
        self.authentication_selector
    }

    pub fn artifact_types(&self) -> &'a ArtifactTypeRegistry {
        self.artifact_types
    }

    pub fn data(&self) -> &'a SessionData {
        self.data
    }

    pub fn checksum_policy(&self) -> Option<&'a str> {
        self.checksum_policy
    }

    pub fn update_policy(&self) -> Option<&'a str> {
        self.update_policy
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn emit(&self, event: RepositoryEvent<'_>) {
        self.listener.on_event(&event);
    }
}

impl std::fmt::Debug for ValidSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidSession")
            .field("local_store", &self.local_store.base_dir())
            .field("offline", &self.offline)
            .finish_non_exhaustive()
    }
}
