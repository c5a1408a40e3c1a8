//! Priority ranking for pluggable components
//!
//! A [`PrioritizedComponents`] collects the candidate implementations of one
//! capability (transporters, layouts, connectors, ...) and keeps them sorted
//! by effective priority. The effective priority of a candidate is either
//! read from the session configuration (`depot.priority.<Type>`) or, in
//! implicit mode, derived from its registration order.
//!
//! A NaN priority disables a component. Disabled components sort after every
//! enabled one, so the enabled candidates always form a prefix.

use std::cmp::Ordering;
use std::fmt;

use crate::config::{self, ConfigProperties};
use crate::error::NoComponentAvailable;

const FACTORY_SUFFIX: &str = "Factory";

/// Explicit type tag supplied when a component is registered
///
/// Used for configuration lookup and diagnostics in place of runtime type
/// introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentType {
    qualified_name: &'static str,
    simple_name: &'static str,
}

impl ComponentType {
    /// Create a type tag from a path such as `depot_core::connector::FileTransporterFactory`
    pub fn new(qualified_name: &'static str) -> Self {
        let simple_name = qualified_name
            .rsplit("::")
            .next()
            .unwrap_or(qualified_name);
        Self {
            qualified_name,
            simple_name,
        }
    }

    pub fn qualified_name(&self) -> &'static str {
        self.qualified_name
    }

    pub fn simple_name(&self) -> &'static str {
        self.simple_name
    }

    /// Configuration keys consulted for this type, most specific first
    pub fn config_keys(&self) -> Vec<String> {
        let mut keys = vec![
            format!("{}{}", config::PREFIX_PRIORITY, self.qualified_name),
            format!("{}{}", config::PREFIX_PRIORITY, self.simple_name),
        ];
        if let Some(stripped) = self.simple_name.strip_suffix(FACTORY_SUFFIX) {
            keys.push(format!("{}{}", config::PREFIX_PRIORITY, stripped));
        }
        keys
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.simple_name)
    }
}

/// A registered candidate with its effective priority
#[derive(Debug, Clone)]
pub struct PrioritizedComponent<T> {
    component: T,
    component_type: ComponentType,
    priority: f32,
    index: usize,
}

impl<T> PrioritizedComponent<T> {
    pub fn new(component: T, component_type: ComponentType, priority: f32, index: usize) -> Self {
        Self {
            component,
            component_type,
            priority,
            index,
        }
    }

    pub fn component(&self) -> &T {
        &self.component
    }

    pub fn into_component(self) -> T {
        self.component
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    pub fn priority(&self) -> f32 {
        self.priority
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_disabled(&self) -> bool {
        self.priority.is_nan()
    }

    /// Ranking order: descending priority, NaN last, then ascending index
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        let by_priority = match (self.is_disabled(), other.is_disabled()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => other.priority.total_cmp(&self.priority),
        };
        by_priority.then_with(|| self.index.cmp(&other.index))
    }
}

/// Ranked set of candidate implementations for one capability
#[derive(Debug)]
pub struct PrioritizedComponents<'a, T> {
    config: &'a ConfigProperties,
    use_insertion_order: bool,
    components: Vec<PrioritizedComponent<T>>,
    first_disabled: usize,
}

impl<'a, T> PrioritizedComponents<'a, T> {
    pub fn new(config: &'a ConfigProperties) -> Self {
        let use_insertion_order = config.get_bool(
            config::DEFAULT_IMPLICIT_PRIORITIES,
            &[config::IMPLICIT_PRIORITIES],
        );
        Self {
            config,
            use_insertion_order,
            components: Vec::new(),
            first_disabled: 0,
        }
    }

    /// Register a candidate
    ///
    /// `priority` is used unless the configuration overrides it for the
    /// candidate's type, or implicit ordering is enabled.
    pub fn add(&mut self, component: T, component_type: ComponentType, priority: f32) {
        let index = self.components.len();
        let priority = if self.use_insertion_order {
            -(index as f32)
        } else {
            self.config
                .get_float(priority, &component_type.config_keys())
        };
        let candidate = PrioritizedComponent::new(component, component_type, priority, index);

        let position = if self.use_insertion_order {
            index
        } else {
            match self
                .components
                .binary_search_by(|probe| probe.rank_cmp(&candidate))
            {
                Ok(found) => found + 1,
                Err(insert_at) => insert_at,
            }
        };

        let enabled = !candidate.is_disabled();
        self.components.insert(position, candidate);
        if position <= self.first_disabled && enabled {
            self.first_disabled += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn all(&self) -> &[PrioritizedComponent<T>] {
        &self.components
    }

    pub fn enabled(&self) -> &[PrioritizedComponent<T>] {
        &self.components[..self.first_disabled]
    }

    /// Highest ranked enabled candidate
    pub fn first_enabled(
        &self,
        capability: &'static str,
    ) -> Result<&PrioritizedComponent<T>, NoComponentAvailable> {
        self.enabled()
            .first()
            .ok_or_else(|| NoComponentAvailable::new(capability, self.list()))
    }

    /// Human readable listing, e.g. `FileTransporterFactory, HttpTransporterFactory (disabled)`
    pub fn list(&self) -> String {
        self.components
            .iter()
            .map(|c| {
                if c.is_disabled() {
                    format!("{} (disabled)", c.component_type.simple_name())
                } else {
                    c.component_type.simple_name().to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
