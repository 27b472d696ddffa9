use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::authz::context::RequestContext;
use crate::authz::evaluator::AuthorizeService;
use crate::errors::{AccessError, AccessResult};
use crate::models::{Action, ObjectRef};

/// Visibility rule for records imported from one external source (quality
/// assurance feeds and the like). Strategies are resolved once at
/// configuration load; a missing configuration denies.
#[async_trait]
pub trait SourceSecurity: Send + Sync {
    async fn can_view(
        &self,
        authorize: &AuthorizeService,
        ctx: &RequestContext,
        object: ObjectRef,
    ) -> AccessResult<bool>;
}

/// Only system administrators see the source's records.
pub struct AdministratorsOnly;

#[async_trait]
impl SourceSecurity for AdministratorsOnly {
    async fn can_view(
        &self,
        authorize: &AuthorizeService,
        ctx: &RequestContext,
        _object: ObjectRef,
    ) -> AccessResult<bool> {
        Ok(authorize.is_admin(ctx))
    }
}

/// Records are visible to whoever can READ the related object.
pub struct ObjectReadable;

#[async_trait]
impl SourceSecurity for ObjectReadable {
    async fn can_view(
        &self,
        authorize: &AuthorizeService,
        ctx: &RequestContext,
        object: ObjectRef,
    ) -> AccessResult<bool> {
        authorize.authorize_action_boolean(ctx, object, Action::Read).await
    }
}

/// Source name -> strategy table with a fixed default entry.
pub struct SourceSecurityRegistry {
    strategies: HashMap<String, Arc<dyn SourceSecurity>>,
    default: Option<Arc<dyn SourceSecurity>>,
}

impl SourceSecurityRegistry {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
            default: Some(Arc::new(AdministratorsOnly)),
        }
    }

    /// A registry with no default: every unregistered source fails closed
    /// with a configuration error.
    pub fn without_default() -> Self {
        Self {
            strategies: HashMap::new(),
            default: None,
        }
    }

    pub fn with_strategy(mut self, source: &str, strategy: Arc<dyn SourceSecurity>) -> Self {
        self.strategies.insert(source.to_string(), strategy);
        self
    }

    /// Build from `source=strategy` pairs; known strategy names are
    /// "admin_only" and "object_read". Unknown names are a configuration
    /// error, not a silent fallback.
    pub fn from_entries<'a, I>(entries: I) -> AccessResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut registry = Self::new();
        for (source, strategy_name) in entries {
            let strategy: Arc<dyn SourceSecurity> = match strategy_name {
                "admin_only" => Arc::new(AdministratorsOnly),
                "object_read" => Arc::new(ObjectReadable),
                other => {
                    return Err(AccessError::configuration(format!(
                        "unknown source security strategy: {}",
                        other
                    )))
                }
            };
            registry = registry.with_strategy(source, strategy);
        }
        Ok(registry)
    }

    /// Build from the `STACKS_SOURCE_SECURITY` environment variable:
    /// comma-separated `source=strategy` pairs, e.g.
    /// `openaire=object_read,coar-notify=admin_only`. Unset means an empty
    /// table over the administrators-only default.
    pub fn from_env() -> AccessResult<Self> {
        let Ok(raw) = std::env::var("STACKS_SOURCE_SECURITY") else {
            return Ok(Self::new());
        };

        let mut entries = Vec::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (source, strategy) = pair.split_once('=').ok_or_else(|| {
                AccessError::configuration(format!(
                    "malformed STACKS_SOURCE_SECURITY entry: {}",
                    pair
                ))
            })?;
            entries.push((source.trim(), strategy.trim()));
        }
        Self::from_entries(entries)
    }

    pub fn strategy_for(&self, source: &str) -> AccessResult<Arc<dyn SourceSecurity>> {
        if let Some(strategy) = self.strategies.get(source) {
            return Ok(Arc::clone(strategy));
        }
        match &self.default {
            Some(default) => Ok(Arc::clone(default)),
            // deny rather than default open
            None => Err(AccessError::configuration(format!(
                "no security strategy configured for source {}",
                source
            ))),
        }
    }

    pub async fn can_view(
        &self,
        authorize: &AuthorizeService,
        ctx: &RequestContext,
        source: &str,
        object: ObjectRef,
    ) -> AccessResult<bool> {
        let strategy = self.strategy_for(source)?;
        strategy.can_view(authorize, ctx, object).await
    }
}

impl Default for SourceSecurityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
