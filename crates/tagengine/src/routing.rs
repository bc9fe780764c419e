//! Tag write routing.
//!
//! Most resources accept a tag update through the generic update-by-id call,
//! but some resource types only honor tags written through their own
//! endpoint. [`UpdateRoutes`] maps a resource type to the call that must be
//! used, and [`ApiVersions`] picks the API version for generic calls.

use armkit::{CallContext, ResourceProvider, Tags, TypedEndpoint, resource_id};
use std::collections::HashMap;

/// API version used when no table entry matches.
pub const DEFAULT_API_VERSION: &str = "2021-04-01";

/// How a tag write is issued for a given resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStrategy {
    /// `update_resource_tags(id, api_version, tags)`
    Generic,
    /// `update_typed_resource_tags(endpoint, group, name, tags)`
    Typed(TypedEndpoint),
}

/// Resource type to update strategy lookup.
#[derive(Debug, Clone)]
pub struct UpdateRoutes {
    /// Keyed by lowercased resource type.
    routes: HashMap<String, UpdateStrategy>,
}

impl Default for UpdateRoutes {
    fn default() -> Self {
        Self::empty().with_typed(TypedEndpoint::VirtualNetwork)
    }
}

impl UpdateRoutes {
    /// A table that routes everything through the generic call.
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Route `resource_type` with `strategy`.
    #[must_use]
    pub fn with_route(mut self, resource_type: &str, strategy: UpdateStrategy) -> Self {
        self.routes
            .insert(resource_type.to_ascii_lowercase(), strategy);
        self
    }

    /// Route the type served by `endpoint` through that endpoint.
    #[must_use]
    pub fn with_typed(self, endpoint: TypedEndpoint) -> Self {
        self.with_route(endpoint.resource_type(), UpdateStrategy::Typed(endpoint))
    }

    /// Strategy for `resource_type`. Resource types compare case-insensitively.
    pub fn strategy_for(&self, resource_type: &str) -> UpdateStrategy {
        self.routes
            .get(&resource_type.to_ascii_lowercase())
            .copied()
            .unwrap_or(UpdateStrategy::Generic)
    }
}

/// Provider namespace to API version lookup, first match wins.
#[derive(Debug, Clone)]
pub struct ApiVersions {
    entries: Vec<(String, String)>,
    default: String,
}

impl Default for ApiVersions {
    fn default() -> Self {
        Self {
            entries: vec![
                ("microsoft.insights".into(), "2022-04-01".into()),
                ("microsoft.network".into(), "2022-01-01".into()),
            ],
            default: DEFAULT_API_VERSION.into(),
        }
    }
}

impl ApiVersions {
    /// Add an entry, checked after the existing ones.
    #[must_use]
    pub fn with_entry(mut self, provider: &str, version: &str) -> Self {
        self.entries
            .push((provider.to_ascii_lowercase(), version.to_string()));
        self
    }

    /// API version for the resource `id`.
    ///
    /// Matched against the provider segment of the id. Ids that do not parse
    /// are matched as a whole.
    pub fn for_id(&self, id: &str) -> &str {
        let haystack = resource_id::parse(id)
            .map(|parsed| parsed.provider)
            .unwrap_or_else(|_| id.to_string())
            .to_ascii_lowercase();

        let version = self
            .entries
            .iter()
            .find(|(provider, _)| haystack.contains(provider.as_str()))
            .map_or(self.default.as_str(), |(_, version)| version.as_str());

        log::trace!("API version {version} for {id}");
        version
    }
}

/// Issues tag writes through the route registered for the resource type.
#[derive(Debug, Clone, Default)]
pub struct TagWriter {
    routes: UpdateRoutes,
    versions: ApiVersions,
}

impl TagWriter {
    pub fn new(routes: UpdateRoutes, versions: ApiVersions) -> Self {
        Self { routes, versions }
    }

    /// API version for reads and generic writes of `id`.
    pub fn api_version(&self, id: &str) -> &str {
        self.versions.for_id(id)
    }

    /// Replace the tags of `id` (of type `kind`) with `tags`. Never retried.
    pub fn write<P: ResourceProvider + ?Sized>(
        &self,
        provider: &P,
        ctx: &CallContext,
        id: &str,
        kind: &str,
        tags: &Tags,
    ) -> armkit::Result<()> {
        match self.routes.strategy_for(kind) {
            UpdateStrategy::Generic => {
                provider.update_resource_tags(ctx, id, self.api_version(id), tags)
            }
            UpdateStrategy::Typed(endpoint) => {
                let parsed = resource_id::parse(id)?;
                log::debug!("Writing tags of {id} through the {kind} endpoint");
                provider.update_typed_resource_tags(
                    ctx,
                    endpoint,
                    &parsed.resource_group,
                    &parsed.resource_name,
                    tags,
                )
            }
        }
    }
}
