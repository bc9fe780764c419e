//! Backend abstraction for resource provider operations.
//!
//! The [`ResourceProvider`] trait defines the interface for talking to the
//! cloud resource API, allowing for different implementations:
//! - [`arm::ArmBackend`]: Azure Resource Manager over HTTPS
//! - [`memory::MemoryBackend`]: in-memory inventory for tests and offline runs

pub mod arm;
pub mod memory;

use crate::context::CallContext;
use crate::error::Result;
use crate::types::{Page, Resource, Tags, TypedEndpoint};

/// Backend trait for resource provider operations.
///
/// Every call is blocking and takes a [`CallContext`]; implementations must
/// check it before issuing remote work.
pub trait ResourceProvider: Send + Sync {
    /// List one page of resource group names.
    fn list_resource_groups(&self, ctx: &CallContext, page: Option<&str>) -> Result<Page<String>>;

    /// List one page of resources in `group`, in provider order.
    fn list_resources(
        &self,
        ctx: &CallContext,
        group: &str,
        page: Option<&str>,
    ) -> Result<Page<Resource>>;

    /// Fetch a single resource with its current tags.
    fn get_resource_by_id(&self, ctx: &CallContext, id: &str, api_version: &str)
    -> Result<Resource>;

    /// Replace the tags of a resource through the generic update-by-id call.
    fn update_resource_tags(
        &self,
        ctx: &CallContext,
        id: &str,
        api_version: &str,
        tags: &Tags,
    ) -> Result<()>;

    /// Replace the tags of a resource through a type-specific endpoint.
    fn update_typed_resource_tags(
        &self,
        ctx: &CallContext,
        endpoint: TypedEndpoint,
        group: &str,
        name: &str,
        tags: &Tags,
    ) -> Result<()>;

    /// Tags attached to a resource group itself.
    fn get_resource_group_tags(&self, ctx: &CallContext, group: &str) -> Result<Tags>;
}
