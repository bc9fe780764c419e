//! In-memory backend.
//!
//! [`MemoryBackend`] keeps a whole inventory in process. It backs the test
//! suites and offline runs against an inventory file, records every call so
//! callers can assert on reads and mutations, and can inject faults at
//! chosen call sites.

use crate::backend::ResourceProvider;
use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::types::{Page, Resource, Tags, TypedEndpoint};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

/// Serializable snapshot of an in-memory inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    /// Tags of the resource groups themselves, keyed by group name.
    #[serde(default)]
    pub group_tags: BTreeMap<String, Tags>,
    /// All resources.
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// Call sites where a fault can be injected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    ListGroups,
    GroupTags(String),
    ListResources(String),
    GetResource(String),
    UpdateTags(String),
}

/// Kind of fault to raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// A retryable failure (HTTP 503).
    Transient,
    /// A non-retryable rejection (HTTP 403).
    Rejected,
}

/// Target of a recorded mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationTarget {
    ById { id: String, api_version: String },
    Typed {
        endpoint: TypedEndpoint,
        group: String,
        name: String,
    },
}

/// One recorded tag write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub target: MutationTarget,
    pub tags: Tags,
}

#[derive(Debug, Default)]
struct State {
    /// Group names in creation order.
    groups: Vec<String>,
    group_tags: HashMap<String, Tags>,
    resources: Vec<Resource>,
    faults: HashMap<FaultPoint, (Fault, u32)>,
    reads: usize,
    mutations: Vec<Mutation>,
}

/// In-memory resource provider.
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<State>,
    page_size: usize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: 100,
        }
    }

    /// Serve listings in pages of `page_size` items.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Create a backend holding `inventory`.
    pub fn from_inventory(inventory: Inventory) -> Self {
        let backend = Self::new();
        for (group, tags) in inventory.group_tags {
            backend.add_group(&group, tags);
        }
        for resource in inventory.resources {
            backend.add_resource(resource);
        }
        backend
    }

    /// Export the current state.
    pub fn to_inventory(&self) -> Inventory {
        let state = self.lock();
        Inventory {
            group_tags: state
                .groups
                .iter()
                .map(|g| (g.clone(), state.group_tags.get(g).cloned().unwrap_or_default()))
                .collect(),
            resources: state.resources.clone(),
        }
    }

    /// Add (or retag) a resource group.
    pub fn add_group(&self, name: &str, tags: Tags) {
        let mut state = self.lock();
        if !state.groups.iter().any(|g| g == name) {
            state.groups.push(name.to_string());
        }
        state.group_tags.insert(name.to_string(), tags);
    }

    /// Add a resource, creating its group if needed. Replaces a resource with the same id.
    pub fn add_resource(&self, resource: Resource) {
        let mut state = self.lock();
        if !state.groups.iter().any(|g| *g == resource.resource_group) {
            state.groups.push(resource.resource_group.clone());
        }
        match state.resources.iter_mut().find(|r| r.id == resource.id) {
            Some(existing) => *existing = resource,
            None => state.resources.push(resource),
        }
    }

    /// Delete a resource, as if removed out of band.
    pub fn remove_resource(&self, id: &str) -> bool {
        let mut state = self.lock();
        let before = state.resources.len();
        state.resources.retain(|r| r.id != id);
        state.resources.len() < before
    }

    /// Overwrite a resource's tags without recording a mutation (out-of-band change).
    pub fn set_tags(&self, id: &str, tags: Tags) -> bool {
        let mut state = self.lock();
        match state.resources.iter_mut().find(|r| r.id == id) {
            Some(resource) => {
                resource.tags = tags;
                true
            }
            None => false,
        }
    }

    /// Current tags of a resource.
    pub fn tags(&self, id: &str) -> Option<Tags> {
        self.lock()
            .resources
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.tags.clone())
    }

    /// Make the next `times` calls at `point` fail with `fault`.
    pub fn inject_fault(&self, point: FaultPoint, fault: Fault, times: u32) {
        self.lock().faults.insert(point, (fault, times));
    }

    /// Number of read calls served so far.
    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    /// Number of mutating calls served so far.
    pub fn mutation_count(&self) -> usize {
        self.lock().mutations.len()
    }

    /// All recorded mutations in call order.
    pub fn mutations(&self) -> Vec<Mutation> {
        self.lock().mutations.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Common prologue: check the context and consume an injected fault.
    fn enter(
        &self,
        ctx: &CallContext,
        point: FaultPoint,
        operation: &str,
    ) -> Result<MutexGuard<'_, State>> {
        ctx.check()?;
        let mut state = self.lock();

        if let Some((fault, remaining)) = state.faults.get_mut(&point)
            && *remaining > 0
        {
            *remaining -= 1;
            let status = match fault {
                Fault::Transient => 503,
                Fault::Rejected => 403,
            };
            return Err(Error::from_status(status, operation, None));
        }

        Ok(state)
    }
}

/// Slice `items` into a page starting at the offset encoded in `token`.
fn paginate<T: Clone>(items: &[T], token: Option<&str>, page_size: usize) -> Result<Page<T>> {
    let start = match token {
        Some(t) => t
            .parse::<usize>()
            .map_err(|_| Error::InvalidResponse(format!("bad page token: {t}")))?,
        None => 0,
    };
    let end = (start + page_size).min(items.len());
    let slice = items.get(start..end).unwrap_or_default().to_vec();
    let next = (end < items.len()).then(|| end.to_string());
    Ok(Page { items: slice, next })
}

impl ResourceProvider for MemoryBackend {
    fn list_resource_groups(&self, ctx: &CallContext, page: Option<&str>) -> Result<Page<String>> {
        let mut state = self.enter(ctx, FaultPoint::ListGroups, "list resource groups")?;
        state.reads += 1;
        paginate(&state.groups, page, self.page_size)
    }

    fn list_resources(
        &self,
        ctx: &CallContext,
        group: &str,
        page: Option<&str>,
    ) -> Result<Page<Resource>> {
        let operation = format!("list resources in {group}");
        let mut state = self.enter(ctx, FaultPoint::ListResources(group.to_string()), &operation)?;
        state.reads += 1;

        if !state.groups.iter().any(|g| g == group) {
            return Err(Error::not_found(group));
        }
        let in_group: Vec<Resource> = state
            .resources
            .iter()
            .filter(|r| r.resource_group == group)
            .cloned()
            .collect();
        paginate(&in_group, page, self.page_size)
    }

    fn get_resource_by_id(
        &self,
        ctx: &CallContext,
        id: &str,
        _api_version: &str,
    ) -> Result<Resource> {
        let mut state = self.enter(ctx, FaultPoint::GetResource(id.to_string()), "get resource")?;
        state.reads += 1;
        state
            .resources
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found(id))
    }

    fn update_resource_tags(
        &self,
        ctx: &CallContext,
        id: &str,
        api_version: &str,
        tags: &Tags,
    ) -> Result<()> {
        let mut state =
            self.enter(ctx, FaultPoint::UpdateTags(id.to_string()), "update resource tags")?;

        let resource = state
            .resources
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::not_found(id))?;
        resource.tags = tags.clone();

        state.mutations.push(Mutation {
            target: MutationTarget::ById {
                id: id.to_string(),
                api_version: api_version.to_string(),
            },
            tags: tags.clone(),
        });
        Ok(())
    }

    fn update_typed_resource_tags(
        &self,
        ctx: &CallContext,
        endpoint: TypedEndpoint,
        group: &str,
        name: &str,
        tags: &Tags,
    ) -> Result<()> {
        ctx.check()?;
        let id = self
            .lock()
            .resources
            .iter()
            .find(|r| {
                r.resource_group == group
                    && r.name == name
                    && r.kind.eq_ignore_ascii_case(endpoint.resource_type())
            })
            .map(|r| r.id.clone())
            .ok_or_else(|| {
                Error::not_found(format!("{}/{group}/{name}", endpoint.resource_type()))
            })?;

        let mut state =
            self.enter(ctx, FaultPoint::UpdateTags(id.clone()), "update typed resource tags")?;
        if let Some(resource) = state.resources.iter_mut().find(|r| r.id == id) {
            resource.tags = tags.clone();
        }
        state.mutations.push(Mutation {
            target: MutationTarget::Typed {
                endpoint,
                group: group.to_string(),
                name: name.to_string(),
            },
            tags: tags.clone(),
        });
        Ok(())
    }

    fn get_resource_group_tags(&self, ctx: &CallContext, group: &str) -> Result<Tags> {
        let mut state = self.enter(ctx, FaultPoint::GroupTags(group.to_string()), "get resource group")?;
        state.reads += 1;
        if !state.groups.iter().any(|g| g == group) {
            return Err(Error::not_found(group));
        }
        Ok(state.group_tags.get(group).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PLATFORM_AZURE;

    fn resource(group: &str, name: &str) -> Resource {
        Resource {
            id: format!("/subscriptions/s/resourceGroups/{group}/providers/Microsoft.Compute/disks/{name}"),
            name: name.to_string(),
            region: "westeurope".to_string(),
            resource_group: group.to_string(),
            platform: PLATFORM_AZURE.to_string(),
            kind: "Microsoft.Compute/disks".to_string(),
            tags: Tags::new(),
        }
    }

    #[test]
    fn test_pagination_preserves_order() {
        let backend = MemoryBackend::new().with_page_size(2);
        for name in ["a", "b", "c", "d", "e"] {
            backend.add_resource(resource("rg", name));
        }

        let ctx = CallContext::new();
        let mut names = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = backend.list_resources(&ctx, "rg", token.as_deref()).unwrap();
            names.extend(page.items.into_iter().map(|r| r.name));
            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        assert_eq!(names, ["a", "b", "c", "d", "e"]);
        assert_eq!(backend.read_count(), 3);
    }

    #[test]
    fn test_fault_injection_expires() {
        let backend = MemoryBackend::new();
        backend.add_group("rg", Tags::new());
        backend.inject_fault(FaultPoint::ListGroups, Fault::Transient, 1);

        let ctx = CallContext::new();
        assert!(backend.list_resource_groups(&ctx, None).unwrap_err().is_retryable());
        assert_eq!(backend.list_resource_groups(&ctx, None).unwrap().items, ["rg"]);
    }

    #[test]
    fn test_group_tag_fault_is_separate_from_listing() {
        let backend = MemoryBackend::new();
        backend.add_group("rg", Tags::new());
        backend.inject_fault(FaultPoint::ListGroups, Fault::Transient, 1);
        backend.inject_fault(FaultPoint::GroupTags("rg".into()), Fault::Rejected, 1);

        let ctx = CallContext::new();
        assert!(!backend.get_resource_group_tags(&ctx, "rg").unwrap_err().is_retryable());
        assert_eq!(backend.get_resource_group_tags(&ctx, "rg").unwrap(), Tags::new());
        assert!(backend.list_resource_groups(&ctx, None).unwrap_err().is_retryable());
        assert_eq!(backend.list_resource_groups(&ctx, None).unwrap().items, ["rg"]);
    }

    #[test]
    fn test_typed_update_ignores_type_case() {
        let backend = MemoryBackend::new();
        let vnet = Resource {
            id: "/subscriptions/s/resourceGroups/rg/providers/microsoft.network/virtualnetworks/net".into(),
            name: "net".into(),
            kind: "microsoft.network/virtualnetworks".into(),
            ..resource("rg", "net")
        };
        let id = vnet.id.clone();
        backend.add_resource(vnet);

        let mut tags = Tags::new();
        tags.insert("env".into(), Some("prod".into()));
        backend
            .update_typed_resource_tags(&CallContext::new(), TypedEndpoint::VirtualNetwork, "rg", "net", &tags)
            .unwrap();

        assert_eq!(backend.tags(&id), Some(tags));
        assert!(matches!(backend.mutations()[0].target, MutationTarget::Typed { .. }));
    }

    #[test]
    fn test_update_records_mutation() {
        let backend = MemoryBackend::new();
        let r = resource("rg", "disk");
        let id = r.id.clone();
        backend.add_resource(r);

        let mut tags = Tags::new();
        tags.insert("env".into(), Some("prod".into()));
        backend
            .update_resource_tags(&CallContext::new(), &id, "2021-04-01", &tags)
            .unwrap();

        assert_eq!(backend.tags(&id), Some(tags));
        assert_eq!(backend.mutation_count(), 1);
    }

    #[test]
    fn test_update_missing_resource_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend
            .update_resource_tags(&CallContext::new(), "/nope", "2021-04-01", &Tags::new())
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(backend.mutation_count(), 0);
    }

    #[test]
    fn test_inventory_round_trip() {
        let backend = MemoryBackend::new();
        let mut group_tags = Tags::new();
        group_tags.insert("owner".into(), Some("platform".into()));
        backend.add_group("rg", group_tags);
        backend.add_resource(resource("rg", "disk"));

        let inventory = backend.to_inventory();
        let restored = MemoryBackend::from_inventory(inventory.clone());
        assert_eq!(restored.to_inventory(), inventory);
    }
}
