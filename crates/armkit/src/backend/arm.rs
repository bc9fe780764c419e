//! Azure Resource Manager backend.
//!
//! This module provides the [`ArmBackend`] implementation, a blocking client
//! for the ARM REST API. Authentication is out of scope: the backend is
//! handed an already-issued bearer token (for example the output of
//! `az account get-access-token`).
//!
//! # Pagination
//!
//! List calls return ARM's `nextLink` URL as the page token. Passing it back
//! fetches the following page verbatim.

use crate::backend::ResourceProvider;
use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::resource_id;
use crate::types::{PLATFORM_AZURE, Page, Resource, Tags, TypedEndpoint};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Default public-cloud management endpoint.
pub const DEFAULT_API_BASE: &str = "https://management.azure.com";

/// API version for resource group and resource listing calls.
const LIST_API_VERSION: &str = "2021-04-01";

/// Azure Resource Manager backend.
pub struct ArmBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Management API base URL.
    api_base: String,
    /// Subscription every call is scoped to.
    subscription_id: String,
    /// Bearer token sent with each request.
    access_token: String,
}

impl ArmBackend {
    /// Create a backend against the public-cloud endpoint.
    #[must_use]
    pub fn new(subscription_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::with_api_base(DEFAULT_API_BASE, subscription_id, access_token)
    }

    /// Create a backend with a custom API base (sovereign clouds, test servers).
    #[must_use]
    pub fn with_api_base(
        api_base: impl Into<String>,
        subscription_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        let agent = ureq::Agent::new_with_defaults();
        Self {
            agent,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            subscription_id: subscription_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Get the current API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn subscription_url(&self) -> String {
        format!("{}/subscriptions/{}", self.api_base, self.subscription_id)
    }

    fn groups_url(&self) -> String {
        format!(
            "{}/resourcegroups?api-version={}",
            self.subscription_url(),
            LIST_API_VERSION
        )
    }

    fn group_url(&self, group: &str) -> String {
        format!(
            "{}/resourcegroups/{}?api-version={}",
            self.subscription_url(),
            group,
            LIST_API_VERSION
        )
    }

    fn group_resources_url(&self, group: &str) -> String {
        format!(
            "{}/resourceGroups/{}/resources?api-version={}",
            self.subscription_url(),
            group,
            LIST_API_VERSION
        )
    }

    fn resource_url(&self, id: &str, api_version: &str) -> String {
        let id = id.trim_start_matches('/');
        format!("{}/{}?api-version={}", self.api_base, id, api_version)
    }

    fn typed_url(&self, endpoint: TypedEndpoint, group: &str, name: &str) -> String {
        format!(
            "{}/resourceGroups/{}/providers/{}/{}?api-version={}",
            self.subscription_url(),
            group,
            endpoint.resource_type(),
            name,
            endpoint.api_version()
        )
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// GET `url` and decode the JSON body.
    fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        operation: &str,
        id: Option<&str>,
    ) -> Result<T> {
        ctx.check()?;
        log::trace!("GET {url}");

        let mut response = self
            .agent
            .get(url)
            .config()
            .timeout_global(ctx.remaining())
            .build()
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json")
            .call()
            .map_err(|e| classify(e, operation, id))?;

        response
            .body_mut()
            .read_json()
            .map_err(|e| classify(e, operation, id))
    }

    /// PATCH `url` with a `{"tags": ...}` body.
    fn patch_tags(
        &self,
        ctx: &CallContext,
        url: &str,
        tags: &Tags,
        operation: &str,
        id: &str,
    ) -> Result<()> {
        ctx.check()?;
        log::trace!("PATCH {url}");

        self.agent
            .patch(url)
            .config()
            .timeout_global(ctx.remaining())
            .build()
            .header("Authorization", &self.authorization())
            .send_json(serde_json::json!({ "tags": tags }))
            .map_err(|e| classify(e, operation, Some(id)))?;

        Ok(())
    }
}

impl ResourceProvider for ArmBackend {
    fn list_resource_groups(&self, ctx: &CallContext, page: Option<&str>) -> Result<Page<String>> {
        let url = page.map_or_else(|| self.groups_url(), str::to_string);
        let response: ListResponse<ArmResourceGroup> =
            self.get_json(ctx, &url, "list resource groups", None)?;

        Ok(Page {
            items: response.value.into_iter().map(|g| g.name).collect(),
            next: response.next_link,
        })
    }

    fn list_resources(
        &self,
        ctx: &CallContext,
        group: &str,
        page: Option<&str>,
    ) -> Result<Page<Resource>> {
        let url = page.map_or_else(|| self.group_resources_url(group), str::to_string);
        let operation = format!("list resources in {group}");
        let response: ListResponse<ArmResource> = self.get_json(ctx, &url, &operation, None)?;

        Ok(Page {
            items: response
                .value
                .into_iter()
                .map(|r| r.into_resource(Some(group)))
                .collect(),
            next: response.next_link,
        })
    }

    fn get_resource_by_id(
        &self,
        ctx: &CallContext,
        id: &str,
        api_version: &str,
    ) -> Result<Resource> {
        let url = self.resource_url(id, api_version);
        let resource: ArmResource = self.get_json(ctx, &url, "get resource", Some(id))?;
        Ok(resource.into_resource(None))
    }

    fn update_resource_tags(
        &self,
        ctx: &CallContext,
        id: &str,
        api_version: &str,
        tags: &Tags,
    ) -> Result<()> {
        let url = self.resource_url(id, api_version);
        self.patch_tags(ctx, &url, tags, "update resource tags", id)
    }

    fn update_typed_resource_tags(
        &self,
        ctx: &CallContext,
        endpoint: TypedEndpoint,
        group: &str,
        name: &str,
        tags: &Tags,
    ) -> Result<()> {
        let url = self.typed_url(endpoint, group, name);
        let target = format!("{}/{group}/{name}", endpoint.resource_type());
        self.patch_tags(ctx, &url, tags, "update typed resource tags", &target)
    }

    fn get_resource_group_tags(&self, ctx: &CallContext, group: &str) -> Result<Tags> {
        let url = self.group_url(group);
        let response: ArmResourceGroup =
            self.get_json(ctx, &url, "get resource group", Some(group))?;
        Ok(response.tags.unwrap_or_default())
    }
}

/// Map a transport or status error onto the provider taxonomy.
fn classify(err: ureq::Error, operation: &str, id: Option<&str>) -> Error {
    match err {
        ureq::Error::StatusCode(code) => Error::from_status(code, operation, id),
        ureq::Error::Timeout(_)
        | ureq::Error::Io(_)
        | ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound => Error::Transient {
            operation: operation.to_string(),
            message: err.to_string(),
            status: None,
        },
        ureq::Error::Json(e) => Error::InvalidResponse(e.to_string()),
        other => Error::Other(format!("{operation}: {other}")),
    }
}

// =============================================================================
// ARM response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArmResourceGroup {
    name: String,
    #[serde(default)]
    tags: Option<Tags>,
}

#[derive(Debug, Deserialize)]
struct ArmResource {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    tags: Option<Tags>,
}

impl ArmResource {
    fn into_resource(self, group: Option<&str>) -> Resource {
        let resource_group = match group {
            Some(g) => g.to_string(),
            None => resource_id::parse(&self.id)
                .map(|parsed| parsed.resource_group)
                .unwrap_or_default(),
        };

        Resource {
            id: self.id,
            name: self.name,
            region: self.location,
            resource_group,
            platform: PLATFORM_AZURE.to_string(),
            kind: self.kind,
            tags: self.tags.unwrap_or_default(),
        }
    }
}
