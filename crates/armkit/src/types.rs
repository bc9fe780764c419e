//! Core types shared by the provider backends.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Tag mapping of a resource. Values are optional: a key may carry no value.
pub type Tags = BTreeMap<String, Option<String>>;

/// Platform marker stamped on every resource the ARM backend returns.
pub const PLATFORM_AZURE: &str = "azure";

/// A governed cloud resource as seen at scan time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Provider-issued identifier, unique across the subscription.
    pub id: String,
    /// Resource name.
    pub name: String,
    /// Region (ARM `location`).
    pub region: String,
    /// Resource group the resource lives in.
    pub resource_group: String,
    /// Platform tag (e.g. `azure`).
    pub platform: String,
    /// Provider resource type, e.g. `Microsoft.Network/virtualNetworks`.
    #[serde(default)]
    pub kind: String,
    /// Current tags.
    #[serde(default)]
    pub tags: Tags,
}

impl Resource {
    /// Check whether the resource carries `key`, with or without a value.
    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    /// Look up a tag. The outer option is presence, the inner one the value.
    pub fn tag(&self, key: &str) -> Option<Option<&str>> {
        self.tags.get(key).map(Option::as_deref)
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page, in provider order.
    pub items: Vec<T>,
    /// Token for the next page, `None` on the last page.
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// A page with no successor.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Resource types whose tags must be written through a dedicated endpoint
/// instead of the generic update-by-id call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypedEndpoint {
    /// `Microsoft.Network/virtualNetworks`
    VirtualNetwork,
}

impl TypedEndpoint {
    /// Fully qualified resource type served by this endpoint.
    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::VirtualNetwork => "Microsoft.Network/virtualNetworks",
        }
    }

    /// API version the endpoint is called with.
    pub fn api_version(&self) -> &'static str {
        match self {
            Self::VirtualNetwork => "2022-01-01",
        }
    }
}

/// Configuration for retry behavior on transient failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64()).max(0.0);
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}
