//! # armkit
//!
//! Blocking client library for cloud resource inventory and tag editing.
//!
//! This crate provides functionality for:
//! - Modelling resources and their tag maps
//! - Parsing Azure resource identifiers
//! - Talking to Azure Resource Manager through the [`ResourceProvider`] trait
//! - Cooperative cancellation and deadlines for every remote call
//! - Retrying transient failures with exponential backoff
//!
//! ## Example
//!
//! ```no_run
//! use armkit::{ArmBackend, CallContext, ResourceProvider};
//! use std::time::Duration;
//!
//! let backend = ArmBackend::new("00000000-0000-0000-0000-000000000000", "token");
//! let ctx = CallContext::new().with_timeout(Duration::from_secs(30));
//!
//! let page = backend.list_resource_groups(&ctx, None).unwrap();
//! for group in &page.items {
//!     println!("{group}");
//! }
//! ```
//!
//! ## Retry Logic
//!
//! Read calls can be wrapped in [`retry::with_retry`]. Only
//! [`ErrorCategory::Transient`] errors are retried; cancellation is honored
//! between attempts.

#![warn(clippy::all)]

pub mod backend;
pub mod context;
pub mod error;
pub mod resource_id;
pub mod retry;
pub mod types;

pub use backend::ResourceProvider;
pub use backend::arm::ArmBackend;
pub use backend::memory::{Inventory, MemoryBackend};
pub use context::{CallContext, CancellationToken};
pub use error::{Error, ErrorCategory, Result};
pub use resource_id::ResourceId;
pub use types::{PLATFORM_AZURE, Page, Resource, RetryConfig, Tags, TypedEndpoint};
