//! Inventory scanning.
//!
//! A scan lists the subscription's resource groups, then fetches the
//! resources of every group on a bounded worker pool. Each worker reports
//! its group on a shared channel; the channel closes once the pool has
//! finished every group, and the caller drains it as results arrive.
//!
//! Failing to list groups fails the scan. A failing group does not: its
//! error is reported in [`ScanOutcome::failures`] next to the resources of
//! the groups that succeeded.

use crate::error::{Error, Result};
use armkit::retry::{LogCallback, with_retry};
use armkit::{CallContext, Page, Resource, ResourceProvider, RetryConfig, Tags};
use std::sync::mpsc;
use std::thread;

/// Default number of concurrent group fetches.
pub const DEFAULT_JOBS: usize = 4;

/// Scanner configuration.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Upper bound on concurrent group fetches.
    pub jobs: usize,
    /// Retry policy for every page read.
    pub retry: RetryConfig,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            jobs: DEFAULT_JOBS,
            retry: RetryConfig::default(),
        }
    }
}

/// A group whose resources could not be listed.
#[derive(Debug)]
pub struct GroupScanFailure {
    pub group: String,
    pub error: armkit::Error,
}

/// Result of a full scan: everything that could be read, plus what could not.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Resources of the groups that succeeded. Order across groups is
    /// unspecified; within a group it is provider order.
    pub resources: Vec<Resource>,
    /// One entry per failed group, sorted by group name.
    pub failures: Vec<GroupScanFailure>,
}

impl ScanOutcome {
    /// Whether every group was scanned.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Receives scan progress on the calling thread.
pub trait ScanObserver {
    /// Called once the group list is known.
    fn on_groups_listed(&mut self, count: usize);

    /// Called as each group finishes, with its resource count or error.
    fn on_group_scanned(&mut self, group: &str, result: std::result::Result<usize, &armkit::Error>);
}

/// No-op observer.
pub struct NoObserver;

impl ScanObserver for NoObserver {
    fn on_groups_listed(&mut self, _count: usize) {}
    fn on_group_scanned(&mut self, _group: &str, _result: std::result::Result<usize, &armkit::Error>) {}
}

/// Reads inventory from a provider.
pub struct Scanner<'p, P: ResourceProvider + ?Sized> {
    provider: &'p P,
    options: ScanOptions,
}

impl<'p, P: ResourceProvider + ?Sized> Scanner<'p, P> {
    pub fn new(provider: &'p P) -> Self {
        Self::with_options(provider, ScanOptions::default())
    }

    pub fn with_options(provider: &'p P, options: ScanOptions) -> Self {
        Self { provider, options }
    }

    /// All resource group names, following pagination.
    pub fn list_resource_groups(&self, ctx: &CallContext) -> Result<Vec<String>> {
        self.collect_pages(ctx, |token| self.provider.list_resource_groups(ctx, token))
            .map_err(Error::GroupListing)
    }

    /// All resources of `group` in provider order.
    pub fn list_resources_in_group(&self, ctx: &CallContext, group: &str) -> Result<Vec<Resource>> {
        Ok(self.fetch_group(ctx, group)?)
    }

    /// Tags set on the resource group itself.
    pub fn resource_group_tags(&self, ctx: &CallContext, group: &str) -> Result<Tags> {
        let tags = with_retry(&self.options.retry, ctx, Some(&LogCallback), || {
            self.provider.get_resource_group_tags(ctx, group)
        })?;
        Ok(tags)
    }

    /// Scan every group without progress reporting.
    pub fn scan_all(&self, ctx: &CallContext) -> Result<ScanOutcome> {
        self.scan_all_with(ctx, &mut NoObserver)
    }

    /// Scan every group, reporting progress to `observer`.
    pub fn scan_all_with(
        &self,
        ctx: &CallContext,
        observer: &mut dyn ScanObserver,
    ) -> Result<ScanOutcome> {
        let groups = self.list_resource_groups(ctx)?;
        log::info!("Scanning {} resource group(s)", groups.len());
        observer.on_groups_listed(groups.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs.max(1))
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;

        let (tx, rx) = mpsc::channel::<(String, armkit::Result<Vec<Resource>>)>();
        let mut outcome = ScanOutcome::default();
        let groups = &groups;

        thread::scope(|s| {
            s.spawn(move || {
                pool.scope(|scope| {
                    for group in groups {
                        let tx = tx.clone();
                        scope.spawn(move |_| {
                            let result = self.fetch_group(ctx, group);
                            // The receiver outlives the pool.
                            let _ = tx.send((group.clone(), result));
                        });
                    }
                });
                drop(tx);
            });

            for (group, result) in rx {
                match result {
                    Ok(resources) => {
                        log::debug!("{group}: {} resource(s)", resources.len());
                        observer.on_group_scanned(&group, Ok(resources.len()));
                        outcome.resources.extend(resources);
                    }
                    Err(error) => {
                        log::warn!("Cannot scan resource group {group}: {error}");
                        observer.on_group_scanned(&group, Err(&error));
                        outcome.failures.push(GroupScanFailure { group, error });
                    }
                }
            }
        });

        // A cancelled scan is not a partial one.
        ctx.check()?;

        outcome.failures.sort_by(|a, b| a.group.cmp(&b.group));
        log::info!(
            "Scanned {} resource(s), {} group(s) failed",
            outcome.resources.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }

    fn fetch_group(&self, ctx: &CallContext, group: &str) -> armkit::Result<Vec<Resource>> {
        self.collect_pages(ctx, |token| self.provider.list_resources(ctx, group, token))
    }

    /// Follow page tokens until the provider stops returning one.
    fn collect_pages<T, F>(&self, ctx: &CallContext, mut fetch: F) -> armkit::Result<Vec<T>>
    where
        F: FnMut(Option<&str>) -> armkit::Result<Page<T>>,
    {
        let mut items = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = with_retry(&self.options.retry, ctx, Some(&LogCallback), || {
                fetch(token.as_deref())
            })?;
            items.extend(page.items);
            match page.next {
                Some(next) => token = Some(next),
                None => return Ok(items),
            }
        }
    }
}
