//! Action execution.
//!
//! The executor walks a [`MatchTable`] in id order and applies the actions
//! of every matched rule. Reads are retried on transient failures, writes are
//! not. The first failure aborts the run; the records completed before it are
//! returned with the error.

use crate::error::Error;
use crate::matcher::{MatchEntry, MatchTable};
use crate::routing::TagWriter;
use crate::rules::{Action, Rule};
use armkit::retry::{LogCallback, with_retry};
use armkit::{CallContext, Resource, ResourceProvider, RetryConfig};
use serde::Serialize;

/// Audit record for one (resource, rule) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionExecutionRecord {
    pub resource_id: String,
    pub rule_name: String,
    pub actions: Vec<Action>,
}

/// A run aborted by a failed action.
#[derive(Debug, thiserror::Error)]
#[error("execution aborted after {} completed record(s): {error}", .completed.len())]
pub struct ExecutionFailure {
    /// Records fully applied before the failure.
    pub completed: Vec<ActionExecutionRecord>,
    #[source]
    pub error: Error,
}

/// Outcome of a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Written,
    Unchanged,
    Skipped,
}

/// Applies matched rules against a provider.
pub struct Executor<'p, P: ResourceProvider + ?Sized> {
    provider: &'p P,
    writer: TagWriter,
    retry: RetryConfig,
}

impl<'p, P: ResourceProvider + ?Sized> Executor<'p, P> {
    pub fn new(provider: &'p P) -> Self {
        Self {
            provider,
            writer: TagWriter::default(),
            retry: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn with_writer(mut self, writer: TagWriter) -> Self {
        self.writer = writer;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Execute every action in `table`.
    ///
    /// In dry-run mode no provider call is made, but the returned records are
    /// the same as for a real run.
    pub fn execute(
        &self,
        ctx: &CallContext,
        table: &MatchTable,
        dry_run: bool,
    ) -> Result<Vec<ActionExecutionRecord>, ExecutionFailure> {
        let mut records = Vec::with_capacity(table.rule_count());

        for (id, entry) in table {
            for rule in &entry.rules {
                if dry_run {
                    for action in &rule.actions {
                        log::info!("[dry-run] {} `{}` on {id}", rule.name, action.kind());
                    }
                } else if let Err(error) = self.apply_rule(ctx, entry, rule) {
                    return Err(ExecutionFailure {
                        completed: records,
                        error,
                    });
                }

                records.push(ActionExecutionRecord {
                    resource_id: id.clone(),
                    rule_name: rule.name.clone(),
                    actions: rule.actions.clone(),
                });
            }
        }

        Ok(records)
    }

    fn apply_rule(&self, ctx: &CallContext, entry: &MatchEntry, rule: &Rule) -> Result<(), Error> {
        let id = &entry.resource.id;
        for action in &rule.actions {
            let applied =
                self.apply_action(ctx, &entry.resource, action)
                    .map_err(|source| Error::Action {
                        resource_id: id.clone(),
                        rule: rule.name.clone(),
                        action: action.kind().to_string(),
                        source,
                    })?;

            match applied {
                Applied::Written => log::info!("{} `{}` applied to {id}", rule.name, action.kind()),
                Applied::Unchanged => {
                    log::debug!("{} `{}` left {id} unchanged", rule.name, action.kind());
                }
                Applied::Skipped => log::warn!(
                    "Unknown action type `{}` in rule `{}`; skipped for {id}",
                    action.kind(),
                    rule.name
                ),
            }
        }
        Ok(())
    }

    fn apply_action(
        &self,
        ctx: &CallContext,
        resource: &Resource,
        action: &Action,
    ) -> armkit::Result<Applied> {
        match action {
            Action::AddTag { tag, value } => {
                let mut current = self.fetch(ctx, &resource.id)?;
                if current.has_tag(tag) {
                    return Ok(Applied::Unchanged);
                }
                current.tags.insert(tag.clone(), Some(value.clone()));
                self.write(ctx, &current)?;
                Ok(Applied::Written)
            }
            Action::DelTag { tag } => {
                let mut current = self.fetch(ctx, &resource.id)?;
                if current.tags.remove(tag).is_none() {
                    return Ok(Applied::Unchanged);
                }
                self.write(ctx, &current)?;
                Ok(Applied::Written)
            }
            Action::CleanTags => {
                let cleared = Resource {
                    tags: armkit::Tags::new(),
                    ..resource.clone()
                };
                self.write(ctx, &cleared)?;
                Ok(Applied::Written)
            }
            Action::Unknown { .. } => Ok(Applied::Skipped),
        }
    }

    /// Re-read a resource so actions never work from stale scan data.
    fn fetch(&self, ctx: &CallContext, id: &str) -> armkit::Result<Resource> {
        let api_version = self.writer.api_version(id);
        let mut resource = with_retry(&self.retry, ctx, Some(&LogCallback), || {
            self.provider.get_resource_by_id(ctx, id, api_version)
        })?;
        // Some endpoints echo the id in a different case; keep the table's.
        resource.id = id.to_string();
        Ok(resource)
    }

    fn write(&self, ctx: &CallContext, resource: &Resource) -> armkit::Result<()> {
        self.writer.write(
            self.provider,
            ctx,
            &resource.id,
            &resource.kind,
            &resource.tags,
        )
    }
}
