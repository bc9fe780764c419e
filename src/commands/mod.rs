//! Command implementations and the session they share.

pub mod apply;
pub mod backup;
pub mod evaluate;
pub mod groups;
pub mod restore;
pub mod scan;

use anyhow::{Context as _, Result, bail};
use armkit::{ArmBackend, CallContext, Inventory, MemoryBackend, Resource, ResourceProvider};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tagengine::{MatchTable, RuleSet, ScanOptions, Scanner, evaluate};

use crate::Context;
use crate::config::{Config, Settings, Source};
use crate::progress::ScanProgress;
use crate::ui;

/// The provider a command talks to.
enum Provider {
    Arm(ArmBackend),
    Inventory {
        backend: MemoryBackend,
        path: PathBuf,
    },
}

/// Resolved settings, provider and call context for one invocation.
pub struct Session {
    settings: Settings,
    provider: Provider,
    call: CallContext,
}

impl Session {
    pub fn open(ctx: &Context) -> Result<Self> {
        let config = Config::load(ctx.global.config.as_deref())?;
        let settings = Settings::resolve(&ctx.global, config)?;

        let provider = match &settings.source {
            Source::Arm {
                subscription_id,
                api_base,
                access_token,
            } => {
                log::debug!("Using Azure Resource Manager, subscription {subscription_id}");
                let backend = match api_base {
                    Some(base) => ArmBackend::with_api_base(base, subscription_id, access_token),
                    None => ArmBackend::new(subscription_id, access_token),
                };
                Provider::Arm(backend)
            }
            Source::Inventory(path) => {
                log::debug!("Using inventory file {}", path.display());
                Provider::Inventory {
                    backend: MemoryBackend::from_inventory(load_inventory(path)?),
                    path: path.clone(),
                }
            }
        };

        let call = match settings.timeout {
            Some(timeout) => CallContext::new().with_timeout(timeout),
            None => CallContext::new(),
        };

        Ok(Self {
            settings,
            provider,
            call,
        })
    }

    pub fn provider(&self) -> &dyn ResourceProvider {
        match &self.provider {
            Provider::Arm(backend) => backend as &dyn ResourceProvider,
            Provider::Inventory { backend, .. } => backend,
        }
    }

    pub fn call(&self) -> &CallContext {
        &self.call
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            jobs: self.settings.jobs,
            retry: self.settings.retry.clone(),
        }
    }

    /// Backup directory: `explicit`, else the configured one.
    pub fn backup_dir(&self, explicit: Option<&Path>) -> PathBuf {
        explicit.map_or_else(|| self.settings.backup_dir.clone(), Path::to_path_buf)
    }

    /// Scan the whole inventory, reporting progress and group failures.
    pub fn scan(&self, ctx: &Context, allow_partial: bool) -> Result<Vec<Resource>> {
        let scanner = Scanner::with_options(self.provider(), self.scan_options());
        let mut progress = ScanProgress::new(ctx.quiet);
        let outcome = scanner.scan_all_with(&self.call, &mut progress);
        progress.finish();
        let outcome = outcome.context("Scan failed")?;

        for failure in &outcome.failures {
            ui::warn(&format!(
                "Resource group {} could not be scanned: {}",
                failure.group, failure.error
            ));
        }
        if !outcome.is_complete() && !allow_partial {
            bail!(
                "{} resource group(s) could not be scanned (use --allow-partial to continue without them)",
                outcome.failures.len()
            );
        }

        Ok(outcome.resources)
    }

    /// Load `rules`, scan, and build the match table.
    pub fn matched(
        &self,
        ctx: &Context,
        rules: &Path,
        allow_partial: bool,
    ) -> Result<(RuleSet, MatchTable)> {
        let rule_set = RuleSet::load(rules)?;
        log::info!("Loaded {} rule(s) from {}", rule_set.len(), rules.display());

        let resources = self.scan(ctx, allow_partial)?;
        let table = evaluate(&rule_set.rules, &resources);
        Ok((rule_set, table))
    }

    /// Write the inventory back when working offline.
    pub fn save(&self) -> Result<()> {
        if let Provider::Inventory { backend, path } = &self.provider {
            let content = serde_json::to_string_pretty(&backend.to_inventory())?;
            fs::write(path, content)
                .with_context(|| format!("Could not write {}", path.display()))?;
            log::debug!("Inventory written to {}", path.display());
        }
        Ok(())
    }
}

fn load_inventory(path: &Path) -> Result<Inventory> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read inventory {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid inventory file {}", path.display()))
}

/// Ask before a mutating operation unless `yes` was given.
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }

    let confirmed = dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?;

    Ok(confirmed)
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    write_json(&mut io::stdout().lock(), value)
}

/// Write `value` as pretty JSON followed by a newline.
pub fn write_json<W: Write, T: serde::Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagengine::ActionExecutionRecord;

    #[test]
    fn test_no_records_render_as_empty_array() {
        let mut out = Vec::new();
        write_json(&mut out, &Vec::<ActionExecutionRecord>::new()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[]\n");
    }

    #[test]
    fn test_write_json_is_pretty() {
        let mut out = Vec::new();
        write_json(&mut out, &serde_json::json!({"id": "x"})).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\n  \"id\": \"x\"\n}\n");
    }
}
