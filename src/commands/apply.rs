use anyhow::{Context as _, Result};
use tagengine::{ActionExecutionRecord, BackupManager, Executor};

use super::evaluate::print_matches;
use super::{Session, confirm, print_json};
use crate::Context;
use crate::cli::ApplyArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    let (rule_set, table) = session.matched(ctx, &args.rules, args.output.allow_partial)?;

    let dry_run = args.dry_run || rule_set.dry_run;
    if rule_set.dry_run && !args.dry_run {
        ui::info("Rules file requests a dry run");
    }

    if !args.output.json {
        print_matches(&table);
    }
    if table.is_empty() {
        if args.output.json {
            return print_json(&Vec::<ActionExecutionRecord>::new());
        }
        return Ok(());
    }

    if !dry_run {
        let prompt = format!(
            "Apply {} rule match(es) to {} resource(s)?",
            table.rule_count(),
            table.len()
        );
        if !confirm(&prompt, args.yes)? {
            ui::warn("Aborted");
            return Ok(());
        }

        if args.backup {
            let dir = session.backup_dir(args.backup_dir.as_deref());
            let path = BackupManager::new(session.provider())
                .with_retry(session.settings().retry.clone())
                .create(session.call(), &table, &dir)
                .context("Backup failed, nothing was changed")?;
            ui::success(&format!("Backup written to {}", path.display()));
        }
    }

    let executor = Executor::new(session.provider()).with_retry(session.settings().retry.clone());
    let records = match executor.execute(session.call(), &table, dry_run) {
        Ok(records) => records,
        Err(failure) => {
            // Offline runs keep what was applied before the failure.
            session.save()?;
            ui::error(&format!(
                "Stopped after {} completed rule application(s)",
                failure.completed.len()
            ));
            return Err(failure.error).context("Apply failed");
        }
    };
    if !dry_run {
        session.save()?;
    }

    if args.output.json {
        return print_json(&records);
    }

    println!();
    if dry_run {
        ui::info(&format!(
            "Dry run: {} rule application(s) would run, nothing was changed",
            records.len()
        ));
    } else {
        ui::success(&format!("Applied {} rule application(s)", records.len()));
    }
    Ok(())
}
