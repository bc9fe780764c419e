use anyhow::{Context as _, Result};
use tagengine::{Backup, BackupManager};

use super::{Session, confirm};
use crate::Context;
use crate::cli::RestoreArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &RestoreArgs) -> Result<()> {
    let backup = Backup::load(&args.file)?;
    if backup.is_empty() {
        ui::info("Backup is empty, nothing to restore");
        return Ok(());
    }

    let session = Session::open(ctx)?;

    ui::header("Restore");
    ui::kv("File", &args.file.display().to_string());
    ui::kv("Resources", &backup.len().to_string());
    println!();

    let prompt = format!("Replace the tags of {} resource(s)?", backup.len());
    if !confirm(&prompt, args.yes)? {
        ui::warn("Aborted");
        return Ok(());
    }

    let result = BackupManager::new(session.provider())
        .with_retry(session.settings().retry.clone())
        .restore(session.call(), &backup);
    session.save()?;

    let summary = result.context("Restore failed")?;
    ui::success(&format!("Restored tags of {} resource(s)", summary.restored));
    Ok(())
}
