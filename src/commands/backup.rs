use anyhow::{Context as _, Result};
use tagengine::BackupManager;

use super::Session;
use crate::Context;
use crate::cli::BackupArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &BackupArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    let (_, table) = session.matched(ctx, &args.rules, args.allow_partial)?;

    if table.is_empty() {
        ui::info("No resource matched any rule, nothing to back up");
        return Ok(());
    }

    let dir = session.backup_dir(args.backup_dir.as_deref());
    let path = BackupManager::new(session.provider())
        .with_retry(session.settings().retry.clone())
        .create(session.call(), &table, &dir)
        .context("Backup failed")?;

    ui::success(&format!(
        "Backed up tags of {} resource(s) to {}",
        table.len(),
        path.display()
    ));
    Ok(())
}
